//! Tests that `ImageBlock`/`Message` construction preserves validation and
//! detail level through a multi-turn conversation history.

use open_agent::{ContentBlock, ImageBlock, ImageDetail, Message, MessageRole, TextBlock};

#[test]
fn test_preserves_http_image_url() {
    let image_url = "https://example.com/test.jpg";
    let image = ImageBlock::from_url(image_url).expect("valid https url");
    let msg = Message::new(
        MessageRole::User,
        vec![ContentBlock::Text(TextBlock::new("Here's an image:")), ContentBlock::Image(image)],
    );

    assert_eq!(msg.content.len(), 2);
    match &msg.content[1] {
        ContentBlock::Image(img) => {
            assert_eq!(img.url(), image_url);
            assert_eq!(img.detail(), ImageDetail::Auto);
        }
        _ => panic!("expected image content block"),
    }
}

#[test]
fn test_preserves_base64_data_uri() {
    let base64_data = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";
    let image = ImageBlock::from_base64(base64_data, "image/png").expect("valid base64");
    let msg = Message::new(MessageRole::User, vec![ContentBlock::Image(image)]);

    match &msg.content[0] {
        ContentBlock::Image(img) => {
            let url = img.url();
            assert!(url.starts_with("data:image/png;base64,"));
            assert!(url.contains(base64_data));
        }
        _ => panic!("expected image content block"),
    }
}

#[test]
fn test_preserves_image_detail_level() {
    let cases = [
        (ImageDetail::Low, "low detail"),
        (ImageDetail::High, "high detail"),
        (ImageDetail::Auto, "auto detail"),
    ];

    for (detail, description) in cases {
        let image = ImageBlock::from_url("https://example.com/image.jpg").unwrap().with_detail(detail);
        let msg = Message::new(MessageRole::User, vec![ContentBlock::Image(image)]);
        match &msg.content[0] {
            ContentBlock::Image(img) => assert_eq!(img.detail(), detail, "{description} should be preserved"),
            _ => panic!("expected image content block"),
        }
    }
}

#[test]
fn test_preserves_validation_across_a_conversation() {
    let mut history = Vec::new();

    let image_url = "https://trusted-cdn.example.com/image.png";
    let image = ImageBlock::from_url(image_url).unwrap().with_detail(ImageDetail::High);
    history.push(Message::new(
        MessageRole::User,
        vec![ContentBlock::Text(TextBlock::new("What's in this image?")), ContentBlock::Image(image)],
    ));
    history.push(Message::new(MessageRole::Assistant, vec![ContentBlock::Text(TextBlock::new("I see the image"))]));
    history.push(Message::new(MessageRole::User, vec![ContentBlock::Text(TextBlock::new("Can you describe it?"))]));

    assert_eq!(history.len(), 3);

    let user_msg_1 = &history[0];
    assert_eq!(user_msg_1.content.len(), 2);
    match &user_msg_1.content[1] {
        ContentBlock::Image(img) => {
            assert_eq!(img.url(), image_url);
            assert_eq!(img.detail(), ImageDetail::High);
        }
        _ => panic!("expected image content block"),
    }

    match &history[1].content[0] {
        ContentBlock::Text(text) => assert_eq!(text.text, "I see the image"),
        _ => panic!("expected text content block"),
    }

    match &history[2].content[0] {
        ContentBlock::Text(text) => assert_eq!(text.text, "Can you describe it?"),
        _ => panic!("expected text content block"),
    }
}

#[test]
fn test_image_only_messages_are_valid() {
    let image = ImageBlock::from_url("https://example.com/test.jpg").unwrap().with_detail(ImageDetail::High);
    let msg = Message::new(MessageRole::User, vec![ContentBlock::Image(image.clone()), ContentBlock::Image(image)]);

    assert_eq!(msg.content.len(), 2);
    assert!(matches!(msg.content[0], ContentBlock::Image(_)));
    assert!(matches!(msg.content[1], ContentBlock::Image(_)));
}

#[test]
fn test_rejects_invalid_image_url_scheme() {
    let result = ImageBlock::from_url("ftp://example.com/image.jpg");
    assert!(result.is_err());
}
