//! Turns a model's incremental [`StreamEvent`]s into complete [`ContentBlock`]s
//! and, ultimately, a complete [`Message`].
//!
//! Grounded in `utils.rs`'s `ToolCallAggregator`/`parse_sse_stream`, which did
//! the same job directly against the OpenAI wire format. This version is
//! provider-neutral (it consumes the already-normalized `StreamEvent` an
//! adapter produces) and is pass-through-plus-synthesis: every upstream event
//! is forwarded unchanged, and a synthesized `ContentBlock` is interleaved
//! whenever a block's stop arrives. Because a `Stream` has no return value,
//! the terminal `{message, stop_reason}` is delivered through a oneshot side
//! channel instead.

use crate::Error;
use crate::types::{
    ContentBlock, ContentBlockStartInfo, ContentDelta, Message, MessageRole, ReasoningBlock,
    StopReason, StreamEvent, TextBlock, ToolUseBlock,
};
use futures::stream::Stream;
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use tokio::sync::oneshot;

/// One item of the aggregated stream: either a forwarded raw event or a
/// synthesized complete block.
#[derive(Debug, Clone)]
pub enum AggregatorItem {
    Event(StreamEvent),
    Block(ContentBlock),
}

/// Delivered through the oneshot channel once `MessageStop` is observed.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub message: Message,
    pub stop_reason: StopReason,
}

#[derive(Default)]
struct PartialText {
    text: String,
}

#[derive(Default)]
struct PartialToolUse {
    tool_use_id: String,
    name: String,
    input_buffer: String,
}

#[derive(Default)]
struct PartialReasoning {
    text: Option<String>,
    signature: Option<String>,
    redacted_content: Option<Vec<u8>>,
}

enum PartialBlock {
    Text(PartialText),
    ToolUse(PartialToolUse),
    Reasoning(PartialReasoning),
}

struct State<S> {
    input: Pin<Box<S>>,
    role: MessageRole,
    blocks: HashMap<u32, PartialBlock>,
    finished_blocks: Vec<ContentBlock>,
    pending: VecDeque<crate::Result<AggregatorItem>>,
    sender: Option<oneshot::Sender<crate::Result<AggregateOutcome>>>,
    done: bool,
}

/// Aggregates `events` into a stream of [`AggregatorItem`]s. The returned
/// `oneshot::Receiver` resolves with the final message and stop reason once
/// `MessageStop` has been observed, or with `Err(Error::IncompleteStream)` if
/// the upstream ends first.
pub fn aggregate<S>(
    events: S,
) -> (
    Pin<Box<dyn Stream<Item = crate::Result<AggregatorItem>> + Send>>,
    oneshot::Receiver<crate::Result<AggregateOutcome>>,
)
where
    S: Stream<Item = crate::Result<StreamEvent>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let state = State {
        input: Box::pin(events),
        role: MessageRole::Assistant,
        blocks: HashMap::new(),
        finished_blocks: Vec::new(),
        pending: VecDeque::new(),
        sender: Some(tx),
        done: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        use futures::stream::StreamExt;
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.input.next().await {
                Some(Ok(event)) => {
                    process_event(&mut state, event);
                    continue;
                }
                Some(Err(err)) => {
                    state.done = true;
                    if let Some(tx) = state.sender.take() {
                        let _ = tx.send(Err(Error::stream(err.to_string())));
                    }
                    state.pending.push_back(Err(err));
                    continue;
                }
                None => {
                    state.done = true;
                    if let Some(tx) = state.sender.take() {
                        let _ = tx.send(Err(Error::IncompleteStream));
                    }
                    return None;
                }
            }
        }
    });

    (Box::pin(stream), rx)
}

fn process_event<S>(state: &mut State<S>, event: StreamEvent) {
    match &event {
        StreamEvent::MessageStart { role } => {
            state.role = *role;
        }
        StreamEvent::ContentBlockStart {
            index: Some(index),
            start: Some(ContentBlockStartInfo::ToolUseStart { name, tool_use_id }),
        } => {
            state.blocks.insert(
                *index,
                PartialBlock::ToolUse(PartialToolUse {
                    tool_use_id: tool_use_id.clone(),
                    name: name.clone(),
                    input_buffer: String::new(),
                }),
            );
        }
        StreamEvent::ContentBlockStart { .. } => {}
        StreamEvent::ContentBlockDelta {
            index: Some(index),
            delta,
        } => {
            let entry = state.blocks.entry(*index).or_insert_with(|| match delta {
                ContentDelta::TextDelta(_) => PartialBlock::Text(PartialText::default()),
                ContentDelta::ToolUseInputDelta(_) => {
                    PartialBlock::ToolUse(PartialToolUse::default())
                }
                ContentDelta::ReasoningContentDelta { .. } => {
                    PartialBlock::Reasoning(PartialReasoning::default())
                }
            });
            apply_delta(entry, delta);
        }
        StreamEvent::ContentBlockDelta { index: None, .. } => {}
        StreamEvent::ContentBlockStop { index: Some(index) } => {
            if let Some(partial) = state.blocks.remove(index) {
                match finalize_block(partial) {
                    Ok(block) => {
                        state.finished_blocks.push(block.clone());
                        state.pending.push_back(Ok(AggregatorItem::Block(block)));
                    }
                    Err(err) => {
                        state.done = true;
                        if let Some(tx) = state.sender.take() {
                            let _ = tx.send(Err(Error::stream(err.to_string())));
                        }
                        state.pending.push_back(Err(err));
                    }
                }
            }
        }
        StreamEvent::ContentBlockStop { index: None } => {}
        StreamEvent::MessageStop { stop_reason } => {
            let message = Message::new(state.role, state.finished_blocks.clone());
            if let Some(tx) = state.sender.take() {
                let _ = tx.send(Ok(AggregateOutcome {
                    message,
                    stop_reason: *stop_reason,
                }));
            }
            state.done = true;
        }
        StreamEvent::Metadata { .. } => {}
    }

    state.pending.push_back(Ok(AggregatorItem::Event(event)));
}

fn apply_delta(block: &mut PartialBlock, delta: &ContentDelta) {
    match (block, delta) {
        (PartialBlock::Text(t), ContentDelta::TextDelta(text)) => t.text.push_str(text),
        (PartialBlock::ToolUse(tu), ContentDelta::ToolUseInputDelta(chunk)) => {
            tu.input_buffer.push_str(chunk)
        }
        (
            PartialBlock::Reasoning(r),
            ContentDelta::ReasoningContentDelta {
                text,
                signature,
                redacted_content,
            },
        ) => {
            if let Some(text) = text {
                r.text.get_or_insert_with(String::new).push_str(text);
            }
            if signature.is_some() {
                r.signature = signature.clone();
            }
            if redacted_content.is_some() {
                r.redacted_content = redacted_content.clone();
            }
        }
        _ => {}
    }
}

fn finalize_block(partial: PartialBlock) -> crate::Result<ContentBlock> {
    match partial {
        PartialBlock::Text(t) => Ok(ContentBlock::Text(TextBlock::new(t.text))),
        PartialBlock::ToolUse(tu) => {
            let input = serde_json::from_str(&tu.input_buffer)
                .map_err(|err| Error::invalid_tool_input(tu.tool_use_id.clone(), err))?;
            Ok(ContentBlock::ToolUse(ToolUseBlock::new(
                tu.tool_use_id,
                tu.name,
                input,
            )))
        }
        PartialBlock::Reasoning(r) => Ok(ContentBlock::Reasoning(ReasoningBlock {
            text: r.text,
            signature: r.signature,
            redacted_content: r.redacted_content,
        })),
    }
}
