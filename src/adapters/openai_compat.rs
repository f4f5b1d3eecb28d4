//! The one [`Model`] adapter this crate ships: a client for OpenAI-compatible
//! chat completion endpoints (LM Studio, Ollama, llama.cpp, vLLM).
//!
//! All wire types in this module are adapter-private. The core never sees an
//! `OpenAIChunk` or an `OpenAIMessage` — only the [`StreamEvent`]s this
//! module translates them into.

use crate::config::{Provider, get_base_url, get_model};
use crate::error::Error;
use crate::model::{Model, ModelOptions, SystemPrompt, ToolChoice};
use crate::types::{
    BaseUrl, ContentBlock, ContentBlockStartInfo, ContentDelta, Message, MessageRole, Metrics,
    ModelName, StopReason, StreamEvent, Temperature, ToolResultContent,
};
use crate::Result;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::{Duration, Instant};

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart {
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: OpenAIImageUrl },
}

impl OpenAIContentPart {
    fn text(text: impl Into<String>) -> Self {
        OpenAIContentPart::Text { text: text.into() }
    }

    fn image_url(url: impl Into<String>, detail: impl Into<String>) -> Self {
        OpenAIContentPart::ImageUrl {
            image_url: OpenAIImageUrl {
                url: url.into(),
                detail: Some(detail.into()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIImageUrl {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChunk {
    #[allow(dead_code)]
    id: String,
    #[allow(dead_code)]
    object: String,
    #[allow(dead_code)]
    created: i64,
    #[allow(dead_code)]
    model: String,
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    #[allow(dead_code)]
    index: u32,
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIDelta {
    #[allow(dead_code)]
    role: Option<String>,
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIToolCallDelta {
    index: u32,
    id: Option<String>,
    #[allow(dead_code)]
    #[serde(rename = "type")]
    call_type: Option<String>,
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

// ============================================================================
// SSE PARSING
// ============================================================================

/// Parses an OpenAI-compatible `text/event-stream` body into a stream of
/// decoded chunks. Skips the `[DONE]` sentinel; anything that isn't a
/// `data: ` line is ignored (comments, blank lines, retry directives).
fn parse_sse_stream(
    body: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<OpenAIChunk>> + Send>> {
    let stream = body.bytes_stream().filter_map(move |result| async move {
        let bytes = match result.map_err(Error::Http) {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        for line in text.lines() {
            if let Some(data) = line.strip_prefix("data: ") {
                if data == "[DONE]" {
                    continue;
                }
                let chunk: OpenAIChunk = match serde_json::from_str(data) {
                    Ok(c) => c,
                    Err(e) => {
                        return Some(Err(Error::stream(format!("failed to parse chunk: {}", e))));
                    }
                };
                return Some(Ok(chunk));
            }
        }
        None
    });
    Box::pin(stream)
}

/// Which stream index text content lives at. OpenAI's delta format doesn't
/// number the text block itself; tool call indices are shifted by one so
/// they never collide with it.
const TEXT_BLOCK_INDEX: u32 = 0;

fn tool_block_index(delta_index: u32) -> u32 {
    delta_index + 1
}

fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "tool_calls" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::ContentFiltered,
        _ => StopReason::EndTurn,
    }
}

/// Translates a chunk stream into [`StreamEvent`]s, synthesizing the
/// `ContentBlockStart`/`ContentBlockStop` boundaries OpenAI's flat delta
/// format never states explicitly.
struct ChunkTranslator {
    text_started: bool,
    tool_started: std::collections::HashSet<u32>,
    started_at: Instant,
    emitted_message_start: bool,
}

impl ChunkTranslator {
    fn new() -> Self {
        Self {
            text_started: false,
            tool_started: std::collections::HashSet::new(),
            started_at: Instant::now(),
            emitted_message_start: false,
        }
    }

    fn translate(&mut self, chunk: OpenAIChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if !self.emitted_message_start {
            events.push(StreamEvent::MessageStart {
                role: MessageRole::Assistant,
            });
            self.emitted_message_start = true;
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return events;
        };

        if let Some(text) = choice.delta.content {
            if !text.is_empty() {
                if !self.text_started {
                    events.push(StreamEvent::ContentBlockStart {
                        index: Some(TEXT_BLOCK_INDEX),
                        start: None,
                    });
                    self.text_started = true;
                }
                events.push(StreamEvent::ContentBlockDelta {
                    index: Some(TEXT_BLOCK_INDEX),
                    delta: ContentDelta::TextDelta(text),
                });
            }
        }

        if let Some(tool_calls) = choice.delta.tool_calls {
            for call in tool_calls {
                let index = tool_block_index(call.index);
                if !self.tool_started.contains(&index) {
                    let (Some(id), Some(function)) = (&call.id, &call.function) else {
                        continue;
                    };
                    let Some(name) = &function.name else {
                        continue;
                    };
                    events.push(StreamEvent::ContentBlockStart {
                        index: Some(index),
                        start: Some(ContentBlockStartInfo::ToolUseStart {
                            name: name.clone(),
                            tool_use_id: id.clone(),
                        }),
                    });
                    self.tool_started.insert(index);
                }
                if let Some(function) = call.function {
                    if let Some(arguments) = function.arguments {
                        if !arguments.is_empty() {
                            events.push(StreamEvent::ContentBlockDelta {
                                index: Some(index),
                                delta: ContentDelta::ToolUseInputDelta(arguments),
                            });
                        }
                    }
                }
            }
        }

        if let Some(reason) = choice.finish_reason {
            if self.text_started {
                events.push(StreamEvent::ContentBlockStop {
                    index: Some(TEXT_BLOCK_INDEX),
                });
            }
            for index in &self.tool_started {
                events.push(StreamEvent::ContentBlockStop { index: Some(*index) });
            }
            events.push(StreamEvent::Metadata {
                usage: None,
                metrics: Some(Metrics {
                    latency_ms: self.started_at.elapsed().as_millis() as u64,
                }),
                trace: None,
            });
            events.push(StreamEvent::MessageStop {
                stop_reason: map_finish_reason(&reason),
            });
        }

        events
    }
}

/// Classifies a non-2xx HTTP response into the distinguished error variants
/// the agent loop reacts to, falling back to a generic API error.
fn classify_http_error(status: reqwest::StatusCode, body: &str) -> Error {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Error::model_throttled(format!("rate limited: {}", body));
    }

    let lower = body.to_lowercase();
    if lower.contains("context length")
        || lower.contains("maximum context")
        || lower.contains("too many tokens")
        || lower.contains("context_length_exceeded")
    {
        return Error::context_window_overflow(body.to_string());
    }

    Error::api(format!("API error {}: {}", status, body))
}

// ============================================================================
// MESSAGE CONVERSION
// ============================================================================

fn join_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tool_result_content_to_text(content: &[ToolResultContent]) -> String {
    content
        .iter()
        .map(|c| match c {
            ToolResultContent::Text(s) => s.clone(),
            ToolResultContent::Json(v) => v.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_openai_messages(out: &mut Vec<OpenAIMessage>, message: &Message) {
    match message.role {
        MessageRole::System | MessageRole::Tool => {
            out.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(OpenAIContent::Text(join_text(&message.content))),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        MessageRole::User => {
            let mut parts = Vec::new();
            for block in &message.content {
                match block {
                    ContentBlock::Text(t) => parts.push(OpenAIContentPart::text(&t.text)),
                    ContentBlock::Image(img) => {
                        parts.push(OpenAIContentPart::image_url(img.url(), img.detail().to_string()))
                    }
                    ContentBlock::ToolResult(result) => {
                        out.push(OpenAIMessage {
                            role: "tool".to_string(),
                            content: Some(OpenAIContent::Text(tool_result_content_to_text(
                                &result.content,
                            ))),
                            tool_calls: None,
                            tool_call_id: Some(result.tool_use_id.clone()),
                        });
                    }
                    ContentBlock::Reasoning(_) | ContentBlock::ToolUse(_) | ContentBlock::CachePoint(_) => {}
                }
            }
            if !parts.is_empty() {
                let content = if parts.len() == 1 {
                    match parts.into_iter().next().unwrap() {
                        OpenAIContentPart::Text { text } => OpenAIContent::Text(text),
                        part @ OpenAIContentPart::ImageUrl { .. } => OpenAIContent::Parts(vec![part]),
                    }
                } else {
                    OpenAIContent::Parts(parts)
                };
                out.push(OpenAIMessage {
                    role: "user".to_string(),
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
        }
        MessageRole::Assistant => {
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for block in &message.content {
                match block {
                    ContentBlock::Text(t) => text.push_str(&t.text),
                    ContentBlock::ToolUse(tool_use) => tool_calls.push(OpenAIToolCall {
                        id: tool_use.tool_use_id.clone(),
                        call_type: "function".to_string(),
                        function: OpenAIFunction {
                            name: tool_use.name.clone(),
                            arguments: serde_json::to_string(&tool_use.input)
                                .unwrap_or_else(|_| "{}".to_string()),
                        },
                    }),
                    ContentBlock::Reasoning(_)
                    | ContentBlock::Image(_)
                    | ContentBlock::ToolResult(_)
                    | ContentBlock::CachePoint(_) => {}
                }
            }
            out.push(OpenAIMessage {
                role: "assistant".to_string(),
                content: if text.is_empty() {
                    None
                } else {
                    Some(OpenAIContent::Text(text))
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
            });
        }
    }
}

fn to_openai_messages(system_prompt: Option<&SystemPrompt>, messages: &[Message]) -> Vec<OpenAIMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);

    match system_prompt {
        Some(SystemPrompt::Text(text)) if !text.is_empty() => out.push(OpenAIMessage {
            role: "system".to_string(),
            content: Some(OpenAIContent::Text(text.clone())),
            tool_calls: None,
            tool_call_id: None,
        }),
        Some(SystemPrompt::Blocks(blocks)) => {
            let text = join_text(blocks);
            if !text.is_empty() {
                out.push(OpenAIMessage {
                    role: "system".to_string(),
                    content: Some(OpenAIContent::Text(text)),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
        }
        _ => {}
    }

    for message in messages {
        push_openai_messages(&mut out, message);
    }

    out
}

fn tool_choice_to_openai(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => serde_json::json!("auto"),
        ToolChoice::Any => serde_json::json!("required"),
        ToolChoice::Specific(name) => serde_json::json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

// ============================================================================
// CONFIG
// ============================================================================

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    base_url: BaseUrl,
    model: ModelName,
    api_key: String,
    temperature: Temperature,
    max_tokens: Option<u32>,
    timeout_secs: u64,
}

impl OpenAiCompatConfig {
    pub fn builder() -> OpenAiCompatConfigBuilder {
        OpenAiCompatConfigBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn model(&self) -> &str {
        self.model.as_str()
    }
}

/// Builder for [`OpenAiCompatConfig`]. Resolves `base_url`/`model` the same
/// way the rest of the crate does: explicit value, then provider default,
/// then `OPEN_AGENT_BASE_URL`/`OPEN_AGENT_MODEL`.
#[derive(Debug, Default)]
pub struct OpenAiCompatConfigBuilder {
    provider: Option<Provider>,
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}


impl OpenAiCompatConfigBuilder {
    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn build(self) -> Result<OpenAiCompatConfig> {
        let base_url = get_base_url(self.provider, self.base_url.as_deref());
        let model = get_model(self.model.as_deref(), true)
            .ok_or_else(|| Error::config("model is required (set explicitly or via OPEN_AGENT_MODEL)"))?;

        Ok(OpenAiCompatConfig {
            base_url: BaseUrl::new(base_url)?,
            model: ModelName::new(model)?,
            api_key: self.api_key.unwrap_or_else(|| "not-needed".to_string()),
            temperature: Temperature::new(self.temperature.unwrap_or(0.7))?,
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs.unwrap_or(120),
        })
    }
}

// ============================================================================
// MODEL
// ============================================================================

/// A [`Model`] backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatModel {
    config: OpenAiCompatConfig,
    http: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::Http)?;
        Ok(Self { config, http })
    }

    fn build_request(&self, messages: &[Message], options: &ModelOptions) -> OpenAIRequest {
        let tools = if options.tool_specs.is_empty() {
            None
        } else {
            Some(
                options
                    .tool_specs
                    .iter()
                    .map(|spec| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": spec.name,
                                "description": spec.description,
                                "parameters": spec.input_schema,
                            },
                        })
                    })
                    .collect(),
            )
        };

        OpenAIRequest {
            model: self.config.model.as_str().to_string(),
            messages: to_openai_messages(options.system_prompt.as_ref(), messages),
            stream: true,
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature.value()),
            tools,
            tool_choice: options.tool_choice.as_ref().map(tool_choice_to_openai),
        }
    }

}

/// Owned connection details needed to send the one request a [`DriverState`]
/// drives. Cloned out of `&OpenAiCompatModel` up front so the returned stream
/// has no borrow on the model — `Model::stream`'s `Pin<Box<dyn Stream>>`
/// return type carries an implicit `'static` bound.
#[derive(Clone)]
struct RequestContext {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

async fn send_request(ctx: RequestContext, request: OpenAIRequest) -> Result<reqwest::Response> {
    let response = ctx
        .http
        .post(&ctx.url)
        .header("Authorization", format!("Bearer {}", ctx.api_key))
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await
        .map_err(Error::Http)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(classify_http_error(status, &body));
    }

    Ok(response)
}

/// Drives the single async HTTP POST that must happen before any
/// [`StreamEvent`] can be yielded, without making [`Model::stream`] itself
/// async. The request is built eagerly (it's cheap and synchronous); only
/// sending it and awaiting headers needs the executor.
enum DriverState {
    Pending {
        ctx: RequestContext,
        request: Option<OpenAIRequest>,
    },
    Active(Pin<Box<dyn Stream<Item = Result<OpenAIChunk>> + Send>>),
}

impl Model for OpenAiCompatModel {
    fn stream(
        &self,
        messages: &[Message],
        options: &ModelOptions,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
        let request = self.build_request(messages, options);
        let ctx = RequestContext {
            http: self.http.clone(),
            url: format!("{}/chat/completions", self.config.base_url.as_str()),
            api_key: self.config.api_key.clone(),
        };
        let state = DriverState::Pending {
            ctx,
            request: Some(request),
        };

        let chunks = stream::unfold(state, |state| async move {
            match state {
                DriverState::Pending { ctx, mut request } => {
                    let request = request.take().expect("request consumed exactly once");
                    match send_request(ctx, request).await {
                        Ok(response) => {
                            let mut inner = parse_sse_stream(response);
                            let next = inner.next().await;
                            next.map(|item| (item, DriverState::Active(inner)))
                        }
                        Err(e) => Some((Err(e), DriverState::Active(Box::pin(stream::empty())))),
                    }
                }
                DriverState::Active(mut inner) => {
                    let next = inner.next().await;
                    next.map(|item| (item, DriverState::Active(inner)))
                }
            }
        });

        let translated = chunks.scan(ChunkTranslator::new(), |translator, chunk_result| {
            let events = match chunk_result {
                Ok(chunk) => Ok(translator.translate(chunk)),
                Err(e) => Err(e),
            };
            async move { Some(events) }
        });

        let flattened = translated.flat_map(|result| match result {
            Ok(events) => stream::iter(events.into_iter().map(Ok)).boxed(),
            Err(e) => stream::iter(vec![Err(e)]).boxed(),
        });

        Box::pin(flattened)
    }
}
