//! Core type definitions for the agent runtime.
//!
//! This module contains the message/content model (C1 in `DESIGN.md`): the
//! types that flow between a user, the agent loop, a model adapter, and
//! registered tools. Vendor wire formats live with their adapter
//! (`adapters::openai_compat`), not here — this module only knows the
//! provider-neutral shapes.

use crate::Error;
use crate::hooks::HookRegistry;
use crate::tools::Tool;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

// ============================================================================
// NEWTYPE WRAPPERS FOR COMPILE-TIME TYPE SAFETY
// ============================================================================

/// Validated model name.
///
/// # Example
///
/// ```
/// use open_agent::ModelName;
///
/// let model = ModelName::new("qwen2.5-32b-instruct").unwrap();
/// assert_eq!(model.as_str(), "qwen2.5-32b-instruct");
/// assert!(ModelName::new("").is_err());
/// assert!(ModelName::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelName(String);

impl ModelName {
    /// Creates a new `ModelName` after validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the model name is empty or contains only whitespace.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(Error::invalid_input(
                "Model name cannot be empty or whitespace",
            ));
        }

        Ok(ModelName(name))
    }

    /// Returns the model name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ModelName` and returns the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ModelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated base URL.
///
/// # Example
///
/// ```
/// use open_agent::BaseUrl;
///
/// let url = BaseUrl::new("http://localhost:1234/v1").unwrap();
/// assert_eq!(url.as_str(), "http://localhost:1234/v1");
/// assert!(BaseUrl::new("localhost:1234").is_err());
/// assert!(BaseUrl::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Creates a new `BaseUrl` after validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or doesn't start with http:// or https://.
    pub fn new(url: impl Into<String>) -> crate::Result<Self> {
        let url = url.into();
        let trimmed = url.trim();

        if trimmed.is_empty() {
            return Err(Error::invalid_input("base_url cannot be empty"));
        }

        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(Error::invalid_input(
                "base_url must start with http:// or https://",
            ));
        }

        Ok(BaseUrl(url))
    }

    /// Returns the base URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `BaseUrl` and returns the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated sampling temperature, clamped to `[0.0, 2.0]` at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f32);

impl Temperature {
    /// Creates a new `Temperature` after validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the temperature is not between 0.0 and 2.0 (inclusive).
    pub fn new(temp: f32) -> crate::Result<Self> {
        if !(0.0..=2.0).contains(&temp) {
            return Err(Error::invalid_input(
                "temperature must be between 0.0 and 2.0",
            ));
        }

        Ok(Temperature(temp))
    }

    /// Returns the temperature value.
    pub fn value(&self) -> f32 {
        self.0
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

/// Core configuration for an [`crate::agent::Agent`].
///
/// Everything here is provider-agnostic: the system prompt, the turn budget,
/// the tool set, and the hook registry. Transport-level settings (endpoint,
/// credentials, sampling parameters) belong to the chosen `Model` adapter's
/// own config, e.g. `adapters::openai_compat::OpenAiCompatConfig`, because a
/// non-HTTP adapter wouldn't have a `base_url` at all.
#[derive(Clone)]
pub struct AgentOptions {
    /// System prompt sent to the model at the start of every invocation.
    system_prompt: String,

    /// Maximum number of user/assistant turns before the loop gives up and
    /// returns with `AgentStopReason::MaxTurns` rather than looping forever.
    max_turns: u32,

    /// Tools available to the agent. Seeds the agent's `ToolRegistry` at
    /// construction; duplicate names are rejected there, not here.
    tools: Vec<Arc<Tool>>,

    /// Lifecycle hook registry (see `hooks.rs`).
    hooks: HookRegistry,
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("system_prompt", &self.system_prompt)
            .field("max_turns", &self.max_turns)
            .field("tools", &format!("{} tools", self.tools.len()))
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            max_turns: 1,
            tools: Vec::new(),
            hooks: HookRegistry::new(),
        }
    }
}

impl AgentOptions {
    /// Creates a new builder for constructing [`AgentOptions`].
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn tools(&self) -> &[Arc<Tool>] {
        &self.tools
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }
}

/// Builder for [`AgentOptions`].
#[derive(Default)]
pub struct AgentOptionsBuilder {
    system_prompt: Option<String>,
    max_turns: Option<u32>,
    tools: Vec<Arc<Tool>>,
    hooks: HookRegistry,
}

impl std::fmt::Debug for AgentOptionsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptionsBuilder")
            .field("system_prompt", &self.system_prompt)
            .field("max_turns", &self.max_turns)
            .field("tools", &format!("{} tools", self.tools.len()))
            .finish()
    }
}

impl AgentOptionsBuilder {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    /// Adds a single tool.
    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Adds a pre-constructed `Arc<Tool>`, useful when a tool is shared
    /// across multiple agents.
    pub fn tool_arc(mut self, tool: Arc<Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validates and constructs the final [`AgentOptions`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if `max_turns` is set to `0`.
    pub fn build(self) -> crate::Result<AgentOptions> {
        let max_turns = self.max_turns.unwrap_or(1);
        if max_turns == 0 {
            return Err(Error::configuration("max_turns must be at least 1"));
        }

        Ok(AgentOptions {
            system_prompt: self.system_prompt.unwrap_or_default(),
            max_turns,
            tools: self.tools,
            hooks: self.hooks,
        })
    }
}

// ============================================================================
// MESSAGE MODEL
// ============================================================================

/// Who sent a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Establishes agent behavior and context; conventionally first.
    System,
    /// Human or application input, including tool-result follow-ups.
    User,
    /// The model's response: text, tool uses, or both.
    Assistant,
    /// Reserved for wire-format round-tripping; the runtime itself always
    /// carries tool results as `User` messages containing `ToolResult` blocks.
    Tool,
}

/// Multi-modal content blocks that can appear in a [`Message`].
///
/// Serialized with an external `"type"` tag in snake_case, e.g.
/// `{"type": "tool_use", "tool_use_id": "call_123", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text(TextBlock),
    /// Vision input; never produced by the aggregator, only user-authored.
    Image(ImageBlock),
    /// A request from the model to execute a tool.
    ToolUse(ToolUseBlock),
    /// The result of executing a tool, matched back by `tool_use_id`.
    ToolResult(ToolResultBlock),
    /// Model "thinking" content, when the provider exposes it.
    Reasoning(ReasoningBlock),
    /// Opaque provider cache marker, forwarded unchanged.
    CachePoint(serde_json::Value),
}

impl ContentBlock {
    /// Parses a single content block from its wire representation.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidContent` carrying the offending `type` tag (or
    /// `"<missing>"` if absent) when `raw` doesn't deserialize cleanly.
    pub fn from_data(raw: serde_json::Value) -> crate::Result<ContentBlock> {
        let tag = raw
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("<missing>")
            .to_string();

        serde_json::from_value(raw).map_err(|_| Error::InvalidContent { tag })
    }
}

/// Simple text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseBlock {
    /// Correlates this request to the `ToolResult` sent back for it.
    pub tool_use_id: String,
    /// Name of the tool to execute; must resolve against a `ToolRegistry`.
    pub name: String,
    /// Arguments to pass to the tool handler.
    pub input: serde_json::Value,
}

impl ToolUseBlock {
    pub fn new(
        tool_use_id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Whether a tool's execution succeeded or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultStatus {
    Success,
    Error,
}

/// One piece of a tool's result content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text(String),
    Json(serde_json::Value),
}

impl ToolResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        ToolResultContent::Text(text.into())
    }

    pub fn json(value: serde_json::Value) -> Self {
        ToolResultContent::Json(value)
    }
}

/// The outcome of executing a tool, sent back to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub status: ToolResultStatus,
    pub content: Vec<ToolResultContent>,
}

impl ToolResultBlock {
    /// Builds a successful result from a single JSON value.
    pub fn success(tool_use_id: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            status: ToolResultStatus::Success,
            content: vec![ToolResultContent::Json(content)],
        }
    }

    /// Builds a failed result carrying a human-readable message.
    pub fn error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            status: ToolResultStatus::Error,
            content: vec![ToolResultContent::Text(message.into())],
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolResultStatus::Error
    }
}

/// Model "thinking" output, when the provider exposes a reasoning channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningBlock {
    pub text: Option<String>,
    pub signature: Option<String>,
    pub redacted_content: Option<Vec<u8>>,
}

/// Image detail level for vision-capable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    /// Fixed cost, lowest resolution.
    Low,
    /// Higher resolution, variable cost.
    High,
    /// Let the model decide (default).
    #[default]
    Auto,
}

impl std::fmt::Display for ImageDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageDetail::Low => write!(f, "low"),
            ImageDetail::High => write!(f, "high"),
            ImageDetail::Auto => write!(f, "auto"),
        }
    }
}

/// Image content, either a URL or a `data:` URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBlock {
    url: String,
    #[serde(default)]
    detail: ImageDetail,
}

fn mime_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^image/[A-Za-z0-9.+-]+$").unwrap())
}

fn reject_control_chars(s: &str, what: &str) -> crate::Result<()> {
    if s.chars().any(char::is_control) {
        return Err(Error::invalid_input(format!("{what} contains control characters")));
    }
    Ok(())
}

fn validate_mime_type(mime: &str) -> crate::Result<()> {
    if mime.is_empty() {
        return Err(Error::invalid_input("MIME type cannot be empty"));
    }
    if !mime_type_pattern().is_match(mime) {
        return Err(Error::invalid_input(format!(
            "MIME type '{mime}' must match image/<subtype> with no special characters"
        )));
    }
    Ok(())
}

/// `=` padding is only legal in the last two positions; everything else must
/// be an alphanumeric, `+`, or `/` base64 character, and the total length
/// must be a multiple of 4.
fn validate_base64_payload(data: &str) -> crate::Result<()> {
    if data.len() % 4 != 0 {
        return Err(Error::invalid_input(format!(
            "base64 data length must be a multiple of 4, got {}",
            data.len()
        )));
    }
    let last_two = data.len().saturating_sub(2);
    let valid = data.chars().enumerate().all(|(i, c)| {
        if c == '=' {
            i >= last_two
        } else {
            c.is_ascii_alphanumeric() || c == '+' || c == '/'
        }
    });
    if !valid {
        return Err(Error::invalid_input("base64 data contains invalid characters"));
    }
    Ok(())
}

impl ImageBlock {
    /// Creates an image block from a URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the URL is empty, contains control
    /// characters, is not `http(s)://` or `data:`, or is a malformed/invalid
    /// `data:` URI (bad MIME type or bad base64 payload).
    pub fn from_url(url: impl Into<String>) -> crate::Result<Self> {
        let url = url.into();

        if url.is_empty() {
            return Err(Error::invalid_input("Image URL cannot be empty"));
        }
        reject_control_chars(&url, "Image URL")?;

        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(Self {
                url,
                detail: ImageDetail::default(),
            })
        } else if let Some(rest) = url.strip_prefix("data:") {
            let Some(semicolon_pos) = rest.find(';') else {
                return Err(Error::invalid_input("Malformed data URI: missing MIME type"));
            };
            validate_mime_type(&rest[..semicolon_pos])?;

            let Some(payload) = rest[semicolon_pos + 1..].strip_prefix("base64,") else {
                return Err(Error::invalid_input(
                    "Data URI must be in format: data:image/TYPE;base64,DATA",
                ));
            };
            validate_base64_payload(payload)?;

            Ok(Self {
                url,
                detail: ImageDetail::default(),
            })
        } else {
            Err(Error::invalid_input(
                "Image URL must start with http://, https://, or data:",
            ))
        }
    }

    /// Creates an image block from base64-encoded data.
    pub fn from_base64(
        base64_data: impl AsRef<str>,
        mime_type: impl AsRef<str>,
    ) -> crate::Result<Self> {
        let data = base64_data.as_ref();
        let mime = mime_type.as_ref();

        if data.is_empty() {
            return Err(Error::invalid_input("Base64 image data cannot be empty"));
        }
        validate_mime_type(mime)?;
        validate_base64_payload(data)?;

        Ok(Self {
            url: format!("data:{};base64,{}", mime, data),
            detail: ImageDetail::default(),
        })
    }

    pub fn with_detail(mut self, detail: ImageDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn detail(&self) -> ImageDetail {
        self.detail
    }
}

/// A complete message: who sent it, and what it contains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::Text(TextBlock::new(text))],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: vec![ContentBlock::Text(TextBlock::new(text))],
        }
    }

    pub fn user_with_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::User,
            content,
        }
    }

    pub fn user_with_image(
        text: impl Into<String>,
        image_url: impl Into<String>,
    ) -> crate::Result<Self> {
        Ok(Self {
            role: MessageRole::User,
            content: vec![
                ContentBlock::Text(TextBlock::new(text)),
                ContentBlock::Image(ImageBlock::from_url(image_url)?),
            ],
        })
    }

    pub fn user_with_image_detail(
        text: impl Into<String>,
        image_url: impl Into<String>,
        detail: ImageDetail,
    ) -> crate::Result<Self> {
        Ok(Self {
            role: MessageRole::User,
            content: vec![
                ContentBlock::Text(TextBlock::new(text)),
                ContentBlock::Image(ImageBlock::from_url(image_url)?.with_detail(detail)),
            ],
        })
    }

    pub fn user_with_base64_image(
        text: impl Into<String>,
        base64_data: impl AsRef<str>,
        mime_type: impl AsRef<str>,
    ) -> crate::Result<Self> {
        Ok(Self {
            role: MessageRole::User,
            content: vec![
                ContentBlock::Text(TextBlock::new(text)),
                ContentBlock::Image(ImageBlock::from_base64(base64_data, mime_type)?),
            ],
        })
    }

    /// Parses a complete message from its wire representation (role + array
    /// of content blocks), validating every block via
    /// [`ContentBlock::from_data`].
    pub fn from_data(raw: serde_json::Value) -> crate::Result<Message> {
        let role: MessageRole = raw
            .get("role")
            .cloned()
            .ok_or_else(|| Error::InvalidContent {
                tag: "<missing role>".to_string(),
            })
            .and_then(|v| serde_json::from_value(v).map_err(|_| Error::InvalidContent {
                tag: "role".to_string(),
            }))?;

        let blocks = raw
            .get("content")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let content = blocks
            .into_iter()
            .map(ContentBlock::from_data)
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Message { role, content })
    }

    /// Every `tool_use_id` requested by this message (assistant messages only
    /// carry any).
    pub fn tool_use_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(t) => Some(t.tool_use_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// STREAM EVENTS
// ============================================================================

/// Raw, incremental event produced by a [`crate::model::Model`] while
/// streaming a response. Tags are camelCase on the wire
/// (`messageStart`, `contentBlockDelta`, ...) regardless of any adapter's own
/// wire format, which never leaks past `aggregator.rs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    MessageStart {
        role: MessageRole,
    },
    ContentBlockStart {
        index: Option<u32>,
        start: Option<ContentBlockStartInfo>,
    },
    ContentBlockDelta {
        index: Option<u32>,
        delta: ContentDelta,
    },
    ContentBlockStop {
        index: Option<u32>,
    },
    MessageStop {
        stop_reason: StopReason,
    },
    Metadata {
        usage: Option<Usage>,
        metrics: Option<Metrics>,
        trace: Option<serde_json::Value>,
    },
}

/// Payload of a `ContentBlockStart` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlockStartInfo {
    ToolUseStart { name: String, tool_use_id: String },
}

/// Payload of a `ContentBlockDelta` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentDelta {
    TextDelta(String),
    ToolUseInputDelta(String),
    ReasoningContentDelta {
        text: Option<String>,
        signature: Option<String>,
        redacted_content: Option<Vec<u8>>,
    },
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    ContentFiltered,
    GuardrailIntervened,
}

/// Token accounting for one model call. Additive across a multi-call
/// invocation via `+=`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cache_read_tokens: Option<u64>,
    pub cache_write_tokens: Option<u64>,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.total_tokens += rhs.total_tokens;
        self.cache_read_tokens = match (self.cache_read_tokens, rhs.cache_read_tokens) {
            (Some(a), Some(b)) => Some(a + b),
            (a, None) => a,
            (None, b) => b,
        };
        self.cache_write_tokens = match (self.cache_write_tokens, rhs.cache_write_tokens) {
            (Some(a), Some(b)) => Some(a + b),
            (a, None) => a,
            (None, b) => b,
        };
    }
}

/// Timing info for one model call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub latency_ms: u64,
}

/// Namespace UUID used to derive deterministic interrupt ids: the standard
/// OID namespace (`uuid::Uuid::NAMESPACE_OID`), per the `uuidv5(name,
/// OID_NAMESPACE)` derivation prescribed for interrupt ids, so ids are
/// portable across conforming implementations and stay stable across
/// process restarts.
pub const INTERRUPT_NAMESPACE: uuid::Uuid = uuid::Uuid::NAMESPACE_OID;

/// A pending (or resolved) request for a human decision, most commonly one
/// raised from inside a tool call awaiting approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interrupt {
    pub id: String,
    pub name: String,
    pub reason: Option<String>,
    pub response: Option<serde_json::Value>,
}

impl Interrupt {
    /// Creates an interrupt with an explicit id (used when replaying or
    /// resuming a previously-raised interrupt).
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        reason: Option<String>,
        response: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            reason,
            response,
        }
    }

    /// Creates an interrupt, deriving its id from `name` alone. Used for
    /// interrupts not anchored to a specific tool call (tests, ad hoc
    /// approvals raised directly from a hook).
    pub fn new(
        name: impl Into<String>,
        reason: impl Into<String>,
        response: Option<serde_json::Value>,
    ) -> Self {
        let name = name.into();
        let id = format!(
            "v1:interrupt:{}",
            uuid::Uuid::new_v5(&INTERRUPT_NAMESPACE, name.as_bytes())
        );
        Self {
            id,
            name,
            reason: Some(reason.into()),
            response,
        }
    }

    /// Derives the deterministic id for an interrupt raised from a specific
    /// tool call: `v1:tool_call:{tool_use_id}:{uuidv5(name)}`.
    pub fn derive_id(tool_use_id: &str, name: &str) -> String {
        format!(
            "v1:tool_call:{tool_use_id}:{}",
            uuid::Uuid::new_v5(&INTERRUPT_NAMESPACE, name.as_bytes())
        )
    }
}

/// Per-invocation opaque state bag, round-tripped through
/// `InvokeOptions`/`AgentResult` but never sent to the model.
pub type AgentState = serde_json::Value;

/// Snapshot of `InterruptState` suitable for session persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterruptStateSnapshot {
    pub interrupts: HashMap<String, Interrupt>,
    pub context: serde_json::Map<String, serde_json::Value>,
    pub activated: bool,
}
