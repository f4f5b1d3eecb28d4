//! Error types for the Open Agent SDK.

use thiserror::Error;

use crate::types::Interrupt;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the SDK.
///
/// Tool execution failures never surface through this type: a failing tool
/// becomes an error [`crate::types::ToolResultBlock`] handed back to the
/// model, not a raised `Error`. Everything here represents a failure of the
/// core itself (configuration, protocol, transport) or an explicit signal
/// that the caller must act on (an interrupt awaiting a response).
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// API error from the model server.
    #[error("API error: {0}")]
    Api(String),

    /// Streaming error.
    #[error("Streaming error: {0}")]
    Stream(String),

    /// Tool execution error.
    ///
    /// Reserved for failures in the tool plumbing itself (registry lookup,
    /// handler panics surfaced as errors) rather than a tool's own reported
    /// failure, which travels as an error-status `ToolResultBlock` instead.
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// Agent-level configuration problem: missing required option, an
    /// option that fails its own validation, or an invalid combination of
    /// options (e.g. a structured-output schema that collides with an
    /// already-registered tool name).
    #[error("Agent configuration error: {0}")]
    Configuration(String),

    /// Raised when `Agent::stream`/`Agent::invoke` is called while a prior
    /// invocation on the same `Agent` has not finished. Agents are
    /// single-threaded per invocation; reentrancy is a caller bug, not a
    /// recoverable condition.
    #[error("agent is already processing an invocation")]
    ConcurrentInvocation,

    /// The model or an adapter returned a response that violates the wire
    /// protocol contract (malformed stream event, missing required field,
    /// unparseable chunk).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A tool call's `input` failed schema validation or parsing before the
    /// tool handler ever ran. Carries the originating `tool_use_id` so the
    /// caller can correlate it back to the offending content block.
    #[error("invalid input for tool call {tool_use_id}: {source}")]
    InvalidToolInput {
        tool_use_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The model's output could not be coerced into the requested
    /// structured-output schema after exhausting retries.
    #[error("structured output error: {0}")]
    StructuredOutputError(String),

    /// The conversation (after any trimming the `ConversationManager`
    /// performed) still exceeds the model's context window.
    #[error("context window exceeded: {0}")]
    ContextWindowOverflow(String),

    /// The model provider signaled rate limiting (e.g. HTTP 429).
    #[error("model throttled: {0}")]
    ModelThrottled(String),

    /// An interrupt was raised during invocation and is awaiting a
    /// response. Not a failure: callers are expected to catch this,
    /// resolve the named interrupt, and resume the invocation.
    #[error("interrupt {} awaiting response", .0.id)]
    InterruptSignal(Interrupt),

    /// Failure in a `SessionCollaborator` (load/save/list operations).
    #[error("session error: {0}")]
    Session(String),

    /// A raw content block or message failed to parse against the expected
    /// shape. Carries the offending `type` tag (or `"<missing>"`) so callers
    /// can point at exactly what was malformed.
    #[error("invalid content block: {tag}")]
    InvalidContent { tag: String },

    /// The model's stream ended without a `MessageStop` event.
    #[error("stream ended without a terminal MessageStop event")]
    IncompleteStream,

    /// Other errors.
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new API error.
    pub fn api(msg: impl Into<String>) -> Self {
        Error::Api(msg.into())
    }

    /// Create a new stream error.
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Create a new agent configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Create a new invalid tool input error.
    pub fn invalid_tool_input(tool_use_id: impl Into<String>, source: serde_json::Error) -> Self {
        Error::InvalidToolInput {
            tool_use_id: tool_use_id.into(),
            source,
        }
    }

    /// Create a new structured output error.
    pub fn structured_output(msg: impl Into<String>) -> Self {
        Error::StructuredOutputError(msg.into())
    }

    /// Create a new context window overflow error.
    pub fn context_window_overflow(msg: impl Into<String>) -> Self {
        Error::ContextWindowOverflow(msg.into())
    }

    /// Create a new model throttled error.
    pub fn model_throttled(msg: impl Into<String>) -> Self {
        Error::ModelThrottled(msg.into())
    }

    /// Create a new interrupt signal error.
    pub fn interrupt_signal(interrupt: Interrupt) -> Self {
        Error::InterruptSignal(interrupt)
    }

    /// Create a new session error.
    pub fn session(msg: impl Into<String>) -> Self {
        Error::Session(msg.into())
    }

    /// Returns true if this error represents an interrupt awaiting a
    /// response rather than a genuine failure.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Error::InterruptSignal(_))
    }
}
