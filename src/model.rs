//! The `Model` capability contract (C10).
//!
//! This is the seam between the agent event loop and whatever actually talks
//! to a language model. The core (`agent.rs`, `aggregator.rs`, `tool_loop.rs`)
//! only ever sees [`StreamEvent`](crate::types::StreamEvent)s coming out of
//! [`Model::stream`] — no vendor wire format crosses this boundary. The one
//! adapter this crate ships, [`crate::adapters::openai_compat::OpenAiCompatModel`],
//! lives in its own module precisely so the core never has to know it exists.

use crate::types::{ContentBlock, Message, StreamEvent};
use crate::Result;
use futures::stream::Stream;
use std::pin::Pin;

/// A system prompt: either a flat string or an ordered list of content
/// blocks (so a provider's cache markers can be interleaved with system
/// text). Passed through unchanged in meaning; the adapter decides how to
/// render it on the wire.
#[derive(Debug, Clone)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl SystemPrompt {
    pub fn text(prompt: impl Into<String>) -> Self {
        SystemPrompt::Text(prompt.into())
    }
}

/// One tool's capability description, as handed to a model. Ordering in
/// `ModelOptions::tool_specs` is preserved end to end.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Which tool(s) the model is permitted or required to call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call a tool at all.
    Auto,
    /// The model must call some tool, but may pick which.
    Any,
    /// The model must call exactly this tool. Used to force structured
    /// output (`agent.rs`'s forcing cycle).
    Specific(String),
}

/// Per-call configuration handed to [`Model::stream`]. Provider-neutral:
/// nothing here names an HTTP endpoint, an API key, or a sampling parameter,
/// because those are transport details that belong to the adapter's own
/// config type (e.g. `adapters::openai_compat::OpenAiCompatConfig`).
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub system_prompt: Option<SystemPrompt>,
    pub tool_specs: Vec<ToolSpec>,
    pub tool_choice: Option<ToolChoice>,
}

/// The capability the agent event loop drives: stream a model's response to
/// `messages` given `options`, terminating after exactly one `MessageStop`.
///
/// Implementors MUST signal the two distinguished failure modes the core
/// knows how to react to — `Error::ContextWindowOverflow` when the input is
/// too large, `Error::ModelThrottled` when rate-limited — rather than folding
/// them into a generic error, so callers can branch on them. Everything else
/// propagates as-is; the core never inspects vendor-specific fields.
pub trait Model: Send + Sync {
    fn stream(
        &self,
        messages: &[Message],
        options: &ModelOptions,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;
}
