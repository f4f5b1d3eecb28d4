//! # Open Agent SDK - Rust Implementation
//!
//! A production-ready, streaming-first Rust SDK for building AI agent runtimes
//! on top of local OpenAI-compatible servers.
//!
//! ## Overview
//!
//! This SDK provides the event-loop core an agent needs: a pluggable
//! [`Model`] trait for talking to whatever inference backend you like (a
//! bundled [`adapters::openai_compat`] adapter covers LM Studio, Ollama,
//! llama.cpp, and vLLM out of the box), a [`tools::ToolRegistry`] for
//! defining and executing tools with automatic JSON schema generation, a
//! [`hooks::HookRegistry`] for intercepting execution at well-defined points,
//! an [`interrupt::InterruptState`] machine for human-in-the-loop approval
//! flows, and a [`conversation::ConversationManager`] /
//! [`session::SessionCollaborator`] pair of seams for managing history and
//! persisting it across process restarts.
//!
//! ## Key Features
//!
//! - **Streaming-first**: every model call, tool call, and hook fires
//!   incremental events before the invocation resolves.
//! - **Tool Calling**: define tools with automatic schema generation and run
//!   them through a sub-loop that understands cancellation, retries, and
//!   interrupts.
//! - **Lifecycle Hooks**: intercept execution at eleven points, from
//!   `BeforeInvocation` through `AfterInvocation`.
//! - **Interrupts**: any tool call can suspend an invocation pending a human
//!   response, resumable by id.
//! - **Conversation & session management**: windowed history trimming with
//!   automatic tool-pairing repair, plus a snapshot format a caller can
//!   persist anywhere.
//! - **Retry Logic**: exponential backoff with jitter for transient model
//!   errors.
//!
//! ## Example
//!
//! ```rust,no_run
//! use open_agent::{Agent, AgentOptions, InvokeOptions};
//! use open_agent::adapters::openai_compat::{OpenAiCompatConfig, OpenAiCompatModel};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OpenAiCompatConfig::builder()
//!         .base_url("http://localhost:1234/v1")
//!         .model("qwen2.5-32b-instruct")
//!         .build()?;
//!     let model = Arc::new(OpenAiCompatModel::new(config)?);
//!
//!     let options = AgentOptions::builder()
//!         .system_prompt("You are a helpful assistant")
//!         .build()?;
//!
//!     let agent = Agent::new(model, options)?;
//!     let result = agent.invoke("What's the capital of France?", InvokeOptions::default()).await?;
//!     println!("{:?}", result.last_message);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **agent**: the event-loop orchestrator tying every other module together.
//! - **model**: the `Model` trait adapters implement to plug in an inference
//!   backend.
//! - **adapters::openai_compat**: the bundled OpenAI-compatible `Model`.
//! - **types**: messages, content blocks, and agent configuration.
//! - **tools**: tool definition and execution, with automatic schema
//!   generation.
//! - **tool_loop**: the sub-loop that drives a `toolUse` message's calls to
//!   completion.
//! - **hooks**: the lifecycle event system.
//! - **interrupt**: human-in-the-loop state machine.
//! - **conversation**: history windowing and repair.
//! - **session**: snapshotting and restoring agent state across restarts.
//! - **config**: provider-specific configuration helpers.
//! - **error**: the crate's error type and conversions.
//! - **retry**: exponential backoff retry logic with jitter.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// The event-loop orchestrator: `Agent`, invocation arguments/options,
/// results, and the streaming handle an invocation returns.
mod agent;

/// Adapters implementing the `Model` trait against concrete inference
/// backends.
pub mod adapters;

/// Provider configuration helpers for LM Studio, Ollama, llama.cpp, and vLLM.
mod config;

/// The conversation manager seam: history windowing and tool-pairing repair.
mod conversation;

/// Error types and conversions used across all public APIs.
mod error;

/// Lifecycle hooks system for intercepting and controlling execution at key
/// points.
mod hooks;

/// Human-in-the-loop interrupt bookkeeping: raising, idempotent resume, and
/// session-snapshot round-tripping.
mod interrupt;

/// The `Model` trait and the options passed to it on every call.
mod model;

/// Consumes a model's incremental stream events and synthesizes complete
/// content blocks and a complete message.
mod aggregator;

/// The session-sync collaborator seam: snapshotting and restoring agent
/// state.
mod session;

/// Tool definition and execution system with automatic JSON schema
/// generation.
mod tools;

/// Drives a `toolUse` message's tool calls to completion.
mod tool_loop;

/// Core type definitions for messages, content blocks, and agent
/// configuration.
mod types;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Retry utilities with exponential backoff and jitter. Public as a module so
/// callers can reuse the same backoff policy for their own retriable work.
pub mod retry;

// --- Agent event loop ---

pub use agent::{
    Agent, AgentResult, AgentStopReason, AgentStreamEvent, AgentStream, InvocationMetrics,
    InvokeArgs, InvokeOptions, StateHandle, ToolSource,
};

// --- Model adapter contract ---

pub use model::{Model, ModelOptions, SystemPrompt, ToolChoice, ToolSpec};

// --- Provider Configuration ---

pub use config::{get_base_url, get_model, Provider};

// --- Conversation & Session Management ---

pub use conversation::{estimate_tokens, ConversationManager, WindowedConversationManager};
pub use session::{
    Scope, SessionCollaborator, SessionId, SessionSnapshot, SESSION_SNAPSHOT_SCHEMA_VERSION,
};

// --- Error Handling ---

pub use error::{Error, Result};

// --- Lifecycle Hooks ---

pub use hooks::{AgentEvent, AgentEventKind, HookCallback, HookPoint, HookRegistry};

// --- Interrupts ---

pub use interrupt::{InterruptState, ResumeArgs};

// --- Tool System ---

pub use tool_loop::{ToolLoopEvent, ToolLoopOutcome};
pub use tools::{
    tool, Tool, ToolBuilder, ToolExecCtx, ToolRegistry, ToolStreamEvent, STRUCTURED_OUTPUT_TOOL_NAME,
};

// --- Core Types ---

pub use types::{
    AgentOptions, AgentOptionsBuilder, AgentState, BaseUrl, ContentBlock, ContentBlockStartInfo,
    ContentDelta, ImageBlock, ImageDetail, Interrupt, InterruptStateSnapshot, Message,
    MessageRole, Metrics, ModelName, ReasoningBlock, StopReason, StreamEvent, Temperature,
    TextBlock, ToolResultBlock, ToolResultContent, ToolResultStatus, ToolUseBlock, Usage,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module bundling the most commonly used types and functions.
/// Import with `use open_agent::prelude::*;` for typical agent-building
/// usage.
pub mod prelude {
    pub use crate::{
        tool, Agent, AgentOptions, AgentOptionsBuilder, AgentResult, AgentStopReason,
        AgentStreamEvent, ContentBlock, Error, HookPoint, HookRegistry, InvokeArgs,
        InvokeOptions, Message, Model, ModelOptions, Result, Tool, ToolRegistry, ToolResultBlock,
        ToolUseBlock,
    };
}
