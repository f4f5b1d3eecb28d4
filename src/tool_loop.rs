//! The tool-execution sub-loop (C6): turns one assistant message full of
//! `toolUse` blocks into a single user message of `toolResult` blocks.
//!
//! Grounded on the teacher's `Client::auto_execute_loop` iteration shape
//! (look up tool by name, run it, catch failures into a result value rather
//! than propagating) generalized with duplicate/empty-block handling,
//! interrupt short-circuiting, and the `cancelTool`/`retry` hook signals the
//! teacher's loop never had.

use crate::error::Error;
use crate::hooks::{AgentEvent, AgentEventKind, HookRegistry};
use crate::interrupt::InterruptState;
use crate::tools::{ToolExecCtx, ToolRegistry, ToolStreamEvent};
use crate::types::{ContentBlock, Interrupt, Message, MessageRole, ToolResultBlock, ToolUseBlock};
use crate::Result;
use futures::stream::{Stream, StreamExt};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Key under which a partially-completed tool loop's results are stashed in
/// [`InterruptState::context`] when it stops early on an interrupt, so a
/// resumed call can pick up where it left off. Shared with `agent.rs`, which
/// writes the other half of the resume bookkeeping (the stalled assistant
/// message).
pub const PARTIAL_RESULTS_CONTEXT_KEY: &str = "partial_tool_results";

/// Result of running the sub-loop to completion (or to an interrupt).
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    /// A user message of `ToolResult` blocks, in `toolUse` order. When
    /// `interrupts` is non-empty this only covers the tool calls that
    /// finished before the loop stopped.
    pub results: Message,
    pub interrupts: Vec<Interrupt>,
}

/// One event surfaced to the agent's stream while the sub-loop runs: either
/// a hook firing or a tool's own progress update. Defined here because
/// `agent.rs`'s `AgentStreamEvent` wraps it verbatim.
#[derive(Debug, Clone)]
pub enum ToolLoopEvent {
    Hook(AgentEventKind),
    ToolProgress {
        tool_use_id: String,
        value: serde_json::Value,
    },
}

/// Runs the sub-loop against `message`'s `toolUse` blocks. Spawns its own
/// driver task so the returned stream can be consumed concurrently with the
/// background work (hook callbacks and tool handlers are arbitrary futures);
/// the oneshot carries the final outcome once the stream is exhausted.
pub fn run_tool_loop(
    message: Message,
    registry: Arc<ToolRegistry>,
    interrupts: Arc<Mutex<InterruptState>>,
    hooks: Arc<HookRegistry>,
) -> (
    Pin<Box<dyn Stream<Item = Result<ToolLoopEvent>> + Send>>,
    oneshot::Receiver<Result<ToolLoopOutcome>>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = drive(message, &registry, &interrupts, &hooks, &event_tx).await;
        let _ = outcome_tx.send(outcome);
    });

    (
        Box::pin(UnboundedReceiverStream::new(event_rx)),
        outcome_rx,
    )
}

type EventSender = mpsc::UnboundedSender<Result<ToolLoopEvent>>;

async fn dispatch(hooks: &HookRegistry, kind: AgentEventKind, tx: &EventSender) -> Result<()> {
    let mut event = AgentEvent::new(kind);
    hooks.invoke(&mut event).await?;
    tx.send(Ok(ToolLoopEvent::Hook(event.kind)))
        .map_err(|_| Error::stream("tool loop event receiver dropped"))
}

fn tool_use_blocks(message: &Message) -> Vec<ToolUseBlock> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse(tool_use) => Some(tool_use.clone()),
            _ => None,
        })
        .collect()
}

fn stashed_partial_results(interrupts: &InterruptState) -> Vec<ContentBlock> {
    interrupts
        .context()
        .get(PARTIAL_RESULTS_CONTEXT_KEY)
        .and_then(|value| serde_json::from_value::<Vec<ToolResultBlock>>(value.clone()).ok())
        .unwrap_or_default()
        .into_iter()
        .map(ContentBlock::ToolResult)
        .collect()
}

fn covered_ids(results: &[ContentBlock]) -> HashSet<String> {
    results
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result.tool_use_id.clone()),
            _ => None,
        })
        .collect()
}

/// Runs one `toolUse` block to completion, handling the
/// `cancelTool`/not-found/retry branching of step 3 of the algorithm.
/// Returns `Ok(None)` if an interrupt stopped execution (already recorded
/// into `collected_interrupts`), `Ok(Some(result))` otherwise.
async fn run_one_tool_call(
    tool_use: &ToolUseBlock,
    registry: &ToolRegistry,
    interrupts: &Arc<Mutex<InterruptState>>,
    hooks: &HookRegistry,
    tx: &EventSender,
    collected_interrupts: &mut Vec<Interrupt>,
) -> Result<Option<ToolResultBlock>> {
    let tool = registry.find(&tool_use.name).cloned();

    loop {
        let mut before_event = AgentEvent::new(AgentEventKind::BeforeToolCall {
            tool_use: tool_use.clone(),
            tool_name: tool_use.name.clone(),
            cancel_tool: None,
        });
        let raised = hooks.invoke(&mut before_event).await?;
        tx.send(Ok(ToolLoopEvent::Hook(before_event.kind.clone())))
            .map_err(|_| Error::stream("tool loop event receiver dropped"))?;

        if !raised.is_empty() {
            collected_interrupts.extend(raised);
            return Ok(None);
        }

        let cancel_tool = match before_event.kind {
            AgentEventKind::BeforeToolCall { cancel_tool, .. } => cancel_tool,
            _ => None,
        };

        let (result, error, was_interrupted) = if let Some(reason) = cancel_tool {
            (
                ToolResultBlock::error(tool_use.tool_use_id.clone(), reason.clone()),
                Some(reason),
                false,
            )
        } else if let Some(tool) = &tool {
            let ctx = ToolExecCtx::new(tool_use.tool_use_id.clone(), interrupts.clone());
            let mut stream = tool.execute_stream(tool_use.input.clone(), ctx);
            let mut final_result = None;
            let mut error_message = None;
            let mut interrupted = false;

            loop {
                match stream.next().await {
                    Some(Ok(ToolStreamEvent::Progress(value))) => {
                        tx.send(Ok(ToolLoopEvent::ToolProgress {
                            tool_use_id: tool_use.tool_use_id.clone(),
                            value,
                        }))
                        .map_err(|_| Error::stream("tool loop event receiver dropped"))?;
                    }
                    Some(Ok(ToolStreamEvent::Result(result))) => {
                        final_result = Some(result);
                        break;
                    }
                    Some(Err(e)) if e.is_interrupt() => {
                        if let Error::InterruptSignal(interrupt) = e {
                            collected_interrupts.push(interrupt);
                        }
                        interrupted = true;
                        break;
                    }
                    Some(Err(e)) => {
                        error_message = Some(e.to_string());
                        break;
                    }
                    None => {
                        error_message = Some("tool stream ended without a result".to_string());
                        break;
                    }
                }
            }

            if interrupted {
                (
                    ToolResultBlock::error(tool_use.tool_use_id.clone(), "interrupted"),
                    None,
                    true,
                )
            } else {
                match final_result {
                    Some(result) => (result, error_message, false),
                    None => {
                        let message =
                            error_message.unwrap_or_else(|| "tool produced no result".to_string());
                        (
                            ToolResultBlock::error(tool_use.tool_use_id.clone(), message.clone()),
                            Some(message),
                            false,
                        )
                    }
                }
            }
        } else {
            let message = format!("Tool '{}' not found in registry", tool_use.name);
            (
                ToolResultBlock::error(tool_use.tool_use_id.clone(), message.clone()),
                Some(message),
                false,
            )
        };

        if was_interrupted {
            return Ok(None);
        }

        let mut after_event = AgentEvent::new(AgentEventKind::AfterToolCall {
            tool_use: tool_use.clone(),
            tool_name: tool_use.name.clone(),
            result: result.clone(),
            error: error.clone(),
            retry: false,
        });
        hooks.invoke(&mut after_event).await?;
        let retry = match &after_event.kind {
            AgentEventKind::AfterToolCall { retry, .. } => *retry,
            _ => false,
        };
        tx.send(Ok(ToolLoopEvent::Hook(after_event.kind)))
            .map_err(|_| Error::stream("tool loop event receiver dropped"))?;

        if retry {
            continue;
        }

        return Ok(Some(result));
    }
}

async fn drive(
    message: Message,
    registry: &ToolRegistry,
    interrupts: &Arc<Mutex<InterruptState>>,
    hooks: &HookRegistry,
    tx: &EventSender,
) -> Result<ToolLoopOutcome> {
    let tool_uses = tool_use_blocks(&message);
    if tool_uses.is_empty() {
        return Err(Error::protocol(
            "assistant message has stop reason toolUse but contains no toolUse blocks",
        ));
    }

    dispatch(
        hooks,
        AgentEventKind::BeforeTools {
            message: message.clone(),
        },
        tx,
    )
    .await?;

    let mut results = {
        let state = interrupts.lock().await;
        stashed_partial_results(&state)
    };
    let covered = covered_ids(&results);

    let mut collected_interrupts = Vec::new();

    for tool_use in tool_uses.iter().filter(|tu| !covered.contains(&tu.tool_use_id)) {
        match run_one_tool_call(tool_use, registry, interrupts, hooks, tx, &mut collected_interrupts)
            .await?
        {
            Some(result) => results.push(ContentBlock::ToolResult(result)),
            None => break,
        }
    }

    if !collected_interrupts.is_empty() {
        return Ok(ToolLoopOutcome {
            results: Message::new(MessageRole::User, results),
            interrupts: collected_interrupts,
        });
    }

    let results_message = Message::new(MessageRole::User, results);

    dispatch(
        hooks,
        AgentEventKind::AfterTools {
            message: results_message.clone(),
        },
        tx,
    )
    .await?;

    Ok(ToolLoopOutcome {
        results: results_message,
        interrupts: Vec::new(),
    })
}
