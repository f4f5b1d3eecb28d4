//! Lifecycle hook dispatch.
//!
//! Hooks observe and steer an [`crate::agent::Agent`] invocation at eleven
//! named points. Unlike the three fixed `Vec<Handler>` fields this module
//! used to have (one each for pre-tool-use, post-tool-use, and
//! prompt-submission), callbacks are now registered against an
//! [`AgentEventKind`] discriminant in a single [`HookRegistry`], and the
//! event each callback receives carries mutable `retry`/`cancel_tool` fields
//! so a hook can steer execution rather than merely observe it.

use crate::types::{Interrupt, Message, StopReason, StreamEvent, ToolResultBlock, ToolUseBlock};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Which point in the invocation lifecycle an [`AgentEvent`] represents.
///
/// Kept separate from [`AgentEventKind`] so it can serve as a plain,
/// `Hash`-able registry key without forcing every registration call to
/// construct a throwaway event value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeInvocation,
    BeforeModelCall,
    AfterModelCall,
    BeforeTools,
    BeforeToolCall,
    AfterToolCall,
    AfterTools,
    MessageAdded,
    AfterInvocation,
    ModelStreamEvent,
    AgentInitialized,
}

/// The payload carried by an [`AgentEvent`] at each lifecycle point.
#[derive(Debug, Clone)]
pub enum AgentEventKind {
    /// Fired once, before the first model call of an invocation.
    BeforeInvocation,

    /// Fired immediately before each model call. `retry` lets a hook force
    /// another pass (e.g. after adjusting `invocation_state`) once the
    /// current model call completes instead of advancing the loop.
    BeforeModelCall { retry: bool },

    /// Fired once the model's stream has been fully aggregated.
    AfterModelCall {
        message: Message,
        stop_reason: StopReason,
        retry: bool,
    },

    /// Fired before the tool sub-loop begins executing an assistant
    /// message's tool calls.
    BeforeTools { message: Message },

    /// Fired immediately before one tool call executes. Setting
    /// `cancel_tool` to `Some(reason)` skips execution and synthesizes an
    /// error `ToolResult` carrying `reason` instead.
    BeforeToolCall {
        tool_use: ToolUseBlock,
        tool_name: String,
        cancel_tool: Option<String>,
    },

    /// Fired after one tool call finishes (successfully or not). Setting
    /// `retry` to `true` re-executes the same tool call.
    AfterToolCall {
        tool_use: ToolUseBlock,
        tool_name: String,
        result: ToolResultBlock,
        error: Option<String>,
        retry: bool,
    },

    /// Fired once every tool call in a message has been resolved.
    AfterTools { message: Message },

    /// Fired whenever a message (of any role) is appended to the
    /// conversation.
    MessageAdded { message: Message },

    /// Fired once, after the invocation's final result is ready.
    AfterInvocation,

    /// Fired for every raw event a `Model` adapter emits, before
    /// aggregation. Useful for low-level tracing.
    ModelStreamEvent { event: StreamEvent },

    /// Fired once, when the owning `Agent` is constructed.
    AgentInitialized,
}

impl AgentEventKind {
    pub fn point(&self) -> HookPoint {
        match self {
            AgentEventKind::BeforeInvocation => HookPoint::BeforeInvocation,
            AgentEventKind::BeforeModelCall { .. } => HookPoint::BeforeModelCall,
            AgentEventKind::AfterModelCall { .. } => HookPoint::AfterModelCall,
            AgentEventKind::BeforeTools { .. } => HookPoint::BeforeTools,
            AgentEventKind::BeforeToolCall { .. } => HookPoint::BeforeToolCall,
            AgentEventKind::AfterToolCall { .. } => HookPoint::AfterToolCall,
            AgentEventKind::AfterTools { .. } => HookPoint::AfterTools,
            AgentEventKind::MessageAdded { .. } => HookPoint::MessageAdded,
            AgentEventKind::AfterInvocation => HookPoint::AfterInvocation,
            AgentEventKind::ModelStreamEvent { .. } => HookPoint::ModelStreamEvent,
            AgentEventKind::AgentInitialized => HookPoint::AgentInitialized,
        }
    }
}

/// A single dispatched hook event: the lifecycle payload plus a sink for any
/// interrupts the callback wants to raise.
#[derive(Debug, Clone)]
pub struct AgentEvent {
    pub kind: AgentEventKind,
    interrupts: Vec<Interrupt>,
}

impl AgentEvent {
    pub fn new(kind: AgentEventKind) -> Self {
        Self {
            kind,
            interrupts: Vec::new(),
        }
    }

    /// Raises an interrupt from within a hook callback. Collected by
    /// [`HookRegistry::invoke`] and returned to the caller once every
    /// callback for this event has run.
    pub fn interrupt(&mut self, interrupt: Interrupt) {
        self.interrupts.push(interrupt);
    }

    fn take_interrupts(&mut self) -> Vec<Interrupt> {
        std::mem::take(&mut self.interrupts)
    }
}

/// Type alias for a registered hook callback.
pub type HookCallback =
    Arc<dyn Fn(&mut AgentEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Ordered, awaited dispatch of callbacks registered against a [`HookPoint`].
#[derive(Clone, Default)]
pub struct HookRegistry {
    callbacks: HashMap<HookPoint, Vec<HookCallback>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` to run every time an event at `point` is
    /// dispatched, in registration order.
    pub fn add_callback<F, Fut>(&mut self, point: HookPoint, callback: F)
    where
        F: Fn(&mut AgentEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks
            .entry(point)
            .or_default()
            .push(Arc::new(move |event| Box::pin(callback(event))));
    }

    /// Fluent variant of [`Self::add_callback`] for building a registry
    /// inline while constructing `AgentOptions`.
    pub fn on<F, Fut>(mut self, point: HookPoint, callback: F) -> Self
    where
        F: Fn(&mut AgentEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_callback(point, callback);
        self
    }

    /// Runs every callback registered for `event`'s point, in order,
    /// awaiting each before starting the next. Returns any interrupts
    /// callbacks raised via [`AgentEvent::interrupt`].
    pub async fn invoke(&self, event: &mut AgentEvent) -> crate::Result<Vec<Interrupt>> {
        let point = event.kind.point();
        if let Some(handlers) = self.callbacks.get(&point) {
            for handler in handlers {
                handler(event).await;
            }
        }
        Ok(event.take_interrupts())
    }

    /// Number of callbacks registered for `point`, mostly useful in tests.
    pub fn len(&self, point: HookPoint) -> usize {
        self.callbacks.get(&point).map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.values().all(|v| v.is_empty())
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut total = 0usize;
        for handlers in self.callbacks.values() {
            total += handlers.len();
        }
        f.debug_struct("HookRegistry")
            .field("callbacks", &format!("{} handlers", total))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolResultBlock, ToolUseBlock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_invoke_runs_registered_callbacks_in_order() {
        let mut registry = HookRegistry::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let order1 = order.clone();
        registry.add_callback(HookPoint::BeforeInvocation, move |_event| {
            let order1 = order1.clone();
            async move {
                order1.lock().unwrap().push(1);
            }
        });

        let order2 = order.clone();
        registry.add_callback(HookPoint::BeforeInvocation, move |_event| {
            let order2 = order2.clone();
            async move {
                order2.lock().unwrap().push(2);
            }
        });

        let mut event = AgentEvent::new(AgentEventKind::BeforeInvocation);
        registry.invoke(&mut event).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cancel_tool_signal_is_mutated_and_observed() {
        let mut registry = HookRegistry::new();
        registry.add_callback(HookPoint::BeforeToolCall, |event| async move {
            if let AgentEventKind::BeforeToolCall {
                tool_name,
                cancel_tool,
                ..
            } = &mut event.kind
            {
                if tool_name == "dangerous" {
                    *cancel_tool = Some("blocked by policy".to_string());
                }
            }
        });

        let mut event = AgentEvent::new(AgentEventKind::BeforeToolCall {
            tool_use: ToolUseBlock::new("call_1", "dangerous", serde_json::json!({})),
            tool_name: "dangerous".to_string(),
            cancel_tool: None,
        });

        registry.invoke(&mut event).await.unwrap();

        match event.kind {
            AgentEventKind::BeforeToolCall { cancel_tool, .. } => {
                assert_eq!(cancel_tool, Some("blocked by policy".to_string()));
            }
            _ => panic!("expected BeforeToolCall"),
        }
    }

    #[tokio::test]
    async fn test_interrupt_raised_from_hook_is_returned() {
        let mut registry = HookRegistry::new();
        registry.add_callback(HookPoint::BeforeToolCall, |event| async move {
            event.interrupt(Interrupt::new("approval", "needs human review", None));
        });

        let mut event = AgentEvent::new(AgentEventKind::BeforeToolCall {
            tool_use: ToolUseBlock::new("call_1", "delete_file", serde_json::json!({})),
            tool_name: "delete_file".to_string(),
            cancel_tool: None,
        });

        let interrupts = registry.invoke(&mut event).await.unwrap();
        assert_eq!(interrupts.len(), 1);
        assert_eq!(interrupts[0].name, "approval");
    }

    #[tokio::test]
    async fn test_retry_signal_on_after_tool_call() {
        let mut registry = HookRegistry::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        registry.add_callback(HookPoint::AfterToolCall, move |event| {
            let attempts_clone = attempts_clone.clone();
            async move {
                if let AgentEventKind::AfterToolCall { retry, error, .. } = &mut event.kind {
                    if error.is_some() && attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                        *retry = true;
                    }
                }
            }
        });

        let mut event = AgentEvent::new(AgentEventKind::AfterToolCall {
            tool_use: ToolUseBlock::new("call_1", "flaky", serde_json::json!({})),
            tool_name: "flaky".to_string(),
            result: ToolResultBlock::error("call_1", "timed out"),
            error: Some("timed out".to_string()),
            retry: false,
        });

        registry.invoke(&mut event).await.unwrap();

        match event.kind {
            AgentEventKind::AfterToolCall { retry, .. } => assert!(retry),
            _ => panic!("expected AfterToolCall"),
        }
    }

    #[test]
    fn test_registry_len_and_is_empty() {
        let registry = HookRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(HookPoint::BeforeInvocation), 0);
    }
}
