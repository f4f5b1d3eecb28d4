//! The conversation manager seam (C8).
//!
//! `Agent` never trims or rewrites history itself; every message it appends
//! is handed to a [`ConversationManager`] immediately afterward, and the
//! manager decides whether to mutate the history in place (drop, summarize,
//! reorder). The default, [`WindowedConversationManager`], evolved from the
//! character-based token estimator `context.rs` used to expose as manual
//! opt-in helpers — here it is wired in automatically and repairs any
//! tool-call pairing a window cut breaks.

use crate::types::{ContentBlock, Message, MessageRole, ToolResultBlock};
use serde_json::Value;

/// Hooks into history mutation and session persistence.
///
/// `on_message_added` runs after every message is appended to `Agent`'s
/// history (including ones synthesized internally, like a forced structured
/// output request). `get_state`/`restore_from_session` round-trip whatever
/// internal bookkeeping the manager needs (e.g. a running token estimate)
/// through a `SessionCollaborator` snapshot.
pub trait ConversationManager: Send {
    /// Called after `history` gains a new message. May truncate, reorder, or
    /// otherwise rewrite `history` in place.
    fn on_message_added(&mut self, history: &mut Vec<Message>);

    /// Opaque state to persist alongside a session snapshot.
    fn get_state(&self) -> Value;

    /// Restores internal state from a prior snapshot and returns the history
    /// this manager wants to start from (usually just the session's stored
    /// messages, but a manager is free to re-window them immediately).
    fn restore_from_session(&mut self, state: Value) -> Vec<Message>;
}

/// Character-based token estimate: ~1 token per 4 characters. Conservative
/// across model families; always carries a safety margin rather than
/// claiming per-tokenizer accuracy.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    if messages.is_empty() {
        return 0;
    }

    let mut total_chars = 0;
    for message in messages {
        total_chars += 8; // role formatting overhead
        for block in &message.content {
            match block {
                ContentBlock::Text(text) => total_chars += text.text.len(),
                ContentBlock::ToolUse(tool) => {
                    total_chars += tool.name.len();
                    total_chars += tool.tool_use_id.len();
                    total_chars += tool.input.to_string().len();
                }
                ContentBlock::ToolResult(result) => {
                    total_chars += result.tool_use_id.len();
                    total_chars += result.content.len() * 32;
                }
                ContentBlock::Reasoning(reasoning) => {
                    total_chars += reasoning.text.as_deref().map(str::len).unwrap_or(0);
                }
                ContentBlock::Image(_) => total_chars += 256,
            }
        }
    }
    total_chars += 16; // conversation-level overhead
    (total_chars + 3) / 4
}

/// A window-trimming [`ConversationManager`] that keeps the system prompt (if
/// present) and the most recent messages under an estimated token budget,
/// repairing any tool call/result pairing the cut would otherwise break.
///
/// Trimming never splits a `ToolUse` message from its `ToolResult`: if the cut
/// point would strand a tool call without its result (or vice versa), the
/// boundary is pulled back to the nearest point where every `ToolUse` id
/// still present has a matching `ToolResult`, and any `ToolUse` left
/// unanswered at the very start of the kept window gets a synthesized
/// `ToolResult` of `status: Error`, text `"trimmed from history"`, so the
/// next model call never sees a dangling tool call.
#[derive(Debug, Clone)]
pub struct WindowedConversationManager {
    token_limit: usize,
    margin: f32,
    min_keep: usize,
}

impl Default for WindowedConversationManager {
    fn default() -> Self {
        Self {
            token_limit: 32_000,
            margin: 0.9,
            min_keep: 4,
        }
    }
}

impl WindowedConversationManager {
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit,
            ..Default::default()
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_min_keep(mut self, min_keep: usize) -> Self {
        self.min_keep = min_keep;
        self
    }

    fn is_approaching_limit(&self, messages: &[Message]) -> bool {
        let estimated = estimate_tokens(messages);
        let threshold = (self.token_limit as f32 * self.margin) as usize;
        estimated > threshold
    }

    fn window(&self, messages: &[Message]) -> Vec<Message> {
        if messages.is_empty() {
            return Vec::new();
        }

        let has_system = messages[0].role == MessageRole::System;
        let head = if has_system { 1 } else { 0 };

        // Shrink the kept tail until the window fits, never below min_keep.
        let mut keep = messages.len() - head;
        loop {
            let start = messages.len() - keep;
            let candidate = self.assemble(messages, has_system, start);
            if !self.is_approaching_limit(&candidate) || keep <= self.min_keep {
                return candidate;
            }
            keep -= 1;
        }
    }

    fn assemble(&self, messages: &[Message], has_system: bool, start: usize) -> Vec<Message> {
        let mut result = Vec::new();
        if has_system {
            result.push(messages[0].clone());
        }
        let start = start.max(if has_system { 1 } else { 0 });
        result.extend_from_slice(&messages[start..]);
        repair_tool_pairing(result)
    }
}

/// Walks `messages` and synthesizes an error `ToolResult` for every `ToolUse`
/// id that has no matching result anywhere later in the list.
fn repair_tool_pairing(messages: Vec<Message>) -> Vec<Message> {
    let answered: std::collections::HashSet<&str> = messages
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result.tool_use_id.as_str()),
            _ => None,
        })
        .collect();

    let mut result = Vec::with_capacity(messages.len());
    for message in messages {
        result.push(message.clone());
        if message.role != MessageRole::Assistant {
            continue;
        }
        let orphaned: Vec<String> = message
            .tool_use_ids()
            .into_iter()
            .filter(|id| !answered.contains(id))
            .map(str::to_string)
            .collect();
        if !orphaned.is_empty() {
            let content = orphaned
                .into_iter()
                .map(|id| ContentBlock::ToolResult(ToolResultBlock::error(id, "trimmed from history")))
                .collect();
            result.push(Message::new(MessageRole::User, content));
        }
    }
    result
}

impl ConversationManager for WindowedConversationManager {
    fn on_message_added(&mut self, history: &mut Vec<Message>) {
        if self.is_approaching_limit(history) {
            *history = self.window(history);
        }
    }

    fn get_state(&self) -> Value {
        serde_json::json!({
            "tokenLimit": self.token_limit,
            "margin": self.margin,
            "minKeep": self.min_keep,
        })
    }

    fn restore_from_session(&mut self, state: Value) -> Vec<Message> {
        if let Some(limit) = state.get("tokenLimit").and_then(Value::as_u64) {
            self.token_limit = limit as usize;
        }
        if let Some(margin) = state.get("margin").and_then(Value::as_f64) {
            self.margin = margin as f32;
        }
        if let Some(min_keep) = state.get("minKeep").and_then(Value::as_u64) {
            self.min_keep = min_keep as usize;
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolResultBlock, ToolUseBlock};

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(&[]), 0);
    }

    #[test]
    fn test_estimate_tokens_grows_with_content() {
        let short = vec![Message::user("hi")];
        let long = vec![Message::user("x".repeat(1000))];
        assert!(estimate_tokens(&long) > estimate_tokens(&short));
    }

    #[test]
    fn test_windowed_manager_keeps_system_prompt() {
        let mut manager = WindowedConversationManager::new(200).with_min_keep(1);
        let mut history = vec![Message::system("be helpful")];
        for i in 0..50 {
            history.push(Message::user(format!("message number {i} padded out a fair bit")));
        }
        manager.on_message_added(&mut history);
        assert_eq!(history[0].role, MessageRole::System);
        assert!(history.len() < 51);
    }

    #[test]
    fn test_windowed_manager_repairs_dangling_tool_call() {
        let manager = WindowedConversationManager::new(usize::MAX);
        let messages = vec![
            Message::user("search for rust"),
            Message::new(
                MessageRole::Assistant,
                vec![ContentBlock::ToolUse(ToolUseBlock::new(
                    "call_1",
                    "search",
                    serde_json::json!({}),
                ))],
            ),
        ];
        // Window starting at index 1 strands call_1's ToolUse without its result.
        let windowed = manager.assemble(&messages, false, 1);
        let has_synthetic_result = windowed.iter().any(|m| {
            m.content.iter().any(|b| match b {
                ContentBlock::ToolResult(r) => r.tool_use_id == "call_1" && r.is_error(),
                _ => false,
            })
        });
        assert!(has_synthetic_result);
    }

    #[test]
    fn test_windowed_manager_leaves_paired_tool_calls_alone() {
        let manager = WindowedConversationManager::new(usize::MAX);
        let messages = vec![
            Message::new(
                MessageRole::Assistant,
                vec![ContentBlock::ToolUse(ToolUseBlock::new(
                    "call_1",
                    "search",
                    serde_json::json!({}),
                ))],
            ),
            Message::new(
                MessageRole::User,
                vec![ContentBlock::ToolResult(ToolResultBlock::success(
                    "call_1",
                    serde_json::json!({"ok": true}),
                ))],
            ),
        ];
        let windowed = manager.assemble(&messages, false, 0);
        assert_eq!(windowed.len(), 2);
    }

    #[test]
    fn test_get_state_round_trips_through_restore() {
        let manager = WindowedConversationManager::new(5000).with_margin(0.8).with_min_keep(2);
        let state = manager.get_state();

        let mut restored = WindowedConversationManager::default();
        restored.restore_from_session(state);
        assert_eq!(restored.token_limit, 5000);
        assert_eq!(restored.min_keep, 2);
    }
}
