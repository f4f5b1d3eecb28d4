//! Shared scripted `Model` for integration tests that exercise `Agent`
//! without talking to a real model endpoint.

use futures::stream::Stream;
use open_agent::{ContentBlockStartInfo, ContentDelta, Message, MessageRole, StopReason, StreamEvent};
use open_agent::{Model, ModelOptions, Result};
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays a fixed sequence of responses, one per call to `stream`,
/// repeating the last one once exhausted.
pub struct ScriptedModel {
    scripts: Vec<Vec<Result<StreamEvent>>>,
    call: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|events| events.into_iter().map(Ok).collect())
                .collect(),
            call: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call.load(Ordering::SeqCst)
    }
}

impl Model for ScriptedModel {
    fn stream(
        &self,
        _messages: &[Message],
        _options: &ModelOptions,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
        let idx = self.call.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(idx)
            .or_else(|| self.scripts.last())
            .cloned()
            .unwrap_or_default();
        Box::pin(futures::stream::iter(script))
    }
}

pub fn text_reply(text: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::MessageStart { role: MessageRole::Assistant },
        StreamEvent::ContentBlockStart { index: Some(0), start: None },
        StreamEvent::ContentBlockDelta {
            index: Some(0),
            delta: ContentDelta::TextDelta(text.to_string()),
        },
        StreamEvent::ContentBlockStop { index: Some(0) },
        StreamEvent::MessageStop { stop_reason: StopReason::EndTurn },
    ]
}

pub fn tool_call_reply(tool_use_id: &str, name: &str, input: Value) -> Vec<StreamEvent> {
    vec![
        StreamEvent::MessageStart { role: MessageRole::Assistant },
        StreamEvent::ContentBlockStart {
            index: Some(0),
            start: Some(ContentBlockStartInfo::ToolUseStart {
                name: name.to_string(),
                tool_use_id: tool_use_id.to_string(),
            }),
        },
        StreamEvent::ContentBlockDelta {
            index: Some(0),
            delta: ContentDelta::ToolUseInputDelta(input.to_string()),
        },
        StreamEvent::ContentBlockStop { index: Some(0) },
        StreamEvent::MessageStop { stop_reason: StopReason::ToolUse },
    ]
}
