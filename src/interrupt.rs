//! Human-in-the-loop interrupt state.
//!
//! An invocation that raises an interrupt does not fail: `Agent::invoke`
//! returns an `AgentResult` carrying the pending `Interrupt`s, the caller
//! collects a decision out of band, and hands it back in via `ResumeArgs` on
//! the next call. `InterruptState` is the bookkeeping that makes replay of
//! that next call idempotent — a tool call that already has a stored
//! response resolves immediately instead of interrupting again.

use crate::error::Error;
use crate::types::{Interrupt, InterruptStateSnapshot};
use std::collections::HashMap;

/// Responses supplied by the caller when resuming an invocation that
/// previously raised interrupts.
#[derive(Debug, Clone, Default)]
pub struct ResumeArgs {
    /// Maps interrupt id to the value the caller is resolving it with.
    pub responses: HashMap<String, serde_json::Value>,
}

impl ResumeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, interrupt_id: impl Into<String>, response: serde_json::Value) -> Self {
        self.responses.insert(interrupt_id.into(), response);
        self
    }
}

/// Tracks interrupts raised during an invocation and their resolutions
/// across `stream`/`invoke` calls on the same `Agent`.
#[derive(Debug, Clone, Default)]
pub struct InterruptState {
    interrupts: HashMap<String, Interrupt>,
    context: serde_json::Map<String, serde_json::Value>,
    activated: bool,
}

impl InterruptState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: InterruptStateSnapshot) -> Self {
        Self {
            interrupts: snapshot.interrupts,
            context: snapshot.context,
            activated: snapshot.activated,
        }
    }

    pub fn to_snapshot(&self) -> InterruptStateSnapshot {
        InterruptStateSnapshot {
            interrupts: self.interrupts.clone(),
            context: self.context.clone(),
            activated: self.activated,
        }
    }

    /// Marks this invocation as one that is resuming from a prior interrupt.
    /// Until `deactivate` runs, every `interrupt()` call checks `responses`
    /// for a match before raising again.
    pub fn activate(&mut self) {
        self.activated = true;
    }

    /// Clears the resume flag once the invocation has fully drained any
    /// interrupts it was resuming.
    pub fn deactivate(&mut self) {
        self.activated = false;
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Applies resume responses supplied by the caller, storing each against
    /// its interrupt id so a matching `interrupt()` call resolves instead of
    /// raising.
    pub fn resume(&mut self, args: &ResumeArgs) {
        self.activate();
        for (id, response) in &args.responses {
            let entry = self
                .interrupts
                .entry(id.clone())
                .or_insert_with(|| Interrupt::with_id(id.clone(), String::new(), None, None));
            entry.response = Some(response.clone());
        }
    }

    /// A scratch area hooks and tools can use to stash state across an
    /// interrupt/resume round trip (e.g. partial progress on a long-running
    /// tool call).
    pub fn context(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        &mut self.context
    }

    /// Raises (or resolves) an interrupt anchored to `tool_use_id` and
    /// `name`. If a response was previously stored for this interrupt's
    /// deterministic id, returns it immediately. Otherwise records the
    /// interrupt and fails with `Error::InterruptSignal` so the tool loop can
    /// short-circuit and surface it to the caller.
    pub fn interrupt(
        &mut self,
        tool_use_id: &str,
        name: &str,
        reason: impl Into<String>,
    ) -> crate::Result<serde_json::Value> {
        let id = Interrupt::derive_id(tool_use_id, name);

        if let Some(existing) = self.interrupts.get(&id) {
            if let Some(response) = existing.response.clone() {
                return Ok(response);
            }
        }

        let interrupt = Interrupt::with_id(id.clone(), name, Some(reason.into()), None);
        self.interrupts.insert(id, interrupt.clone());
        Err(Error::interrupt_signal(interrupt))
    }

    /// All interrupts raised so far that have not yet been resolved with a
    /// response.
    pub fn pending(&self) -> Vec<&Interrupt> {
        self.interrupts
            .values()
            .filter(|i| i.response.is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_raises_signal_on_first_call() {
        let mut state = InterruptState::new();
        let err = state
            .interrupt("call_1", "approval", "needs human review")
            .unwrap_err();
        assert!(err.is_interrupt());
        assert_eq!(state.pending().len(), 1);
    }

    #[test]
    fn test_interrupt_resolves_after_resume() {
        let mut state = InterruptState::new();
        let first = state.interrupt("call_1", "approval", "needs review");
        assert!(first.is_err());

        let id = Interrupt::derive_id("call_1", "approval");
        let args = ResumeArgs::new().respond(id, serde_json::json!({"approved": true}));
        state.resume(&args);

        let resolved = state
            .interrupt("call_1", "approval", "needs review")
            .unwrap();
        assert_eq!(resolved, serde_json::json!({"approved": true}));
        assert!(state.pending().is_empty());
    }

    #[test]
    fn test_interrupt_is_idempotent_across_replays() {
        let mut state = InterruptState::new();
        let _ = state.interrupt("call_1", "approval", "needs review");
        let _ = state.interrupt("call_1", "approval", "needs review");

        assert_eq!(state.pending().len(), 1);
    }

    #[test]
    fn test_snapshot_round_trip_preserves_state() {
        let mut state = InterruptState::new();
        let _ = state.interrupt("call_1", "approval", "needs review");
        state.activate();

        let snapshot = state.to_snapshot();
        let restored = InterruptState::from_snapshot(snapshot);

        assert!(restored.is_activated());
        assert_eq!(restored.pending().len(), 1);
    }

    #[test]
    fn test_context_is_mutable_scratch_space() {
        let mut state = InterruptState::new();
        state
            .context_mut()
            .insert("progress".to_string(), serde_json::json!(3));
        assert_eq!(state.context().get("progress"), Some(&serde_json::json!(3)));
    }
}
