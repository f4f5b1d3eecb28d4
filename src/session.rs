//! The session-sync collaborator seam (C9).
//!
//! A session collaborator observes an `Agent` from the outside: it is told
//! about every appended message and, after each invocation, handed a full
//! [`SessionSnapshot`] it can persist however it likes. No storage backend
//! ships here — this module defines the contract and the snapshot shape
//! only; a concrete collaborator (a file, a KV store, a database row) is
//! something a caller wires in, the same way `adapters::openai_compat` is the
//! one bundled [`crate::model::Model`] but nothing stops a caller from
//! bringing their own.
//!
//! Snapshots are addressed by `(session_id, scope, snapshot_id)`. A
//! file-backed collaborator, for instance, would lay these out as
//! `{session_id}/{scope}/snapshot_latest.json` plus a
//! `{session_id}/{scope}/snapshot_{NNNNN}.json` per historical revision, but
//! that layout is a convention for implementors, not something this crate
//! enforces.

use crate::types::{InterruptStateSnapshot, Message};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").unwrap())
}

/// A validated session identifier: lowercase ASCII letters, digits,
/// underscores, and hyphens only, so it is always safe to use as a path
/// segment or storage key without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() || !id_pattern().is_match(&id) {
            return Err(crate::Error::config(format!(
                "invalid session id '{id}': must match ^[a-z0-9_-]+$"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated scope within a session (e.g. `"default"`, a sub-agent name).
/// Same character constraints as [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(scope: impl Into<String>) -> crate::Result<Self> {
        let scope = scope.into();
        if scope.is_empty() || !id_pattern().is_match(&scope) {
            return Err(crate::Error::config(format!(
                "invalid scope '{scope}': must match ^[a-z0-9_-]+$"
            )));
        }
        Ok(Self(scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn default_scope() -> Self {
        Self("default".to_string())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current schema version for [`SessionSnapshot`]. Bump whenever the shape
/// changes in a way a collaborator needs to branch on when reading old
/// snapshots back.
pub const SESSION_SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Everything needed to fully restore an `Agent` to the state it was in
/// right after an invocation completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub schema_version: u32,
    pub messages: Vec<Message>,
    pub agent_state: Value,
    pub conversation_manager_state: Value,
    pub interrupt_state: InterruptStateSnapshot,
}

impl SessionSnapshot {
    pub fn new(
        messages: Vec<Message>,
        agent_state: Value,
        conversation_manager_state: Value,
        interrupt_state: InterruptStateSnapshot,
    ) -> Self {
        Self {
            schema_version: SESSION_SNAPSHOT_SCHEMA_VERSION,
            messages,
            agent_state,
            conversation_manager_state,
            interrupt_state,
        }
    }
}

/// Observes `Agent` lifecycle events for session persistence. All methods
/// are synchronous and infallible by design: a collaborator that needs to do
/// I/O should queue the work (e.g. hand it to a background task) rather than
/// block the agent loop or fail an invocation over a storage hiccup.
pub trait SessionCollaborator: Send {
    /// Called once, before the first invocation on a fresh `Agent` begins.
    fn on_agent_initialized(&mut self) {}

    /// Called immediately after a message is appended to history, whether
    /// user-supplied or synthesized internally.
    fn on_message_added(&mut self, message: &Message) {
        let _ = message;
    }

    /// Called once at the end of every invocation (success, interrupt, or
    /// error) with a full snapshot of the resulting state.
    fn on_after_invocation(&mut self, snapshot: SessionSnapshot) {
        let _ = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_accepts_valid_identifiers() {
        assert!(SessionId::new("session-123_abc").is_ok());
    }

    #[test]
    fn test_session_id_rejects_invalid_characters() {
        assert!(SessionId::new("Session 123").is_err());
        assert!(SessionId::new("").is_err());
    }

    #[test]
    fn test_scope_default_is_valid() {
        let scope = Scope::default_scope();
        assert_eq!(scope.as_str(), "default");
    }

    #[test]
    fn test_snapshot_round_trips_through_serde() {
        let snapshot = SessionSnapshot::new(
            vec![Message::user("hi")],
            Value::Null,
            Value::Null,
            InterruptStateSnapshot::default(),
        );
        let json = serde_json::to_value(&snapshot).unwrap();
        let back: SessionSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back.schema_version, SESSION_SNAPSHOT_SCHEMA_VERSION);
        assert_eq!(back.messages.len(), 1);
    }

    struct RecordingCollaborator {
        added: Vec<String>,
        initialized: bool,
        snapshots: usize,
    }

    impl SessionCollaborator for RecordingCollaborator {
        fn on_agent_initialized(&mut self) {
            self.initialized = true;
        }

        fn on_message_added(&mut self, message: &Message) {
            self.added.push(format!("{:?}", message.role));
        }

        fn on_after_invocation(&mut self, _snapshot: SessionSnapshot) {
            self.snapshots += 1;
        }
    }

    #[test]
    fn test_default_trait_methods_are_callable_no_ops() {
        struct Silent;
        impl SessionCollaborator for Silent {}

        let mut silent = Silent;
        silent.on_agent_initialized();
        silent.on_message_added(&Message::user("hi"));
        silent.on_after_invocation(SessionSnapshot::new(
            vec![],
            Value::Null,
            Value::Null,
            InterruptStateSnapshot::default(),
        ));
    }

    #[test]
    fn test_collaborator_records_lifecycle_events() {
        let mut collaborator = RecordingCollaborator {
            added: Vec::new(),
            initialized: false,
            snapshots: 0,
        };
        collaborator.on_agent_initialized();
        collaborator.on_message_added(&Message::user("hi"));
        collaborator.on_after_invocation(SessionSnapshot::new(
            vec![],
            Value::Null,
            Value::Null,
            InterruptStateSnapshot::default(),
        ));

        assert!(collaborator.initialized);
        assert_eq!(collaborator.added, vec!["User".to_string()]);
        assert_eq!(collaborator.snapshots, 1);
    }
}
