//! The `Event` record itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of event kinds the reducer knows how to fold, plus an
/// escape hatch for wire tags this binary was not built to understand.
///
/// The REDESIGN applied here (see `SPEC_FULL.md`) closes what the original
/// engine modeled as an open string-keyed dispatch table into an exhaustively
/// matchable enum, while keeping the wire representation (`Event::event_type`)
/// an ordinary string so existing logs and cross-version readers are
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A Kubernetes-style agent object was observed by the adapter.
    AgentObserved,
    /// The decision layer recorded the actions it derived from a trigger.
    ActionsDecided,
    /// The executor successfully applied an action.
    ActionApplied,
    /// The executor failed to apply an action.
    ActionFailed,
    /// Any wire tag not listed above. Lenient replay and the verifier can
    /// still process events carrying this kind; strict replay rejects them.
    Unknown(String),
}

impl EventKind {
    /// Parse the wire tag used on `Event::event_type`.
    pub fn from_wire(tag: &str) -> Self {
        match tag {
            "AgentObserved" => EventKind::AgentObserved,
            "ActionsDecided" => EventKind::ActionsDecided,
            "ActionApplied" => EventKind::ActionApplied,
            "ActionFailed" => EventKind::ActionFailed,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    /// Render the wire tag for this kind, the inverse of [`EventKind::from_wire`].
    pub fn as_wire(&self) -> &str {
        match self {
            EventKind::AgentObserved => "AgentObserved",
            EventKind::ActionsDecided => "ActionsDecided",
            EventKind::ActionApplied => "ActionApplied",
            EventKind::ActionFailed => "ActionFailed",
            EventKind::Unknown(tag) => tag.as_str(),
        }
    }
}

/// Errors raised by operations on an [`Event`] itself (not by the store or
/// the hash chain, which have their own error types).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventsError {
    /// [`Event::require_seq`] was called on an event the store has not yet
    /// assigned a sequence number to.
    #[error("event has not been assigned a sequence number")]
    MissingSeq,
}

/// A single record in the append-only log.
///
/// `seq` and `ts` are only known once the store has accepted the event
/// (`seq` is assigned by the store; `ts` is stamped by the deterministic
/// clock at the moment the adapter built the event). Events under
/// construction by the adapter/decision layer carry `seq: None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Wire event-kind tag, e.g. `"AgentObserved"`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// The aggregate this event belongs to (`"{namespace}/{name}"`, or the
    /// reducer's global aggregate id for log-wide events).
    pub aggregate_id: String,
    /// Logical timestamp from the deterministic clock, never wall-clock.
    pub ts: i64,
    /// Event-kind-specific payload. Kept as a `Value` so the hash chain is
    /// representation-agnostic; typed payload structs in downstream crates
    /// build this via `serde_json::to_value`.
    pub payload: Value,
    /// Optional metadata (writer id, provenance, etc). Never part of the
    /// reducer's folding logic; may or may not be part of the hash depending
    /// on `hash_version`, see [`crate::integrity`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Sequence number assigned by the store on append. `None` until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Codec tag recorded on the hashed record (absent = v1, `"v2"` when
    /// `meta` is conditionally excluded from the hash). Populated by the
    /// store on read from whatever the on-disk record actually carries;
    /// never set by callers constructing a fresh event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_version: Option<String>,
}

impl Event {
    /// Build a new, not-yet-appended event.
    pub fn new(event_type: impl Into<String>, aggregate_id: impl Into<String>, ts: i64, payload: Value) -> Self {
        Event {
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            ts,
            payload,
            meta: None,
            seq: None,
            hash_version: None,
        }
    }

    /// Attach or replace metadata.
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// The closed-enum view of `event_type`.
    pub fn kind(&self) -> EventKind {
        EventKind::from_wire(&self.event_type)
    }

    /// The assigned sequence number, or an error if the store has not
    /// assigned one yet. Mirrors the original `Event.require_seq()`.
    pub fn require_seq(&self) -> Result<u64, EventsError> {
        self.seq.ok_or(EventsError::MissingSeq)
    }

    /// Return a clone of this event with `seq` set, as done by the store on
    /// successful append.
    pub fn with_seq(&self, seq: u64) -> Self {
        let mut ev = self.clone();
        ev.seq = Some(seq);
        ev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_seq_errors_before_append() {
        let ev = Event::new("AgentObserved", "ns/a", 0, json!({}));
        assert_eq!(ev.require_seq(), Err(EventsError::MissingSeq));
    }

    #[test]
    fn require_seq_succeeds_after_append() {
        let ev = Event::new("AgentObserved", "ns/a", 0, json!({})).with_seq(1);
        assert_eq!(ev.require_seq(), Ok(1));
    }

    #[test]
    fn kind_round_trips_known_and_unknown_tags() {
        assert_eq!(EventKind::from_wire("AgentObserved"), EventKind::AgentObserved);
        assert_eq!(EventKind::from_wire("SomethingElse").as_wire(), "SomethingElse");
    }
}
