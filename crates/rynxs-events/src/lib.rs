//! The event record model and hash-chain integrity rules shared by every
//! storage backend, the reducer, and the verifier.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod event;
pub mod integrity;
pub mod payload;

pub use event::{Event, EventKind, EventsError};
pub use integrity::{chain_record, hash_event, HashVersion, Record, ZERO_HASH};
pub use payload::{
    ActionAppliedPayload, ActionFailedPayload, ActionsDecidedPayload, AgentObservedPayload, EventPayload,
};
