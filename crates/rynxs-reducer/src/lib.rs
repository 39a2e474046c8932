//! Deterministic state folding: the generic `State` container, the
//! `UniverseState` domain model, the `Reducer` registry, and the replay
//! runner that drives it over a stored event log.
//!
//! Everything here is pure: no I/O, no clocks, no randomness. The same
//! sequence of events folded through the same reducer always produces the
//! same state, which is the property the rest of the engine (checkpointing,
//! verification, the decision layer) is built on top of.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod reducer;
pub mod replay;
pub mod state;
pub mod universe;

pub use error::ReducerError;
pub use reducer::{Handler, HandlerMode, Reducer};
pub use replay::{replay, replay_from, ReplayResult};
pub use state::{state_hash, State};
pub use universe::{AgentRecord, Applied, Desired, DesiredAction, Failure, UniverseState};
