//! Audit-facing verification: independently recomputing a log's hash chain,
//! checking that every `ActionsDecided` event's trigger pointers are
//! honest, and assembling a self-contained proof bundle for a single
//! decision an auditor can check without trusting this engine's own replay.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod pointers;
pub mod proof;

pub use error::VerifyError;
pub use pointers::{verify_actions_decided_pointers, PointerVerificationResult};
pub use proof::{
    build_decision_proof, ActionResult, ActionsDecidedInfo, CheckpointInfo, DecisionProof,
    ProofVerificationResult, TriggerEventInfo,
};
