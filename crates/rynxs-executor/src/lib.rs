//! The side-effecting half of the engine: applying decided actions against
//! an external resource API and logging the outcome as feedback events.
//!
//! Every other crate in this workspace is pure; this one isn't, by design —
//! side effects are confined here so replay never needs to perform them.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod executor;
#[cfg(feature = "kube-backend")]
pub mod kube_backend;
pub mod leader;
pub mod normalize;
pub mod resource_api;

pub use error::{stable_error, ApiError, ExecutorError, StableError};
pub use executor::ExecutorLayer;
#[cfg(feature = "kube-backend")]
pub use kube_backend::KubeResourceApi;
pub use leader::{AlwaysLeader, LeaderElector};
pub use resource_api::{FakeResourceApi, NullResourceApi, ResourceApi};
