//! One module per subcommand group.

pub mod audit_report;
pub mod checkpoint;
pub mod log;
pub mod replay;

use rynxs_store_core::EventStoreError;

pub use crate::output::ExitCode;

impl From<&EventStoreError> for ExitCode {
    fn from(err: &EventStoreError) -> Self {
        match err {
            EventStoreError::Integrity(_) | EventStoreError::Conflict { .. } => ExitCode::Invalid,
            _ => ExitCode::IoError,
        }
    }
}
