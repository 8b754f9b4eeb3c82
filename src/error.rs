//! Error taxonomy for the sync engine.
//!
//! Only unrecoverable storage failures surface as errors from a sync call.
//! Malformed records are skipped and logged where they occur
//! ([`ValidationError`](crate::sync_store::ValidationError)), failed
//! upstream fetches become per-kind skips in the
//! [`SyncReport`](crate::sync::SyncReport), and dangling references are
//! checker findings, not errors. "Entity already exists" is the expected
//! common case and never raises.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The store itself is unusable (disk full, permission denied, corrupt
    /// database). Fatal: aborts the whole sync call.
    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(e: anyhow::Error) -> Self {
        SyncError::StorageUnavailable(e)
    }
}
