//! Operation-indexed catalog synchronization engine.
//!
//! Ingests a music catalog (artists, albums, tracks, audio features, genres,
//! artist relations, collection membership) into SQLite, stamping every row
//! with the operation that first produced it so that re-ingestion is
//! incremental rather than a full reload. Fetching, scheduling and serving
//! are external collaborators; this crate owns the schema, the operation
//! ledger, the insert-if-absent upsert layer, the sync orchestration and the
//! post-sync consistency check.

pub mod config;
pub mod error;
pub mod sqlite_persistence;
pub mod sync;
pub mod sync_store;

// Re-export commonly used types for convenience
pub use error::SyncError;
pub use sync::{Fetch, SyncBatch, SyncOrchestrator, SyncReport};
pub use sync_store::{check_consistency, SqliteSyncStore, Violation, ViolationKind};
