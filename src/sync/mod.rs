mod batch;
mod deps;
mod orchestrator;

pub use batch::{Fetch, KindOutcome, SkipReason, SyncBatch, SyncReport};
pub use deps::{prerequisites, stages};
pub use orchestrator::SyncOrchestrator;
