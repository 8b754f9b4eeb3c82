mod checker;
mod models;
mod schema;
mod store;
pub mod validation;

pub use checker::{check_consistency, Violation, ViolationKind};
pub use models::*;
pub use schema::SYNC_VERSIONED_SCHEMAS;
pub use store::SqliteSyncStore;
pub use validation::ValidationError;
