//! Storage traits and implementations
//!
//! Applications and fetch checkpoints live behind two traits so the
//! pipeline can run against memory in tests and SQLite in production.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ApplicationStore, CheckpointLog};
