//! Incremental ingestion engine
//!
//! Runs are idempotent: repeating one over the same window leaves the same
//! applications with the same row numbers.

mod locks;
mod pipeline;
mod watermark;

pub use locks::OwnerLocks;
pub use pipeline::{CancellationFlag, IngestionPipeline, RunPhase, RunReport};
pub use watermark::resolve_watermark;
