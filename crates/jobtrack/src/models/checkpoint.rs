//! Fetch checkpoints for incremental ingestion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successful pipeline run for an owner
///
/// The log is append-only; the current watermark is the latest `fetched_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub owner: String,
    pub fetched_at: DateTime<Utc>,
}

impl CheckpointEntry {
    pub fn new(owner: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            owner: owner.into(),
            fetched_at,
        }
    }
}
