//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{ApplicationKey, ApplicationUpdate, CheckpointEntry, JobApplication};

/// Deduplicated job application records
///
/// Records are keyed by (owner, job title, company). Row numbers come from a
/// per-owner monotonic sequence and are never reused, even after a delete.
pub trait ApplicationStore: Send + Sync {
    /// Insert or update the application identified by `owner` + title + company.
    ///
    /// New records get the next row number of the owner's sequence and
    /// `created = true`. Existing records keep their row number and take the
    /// new status and sender. Atomic per identity: concurrent callers never
    /// create two records for one key or hand one row number to two keys.
    fn upsert(&self, owner: &str, update: ApplicationUpdate) -> Result<(JobApplication, bool)>;

    /// Count every committed application of an owner
    fn count(&self, owner: &str) -> Result<usize>;

    /// Get an application by identity
    fn get(&self, key: &ApplicationKey) -> Result<Option<JobApplication>>;

    /// List an owner's applications ordered by row number
    fn list(&self, owner: &str) -> Result<Vec<JobApplication>>;

    /// Delete an application; returns whether it existed.
    /// Its row number stays consumed.
    fn delete(&self, key: &ApplicationKey) -> Result<bool>;
}

/// Append-only log of successful fetch runs
pub trait CheckpointLog: Send + Sync {
    /// Latest recorded fetch time for an owner
    fn latest(&self, owner: &str) -> Result<Option<DateTime<Utc>>>;

    /// Append a checkpoint; called once per fully completed run
    fn record(&self, owner: &str, fetched_at: DateTime<Utc>) -> Result<()>;

    /// Every checkpoint of an owner, oldest first
    fn history(&self, owner: &str) -> Result<Vec<CheckpointEntry>>;
}
