//! In-memory storage implementation
//!
//! Used by tests and dry runs. All state sits behind one mutex, so every
//! upsert is atomic with respect to the row sequence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

use super::{ApplicationStore, CheckpointLog};
use crate::models::{ApplicationKey, ApplicationUpdate, CheckpointEntry, JobApplication};

#[derive(Default)]
struct MemoryState {
    applications: BTreeMap<ApplicationKey, JobApplication>,
    /// Last row number handed out per owner
    row_sequences: HashMap<String, u32>,
    checkpoints: Vec<CheckpointEntry>,
}

/// In-memory implementation of [`ApplicationStore`] and [`CheckpointLog`]
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("In-memory store lock poisoned"))
    }
}

impl ApplicationStore for InMemoryStore {
    fn upsert(&self, owner: &str, update: ApplicationUpdate) -> Result<(JobApplication, bool)> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let key = ApplicationKey::new(owner, &update.job_title, &update.company);

        if let Some(existing) = state.applications.get_mut(&key) {
            existing.status = update.status;
            existing.sender_email = update.sender_email;
            existing.updated_at = now;
            return Ok((existing.clone(), false));
        }

        let sequence = state.row_sequences.entry(owner.to_string()).or_insert(0);
        *sequence += 1;
        let row_number = *sequence;

        let application = JobApplication {
            owner: owner.to_string(),
            job_title: update.job_title,
            company: update.company,
            status: update.status,
            sender_email: update.sender_email,
            row_number,
            created_at: now,
            updated_at: now,
        };
        state.applications.insert(key, application.clone());

        Ok((application, true))
    }

    fn count(&self, owner: &str) -> Result<usize> {
        let state = self.lock()?;
        Ok(state
            .applications
            .keys()
            .filter(|k| k.owner == owner)
            .count())
    }

    fn get(&self, key: &ApplicationKey) -> Result<Option<JobApplication>> {
        let state = self.lock()?;
        Ok(state.applications.get(key).cloned())
    }

    fn list(&self, owner: &str) -> Result<Vec<JobApplication>> {
        let state = self.lock()?;
        let mut list: Vec<JobApplication> = state
            .applications
            .values()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect();
        list.sort_by_key(|a| a.row_number);
        Ok(list)
    }

    fn delete(&self, key: &ApplicationKey) -> Result<bool> {
        let mut state = self.lock()?;
        Ok(state.applications.remove(key).is_some())
    }
}

impl CheckpointLog for InMemoryStore {
    fn latest(&self, owner: &str) -> Result<Option<DateTime<Utc>>> {
        let state = self.lock()?;
        Ok(state
            .checkpoints
            .iter()
            .filter(|c| c.owner == owner)
            .map(|c| c.fetched_at)
            .max())
    }

    fn record(&self, owner: &str, fetched_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        state.checkpoints.push(CheckpointEntry::new(owner, fetched_at));
        Ok(())
    }

    fn history(&self, owner: &str) -> Result<Vec<CheckpointEntry>> {
        let state = self.lock()?;
        let mut entries: Vec<CheckpointEntry> = state
            .checkpoints
            .iter()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        entries.sort_by_key(|c| c.fetched_at);
        Ok(entries)
    }
}
