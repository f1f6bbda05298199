//! Per-owner run serialization

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Registry handing out one mutex per owner
///
/// Runs for the same owner queue on the owner's mutex; different owners
/// never contend beyond the short registry lookup.
#[derive(Default)]
pub struct OwnerLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The run lock for `owner`, created on first use
    pub fn for_owner(&self, owner: &str) -> Arc<Mutex<()>> {
        // The map only ever grows, so a poisoned guard is still consistent
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(owner.to_string()).or_default())
    }
}
