//! Head-slot state store.
//!
//! A derived map from key hash to last-committed value, used as the fast
//! cache for the current slot. Sole writer is the tick engine's commit
//! phase; readers are head-slot queries and anchor materialisation. No
//! iterator escapes while the lock is held.

use std::collections::HashMap;

use parking_lot::Mutex;

use monaxis_types::{state_key_hash, StateValue};

use crate::resolve::GroupResolutionResult;

pub(crate) struct StateStore {
    map: Mutex<HashMap<u64, StateValue>>,
}

impl StateStore {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Apply resolved results in the caller-provided (ascending group id)
    /// order under one critical section. Returns the number of writes;
    /// deletions apply to this store only and are not counted as changes.
    pub(crate) fn apply(&self, results: &[GroupResolutionResult]) -> usize {
        let mut map = self.map.lock();
        let mut total_changes = 0;
        for result in results {
            for (key, value) in &result.resolved_changes {
                map.insert(state_key_hash(key), *value);
                total_changes += 1;
            }
            for key_hash in &result.deleted_keys {
                map.remove(key_hash);
            }
        }
        total_changes
    }

    /// Read a single value by key hash.
    pub(crate) fn get(&self, key_hash: u64) -> Option<StateValue> {
        self.map.lock().get(&key_hash).copied()
    }

    /// Clone the full map (anchor materialisation).
    pub(crate) fn snapshot(&self) -> HashMap<u64, StateValue> {
        self.map.lock().clone()
    }

    /// Number of live keys, for memory estimates.
    pub(crate) fn len(&self) -> usize {
        self.map.lock().len()
    }
}
