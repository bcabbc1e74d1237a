//! Per-group conflict resolution.
//!
//! Resolution is a pure function of the group configuration and the
//! requests handed to it, independent of thread scheduling: requests are
//! partitioned per key, each per-key list is sorted by ascending request
//! id (the canonical tie-break), a winner is selected by the group's
//! policy, and winning changes are emitted in ascending key-hash order so
//! the resolved list is canonical.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use monaxis_types::{
    change_hash, state_key_hash, ConflictGroupId, ConflictPolicy, MutationType, PendingRequest,
    StateChangeDesc, StateKey, StateValue,
};

use crate::registry::ConflictGroup;

/// The outcome of resolving one conflict group for one slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupResolutionResult {
    /// The group this result belongs to.
    pub group_id: ConflictGroupId,
    /// Winning `(key, value)` writes in ascending key-hash order.
    pub resolved_changes: Vec<(StateKey, StateValue)>,
    /// Key hashes whose winner was a `Delete`. Applied to the head-slot
    /// store only; never recorded in transitions, never hashed.
    pub deleted_keys: Vec<u64>,
    /// 64-bit fold over `resolved_changes` in emission order.
    pub change_hash: u64,
    /// Keys whose custom selector failed and fell back to first-writer.
    pub fallback_count: u32,
}

/// Resolve every key conflict within one group.
///
/// `requests` must be in submission (ascending id) order, as delivered by
/// the queue's harvest.
#[must_use]
pub fn resolve_group(group: &ConflictGroup, requests: &[PendingRequest]) -> GroupResolutionResult {
    let mut result = GroupResolutionResult {
        group_id: group.id,
        ..GroupResolutionResult::default()
    };

    if requests.is_empty() {
        result.change_hash = change_hash(&result.resolved_changes);
        return result;
    }

    // Partition per key; the BTreeMap drives the canonical ascending
    // key-hash emission order.
    let mut by_key: BTreeMap<u64, Vec<PendingRequest>> = BTreeMap::new();
    for request in requests {
        by_key
            .entry(state_key_hash(&request.desc.key))
            .or_default()
            .push(*request);
    }

    for (key_hash, mut key_requests) in by_key {
        key_requests.sort_by_key(|r| r.id);
        let winner_index = select_winner(group, &key_requests, &mut result.fallback_count);
        let winner = &key_requests[winner_index];

        match winner.desc.mutation_type {
            MutationType::Delete => result.deleted_keys.push(key_hash),
            // Add/Multiply/Custom apply as Set of the supplied value.
            _ => result
                .resolved_changes
                .push((winner.desc.key, winner.desc.value)),
        }
    }

    result.change_hash = change_hash(&result.resolved_changes);
    result
}

/// Pick the winning index within one key's conflict set.
///
/// `sorted` is ordered by ascending request id and non-empty.
fn select_winner(group: &ConflictGroup, sorted: &[PendingRequest], fallbacks: &mut u32) -> usize {
    if sorted.len() == 1 {
        return 0;
    }
    match group.policy {
        ConflictPolicy::Priority => priority_winner(sorted),
        ConflictPolicy::LastWriter => sorted.len() - 1,
        ConflictPolicy::FirstWriter => 0,
        ConflictPolicy::Custom => custom_winner(group, sorted, fallbacks),
    }
}

/// Highest priority wins; the ascending-id sort makes the earliest
/// submission win ties.
fn priority_winner(sorted: &[PendingRequest]) -> usize {
    let mut winner = 0;
    let mut best_priority = sorted[0].desc.priority;
    for (index, request) in sorted.iter().enumerate().skip(1) {
        if request.desc.priority > best_priority {
            winner = index;
            best_priority = request.desc.priority;
        }
    }
    winner
}

/// Delegate to the user selector; any failure (panic, `None`, missing
/// function, out-of-range index) falls back to FirstWriter.
fn custom_winner(group: &ConflictGroup, sorted: &[PendingRequest], fallbacks: &mut u32) -> usize {
    let Some(custom_fn) = group.custom_fn.as_ref() else {
        warn!(group_id = group.id, "custom group without selector; using first writer");
        *fallbacks += 1;
        return 0;
    };

    let descs: Vec<StateChangeDesc> = sorted.iter().map(|r| r.desc).collect();
    let picked = catch_unwind(AssertUnwindSafe(|| custom_fn(group.id, &descs)))
        .unwrap_or_else(|_| {
            warn!(group_id = group.id, "custom policy panicked; using first writer");
            None
        });

    match picked {
        Some(index) if index < sorted.len() => index,
        Some(index) => {
            warn!(
                group_id = group.id,
                index,
                len = sorted.len(),
                "custom policy returned out-of-range winner; using first writer"
            );
            *fallbacks += 1;
            0
        }
        None => {
            *fallbacks += 1;
            0
        }
    }
}
