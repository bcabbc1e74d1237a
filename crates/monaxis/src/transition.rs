//! Slot transitions and the pending-transition log.
//!
//! One [`SlotTransition`] is appended per tick (empty ticks included) and
//! the log covers exactly the slots since the newest anchor. When a new
//! anchor is materialised it absorbs the log and the log is cleared. The
//! 128-bit folds here feed anchor hashes and reconstruction keys and must
//! be reproducible from replayed history.

use parking_lot::{Mutex, MutexGuard};

use monaxis_types::{state_key_hash, Fnv128, PendingRequest, SlotIndex, StateKey, StateValue};

use crate::resolve::GroupResolutionResult;

/// Everything committed in one slot: the harvested requests, the winning
/// changes in canonical order, and the combined resolution hash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotTransition {
    /// The slot this transition committed.
    pub slot_index: SlotIndex,
    /// Harvested (non-cancelled) requests in submission order.
    pub requests: Vec<PendingRequest>,
    /// Winning changes: per-group lists in ascending group id,
    /// concatenated; within each group ascending key hash.
    pub resolved_changes: Vec<(StateKey, StateValue)>,
    /// XOR of the per-group change hashes.
    pub resolution_hash: u64,
}

/// The pending-transition log behind its own lock.
pub(crate) struct TransitionLog {
    transitions: Mutex<Vec<SlotTransition>>,
}

impl TransitionLog {
    pub(crate) fn new() -> Self {
        Self {
            transitions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, transition: SlotTransition) {
        self.transitions.lock().push(transition);
    }

    /// Direct guard access for multi-lock sections (anchor
    /// materialisation, replay). Callers own the acquisition order.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<SlotTransition>> {
        self.transitions.lock()
    }
}

/// Fold a transition sequence into its 128-bit hash.
///
/// The fold visits, per transition: the slot index; each request's id and
/// full descriptor; each resolved change; the resolution hash. Empty
/// transitions still contribute their slot index, so a replayed range
/// hashes identically whether its slots carried requests or not.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn transition_hash_128(transitions: &[SlotTransition]) -> [u8; 16] {
    let mut fold = Fnv128::new();
    for transition in transitions {
        fold.write_u64(transition.slot_index);
        for request in &transition.requests {
            fold.write_u64(request.id);
            fold.write_u64(request.desc.target_slot);
            fold.write_u32(request.desc.group_id);
            fold.write_u32(request.desc.priority as u32);
            fold.write_u64(request.desc.key.primary);
            fold.write_u64(request.desc.key.secondary);
            fold.write_u8(request.desc.mutation_type.code());
            fold.write_u64(request.desc.value.bits());
        }
        for (key, value) in &transition.resolved_changes {
            fold.write_u64(state_key_hash(key));
            fold.write_u64(value.bits());
        }
        fold.write_u64(transition.resolution_hash);
    }
    fold.finish_bytes()
}

/// Fold one tick's resolution results into their 128-bit hash.
///
/// Callers pass results already sorted by ascending group id (the commit
/// order), making the fold canonical.
#[must_use]
pub fn resolution_hash_128(results: &[GroupResolutionResult]) -> [u8; 16] {
    let mut fold = Fnv128::new();
    for result in results {
        fold.write_u32(result.group_id);
        fold.write_u64(result.change_hash);
        for (key, value) in &result.resolved_changes {
            fold.write_u64(state_key_hash(key));
            fold.write_u64(value.bits());
        }
    }
    fold.finish_bytes()
}
