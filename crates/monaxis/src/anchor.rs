//! Anchor store.
//!
//! Anchors are persisted state snapshots at known slots, each carrying the
//! hashes needed to verify subsequent replay and the axis's frozen
//! termination-policy hash. The store is a bounded ring ordered by
//! strictly-increasing slot index; a genesis anchor at slot 0 exists for
//! the whole axis lifetime, and pruning always removes the oldest entry
//! first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use monaxis_types::{PendingRequest, SlotIndex, StateValue};

/// One persisted anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    /// Strictly-increasing anchor identifier.
    pub anchor_id: u64,
    /// The slot this anchor snapshots.
    pub slot_index: SlotIndex,
    /// Full key-hash → value map at `slot_index`.
    pub state_snapshot: HashMap<u64, StateValue>,
    /// Requests absorbed from the transitions since the previous anchor,
    /// flattened in slot order. Each retains its target slot, so replay
    /// can re-resolve any intermediate slot.
    pub transition_log: Vec<PendingRequest>,
    /// 128-bit fold over the absorbed transitions.
    pub transition_hash: [u8; 16],
    /// 128-bit fold over the materialising tick's resolution results.
    pub resolution_hash: [u8; 16],
    /// The axis's frozen policy hash; every anchor of an axis carries the
    /// same value, and reconstruction verifies it.
    pub termination_policy_hash: u64,
}

/// Bounded ring of anchors plus the bookkeeping that drives the automatic
/// anchor cadence.
pub(crate) struct AnchorStore {
    anchors: Mutex<Vec<Anchor>>,
    next_anchor_id: AtomicU64,
    last_anchor_slot: AtomicU64,
    max_anchors: usize,
}

impl AnchorStore {
    /// Build the store with its genesis anchor: slot 0, empty snapshot,
    /// zero hashes, the axis policy hash.
    pub(crate) fn new(max_anchors: usize, termination_policy_hash: u64) -> Self {
        let store = Self {
            anchors: Mutex::new(Vec::with_capacity(max_anchors.min(1024))),
            next_anchor_id: AtomicU64::new(0),
            last_anchor_slot: AtomicU64::new(0),
            max_anchors,
        };
        let genesis = Anchor {
            anchor_id: store.allocate_id(),
            slot_index: 0,
            state_snapshot: HashMap::new(),
            transition_log: Vec::new(),
            transition_hash: [0; 16],
            resolution_hash: [0; 16],
            termination_policy_hash,
        };
        store.anchors.lock().push(genesis);
        store
    }

    pub(crate) fn allocate_id(&self) -> u64 {
        self.next_anchor_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Direct guard access; the tick engine acquires this before the
    /// state and transition locks.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Anchor>> {
        self.anchors.lock()
    }

    pub(crate) fn last_anchor_slot(&self) -> SlotIndex {
        self.last_anchor_slot.load(Ordering::Acquire)
    }

    pub(crate) fn set_last_anchor_slot(&self, slot: SlotIndex) {
        self.last_anchor_slot.store(slot, Ordering::Release);
    }

    pub(crate) fn max_anchors(&self) -> usize {
        self.max_anchors
    }

    /// The oldest retained anchor's slot (the reconstruction horizon).
    pub(crate) fn oldest_reconstructible(&self) -> SlotIndex {
        self.anchors.lock().first().map_or(0, |a| a.slot_index)
    }

    pub(crate) fn count(&self) -> usize {
        self.anchors.lock().len()
    }

    /// Current backing-store capacity, for memory estimates.
    pub(crate) fn capacity(&self) -> usize {
        self.anchors.lock().capacity()
    }
}

/// Append a materialised anchor and prune from the front down to the
/// bound. Caller holds the anchors guard. Returns the number of anchors
/// pruned.
pub(crate) fn push_and_prune(anchors: &mut Vec<Anchor>, anchor: Anchor, max_anchors: usize) -> usize {
    debug!(
        anchor_id = anchor.anchor_id,
        slot = anchor.slot_index,
        snapshot_keys = anchor.state_snapshot.len(),
        "anchor materialised"
    );
    anchors.push(anchor);
    let mut pruned_count = 0;
    while anchors.len() > max_anchors {
        let pruned = anchors.remove(0);
        trace!(
            anchor_id = pruned.anchor_id,
            slot = pruned.slot_index,
            "anchor pruned"
        );
        pruned_count += 1;
    }
    pruned_count
}

/// The newest anchor whose slot is at or before `target`, scanning
/// newest to oldest.
pub(crate) fn find_base(anchors: &[Anchor], target: SlotIndex) -> Option<&Anchor> {
    anchors.iter().rev().find(|a| a.slot_index <= target)
}
