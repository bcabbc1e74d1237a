//! State reconstruction from anchors.
//!
//! A past slot is never stored; it is regenerated. Replay picks the
//! newest anchor at or before the target, verifies the anchor carries the
//! axis's policy hash, then rebuilds every transition between anchor and
//! target: transitions still in the pending log are copied as committed,
//! while transitions already absorbed into later anchors are re-resolved
//! from the logged requests with the same deterministic policies that
//! committed them. Both paths reproduce the committed changes and hashes
//! bit for bit, which is what makes reconstruction keys verifiable.

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use monaxis_error::{AxisError, Result};
use monaxis_types::{
    state_key_hash, ConflictGroupId, PendingRequest, ReconstructionKey, SlotIndex, StateKey,
    StateValue,
};

use crate::anchor::find_base;
use crate::axis::TimeAxis;
use crate::registry::{group_config_for, ConflictGroup};
use crate::resolve::{resolve_group, GroupResolutionResult};
use crate::transition::{transition_hash_128, SlotTransition};

/// Everything needed to rebuild one past slot, detached from the axis
/// locks.
struct ReplayPlan {
    base_anchor_id: u64,
    base_resolution_hash: [u8; 16],
    base_snapshot: HashMap<u64, StateValue>,
    /// One transition per slot in `(base, target]`, ascending, empty
    /// slots included.
    transitions: Vec<SlotTransition>,
}

impl TimeAxis {
    /// Reconstruct and enumerate the full state at a past slot.
    ///
    /// `emit` receives `(key, value)` pairs with the key's `primary`
    /// component holding the key hash; `ControlFlow::Break` stops the
    /// enumeration early. The committed transition record carries no group
    /// attribution, so `group_filter` is accepted for forward
    /// compatibility and the enumeration currently covers all groups.
    pub fn reconstruct(
        &self,
        target_slot: SlotIndex,
        group_filter: Option<ConflictGroupId>,
        mut emit: impl FnMut(StateKey, StateValue) -> ControlFlow<()>,
    ) -> Result<()> {
        let _ = group_filter;
        let plan = self.build_replay_plan(target_slot)?;
        let state = materialise(plan.base_snapshot, &plan.transitions);
        debug!(
            slot = target_slot,
            keys = state.len(),
            "state reconstructed"
        );
        for (key_hash, value) in state {
            if emit(StateKey::new(key_hash, 0), value).is_break() {
                break;
            }
        }
        self.metrics.record_reconstruction();
        Ok(())
    }

    /// Query a single key at a slot.
    ///
    /// The current slot reads the head store directly; past slots replay
    /// from the nearest anchor and track just the requested key.
    pub fn query_state(&self, slot: SlotIndex, key: &StateKey) -> Result<StateValue> {
        let current = self.current_slot.load(Ordering::Acquire);
        let key_hash = key.hash();
        if slot == current {
            return self.state.get(key_hash).ok_or(AxisError::NotFound);
        }
        if slot > current {
            return Err(AxisError::invalid("cannot query a future slot"));
        }

        let plan = self.build_replay_plan(slot)?;
        self.metrics.record_reconstruction();
        let mut value = plan.base_snapshot.get(&key_hash).copied();
        for transition in &plan.transitions {
            for (k, v) in &transition.resolved_changes {
                if state_key_hash(k) == key_hash {
                    value = Some(*v);
                }
            }
        }
        value.ok_or(AxisError::NotFound)
    }

    /// Mint the reconstruction key for a slot.
    ///
    /// The key is a pure function of the base anchor and the transitions
    /// in `(anchor, slot]`: minting it twice for the same retained history
    /// yields byte-identical keys.
    pub fn reconstruction_key(&self, slot: SlotIndex) -> Result<ReconstructionKey> {
        let plan = match self.build_replay_plan(slot) {
            // Key retrieval reports the horizon as a past-slot failure.
            Err(AxisError::ReconstructionFailed { .. }) => {
                return Err(AxisError::SlotInPast {
                    target: slot,
                    current: self.anchors.oldest_reconstructible(),
                });
            }
            other => other?,
        };
        self.metrics.record_reconstruction();
        Ok(ReconstructionKey {
            anchor_id: plan.base_anchor_id,
            target_slot: slot,
            transition_hash: transition_hash_128(&plan.transitions),
            policy_hash: plan.base_resolution_hash,
        })
    }

    /// Verify a reconstruction key against the retained history.
    ///
    /// Re-mints the key for its target slot and compares all four
    /// components. `Ok(())` means the axis can still reproduce exactly
    /// the replay path the key describes; a key minted by a different
    /// axis, against a since-pruned anchor, or over diverged history
    /// fails.
    pub fn verify_reconstruction_key(&self, key: &ReconstructionKey) -> Result<()> {
        let minted = self.reconstruction_key(key.target_slot)?;
        if minted != *key {
            return Err(AxisError::reconstruction(
                "key does not match the retained history",
            ));
        }
        Ok(())
    }

    /// Assemble a replay plan for `target`.
    ///
    /// Lock acquisition order: anchors → transitions → groups; all three
    /// are released before any state is materialised.
    fn build_replay_plan(&self, target: SlotIndex) -> Result<ReplayPlan> {
        let current = self.current_slot.load(Ordering::Acquire);
        if target > current {
            return Err(AxisError::invalid("target slot has not been committed"));
        }

        let anchors = self.anchors.lock();
        if anchors.is_empty() {
            return Err(AxisError::AnchorNotFound { slot: target });
        }
        if target < anchors[0].slot_index {
            return Err(AxisError::reconstruction(
                "slot is older than the oldest retained anchor",
            ));
        }
        let base = find_base(&anchors, target)
            .ok_or(AxisError::AnchorNotFound { slot: target })?;
        if base.termination_policy_hash != self.policy.hash() {
            warn!(
                anchor_id = base.anchor_id,
                stored = format_args!("{:#018x}", base.termination_policy_hash),
                axis = format_args!("{:#018x}", self.policy.hash()),
                "anchor carries a foreign termination policy"
            );
            return Err(AxisError::PolicyMismatch {
                stored: base.termination_policy_hash,
                axis: self.policy.hash(),
            });
        }

        let base_anchor_id = base.anchor_id;
        let base_slot = base.slot_index;
        let base_resolution_hash = base.resolution_hash;
        let base_snapshot = base.state_snapshot.clone();
        let newest_anchor_slot = anchors.last().map_or(0, |a| a.slot_index);

        // Requests absorbed into newer anchors, for the re-resolved range.
        let mut logged: Vec<PendingRequest> = Vec::new();
        for anchor in anchors.iter() {
            if anchor.slot_index <= base_slot {
                continue;
            }
            for request in &anchor.transition_log {
                let slot = request.desc.target_slot;
                if slot > base_slot && slot <= target {
                    logged.push(*request);
                }
            }
        }

        let pending: Vec<SlotTransition> = {
            let transitions = self.transitions.lock();
            transitions
                .iter()
                .filter(|t| t.slot_index > base_slot && t.slot_index <= target)
                .cloned()
                .collect()
        };

        let groups = self.registry.snapshot();
        drop(anchors);

        // Re-resolve the anchor-absorbed range slot by slot; empty slots
        // still produce a transition so hashes match the committed log.
        let mut by_slot: BTreeMap<SlotIndex, Vec<PendingRequest>> = BTreeMap::new();
        for request in logged {
            by_slot
                .entry(request.desc.target_slot)
                .or_default()
                .push(request);
        }
        let regen_upper = target.min(newest_anchor_slot);
        let mut transitions = Vec::new();
        for slot in (base_slot + 1)..=regen_upper {
            let requests = by_slot.remove(&slot).unwrap_or_default();
            transitions.push(replay_slot(slot, requests, &groups));
        }
        transitions.extend(pending);

        Ok(ReplayPlan {
            base_anchor_id,
            base_resolution_hash,
            base_snapshot,
            transitions,
        })
    }
}

/// Re-resolve one slot from its logged requests, reproducing the
/// committed transition exactly: the same per-group resolution, the same
/// ascending group-id commit order, the same hashes.
fn replay_slot(
    slot: SlotIndex,
    requests: Vec<PendingRequest>,
    groups: &[ConflictGroup],
) -> SlotTransition {
    let mut buckets: BTreeMap<ConflictGroupId, Vec<PendingRequest>> = BTreeMap::new();
    for request in &requests {
        buckets
            .entry(request.desc.group_id)
            .or_default()
            .push(*request);
    }

    let results: Vec<GroupResolutionResult> = buckets
        .into_iter()
        .map(|(group_id, group_requests)| {
            resolve_group(&group_config_for(groups, group_id), &group_requests)
        })
        .collect();

    let resolution_hash = results.iter().fold(0u64, |acc, r| acc ^ r.change_hash);
    SlotTransition {
        slot_index: slot,
        requests,
        resolved_changes: results
            .iter()
            .flat_map(|r| r.resolved_changes.iter().copied())
            .collect(),
        resolution_hash,
    }
}

/// Apply a transition sequence on top of a snapshot. Replay never
/// deletes: committed transitions carry no tombstones, so a `Delete` is a
/// head-slot effect only.
fn materialise(
    mut state: HashMap<u64, StateValue>,
    transitions: &[SlotTransition],
) -> HashMap<u64, StateValue> {
    for transition in transitions {
        for (key, value) in &transition.resolved_changes {
            state.insert(state_key_hash(key), *value);
        }
    }
    state
}
