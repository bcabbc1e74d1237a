//! Conflict-group registry.
//!
//! Group ids are allocated atomically and never reused. Destroying a group
//! only flips its `active` flag: the record must outlive every request
//! that references it in a transition log, so that replay of an old slot
//! still resolves with the last-known policy.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use monaxis_error::{AxisError, Result};
use monaxis_types::{ConflictGroupId, ConflictPolicy, CustomPolicyFn, MAX_CONFLICT_GROUPS};

/// One registered conflict group.
#[derive(Clone)]
pub struct ConflictGroup {
    /// Registry-assigned id.
    pub id: ConflictGroupId,
    /// The resolution policy for this group.
    pub policy: ConflictPolicy,
    /// Selector for [`ConflictPolicy::Custom`] groups.
    pub custom_fn: Option<CustomPolicyFn>,
    /// Cleared by destroy; the record itself is retained.
    pub active: bool,
}

impl fmt::Debug for ConflictGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictGroup")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("custom_fn", &self.custom_fn.is_some())
            .field("active", &self.active)
            .finish()
    }
}

/// Registry of conflict groups behind a single lock.
pub(crate) struct GroupRegistry {
    groups: Mutex<Vec<ConflictGroup>>,
    next_group_id: AtomicU32,
}

impl GroupRegistry {
    pub(crate) fn new(capacity_hint: usize) -> Self {
        Self {
            groups: Mutex::new(Vec::with_capacity(capacity_hint.min(MAX_CONFLICT_GROUPS))),
            next_group_id: AtomicU32::new(0),
        }
    }

    /// Register a group with a built-in policy. `Custom` must go through
    /// [`create_custom`](Self::create_custom).
    pub(crate) fn create(&self, policy: ConflictPolicy) -> Result<ConflictGroupId> {
        if policy == ConflictPolicy::Custom {
            return Err(AxisError::InvalidPolicy {
                detail: "custom policies require a selector function",
            });
        }
        self.push(policy, None)
    }

    /// Register a group resolved by a user-supplied selector.
    pub(crate) fn create_custom(&self, custom_fn: CustomPolicyFn) -> Result<ConflictGroupId> {
        self.push(ConflictPolicy::Custom, Some(custom_fn))
    }

    fn push(
        &self,
        policy: ConflictPolicy,
        custom_fn: Option<CustomPolicyFn>,
    ) -> Result<ConflictGroupId> {
        let mut groups = self.groups.lock();
        if groups.len() >= MAX_CONFLICT_GROUPS {
            return Err(AxisError::ConflictGroupFull {
                limit: MAX_CONFLICT_GROUPS,
            });
        }
        let id = self.next_group_id.fetch_add(1, Ordering::Relaxed);
        groups.push(ConflictGroup {
            id,
            policy,
            custom_fn,
            active: true,
        });
        debug!(group_id = id, ?policy, "conflict group created");
        Ok(id)
    }

    /// Deactivate a group. Its id stays reserved and its record stays in
    /// the registry for replay.
    pub(crate) fn destroy(&self, group_id: ConflictGroupId) -> Result<()> {
        let mut groups = self.groups.lock();
        for group in groups.iter_mut() {
            if group.id == group_id {
                group.active = false;
                debug!(group_id, "conflict group destroyed");
                return Ok(());
            }
        }
        Err(AxisError::NotFound)
    }

    /// Clone the current registry contents. The tick engine hands this
    /// snapshot to workers so the hot path reads no shared state.
    pub(crate) fn snapshot(&self) -> Vec<ConflictGroup> {
        self.groups.lock().clone()
    }

    /// Groups whose `active` flag is still set.
    pub(crate) fn active_count(&self) -> u32 {
        u32::try_from(self.groups.lock().iter().filter(|g| g.active).count()).unwrap_or(u32::MAX)
    }

    /// Current backing-store capacity, for memory estimates.
    pub(crate) fn capacity(&self) -> usize {
        self.groups.lock().capacity()
    }
}

/// The effective group configuration for resolution.
///
/// The stored record's policy applies whether or not the group is still
/// active, so a replayed slot resolves exactly as it committed; ids with
/// no record fall back to FirstWriter.
pub(crate) fn group_config_for(
    snapshot: &[ConflictGroup],
    group_id: ConflictGroupId,
) -> ConflictGroup {
    snapshot
        .iter()
        .find(|g| g.id == group_id)
        .cloned()
        .unwrap_or(ConflictGroup {
            id: group_id,
            policy: ConflictPolicy::FirstWriter,
            custom_fn: None,
            active: true,
        })
}
