//! State-change requests and conflict policies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{MutationType, StateKey, StateValue};
use crate::{ConflictGroupId, RequestId, SlotIndex};

/// Describes a single state change requested against a future slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateChangeDesc {
    /// The slot this change targets; must be strictly in the future at
    /// submission time.
    pub target_slot: SlotIndex,
    /// Isolation unit; requests in different groups never conflict.
    pub group_id: ConflictGroupId,
    /// Resolution priority (meaningful under the `Priority` policy).
    pub priority: i32,
    /// What is being changed.
    pub key: StateKey,
    /// How to change it.
    pub mutation_type: MutationType,
    /// The supplied value.
    pub value: StateValue,
}

impl StateChangeDesc {
    /// Convenience constructor for a `Set` request with default priority.
    #[must_use]
    pub const fn set(
        target_slot: SlotIndex,
        group_id: ConflictGroupId,
        key: StateKey,
        value: StateValue,
    ) -> Self {
        Self {
            target_slot,
            group_id,
            priority: 0,
            key,
            mutation_type: MutationType::Set,
            value,
        }
    }
}

/// A queued request: the descriptor plus its allocated id and cancel flag.
///
/// Cancellation is observed at harvest time; a cancelled request never
/// appears in any committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Strictly-increasing id allocated at submission.
    pub id: RequestId,
    /// The requested change.
    pub desc: StateChangeDesc,
    /// Set by `cancel`; checked when the target slot is harvested.
    pub cancelled: bool,
}

/// Deterministic rule that picks the winner among conflicting requests
/// within one (slot, group, key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// Highest priority wins; ties break to the lowest request id.
    Priority,
    /// Highest request id wins.
    LastWriter,
    /// Lowest request id wins.
    FirstWriter,
    /// User-supplied selection function; falls back to `FirstWriter` on
    /// any failure.
    Custom,
}

/// User-supplied conflict selector for [`ConflictPolicy::Custom`] groups.
///
/// Receives the group id and the conflicting descriptors for one key,
/// pre-sorted by ascending request id, and returns the index of the
/// winner. Returning `None` or an out-of-range index falls back to
/// `FirstWriter`. The function must be deterministic (same inputs, same
/// output) and is called from arbitrary worker threads; any
/// order-sensitive logic beyond the documented pre-sort is the caller's
/// responsibility.
pub type CustomPolicyFn =
    Arc<dyn Fn(ConflictGroupId, &[StateChangeDesc]) -> Option<usize> + Send + Sync>;
