//! Axis statistics snapshot.

use serde::{Deserialize, Serialize};

use crate::SlotIndex;

/// Point-in-time view of axis counters, taken under the relevant locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisStats {
    /// Current committed slot.
    pub current_slot: SlotIndex,
    /// Oldest slot a reconstruction can reach (the oldest anchor's slot).
    pub oldest_reconstructible: SlotIndex,
    /// Requests harvested into committed slots since creation.
    pub total_requests_processed: u64,
    /// Requests that lost conflict resolution since creation.
    pub total_conflicts_resolved: u64,
    /// Registered groups whose `active` flag is still set.
    pub active_conflict_groups: u32,
    /// Anchors currently retained.
    pub current_anchor_count: u32,
    /// Capacity-based estimate of owned storage.
    pub memory_usage_bytes: usize,
}
