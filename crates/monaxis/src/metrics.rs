//! Engine observability counters.
//!
//! Per-axis `AtomicU64` counters for tick, anchor, and reconstruction
//! activity. Thread-safe, lock-free, recorded inline by the tick engine
//! and the replay paths. Two axes never share counters; there is no
//! process-global state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomic counters tracking one axis's engine activity.
pub struct AxisMetrics {
    /// Slots committed (monotonic; equals the current slot).
    pub ticks_committed: AtomicU64,
    /// Committed slots that harvested no requests.
    pub empty_ticks: AtomicU64,
    /// Anchors materialised, automatic and manual.
    pub anchors_created: AtomicU64,
    /// Anchors dropped by the retention bound.
    pub anchors_pruned: AtomicU64,
    /// Custom-policy selections that fell back to first-writer.
    pub custom_policy_fallbacks: AtomicU64,
    /// Conflict groups that failed to produce a resolution result.
    pub resolution_failures: AtomicU64,
    /// Successful replay operations (full reconstructions, past-slot
    /// queries, key mints).
    pub reconstructions_served: AtomicU64,
}

impl AxisMetrics {
    /// Create a zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks_committed: AtomicU64::new(0),
            empty_ticks: AtomicU64::new(0),
            anchors_created: AtomicU64::new(0),
            anchors_pruned: AtomicU64::new(0),
            custom_policy_fallbacks: AtomicU64::new(0),
            resolution_failures: AtomicU64::new(0),
            reconstructions_served: AtomicU64::new(0),
        }
    }

    /// Record a committed tick.
    pub fn record_tick(&self, harvested: usize, fallbacks: u64, failed_groups: u64) {
        self.ticks_committed.fetch_add(1, Ordering::Relaxed);
        if harvested == 0 {
            self.empty_ticks.fetch_add(1, Ordering::Relaxed);
        }
        if fallbacks > 0 {
            self.custom_policy_fallbacks
                .fetch_add(fallbacks, Ordering::Relaxed);
        }
        if failed_groups > 0 {
            self.resolution_failures
                .fetch_add(failed_groups, Ordering::Relaxed);
        }
    }

    /// Record an anchor materialisation and how many anchors it pruned.
    pub fn record_anchor(&self, pruned: u64) {
        self.anchors_created.fetch_add(1, Ordering::Relaxed);
        if pruned > 0 {
            self.anchors_pruned.fetch_add(pruned, Ordering::Relaxed);
        }
    }

    /// Record a served replay operation.
    pub fn record_reconstruction(&self) {
        self.reconstructions_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> AxisMetricsSnapshot {
        AxisMetricsSnapshot {
            ticks_committed: self.ticks_committed.load(Ordering::Relaxed),
            empty_ticks: self.empty_ticks.load(Ordering::Relaxed),
            anchors_created: self.anchors_created.load(Ordering::Relaxed),
            anchors_pruned: self.anchors_pruned.load(Ordering::Relaxed),
            custom_policy_fallbacks: self.custom_policy_fallbacks.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
            reconstructions_served: self.reconstructions_served.load(Ordering::Relaxed),
        }
    }
}

impl Default for AxisMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of [`AxisMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisMetricsSnapshot {
    pub ticks_committed: u64,
    pub empty_ticks: u64,
    pub anchors_created: u64,
    pub anchors_pruned: u64,
    pub custom_policy_fallbacks: u64,
    pub resolution_failures: u64,
    pub reconstructions_served: u64,
}

impl AxisMetricsSnapshot {
    /// Fraction of committed ticks that carried no requests, or 0.0 when
    /// nothing has been committed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn empty_tick_ratio(&self) -> f64 {
        if self.ticks_committed == 0 {
            return 0.0;
        }
        self.empty_ticks as f64 / self.ticks_committed as f64
    }
}

impl fmt::Display for AxisMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} empty={} anchors={} pruned={} fallbacks={} failures={} replays={}",
            self.ticks_committed,
            self.empty_ticks,
            self.anchors_created,
            self.anchors_pruned,
            self.custom_policy_fallbacks,
            self.resolution_failures,
            self.reconstructions_served,
        )
    }
}
