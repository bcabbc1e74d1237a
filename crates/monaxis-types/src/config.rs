//! Axis configuration and external signal bits.

use serde::{Deserialize, Serialize};

use crate::termination::TerminationConfig;
use crate::{DEFAULT_ANCHOR_INTERVAL, DEFAULT_MAX_ANCHORS, DEFAULT_MAX_PENDING_REQUESTS};

/// Well-known external signal bits.
///
/// External signals modify the termination *context*, never the policy;
/// runtime agents raise and lower them at any time through wait-free
/// atomics. Bits 16..=19 are reserved for application use.
pub mod signal {
    /// Network frame synchronization.
    pub const NETWORK_SYNC: u32 = 1 << 0;
    /// Server authority signal.
    pub const SERVER_AUTHORITY: u32 = 1 << 1;
    /// Scene or level transition.
    pub const SCENE_TRANSITION: u32 = 1 << 2;
    /// Pause requested.
    pub const PAUSE_REQUEST: u32 = 1 << 3;
    /// Force immediate commit.
    pub const FORCE_COMMIT: u32 = 1 << 4;
    /// Application-defined signal 1.
    pub const USER_DEFINED_1: u32 = 1 << 16;
    /// Application-defined signal 2.
    pub const USER_DEFINED_2: u32 = 1 << 17;
    /// Application-defined signal 3.
    pub const USER_DEFINED_3: u32 = 1 << 18;
    /// Application-defined signal 4.
    pub const USER_DEFINED_4: u32 = 1 << 19;
}

/// Configuration for creating a time axis.
///
/// The embedded [`TerminationConfig`] is frozen at creation: its hash is
/// computed once and every anchor the axis produces carries it. Axes that
/// need different termination semantics are different axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Worker threads for parallel resolution (0 = auto-detect, floored
    /// at 4).
    pub worker_thread_count: u32,
    /// Hard cap on queued requests.
    pub max_pending_requests: u32,
    /// Slots between automatic anchors (0 = default).
    pub anchor_interval: u32,
    /// Bound on retained anchors; oldest are pruned first (0 = default).
    pub max_anchors: u32,
    /// Capacity hint for the conflict-group registry.
    pub initial_conflict_group_capacity: u32,
    /// Termination policy; `None` uses [`TerminationConfig::default`].
    pub termination: Option<TerminationConfig>,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            worker_thread_count: 0,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            anchor_interval: DEFAULT_ANCHOR_INTERVAL,
            max_anchors: DEFAULT_MAX_ANCHORS,
            initial_conflict_group_capacity: 32,
            termination: None,
        }
    }
}

impl AxisConfig {
    /// Apply the zero-means-default rules, returning a config whose
    /// bounded fields are all non-zero.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.anchor_interval == 0 {
            self.anchor_interval = DEFAULT_ANCHOR_INTERVAL;
        }
        if self.max_anchors == 0 {
            self.max_anchors = DEFAULT_MAX_ANCHORS;
        }
        if self.max_pending_requests == 0 {
            self.max_pending_requests = DEFAULT_MAX_PENDING_REQUESTS;
        }
        self
    }
}
