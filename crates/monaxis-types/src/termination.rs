//! Termination policy configuration, context, and reasons.
//!
//! A termination policy is part of the axis definition: it is frozen at
//! creation, its 64-bit hash is the axis's semantic identity, and its
//! evaluation order is a deterministic contract. The types here are the
//! plain-data half; evaluation lives in the engine crate.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_SAFETY_CAP;

/// Custom termination predicate, consulted last in the evaluation order.
///
/// Must be deterministic and free of engine mutations; it may read its
/// own captured state. Its presence (never its identity) participates in
/// the policy hash.
pub type TerminationCallback = Arc<dyn Fn(&TerminationContext) -> bool + Send + Sync>;

/// Immutable termination configuration, fixed at axis creation.
#[derive(Clone, Serialize, Deserialize)]
pub struct TerminationConfig {
    /// Terminate once `elapsed_steps` reaches this limit (0 disables).
    pub step_limit: u32,
    /// Hard upper bound on elapsed steps, checked before everything else
    /// (0 disables; not recommended).
    pub safety_cap: u32,
    /// Terminate when no pending requests remain after a tick.
    pub terminate_on_request_drain: bool,
    /// Terminate when every observed group resolved this tick.
    pub terminate_on_group_resolution: bool,
    /// Terminate when any of these external signal bits is raised
    /// (0 disables).
    pub required_external_flags: u32,
    /// Optional custom predicate, consulted last.
    #[serde(skip)]
    pub custom_callback: Option<TerminationCallback>,
}

impl Default for TerminationConfig {
    /// Safety cap of 10 000 steps; every other condition disabled.
    fn default() -> Self {
        Self {
            step_limit: 0,
            safety_cap: DEFAULT_SAFETY_CAP,
            terminate_on_request_drain: false,
            terminate_on_group_resolution: false,
            required_external_flags: 0,
            custom_callback: None,
        }
    }
}

impl fmt::Debug for TerminationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationConfig")
            .field("step_limit", &self.step_limit)
            .field("safety_cap", &self.safety_cap)
            .field("terminate_on_request_drain", &self.terminate_on_request_drain)
            .field(
                "terminate_on_group_resolution",
                &self.terminate_on_group_resolution,
            )
            .field("required_external_flags", &self.required_external_flags)
            .field("custom_callback", &self.custom_callback.is_some())
            .finish()
    }
}

/// Abstract causal dependency metrics.
///
/// Reserved extension point: termination may one day consider causal
/// meta-observations (counts only, never concrete state data). Currently
/// always absent from the context and excluded from policy hashing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalitySummary {
    /// Causal events processed.
    pub causal_event_count: u64,
    /// Unresolved causal dependencies.
    pub unresolved_dependencies: u64,
    /// Committed state mutations.
    pub committed_mutations: u64,
}

/// Meta-observations the termination policy evaluates after each tick.
///
/// Semantic contract:
/// - `elapsed_steps` is cumulative and monotonic, one increment per
///   completed tick, reset only at axis creation.
/// - `pending_requests` is the post-tick snapshot of the non-cancelled
///   queue size; requests processed in the current tick are excluded.
/// - `resolved_groups` counts groups that completed resolution this tick;
///   `total_groups` counts all groups observed this tick. They differ
///   when a group fails to resolve.
/// - `external_flags` is the signal bitmask snapshot at evaluation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationContext {
    /// Cumulative ticks executed.
    pub elapsed_steps: u32,
    /// Non-cancelled requests remaining in the queue.
    pub pending_requests: u32,
    /// Groups that completed resolution this tick.
    pub resolved_groups: u32,
    /// Groups observed this tick.
    pub total_groups: u32,
    /// External runtime signal bitmask.
    pub external_flags: u32,
    /// Reserved causality metrics; currently always `None`.
    pub causality_summary: Option<CausalitySummary>,
}

/// Why the axis terminated. Reasons are listed in evaluation order; the
/// first condition that fires wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TerminationReason {
    /// The hard safety cap on elapsed steps was reached.
    SafetyCap = 1,
    /// The configured step limit was reached.
    StepLimit = 2,
    /// All pending requests drained.
    RequestDrain = 3,
    /// Every observed group resolved.
    GroupResolution = 4,
    /// A required external signal was raised.
    ExternalSignal = 5,
    /// The custom predicate fired.
    CustomCallback = 6,
}

impl TerminationReason {
    /// Stable numeric code (0 is reserved for "no termination").
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a numeric code; 0 and unknown codes decode to `None`.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::SafetyCap),
            2 => Some(Self::StepLimit),
            3 => Some(Self::RequestDrain),
            4 => Some(Self::GroupResolution),
            5 => Some(Self::ExternalSignal),
            6 => Some(Self::CustomCallback),
            _ => None,
        }
    }
}
