//! Core data model for the monaxis time axis.
//!
//! This crate defines the plain-data vocabulary shared by the engine and
//! its callers: slot/request/group identifiers, state keys and values,
//! change descriptors, conflict policies, termination configuration, and
//! reconstruction keys, together with the hash folds that give the axis
//! its deterministic identity.

pub mod config;
pub mod hash;
pub mod recon;
pub mod request;
pub mod stats;
pub mod termination;
pub mod value;

pub use config::{signal, AxisConfig};
pub use hash::{change_hash, state_key_hash, Fnv128};
pub use recon::{ReconstructionKey, RECONSTRUCTION_KEY_BYTES};
pub use request::{
    ConflictPolicy, CustomPolicyFn, PendingRequest, StateChangeDesc,
};
pub use stats::AxisStats;
pub use termination::{
    CausalitySummary, TerminationCallback, TerminationConfig, TerminationContext,
    TerminationReason,
};
pub use value::{MutationType, StateKey, StateValue};

use std::sync::Arc;

/// Discrete time-slot index. Slot 0 is genesis; the first tick commits
/// slot 1. Monotonically increasing for the lifetime of an axis.
pub type SlotIndex = u64;

/// Identifier allocated per submitted request; globally unique and
/// strictly increasing across submissions, never reused.
pub type RequestId = u64;

/// Conflict-group identifier.
pub type ConflictGroupId = u32;

/// Sentinel denoting an invalid slot index.
pub const SLOT_INVALID: SlotIndex = u64::MAX;

/// Sentinel denoting an invalid request id. Valid ids start at 1.
pub const REQUEST_ID_INVALID: RequestId = u64::MAX;

/// Sentinel denoting an invalid conflict group, or "all groups" in query
/// positions that accept a group filter.
pub const CONFLICT_GROUP_INVALID: ConflictGroupId = u32::MAX;

/// Hard cap on concurrently registered conflict groups.
pub const MAX_CONFLICT_GROUPS: usize = 256;

/// Default number of slots between automatic anchors.
pub const DEFAULT_ANCHOR_INTERVAL: u32 = 1024;

/// Default bound on retained anchors.
pub const DEFAULT_MAX_ANCHORS: u32 = 64;

/// Default bound on pending requests.
pub const DEFAULT_MAX_PENDING_REQUESTS: u32 = 65_536;

/// Default termination safety cap (hard upper bound on elapsed steps).
pub const DEFAULT_SAFETY_CAP: u32 = 10_000;

/// Callback invoked once per tick, on the tick thread, after the slot is
/// fully committed and visible to queries. Receives the committed slot
/// index and the number of state changes in it.
///
/// The callback must not call back into mutating axis operations; doing
/// so has undefined ordering.
pub type CommitCallback = Arc<dyn Fn(SlotIndex, usize) + Send + Sync>;
