//! monaxis: a deterministic single time axis.
//!
//! Time progresses only through explicit, single-threaded [`TimeAxis::tick`]
//! calls. Between ticks, any number of producers submit state-change
//! requests targeting future slots; at tick time the engine resolves
//! conflicts deterministically (in parallel across conflict groups),
//! commits the winning changes in a canonical order, records the slot
//! transition, and periodically materialises bounded-memory anchors from
//! which any retained past slot can be reconstructed. The axis carries an
//! immutable termination policy evaluated after every tick; once it fires,
//! the axis is terminated for good.
//!
//! Usage pattern:
//!
//! 1. [`TimeAxis::create`] with an [`AxisConfig`].
//! 2. Register conflict groups ([`TimeAxis::create_group`]).
//! 3. Submit requests from any thread ([`TimeAxis::submit`]).
//! 4. Advance time from one designated thread ([`TimeAxis::tick`]).
//! 5. Query or reconstruct past state as needed.
//!
//! ```
//! use monaxis::{AxisConfig, ConflictPolicy, StateChangeDesc, StateKey, StateValue, TimeAxis};
//!
//! # fn main() -> monaxis::Result<()> {
//! let axis = TimeAxis::create(AxisConfig::default())?;
//! let group = axis.create_group(ConflictPolicy::LastWriter)?;
//!
//! let key = StateKey::new(7, 0);
//! axis.submit(StateChangeDesc::set(1, group, key, StateValue::Uint(40)))?;
//! axis.submit(StateChangeDesc::set(1, group, key, StateValue::Uint(42)))?;
//! axis.tick()?;
//!
//! // The later writer won, and slot 1 stays reconstructible.
//! assert_eq!(axis.query_state(1, &key)?, StateValue::Uint(42));
//! let recon_key = axis.reconstruction_key(1)?;
//! axis.verify_reconstruction_key(&recon_key)?;
//! # Ok(())
//! # }
//! ```

pub mod anchor;
pub mod axis;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod replay;
pub mod resolve;
pub mod state;
pub mod terminate;
pub mod transition;

pub use anchor::Anchor;
pub use axis::TimeAxis;
pub use metrics::{AxisMetrics, AxisMetricsSnapshot};
pub use pool::WorkerPool;
pub use registry::ConflictGroup;
pub use resolve::{resolve_group, GroupResolutionResult};
pub use terminate::{Lifecycle, TerminationPolicy};
pub use transition::SlotTransition;

pub use monaxis_error::{AxisCode, AxisError, ErrorKind, Result};
pub use monaxis_types::{
    change_hash, signal, state_key_hash, AxisConfig, AxisStats, CausalitySummary, CommitCallback,
    ConflictGroupId, ConflictPolicy, CustomPolicyFn, Fnv128, MutationType, PendingRequest,
    ReconstructionKey, RequestId, SlotIndex, StateChangeDesc, StateKey, StateValue,
    TerminationCallback, TerminationConfig, TerminationContext, TerminationReason,
    CONFLICT_GROUP_INVALID, DEFAULT_ANCHOR_INTERVAL, DEFAULT_MAX_ANCHORS,
    DEFAULT_MAX_PENDING_REQUESTS, DEFAULT_SAFETY_CAP, MAX_CONFLICT_GROUPS,
    RECONSTRUCTION_KEY_BYTES, REQUEST_ID_INVALID, SLOT_INVALID,
};
