//! The time axis: lifecycle, tick engine, and external façade.
//!
//! Submission, cancellation, and queries are safe from any thread; the
//! tick must be driven by exactly one designated thread. Parallelism
//! within a tick is internal: conflict groups resolve on the worker pool,
//! then the commit phase runs single-threaded in a canonical order, so the
//! committed outcome is a pure function of the submission sequence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use monaxis_error::{AxisError, Result};
use monaxis_types::{
    AxisConfig, AxisStats, CommitCallback, ConflictGroupId, ConflictPolicy, CustomPolicyFn,
    PendingRequest, RequestId, SlotIndex, StateChangeDesc, TerminationCallback,
    TerminationConfig, TerminationContext, TerminationReason,
};

use crate::anchor::{push_and_prune, Anchor, AnchorStore};
use crate::metrics::{AxisMetrics, AxisMetricsSnapshot};
use crate::pool::WorkerPool;
use crate::queue::RequestQueue;
use crate::registry::{group_config_for, ConflictGroup, GroupRegistry};
use crate::resolve::{resolve_group, GroupResolutionResult};
use crate::state::StateStore;
use crate::terminate::{Lifecycle, TerminationPolicy};
use crate::transition::{
    resolution_hash_128, transition_hash_128, SlotTransition, TransitionLog,
};

/// A deterministic single time axis.
///
/// Two axes are fully independent; there is no process-global state.
pub struct TimeAxis {
    pub(crate) current_slot: Arc<AtomicU64>,
    pub(crate) anchor_interval: AtomicU32,
    pub(crate) queue: RequestQueue,
    pub(crate) registry: GroupRegistry,
    pub(crate) pool: WorkerPool,
    pub(crate) state: StateStore,
    pub(crate) anchors: AnchorStore,
    pub(crate) transitions: TransitionLog,
    pub(crate) policy: TerminationPolicy,
    termination_ctx: Mutex<TerminationContext>,
    lifecycle: AtomicU8,
    last_termination_reason: AtomicU8,
    external_flags: AtomicU32,
    commit_callback: Mutex<Option<CommitCallback>>,
    total_requests_processed: AtomicU64,
    total_conflicts_resolved: AtomicU64,
    pub(crate) metrics: AxisMetrics,
}

impl TimeAxis {
    /// Create an axis.
    ///
    /// Applies the zero-means-default config rules, freezes the
    /// termination policy and computes its hash (immutable from here on),
    /// starts the worker pool, and inserts the genesis anchor at slot 0.
    pub fn create(config: AxisConfig) -> Result<Self> {
        let config = config.normalized();
        let policy = TerminationPolicy::new(config.termination.clone().unwrap_or_default());

        let thread_count = WorkerPool::resolve_thread_count(config.worker_thread_count);
        let pool = WorkerPool::new(thread_count)?;

        let current_slot = Arc::new(AtomicU64::new(0));
        let queue = RequestQueue::new(
            Arc::clone(&current_slot),
            config.max_pending_requests as usize,
        );
        let registry = GroupRegistry::new(config.initial_conflict_group_capacity as usize);
        let anchors = AnchorStore::new(config.max_anchors as usize, policy.hash());

        info!(
            worker_threads = thread_count,
            anchor_interval = config.anchor_interval,
            max_anchors = config.max_anchors,
            max_pending_requests = config.max_pending_requests,
            policy_hash = format_args!("{:#018x}", policy.hash()),
            "time axis created"
        );

        Ok(Self {
            current_slot,
            anchor_interval: AtomicU32::new(config.anchor_interval),
            queue,
            registry,
            pool,
            state: StateStore::new(),
            anchors,
            transitions: TransitionLog::new(),
            policy,
            termination_ctx: Mutex::new(TerminationContext::default()),
            lifecycle: AtomicU8::new(Lifecycle::Running.as_u8()),
            last_termination_reason: AtomicU8::new(0),
            external_flags: AtomicU32::new(0),
            commit_callback: Mutex::new(None),
            total_requests_processed: AtomicU64::new(0),
            total_conflicts_resolved: AtomicU64::new(0),
            metrics: AxisMetrics::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Time progression
    // -----------------------------------------------------------------------

    /// Advance the axis by one slot.
    ///
    /// Must be driven by a single designated thread. Harvests the target
    /// slot's requests, resolves conflict groups in parallel, commits the
    /// winners in ascending group-id order, records the transition,
    /// materialises an anchor when the interval is reached, advances the
    /// slot counter, invokes the commit callback, and evaluates the
    /// termination policy.
    pub fn tick(&self) -> Result<()> {
        if self.lifecycle() == Lifecycle::Terminated {
            return Err(AxisError::Terminated);
        }

        let target = self.current_slot.load(Ordering::Acquire) + 1;

        let harvested = self.queue.harvest(target);

        let mut buckets: HashMap<ConflictGroupId, Vec<PendingRequest>> = HashMap::new();
        for request in &harvested {
            buckets
                .entry(request.desc.group_id)
                .or_default()
                .push(*request);
        }
        let total_groups = u32::try_from(buckets.len()).unwrap_or(u32::MAX);

        let groups_copy = Arc::new(self.registry.snapshot());
        let results: Arc<Mutex<Vec<GroupResolutionResult>>> =
            Arc::new(Mutex::new(Vec::with_capacity(buckets.len())));
        let resolved_group_count = Arc::new(AtomicU32::new(0));

        for (group_id, requests) in buckets {
            let groups_copy = Arc::clone(&groups_copy);
            let results = Arc::clone(&results);
            let resolved_group_count = Arc::clone(&resolved_group_count);
            self.pool.submit(move || {
                let group = group_config_for(&groups_copy, group_id);
                let result = resolve_group(&group, &requests);
                results.lock().push(result);
                resolved_group_count.fetch_add(1, Ordering::Relaxed);
            });
        }
        self.pool.wait_all();

        let resolved_groups = resolved_group_count.load(Ordering::Relaxed);
        if resolved_groups < total_groups {
            // A failed group contributes zero changes; time advances anyway.
            warn!(
                slot = target,
                resolved = resolved_groups,
                total = total_groups,
                "group resolution incomplete; committing without failed groups"
            );
        }

        let mut results = {
            let mut guard = results.lock();
            std::mem::take(&mut *guard)
        };
        // group_id is unique per task; a future change that submits more
        // than one task per group must extend this sort key to keep the
        // commit order total.
        results.sort_by_key(|r| r.group_id);

        let total_changes = self.state.apply(&results);
        let combined_resolution_hash = results.iter().fold(0u64, |acc, r| acc ^ r.change_hash);

        self.transitions.push(SlotTransition {
            slot_index: target,
            requests: harvested.clone(),
            resolved_changes: results
                .iter()
                .flat_map(|r| r.resolved_changes.iter().copied())
                .collect(),
            resolution_hash: combined_resolution_hash,
        });

        self.total_requests_processed
            .fetch_add(harvested.len() as u64, Ordering::Relaxed);
        self.total_conflicts_resolved.fetch_add(
            harvested.len().saturating_sub(total_changes) as u64,
            Ordering::Relaxed,
        );

        let fallbacks: u64 = results.iter().map(|r| u64::from(r.fallback_count)).sum();
        self.metrics.record_tick(
            harvested.len(),
            fallbacks,
            u64::from(total_groups - resolved_groups),
        );

        let interval = SlotIndex::from(self.anchor_interval.load(Ordering::Relaxed));
        if target - self.anchors.last_anchor_slot() >= interval {
            self.materialise_anchor(target, &results);
        }

        self.current_slot.store(target, Ordering::Release);

        let callback = self.commit_callback.lock().clone();
        if let Some(callback) = callback {
            callback(target, total_changes);
        }

        let reason = {
            let mut ctx = self.termination_ctx.lock();
            ctx.elapsed_steps += 1;
            ctx.pending_requests =
                u32::try_from(self.queue.len_non_cancelled()).unwrap_or(u32::MAX);
            ctx.resolved_groups = resolved_groups;
            ctx.total_groups = total_groups;
            ctx.external_flags = self.external_flags.load(Ordering::Acquire);
            ctx.causality_summary = None;
            let snapshot = *ctx;
            drop(ctx);
            // Evaluated outside the lock: the policy may call user code.
            self.policy.evaluate(&snapshot)
        };
        if let Some(reason) = reason {
            self.last_termination_reason
                .store(reason.code(), Ordering::Release);
            self.lifecycle
                .store(Lifecycle::Terminated.as_u8(), Ordering::Release);
            info!(slot = target, ?reason, "time axis terminated");
        } else {
            self.last_termination_reason.store(0, Ordering::Release);
        }

        debug!(
            slot = target,
            requests = harvested.len(),
            changes = total_changes,
            "slot committed"
        );
        Ok(())
    }

    /// Advance by `count` slots; short-circuits on the first failure.
    pub fn tick_multiple(&self, count: u32) -> Result<()> {
        for _ in 0..count {
            self.tick()?;
        }
        Ok(())
    }

    /// The current committed slot (0 before the first tick).
    #[must_use]
    pub fn current_slot(&self) -> SlotIndex {
        self.current_slot.load(Ordering::Acquire)
    }

    /// Materialise an anchor at `slot` from the live state and the
    /// pending transitions. Lock acquisition order: anchors → state →
    /// transitions.
    fn materialise_anchor(&self, slot: SlotIndex, results: &[GroupResolutionResult]) {
        let mut anchors = self.anchors.lock();
        let state_snapshot = self.state.snapshot();
        let mut transitions = self.transitions.lock();

        let anchor = Anchor {
            anchor_id: self.anchors.allocate_id(),
            slot_index: slot,
            state_snapshot,
            transition_log: transitions
                .iter()
                .flat_map(|t| t.requests.iter().copied())
                .collect(),
            transition_hash: transition_hash_128(&transitions),
            resolution_hash: resolution_hash_128(results),
            termination_policy_hash: self.policy.hash(),
        };
        let pruned = push_and_prune(&mut anchors, anchor, self.anchors.max_anchors());
        self.metrics.record_anchor(pruned as u64);
        self.anchors.set_last_anchor_slot(slot);
        transitions.clear();
    }

    // -----------------------------------------------------------------------
    // Request submission
    // -----------------------------------------------------------------------

    /// Submit a state-change request targeting a future slot.
    /// Thread-safe.
    pub fn submit(&self, desc: StateChangeDesc) -> Result<RequestId> {
        self.queue.submit(desc)
    }

    /// Submit a batch atomically: all requests are queued, or none are and
    /// the first error is returned. Thread-safe.
    pub fn submit_batch(&self, descs: &[StateChangeDesc]) -> Result<Vec<RequestId>> {
        self.queue.submit_batch(descs)
    }

    /// Cancel a pending request. Succeeds only while the request is still
    /// queued and not already cancelled. Thread-safe.
    pub fn cancel(&self, request_id: RequestId) -> Result<()> {
        self.queue.cancel(request_id)
    }

    /// Non-cancelled requests targeting `slot` (0 for past slots).
    #[must_use]
    pub fn pending_request_count(&self, slot: SlotIndex) -> usize {
        if slot <= self.current_slot() {
            return 0;
        }
        self.queue.pending_for(slot)
    }

    // -----------------------------------------------------------------------
    // Conflict groups
    // -----------------------------------------------------------------------

    /// Register a conflict group with a built-in policy.
    pub fn create_group(&self, policy: ConflictPolicy) -> Result<ConflictGroupId> {
        self.registry.create(policy)
    }

    /// Register a conflict group resolved by a user selector.
    ///
    /// The selector must be deterministic and is called from worker
    /// threads; it receives each key's conflict set pre-sorted by
    /// ascending request id.
    pub fn create_group_custom(&self, custom_fn: CustomPolicyFn) -> Result<ConflictGroupId> {
        self.registry.create_custom(custom_fn)
    }

    /// Deactivate a group. Its record and id remain reserved so already
    /// logged transitions keep resolving with the same policy.
    pub fn destroy_group(&self, group_id: ConflictGroupId) -> Result<()> {
        self.registry.destroy(group_id)
    }

    // -----------------------------------------------------------------------
    // Anchors
    // -----------------------------------------------------------------------

    /// The oldest slot that can still be reconstructed.
    #[must_use]
    pub fn oldest_reconstructible_slot(&self) -> SlotIndex {
        self.anchors.oldest_reconstructible()
    }

    /// Manually materialise an anchor at the current slot (a save-point
    /// mark). Absorbs the pending transition log like the automatic path;
    /// an idempotent no-op when the newest anchor already sits at the
    /// current slot.
    pub fn create_anchor_now(&self) -> Result<()> {
        let current = self.current_slot();
        let mut anchors = self.anchors.lock();
        if anchors.last().is_some_and(|a| a.slot_index >= current) {
            return Ok(());
        }
        let state_snapshot = self.state.snapshot();
        let mut transitions = self.transitions.lock();

        let anchor = Anchor {
            anchor_id: self.anchors.allocate_id(),
            slot_index: current,
            state_snapshot,
            transition_log: transitions
                .iter()
                .flat_map(|t| t.requests.iter().copied())
                .collect(),
            transition_hash: transition_hash_128(&transitions),
            resolution_hash: resolution_hash_128(&[]),
            termination_policy_hash: self.policy.hash(),
        };
        let pruned = push_and_prune(&mut anchors, anchor, self.anchors.max_anchors());
        self.metrics.record_anchor(pruned as u64);
        self.anchors.set_last_anchor_slot(current);
        transitions.clear();
        Ok(())
    }

    /// Change the automatic anchor cadence. The interval must be at
    /// least 1.
    pub fn set_anchor_interval(&self, interval: u32) -> Result<()> {
        if interval == 0 {
            return Err(AxisError::invalid("anchor interval must be at least 1"));
        }
        self.anchor_interval.store(interval, Ordering::Relaxed);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    /// Point-in-time statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> AxisStats {
        AxisStats {
            current_slot: self.current_slot(),
            oldest_reconstructible: self.anchors.oldest_reconstructible(),
            total_requests_processed: self.total_requests_processed.load(Ordering::Relaxed),
            total_conflicts_resolved: self.total_conflicts_resolved.load(Ordering::Relaxed),
            active_conflict_groups: self.registry.active_count(),
            current_anchor_count: u32::try_from(self.anchors.count()).unwrap_or(u32::MAX),
            memory_usage_bytes: self.memory_estimate(),
        }
    }

    /// Snapshot of the engine activity counters.
    #[must_use]
    pub fn metrics(&self) -> AxisMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn memory_estimate(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.queue.capacity() * std::mem::size_of::<PendingRequest>()
            + self.registry.capacity() * std::mem::size_of::<ConflictGroup>()
            + self.anchors.capacity() * std::mem::size_of::<Anchor>()
            + self.state.len()
                * (std::mem::size_of::<u64>() + std::mem::size_of::<monaxis_types::StateValue>())
    }

    /// Install (or clear) the commit callback. It runs once per tick, on
    /// the tick thread, after the slot is visible to queries; no axis
    /// lock is held across the call.
    pub fn set_commit_callback(&self, callback: Option<CommitCallback>) {
        *self.commit_callback.lock() = callback;
    }

    // -----------------------------------------------------------------------
    // Termination policy surface
    // -----------------------------------------------------------------------

    /// The immutable policy hash, computed once at creation. Two axes
    /// share termination semantics iff their hashes match.
    #[must_use]
    pub fn termination_policy_hash(&self) -> u64 {
        self.policy.hash()
    }

    /// Snapshot of the frozen termination configuration.
    #[must_use]
    pub fn termination_config(&self) -> TerminationConfig {
        self.policy.config().clone()
    }

    /// Snapshot of the termination context, with external flags read at
    /// call time.
    #[must_use]
    pub fn termination_context(&self) -> TerminationContext {
        let mut ctx = *self.termination_ctx.lock();
        ctx.external_flags = self.external_flags.load(Ordering::Acquire);
        ctx
    }

    /// Why the last evaluated tick terminated the axis, if it did.
    #[must_use]
    pub fn last_termination_reason(&self) -> Option<TerminationReason> {
        TerminationReason::from_code(self.last_termination_reason.load(Ordering::Acquire))
    }

    /// Raise external signal bits (atomic OR). Thread-safe at any time;
    /// signals modify the termination context, never the policy.
    pub fn set_external_signal(&self, flags: u32) {
        self.external_flags.fetch_or(flags, Ordering::AcqRel);
    }

    /// Lower external signal bits (atomic AND-NOT). Thread-safe.
    pub fn clear_external_signal(&self, flags: u32) {
        self.external_flags.fetch_and(!flags, Ordering::AcqRel);
    }

    /// Rejected: the termination policy is immutable after creation.
    /// Exists so older callers get a defined failure instead of silent
    /// divergence.
    pub fn set_termination_step_limit(&self, _max_steps: u32) -> Result<()> {
        Err(AxisError::PolicyLocked)
    }

    /// Rejected: the termination policy is immutable after creation.
    pub fn set_termination_on_request_drain(&self, _enabled: bool) -> Result<()> {
        Err(AxisError::PolicyLocked)
    }

    /// Rejected: the termination policy is immutable after creation.
    pub fn set_termination_on_group_resolution(&self, _enabled: bool) -> Result<()> {
        Err(AxisError::PolicyLocked)
    }

    /// Rejected: the termination policy is immutable after creation.
    pub fn set_termination_on_external_signal(&self, _required_flags: u32) -> Result<()> {
        Err(AxisError::PolicyLocked)
    }

    /// Rejected: the termination policy is immutable after creation.
    pub fn set_termination_safety_cap(&self, _max_steps_cap: u32) -> Result<()> {
        Err(AxisError::PolicyLocked)
    }

    /// Rejected: the termination policy is immutable after creation.
    pub fn set_termination_custom_callback(&self, _callback: TerminationCallback) -> Result<()> {
        Err(AxisError::PolicyLocked)
    }

    /// Rejected: the termination policy is immutable after creation.
    pub fn set_termination_config(&self, _config: &TerminationConfig) -> Result<()> {
        Err(AxisError::PolicyLocked)
    }
}

impl std::fmt::Debug for TimeAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeAxis")
            .field("current_slot", &self.current_slot())
            .field("lifecycle", &self.lifecycle())
            .field(
                "policy_hash",
                &format_args!("{:#018x}", self.policy.hash()),
            )
            .field("anchors", &self.anchors.count())
            .finish_non_exhaustive()
    }
}
