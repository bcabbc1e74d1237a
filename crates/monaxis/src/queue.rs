//! Pending-request queue.
//!
//! A single shared vector behind one lock, fed by any number of producer
//! threads. Past-slot rejection reads the atomic slot counter before the
//! lock is taken; id allocation is atomic and strictly increasing. The one
//! ordering obligation lives in [`RequestQueue::harvest`]: requests for a
//! slot are handed to the resolver in submission (ascending id) order,
//! which is the sole source of first/last-writer determinism.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use monaxis_error::{AxisError, Result};
use monaxis_types::{
    PendingRequest, RequestId, SlotIndex, StateChangeDesc, REQUEST_ID_INVALID, SLOT_INVALID,
};

/// Multi-producer queue of pending requests with cancellation.
pub(crate) struct RequestQueue {
    /// Shared with the axis; read (not written) here for past-slot checks.
    current_slot: Arc<AtomicU64>,
    next_request_id: AtomicU64,
    max_pending: usize,
    pending: Mutex<Vec<PendingRequest>>,
}

impl RequestQueue {
    pub(crate) fn new(current_slot: Arc<AtomicU64>, max_pending: usize) -> Self {
        Self {
            current_slot,
            next_request_id: AtomicU64::new(1),
            max_pending,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue one request. Rejects past-target and sentinel slots before
    /// taking the lock.
    pub(crate) fn submit(&self, desc: StateChangeDesc) -> Result<RequestId> {
        if desc.target_slot == SLOT_INVALID {
            return Err(AxisError::invalid("target_slot is the invalid sentinel"));
        }
        let current = self.current_slot.load(Ordering::Acquire);
        if desc.target_slot <= current {
            return Err(AxisError::SlotInPast {
                target: desc.target_slot,
                current,
            });
        }

        let mut pending = self.pending.lock();
        if pending.len() >= self.max_pending {
            warn!(limit = self.max_pending, "request queue full");
            return Err(AxisError::RequestQueueFull {
                limit: self.max_pending,
            });
        }
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        pending.push(PendingRequest {
            id,
            desc,
            cancelled: false,
        });
        Ok(id)
    }

    /// Queue a batch atomically: either every descriptor is accepted and
    /// ids are returned in order, or nothing is queued and the first
    /// failure is returned.
    pub(crate) fn submit_batch(&self, descs: &[StateChangeDesc]) -> Result<Vec<RequestId>> {
        if descs.is_empty() {
            return Err(AxisError::invalid("empty request batch"));
        }
        let current = self.current_slot.load(Ordering::Acquire);
        for desc in descs {
            if desc.target_slot == SLOT_INVALID {
                return Err(AxisError::invalid("target_slot is the invalid sentinel"));
            }
            if desc.target_slot <= current {
                return Err(AxisError::SlotInPast {
                    target: desc.target_slot,
                    current,
                });
            }
        }

        let mut pending = self.pending.lock();
        if pending.len() + descs.len() > self.max_pending {
            warn!(
                limit = self.max_pending,
                batch = descs.len(),
                "request queue full for batch"
            );
            return Err(AxisError::RequestQueueFull {
                limit: self.max_pending,
            });
        }
        let mut ids = Vec::with_capacity(descs.len());
        for desc in descs {
            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            pending.push(PendingRequest {
                id,
                desc: *desc,
                cancelled: false,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    /// Flag a request as cancelled. Observed at harvest time: a request
    /// cancelled before its slot is harvested never reaches a transition.
    pub(crate) fn cancel(&self, request_id: RequestId) -> Result<()> {
        if request_id == REQUEST_ID_INVALID || request_id == 0 {
            return Err(AxisError::invalid("request id is a sentinel value"));
        }
        let mut pending = self.pending.lock();
        for request in pending.iter_mut() {
            if request.id == request_id && !request.cancelled {
                request.cancelled = true;
                debug!(request_id, "request cancelled");
                return Ok(());
            }
        }
        Err(AxisError::NotFound)
    }

    /// Remove and return every live request targeting `target`, in
    /// submission order. Cancelled requests are dropped from the queue as
    /// a side effect, whatever slot they target.
    pub(crate) fn harvest(&self, target: SlotIndex) -> Vec<PendingRequest> {
        let mut pending = self.pending.lock();
        let mut harvested = Vec::new();
        pending.retain(|request| {
            if request.cancelled {
                return false;
            }
            if request.desc.target_slot == target {
                harvested.push(*request);
                return false;
            }
            true
        });
        harvested
    }

    /// Non-cancelled requests targeting `slot`.
    pub(crate) fn pending_for(&self, slot: SlotIndex) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|r| !r.cancelled && r.desc.target_slot == slot)
            .count()
    }

    /// All non-cancelled requests, any slot.
    pub(crate) fn len_non_cancelled(&self) -> usize {
        self.pending.lock().iter().filter(|r| !r.cancelled).count()
    }

    /// Current backing-store capacity, for memory estimates.
    pub(crate) fn capacity(&self) -> usize {
        self.pending.lock().capacity()
    }
}
