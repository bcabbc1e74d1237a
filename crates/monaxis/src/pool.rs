//! Bounded worker pool for parallel group resolution.
//!
//! A fixed set of threads draining one task queue, with a single
//! drain-to-zero barrier as its only synchronisation primitive: no
//! priorities, no per-task cancellation, no stealing. The tick engine
//! submits one task per conflict-group bucket and calls
//! [`WorkerPool::wait_all`] before committing.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use monaxis_error::{AxisError, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    tasks: VecDeque<Task>,
    /// Queued plus currently-running tasks.
    outstanding: usize,
    stop: bool,
}

struct PoolInner {
    state: Mutex<PoolState>,
    task_ready: Condvar,
    all_done: Condvar,
}

/// Fixed-size task pool with a drain-to-zero barrier.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Resolve the configured thread count: explicit values pass through,
    /// zero auto-detects from available parallelism, floored at 4.
    #[must_use]
    pub fn resolve_thread_count(configured: u32) -> u32 {
        if configured != 0 {
            return configured;
        }
        let detected = std::thread::available_parallelism()
            .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
            .unwrap_or(0);
        detected.max(4)
    }

    /// Start `thread_count` workers. On spawn failure, already-started
    /// workers are shut down before the error is returned.
    pub fn new(thread_count: u32) -> Result<Self> {
        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState {
                tasks: VecDeque::new(),
                outstanding: 0,
                stop: false,
            }),
            task_ready: Condvar::new(),
            all_done: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(thread_count as usize);
        for index in 0..thread_count {
            let worker_inner = Arc::clone(&inner);
            let spawned = std::thread::Builder::new()
                .name(format!("monaxis-worker-{index}"))
                .spawn(move || worker_loop(&worker_inner));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    shutdown(&inner, &mut workers);
                    return Err(AxisError::ThreadPoolFailed {
                        detail: err.to_string(),
                    });
                }
            }
        }
        debug!(thread_count, "worker pool started");
        Ok(Self { inner, workers })
    }

    /// Queue a task for execution on some worker.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.inner.state.lock();
            state.tasks.push_back(Box::new(task));
            state.outstanding += 1;
        }
        self.inner.task_ready.notify_one();
    }

    /// Block until every submitted task has finished.
    pub fn wait_all(&self) {
        let mut state = self.inner.state.lock();
        while state.outstanding > 0 {
            self.inner.all_done.wait(&mut state);
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        shutdown(&self.inner, &mut self.workers);
    }
}

fn shutdown(inner: &Arc<PoolInner>, workers: &mut Vec<JoinHandle<()>>) {
    {
        let mut state = inner.state.lock();
        state.stop = true;
    }
    inner.task_ready.notify_all();
    for handle in workers.drain(..) {
        let _ = handle.join();
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        let task = {
            let mut state = inner.state.lock();
            loop {
                if let Some(task) = state.tasks.pop_front() {
                    break task;
                }
                if state.stop {
                    return;
                }
                inner.task_ready.wait(&mut state);
            }
        };

        // A panicking task must not take the worker (or the drain barrier)
        // down with it.
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!("worker task panicked");
        }

        let mut state = inner.state.lock();
        state.outstanding -= 1;
        if state.outstanding == 0 {
            inner.all_done.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn resolve_thread_count_rules() {
        assert_eq!(WorkerPool::resolve_thread_count(8), 8);
        assert_eq!(WorkerPool::resolve_thread_count(1), 1);
        assert!(WorkerPool::resolve_thread_count(0) >= 4);
    }

    #[test]
    fn wait_all_is_a_drain_barrier() {
        let pool = WorkerPool::new(4).expect("pool");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_all();
        assert_eq!(counter.load(Ordering::Relaxed), 64);

        // A second batch drains just as well.
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_all();
        assert_eq!(counter.load(Ordering::Relaxed), 72);
    }

    #[test]
    fn wait_all_with_no_tasks_returns_immediately() {
        let pool = WorkerPool::new(2).expect("pool");
        pool.wait_all();
        assert_eq!(pool.thread_count(), 2);
    }

    #[test]
    fn panicking_task_does_not_break_the_barrier() {
        let pool = WorkerPool::new(2).expect("pool");
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(|| panic!("task failure"));
        let after = Arc::clone(&counter);
        pool.submit(move || {
            after.fetch_add(1, Ordering::Relaxed);
        });
        pool.wait_all();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn drop_joins_workers() {
        let pool = WorkerPool::new(2).expect("pool");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_all();
        drop(pool);
        assert_eq!(counter.load(Ordering::Relaxed), 4);
    }
}
