//! # Completion barrier over a batch of asynchronous jobs.
//!
//! [`AsyncExecutionSupport`] tracks the jobs a container submits and, once asked to
//! watch them, reports the batch outcome exactly once.
//!
//! ## Flow
//! ```text
//! submit_job(executor, job) ─► JobHandle (tracked) ─► executor.execute(work)
//! start_watching_jobs():
//!   snapshot tracked handles
//!   ├─ empty     ─► on_complete()
//!   └─ otherwise ─► each handle.on_finished(arrive)
//!                     arrive: record first failure; last arrival fires
//!                       ├─ any failure ─► on_error(first)
//!                       └─ none        ─► on_complete()
//! ```
//!
//! ## Rules
//! - Cancellation is success: a batch of cancelled jobs completes.
//! - Callbacks run on whichever thread finished the last job, or on the caller of
//!   `start_watching_jobs` if everything already finished.
//! - Jobs submitted after `start_watching_jobs` (without `reset`) are tracked but are
//!   not part of the running barrier.
//! - `reset` forgets tracked handles; a barrier already armed still fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{BatchError, JobError};

use super::executor::Executor;
use super::handle::{JobHandle, JobOutcome};

type OnComplete = Arc<dyn Fn() + Send + Sync>;
type OnError = Arc<dyn Fn(BatchError) + Send + Sync>;

#[derive(Default)]
struct Tracked {
    handles: Vec<JobHandle>,
    watching: bool,
}

/// Tracks submitted jobs and fires one batch callback when all have finished.
pub struct AsyncExecutionSupport {
    tracked: Mutex<Tracked>,
    next_id: AtomicU64,
    on_complete: OnComplete,
    on_error: OnError,
}

impl AsyncExecutionSupport {
    pub fn new(
        on_complete: impl Fn() + Send + Sync + 'static,
        on_error: impl Fn(BatchError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            tracked: Mutex::new(Tracked::default()),
            next_id: AtomicU64::new(0),
            on_complete: Arc::new(on_complete),
            on_error: Arc::new(on_error),
        }
    }

    /// Tracks `job` and hands it to `executor`.
    pub fn submit_job<F>(&self, executor: &dyn Executor, job: F) -> JobHandle
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, work) = JobHandle::prepare(id, job);
        {
            let mut tracked = self.tracked.lock();
            if tracked.watching {
                tracing::warn!(job = id, "job submitted while watching; not part of the current batch");
            }
            tracked.handles.push(handle.clone());
        }
        executor.execute(work);
        handle
    }

    /// Arms the barrier over every job submitted so far.
    ///
    /// Calling it again before [`reset`](Self::reset) is ignored.
    pub fn start_watching_jobs(&self) {
        let snapshot = {
            let mut tracked = self.tracked.lock();
            if tracked.watching {
                tracing::warn!("batch is already being watched");
                return;
            }
            tracked.watching = true;
            tracked.handles.clone()
        };

        if snapshot.is_empty() {
            tracing::debug!("empty batch completes immediately");
            (self.on_complete)();
            return;
        }

        let barrier = Arc::new(Barrier {
            remaining: AtomicUsize::new(snapshot.len()),
            first_error: Mutex::new(None),
            on_complete: Arc::clone(&self.on_complete),
            on_error: Arc::clone(&self.on_error),
        });
        for handle in snapshot {
            let barrier = Arc::clone(&barrier);
            let id = handle.id();
            handle.on_finished(move |outcome| barrier.arrive(id, outcome));
        }
    }

    /// Cancels every tracked job that has not started. Returns how many were cancelled.
    pub fn cancel_all_pending_jobs(&self) -> usize {
        let snapshot = self.tracked.lock().handles.clone();
        let cancelled = snapshot.iter().filter(|h| h.cancel()).count();
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled pending jobs");
        }
        cancelled
    }

    /// Forgets all tracked jobs and allows watching a new batch.
    pub fn reset(&self) {
        let mut tracked = self.tracked.lock();
        tracked.handles.clear();
        tracked.watching = false;
    }

    /// Number of tracked jobs.
    pub fn size(&self) -> usize {
        self.tracked.lock().handles.len()
    }

    /// Blocks until every tracked job has finished; returns the first failure in
    /// submission order. There is no timeout.
    pub fn join_on_all_jobs(&self) -> Result<(), BatchError> {
        let snapshot = self.tracked.lock().handles.clone();
        let mut first = None;
        for handle in snapshot {
            if let JobOutcome::Failed(source) = handle.join() {
                first.get_or_insert(BatchError::JobFailed {
                    job: handle.id(),
                    source,
                });
            }
        }
        first.map_or(Ok(()), Err)
    }
}

struct Barrier {
    remaining: AtomicUsize,
    first_error: Mutex<Option<BatchError>>,
    on_complete: OnComplete,
    on_error: OnError,
}

impl Barrier {
    fn arrive(&self, job: u64, outcome: &JobOutcome) {
        if let JobOutcome::Failed(source) = outcome {
            self.first_error
                .lock()
                .get_or_insert_with(|| BatchError::JobFailed {
                    job,
                    source: source.clone(),
                });
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let failure = self.first_error.lock().take();
        match failure {
            Some(err) => {
                tracing::debug!(error = %err, "batch finished with failure");
                (self.on_error)(err)
            }
            None => (self.on_complete)(),
        }
    }
}
