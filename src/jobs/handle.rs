//! # Handle to one tracked unit of work.
//!
//! ```text
//! Pending ──start──► Running ──body returns──► Finished(Completed | Cancelled | Failed)
//!    └──────cancel / work dropped unrun─────► Finished(Cancelled)
//! ```
//!
//! ## Rules
//! - `cancel()` only affects a pending handle; a running body is never interrupted.
//! - A body returning [`JobError::Canceled`] finishes as `Cancelled`, not `Failed`.
//! - Panics in the body are caught and finish the handle as `Failed(Panicked)`.
//! - Completion callbacks run exactly once, outside the handle's lock, on the
//!   finishing thread (or immediately if already finished).

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::JobError;

use super::executor::Work;

/// Final result of a tracked job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Cancelled,
    Failed(JobError),
}

type Callback = Box<dyn FnOnce(&JobOutcome) + Send>;

enum Phase {
    Pending,
    Running,
    Finished(JobOutcome),
}

struct Slot {
    phase: Phase,
    callbacks: Vec<Callback>,
}

struct Inner {
    id: u64,
    slot: Mutex<Slot>,
    finished: Condvar,
}

/// Cloneable handle with cancel and completion.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<Inner>,
}

impl JobHandle {
    /// Creates a pending handle and the unit of work that drives it.
    pub(crate) fn prepare<F>(id: u64, job: F) -> (JobHandle, Work)
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        let handle = JobHandle {
            inner: Arc::new(Inner {
                id,
                slot: Mutex::new(Slot {
                    phase: Phase::Pending,
                    callbacks: Vec::new(),
                }),
                finished: Condvar::new(),
            }),
        };
        let run = PendingRun {
            handle: handle.clone(),
            job: Some(job),
        };
        (handle, Box::new(move || run.execute()))
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.inner.slot.lock().phase, Phase::Finished(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.inner.slot.lock().phase, Phase::Running)
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        match &self.inner.slot.lock().phase {
            Phase::Finished(o) => Some(o.clone()),
            _ => None,
        }
    }

    /// Prevents a pending job from starting. Returns `false` if it already started.
    pub fn cancel(&self) -> bool {
        self.finish_if(|phase| matches!(phase, Phase::Pending), JobOutcome::Cancelled)
    }

    /// Runs `callback` once the job finishes; immediately if it already has.
    pub fn on_finished(&self, callback: impl FnOnce(&JobOutcome) + Send + 'static) {
        let mut slot = self.inner.slot.lock();
        if let Phase::Finished(o) = &slot.phase {
            let o = o.clone();
            drop(slot);
            callback(&o);
        } else {
            slot.callbacks.push(Box::new(callback));
        }
    }

    /// Blocks until the job finishes.
    pub fn join(&self) -> JobOutcome {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Phase::Finished(o) = &slot.phase {
                return o.clone();
            }
            self.inner.finished.wait(&mut slot);
        }
    }

    fn start(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        if matches!(slot.phase, Phase::Pending) {
            slot.phase = Phase::Running;
            true
        } else {
            false
        }
    }

    fn finish_if(&self, allowed: impl FnOnce(&Phase) -> bool, outcome: JobOutcome) -> bool {
        let callbacks = {
            let mut slot = self.inner.slot.lock();
            if !allowed(&slot.phase) {
                return false;
            }
            slot.phase = Phase::Finished(outcome.clone());
            std::mem::take(&mut slot.callbacks)
        };
        self.inner.finished.notify_all();
        for cb in callbacks {
            cb(&outcome);
        }
        true
    }

    fn finish(&self, outcome: JobOutcome) {
        self.finish_if(|phase| !matches!(phase, Phase::Finished(_)), outcome);
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match &self.inner.slot.lock().phase {
            Phase::Pending => "pending".to_string(),
            Phase::Running => "running".to_string(),
            Phase::Finished(o) => format!("finished({o:?})"),
        };
        f.debug_struct("JobHandle")
            .field("id", &self.inner.id)
            .field("phase", &phase)
            .finish()
    }
}

/// The body of a job until an executor runs it; dropping it unrun cancels the handle.
struct PendingRun<F> {
    handle: JobHandle,
    job: Option<F>,
}

impl<F> PendingRun<F>
where
    F: FnOnce() -> Result<(), JobError>,
{
    fn execute(mut self) {
        let Some(job) = self.job.take() else { return };
        if !self.handle.start() {
            return;
        }
        let outcome = match catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(())) => JobOutcome::Completed,
            Ok(Err(JobError::Canceled)) => JobOutcome::Cancelled,
            Ok(Err(e)) => JobOutcome::Failed(e),
            Err(panic) => JobOutcome::Failed(JobError::from_panic(panic)),
        };
        self.handle.finish(outcome);
    }
}

impl<F> Drop for PendingRun<F> {
    fn drop(&mut self) {
        if self.job.is_some() {
            self.handle.finish(JobOutcome::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_cancel_prevents_start() {
        let ran = Arc::new(AtomicBool::new(false));
        let r = Arc::clone(&ran);
        let (handle, work) = JobHandle::prepare(1, move || {
            r.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert!(handle.cancel());
        work();
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(handle.outcome(), Some(JobOutcome::Cancelled));
    }

    #[test]
    fn test_cancel_after_finish_is_noop() {
        let (handle, work) = JobHandle::prepare(1, || Ok(()));
        work();
        assert!(!handle.cancel());
        assert_eq!(handle.join(), JobOutcome::Completed);
    }

    #[test]
    fn test_panic_becomes_failure() {
        let (handle, work) = JobHandle::prepare(7, || panic!("kaboom"));
        work();
        assert_eq!(
            handle.outcome(),
            Some(JobOutcome::Failed(JobError::Panicked {
                info: "kaboom".into()
            }))
        );
    }

    #[test]
    fn test_dropped_work_is_cancelled() {
        let (handle, work) = JobHandle::prepare(1, || Ok(()));
        drop(work);
        assert_eq!(handle.outcome(), Some(JobOutcome::Cancelled));
    }

    #[test]
    fn test_callback_runs_once_even_if_registered_late() {
        let (handle, work) = JobHandle::prepare(1, || Err(JobError::fail("x")));
        let early = Arc::new(Mutex::new(Vec::new()));
        let e = Arc::clone(&early);
        handle.on_finished(move |o| e.lock().push(o.clone()));
        work();

        let late = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&late);
        handle.on_finished(move |o| l.lock().push(o.clone()));

        let failed = JobOutcome::Failed(JobError::fail("x"));
        assert_eq!(*early.lock(), vec![failed.clone()]);
        assert_eq!(*late.lock(), vec![failed]);
    }

    #[test]
    fn test_canceled_error_counts_as_cancellation() {
        let (handle, work) = JobHandle::prepare(1, || Err(JobError::Canceled));
        work();
        assert_eq!(handle.outcome(), Some(JobOutcome::Cancelled));
    }
}
