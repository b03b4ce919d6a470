//! # Run-to-completion jobs.
//!
//! [`Job`] is the user-facing unit of work: a stable name and a blocking `run` that
//! receives a [`CancellationToken`]. [`JobFn`] adapts a closure. [`SimpleJob`] puts a
//! job under lifecycle control so containers, monitors and remote bridges can treat it
//! as a [`Component`](crate::Component).
//!
//! ```text
//! READY ─run─► EXECUTING ─► Ok(Complete)            ─► COMPLETE
//!                         ├► Ok(Incomplete) | Canceled ─► INCOMPLETE
//!                         └► Err(e) | panic            ─► EXCEPTION (error on the event)
//! INCOMPLETE | EXCEPTION ─soft_reset─► READY
//! COMPLETE | INCOMPLETE | EXCEPTION ─hard_reset─► READY
//! any ─destroy─► DESTROYED
//! ```
//!
//! A job should check `ctx.is_cancelled()` and return [`JobError::Canceled`] (or
//! `Ok(JobResult::Incomplete)`) promptly after [`stop`](crate::Stoppable::stop).

use std::borrow::Cow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::{ComponentBoundary, Destroyable, Resettable, Runnable, StopWait, Stoppable};
use crate::error::{JobError, LifecycleError};
use crate::state::{
    ComponentId, JobState, State, StateEvent, StateHandler, StateListener, Stateful,
};

/// How a job that returned normally ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    /// All work done.
    Complete,
    /// Stopped early without failing; can be resumed after a reset.
    Incomplete,
}

/// # Blocking, cancelable unit of work.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use jobvisor::{Job, JobError, JobResult};
///
/// struct Report;
///
/// impl Job for Report {
///     fn name(&self) -> &str { "report" }
///
///     fn run(&self, ctx: &CancellationToken) -> Result<JobResult, JobError> {
///         if ctx.is_cancelled() {
///             return Err(JobError::Canceled);
///         }
///         Ok(JobResult::Complete)
///     }
/// }
/// ```
pub trait Job: Send + Sync + 'static {
    /// Stable, human-readable job name.
    fn name(&self) -> &str;

    fn run(&self, ctx: &CancellationToken) -> Result<JobResult, JobError>;
}

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// Closure-backed job.
///
/// ```
/// use tokio_util::sync::CancellationToken;
/// use jobvisor::{JobError, JobFn, JobRef, JobResult};
///
/// let job: JobRef = JobFn::arc("tick", |_ctx: &CancellationToken| {
///     Ok::<_, JobError>(JobResult::Complete)
/// });
/// assert_eq!(job.name(), "tick");
/// ```
#[derive(Debug)]
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Job for JobFn<F>
where
    F: Fn(&CancellationToken) -> Result<JobResult, JobError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &CancellationToken) -> Result<JobResult, JobError> {
        (self.f)(ctx)
    }
}

/// A [`Job`] under lifecycle control.
pub struct SimpleJob {
    job: JobRef,
    handler: StateHandler<JobState>,
    boundary: ComponentBoundary,
    cancel: Mutex<CancellationToken>,
    stop_timeout: Duration,
}

impl SimpleJob {
    pub fn new(job: JobRef) -> Self {
        Self::with_config(job, &Config::default())
    }

    pub fn with_config(job: JobRef, cfg: &Config) -> Self {
        let id = ComponentId::new(job.name());
        Self {
            handler: StateHandler::new(id.clone(), JobState::Ready),
            boundary: ComponentBoundary::of(format!("jobvisor.job.{}", job.name()), id),
            cancel: Mutex::new(CancellationToken::new()),
            stop_timeout: cfg.stop_wait().unwrap_or(Duration::ZERO),
            job,
        }
    }

    pub fn id(&self) -> &ComponentId {
        self.handler.owner()
    }

    pub fn state(&self) -> JobState {
        self.handler.last_state()
    }

    pub fn handler(&self) -> &StateHandler<JobState> {
        &self.handler
    }

    fn begin(&self) -> Result<Option<CancellationToken>, LifecycleError> {
        self.handler.run_locked(|g| {
            g.assert_alive()?;
            if !g.state().is_ready() {
                return Ok(None);
            }
            let token = CancellationToken::new();
            *self.cancel.lock() = token.clone();
            g.set_state(JobState::Executing)?;
            Ok(Some(token))
        })
    }
}

impl Runnable for SimpleJob {
    fn run(&self) -> Result<(), LifecycleError> {
        let Some(token) = self.begin()? else {
            tracing::debug!(component = %self.id(), state = %self.state().name(), "not ready, run skipped");
            return Ok(());
        };

        let outcome = self.boundary.execute(|| {
            catch_unwind(AssertUnwindSafe(|| self.job.run(&token)))
                .unwrap_or_else(|panic| Err(JobError::from_panic(panic)))
        });

        self.handler.run_locked(|g| match outcome {
            Ok(JobResult::Complete) => g.set_state(JobState::Complete),
            Ok(JobResult::Incomplete) | Err(JobError::Canceled) => {
                g.set_state(JobState::Incomplete)
            }
            Err(e) => {
                tracing::warn!(component = %g.owner(), error = %e, "job failed");
                g.set_exception(JobState::Exception, Arc::new(e))
            }
        })
    }
}

impl Stoppable for SimpleJob {
    fn stop(&self) -> Result<(), LifecycleError> {
        // Serialized with `begin`, which stores the token before committing EXECUTING.
        self.handler.run_locked(|g| {
            if g.state().is_stoppable() {
                self.cancel.lock().cancel();
            }
        });
        StopWait::new(self).with_timeout(self.stop_timeout).run()
    }
}

impl Resettable for SimpleJob {
    fn soft_reset(&self) -> bool {
        self.handler
            .try_to_when(
                |s| s.is_incomplete() || s.is_exception(),
                |g| g.set_state(JobState::Ready).is_ok(),
            )
            .unwrap_or(false)
    }

    fn hard_reset(&self) -> bool {
        self.handler
            .try_to_when(
                |s| s.is_complete() || s.is_incomplete() || s.is_exception(),
                |g| g.set_state(JobState::Ready).is_ok(),
            )
            .unwrap_or(false)
    }
}

impl Destroyable for SimpleJob {
    fn destroy(&self) -> Result<(), LifecycleError> {
        self.handler.assert_alive()?;
        if self.state().is_stoppable() {
            self.stop()?;
        }
        self.handler.run_locked(|g| g.set_state(JobState::Destroyed))
    }
}

impl Stateful for SimpleJob {
    fn last_state_event(&self) -> StateEvent {
        self.handler.last_state_event()
    }

    fn add_state_listener(&self, listener: Arc<dyn StateListener>) -> Result<(), LifecycleError> {
        self.handler.add_state_listener(listener)
    }

    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) {
        self.handler.remove_state_listener(listener)
    }
}
