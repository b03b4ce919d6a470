//! # Container running its children concurrently.
//!
//! [`ParallelJob`] submits every child's `run` to an [`Executor`] through an
//! [`AsyncExecutionSupport`] and blocks until the batch settles. Its own state is a
//! [`StructuralState`] over the children, so observers see an aggregated
//! [`ParentState`] that follows every child transition.
//!
//! ```text
//! run()
//!   ├─► support.reset()
//!   ├─► for child: support.submit_job(executor, child.run)
//!   ├─► support.start_watching_jobs()
//!   └─► support.join_on_all_jobs()
//!         on_error ─► parent EXCEPTION (error on the event)
//! ```
//!
//! A child refusing to run (e.g. destroyed) or panicking fails the batch; a child
//! whose work fails reports EXCEPTION through its own state instead.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::{Component, Destroyable, Resettable, Runnable, Stoppable};
use crate::error::{JobError, LifecycleError};
use crate::state::{
    ComponentId, ParentState, StandardStateOp, StateEvent, StateListener, StateOperator, Stateful,
    StructuralState,
};

use super::batch::AsyncExecutionSupport;
use super::executor::Executor;

/// Parallel container of components.
pub struct ParallelJob {
    children: Vec<Arc<dyn Component>>,
    structure: Arc<StructuralState>,
    support: AsyncExecutionSupport,
    executor: Arc<dyn Executor>,
    running: Mutex<()>,
}

impl ParallelJob {
    /// Container aggregating with [`StandardStateOp`].
    pub fn new(
        id: impl Into<ComponentId>,
        executor: Arc<dyn Executor>,
        children: Vec<Arc<dyn Component>>,
    ) -> Result<Self, LifecycleError> {
        Self::with_operator(id, executor, children, Arc::new(StandardStateOp))
    }

    pub fn with_operator(
        id: impl Into<ComponentId>,
        executor: Arc<dyn Executor>,
        children: Vec<Arc<dyn Component>>,
        operator: Arc<dyn StateOperator>,
    ) -> Result<Self, LifecycleError> {
        let id = id.into();
        let structure = Arc::new(StructuralState::new(id.clone(), operator));
        for child in &children {
            let stateful: Arc<dyn Stateful> = Arc::clone(child) as Arc<dyn Stateful>;
            structure.insert_child(stateful)?;
        }

        let done = id.clone();
        let weak: Weak<StructuralState> = Arc::downgrade(&structure);
        let support = AsyncExecutionSupport::new(
            move || tracing::debug!(component = %done, "all children finished"),
            move |err| {
                let Some(structure) = weak.upgrade() else { return };
                tracing::warn!(component = %structure.handler().owner(), error = %err, "child batch failed");
                let _ = structure
                    .handler()
                    .run_locked(|g| g.set_exception(ParentState::Exception, Arc::new(err)));
            },
        );

        Ok(Self {
            children,
            structure,
            support,
            executor,
            running: Mutex::new(()),
        })
    }

    pub fn id(&self) -> &ComponentId {
        self.structure.handler().owner()
    }

    pub fn state(&self) -> ParentState {
        self.structure.state()
    }

    pub fn children(&self) -> &[Arc<dyn Component>] {
        &self.children
    }
}

impl Runnable for ParallelJob {
    fn run(&self) -> Result<(), LifecycleError> {
        self.structure.handler().assert_alive()?;
        let Some(_running) = self.running.try_lock() else {
            tracing::debug!(component = %self.id(), "already running, run skipped");
            return Ok(());
        };

        self.support.reset();
        for child in &self.children {
            let child = Arc::clone(child);
            self.support.submit_job(self.executor.as_ref(), move || {
                child.run().map_err(|e| JobError::fail(e.to_string()))
            });
        }
        self.support.start_watching_jobs();

        if let Err(err) = self.support.join_on_all_jobs() {
            tracing::debug!(component = %self.id(), error = %err, "run finished with failure");
        }
        Ok(())
    }
}

impl Stoppable for ParallelJob {
    /// Cancels children that have not started, then stops the rest.
    /// Returns the first child failure after trying all of them.
    fn stop(&self) -> Result<(), LifecycleError> {
        self.support.cancel_all_pending_jobs();
        let mut first = None;
        for child in &self.children {
            if let Err(e) = child.stop() {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl Resettable for ParallelJob {
    fn soft_reset(&self) -> bool {
        self.children
            .iter()
            .fold(false, |any, child| child.soft_reset() || any)
    }

    fn hard_reset(&self) -> bool {
        let any = self
            .children
            .iter()
            .fold(false, |any, child| child.hard_reset() || any);
        self.support.reset();
        self.structure.recompute();
        any
    }
}

impl Destroyable for ParallelJob {
    fn destroy(&self) -> Result<(), LifecycleError> {
        self.structure.handler().assert_alive()?;
        if let Err(e) = self.stop() {
            tracing::warn!(component = %self.id(), error = %e, "destroying with children still running");
        }
        for child in &self.children {
            if let Err(e) = child.destroy() {
                tracing::debug!(component = %self.id(), error = %e, "child destroy refused");
            }
        }
        self.structure.destroy()
    }
}

impl Stateful for ParallelJob {
    fn last_state_event(&self) -> StateEvent {
        self.structure.last_state_event()
    }

    fn add_state_listener(&self, listener: Arc<dyn StateListener>) -> Result<(), LifecycleError> {
        self.structure.add_state_listener(listener)
    }

    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) {
        self.structure.remove_state_listener(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::executor::{InlineExecutor, ThreadExecutor};
    use crate::jobs::simple::{JobFn, JobResult, SimpleJob};
    use crate::state::{AnyState, JobState};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn simple(
        name: &'static str,
        f: impl Fn(&CancellationToken) -> Result<JobResult, JobError> + Send + Sync + 'static,
    ) -> Arc<SimpleJob> {
        Arc::new(SimpleJob::new(JobFn::arc(name, f)))
    }

    fn components(jobs: &[Arc<SimpleJob>]) -> Vec<Arc<dyn Component>> {
        jobs.iter()
            .map(|j| Arc::clone(j) as Arc<dyn Component>)
            .collect()
    }

    #[test]
    fn test_all_children_complete() {
        let jobs = [
            simple("a", |_| Ok(JobResult::Complete)),
            simple("b", |_| Ok(JobResult::Complete)),
        ];
        let parent = ParallelJob::new("parent", Arc::new(ThreadExecutor::new("par")), components(&jobs)).unwrap();
        assert_eq!(parent.state(), ParentState::Started);

        parent.run().unwrap();
        assert_eq!(parent.state(), ParentState::Complete);
        assert!(jobs.iter().all(|j| j.state() == JobState::Complete));
    }

    #[test]
    fn test_failing_child_dominates() {
        let jobs = [
            simple("ok", |_| Ok(JobResult::Complete)),
            simple("bad", |_| Err(JobError::fail("boom"))),
        ];
        let parent = ParallelJob::new("parent", Arc::new(InlineExecutor), components(&jobs)).unwrap();
        parent.run().unwrap();
        assert_eq!(parent.state(), ParentState::Exception);
    }

    #[test]
    fn test_refused_child_fails_batch() {
        let jobs = [simple("gone", |_| Ok(JobResult::Complete))];
        let parent = ParallelJob::new("parent", Arc::new(InlineExecutor), components(&jobs)).unwrap();
        jobs[0].destroy().unwrap();

        parent.run().unwrap();
        let ev = parent.last_state_event();
        assert_eq!(ev.state, AnyState::Parent(ParentState::Exception));
        assert!(ev.error_message().is_some());
    }

    #[test]
    fn test_hard_reset_rearms_children() {
        let jobs = [simple("a", |_| Ok(JobResult::Complete))];
        let parent = ParallelJob::new("parent", Arc::new(InlineExecutor), components(&jobs)).unwrap();
        parent.run().unwrap();
        assert_eq!(parent.state(), ParentState::Complete);

        assert!(parent.hard_reset());
        assert_eq!(jobs[0].state(), JobState::Ready);
        assert_eq!(parent.state(), ParentState::Started);
    }

    #[test]
    fn test_stop_cancels_running_children() {
        let jobs = [simple("spin", |ctx| {
            while !ctx.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(JobError::Canceled)
        })];
        let parent = Arc::new(
            ParallelJob::new("parent", Arc::new(ThreadExecutor::new("par")), components(&jobs)).unwrap(),
        );
        let runner = {
            let p = Arc::clone(&parent);
            std::thread::spawn(move || p.run())
        };
        while jobs[0].state() != JobState::Executing {
            std::thread::yield_now();
        }

        parent.stop().unwrap();
        runner.join().unwrap().unwrap();
        assert_eq!(parent.state(), ParentState::Incomplete);
    }

    #[test]
    fn test_destroy_detaches_everything() {
        let jobs = [simple("a", |_| Ok(JobResult::Complete))];
        let parent = ParallelJob::new("parent", Arc::new(InlineExecutor), components(&jobs)).unwrap();
        parent.destroy().unwrap();
        assert_eq!(parent.state(), ParentState::Destroyed);
        assert_eq!(jobs[0].state(), JobState::Destroyed);
        assert!(matches!(parent.run(), Err(LifecycleError::EntityDestroyed { .. })));
    }
}
