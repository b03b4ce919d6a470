//! # jobvisor
//!
//! **Jobvisor** is the lifecycle and coordination core of a job orchestration system.
//!
//! Every runnable entity (job, service, timer, event source, container) owns a
//! [`StateHandler`] holding its current lifecycle state. Transitions are committed
//! under the handler's lock and broadcast afterwards, in order, to listeners such as
//! monitors, persistence hooks and remote bridges. Containers derive their own state
//! from their children through a [`StateOperator`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  SimpleJob   │   │  SimpleJob   │   │  SimpleJob   │
//!     │ (Job #1)     │   │ (Job #2)     │   │ (Job #3)     │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ StateEvent       │ StateEvent       │ StateEvent
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ParallelJob (container)                                          │
//! │  - AsyncExecutionSupport (submit, cancel, completion barrier)     │
//! │  - StructuralState (StateOperator over child snapshots)           │
//! │  - Executor (inline, named threads, tokio blocking pool)          │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                │ StateEvent (ParentState)
//!                                ▼
//!                 ┌──────────────────────────────┐
//!                 │   listeners (synchronous)    │
//!                 └──┬───────────┬───────────┬───┘
//!                    ▼           ▼           ▼
//!               StopWait    ObserverSet   remote bridge
//!              (bounded)   (per-observer  (Notification::state_change)
//!                            queues)
//!
//! inbound:  transport ─► NotificationManager::handle_notification ─► listeners[(remote, kind)]
//! ```
//!
//! ### Lifecycle
//! ```text
//! READY ─run─► EXECUTING ─┬─► COMPLETE
//!                         ├─► INCOMPLETE   (stopped / cancelled)
//!                         └─► EXCEPTION    (error recorded on the event)
//! INCOMPLETE | EXCEPTION ─soft_reset─► READY
//! any finished state     ─hard_reset─► READY
//! any                    ─destroy────► DESTROYED (terminal; further mutation fails)
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                                   |
//! |-------------------|----------------------------------------------------------------|------------------------------------------------------|
//! | **State**         | Flags, state spaces, sequenced events, ordered delivery.       | [`StateHandler`], [`StateEvent`], [`Stateful`]       |
//! | **Aggregation**   | Container state derived from children.                         | [`StateOperator`], [`StructuralState`]               |
//! | **Jobs**          | Units of work under lifecycle control.                         | [`Job`], [`JobFn`], [`SimpleJob`], [`ParallelJob`]   |
//! | **Batches**       | Submit, cancel and await groups of asynchronous jobs.          | [`AsyncExecutionSupport`], [`Executor`]              |
//! | **Stopping**      | Bounded wait for a stop request to take effect.                | [`StopWait`]                                         |
//! | **Context**       | Scoped tracing span and component identity around work.        | [`ComponentBoundary`]                                |
//! | **Notifications** | One remote subscription per key, group teardown.               | [`NotificationManager`], [`RemoteSubscriber`]        |
//! | **Observers**     | Asynchronous fan-out of state events.                          | [`Observe`], [`ObserverSet`], [`LogObserver`]        |
//! | **Errors**        | Typed errors with stable labels.                               | [`LifecycleError`], [`JobError`], [`BatchError`]     |
//! | **Configuration** | Centralized settings.                                          | [`Config`]                                           |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{
//!     Component, JobError, JobFn, JobResult, ParallelJob, ParentState, Runnable, SimpleJob,
//!     StateEvent, Stateful, ThreadExecutor,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extract = Arc::new(SimpleJob::new(JobFn::arc("extract", |_ctx: &CancellationToken| {
//!         Ok::<_, JobError>(JobResult::Complete)
//!     })));
//!     let load = Arc::new(SimpleJob::new(JobFn::arc("load", |ctx: &CancellationToken| {
//!         if ctx.is_cancelled() {
//!             return Err(JobError::Canceled);
//!         }
//!         Ok(JobResult::Complete)
//!     })));
//!
//!     let children: Vec<Arc<dyn Component>> = vec![extract, load];
//!     let pipeline = ParallelJob::new("pipeline", Arc::new(ThreadExecutor::default()), children)?;
//!
//!     pipeline.add_state_listener(Arc::new(|ev: &StateEvent| {
//!         println!("{ev}");
//!     }))?;
//!
//!     pipeline.run()?;
//!     assert_eq!(pipeline.state(), ParentState::Complete);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod jobs;
mod notifications;
mod observers;
mod state;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_STOP_TIMEOUT};
pub use core::{
    BoundaryScope, Component, ComponentBoundary, Destroyable, Resettable, Runnable, StopWait,
    Stoppable,
};
pub use error::{
    BatchError, JobError, LifecycleError, RemoteError, RemoteSubscriptionError, StopFailure,
};
pub use jobs::{
    AsyncExecutionSupport, Executor, InlineExecutor, Job, JobFn, JobHandle, JobOutcome, JobRef,
    JobResult, ParallelJob, SimpleJob, ThreadExecutor, TokioExecutor, Work,
};
pub use notifications::{
    ListenerTracker, Notification, NotificationKind, NotificationListener, NotificationManager,
    Registration, RemoteId, RemoteSubscriber, SubscriptionKey,
};
pub use observers::{LogObserver, Observe, ObserverSet};
pub use state::registry;
pub use state::{
    AnyCompleteStateOp, AnyState, ComponentId, EventState, JobState, ParentState, ServiceState,
    SharedError, StandardStateOp, State, StateEvent, StateFlags, StateGuard, StateHandler,
    StateListener, StateOperator, Stateful, StructuralState, TimerState, WorstStateOp,
};
