//! Jobs, executors and batch tracking.
//!
//! - [`Job`] / [`JobFn`] define the unit of work; [`SimpleJob`] puts one under lifecycle control.
//! - [`Executor`] runs work somewhere: inline, on named threads or on tokio's blocking pool.
//! - [`JobHandle`] tracks one submitted unit; [`AsyncExecutionSupport`] turns a set of
//!   handles into a single completion or error callback.
//! - [`ParallelJob`] runs child components concurrently and aggregates their state.

mod batch;
mod executor;
mod handle;
mod parallel;
mod simple;

pub use batch::AsyncExecutionSupport;
pub use executor::{Executor, InlineExecutor, ThreadExecutor, TokioExecutor, Work};
pub use handle::{JobHandle, JobOutcome};
pub use parallel::ParallelJob;
pub use simple::{Job, JobFn, JobRef, JobResult, SimpleJob};
