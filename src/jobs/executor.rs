//! # Executors.
//!
//! The core never owns a thread pool; callers hand in an [`Executor`].
//!
//! - [`InlineExecutor`]: runs the work on the calling thread.
//! - [`ThreadExecutor`]: one named OS thread per unit of work.
//! - [`TokioExecutor`]: `spawn_blocking` on a tokio runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;

use crate::config::Config;

/// A unit of work handed to an executor.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Runs units of work, now or later, on some thread.
///
/// Dropping a unit without running it is allowed; tracked jobs observe that as cancellation.
pub trait Executor: Send + Sync {
    fn execute(&self, work: Work);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, work: Work) {
        (**self).execute(work)
    }
}

/// Runs work immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, work: Work) {
        work()
    }
}

/// Spawns a named OS thread per unit of work.
#[derive(Debug)]
pub struct ThreadExecutor {
    prefix: String,
    spawned: AtomicU64,
}

impl ThreadExecutor {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            spawned: AtomicU64::new(0),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.thread_name_prefix.clone())
    }

    /// Number of threads spawned so far.
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, work: Work) {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{n}", self.prefix);
        let spawned = std::thread::Builder::new().name(name.clone()).spawn(work);
        if let Err(e) = spawned {
            // The closure was consumed by the failed spawn and is dropped here,
            // which tracked jobs report as cancellation.
            tracing::error!(thread = %name, error = %e, "failed to spawn worker thread");
        }
    }
}

/// Runs work on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor on the runtime of the calling context, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, work: Work) {
        drop(self.handle.spawn_blocking(work));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel as channel;
    use std::time::Duration;

    #[test]
    fn test_inline_runs_on_caller_thread() {
        let caller = std::thread::current().id();
        let (tx, rx) = channel::bounded(1);
        InlineExecutor.execute(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));
        assert_eq!(rx.try_recv().unwrap(), caller);
    }

    #[test]
    fn test_thread_executor_names_threads() {
        let exec = ThreadExecutor::new("test-worker");
        let (tx, rx) = channel::bounded(1);
        exec.execute(Box::new(move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("test-worker-0"));
        assert_eq!(exec.spawned(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_executor_runs_blocking_work() {
        let exec = TokioExecutor::try_current().expect("inside runtime");
        let (tx, rx) = tokio::sync::oneshot::channel();
        exec.execute(Box::new(move || {
            let _ = tx.send(42);
        }));
        assert_eq!(rx.await.unwrap(), 42);
    }
}
