//! # Bounded wait for an entity to stop.
//!
//! [`StopWait`] turns the listener model into a blocking call with a deadline:
//! after a stop has been requested, wait until the target leaves its stoppable state.
//!
//! ## Flow
//! ```text
//! last state not STOPPABLE ─────────────────────────────► Ok (no listener added)
//! otherwise:
//!   add listener ─► handoff queue ◄── every new StateEvent
//!   loop recv(remaining budget):
//!     ├─ timeout            ─► FailedToStop(TimedOut)
//!     ├─ still STOPPABLE    ─► log, keep waiting
//!     ├─ not STOPPABLE      ─► Ok
//!     └─ interrupted        ─► FailedToStop(Interrupted)
//!   listener removed on every exit path (drop guard)
//! ```
//!
//! The target's own state is never changed by a failed wait.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{self as channel, RecvTimeoutError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DEFAULT_STOP_TIMEOUT};
use crate::error::{LifecycleError, StopFailure};
use crate::state::{AnyState, State, StateEvent, StateListener, Stateful};

/// Blocking or async wait for `target` to leave a stoppable state.
pub struct StopWait<'a> {
    target: &'a dyn Stateful,
    timeout: Duration,
}

impl<'a> StopWait<'a> {
    /// Waits up to [`DEFAULT_STOP_TIMEOUT`].
    pub fn new(target: &'a dyn Stateful) -> Self {
        Self {
            target,
            timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Uses [`Config::stop_timeout`]; a zero timeout checks once without waiting.
    pub fn from_config(target: &'a dyn Stateful, cfg: &Config) -> Self {
        Self {
            target,
            timeout: cfg.stop_wait().unwrap_or(Duration::ZERO),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Blocks the calling thread until the target is not stoppable or the timeout elapses.
    pub fn run(&self) -> Result<(), LifecycleError> {
        let current = self.target.last_state_event();
        if !current.state.is_stoppable() {
            return Ok(());
        }

        let (tx, rx) = channel::unbounded::<StateEvent>();
        let listener: Arc<dyn StateListener> = Arc::new(move |ev: &StateEvent| {
            let _ = tx.send(ev.clone());
        });
        let Some(_registration) = Registration::add(self.target, listener) else {
            return Ok(());
        };

        let deadline = Instant::now() + self.timeout;
        let mut last = current.state;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(ev) if ev.state.is_stoppable() => {
                    tracing::debug!(component = %ev.source, state = %ev.state, "still stoppable, waiting");
                    last = ev.state;
                }
                Ok(_) => return Ok(()),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(self.failed(last, StopFailure::TimedOut(self.timeout)));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.failed(last, StopFailure::Interrupted));
                }
            }
        }
    }

    /// Async variant; cancelling `interrupt` ends the wait with `FailedToStop(Interrupted)`.
    pub async fn run_async(&self, interrupt: &CancellationToken) -> Result<(), LifecycleError> {
        let current = self.target.last_state_event();
        if !current.state.is_stoppable() {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<StateEvent>();
        let listener: Arc<dyn StateListener> = Arc::new(move |ev: &StateEvent| {
            let _ = tx.send(ev.clone());
        });
        let Some(_registration) = Registration::add(self.target, listener) else {
            return Ok(());
        };

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut last = current.state;
        loop {
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => {
                    return Err(self.failed(last, StopFailure::Interrupted));
                }
                recv = tokio::time::timeout_at(deadline, rx.recv()) => match recv {
                    Ok(Some(ev)) if ev.state.is_stoppable() => {
                        tracing::debug!(component = %ev.source, state = %ev.state, "still stoppable, waiting");
                        last = ev.state;
                    }
                    Ok(Some(_)) => return Ok(()),
                    Ok(None) => return Err(self.failed(last, StopFailure::Interrupted)),
                    Err(_elapsed) => {
                        return Err(self.failed(last, StopFailure::TimedOut(self.timeout)));
                    }
                }
            }
        }
    }

    fn failed(&self, last: AnyState, reason: StopFailure) -> LifecycleError {
        let owner = self.target.last_state_event().source;
        tracing::warn!(component = %owner, state = %last, ?reason, "failed to stop");
        LifecycleError::FailedToStop {
            owner,
            last,
            reason,
        }
    }
}

/// Temporary listener registration, removed on drop.
struct Registration<'a> {
    target: &'a dyn Stateful,
    listener: Arc<dyn StateListener>,
}

impl<'a> Registration<'a> {
    /// `None` if the target refused the listener (destroyed, hence not stoppable).
    fn add(target: &'a dyn Stateful, listener: Arc<dyn StateListener>) -> Option<Self> {
        target.add_state_listener(Arc::clone(&listener)).ok()?;
        Some(Self { target, listener })
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.target.remove_state_listener(&self.listener);
    }
}
