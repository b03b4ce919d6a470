//! # Runtime configuration.
//!
//! Provides [`Config`] centralized settings for the coordination helpers.
//!
//! Config is used by:
//! 1. **Stop waiting**: `StopWait::from_config(target, &config)`
//! 2. **Thread executors**: `ThreadExecutor::from_config(&config)`
//! 3. **Observer fan-out**: default queue capacity of `ObserverSet`
//!
//! ## Sentinel values
//! - `stop_timeout = 0s` → check once, never wait
//! - `observer_queue_capacity = 0` → clamped to 1

use std::time::Duration;

/// Default bound for [`StopWait`](crate::StopWait).
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(5000);

/// Global configuration for the coordination core.
///
/// ## Field semantics
/// - `stop_timeout`: Maximum wait for a stoppable entity to settle (`0s` = no wait)
/// - `thread_name_prefix`: Prefix of threads spawned by `ThreadExecutor`
/// - `observer_queue_capacity`: Per-observer queue size used when an observer does not declare one
#[derive(Clone, Debug)]
pub struct Config {
    /// How long a stop request waits for the target to leave its stoppable state.
    pub stop_timeout: Duration,

    /// Name prefix for worker threads; a sequence number is appended.
    pub thread_name_prefix: String,

    /// Fallback queue capacity for observers.
    pub observer_queue_capacity: usize,
}

impl Config {
    /// Returns the stop timeout as an `Option`.
    ///
    /// - `None` → do not wait, check once
    /// - `Some(d)` → wait up to `d`
    #[inline]
    pub fn stop_wait(&self) -> Option<Duration> {
        if self.stop_timeout == Duration::ZERO {
            None
        } else {
            Some(self.stop_timeout)
        }
    }

    /// Returns the observer queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn observer_queue_capacity_clamped(&self) -> usize {
        self.observer_queue_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `stop_timeout = 5s`
    /// - `thread_name_prefix = "jobvisor-worker"`
    /// - `observer_queue_capacity = 1024`
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            thread_name_prefix: "jobvisor-worker".to_string(),
            observer_queue_capacity: 1024,
        }
    }
}
