//! Error types used by the jobvisor core.
//!
//! - [`LifecycleError`]: a lifecycle operation was refused or could not finish.
//! - [`JobError`]: a single unit of work failed.
//! - [`BatchError`]: a tracked asynchronous job failed; routed to the batch's error callback.
//! - [`RemoteError`] / [`RemoteSubscriptionError`]: remote subscribe/unsubscribe failures.
//!
//! All enums provide `as_label` (stable snake_case, for logs/metrics) and `as_message`.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

use crate::notifications::{NotificationKind, RemoteId};
use crate::state::{AnyState, ComponentId};

/// Why a [`StopWait`](crate::StopWait) gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopFailure {
    /// The entity was still stoppable when the budget ran out.
    TimedOut(Duration),
    /// The waiting side was interrupted before the entity settled.
    Interrupted,
}

/// # Errors raised by lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum LifecycleError {
    /// The entity's last event carries `DESTROYED`; no further mutation is accepted.
    #[error("{owner} has been destroyed")]
    EntityDestroyed {
        /// Identity of the destroyed entity.
        owner: ComponentId,
    },

    /// The entity did not leave a stoppable state in time.
    #[error("{owner} failed to stop ({reason:?}); last state {last}")]
    FailedToStop {
        /// Identity of the entity being waited on.
        owner: ComponentId,
        /// Last state observed by the waiter.
        last: AnyState,
        /// Timeout or interruption.
        reason: StopFailure,
    },
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use jobvisor::{ComponentId, LifecycleError};
    ///
    /// let err = LifecycleError::EntityDestroyed { owner: ComponentId::new("job") };
    /// assert_eq!(err.as_label(), "entity_destroyed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::EntityDestroyed { .. } => "entity_destroyed",
            LifecycleError::FailedToStop { .. } => "failed_to_stop",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LifecycleError::EntityDestroyed { owner } => format!("destroyed: {owner}"),
            LifecycleError::FailedToStop {
                owner,
                last,
                reason: StopFailure::TimedOut(waited),
            } => format!("{owner} still {last} after {waited:?}"),
            LifecycleError::FailedToStop {
                owner,
                last,
                reason: StopFailure::Interrupted,
            } => format!("interrupted waiting for {owner} to leave {last}"),
        }
    }
}

/// # Errors produced by a unit of work.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The job observed a stop request and gave up.
    #[error("job cancelled")]
    Canceled,

    /// The job panicked; the panic was caught at the executor boundary.
    #[error("job panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },
}

impl JobError {
    /// Shorthand for [`JobError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        JobError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Fail { .. } => "job_failed",
            JobError::Canceled => "job_canceled",
            JobError::Panicked { .. } => "job_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            JobError::Fail { error } => format!("error: {error}"),
            JobError::Canceled => "cancelled".to_string(),
            JobError::Panicked { info } => format!("panic: {info}"),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        JobError::Panicked {
            info: panic_message(payload.as_ref()),
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// # A tracked asynchronous job failed.
///
/// Delivered to the batch's `on_error` callback, never to the submitting thread.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// A job in the batch finished with an error other than cancellation.
    #[error("job #{job} failed: {source}")]
    JobFailed {
        /// Batch-local id of the failed job.
        job: u64,
        /// The job's error.
        source: JobError,
    },
}

impl BatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BatchError::JobFailed { .. } => "batch_job_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BatchError::JobFailed { job, source } => {
                format!("job #{job}: {}", source.as_message())
            }
        }
    }
}

/// Failure reported by a remote subscribe/unsubscribe callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote call failed: {message}")]
pub struct RemoteError {
    /// Transport-specific description.
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// # Remote subscription bookkeeping failed.
///
/// Propagated to the caller of the add/remove operation that triggered it.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteSubscriptionError {
    /// The underlying `subscribe` call failed; the listener was not registered.
    #[error("subscribe {kind} on {remote_id} failed: {source}")]
    Subscribe {
        remote_id: RemoteId,
        kind: NotificationKind,
        source: RemoteError,
    },

    /// The underlying `unsubscribe` call failed; the listener stays registered.
    #[error("unsubscribe {kind} on {remote_id} failed: {source}")]
    Unsubscribe {
        remote_id: RemoteId,
        kind: NotificationKind,
        source: RemoteError,
    },

    /// The listener is already registered for this key by another group.
    #[error("listener for {kind} on {remote_id} already belongs to {owner}")]
    ForeignListener {
        remote_id: RemoteId,
        kind: NotificationKind,
        owner: ComponentId,
    },
}

impl RemoteSubscriptionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RemoteSubscriptionError::Subscribe { .. } => "remote_subscribe_failed",
            RemoteSubscriptionError::Unsubscribe { .. } => "remote_unsubscribe_failed",
            RemoteSubscriptionError::ForeignListener { .. } => "remote_foreign_listener",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RemoteSubscriptionError::Subscribe {
                remote_id,
                kind,
                source,
            } => format!("subscribe {remote_id}/{kind}: {}", source.message),
            RemoteSubscriptionError::Unsubscribe {
                remote_id,
                kind,
                source,
            } => format!("unsubscribe {remote_id}/{kind}: {}", source.message),
            RemoteSubscriptionError::ForeignListener {
                remote_id,
                kind,
                owner,
            } => format!("{remote_id}/{kind}: listener owned by {owner}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobState;

    #[test]
    fn test_labels_are_stable() {
        let owner = ComponentId::new("job");
        assert_eq!(
            LifecycleError::FailedToStop {
                owner,
                last: JobState::Executing.into(),
                reason: StopFailure::Interrupted,
            }
            .as_label(),
            "failed_to_stop"
        );
        assert_eq!(JobError::Canceled.as_label(), "job_canceled");
        assert_eq!(
            BatchError::JobFailed {
                job: 1,
                source: JobError::fail("x")
            }
            .as_label(),
            "batch_job_failed"
        );
    }

    #[test]
    fn test_panic_payload_is_extracted() {
        let err = JobError::from_panic(Box::new("boom"));
        assert_eq!(
            err,
            JobError::Panicked {
                info: "boom".into()
            }
        );
        let err = JobError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.as_message(), "panic: owned");
    }
}
