//! # LogObserver: state events as tracing records
//!
//! Writes every event through `tracing`, with the level chosen by the state's flags:
//!
//! ```text
//! EXCEPTION            ─► warn!  {component, state, seq, error}
//! DESTROYED            ─► debug! {component, seq}
//! anything else        ─► info!  {component, state, seq}
//! ```

use async_trait::async_trait;

use crate::state::{State, StateEvent};

use super::observe::Observe;

/// Observer that logs each state event.
#[derive(Debug, Default)]
pub struct LogObserver;

impl LogObserver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Observe for LogObserver {
    async fn on_state_event(&self, e: &StateEvent) {
        if e.state.is_exception() {
            tracing::warn!(
                component = %e.source,
                state = %e.state,
                seq = e.seq,
                error = e.error_message().as_deref().unwrap_or("unknown"),
                "[exception]"
            );
        } else if e.state.is_destroyed() {
            tracing::debug!(component = %e.source, seq = e.seq, "[destroyed]");
        } else {
            tracing::info!(component = %e.source, state = %e.state, seq = e.seq, "[state]");
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::observers::ObserverSet;
    use crate::state::{JobState, StateHandler, StateListener};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_log_observer_handles_every_state() {
        let observers = Arc::new(ObserverSet::new(vec![Arc::new(LogObserver::new())]));
        let handler = StateHandler::new("job", JobState::Ready);
        handler
            .add_state_listener(Arc::clone(&observers) as Arc<dyn StateListener>)
            .unwrap();

        handler.run_locked(|g| g.set_state(JobState::Executing)).unwrap();
        handler
            .run_locked(|g| g.set_exception(JobState::Exception, Arc::new(JobError::fail("io"))))
            .unwrap();
        handler.run_locked(|g| g.set_state(JobState::Destroyed)).unwrap();

        observers.shutdown().await;
        assert_eq!(handler.last_state_event().seq, 3);
    }
}
