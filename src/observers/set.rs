//! # ObserverSet: non-blocking fan-out of state events
//!
//! [`ObserverSet`] is a [`StateListener`]: register it on any [`Stateful`](crate::Stateful)
//! and every committed [`StateEvent`] is queued for each observer without waiting
//! for them.
//!
//! ## Guarantees
//! - `on_state_event` returns immediately.
//! - Per-observer FIFO, so each observer sees one owner's events in `seq` order.
//! - Panics inside observers are caught and logged.
//!
//! ## Not guaranteed
//! - No ordering across observers.
//! - No retries: when an observer's queue is full the event is dropped for it.
//!
//! ```text
//! StateHandler ── on_state_event(&ev) ──► Arc<StateEvent>
//!                                           ├──► [queue O1] ─► worker O1 ─► on_state_event()
//!                                           ├──► [queue O2] ─► worker O2 ─► on_state_event()
//!                                           └──► [queue ON] ─► worker ON ─► on_state_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::panic_message;
use crate::state::{StateEvent, StateListener};

use super::observe::Observe;

struct ObserverChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<StateEvent>>,
}

/// Fan-out with per-observer bounded queues and worker tasks.
pub struct ObserverSet {
    channels: Mutex<Vec<ObserverChannel>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ObserverSet {
    /// Spawns one worker per observer on the current tokio runtime.
    ///
    /// # Panics
    /// Outside a tokio runtime; use [`with_handle`](Self::with_handle) there.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>) -> Self {
        Self::with_handle(observers, &Config::default(), &Handle::current())
    }

    #[must_use]
    pub fn with_handle(observers: Vec<Arc<dyn Observe>>, cfg: &Config, handle: &Handle) -> Self {
        let mut channels = Vec::with_capacity(observers.len());
        let mut workers = Vec::with_capacity(observers.len());

        for obs in observers {
            let cap = obs
                .queue_capacity()
                .map_or_else(|| cfg.observer_queue_capacity_clamped(), |c| c.max(1));
            let name = obs.name();
            let (tx, mut rx) = mpsc::channel::<Arc<StateEvent>>(cap);

            workers.push(handle.spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = obs.on_state_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        tracing::error!(
                            observer = obs.name(),
                            component = %ev.source,
                            seq = ev.seq,
                            "observer panicked: {}",
                            panic_message(panic.as_ref())
                        );
                    }
                }
            }));
            channels.push(ObserverChannel { name, sender: tx });
        }

        Self {
            channels: Mutex::new(channels),
            workers: Mutex::new(workers),
        }
    }

    /// Queues one event for every observer.
    pub fn emit(&self, event: &StateEvent) {
        let ev = Arc::new(event.clone());
        for channel in self.channels.lock().iter() {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        observer = channel.name,
                        component = %ev.source,
                        seq = ev.seq,
                        "observer dropped event: queue full"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(
                        observer = channel.name,
                        component = %ev.source,
                        seq = ev.seq,
                        "observer dropped event: worker closed"
                    );
                }
            }
        }
    }

    /// Closes all queues and waits for the workers to drain them.
    ///
    /// Events emitted afterwards are dropped silently.
    pub async fn shutdown(&self) {
        self.channels.lock().clear();
        let workers = std::mem::take(&mut *self.workers.lock());
        for w in workers {
            let _ = w.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }
}

impl StateListener for ObserverSet {
    fn on_state_event(&self, event: &StateEvent) {
        self.emit(event);
    }
}
