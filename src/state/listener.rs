//! # Listener contract and the stateful capability.
//!
//! Anything with a lifecycle exposes [`Stateful`]; observers implement
//! [`StateListener`]. Listener identity is the `Arc` allocation: the same
//! `Arc` must be passed to `remove_state_listener` that was added.

use std::sync::Arc;

use crate::error::LifecycleError;

use super::event::StateEvent;

/// Receives state events.
///
/// Called synchronously on the thread that delivers the event. Implementations
/// should be quick; hand slow work to a queue (see [`ObserverSet`](crate::ObserverSet)).
pub trait StateListener: Send + Sync {
    fn on_state_event(&self, event: &StateEvent);
}

impl<F> StateListener for F
where
    F: Fn(&StateEvent) + Send + Sync,
{
    fn on_state_event(&self, event: &StateEvent) {
        self(event)
    }
}

/// Exposes a lifecycle to observers (monitors, persistence, remote bridges).
pub trait Stateful: Send + Sync {
    /// The most recently committed event. Never blocks on listeners.
    fn last_state_event(&self) -> StateEvent;

    /// Registers `listener` and delivers the current event to it before returning.
    fn add_state_listener(&self, listener: Arc<dyn StateListener>) -> Result<(), LifecycleError>;

    /// Deregisters `listener`; unknown listeners are ignored.
    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>);
}

/// Compares two listeners by allocation, ignoring vtables.
pub(crate) fn same_listener<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
