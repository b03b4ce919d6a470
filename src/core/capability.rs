//! # Component capabilities.
//!
//! A component is whatever implements a fixed set of small capability traits.
//! Foreign types are adapted by an explicit wrapper built at setup time (see
//! [`SimpleJob`](crate::SimpleJob), which adapts any [`Job`](crate::Job)).

use crate::error::LifecycleError;
use crate::state::Stateful;

/// Can be executed.
pub trait Runnable: Send + Sync {
    /// Runs to completion on the calling thread. Failures of the work itself are
    /// reported as state transitions; the `Err` path is for refused runs.
    fn run(&self) -> Result<(), LifecycleError>;
}

/// Accepts stop requests.
pub trait Stoppable: Send + Sync {
    /// Requests a stop and waits, bounded, for the component to settle.
    fn stop(&self) -> Result<(), LifecycleError>;
}

/// Can be returned to a runnable state.
pub trait Resettable: Send + Sync {
    /// Resets only after an incomplete or exceptional run. Returns `true` if reset.
    fn soft_reset(&self) -> bool;

    /// Resets from any finished state. Returns `true` if reset.
    fn hard_reset(&self) -> bool;
}

/// Can be destroyed; afterwards every mutation fails.
pub trait Destroyable: Send + Sync {
    fn destroy(&self) -> Result<(), LifecycleError>;
}

/// The full capability set expected of child components in containers.
pub trait Component: Runnable + Stoppable + Resettable + Destroyable + Stateful {}

impl<T> Component for T where T: Runnable + Stoppable + Resettable + Destroyable + Stateful {}
