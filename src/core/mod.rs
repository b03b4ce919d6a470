//! Coordination helpers built on the state machine.
//!
//! - [`boundary`]: scoped diagnostic/component context around a unit of work;
//! - [`stop_wait`]: bounded wait for a component to leave a stoppable state;
//! - [`capability`]: the capability traits components implement.

mod boundary;
mod capability;
mod stop_wait;

pub use boundary::{BoundaryScope, ComponentBoundary};
pub use capability::{Component, Destroyable, Resettable, Runnable, Stoppable};
pub use stop_wait::StopWait;
