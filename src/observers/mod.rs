//! Asynchronous observers of state events.
//!
//! - [`Observe`]: slow consumers (audit, persistence, dashboards).
//! - [`ObserverSet`]: a [`StateListener`](crate::StateListener) queueing events per observer.
//! - [`LogObserver`]: logs each event through `tracing`.

mod log;
mod observe;
mod set;

pub use log::LogObserver;
pub use observe::Observe;
pub use set::ObserverSet;
