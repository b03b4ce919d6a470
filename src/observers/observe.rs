//! # Observer trait
//!
//! `Observe` is the extension point for slow consumers of state events: audit
//! trails, persistence ("save on state change"), dashboards, remote bridges.
//! Each observer is driven by its own worker task fed by a bounded queue owned by
//! the [`ObserverSet`](super::ObserverSet), so it never blocks the thread that
//! committed the transition.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use jobvisor::{Observe, StateEvent};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Observe for Audit {
//!     async fn on_state_event(&self, event: &StateEvent) {
//!         let _ = event; // write audit record...
//!     }
//!
//!     fn name(&self) -> &'static str { "audit" }
//!
//!     fn queue_capacity(&self) -> Option<usize> { Some(512) }
//! }
//! ```

use async_trait::async_trait;

use crate::state::StateEvent;

/// Asynchronous consumer of state events.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    async fn on_state_event(&self, event: &StateEvent);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity; `None` uses [`Config::observer_queue_capacity`](crate::Config).
    ///
    /// On overflow, events for this observer are dropped and a warning is logged.
    fn queue_capacity(&self) -> Option<usize> {
        None
    }
}
