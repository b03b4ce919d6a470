//! Lifecycle states, events and the per-entity state machine.
//!
//! ## Contents
//! - [`StateFlags`], [`State`] and the closed state spaces ([`JobState`], [`ServiceState`],
//!   [`ParentState`], [`TimerState`], [`EventState`], erased as [`AnyState`])
//! - [`StateEvent`] immutable, sequenced snapshot of one transition
//! - [`StateHandler`] locked mutation with listener delivery after release
//! - [`StateOperator`] pure aggregation of child states, driven by [`StructuralState`]
//! - [`registry`] read-only icon and parent-conversion tables

mod event;
mod flags;
mod handler;
mod listener;
mod operator;
pub mod registry;
mod space;
mod structural;

pub use event::{ComponentId, SharedError, StateEvent};
pub use flags::StateFlags;
pub use handler::{StateGuard, StateHandler};
pub use listener::{StateListener, Stateful};
pub(crate) use listener::same_listener;
pub use operator::{AnyCompleteStateOp, StandardStateOp, StateOperator, WorstStateOp};
pub use space::{AnyState, EventState, JobState, ParentState, ServiceState, State, TimerState};
pub use structural::StructuralState;
