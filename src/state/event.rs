//! # Lifecycle events.
//!
//! A [`StateEvent`] is an immutable snapshot `{source, state, seq, at, error}`
//! produced exactly once per transition by a
//! [`StateHandler`](crate::state::StateHandler). A later correction is a new event.
//!
//! ## Ordering guarantees
//! `seq` is per owner: the initial event has `seq = 0` and each transition adds one.
//! Consumers that may see events out of order (remote bridges, aggregators) reject
//! anything with `seq <= last_seq`.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use super::space::AnyState;

/// Shareable error carried by exception-flagged events.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// Opaque identity of a component.
///
/// Only used as a map/log key and for display; the core never inspects it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Arc<str>);

impl ComponentId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        ComponentId::new(s)
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        ComponentId::new(s)
    }
}

/// Immutable snapshot of one entity's state at one point in time.
#[derive(Clone)]
pub struct StateEvent {
    /// Owner of the state.
    pub source: ComponentId,
    /// The state entered.
    pub state: AnyState,
    /// Per-owner sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Cause of an exception-flagged state.
    pub error: Option<SharedError>,
}

impl StateEvent {
    pub(crate) fn new(
        source: ComponentId,
        state: AnyState,
        seq: u64,
        error: Option<SharedError>,
    ) -> Self {
        Self {
            source,
            state,
            seq,
            at: SystemTime::now(),
            error,
        }
    }

    /// Error message of the cause, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

impl fmt::Debug for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEvent")
            .field("source", &self.source)
            .field("state", &self.state)
            .field("seq", &self.seq)
            .field("at", &self.at)
            .field("error", &self.error_message())
            .finish()
    }
}

impl fmt::Display for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} #{}", self.source, self.state, self.seq)?;
        if let Some(e) = &self.error {
            write!(f, " ({e})")?;
        }
        Ok(())
    }
}
