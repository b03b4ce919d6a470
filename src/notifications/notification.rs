//! Remote notification types.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::state::StateEvent;

/// Identity of a remote peer (agent, node, endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteId(pub u64);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote#{}", self.0)
    }
}

impl From<u64> for RemoteId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Notification type, e.g. `"state_change"` or `"log"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationKind(Arc<str>);

impl NotificationKind {
    pub const STATE_CHANGE: &'static str = "state_change";

    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self(kind.into())
    }

    /// Kind used by [`Notification::state_change`].
    pub fn state_change() -> Self {
        Self::new(Self::STATE_CHANGE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotificationKind({})", self.0)
    }
}

impl From<&str> for NotificationKind {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for NotificationKind {
    fn from(kind: String) -> Self {
        Self::new(kind)
    }
}

/// The `(remote, kind)` pair backing one remote subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub remote_id: RemoteId,
    pub kind: NotificationKind,
}

impl SubscriptionKey {
    pub fn new(remote_id: impl Into<RemoteId>, kind: impl Into<NotificationKind>) -> Self {
        Self {
            remote_id: remote_id.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.remote_id, self.kind)
    }
}

/// Inbound event from a remote peer.
#[derive(Debug, Clone)]
pub struct Notification {
    pub remote_id: RemoteId,
    pub kind: NotificationKind,
    /// Sender-side sequence number.
    pub seq: u64,
    pub at: SystemTime,
    /// Opaque payload.
    pub data: Option<Arc<str>>,
}

impl Notification {
    pub fn new(remote_id: impl Into<RemoteId>, kind: impl Into<NotificationKind>, seq: u64) -> Self {
        Self {
            remote_id: remote_id.into(),
            kind: kind.into(),
            seq,
            at: SystemTime::now(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Arc<str>>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Mirrors a local state transition as a notification from `remote_id`.
    ///
    /// The payload is `"<component>:<STATE>"`; `seq` and `at` are taken from the event.
    pub fn state_change(remote_id: impl Into<RemoteId>, event: &StateEvent) -> Self {
        Self {
            remote_id: remote_id.into(),
            kind: NotificationKind::state_change(),
            seq: event.seq,
            at: event.at,
            data: Some(format!("{}:{}", event.source, event.state).into()),
        }
    }

    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            remote_id: self.remote_id,
            kind: self.kind.clone(),
        }
    }
}

/// Receives notifications for the keys it is registered under.
///
/// Called synchronously by [`NotificationManager::handle_notification`](super::NotificationManager::handle_notification).
/// Identity is the `Arc` allocation.
pub trait NotificationListener: Send + Sync {
    fn on_notification(&self, notification: &Notification);
}

impl<F> NotificationListener for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn on_notification(&self, notification: &Notification) {
        self(notification)
    }
}
