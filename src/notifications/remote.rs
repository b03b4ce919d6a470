//! Remote subscription transport.

use async_trait::async_trait;

use crate::error::RemoteError;

use super::notification::{NotificationKind, RemoteId};

/// # Transport that opens and closes remote notification streams.
///
/// Supplied by the caller. Calls may be slow; the manager never holds a lock
/// shared with other keys while awaiting them.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use jobvisor::{NotificationKind, RemoteError, RemoteId, RemoteSubscriber};
///
/// struct Loopback;
///
/// #[async_trait]
/// impl RemoteSubscriber for Loopback {
///     async fn subscribe(&self, _id: RemoteId, _kind: &NotificationKind) -> Result<(), RemoteError> {
///         Ok(())
///     }
///
///     async fn unsubscribe(&self, _id: RemoteId, _kind: &NotificationKind) -> Result<(), RemoteError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteSubscriber: Send + Sync + 'static {
    async fn subscribe(&self, remote_id: RemoteId, kind: &NotificationKind) -> Result<(), RemoteError>;

    async fn unsubscribe(
        &self,
        remote_id: RemoteId,
        kind: &NotificationKind,
    ) -> Result<(), RemoteError>;
}
