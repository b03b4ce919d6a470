//! Remote notifications.
//!
//! - [`NotificationManager`]: one remote subscription per `(remote, kind)`, shared by
//!   any number of local listeners, with teardown by owning group.
//! - [`RemoteSubscriber`]: caller-supplied transport opening and closing remote streams.
//! - [`ListenerTracker`]: which group registered what.

mod manager;
mod notification;
mod remote;
mod tracker;

pub use manager::NotificationManager;
pub use notification::{
    Notification, NotificationKind, NotificationListener, RemoteId, SubscriptionKey,
};
pub use remote::RemoteSubscriber;
pub use tracker::{ListenerTracker, Registration};
