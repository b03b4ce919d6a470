//! # Deduplicated remote notification subscriptions.
//!
//! [`NotificationManager`] lets any number of local listeners follow a
//! `(remote, kind)` stream while keeping exactly one remote subscription per key.
//!
//! ## Architecture
//! ```text
//! add(group, key, l) ─► entry(key) ─► gate.lock().await
//!                                       ├─ first listener? ─► remote.subscribe(key).await
//!                                       │                       └─ Err ─► listener not added, Err
//!                                       └─ listeners += l, tracker.track(group)
//! remove(key, l)     ─► gate.lock().await
//!                         ├─ last listener? ─► remote.unsubscribe(key).await
//!                         │                       └─ Err ─► listener stays, Err
//!                         └─ listeners -= l, prune empty entry
//! handle_notification(n) ─► snapshot listeners[key] ─► on_notification (panics caught)
//! ```
//!
//! ## Rules
//! - Remote calls for one key are serialized by that key's gate; no lock shared
//!   with other keys or with dispatch is held while they run.
//! - A listener is registered at most once per key; repeated adds are no-ops.
//! - Dispatch works on a snapshot: a concurrently added listener either sees the
//!   notification once or not at all.
//! - Failed remote calls leave the bookkeeping as it was, so retrying is safe.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::error::{RemoteSubscriptionError, panic_message};
use crate::state::{ComponentId, same_listener};

use super::notification::{Notification, NotificationKind, NotificationListener, RemoteId, SubscriptionKey};
use super::remote::RemoteSubscriber;
use super::tracker::ListenerTracker;

#[derive(Clone)]
struct Registered {
    group: ComponentId,
    listener: Arc<dyn NotificationListener>,
}

#[derive(Default)]
struct KeyEntry {
    /// Serializes remote calls and listener changes for this key.
    gate: tokio::sync::Mutex<()>,
    listeners: Mutex<Arc<Vec<Registered>>>,
    subscribed: AtomicBool,
    /// Set once the entry left the map; holders must look the key up again.
    retired: AtomicBool,
}

impl KeyEntry {
    fn snapshot(&self) -> Arc<Vec<Registered>> {
        Arc::clone(&self.listeners.lock())
    }

    fn find(&self, listener: &Arc<dyn NotificationListener>) -> Option<Registered> {
        self.listeners
            .lock()
            .iter()
            .find(|r| same_listener(&r.listener, listener))
            .cloned()
    }

    fn len(&self) -> usize {
        self.listeners.lock().len()
    }
}

/// Reference-counted remote subscriptions with group teardown.
pub struct NotificationManager {
    remote: Arc<dyn RemoteSubscriber>,
    keys: RwLock<HashMap<SubscriptionKey, Arc<KeyEntry>>>,
    tracker: ListenerTracker,
}

impl NotificationManager {
    pub fn new(remote: Arc<dyn RemoteSubscriber>) -> Self {
        Self {
            remote,
            keys: RwLock::new(HashMap::new()),
            tracker: ListenerTracker::new(),
        }
    }

    /// Registers `listener` for `(remote_id, kind)` on behalf of `group`.
    ///
    /// The first listener for a key opens the remote subscription before this returns.
    /// Adding a listener again under the same group is a no-op; under another group it
    /// fails with [`RemoteSubscriptionError::ForeignListener`].
    ///
    /// Dropping the future while `subscribe` is in flight leaves the listener
    /// unregistered and the key's entry pruned. The remote side may still have opened
    /// the stream; the manager does not track it.
    pub async fn add_notification_listener(
        &self,
        group: impl Into<ComponentId>,
        remote_id: RemoteId,
        kind: impl Into<NotificationKind>,
        listener: Arc<dyn NotificationListener>,
    ) -> Result<(), RemoteSubscriptionError> {
        let group = group.into();
        let key = SubscriptionKey::new(remote_id, kind);

        loop {
            let entry = self.entry(&key);
            let _gate = entry.gate.lock().await;
            if entry.retired.load(Ordering::Acquire) {
                continue;
            }
            if let Some(existing) = entry.find(&listener) {
                if existing.group != group {
                    return Err(RemoteSubscriptionError::ForeignListener {
                        remote_id: key.remote_id,
                        kind: key.kind.clone(),
                        owner: existing.group,
                    });
                }
                tracing::debug!(%key, group = %group, "listener already registered");
                return Ok(());
            }

            // Declared after `_gate`, so it prunes while the gate is still held.
            let mut abandoned = PruneOnDrop {
                manager: self,
                key: &key,
                entry: &entry,
                armed: true,
            };
            if !entry.subscribed.load(Ordering::Acquire) {
                if let Err(source) = self.remote.subscribe(key.remote_id, &key.kind).await {
                    tracing::warn!(%key, error = %source, "remote subscribe failed");
                    return Err(RemoteSubscriptionError::Subscribe {
                        remote_id: key.remote_id,
                        kind: key.kind.clone(),
                        source,
                    });
                }
                entry.subscribed.store(true, Ordering::Release);
                tracing::debug!(%key, "remote subscription opened");
            }
            abandoned.armed = false;

            Arc::make_mut(&mut entry.listeners.lock()).push(Registered {
                group: group.clone(),
                listener: Arc::clone(&listener),
            });
            self.tracker.track(&group, key.clone(), listener);
            return Ok(());
        }
    }

    /// Deregisters `listener` from `(remote_id, kind)`.
    ///
    /// Returns `Ok(false)` if it was not registered. When the last listener leaves,
    /// the remote subscription is closed first; if that fails, or the future is
    /// dropped during the call, the listener stays.
    pub async fn remove_notification_listener(
        &self,
        remote_id: RemoteId,
        kind: impl Into<NotificationKind>,
        listener: &Arc<dyn NotificationListener>,
    ) -> Result<bool, RemoteSubscriptionError> {
        let key = SubscriptionKey::new(remote_id, kind);
        let Some(entry) = self.lookup(&key) else {
            return Ok(false);
        };

        let _gate = entry.gate.lock().await;
        if entry.retired.load(Ordering::Acquire) {
            return Ok(false);
        }
        let Some(found) = entry.find(listener) else {
            return Ok(false);
        };

        if entry.len() == 1 && entry.subscribed.load(Ordering::Acquire) {
            if let Err(source) = self.remote.unsubscribe(key.remote_id, &key.kind).await {
                tracing::warn!(%key, error = %source, "remote unsubscribe failed, listener kept");
                return Err(RemoteSubscriptionError::Unsubscribe {
                    remote_id: key.remote_id,
                    kind: key.kind.clone(),
                    source,
                });
            }
            entry.subscribed.store(false, Ordering::Release);
            tracing::debug!(%key, "remote subscription closed");
        }

        Arc::make_mut(&mut entry.listeners.lock())
            .retain(|r| !same_listener(&r.listener, listener));
        self.tracker.untrack(&found.group, &key, listener);
        self.prune(&key, &entry);
        Ok(true)
    }

    /// Removes every registration made by `group`.
    ///
    /// Returns `Ok(false)` if the group has nothing registered. Keeps going past
    /// failures and returns the first one; failed registrations stay tracked.
    pub async fn remove_all(&self, group: &ComponentId) -> Result<bool, RemoteSubscriptionError> {
        let Some(registrations) = self.tracker.registrations(group) else {
            return Ok(false);
        };

        let mut first = None;
        for reg in registrations {
            let removed = self
                .remove_notification_listener(reg.key.remote_id, reg.key.kind.clone(), &reg.listener)
                .await;
            if let Err(e) = removed {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(true), Err)
    }

    /// Delivers `notification` to the listeners currently registered for its key.
    /// Returns how many listeners were called.
    pub fn handle_notification(&self, notification: &Notification) -> usize {
        let key = notification.key();
        let Some(entry) = self.lookup(&key) else {
            tracing::trace!(%key, "notification without listeners");
            return 0;
        };

        let listeners = entry.snapshot();
        for reg in listeners.iter() {
            let delivered = catch_unwind(AssertUnwindSafe(|| reg.listener.on_notification(notification)));
            if let Err(panic) = delivered {
                tracing::error!(
                    %key,
                    group = %reg.group,
                    seq = notification.seq,
                    "notification listener panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
        listeners.len()
    }

    /// Number of listeners registered for a key.
    pub fn listener_count(&self, remote_id: RemoteId, kind: impl Into<NotificationKind>) -> usize {
        self.lookup(&SubscriptionKey::new(remote_id, kind))
            .map_or(0, |e| e.len())
    }

    /// Keys with an open remote subscription.
    pub fn subscribed_keys(&self) -> Vec<SubscriptionKey> {
        self.keys
            .read()
            .iter()
            .filter(|(_, e)| e.subscribed.load(Ordering::Acquire))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn tracker(&self) -> &ListenerTracker {
        &self.tracker
    }

    fn lookup(&self, key: &SubscriptionKey) -> Option<Arc<KeyEntry>> {
        self.keys.read().get(key).cloned()
    }

    fn entry(&self, key: &SubscriptionKey) -> Arc<KeyEntry> {
        if let Some(entry) = self.lookup(key) {
            return entry;
        }
        Arc::clone(self.keys.write().entry(key.clone()).or_default())
    }

    /// Drops an idle entry from the map. Caller holds the entry's gate.
    fn prune(&self, key: &SubscriptionKey, entry: &Arc<KeyEntry>) {
        if entry.len() > 0 || entry.subscribed.load(Ordering::Acquire) {
            return;
        }
        let mut keys = self.keys.write();
        if keys.get(key).is_some_and(|e| Arc::ptr_eq(e, entry)) {
            keys.remove(key);
        }
        entry.retired.store(true, Ordering::Release);
    }
}

/// Prunes an entry whose first subscribe did not finish (failed or cancelled).
struct PruneOnDrop<'a> {
    manager: &'a NotificationManager,
    key: &'a SubscriptionKey,
    entry: &'a Arc<KeyEntry>,
    armed: bool,
}

impl Drop for PruneOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.prune(self.key, self.entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRemote {
        subscribes: AtomicUsize,
        unsubscribes: AtomicUsize,
        fail_subscribe: AtomicBool,
        fail_unsubscribe: AtomicBool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RemoteSubscriber for FakeRemote {
        async fn subscribe(&self, _: RemoteId, _: &NotificationKind) -> Result<(), RemoteError> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail_subscribe.load(Ordering::SeqCst) {
                return Err(RemoteError::new("connection refused"));
            }
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn unsubscribe(&self, _: RemoteId, _: &NotificationKind) -> Result<(), RemoteError> {
            if self.fail_unsubscribe.load(Ordering::SeqCst) {
                return Err(RemoteError::new("connection reset"));
            }
            self.unsubscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager() -> (Arc<FakeRemote>, NotificationManager) {
        let remote = Arc::new(FakeRemote::default());
        let mgr = NotificationManager::new(Arc::clone(&remote) as Arc<dyn RemoteSubscriber>);
        (remote, mgr)
    }

    fn counting() -> (Arc<AtomicUsize>, Arc<dyn NotificationListener>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let listener: Arc<dyn NotificationListener> = Arc::new(move |_: &Notification| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, listener)
    }

    const R1: RemoteId = RemoteId(1);
    const R2: RemoteId = RemoteId(2);

    #[tokio::test]
    async fn test_one_remote_subscription_per_key() {
        let (remote, mgr) = manager();
        let listeners: Vec<_> = (0..3).map(|_| counting().1).collect();

        for l in &listeners {
            mgr.add_notification_listener("panel", R1, "log", Arc::clone(l)).await.unwrap();
        }
        assert_eq!(remote.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.listener_count(R1, "log"), 3);

        assert!(mgr.remove_notification_listener(R1, "log", &listeners[0]).await.unwrap());
        assert!(mgr.remove_notification_listener(R1, "log", &listeners[1]).await.unwrap());
        assert_eq!(remote.unsubscribes.load(Ordering::SeqCst), 0);

        assert!(mgr.remove_notification_listener(R1, "log", &listeners[2]).await.unwrap());
        assert_eq!(remote.unsubscribes.load(Ordering::SeqCst), 1);
        assert!(mgr.subscribed_keys().is_empty());
        assert!(!mgr.remove_notification_listener(R1, "log", &listeners[2]).await.unwrap());
    }

    #[tokio::test]
    async fn test_repeated_add_is_noop() {
        let (remote, mgr) = manager();
        let (hits, l) = counting();
        mgr.add_notification_listener("panel", R1, "log", Arc::clone(&l)).await.unwrap();
        mgr.add_notification_listener("panel", R1, "log", Arc::clone(&l)).await.unwrap();

        assert_eq!(mgr.handle_notification(&Notification::new(R1, "log", 1)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(remote.subscribes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_subscribe_once() {
        let remote = Arc::new(FakeRemote {
            delay: Some(Duration::from_millis(20)),
            ..FakeRemote::default()
        });
        let mgr = Arc::new(NotificationManager::new(Arc::clone(&remote) as Arc<dyn RemoteSubscriber>));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let mgr = Arc::clone(&mgr);
                tokio::spawn(async move {
                    let (_, l) = counting();
                    mgr.add_notification_listener(format!("g{i}"), R1, "state_change", l).await
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert_eq!(remote.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.listener_count(R1, "state_change"), 16);
    }

    #[tokio::test]
    async fn test_group_teardown() {
        let (remote, mgr) = manager();
        let (_, a1) = counting();
        let (_, a2) = counting();
        let (b_hits, b) = counting();
        let panel = ComponentId::new("panel");

        mgr.add_notification_listener(panel.clone(), R1, "log", a1).await.unwrap();
        mgr.add_notification_listener(panel.clone(), R2, "log", a2).await.unwrap();
        mgr.add_notification_listener("console", R2, "log", b).await.unwrap();
        assert_eq!(remote.subscribes.load(Ordering::SeqCst), 2);

        assert!(mgr.remove_all(&panel).await.unwrap());
        assert_eq!(remote.unsubscribes.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.subscribed_keys(), vec![SubscriptionKey::new(R2, "log")]);

        assert_eq!(mgr.handle_notification(&Notification::new(R2, "log", 1)), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);

        assert!(!mgr.remove_all(&panel).await.unwrap());
        assert!(!mgr.remove_all(&ComponentId::new("never-seen")).await.unwrap());
    }

    #[tokio::test]
    async fn test_subscribe_failure_leaves_nothing_behind() {
        let (remote, mgr) = manager();
        remote.fail_subscribe.store(true, Ordering::SeqCst);
        let (hits, l) = counting();

        let err = mgr
            .add_notification_listener("panel", R1, "log", Arc::clone(&l))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "remote_subscribe_failed");
        assert_eq!(mgr.listener_count(R1, "log"), 0);
        assert_eq!(mgr.handle_notification(&Notification::new(R1, "log", 1)), 0);
        assert!(!mgr.tracker().contains(&ComponentId::new("panel")));

        remote.fail_subscribe.store(false, Ordering::SeqCst);
        mgr.add_notification_listener("panel", R1, "log", l).await.unwrap();
        mgr.handle_notification(&Notification::new(R1, "log", 2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(remote.subscribes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_failure_keeps_listener() {
        let (remote, mgr) = manager();
        let (hits, l) = counting();
        let panel = ComponentId::new("panel");
        mgr.add_notification_listener(panel.clone(), R1, "log", Arc::clone(&l)).await.unwrap();

        remote.fail_unsubscribe.store(true, Ordering::SeqCst);
        let err = mgr.remove_all(&panel).await.unwrap_err();
        assert_eq!(err.as_label(), "remote_unsubscribe_failed");
        assert_eq!(mgr.listener_count(R1, "log"), 1);
        assert!(mgr.tracker().contains(&panel));
        mgr.handle_notification(&Notification::new(R1, "log", 1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        remote.fail_unsubscribe.store(false, Ordering::SeqCst);
        assert!(mgr.remove_all(&panel).await.unwrap());
        assert_eq!(remote.unsubscribes.load(Ordering::SeqCst), 1);
        assert_eq!(remote.subscribes.load(Ordering::SeqCst), 1);
        assert!(mgr.subscribed_keys().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_isolates_panics_and_keys() {
        let (_, mgr) = manager();
        let boom: Arc<dyn NotificationListener> = Arc::new(|_: &Notification| {
            panic!("listener bug");
        });
        let (hits, l) = counting();
        let (other_hits, other) = counting();

        mgr.add_notification_listener("panel", R1, "log", boom).await.unwrap();
        mgr.add_notification_listener("panel", R1, "log", l).await.unwrap();
        mgr.add_notification_listener("panel", R1, "metrics", other).await.unwrap();

        assert_eq!(mgr.handle_notification(&Notification::new(R1, "log", 1)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(other_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_listener_under_another_group_is_refused() {
        let (remote, mgr) = manager();
        let (_, l) = counting();
        let panel = ComponentId::new("panel");
        let console = ComponentId::new("console");
        mgr.add_notification_listener(panel.clone(), R1, "log", Arc::clone(&l)).await.unwrap();

        let err = mgr
            .add_notification_listener(console.clone(), R1, "log", Arc::clone(&l))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "remote_foreign_listener");
        assert!(!mgr.tracker().contains(&console));
        assert!(!mgr.remove_all(&console).await.unwrap());

        assert!(mgr.remove_all(&panel).await.unwrap());
        assert_eq!(remote.unsubscribes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_add_leaves_no_entry() {
        let remote = Arc::new(FakeRemote {
            delay: Some(Duration::from_millis(200)),
            ..FakeRemote::default()
        });
        let mgr = NotificationManager::new(Arc::clone(&remote) as Arc<dyn RemoteSubscriber>);
        let (hits, l) = counting();

        let add = mgr.add_notification_listener("panel", R1, "log", Arc::clone(&l));
        assert!(tokio::time::timeout(Duration::from_millis(10), add).await.is_err());

        assert!(mgr.keys.read().is_empty());
        assert_eq!(mgr.listener_count(R1, "log"), 0);
        assert!(!mgr.tracker().contains(&ComponentId::new("panel")));

        mgr.add_notification_listener("panel", R1, "log", l).await.unwrap();
        assert_eq!(remote.subscribes.load(Ordering::SeqCst), 1);
        mgr.handle_notification(&Notification::new(R1, "log", 1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_churn_during_dispatch_delivers_at_most_once() {
        let (_, mgr) = manager();
        let mgr = Arc::new(mgr);
        let (_, anchor) = counting();
        mgr.add_notification_listener("anchor", R1, "log", anchor).await.unwrap();

        let dispatcher = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move {
                for seq in 1..=500 {
                    mgr.handle_notification(&Notification::new(R1, "log", seq));
                    tokio::task::yield_now().await;
                }
            })
        };

        let churners: Vec<_> = (0..4)
            .map(|i| {
                let mgr = Arc::clone(&mgr);
                tokio::spawn(async move {
                    let mut logs = Vec::new();
                    for _ in 0..50 {
                        let seen = Arc::new(Mutex::new(Vec::new()));
                        let sink = Arc::clone(&seen);
                        let l: Arc<dyn NotificationListener> = Arc::new(move |n: &Notification| {
                            sink.lock().push(n.seq);
                        });
                        mgr.add_notification_listener(format!("g{i}"), R1, "log", Arc::clone(&l))
                            .await
                            .unwrap();
                        tokio::task::yield_now().await;
                        assert!(mgr.remove_notification_listener(R1, "log", &l).await.unwrap());
                        logs.push(seen);
                    }
                    logs
                })
            })
            .collect();

        dispatcher.await.unwrap();
        for churner in churners {
            for seen in churner.await.unwrap() {
                let seqs = seen.lock().clone();
                let mut unique = seqs.clone();
                unique.sort_unstable();
                unique.dedup();
                assert_eq!(unique.len(), seqs.len(), "duplicate delivery: {seqs:?}");
            }
        }
        assert_eq!(mgr.listener_count(R1, "log"), 1);
    }
}
