//! # Per-group registration bookkeeping.
//!
//! [`ListenerTracker`] remembers which listeners an owning group registered under
//! which keys, so the whole group can be torn down at once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::state::{ComponentId, same_listener};

use super::notification::{NotificationListener, SubscriptionKey};

/// One registration made by a group.
#[derive(Clone)]
pub struct Registration {
    pub key: SubscriptionKey,
    pub listener: Arc<dyn NotificationListener>,
}

/// Group → registrations map.
#[derive(Default)]
pub struct ListenerTracker {
    groups: Mutex<HashMap<ComponentId, Vec<Registration>>>,
}

impl ListenerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, group: &ComponentId, key: SubscriptionKey, listener: Arc<dyn NotificationListener>) {
        self.groups
            .lock()
            .entry(group.clone())
            .or_default()
            .push(Registration { key, listener });
    }

    /// Forgets one registration; the group is dropped once it has none left.
    pub fn untrack(
        &self,
        group: &ComponentId,
        key: &SubscriptionKey,
        listener: &Arc<dyn NotificationListener>,
    ) {
        let mut groups = self.groups.lock();
        let Some(regs) = groups.get_mut(group) else { return };
        if let Some(i) = regs
            .iter()
            .position(|r| &r.key == key && same_listener(&r.listener, listener))
        {
            regs.swap_remove(i);
        }
        if regs.is_empty() {
            groups.remove(group);
        }
    }

    /// Snapshot of a group's registrations; `None` if the group has none.
    pub fn registrations(&self, group: &ComponentId) -> Option<Vec<Registration>> {
        self.groups.lock().get(group).cloned()
    }

    pub fn contains(&self, group: &ComponentId) -> bool {
        self.groups.lock().contains_key(group)
    }

    pub fn group_count(&self) -> usize {
        self.groups.lock().len()
    }
}
