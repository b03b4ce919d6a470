//! # Container state derived from children.
//!
//! [`StructuralState`] listens to every child and recomputes the parent's
//! [`ParentState`] through a [`StateOperator`] whenever a child fires.
//!
//! ## Architecture
//! ```text
//! child A ──► listener(A) ─┐
//! child B ──► listener(B) ─┼─► record(child, seq) ─► recompute()
//! child C ──► listener(C) ─┘                          │
//!                                                     ▼
//!                       parent.run_locked { snapshot children ─► operator ─► set_state }
//! ```
//!
//! ## Rules
//! - Per child, events with `seq <= last_seq` are rejected (stale).
//! - The snapshot is read inside the parent's locked action, so the last
//!   recompute always sees the latest child states.
//! - Only a changed parent state is committed.
//! - Child listeners hold a weak reference; dropping the container detaches nothing
//!   but stops all further recomputes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::LifecycleError;

use super::event::{ComponentId, StateEvent};
use super::handler::StateHandler;
use super::listener::{StateListener, Stateful, same_listener};
use super::operator::StateOperator;
use super::space::{AnyState, ParentState, State};

struct Child {
    id: u64,
    stateful: Arc<dyn Stateful>,
    listener: Arc<dyn StateListener>,
    last_seq: Option<u64>,
    state: Option<AnyState>,
}

struct Shared {
    handler: StateHandler<ParentState>,
    operator: Arc<dyn StateOperator>,
    children: Mutex<Vec<Child>>,
    next_id: AtomicU64,
}

impl Shared {
    /// Stores the child's new state; false if the event is stale or the child is gone.
    fn record(&self, id: u64, event: &StateEvent) -> bool {
        let mut children = self.children.lock();
        let Some(child) = children.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        if child.last_seq.is_some_and(|last| event.seq <= last) {
            return false;
        }
        child.last_seq = Some(event.seq);
        child.state = Some(event.state);
        true
    }

    fn recompute(&self) {
        self.handler.run_locked(|g| {
            if g.state().is_destroyed() {
                return;
            }
            let snapshot: Vec<AnyState> = self
                .children
                .lock()
                .iter()
                .filter_map(|c| c.state)
                .collect();
            let next = self.operator.evaluate(&snapshot);
            if next != g.state() {
                let _ = g.set_state(next);
            }
        });
    }
}

/// Parent state maintained from a dynamic set of children.
pub struct StructuralState {
    shared: Arc<Shared>,
}

impl StructuralState {
    pub fn new(owner: impl Into<ComponentId>, operator: Arc<dyn StateOperator>) -> Self {
        Self {
            shared: Arc::new(Shared {
                handler: StateHandler::new(owner, ParentState::Ready),
                operator,
                children: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// The parent's own handler.
    pub fn handler(&self) -> &StateHandler<ParentState> {
        &self.shared.handler
    }

    pub fn state(&self) -> ParentState {
        self.shared.handler.last_state()
    }

    /// Last known states of all children, in insertion order.
    pub fn child_states(&self) -> Vec<AnyState> {
        self.shared
            .children
            .lock()
            .iter()
            .filter_map(|c| c.state)
            .collect()
    }

    pub fn child_count(&self) -> usize {
        self.shared.children.lock().len()
    }

    /// Starts following `child`. Its current state is folded in before returning.
    pub fn insert_child(&self, child: Arc<dyn Stateful>) -> Result<(), LifecycleError> {
        self.shared.handler.assert_alive()?;

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let listener: Arc<dyn StateListener> = Arc::new(move |ev: &StateEvent| {
            if let Some(shared) = weak.upgrade() {
                if shared.record(id, ev) {
                    shared.recompute();
                }
            }
        });

        self.shared.children.lock().push(Child {
            id,
            stateful: Arc::clone(&child),
            listener: Arc::clone(&listener),
            last_seq: None,
            state: None,
        });

        if let Err(e) = child.add_state_listener(listener) {
            self.shared.children.lock().retain(|c| c.id != id);
            self.shared.recompute();
            return Err(e);
        }
        Ok(())
    }

    /// Stops following `child` and recomputes. Unknown children are ignored.
    pub fn remove_child(&self, child: &Arc<dyn Stateful>) {
        let removed = {
            let mut children = self.shared.children.lock();
            children
                .iter()
                .position(|c| same_listener(&c.stateful, child))
                .map(|i| children.remove(i))
        };
        if let Some(c) = removed {
            c.stateful.remove_state_listener(&c.listener);
            self.shared.recompute();
        }
    }

    /// Recomputes the parent state from the current snapshot.
    pub fn recompute(&self) {
        self.shared.recompute();
    }

    /// Detaches from all children and commits `DESTROYED`.
    pub fn destroy(&self) -> Result<(), LifecycleError> {
        let children: Vec<Child> = self.shared.children.lock().drain(..).collect();
        for c in &children {
            c.stateful.remove_state_listener(&c.listener);
        }
        self.shared
            .handler
            .run_locked(|g| g.set_state(ParentState::Destroyed))
    }
}

impl Stateful for StructuralState {
    fn last_state_event(&self) -> StateEvent {
        self.shared.handler.last_state_event()
    }

    fn add_state_listener(&self, listener: Arc<dyn StateListener>) -> Result<(), LifecycleError> {
        self.shared.handler.add_state_listener(listener)
    }

    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) {
        self.shared.handler.remove_state_listener(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{JobState, StandardStateOp};
    use std::thread;

    fn job(name: &str) -> Arc<StateHandler<JobState>> {
        Arc::new(StateHandler::new(name, JobState::Ready))
    }

    fn set(h: &StateHandler<JobState>, s: JobState) {
        h.run_locked(|g| g.set_state(s)).unwrap();
    }

    fn parent() -> StructuralState {
        StructuralState::new("parent", Arc::new(StandardStateOp))
    }

    #[test]
    fn test_parent_follows_children() {
        let p = parent();
        let a = job("a");
        let b = job("b");
        p.insert_child(a.clone()).unwrap();
        p.insert_child(b.clone()).unwrap();
        assert_eq!(p.state(), ParentState::Started);

        set(&a, JobState::Executing);
        assert_eq!(p.state(), ParentState::Executing);

        set(&a, JobState::Complete);
        set(&b, JobState::Complete);
        assert_eq!(p.state(), ParentState::Complete);

        set(&b, JobState::Exception);
        assert_eq!(p.state(), ParentState::Exception);
    }

    #[test]
    fn test_remove_child_recomputes() {
        let p = parent();
        let a = job("a");
        let b = job("b");
        set(&a, JobState::Complete);
        set(&b, JobState::Incomplete);
        p.insert_child(a.clone()).unwrap();
        let b_dyn: Arc<dyn Stateful> = b.clone();
        p.insert_child(Arc::clone(&b_dyn)).unwrap();
        assert_eq!(p.state(), ParentState::Incomplete);

        p.remove_child(&b_dyn);
        assert_eq!(p.state(), ParentState::Complete);
        assert_eq!(b.listener_count(), 0);

        let a_dyn: Arc<dyn Stateful> = a;
        p.remove_child(&a_dyn);
        assert_eq!(p.state(), ParentState::Ready);
    }

    #[test]
    fn test_unchanged_parent_state_is_not_recommitted() {
        let p = parent();
        let a = job("a");
        let b = job("b");
        p.insert_child(a.clone()).unwrap();
        p.insert_child(b.clone()).unwrap();
        let seq = p.last_state_event().seq;

        set(&a, JobState::Ready);
        set(&b, JobState::Ready);
        assert_eq!(p.last_state_event().seq, seq);
    }

    #[test]
    fn test_destroyed_child_is_rejected() {
        let p = parent();
        let a = job("a");
        set(&a, JobState::Destroyed);
        assert!(p.insert_child(a).is_err());
        assert_eq!(p.child_count(), 0);
        assert_eq!(p.state(), ParentState::Ready);
    }

    #[test]
    fn test_destroy_detaches_children() {
        let p = parent();
        let a = job("a");
        p.insert_child(a.clone()).unwrap();
        p.destroy().unwrap();

        assert_eq!(a.listener_count(), 0);
        assert_eq!(p.state(), ParentState::Destroyed);
        assert!(p.insert_child(job("b")).is_err());
    }

    #[test]
    fn test_concurrent_children_converge() {
        let p = Arc::new(parent());
        let children: Vec<_> = (0..4).map(|i| job(&format!("c{i}"))).collect();
        for c in &children {
            p.insert_child(c.clone()).unwrap();
        }

        let workers: Vec<_> = children
            .iter()
            .map(|c| {
                let c = Arc::clone(c);
                thread::spawn(move || {
                    for _ in 0..25 {
                        set(&c, JobState::Executing);
                        set(&c, JobState::Incomplete);
                    }
                    set(&c, JobState::Complete);
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(p.state(), ParentState::Complete);
        assert!(p.child_states().iter().all(|s| s.is_complete()));
    }
}
