//! # Per-entity lifecycle state machine.
//!
//! [`StateHandler`] is the single point of truth for one entity's state and the
//! fan-out point for its observers.
//!
//! ## Architecture
//! ```text
//! run_locked / wait_to_when / try_to_when
//!   │
//!   ├─► state lock ─► action(&mut StateGuard) ─► set_state() ─► mailbox.push(event) for each listener@commit
//!   │                                                          └► condvar.notify_all()
//!   └─► state lock released
//!         └─► for each touched mailbox: idle? claim it and drain in seq order : leave it to its drainer
//! ```
//!
//! ## Rules
//! - State is mutated only under the state lock; listeners run after it is released.
//! - Every listener has its own mailbox, filled under the state lock, so it sees
//!   events in `seq` order.
//! - At most one thread calls a given listener at a time. A committing thread never
//!   waits for another thread's listener: if the mailbox is busy it leaves the event
//!   there and the busy drainer picks it up.
//! - Each event is delivered to the listeners registered when it was committed:
//!   exactly once, and never in addition to a replay.
//! - A listener may re-enter the handler (remove itself, add others, set state).
//!   Events it commits reach it after its current call returns.
//! - Once `DESTROYED` is committed every further mutation fails with
//!   [`LifecycleError::EntityDestroyed`].
//! - Listener panics are caught and logged.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{LifecycleError, panic_message};

use super::event::{ComponentId, SharedError, StateEvent};
use super::listener::{StateListener, Stateful, same_listener};
use super::space::State;

type Slots = Arc<Vec<Arc<Slot>>>;

#[derive(Default)]
struct Mailbox {
    queue: VecDeque<StateEvent>,
    /// `true` while some thread is draining this mailbox.
    busy: bool,
}

/// A registered listener with its pending events.
struct Slot {
    listener: Arc<dyn StateListener>,
    mailbox: Mutex<Mailbox>,
}

impl Slot {
    /// Drains the mailbox unless another thread already does.
    fn pump(&self, owner: &ComponentId) {
        {
            let mut mailbox = self.mailbox.lock();
            if mailbox.busy {
                return;
            }
            mailbox.busy = true;
        }
        self.drain(owner);
    }

    /// Delivers queued events until the mailbox is empty. Caller owns `busy`.
    fn drain(&self, owner: &ComponentId) {
        loop {
            let next = {
                let mut mailbox = self.mailbox.lock();
                match mailbox.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        mailbox.busy = false;
                        return;
                    }
                }
            };
            notify(owner, &self.listener, &next);
        }
    }
}

struct Inner<S> {
    state: S,
    last: StateEvent,
    slots: Slots,
}

/// Lifecycle state holder for exactly one owner.
///
/// Transitions are not restricted here; callers check [`StateHandler::assert_alive`]
/// or inspect [`StateGuard::state`] before mutating.
pub struct StateHandler<S: State> {
    owner: ComponentId,
    inner: Mutex<Inner<S>>,
    changed: Condvar,
}

impl<S: State> StateHandler<S> {
    /// Creates a handler whose initial event (`seq = 0`) carries `initial`.
    pub fn new(owner: impl Into<ComponentId>, initial: S) -> Self {
        let owner = owner.into();
        let last = StateEvent::new(owner.clone(), initial.erase(), 0, None);
        Self {
            owner,
            inner: Mutex::new(Inner {
                state: initial,
                last,
                slots: Arc::new(Vec::new()),
            }),
            changed: Condvar::new(),
        }
    }

    pub fn owner(&self) -> &ComponentId {
        &self.owner
    }

    /// The most recently committed event.
    pub fn last_state_event(&self) -> StateEvent {
        self.inner.lock().last.clone()
    }

    /// The most recently committed state, typed.
    pub fn last_state(&self) -> S {
        self.inner.lock().state
    }

    /// Fails with [`LifecycleError::EntityDestroyed`] once `DESTROYED` was committed.
    pub fn assert_alive(&self) -> Result<(), LifecycleError> {
        if self.inner.lock().state.is_destroyed() {
            return Err(LifecycleError::EntityDestroyed {
                owner: self.owner.clone(),
            });
        }
        Ok(())
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Registers `listener` and replays the current event to it before returning.
    ///
    /// On a destroyed handler the replay is still delivered but the listener is
    /// not retained and [`LifecycleError::EntityDestroyed`] is returned.
    pub fn add_state_listener(
        &self,
        listener: Arc<dyn StateListener>,
    ) -> Result<(), LifecycleError> {
        let registered = {
            let mut inner = self.inner.lock();
            if inner.state.is_destroyed() {
                Err(inner.last.clone())
            } else {
                // Claimed by this thread until the replay is out.
                let slot = Arc::new(Slot {
                    listener: Arc::clone(&listener),
                    mailbox: Mutex::new(Mailbox {
                        queue: VecDeque::from([inner.last.clone()]),
                        busy: true,
                    }),
                });
                Arc::make_mut(&mut inner.slots).push(Arc::clone(&slot));
                Ok(slot)
            }
        };

        match registered {
            Ok(slot) => {
                slot.drain(&self.owner);
                Ok(())
            }
            Err(last) => {
                notify(&self.owner, &listener, &last);
                Err(LifecycleError::EntityDestroyed {
                    owner: self.owner.clone(),
                })
            }
        }
    }

    /// Deregisters `listener`. Unknown listeners are ignored.
    ///
    /// Events committed before removal are still delivered to it.
    pub fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) {
        let mut inner = self.inner.lock();
        if inner.slots.iter().any(|s| same_listener(&s.listener, listener)) {
            Arc::make_mut(&mut inner.slots).retain(|s| !same_listener(&s.listener, listener));
        }
    }

    /// Runs `action` under the state lock, then delivers whatever it committed.
    pub fn run_locked<R>(&self, action: impl FnOnce(&mut StateGuard<'_, S>) -> R) -> R {
        let (result, touched) = {
            let mut guard = self.guard(self.inner.lock());
            let result = action(&mut guard);
            (result, guard.touched)
        };
        self.fire(touched);
        result
    }

    /// Blocks until `when(state)` holds, then behaves like [`run_locked`](Self::run_locked).
    ///
    /// Blocks forever if the predicate never becomes true; keep predicates short-lived.
    pub fn wait_to_when<R>(
        &self,
        mut when: impl FnMut(S) -> bool,
        action: impl FnOnce(&mut StateGuard<'_, S>) -> R,
    ) -> R {
        let (result, touched) = {
            let mut inner = self.inner.lock();
            while !when(inner.state) {
                self.changed.wait(&mut inner);
            }
            let mut guard = self.guard(inner);
            let result = action(&mut guard);
            (result, guard.touched)
        };
        self.fire(touched);
        result
    }

    /// Runs `action` only if `when(state)` holds right now.
    pub fn try_to_when<R>(
        &self,
        when: impl FnOnce(S) -> bool,
        action: impl FnOnce(&mut StateGuard<'_, S>) -> R,
    ) -> Option<R> {
        let (result, touched) = {
            let inner = self.inner.lock();
            if !when(inner.state) {
                return None;
            }
            let mut guard = self.guard(inner);
            let result = action(&mut guard);
            (result, guard.touched)
        };
        self.fire(touched);
        Some(result)
    }

    fn guard<'a>(&'a self, inner: MutexGuard<'a, Inner<S>>) -> StateGuard<'a, S> {
        StateGuard {
            owner: &self.owner,
            inner,
            changed: &self.changed,
            touched: None,
        }
    }

    /// Pumps the mailboxes a commit wrote to. Runs with the state lock released.
    fn fire(&self, touched: Option<Slots>) {
        let Some(slots) = touched else { return };
        for slot in slots.iter() {
            slot.pump(&self.owner);
        }
    }
}

impl<S: State> Stateful for StateHandler<S> {
    fn last_state_event(&self) -> StateEvent {
        StateHandler::last_state_event(self)
    }

    fn add_state_listener(&self, listener: Arc<dyn StateListener>) -> Result<(), LifecycleError> {
        StateHandler::add_state_listener(self, listener)
    }

    fn remove_state_listener(&self, listener: &Arc<dyn StateListener>) {
        StateHandler::remove_state_listener(self, listener)
    }
}

fn notify(owner: &ComponentId, listener: &Arc<dyn StateListener>, event: &StateEvent) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_state_event(event))) {
        tracing::error!(
            component = %owner,
            seq = event.seq,
            state = %event.state,
            "state listener panicked: {}",
            panic_message(panic.as_ref())
        );
    }
}

/// Locked view of a [`StateHandler`], handed to `run_locked`-style actions.
pub struct StateGuard<'a, S: State> {
    owner: &'a ComponentId,
    inner: MutexGuard<'a, Inner<S>>,
    changed: &'a Condvar,
    /// Listener set of the last commit; each commit fills every mailbox in it.
    touched: Option<Slots>,
}

impl<S: State> StateGuard<'_, S> {
    pub fn state(&self) -> S {
        self.inner.state
    }

    pub fn last_event(&self) -> &StateEvent {
        &self.inner.last
    }

    pub fn owner(&self) -> &ComponentId {
        self.owner
    }

    pub fn assert_alive(&self) -> Result<(), LifecycleError> {
        if self.inner.state.is_destroyed() {
            return Err(LifecycleError::EntityDestroyed {
                owner: self.owner.clone(),
            });
        }
        Ok(())
    }

    /// Commits a transition to `state`.
    pub fn set_state(&mut self, state: S) -> Result<(), LifecycleError> {
        self.commit(state, None)
    }

    /// Commits a transition to `state` carrying the causing error.
    pub fn set_exception(&mut self, state: S, error: SharedError) -> Result<(), LifecycleError> {
        self.commit(state, Some(error))
    }

    fn commit(&mut self, state: S, error: Option<SharedError>) -> Result<(), LifecycleError> {
        self.assert_alive()?;

        let seq = self.inner.last.seq + 1;
        let event = StateEvent::new(self.owner.clone(), state.erase(), seq, error);
        tracing::trace!(component = %self.owner, state = %event.state, seq, "state changed");

        let inner = &mut *self.inner;
        for slot in inner.slots.iter() {
            slot.mailbox.lock().queue.push_back(event.clone());
        }
        inner.state = state;
        inner.last = event;
        self.touched = Some(Arc::clone(&inner.slots));
        self.changed.notify_all();
        Ok(())
    }
}
