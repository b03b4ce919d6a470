//! # State spaces.
//!
//! Each component kind has a closed set of named states. A state's flags never
//! change; callers reason about flags through the [`State`] trait, and code that
//! mixes kinds (containers, monitors, remote bridges) works on [`AnyState`].
//!
//! ```text
//! JobState      READY ─► EXECUTING ─► COMPLETE | INCOMPLETE | EXCEPTION ─► DESTROYED
//! ServiceState  STARTABLE ─► STARTING ─► STARTED ─► STOPPED
//! TimerState    STARTABLE ─► STARTING ─► STARTED ⇄ ACTIVE ─► COMPLETE ...
//! EventState    READY ─► CONNECTING ─► WAITING ⇄ FIRING ─► TRIGGERED ...
//! ParentState   derived from children by a StateOperator
//! ```

use std::fmt;

use super::flags::StateFlags;

const READY: StateFlags = StateFlags::READY;
const RUNNING: StateFlags = StateFlags::EXECUTING.union(StateFlags::STOPPABLE);
const STOPPABLE: StateFlags = StateFlags::STOPPABLE;
const COMPLETE: StateFlags = StateFlags::COMPLETE;
const INCOMPLETE: StateFlags = StateFlags::INCOMPLETE;
const EXCEPTION: StateFlags = StateFlags::EXCEPTION;
const DESTROYED: StateFlags = StateFlags::DESTROYED;

/// A named lifecycle state with a fixed flag set.
pub trait State: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Upper-case state name, e.g. `"EXECUTING"`.
    fn name(&self) -> &'static str;

    fn flags(&self) -> StateFlags;

    /// Erases the state space.
    fn erase(self) -> AnyState;

    fn is_ready(&self) -> bool {
        self.flags().contains(StateFlags::READY)
    }

    fn is_executing(&self) -> bool {
        self.flags().contains(StateFlags::EXECUTING)
    }

    fn is_stoppable(&self) -> bool {
        self.flags().contains(StateFlags::STOPPABLE)
    }

    fn is_complete(&self) -> bool {
        self.flags().contains(StateFlags::COMPLETE)
    }

    fn is_incomplete(&self) -> bool {
        self.flags().contains(StateFlags::INCOMPLETE)
    }

    fn is_exception(&self) -> bool {
        self.flags().contains(StateFlags::EXCEPTION)
    }

    fn is_destroyed(&self) -> bool {
        self.flags().contains(StateFlags::DESTROYED)
    }
}

/// States of a simple run-to-completion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Ready,
    Executing,
    Incomplete,
    Complete,
    Exception,
    Destroyed,
}

impl JobState {
    pub const ALL: [JobState; 6] = [
        JobState::Ready,
        JobState::Executing,
        JobState::Incomplete,
        JobState::Complete,
        JobState::Exception,
        JobState::Destroyed,
    ];
}

impl State for JobState {
    fn name(&self) -> &'static str {
        match self {
            JobState::Ready => "READY",
            JobState::Executing => "EXECUTING",
            JobState::Incomplete => "INCOMPLETE",
            JobState::Complete => "COMPLETE",
            JobState::Exception => "EXCEPTION",
            JobState::Destroyed => "DESTROYED",
        }
    }

    fn flags(&self) -> StateFlags {
        match self {
            JobState::Ready => READY,
            JobState::Executing => RUNNING,
            JobState::Incomplete => INCOMPLETE,
            JobState::Complete => COMPLETE,
            JobState::Exception => EXCEPTION,
            JobState::Destroyed => DESTROYED,
        }
    }

    fn erase(self) -> AnyState {
        AnyState::Job(self)
    }
}

/// States of a long-running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    Startable,
    Starting,
    Started,
    Stopped,
    Incomplete,
    Exception,
    Destroyed,
}

impl ServiceState {
    pub const ALL: [ServiceState; 7] = [
        ServiceState::Startable,
        ServiceState::Starting,
        ServiceState::Started,
        ServiceState::Stopped,
        ServiceState::Incomplete,
        ServiceState::Exception,
        ServiceState::Destroyed,
    ];
}

impl State for ServiceState {
    fn name(&self) -> &'static str {
        match self {
            ServiceState::Startable => "STARTABLE",
            ServiceState::Starting => "STARTING",
            ServiceState::Started => "STARTED",
            ServiceState::Stopped => "STOPPED",
            ServiceState::Incomplete => "INCOMPLETE",
            ServiceState::Exception => "EXCEPTION",
            ServiceState::Destroyed => "DESTROYED",
        }
    }

    fn flags(&self) -> StateFlags {
        match self {
            ServiceState::Startable => READY,
            ServiceState::Starting => RUNNING,
            ServiceState::Started => STOPPABLE,
            ServiceState::Stopped => COMPLETE,
            ServiceState::Incomplete => INCOMPLETE,
            ServiceState::Exception => EXCEPTION,
            ServiceState::Destroyed => DESTROYED,
        }
    }

    fn erase(self) -> AnyState {
        AnyState::Service(self)
    }
}

/// States of a container whose state is derived from its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentState {
    Ready,
    Executing,
    /// Children are running in the background.
    Active,
    /// Children are quiescent but not all complete.
    Started,
    Incomplete,
    Complete,
    Exception,
    Destroyed,
}

impl ParentState {
    pub const ALL: [ParentState; 8] = [
        ParentState::Ready,
        ParentState::Executing,
        ParentState::Active,
        ParentState::Started,
        ParentState::Incomplete,
        ParentState::Complete,
        ParentState::Exception,
        ParentState::Destroyed,
    ];
}

impl State for ParentState {
    fn name(&self) -> &'static str {
        match self {
            ParentState::Ready => "READY",
            ParentState::Executing => "EXECUTING",
            ParentState::Active => "ACTIVE",
            ParentState::Started => "STARTED",
            ParentState::Incomplete => "INCOMPLETE",
            ParentState::Complete => "COMPLETE",
            ParentState::Exception => "EXCEPTION",
            ParentState::Destroyed => "DESTROYED",
        }
    }

    fn flags(&self) -> StateFlags {
        match self {
            ParentState::Ready => READY,
            ParentState::Executing => RUNNING,
            ParentState::Active | ParentState::Started => STOPPABLE,
            ParentState::Incomplete => INCOMPLETE,
            ParentState::Complete => COMPLETE,
            ParentState::Exception => EXCEPTION,
            ParentState::Destroyed => DESTROYED,
        }
    }

    fn erase(self) -> AnyState {
        AnyState::Parent(self)
    }
}

/// States of a timer that fires its child on a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerState {
    Startable,
    Starting,
    Started,
    /// The scheduled child is running.
    Active,
    Incomplete,
    Complete,
    Exception,
    Destroyed,
}

impl TimerState {
    pub const ALL: [TimerState; 8] = [
        TimerState::Startable,
        TimerState::Starting,
        TimerState::Started,
        TimerState::Active,
        TimerState::Incomplete,
        TimerState::Complete,
        TimerState::Exception,
        TimerState::Destroyed,
    ];
}

impl State for TimerState {
    fn name(&self) -> &'static str {
        match self {
            TimerState::Startable => "STARTABLE",
            TimerState::Starting => "STARTING",
            TimerState::Started => "STARTED",
            TimerState::Active => "ACTIVE",
            TimerState::Incomplete => "INCOMPLETE",
            TimerState::Complete => "COMPLETE",
            TimerState::Exception => "EXCEPTION",
            TimerState::Destroyed => "DESTROYED",
        }
    }

    fn flags(&self) -> StateFlags {
        match self {
            TimerState::Startable => READY,
            TimerState::Starting | TimerState::Active => RUNNING,
            TimerState::Started => STOPPABLE,
            TimerState::Incomplete => INCOMPLETE,
            TimerState::Complete => COMPLETE,
            TimerState::Exception => EXCEPTION,
            TimerState::Destroyed => DESTROYED,
        }
    }

    fn erase(self) -> AnyState {
        AnyState::Timer(self)
    }
}

/// States of an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventState {
    Ready,
    Connecting,
    Waiting,
    Firing,
    Triggered,
    Incomplete,
    Complete,
    Exception,
    Destroyed,
}

impl EventState {
    pub const ALL: [EventState; 9] = [
        EventState::Ready,
        EventState::Connecting,
        EventState::Waiting,
        EventState::Firing,
        EventState::Triggered,
        EventState::Incomplete,
        EventState::Complete,
        EventState::Exception,
        EventState::Destroyed,
    ];
}

impl State for EventState {
    fn name(&self) -> &'static str {
        match self {
            EventState::Ready => "READY",
            EventState::Connecting => "CONNECTING",
            EventState::Waiting => "WAITING",
            EventState::Firing => "FIRING",
            EventState::Triggered => "TRIGGERED",
            EventState::Incomplete => "INCOMPLETE",
            EventState::Complete => "COMPLETE",
            EventState::Exception => "EXCEPTION",
            EventState::Destroyed => "DESTROYED",
        }
    }

    fn flags(&self) -> StateFlags {
        match self {
            EventState::Ready => READY,
            EventState::Connecting | EventState::Firing => RUNNING,
            EventState::Waiting | EventState::Triggered => STOPPABLE,
            EventState::Incomplete => INCOMPLETE,
            EventState::Complete => COMPLETE,
            EventState::Exception => EXCEPTION,
            EventState::Destroyed => DESTROYED,
        }
    }

    fn erase(self) -> AnyState {
        AnyState::Event(self)
    }
}

/// A state from any space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyState {
    Job(JobState),
    Service(ServiceState),
    Parent(ParentState),
    Timer(TimerState),
    Event(EventState),
}

impl AnyState {
    /// Name of the state space, for logs.
    pub fn space(&self) -> &'static str {
        match self {
            AnyState::Job(_) => "job",
            AnyState::Service(_) => "service",
            AnyState::Parent(_) => "parent",
            AnyState::Timer(_) => "timer",
            AnyState::Event(_) => "event",
        }
    }
}

impl State for AnyState {
    fn name(&self) -> &'static str {
        match self {
            AnyState::Job(s) => s.name(),
            AnyState::Service(s) => s.name(),
            AnyState::Parent(s) => s.name(),
            AnyState::Timer(s) => s.name(),
            AnyState::Event(s) => s.name(),
        }
    }

    fn flags(&self) -> StateFlags {
        match self {
            AnyState::Job(s) => s.flags(),
            AnyState::Service(s) => s.flags(),
            AnyState::Parent(s) => s.flags(),
            AnyState::Timer(s) => s.flags(),
            AnyState::Event(s) => s.flags(),
        }
    }

    fn erase(self) -> AnyState {
        self
    }
}

impl fmt::Display for AnyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<JobState> for AnyState {
    fn from(s: JobState) -> Self {
        AnyState::Job(s)
    }
}

impl From<ServiceState> for AnyState {
    fn from(s: ServiceState) -> Self {
        AnyState::Service(s)
    }
}

impl From<ParentState> for AnyState {
    fn from(s: ParentState) -> Self {
        AnyState::Parent(s)
    }
}

impl From<TimerState> for AnyState {
    fn from(s: TimerState) -> Self {
        AnyState::Timer(s)
    }
}

impl From<EventState> for AnyState {
    fn from(s: EventState) -> Self {
        AnyState::Event(s)
    }
}

#[cfg(test)]
pub(crate) fn all_states() -> Vec<AnyState> {
    let mut all: Vec<AnyState> = Vec::new();
    all.extend(JobState::ALL.iter().map(|s| s.erase()));
    all.extend(ServiceState::ALL.iter().map(|s| s.erase()));
    all.extend(ParentState::ALL.iter().map(|s| s.erase()));
    all.extend(TimerState::ALL.iter().map(|s| s.erase()));
    all.extend(EventState::ALL.iter().map(|s| s.erase()));
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_state_has_consistent_flags() {
        for s in all_states() {
            assert!(
                s.flags().is_consistent(),
                "{}::{} has inconsistent flags {:?}",
                s.space(),
                s.name(),
                s.flags()
            );
        }
    }

    #[test]
    fn test_destroyed_is_only_destroyed() {
        for s in all_states() {
            if s.is_destroyed() {
                assert_eq!(s.name(), "DESTROYED");
                assert!(!s.is_stoppable());
            }
        }
    }

    #[test]
    fn test_ready_states_are_not_stoppable() {
        for s in all_states().into_iter().filter(|s| s.is_ready()) {
            assert!(!s.is_stoppable(), "{} is ready and stoppable", s);
        }
    }

    #[test]
    fn test_any_state_delegates() {
        let s: AnyState = TimerState::Active.into();
        assert!(s.is_executing());
        assert!(s.is_stoppable());
        assert_eq!(s.space(), "timer");
        assert_eq!(s.to_string(), "ACTIVE");
        assert_eq!(s.erase(), s);
    }
}
