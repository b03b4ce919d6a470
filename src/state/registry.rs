//! # Process-wide read-only state tables.
//!
//! Monitors need an icon per state and single-child containers need to mirror a
//! child's state in the parent space. Both tables are built once, on first use,
//! and never mutated afterwards.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::space::{AnyState, EventState, JobState, ParentState, ServiceState, State, TimerState};

static ICONS: LazyLock<HashMap<AnyState, &'static str>> = LazyLock::new(|| {
    let mut icons = HashMap::new();
    for s in JobState::ALL {
        icons.insert(s.erase(), icon_by_flags(s.erase()));
    }
    for s in ServiceState::ALL {
        icons.insert(s.erase(), icon_by_flags(s.erase()));
    }
    for s in ParentState::ALL {
        icons.insert(s.erase(), icon_by_flags(s.erase()));
    }
    for s in TimerState::ALL {
        icons.insert(s.erase(), icon_by_flags(s.erase()));
    }
    for s in EventState::ALL {
        icons.insert(s.erase(), icon_by_flags(s.erase()));
    }
    icons.insert(ServiceState::Started.erase(), "started");
    icons.insert(ParentState::Active.erase(), "active");
    icons.insert(TimerState::Started.erase(), "sleeping");
    icons.insert(EventState::Waiting.erase(), "sleeping");
    icons.insert(EventState::Triggered.erase(), "triggered");
    icons
});

static TO_PARENT: LazyLock<HashMap<AnyState, ParentState>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for s in JobState::ALL {
        map.insert(s.erase(), parent_by_flags(s.erase()));
    }
    for s in ServiceState::ALL {
        map.insert(s.erase(), parent_by_flags(s.erase()));
    }
    for s in ParentState::ALL {
        map.insert(s.erase(), s);
    }
    for s in TimerState::ALL {
        map.insert(s.erase(), parent_by_flags(s.erase()));
    }
    for s in EventState::ALL {
        map.insert(s.erase(), parent_by_flags(s.erase()));
    }
    map
});

fn icon_by_flags(s: AnyState) -> &'static str {
    if s.is_destroyed() {
        "destroyed"
    } else if s.is_exception() {
        "exception"
    } else if s.is_executing() {
        "executing"
    } else if s.is_stoppable() {
        "active"
    } else if s.is_complete() {
        "complete"
    } else if s.is_incomplete() {
        "incomplete"
    } else {
        "ready"
    }
}

fn parent_by_flags(s: AnyState) -> ParentState {
    if s.is_destroyed() {
        ParentState::Destroyed
    } else if s.is_exception() {
        ParentState::Exception
    } else if s.is_executing() {
        ParentState::Executing
    } else if s.is_stoppable() {
        ParentState::Active
    } else if s.is_complete() {
        ParentState::Complete
    } else if s.is_incomplete() {
        ParentState::Incomplete
    } else {
        ParentState::Ready
    }
}

/// Monitor icon id for `state`.
pub fn icon_for(state: impl State) -> &'static str {
    let state = state.erase();
    ICONS
        .get(&state)
        .copied()
        .unwrap_or_else(|| icon_by_flags(state))
}

/// The parent-space state mirroring a child in `state`.
pub fn to_parent(state: impl State) -> ParentState {
    let state = state.erase();
    TO_PARENT
        .get(&state)
        .copied()
        .unwrap_or_else(|| parent_by_flags(state))
}
