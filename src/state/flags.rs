//! # Lifecycle capability flags.
//!
//! Every named state carries a fixed subset of seven flags. The flags are what
//! the rest of the core looks at: aggregation, stop waiting and monitors never
//! match on state names.
//!
//! ## Rules
//! - `COMPLETE`, `INCOMPLETE` and `EXCEPTION` are mutually exclusive.
//! - `READY` never coexists with `STOPPABLE`.
//! - `DESTROYED` is terminal.

use std::fmt;
use std::ops::BitOr;

/// Bit set of lifecycle flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StateFlags(u8);

impl StateFlags {
    pub const NONE: StateFlags = StateFlags(0);
    /// May be started.
    pub const READY: StateFlags = StateFlags(1);
    /// Work is in flight.
    pub const EXECUTING: StateFlags = StateFlags(1 << 1);
    /// An explicit stop request is meaningful.
    pub const STOPPABLE: StateFlags = StateFlags(1 << 2);
    /// Finished successfully.
    pub const COMPLETE: StateFlags = StateFlags(1 << 3);
    /// Finished without reaching its goal.
    pub const INCOMPLETE: StateFlags = StateFlags(1 << 4);
    /// Finished with an error.
    pub const EXCEPTION: StateFlags = StateFlags(1 << 5);
    /// Terminal; no further transition.
    pub const DESTROYED: StateFlags = StateFlags(1 << 6);

    const NAMES: [(StateFlags, &'static str); 7] = [
        (Self::READY, "READY"),
        (Self::EXECUTING, "EXECUTING"),
        (Self::STOPPABLE, "STOPPABLE"),
        (Self::COMPLETE, "COMPLETE"),
        (Self::INCOMPLETE, "INCOMPLETE"),
        (Self::EXCEPTION, "EXCEPTION"),
        (Self::DESTROYED, "DESTROYED"),
    ];

    #[inline]
    pub const fn union(self, other: StateFlags) -> StateFlags {
        StateFlags(self.0 | other.0)
    }

    /// True if every flag of `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: StateFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Checks the flag invariants shared by all state spaces.
    pub const fn is_consistent(self) -> bool {
        let outcomes = (self.contains(Self::COMPLETE) as u8)
            + (self.contains(Self::INCOMPLETE) as u8)
            + (self.contains(Self::EXCEPTION) as u8);
        let ready_and_stoppable = self.contains(Self::READY) && self.contains(Self::STOPPABLE);
        outcomes <= 1 && !ready_and_stoppable
    }
}

impl BitOr for StateFlags {
    type Output = StateFlags;

    fn bitor(self, rhs: StateFlags) -> StateFlags {
        self.union(rhs)
    }
}

impl fmt::Debug for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_and_union() {
        let f = StateFlags::EXECUTING | StateFlags::STOPPABLE;
        assert!(f.contains(StateFlags::EXECUTING));
        assert!(f.contains(StateFlags::STOPPABLE));
        assert!(!f.contains(StateFlags::READY));
        assert!(f.contains(StateFlags::NONE));
    }

    #[test]
    fn test_two_outcomes_are_inconsistent() {
        assert!(!(StateFlags::COMPLETE | StateFlags::EXCEPTION).is_consistent());
        assert!(!(StateFlags::READY | StateFlags::STOPPABLE).is_consistent());
        assert!((StateFlags::EXECUTING | StateFlags::STOPPABLE).is_consistent());
        assert!(StateFlags::NONE.is_consistent());
    }

    #[test]
    fn test_debug_lists_names() {
        let f = StateFlags::EXECUTING | StateFlags::STOPPABLE;
        assert_eq!(format!("{f:?}"), "EXECUTING | STOPPABLE");
        assert_eq!(format!("{:?}", StateFlags::NONE), "NONE");
    }
}
