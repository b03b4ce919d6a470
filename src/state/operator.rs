//! # Structural aggregation of child states.
//!
//! A [`StateOperator`] turns the full current snapshot of a container's child
//! states into the container's own [`ParentState`]. Operators are pure, total
//! and idempotent; they are recomputed from the complete snapshot on every child
//! change, never incrementally, so concurrent child changes converge.
//!
//! ## Standard rules ([`StandardStateOp`])
//! ```text
//! any EXCEPTION                  ─► EXCEPTION
//! any EXECUTING                  ─► EXECUTING
//! no children                    ─► READY
//! all COMPLETE                   ─► COMPLETE
//! any INCOMPLETE                 ─► INCOMPLETE
//! otherwise                      ─► STARTED
//! ```

use super::space::{AnyState, ParentState, State};

/// Derives a parent state from a snapshot of child states.
pub trait StateOperator: Send + Sync {
    fn evaluate(&self, children: &[AnyState]) -> ParentState;
}

impl<F> StateOperator for F
where
    F: Fn(&[AnyState]) -> ParentState + Send + Sync,
{
    fn evaluate(&self, children: &[AnyState]) -> ParentState {
        self(children)
    }
}

/// The default container semantics: exception dominates, then executing,
/// completion needs unanimity, one incomplete child is enough once idle.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardStateOp;

impl StateOperator for StandardStateOp {
    fn evaluate(&self, children: &[AnyState]) -> ParentState {
        if children.iter().any(State::is_exception) {
            ParentState::Exception
        } else if children.iter().any(State::is_executing) {
            ParentState::Executing
        } else if children.is_empty() {
            ParentState::Ready
        } else if children.iter().all(State::is_complete) {
            ParentState::Complete
        } else if children.iter().any(State::is_incomplete) {
            ParentState::Incomplete
        } else {
            ParentState::Started
        }
    }
}

/// Readiness-aware aggregation.
///
/// Unlike [`StandardStateOp`], idle stoppable children make the parent
/// `ACTIVE` and a snapshot with nothing but ready children stays `READY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorstStateOp;

impl StateOperator for WorstStateOp {
    fn evaluate(&self, children: &[AnyState]) -> ParentState {
        if children.iter().any(State::is_exception) {
            ParentState::Exception
        } else if children.iter().any(State::is_executing) {
            ParentState::Executing
        } else if children.iter().any(State::is_stoppable) {
            ParentState::Active
        } else if children.iter().any(State::is_incomplete) {
            ParentState::Incomplete
        } else if !children.is_empty() && children.iter().all(State::is_complete) {
            ParentState::Complete
        } else if children.iter().any(State::is_complete) {
            ParentState::Started
        } else {
            ParentState::Ready
        }
    }
}

/// "Any" completion: one complete child is enough once nothing is running.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyCompleteStateOp;

impl StateOperator for AnyCompleteStateOp {
    fn evaluate(&self, children: &[AnyState]) -> ParentState {
        if children.iter().any(State::is_exception) {
            ParentState::Exception
        } else if children.iter().any(State::is_executing) {
            ParentState::Executing
        } else if children.is_empty() {
            ParentState::Ready
        } else if children.iter().any(State::is_complete) {
            ParentState::Complete
        } else if children.iter().any(State::is_incomplete) {
            ParentState::Incomplete
        } else {
            ParentState::Started
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::space::all_states;
    use crate::state::{JobState, ServiceState};

    const READY: AnyState = AnyState::Job(JobState::Ready);
    const EXECUTING: AnyState = AnyState::Job(JobState::Executing);
    const COMPLETE: AnyState = AnyState::Job(JobState::Complete);
    const INCOMPLETE: AnyState = AnyState::Job(JobState::Incomplete);
    const EXCEPTION: AnyState = AnyState::Job(JobState::Exception);
    const STARTED: AnyState = AnyState::Service(ServiceState::Started);

    #[test]
    fn test_empty_is_ready() {
        assert_eq!(StandardStateOp.evaluate(&[]), ParentState::Ready);
        assert_eq!(WorstStateOp.evaluate(&[]), ParentState::Ready);
        assert_eq!(AnyCompleteStateOp.evaluate(&[]), ParentState::Ready);
    }

    #[test]
    fn test_exception_dominates_every_snapshot() {
        for other in all_states() {
            let snapshot = [other, EXCEPTION, other];
            assert_eq!(StandardStateOp.evaluate(&snapshot), ParentState::Exception);
            assert_eq!(WorstStateOp.evaluate(&snapshot), ParentState::Exception);
        }
    }

    #[test]
    fn test_standard_rules() {
        let op = StandardStateOp;
        assert_eq!(op.evaluate(&[COMPLETE, EXECUTING]), ParentState::Executing);
        assert_eq!(op.evaluate(&[INCOMPLETE, EXECUTING]), ParentState::Executing);
        assert_eq!(op.evaluate(&[COMPLETE, COMPLETE]), ParentState::Complete);
        assert_eq!(op.evaluate(&[COMPLETE, INCOMPLETE]), ParentState::Incomplete);
        assert_eq!(op.evaluate(&[COMPLETE, READY]), ParentState::Started);
        assert_eq!(op.evaluate(&[STARTED, COMPLETE]), ParentState::Started);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let all = all_states();
        for window in all.windows(3) {
            let first = StandardStateOp.evaluate(window);
            assert_eq!(first, StandardStateOp.evaluate(window));
        }
    }

    #[test]
    fn test_worst_state_op_readiness() {
        let op = WorstStateOp;
        assert_eq!(op.evaluate(&[READY, READY]), ParentState::Ready);
        assert_eq!(op.evaluate(&[STARTED, COMPLETE]), ParentState::Active);
        assert_eq!(op.evaluate(&[COMPLETE, READY]), ParentState::Started);
        assert_eq!(op.evaluate(&[COMPLETE, INCOMPLETE]), ParentState::Incomplete);
    }

    #[test]
    fn test_any_complete() {
        let op = AnyCompleteStateOp;
        assert_eq!(op.evaluate(&[COMPLETE, INCOMPLETE]), ParentState::Complete);
        assert_eq!(op.evaluate(&[INCOMPLETE, READY]), ParentState::Incomplete);
        assert_eq!(op.evaluate(&[COMPLETE, EXECUTING]), ParentState::Executing);
    }

    #[test]
    fn test_closure_operator() {
        let always_active = |_: &[AnyState]| ParentState::Active;
        assert_eq!(always_active.evaluate(&[COMPLETE]), ParentState::Active);
    }
}
