//! # Component boundary: scoped diagnostic and component context.
//!
//! [`ComponentBoundary`] wraps a unit of work so that, for its whole duration,
//! log records carry the component's logger name and identity and
//! [`ComponentBoundary::current`] answers "which component is running here".
//!
//! ```text
//! execute(work)
//!   ├─► enter tracing span {logger, component}   (diagnostic context)
//!   ├─► push component onto thread context stack
//!   ├─► work()
//!   ├─► pop component                              (also on panic)
//!   └─► exit span                                  (also on panic)
//! ```
//!
//! Nested boundaries restore in LIFO order. Errors returned by `work` are passed
//! through untouched; the boundary only manages context.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::span::EnteredSpan;

use crate::state::ComponentId;

thread_local! {
    static CONTEXT: RefCell<Vec<ComponentId>> = const { RefCell::new(Vec::new()) };
}

/// Scope factory for one component.
#[derive(Clone, Debug)]
pub struct ComponentBoundary {
    logger: Arc<str>,
    component: ComponentId,
}

impl ComponentBoundary {
    pub fn of(logger_name: impl Into<Arc<str>>, component: impl Into<ComponentId>) -> Self {
        Self {
            logger: logger_name.into(),
            component: component.into(),
        }
    }

    pub fn logger_name(&self) -> &str {
        &self.logger
    }

    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    /// Innermost component whose boundary is active on this thread.
    pub fn current() -> Option<ComponentId> {
        CONTEXT
            .try_with(|c| c.borrow().last().cloned())
            .ok()
            .flatten()
    }

    /// Number of nested boundaries active on this thread.
    pub fn depth() -> usize {
        CONTEXT.try_with(|c| c.borrow().len()).unwrap_or(0)
    }

    /// Establishes both contexts until the returned scope is dropped.
    pub fn enter(&self) -> BoundaryScope {
        let span = tracing::info_span!(
            "component",
            logger = %self.logger,
            component = %self.component
        )
        .entered();
        let context = ContextGuard::push(&self.component);
        BoundaryScope {
            _context: context,
            _span: span,
        }
    }

    /// Runs `work` inside the boundary.
    pub fn execute<R>(&self, work: impl FnOnce() -> R) -> R {
        let _scope = self.enter();
        work()
    }

    /// Returns a reusable unit that runs `work` inside this boundary on every call.
    pub fn wrap<R>(&self, mut work: impl FnMut() -> R) -> impl FnMut() -> R {
        let boundary = self.clone();
        move || boundary.execute(&mut work)
    }
}

/// Active boundary scope; restores the previous context on drop.
///
/// Field order is drop order: the component context is popped before the span exits.
pub struct BoundaryScope {
    _context: ContextGuard,
    _span: EnteredSpan,
}

struct ContextGuard {
    pushed: bool,
}

impl ContextGuard {
    fn push(component: &ComponentId) -> Self {
        let pushed = CONTEXT
            .try_with(|c| c.borrow_mut().push(component.clone()))
            .is_ok();
        if !pushed {
            tracing::warn!(component = %component, "component context unavailable on this thread");
        }
        Self { pushed }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.pushed {
            let _ = CONTEXT.try_with(|c| c.borrow_mut().pop());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[test]
    fn test_execute_sets_and_restores_context() {
        assert_eq!(ComponentBoundary::current(), None);
        let b = ComponentBoundary::of("jobs.report", "report");
        let seen = b.execute(ComponentBoundary::current);
        assert_eq!(seen, Some(ComponentId::new("report")));
        assert_eq!(ComponentBoundary::current(), None);
    }

    #[test]
    fn test_nested_boundaries_restore_lifo() {
        let outer = ComponentBoundary::of("outer", "outer");
        let inner = ComponentBoundary::of("inner", "inner");

        outer.execute(|| {
            assert_eq!(ComponentBoundary::depth(), 1);
            inner.execute(|| {
                assert_eq!(ComponentBoundary::current(), Some(ComponentId::new("inner")));
                assert_eq!(ComponentBoundary::depth(), 2);
            });
            assert_eq!(ComponentBoundary::current(), Some(ComponentId::new("outer")));
        });
        assert_eq!(ComponentBoundary::depth(), 0);
    }

    #[test]
    fn test_context_restored_after_panic() {
        let b = ComponentBoundary::of("jobs.boom", "boom");
        let res = catch_unwind(AssertUnwindSafe(|| {
            b.execute(|| panic!("work failed"));
        }));
        assert!(res.is_err());
        assert_eq!(ComponentBoundary::current(), None);
        assert_eq!(ComponentBoundary::depth(), 0);
    }

    #[test]
    fn test_errors_pass_through() {
        let b = ComponentBoundary::of("jobs.err", "err");
        let res: Result<(), String> = b.execute(|| Err("nope".to_string()));
        assert_eq!(res, Err("nope".to_string()));
    }

    #[test]
    fn test_wrap_is_reusable() {
        let b = ComponentBoundary::of("jobs.count", "count");
        let mut calls = 0;
        let mut wrapped = b.wrap(|| {
            calls += 1;
            ComponentBoundary::current()
        });
        assert_eq!(wrapped(), Some(ComponentId::new("count")));
        assert_eq!(wrapped(), Some(ComponentId::new("count")));
        drop(wrapped);
        assert_eq!(calls, 2);
    }
}
