//! Reactive Context
//!
//! The reactive context tracks which computation is currently running and
//! which scope newly created computations belong to. When a cell is read,
//! the running computation (the "observer") is registered as a subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering a computation pushes an entry,
//! dropping the returned guard pops it. Because popping happens in `Drop`,
//! the stack is restored even when a computation unwinds, so a failure in a
//! nested computation never leaves a stale observer visible to its siblings.

use std::cell::RefCell;
use std::rc::Rc;

use super::effect::Computation;
use super::runtime::Scope;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Clone)]
struct ContextEntry {
    /// The computation that reads are attributed to, if any.
    observer: Option<Rc<Computation>>,
    /// The scope new computations register their disposer with, if any.
    scope: Option<Scope>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    depth: usize,
}

impl ReactiveContext {
    /// Enter the context of a running computation.
    ///
    /// Reads become dependencies of `observer`, and computations created
    /// while the guard lives are owned by `scope`.
    pub(crate) fn enter(observer: Rc<Computation>, scope: Scope) -> Self {
        Self::push(ContextEntry {
            observer: Some(observer),
            scope: Some(scope),
        })
    }

    /// Enter a scope without an observer (used by `create_root`).
    pub(crate) fn enter_scope(scope: Scope) -> Self {
        Self::push(ContextEntry {
            observer: None,
            scope: Some(scope),
        })
    }

    /// Suspend dependency tracking while keeping the current scope.
    pub(crate) fn untracked() -> Self {
        let scope = Self::current_scope();
        Self::push(ContextEntry {
            observer: None,
            scope,
        })
    }

    fn push(entry: ContextEntry) -> Self {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(entry);
            stack.len()
        });
        Self { depth }
    }

    /// Check if there is an active computation.
    pub fn is_active() -> bool {
        Self::current_observer().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        Self::current_observer().map(|observer| observer.id())
    }

    pub(crate) fn current_observer() -> Option<Rc<Computation>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|e| e.observer.clone()))
    }

    pub(crate) fn current_scope() -> Option<Scope> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|e| e.scope.clone()))
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext dropped out of order"
            );
            stack.pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_context_outside_computations() {
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
        assert!(ReactiveContext::current_scope().is_none());
    }

    #[test]
    fn scope_entry_has_no_observer() {
        let scope = Scope::new();
        {
            let _ctx = ReactiveContext::enter_scope(scope.clone());
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::current_scope().is_some());

            {
                let _inner = ReactiveContext::untracked();
                assert!(ReactiveContext::current_scope().is_some());
            }
        }

        assert!(ReactiveContext::current_scope().is_none());
    }

    #[test]
    fn stack_is_restored_after_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter_scope(Scope::new());
            panic!("inside scope");
        });

        assert!(result.is_err());
        assert!(ReactiveContext::current_scope().is_none());
    }
}
