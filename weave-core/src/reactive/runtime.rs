//! Reactive Runtime
//!
//! Ownership and failure plumbing shared by every computation:
//!
//! - [`Scope`]: a list of cleanups that runs as one unit. Every computation
//!   owns a scope for the duration of each run; computations created during
//!   that run register their disposer in it, so re-running or disposing the
//!   parent tears the children down first.
//! - [`create_root`]: a detached scope for long lived trees (a mounted root).
//! - [`untrack`]: read cells without subscribing.
//! - The error sink: failures inside scheduled re-runs cannot propagate to a
//!   caller, so they are reported here instead.
//!
//! # Thread Safety
//!
//! The runtime is single threaded. All state lives in thread-locals and is
//! only touched through RAII guards.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::RenderError;

use super::context::ReactiveContext;

/// A deferred teardown procedure.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    /// Wrap a closure as a cleanup.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self(Box::new(f))
    }

    /// Run the cleanup, consuming it.
    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Values a computation body may return.
///
/// A computation either returns nothing or hands back a cleanup that runs
/// before its next execution and on disposal.
pub trait IntoCleanup {
    /// Convert into an optional cleanup.
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

struct ScopeInner {
    cleanups: RefCell<Vec<Cleanup>>,
    disposed: Cell<bool>,
}

/// An ownership scope: cleanups registered here run together.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                cleanups: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Register a cleanup.
    ///
    /// A scope that is already disposed runs the cleanup immediately.
    pub fn add(&self, cleanup: Cleanup) {
        if self.inner.disposed.get() {
            cleanup.run();
        } else {
            self.inner.cleanups.borrow_mut().push(cleanup);
        }
    }

    /// Run and forget every registered cleanup, leaving the scope usable.
    pub(crate) fn run_cleanups(&self) {
        loop {
            // Cleanups may register further cleanups; keep draining.
            let batch = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
            if batch.is_empty() {
                break;
            }
            for cleanup in batch {
                cleanup.run();
            }
        }
    }

    /// Dispose the scope. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.run_cleanups();
    }

    /// Whether the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of pending cleanups.
    pub fn cleanup_count(&self) -> usize {
        self.inner.cleanups.borrow().len()
    }

    /// Run `f` with this scope as the owner of new computations.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _ctx = ReactiveContext::enter_scope(self.clone());
        f()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("cleanups", &self.cleanup_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Run `f` inside a fresh detached scope.
///
/// Returns the result together with the scope; disposing the scope disposes
/// every computation created inside `f`.
pub fn create_root<T>(f: impl FnOnce() -> T) -> (T, Scope) {
    let scope = Scope::new();
    let value = scope.run(f);
    (value, scope)
}

/// Run `f` without tracking any cell reads.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}

// ----------------------------------------------------------------------------
// Error sink
// ----------------------------------------------------------------------------

type ErrorHandler = Rc<dyn Fn(&RenderError)>;

thread_local! {
    static ERROR_HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
    static UNHANDLED: RefCell<Vec<RenderError>> = const { RefCell::new(Vec::new()) };
}

/// Install a handler for failures of scheduled re-runs.
///
/// Without a handler, failures are collected and can be retrieved with
/// [`take_errors`].
pub fn set_error_handler<F>(handler: F)
where
    F: Fn(&RenderError) + 'static,
{
    ERROR_HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Remove the installed error handler.
pub fn clear_error_handler() {
    ERROR_HANDLER.with(|slot| slot.borrow_mut().take());
}

/// Drain the failures collected while no handler was installed.
pub fn take_errors() -> Vec<RenderError> {
    UNHANDLED.with(|errors| std::mem::take(&mut *errors.borrow_mut()))
}

pub(crate) fn report_error(err: RenderError) {
    tracing::error!(error = %err, "scheduled computation failed");
    let handler = ERROR_HANDLER.with(|slot| slot.borrow().clone());
    match handler {
        Some(handler) => handler(&err),
        None => UNHANDLED.with(|errors| errors.borrow_mut().push(err)),
    }
}
