//! Effect Implementation
//!
//! An effect (a "computation") is a procedure that re-runs whenever a cell
//! it read during its previous run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately and synchronously to
//!    establish its initial dependencies.
//!
//! 2. When any dependency changes, the effect is handed to the scheduler,
//!    which re-runs it in the next flush.
//!
//! 3. Before re-running, the effect tears down: cleanups registered during
//!    the previous run execute, then the effect removes itself from every
//!    subscriber set it joined. Dependencies are tracked afresh during the
//!    new run.
//!
//! # Cleanup
//!
//! Effects can return a [`Cleanup`], or register any number of them with
//! [`on_cleanup`] while running. Computations created during a run are
//! owned by that run and disposed with it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::error::{ReactiveError, RenderError};

use super::context::ReactiveContext;
use super::runtime::{Cleanup, IntoCleanup, Scope};
use super::scheduler;
use super::subscriber::{SignalId, SubscriberId, Subscribers};

type EffectFn = Box<dyn FnMut() -> Result<Option<Cleanup>, RenderError>>;

/// The shared state of one computation.
pub struct Computation {
    id: SubscriberId,
    run: RefCell<Option<EffectFn>>,
    disposed: Cell<bool>,
    /// Subscriber sets this computation joined during its current run.
    sources: RefCell<SmallVec<[(SignalId, Weak<Subscribers>); 4]>>,
    /// Owns cleanups and child computations of the current run.
    scope: Scope,
    run_count: Cell<usize>,
}

impl Computation {
    fn new(run: EffectFn) -> Rc<Self> {
        Rc::new(Self {
            id: SubscriberId::new(),
            run: RefCell::new(Some(run)),
            disposed: Cell::new(false),
            sources: RefCell::new(SmallVec::new()),
            scope: Scope::new(),
            run_count: Cell::new(0),
        })
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Subscribe to a cell, once per run.
    pub(crate) fn track(self: &Rc<Self>, signal: SignalId, subscribers: &Rc<Subscribers>) {
        let mut sources = self.sources.borrow_mut();
        if sources.iter().any(|(id, _)| *id == signal) {
            return;
        }
        sources.push((signal, Rc::downgrade(subscribers)));
        subscribers.insert(self.clone());
    }

    /// Run cleanups, then leave every subscriber set.
    fn teardown(&self) {
        self.scope.run_cleanups();
        let sources = std::mem::take(&mut *self.sources.borrow_mut());
        for (_, subscribers) in sources {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.remove(self.id);
            }
        }
    }

    fn execute(self: &Rc<Self>) -> Result<(), RenderError> {
        if self.disposed.get() {
            return Ok(());
        }
        let Some(mut run) = self.run.borrow_mut().take() else {
            return Ok(());
        };

        let result = {
            let _ctx = ReactiveContext::enter(self.clone(), self.scope.clone());
            run()
        };

        if !self.disposed.get() {
            *self.run.borrow_mut() = Some(run);
        }
        self.run_count.set(self.run_count.get() + 1);

        if let Some(cleanup) = result? {
            self.scope.add(cleanup);
        }
        Ok(())
    }

    /// Tear down and execute again. Called by the scheduler.
    pub(crate) fn rerun(self: &Rc<Self>) -> Result<(), RenderError> {
        self.teardown();
        self.execute()
    }

    pub(crate) fn notify(self: &Rc<Self>) {
        if !self.disposed.get() {
            scheduler::schedule(self);
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        scheduler::unschedule(self.id);
        self.teardown();
        self.scope.dispose();
        self.run.borrow_mut().take();
    }
}

/// Handle returned by [`create_effect`]. Disposing is idempotent.
#[derive(Clone)]
pub struct Dispose {
    computation: Rc<Computation>,
}

impl Dispose {
    /// Stop the computation: run its cleanups, drop its subscriptions and
    /// cancel any pending re-run.
    pub fn dispose(&self) {
        self.computation.dispose();
    }

    /// Whether the computation has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.computation.is_disposed()
    }

    /// Number of times the computation body has executed.
    pub fn run_count(&self) -> usize {
        self.computation.run_count.get()
    }

    /// Number of cells the computation currently depends on.
    pub fn dependency_count(&self) -> usize {
        self.computation.sources.borrow().len()
    }

    /// The subscriber ID of the computation.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.computation.id
    }
}

impl fmt::Debug for Dispose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.computation.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn spawn(run: EffectFn) -> (Dispose, Result<(), RenderError>) {
    let computation = Computation::new(run);
    let handle = Dispose {
        computation: computation.clone(),
    };

    if let Some(owner) = ReactiveContext::current_scope() {
        let child = handle.clone();
        owner.add(Cleanup::new(move || child.dispose()));
    }

    let result = computation.execute();
    (handle, result)
}

/// Create a computation that runs now and again whenever its dependencies
/// change.
///
/// The body may return `()`, a [`Cleanup`] or an `Option<Cleanup>`.
///
/// # Example
///
/// ```rust
/// use weave_core::reactive::{create_effect, create_signal, microtask};
///
/// let (count, set_count) = create_signal(0);
/// let effect = create_effect(move || println!("count = {}", count.get()));
///
/// set_count.set(5);
/// microtask::turn(); // prints "count = 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
pub fn create_effect<F, R>(mut f: F) -> Dispose
where
    F: FnMut() -> R + 'static,
    R: IntoCleanup,
{
    // The body is infallible; only a panic can escape, and it unwinds to the caller.
    let (handle, _) = spawn(Box::new(move || Ok(f().into_cleanup())));
    handle
}

/// Create a computation whose body can fail.
///
/// A failure on the first run is returned to the caller and the computation
/// is disposed. Failures on scheduled re-runs go to the error sink.
pub fn try_create_effect<F, R>(mut f: F) -> Result<Dispose, RenderError>
where
    F: FnMut() -> Result<R, RenderError> + 'static,
    R: IntoCleanup,
{
    let (handle, result) = spawn(Box::new(move || f().map(IntoCleanup::into_cleanup)));
    if let Err(err) = result {
        handle.dispose();
        return Err(err);
    }
    Ok(handle)
}

/// Register a cleanup with the running computation.
///
/// Fails when no computation is running.
pub fn on_cleanup<F>(f: F) -> Result<(), ReactiveError>
where
    F: FnOnce() + 'static,
{
    let observer = ReactiveContext::current_observer().ok_or(ReactiveError::NoActiveComputation {
        operation: "on_cleanup",
    })?;
    observer.scope.add(Cleanup::new(f));
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
