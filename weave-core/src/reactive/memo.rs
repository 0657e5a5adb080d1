//! Memo Implementation
//!
//! A memo is a derived value: a cell whose writer is driven by a private
//! computation.
//!
//! # How Memos Work
//!
//! 1. On creation, the private computation runs once and seeds the cell.
//!
//! 2. Reading the memo only reads the cell. It never recomputes, so any
//!    number of reads between two flushes return the same cached value.
//!
//! 3. When a dependency changes, the private computation is scheduled like
//!    any other. Once the scheduler flushes it, the new result is written
//!    into the cell, and readers of the memo are scheduled in turn (unless
//!    the result is equal to the previous one).
//!
//! A memo therefore lags one flush behind its inputs: after a write, the
//! first turn updates the memo, the second turn re-runs its readers.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::effect::{create_effect, Dispose};
use super::runtime::untrack;
use super::signal::Signal;

/// A cached derived value.
pub struct Memo<T> {
    signal: Signal<T>,
    computation: Dispose,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a memo from a computation.
    pub fn new<F>(compute: F) -> Self
    where
        F: FnMut() -> T + 'static,
    {
        let compute = Rc::new(RefCell::new(compute));
        let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::new(RefCell::new(None));

        let (target, body) = (slot.clone(), compute.clone());
        let computation = create_effect(move || {
            let value = (body.borrow_mut())();
            let existing = target.borrow().clone();
            match existing {
                Some(signal) => signal.set(value),
                None => *target.borrow_mut() = Some(Signal::new(value)),
            }
        });

        // Under a disposed owner the computation never runs; the memo then
        // holds a single untracked value.
        let existing = slot.borrow().clone();
        let signal = match existing {
            Some(signal) => signal,
            None => Signal::new(untrack(|| (compute.borrow_mut())())),
        };

        Self {
            signal,
            computation,
        }
    }

    /// Read the cached value, subscribing the running computation.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Borrow the cached value, subscribing the running computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// Read the cached value without subscribing.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    /// Number of times the memo's computation has run.
    pub fn run_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Number of computations reading this memo.
    pub fn dependent_count(&self) -> usize {
        self.signal.subscriber_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.computation.dispose();
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            computation: self.computation.clone(),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.signal.get_untracked())
            .field("run_count", &self.computation.run_count())
            .field("dependent_count", &self.signal.subscriber_count())
            .finish()
    }
}

/// Create a derived value.
pub fn create_memo<T, F>(compute: F) -> Memo<T>
where
    T: Clone + PartialEq + 'static,
    F: FnMut() -> T + 'static,
{
    Memo::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
