//! Signal Implementation
//!
//! A signal (an observable cell) is the fundamental reactive primitive. It
//! holds a value and the set of computations that read it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a computation is running, the computation
//!    subscribes to the signal.
//!
//! 2. When a write changes the value, every subscriber is handed to the
//!    scheduler. Nothing runs synchronously.
//!
//! 3. A write of a value equal to the current one is a no-op: nobody is
//!    notified.
//!
//! Subscribers stay subscribed until their own next run, when they tear
//! down and re-subscribe to whatever they read that time.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::context::ReactiveContext;
use super::subscriber::{SignalId, Subscribers};

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use weave_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    id: SignalId,
    value: Rc<RefCell<T>>,
    subscribers: Rc<Subscribers>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: SignalId::new(),
            value: Rc::new(RefCell::new(value)),
            subscribers: Subscribers::new(),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> T {
        self.track();
        self.value.borrow().clone()
    }

    /// Borrow the current value, subscribing the running computation.
    ///
    /// The closure must not write to this same signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Set a new value and schedule subscribers if it changed.
    pub fn set(&self, value: T) {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.notify();
    }

    /// Compute the next value from the previous one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value.borrow());
        self.set(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn track(&self) {
        if let Some(observer) = ReactiveContext::current_observer() {
            observer.track(self.id, &self.subscribers);
        }
    }

    fn notify(&self) {
        let subscribers = self.subscribers.snapshot();
        tracing::trace!(signal = ?self.id, subscribers = subscribers.len(), "signal changed");
        for subscriber in subscribers {
            subscriber.notify();
        }
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Rc::clone(&self.value),
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &*self.value.borrow())
            .field("subscriber_count", &self.subscribers.len())
            .finish()
    }
}

/// The reading half of a signal.
pub struct ReadSignal<T>(Signal<T>);

/// The writing half of a signal.
pub struct WriteSignal<T>(Signal<T>);

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> ReadSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Current value; subscribes the running computation.
    pub fn get(&self) -> T {
        self.0.get()
    }

    /// Borrow the current value; subscribes the running computation.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.with(f)
    }

    /// Current value without subscribing.
    pub fn get_untracked(&self) -> T {
        self.0.get_untracked()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.0.subscriber_count()
    }
}

impl<T> WriteSignal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Store `value`, notifying subscribers if it differs.
    pub fn set(&self, value: T) {
        self.0.set(value)
    }

    /// Store `f(previous)`, notifying subscribers if it differs.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        self.0.update(f)
    }
}

impl<T: Debug> Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Create a cell and return its reader and writer.
pub fn create_signal<T>(initial: T) -> (ReadSignal<T>, WriteSignal<T>)
where
    T: Clone + PartialEq + 'static,
{
    let signal = Signal::new(initial);
    (ReadSignal(signal.clone()), WriteSignal(signal))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
