//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values. Every
//! cell owns one [`Subscribers`] set; every computation remembers which sets
//! it was registered in so it can remove itself again before its next run.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::effect::Computation;

/// Unique identifier for a subscriber.
///
/// Each computation (effect, memo, render placeholder) gets a unique ID when
/// created. The ID keys the subscriber sets and the scheduler queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The set of computations currently subscribed to one cell.
///
/// Insertion ordered, so notification follows subscription order.
#[derive(Default)]
pub struct Subscribers {
    set: RefCell<IndexMap<SubscriberId, Rc<Computation>>>,
}

impl Subscribers {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn insert(&self, computation: Rc<Computation>) {
        self.set.borrow_mut().insert(computation.id(), computation);
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.set.borrow_mut().shift_remove(&id);
    }

    /// Copy of the current subscribers, in subscription order.
    pub(crate) fn snapshot(&self) -> Vec<Rc<Computation>> {
        self.set.borrow().values().cloned().collect()
    }

    /// Number of subscribed computations.
    pub fn len(&self) -> usize {
        self.set.borrow().len()
    }

    /// Whether no computation is subscribed.
    pub fn is_empty(&self) -> bool {
        self.set.borrow().is_empty()
    }
}
