//! Update Scheduler
//!
//! Cell writes never run subscribers synchronously. They are collected in a
//! pending set and executed together in a flush.
//!
//! # Algorithm
//!
//! 1. `schedule` inserts a computation into the pending set (deduplicated,
//!    insertion ordered). The first insertion since the last flush queues a
//!    single flush as a microtask.
//! 2. A flush snapshots the pending set, clears it, and re-runs each entry
//!    in snapshot order.
//! 3. Anything scheduled while the flush runs lands in a fresh pending set
//!    and waits for the next flush.
//!
//! Each entry runs isolated: an `Err` or a panic from one computation is
//! reported to the error sink and the rest of the batch still runs.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::RenderError;

use super::effect::Computation;
use super::microtask;
use super::runtime::report_error;
use super::SubscriberId;

#[derive(Default)]
struct Queue {
    pending: IndexMap<SubscriberId, Rc<Computation>>,
    scheduled: bool,
}

thread_local! {
    static QUEUE: RefCell<Queue> = RefCell::new(Queue::default());
}

/// Request a future re-run of `computation`.
pub(crate) fn schedule(computation: &Rc<Computation>) {
    let arm = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue
            .pending
            .entry(computation.id())
            .or_insert_with(|| computation.clone());
        !std::mem::replace(&mut queue.scheduled, true)
    });

    if arm {
        tracing::trace!("arming scheduler flush");
        microtask::queue_microtask(|| {
            flush();
        });
    }
}

/// Drop a pending re-run, if any.
pub(crate) fn unschedule(id: SubscriberId) {
    QUEUE.with(|queue| {
        queue.borrow_mut().pending.shift_remove(&id);
    });
}

/// Number of computations waiting for the next flush.
pub fn pending_count() -> usize {
    QUEUE.with(|queue| queue.borrow().pending.len())
}

/// Run the pending set now. Returns the number of computations executed.
pub fn flush() -> usize {
    let batch: Vec<Rc<Computation>> = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.scheduled = false;
        std::mem::take(&mut queue.pending).into_values().collect()
    });

    tracing::trace!(count = batch.len(), "flushing scheduled computations");

    let mut executed = 0;
    for computation in batch {
        if computation.is_disposed() {
            continue;
        }
        executed += 1;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| computation.rerun()));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => report_error(err),
            Err(payload) => report_error(RenderError::Panicked(panic_message(&payload))),
        }
    }
    executed
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
