//! Microtask Queue
//!
//! The scheduler defers re-execution to "after the current synchronous work".
//! This module provides that deferral point: a thread-local FIFO of tasks
//! that the host drains in turns.
//!
//! A turn runs exactly the tasks that were queued when it started. Tasks
//! queued while a turn is running wait for the next turn, which gives tests
//! a precise handle on batching: after a write, one turn flushes the direct
//! subscribers, a second turn flushes whatever those subscribers scheduled.

use std::cell::RefCell;
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = const { RefCell::new(VecDeque::new()) };
}

/// Queue a task for the next turn.
pub fn queue_microtask<F>(task: F)
where
    F: FnOnce() + 'static,
{
    QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
}

/// Number of queued tasks.
pub fn pending() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

/// Run one turn. Returns the number of tasks executed.
pub fn turn() -> usize {
    let count = pending();
    for _ in 0..count {
        let task = QUEUE.with(|queue| queue.borrow_mut().pop_front());
        match task {
            Some(task) => task(),
            None => break,
        }
    }
    count
}

/// Run turns until the queue is empty. Returns the number of tasks executed.
pub fn drain() -> usize {
    let mut total = 0;
    loop {
        let ran = turn();
        if ran == 0 {
            return total;
        }
        total += ran;
    }
}

/// Drain the queue, yielding to the tokio executor between turns.
///
/// Must be awaited on the thread that owns the reactive graph, typically
/// inside a `tokio::task::LocalSet`.
#[cfg(feature = "tokio")]
pub async fn settle() -> usize {
    let mut total = 0;
    loop {
        let ran = turn();
        if ran == 0 {
            return total;
        }
        total += ran;
        tokio::task::yield_now().await;
    }
}
