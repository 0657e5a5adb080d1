//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and
//! effects, plus the scheduler that batches their re-execution.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while a computation is running, the signal registers that computation as
//! a subscriber. When the value changes, every subscriber is scheduled.
//!
//! ## Effects
//!
//! An Effect is a computation that runs immediately and again whenever one
//! of the signals it read changes. Effects own the computations created
//! while they run, so nested effects are torn down with their parent.
//!
//! ## Memos
//!
//! A Memo is a signal whose value is written by a private effect. Reading it
//! never recomputes; the value is refreshed when the scheduler flushes the
//! private effect.
//!
//! ## Scheduling
//!
//! Writes never run subscribers synchronously. Subscribers are collected in
//! a deduplicated pending set and flushed together on the next
//! [`microtask::turn`].
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local context stack to detect
//! dependencies automatically. Everything is single threaded and built on
//! `Rc`/`RefCell`; back-references between computations and cells are
//! explicit and torn down before every re-run.

mod context;
mod effect;
mod memo;
pub mod microtask;
mod runtime;
pub mod scheduler;
mod signal;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::{create_effect, on_cleanup, try_create_effect, Dispose};
pub use memo::{create_memo, Memo};
pub use runtime::{
    clear_error_handler, create_root, set_error_handler, take_errors, untrack, Cleanup,
    IntoCleanup, Scope,
};
pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
pub use subscriber::{SignalId, SubscriberId, Subscribers};
