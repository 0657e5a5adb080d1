//! Integration Tests for Reactive System
//!
//! These tests verify that signals, memos, and effects work together correctly
//! across scheduler flushes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use weave_core::reactive::{
    create_effect, create_memo, create_root, create_signal, microtask, on_cleanup, scheduler,
    take_errors, try_create_effect, Signal,
};
use weave_core::RenderError;

/// Writing an equal value schedules nothing.
#[test]
fn equal_write_schedules_nothing() {
    let (count, set_count) = create_signal(1);
    let effect = create_effect(move || {
        count.get();
    });

    set_count.set(1);
    assert_eq!(scheduler::pending_count(), 0);
    assert_eq!(microtask::drain(), 0);
    assert_eq!(effect.run_count(), 1);
}

/// A computation runs once, synchronously, on creation.
#[test]
fn effect_runs_synchronously_on_creation() {
    let ran = Rc::new(Cell::new(0));
    let r = ran.clone();
    let effect = create_effect(move || r.set(r.get() + 1));
    assert_eq!(ran.get(), 1);
    assert_eq!(effect.run_count(), 1);
}

/// A memo lags one flush behind its inputs; dependents catch up on the
/// second turn.
#[test]
fn memo_chain_settles_in_two_turns() {
    let (count, set_count) = create_signal(2);
    let doubled = create_memo(move || count.get() * 2);
    assert_eq!(doubled.get(), 4);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let d = doubled.clone();
    let effect = create_effect(move || s.borrow_mut().push(d.get()));

    set_count.set(5);
    assert_eq!(doubled.get(), 4);

    microtask::turn();
    microtask::turn();
    assert_eq!(doubled.get(), 10);
    assert_eq!(*seen.borrow(), [4, 10]);
    assert_eq!(effect.run_count(), 2);
}

/// Nested computations are disposed when their owner re-runs.
#[test]
fn nested_effects_are_owned_by_parent() {
    let outer_signal = Signal::new(0);
    let inner_signal = Signal::new(0);
    let inner_runs = Rc::new(Cell::new(0));

    let (o, i, runs) = (outer_signal.clone(), inner_signal.clone(), inner_runs.clone());
    let _outer = create_effect(move || {
        o.get();
        let (i, runs) = (i.clone(), runs.clone());
        create_effect(move || {
            i.get();
            runs.set(runs.get() + 1);
        });
    });
    assert_eq!(inner_signal.subscriber_count(), 1);

    outer_signal.set(1);
    microtask::drain();
    assert_eq!(inner_signal.subscriber_count(), 1);

    inner_signal.set(1);
    microtask::drain();
    // initial, re-created by the outer re-run, then one update
    assert_eq!(inner_runs.get(), 3);
}

/// Disposing a root stops every computation created under it.
#[test]
fn root_dispose_stops_everything() {
    let signal = Signal::new(0);
    let runs = Rc::new(Cell::new(0));
    let (s, r) = (signal.clone(), runs.clone());
    let (_, scope) = create_root(move || {
        create_effect(move || {
            s.get();
            r.set(r.get() + 1);
        });
    });

    signal.set(1);
    scope.dispose();
    scope.dispose();
    microtask::drain();

    assert_eq!(runs.get(), 1);
    assert_eq!(signal.subscriber_count(), 0);
}

/// Cleanups run before each re-run and on disposal.
#[test]
fn cleanups_run_before_rerun() {
    let signal = Signal::new(0);
    let cleaned = Rc::new(Cell::new(0));
    let (s, c) = (signal.clone(), cleaned.clone());
    let effect = create_effect(move || {
        s.get();
        let c = c.clone();
        on_cleanup(move || c.set(c.get() + 1)).unwrap();
    });

    signal.set(1);
    microtask::drain();
    assert_eq!(cleaned.get(), 1);

    effect.dispose();
    assert_eq!(cleaned.get(), 2);
}

#[test]
fn on_cleanup_outside_computation_fails() {
    assert!(on_cleanup(|| {}).is_err());
}

/// A failing re-run is reported and does not block the rest of the flush.
#[test]
fn failing_rerun_is_isolated() {
    let signal = Signal::new(0);
    let other_runs = Rc::new(Cell::new(0));

    let s = signal.clone();
    let _failing = try_create_effect(move || {
        if s.get() > 0 {
            return Err(RenderError::component("Counter", "too high"));
        }
        Ok(())
    })
    .unwrap();

    let (s, runs) = (signal.clone(), other_runs.clone());
    let _other = create_effect(move || {
        s.get();
        runs.set(runs.get() + 1);
    });

    signal.set(1);
    microtask::drain();

    assert_eq!(other_runs.get(), 2);
    let errors = take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        RenderError::Component { component, .. } if component == "Counter"
    ));
}

proptest! {
    /// However many writes happen before the first turn, the subscriber
    /// re-runs exactly once.
    #[test]
    fn writes_coalesce_into_one_rerun(values in proptest::collection::vec(1..1000i32, 1..20)) {
        let signal = Signal::new(0);
        let s = signal.clone();
        let effect = create_effect(move || {
            s.get();
        });

        for value in &values {
            signal.set(*value);
        }
        microtask::turn();
        microtask::turn();

        prop_assert_eq!(effect.run_count(), 2);
        effect.dispose();
    }

    /// A disposed computation never re-runs.
    #[test]
    fn disposed_effect_never_reruns(writes in 1..10usize) {
        let signal = Signal::new(0);
        let s = signal.clone();
        let effect = create_effect(move || {
            s.get();
        });
        effect.dispose();

        for value in 0..writes {
            signal.set(value as i32 + 1);
        }
        microtask::drain();

        prop_assert_eq!(effect.run_count(), 1);
        prop_assert!(effect.is_disposed());
    }
}

#[cfg(feature = "tokio")]
#[tokio::test(flavor = "current_thread")]
async fn settle_drains_on_local_set() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (count, set_count) = create_signal(0);
            let doubled = create_memo(move || count.get() * 2);
            set_count.set(21);
            microtask::settle().await;
            assert_eq!(doubled.get(), 42);
        })
        .await;
}
