//! Scheduler, future, and coroutine end-to-end scenarios.
//!
//! The literal flows a shard runs all day: a coroutine awaiting a value
//! that arrives a scheduler turn later, failure capture with frame
//! destruction, and the ordering contract of the two queue classes.

use monoshard::{
    coroutine, make_task, schedule, with_scheduling_group, Error, Future, Promise,
    SchedulingGroup, Shard,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn coroutine_receives_value_after_one_scheduler_turn() {
    let shard = Shard::new();
    let mut promise = Promise::new();
    let inner = promise.get_future();

    let result = coroutine(async move {
        let value: u32 = inner.await?;
        Ok(value)
    });
    assert!(!result.available(), "coroutine suspends on the pending future");

    schedule(make_task(move || promise.set_value(42u32)));
    shard.run_until_idle();

    assert!(result.available());
    assert_eq!(result.get().unwrap(), 42);
}

#[test]
fn coroutine_failure_before_any_await_destroys_the_frame() {
    struct Sentinel(Rc<Cell<u32>>);
    impl Drop for Sentinel {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    let drops = Rc::new(Cell::new(0));
    let sentinel = Sentinel(drops.clone());
    let result: Future<u8> = coroutine(async move {
        let _held = sentinel;
        panic!("domain failure before any await");
    });

    assert!(matches!(
        result.get(),
        Err(Error::TaskPanicked(msg)) if msg.contains("domain failure")
    ));
    assert_eq!(drops.get(), 1, "frame destroyed exactly once");
}

#[test]
fn value_chain_through_two_coroutines() {
    let shard = Shard::new();
    let mut promise = Promise::new();
    let source = promise.get_future();

    let doubled = coroutine(async move {
        let value: u64 = source.await?;
        Ok(value * 2)
    });
    let plus_one = coroutine(async move {
        let value = doubled.await?;
        Ok(value + 1)
    });

    schedule(make_task(move || promise.set_value(20u64)));
    shard.run_until_idle();
    assert_eq!(plus_one.get().unwrap(), 41);
}

#[test]
fn completion_continuations_run_before_queued_work() {
    let shard = Shard::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let mut promise = Promise::new();
    let inner = promise.get_future();
    let log = order.clone();
    let done = coroutine(async move {
        let value: u8 = inner.await?;
        log.borrow_mut().push("continuation");
        Ok(value)
    });

    // The resolver runs first and queues more normal work behind itself;
    // the completion continuation goes urgent and overtakes it.
    let log = order.clone();
    schedule(make_task(move || {
        promise.set_value(1u8);
        let log2 = log.clone();
        schedule(make_task(move || log2.borrow_mut().push("queued-after")));
        log.borrow_mut().push("resolver");
    }));

    shard.run_until_idle();
    assert_eq!(
        *order.borrow(),
        vec!["resolver", "continuation", "queued-after"]
    );
    assert_eq!(done.get().unwrap(), 1);
}

#[test]
fn broken_promise_propagates_through_a_chain() {
    let shard = Shard::new();
    let mut promise = Promise::<u32>::new();
    let source = promise.get_future();

    let downstream = coroutine(async move {
        let value = source.await?;
        Ok(value + 1)
    });

    schedule(make_task(move || drop(promise)));
    shard.run_until_idle();
    assert!(matches!(downstream.get(), Err(Error::BrokenPromise)));
}

#[test]
fn future_is_never_available_without_content() {
    let mut promise = Promise::<u16>::new();
    let future = promise.get_future();
    assert!(!future.available());
    promise.set_value(3);
    // Available implies the outcome is there to take, atomically.
    assert!(future.available());
    assert_eq!(future.get().unwrap(), 3);
}

#[test]
fn ready_futures_never_suspend_the_coroutine() {
    // No shard registered: the body must complete without any scheduling.
    let result = coroutine(async {
        let a: u32 = Future::ready(40).await?;
        let b: u32 = Future::ready(2).await?;
        Ok(a + b)
    });
    assert_eq!(result.get().unwrap(), 42);
}

#[test]
fn nullary_and_tuple_futures_consume_uniformly() {
    let shard = Shard::new();
    let mut signal = Promise::<()>::new();
    let gate = signal.get_future();

    let result = coroutine(async move {
        gate.await?;
        let pair: (u8, u16) = Future::ready((7, 700)).await?;
        Ok(u32::from(pair.0) + u32::from(pair.1))
    });

    schedule(make_task(move || signal.set_value(())));
    shard.run_until_idle();
    assert_eq!(result.get().unwrap(), 707);
}

#[test]
fn tasks_carry_their_construction_group_through_resumption() {
    let shard = Shard::new();
    let group = SchedulingGroup::new(2);
    let mut promise = Promise::new();
    let inner = promise.get_future();

    let observed = Rc::new(Cell::new(SchedulingGroup::MAIN));
    let seen = observed.clone();
    let _result = with_scheduling_group(group, || {
        coroutine(async move {
            let value: u8 = inner.await?;
            seen.set(monoshard::current_scheduling_group());
            Ok(value)
        })
    });

    schedule(make_task(move || promise.set_value(1u8)));
    shard.run_until_idle();
    assert_eq!(observed.get(), group);
}

#[test]
fn many_pending_futures_resolve_in_completion_order() {
    let shard = Shard::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let mut resolvers = Vec::new();
    for _ in 0..10 {
        let mut promise = Promise::new();
        let future = promise.get_future();
        resolvers.push(promise);
        let log = order.clone();
        let _ = coroutine(async move {
            let value: u32 = future.await?;
            log.borrow_mut().push(value);
            Ok(())
        });
    }

    // Resolve in reverse creation order; completion order must follow
    // resolution order, not creation order.
    for (i, promise) in resolvers.into_iter().enumerate().rev() {
        schedule(make_task(move || promise.set_value(i as u32)));
    }
    shard.run_until_idle();
    assert_eq!(*order.borrow(), (0..10).rev().collect::<Vec<u32>>());
}
