//! Future / promise pair with a continuation hook.
//!
//! [`Promise`] and [`Future`] form a one-shot, single-producer,
//! single-consumer channel carrying a value or an [`Error`]. A future may
//! hold one continuation task, scheduled (urgent class) the moment the
//! promise resolves. Both ends are shard-local: the pair is `!Send` by
//! construction and no state crosses threads.
//!
//! `Future<T>` also implements [`std::future::Future`], which is the
//! awaiter: `.await` inside a coroutine consumes the value without
//! suspension when the future is available, and otherwise parks the
//! coroutine frame in the continuation slot until the promise resolves.
//!
//! The C++-style arity split (`get` vs `get0`, nullary futures) collapses
//! into the type parameter: `Future<()>`, `Future<u64>`, and
//! `Future<(A, B)>` all consume through [`Future::get`].

pub mod coroutine;
pub(crate) mod waker;

use crate::error::{Error, Result};
use crate::runtime::scheduling::{current_scheduling_group, SchedulingGroup};
use crate::runtime::shard;
use crate::runtime::task::{Task, TaskBox};
use std::cell::RefCell;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

pub use coroutine::coroutine;

enum State<T> {
    /// Not yet resolved; may hold the continuation to schedule on
    /// resolution.
    Pending { continuation: Option<TaskBox> },
    /// Resolved with a value or an error, not yet consumed.
    Ready(Result<T>),
    /// Destructively consumed.
    Consumed,
}

struct Shared<T> {
    state: RefCell<State<T>>,
}

impl<T> Shared<T> {
    fn pending() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(State::Pending { continuation: None }),
        })
    }

    fn ready(result: Result<T>) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(State::Ready(result)),
        })
    }

    /// Transitions pending → ready and hands back the continuation, if any.
    ///
    /// # Panics
    ///
    /// Panics on a second resolution; the pair is one-shot.
    fn resolve(&self, result: Result<T>) -> Option<TaskBox> {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            State::Pending { continuation } => {
                let continuation = continuation.take();
                *state = State::Ready(result);
                continuation
            }
            State::Ready(_) | State::Consumed => panic!("promise resolved twice"),
        }
    }
}

/// The producer end of a one-shot future.
///
/// Exactly one of [`set_value`](Self::set_value) /
/// [`set_error`](Self::set_error) resolves the pair; both consume the
/// promise. Dropping an unresolved promise resolves the paired future
/// with [`Error::BrokenPromise`].
pub struct Promise<T> {
    shared: Rc<Shared<T>>,
    future_taken: bool,
    resolved: bool,
}

impl<T> Promise<T> {
    /// Creates an unresolved promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Shared::pending(),
            future_taken: false,
            resolved: false,
        }
    }

    /// Yields the paired future.
    ///
    /// # Panics
    ///
    /// Panics on a second call; the pair is single-consumer.
    pub fn get_future(&mut self) -> Future<T> {
        assert!(!self.future_taken, "future already taken from this promise");
        self.future_taken = true;
        Future {
            shared: self.shared.clone(),
        }
    }

    /// Resolves the pair with a value and schedules the continuation, if
    /// one is attached, on the urgent class.
    pub fn set_value(mut self, value: T) {
        self.resolve(Ok(value));
    }

    /// Resolves the pair with an error and schedules the continuation, if
    /// one is attached, on the urgent class.
    pub fn set_error(mut self, error: Error) {
        self.resolve(Err(error));
    }

    fn resolve(&mut self, result: Result<T>) {
        self.resolved = true;
        if let Some(task) = self.shared.resolve(result) {
            // Resolution is ordered before the continuation runs: with a
            // shard the task goes through the urgent queue, without one it
            // runs inline here.
            if let Err(task) = shard::try_schedule_urgent(task) {
                task.run_and_dispose();
            }
        }
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::debug!("promise dropped unresolved");
            self.resolve(Err(Error::BrokenPromise));
        }
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

/// The consumer end of a one-shot future.
///
/// Exclusively owned; consuming the value through [`get`](Self::get)
/// takes the future by value, so a consumed future cannot be observed.
/// Awaiting the future (the [`std::future::Future`] impl) is the other
/// consumption path.
pub struct Future<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Future<T> {
    /// A future that is already resolved with `value`.
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self {
            shared: Shared::ready(Ok(value)),
        }
    }

    /// A future that is already resolved with `error`.
    #[must_use]
    pub fn failed(error: Error) -> Self {
        Self {
            shared: Shared::ready(Err(error)),
        }
    }

    /// True once the pair is resolved (value or error) and unconsumed.
    #[must_use]
    pub fn available(&self) -> bool {
        matches!(&*self.shared.state.borrow(), State::Ready(_))
    }

    /// Destructively consumes the resolved outcome.
    ///
    /// # Panics
    ///
    /// Panics if the future is not [`available`](Self::available);
    /// consumers must gate on availability or use `.await`.
    pub fn get(self) -> Result<T> {
        self.take_ready()
            .expect("future consumed before it became available")
    }

    /// Installs the continuation to schedule when the pair resolves.
    ///
    /// # Panics
    ///
    /// Panics if the future is already resolved or a continuation is
    /// already installed; the slot is written at most once.
    pub fn set_continuation(&mut self, task: TaskBox) {
        match &mut *self.shared.state.borrow_mut() {
            State::Pending { continuation } => {
                assert!(continuation.is_none(), "continuation already installed");
                *continuation = Some(task);
            }
            State::Ready(_) | State::Consumed => {
                panic!("continuation installed on a resolved future")
            }
        }
    }

    fn take_ready(&self) -> Option<Result<T>> {
        let mut state = self.shared.state.borrow_mut();
        if matches!(&*state, State::Ready(_)) {
            let State::Ready(result) = std::mem::replace(&mut *state, State::Consumed) else {
                unreachable!()
            };
            return Some(result);
        }
        None
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}

/// Continuation flavour installed when a future is awaited outside a
/// shard coroutine: running it wakes the captured waker, handing control
/// back to whichever executor polled us.
struct WakerTask {
    waker: Waker,
    group: SchedulingGroup,
}

impl Task for WakerTask {
    fn run_and_dispose(self: Box<Self>) {
        self.waker.wake();
    }

    fn group(&self) -> SchedulingGroup {
        self.group
    }
}

/// The awaiter. One `.await` of a `Future<T>` is one awaiter lifetime:
/// ready futures are consumed without suspension; pending ones park the
/// current coroutine frame (or, off-shard, the polling executor's waker)
/// in the continuation slot.
impl<T> std::future::Future for Future<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(result) = this.take_ready() {
            return Poll::Ready(result);
        }
        let mut state = this.shared.state.borrow_mut();
        match &mut *state {
            State::Pending { continuation } => {
                let task: TaskBox = match coroutine::current_frame() {
                    Some(frame) => coroutine::resume_task(frame),
                    None => Box::new(WakerTask {
                        waker: cx.waker().clone(),
                        group: current_scheduling_group(),
                    }),
                };
                // A re-poll while pending replaces the parked continuation;
                // the slot still fires at most once.
                *continuation = Some(task);
                Poll::Pending
            }
            State::Ready(_) => unreachable!("ready state handled above"),
            State::Consumed => panic!("future polled after consumption"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::shard::{schedule, Shard};
    use crate::runtime::task::make_task;
    use std::cell::Cell;

    #[test]
    fn value_set_then_consumed() {
        let mut promise = Promise::new();
        let future = promise.get_future();
        assert!(!future.available());
        promise.set_value(42u32);
        assert!(future.available());
        assert_eq!(future.get().unwrap(), 42);
    }

    #[test]
    fn error_set_then_consumed() {
        let mut promise = Promise::<()>::new();
        let future = promise.get_future();
        promise.set_error(Error::OutOfMemory);
        assert!(matches!(future.get(), Err(Error::OutOfMemory)));
    }

    #[test]
    fn tuple_and_unit_arities() {
        let ready: Future<()> = Future::ready(());
        assert!(ready.get().is_ok());

        let pair: Future<(u8, &str)> = Future::ready((1, "x"));
        assert_eq!(pair.get().unwrap(), (1, "x"));
    }

    #[test]
    fn broken_promise_on_drop() {
        let mut promise = Promise::<u32>::new();
        let future = promise.get_future();
        drop(promise);
        assert!(future.available());
        assert!(matches!(future.get(), Err(Error::BrokenPromise)));
    }

    #[test]
    #[should_panic(expected = "future already taken")]
    fn second_get_future_panics() {
        let mut promise = Promise::<()>::new();
        let _first = promise.get_future();
        let _second = promise.get_future();
    }

    #[test]
    #[should_panic(expected = "consumed before it became available")]
    fn get_before_ready_panics() {
        let mut promise = Promise::<()>::new();
        let future = promise.get_future();
        let _ = future.get();
        drop(promise);
    }

    #[test]
    #[should_panic(expected = "resolved future")]
    fn continuation_on_ready_future_panics() {
        let mut future = Future::ready(1u8);
        future.set_continuation(make_task(|| {}));
    }

    #[test]
    fn continuation_scheduled_urgent_on_set() {
        let shard = Shard::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut promise = Promise::new();
        let mut future = promise.get_future();
        let log = order.clone();
        future.set_continuation(make_task(move || log.borrow_mut().push("continuation")));

        let log = order.clone();
        schedule(make_task(move || log.borrow_mut().push("normal")));

        // Resolving parks the continuation on the urgent class, ahead of
        // the already-queued normal task.
        promise.set_value(7u32);
        assert_eq!(shard.pending(), 2);
        shard.run_until_idle();
        assert_eq!(*order.borrow(), vec!["continuation", "normal"]);
        assert_eq!(future.get().unwrap(), 7);
    }

    #[test]
    fn continuation_runs_inline_without_shard() {
        let fired = Rc::new(Cell::new(false));
        let mut promise = Promise::new();
        let mut future = promise.get_future();
        let seen = fired.clone();
        future.set_continuation(make_task(move || seen.set(true)));
        promise.set_value(1u8);
        assert!(fired.get());
    }

    #[test]
    fn continuation_fires_exactly_once_across_paths() {
        // Broken-promise path.
        let fired = Rc::new(Cell::new(0u32));
        let mut promise = Promise::<u8>::new();
        let mut future = promise.get_future();
        let seen = fired.clone();
        future.set_continuation(make_task(move || seen.set(seen.get() + 1)));
        drop(promise);
        assert_eq!(fired.get(), 1);
        drop(future);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn awaiter_consumes_ready_future_without_suspension() {
        let future = Future::ready(5u64);
        let value = futures_lite::future::block_on(future);
        assert_eq!(value.unwrap(), 5);
    }

    #[test]
    fn awaiter_parks_foreign_waker() {
        // The consumer polls first and parks a waker-task continuation;
        // resolution then hands control back to block_on through it.
        let mut promise = Promise::new();
        let future = promise.get_future();
        let (value, ()) = futures_lite::future::block_on(futures_lite::future::zip(
            future,
            async move {
                futures_lite::future::yield_now().await;
                promise.set_value(9u8);
            },
        ));
        assert_eq!(value.unwrap(), 9);
    }
}
