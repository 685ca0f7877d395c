//! Coroutine bridge: async bodies as shard tasks.
//!
//! The compiler-generated state machine behind an `async` block is the
//! coroutine frame; [`coroutine`] pairs one with an embedded
//! [`Promise`](super::Promise) and drives it through the shard scheduler.
//! The frame object doubles as the task the scheduler sees: resuming it
//! is `run_and_dispose`, dropping it unresumed is `dispose` (which drops
//! the embedded promise and surfaces a broken promise to the caller).
//!
//! Protocol mapping:
//! - the frame is resumed eagerly at creation and dropped the moment the
//!   body completes (no implicit suspension on entry or exit; suspension
//!   points are exactly the `.await`s of pending futures);
//! - body completion with `Ok` / `Err` resolves the embedded promise;
//! - a body panic is caught at the resume boundary and resolves the
//!   promise with [`Error::TaskPanicked`]; resume never unwinds into the
//!   scheduler.

use crate::error::{Error, Result};
use crate::future::waker;
use crate::future::{Future, Promise};
use crate::runtime::scheduling::{current_scheduling_group, SchedulingGroup};
use crate::runtime::task::{Task, TaskBox};
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// A suspended computation that the scheduler can resume.
///
/// Implemented by the coroutine frame; type-erased so continuation slots
/// and the waker vtable can hold any frame.
pub(crate) trait Resumable {
    /// Runs the frame until it suspends or completes. A resume after
    /// completion is a no-op.
    fn resume(self: Rc<Self>);

    /// The scheduling group frozen into the frame at creation.
    fn group(&self) -> SchedulingGroup;
}

/// Task flavour that resumes a coroutine frame.
///
/// Dropping it without running releases the frame; if this was the last
/// handle, the embedded promise drops with it and the coroutine's future
/// resolves as a broken promise.
pub(crate) struct ResumeTask {
    frame: Rc<dyn Resumable>,
}

impl Task for ResumeTask {
    fn run_and_dispose(self: Box<Self>) {
        self.frame.resume();
    }

    fn group(&self) -> SchedulingGroup {
        self.frame.group()
    }
}

/// Wraps a frame handle as a schedulable task.
pub(crate) fn resume_task(frame: Rc<dyn Resumable>) -> TaskBox {
    Box::new(ResumeTask { frame })
}

thread_local! {
    /// Stack of frames currently being resumed on this thread. The top
    /// entry is the coroutine whose body is executing; the awaiter reads
    /// it to park the right frame. A stack, not a slot: an eagerly
    /// started coroutine can run inside another's resume.
    static CURRENT_FRAME: RefCell<Vec<Rc<dyn Resumable>>> = const { RefCell::new(Vec::new()) };
}

/// The coroutine frame currently executing on this thread, if any.
pub(crate) fn current_frame() -> Option<Rc<dyn Resumable>> {
    CURRENT_FRAME.with(|stack| stack.borrow().last().cloned())
}

struct FrameGuard;

impl FrameGuard {
    fn enter(frame: Rc<dyn Resumable>) -> Self {
        CURRENT_FRAME.with(|stack| stack.borrow_mut().push(frame));
        Self
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        CURRENT_FRAME.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

struct FrameInner<T, F> {
    body: Pin<Box<F>>,
    promise: Promise<T>,
}

/// The coroutine frame: the body's state machine plus the promise its
/// completion resolves. `inner` is emptied exactly once, on completion.
struct CoroutineFrame<T, F> {
    group: SchedulingGroup,
    inner: RefCell<Option<FrameInner<T, F>>>,
    /// The body is currently being polled on this thread.
    polling: Cell<bool>,
    /// A wake arrived inline while the body was mid-poll; poll again
    /// before parking instead of losing the wake.
    repoll: Cell<bool>,
}

impl<T, F> Resumable for CoroutineFrame<T, F>
where
    F: std::future::Future<Output = Result<T>> + 'static,
    T: 'static,
{
    fn resume(self: Rc<Self>) {
        let Some(mut inner) = self.inner.borrow_mut().take() else {
            if self.polling.get() {
                self.repoll.set(true);
            }
            return;
        };
        self.polling.set(true);
        let waker = waker::frame_waker(self.clone());
        let mut cx = Context::from_waker(&waker);
        let outcome = loop {
            let guard = FrameGuard::enter(self.clone());
            let poll = catch_unwind(AssertUnwindSafe(|| inner.body.as_mut().poll(&mut cx)));
            drop(guard);
            match poll {
                Ok(Poll::Pending) if self.repoll.replace(false) => {}
                other => break other,
            }
        };
        self.polling.set(false);
        match outcome {
            Ok(Poll::Pending) => {
                // Suspended: the awaited future's continuation slot now
                // holds a handle to this frame. Park the body again.
                *self.inner.borrow_mut() = Some(inner);
            }
            Ok(Poll::Ready(Ok(value))) => inner.promise.set_value(value),
            Ok(Poll::Ready(Err(error))) => inner.promise.set_error(error),
            Err(payload) => inner.promise.set_error(Error::from_panic(payload)),
        }
        // Completion paths drop `inner` here, destroying the frame body
        // immediately after its promise resolves.
    }

    fn group(&self) -> SchedulingGroup {
        self.group
    }
}

/// Runs `body` as a coroutine and returns the future of its outcome.
///
/// The body executes eagerly on the calling thread until it completes or
/// first suspends on a pending future; from then on the shard scheduler
/// resumes it as its awaited futures resolve. The returned future
/// resolves with the body's `Ok`/`Err` outcome, with
/// [`Error::TaskPanicked`] if the body panics, or with
/// [`Error::BrokenPromise`] if the suspended frame is disposed before it
/// can finish.
///
/// The frame freezes the ambient scheduling group at creation.
pub fn coroutine<T, F>(body: F) -> Future<T>
where
    F: std::future::Future<Output = Result<T>> + 'static,
    T: 'static,
{
    let mut promise = Promise::new();
    let future = promise.get_future();
    let frame = Rc::new(CoroutineFrame {
        group: current_scheduling_group(),
        inner: RefCell::new(Some(FrameInner {
            body: Box::pin(body),
            promise,
        })),
        polling: Cell::new(false),
        repoll: Cell::new(false),
    });
    frame.resume();
    future
}
