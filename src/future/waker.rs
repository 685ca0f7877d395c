//! Waker plumbing for coroutine frames.
//!
//! Every resume of a coroutine frame polls the body with a waker built
//! here. Inside the shard the waker is rarely exercised (awaiting a
//! shard future parks the frame in the future's continuation slot
//! directly), but a body is free to await foreign futures too; their
//! wake-ups land back on the shard's urgent queue as a resume task.

// The vtable below manages Rc reference counts by hand; `Rc` cannot back
// a `Waker` through safe constructors because `std::task::Wake` demands
// `Send + Sync` and shard frames are single-thread by contract.
#![allow(unsafe_code)]

use crate::future::coroutine::{resume_task, Resumable};
use crate::runtime::shard;
use std::mem;
use std::rc::Rc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Returns the `RawWakerVTable` for a frame of concrete type `R`.
///
/// The vtable defines how an executor interacts with the frame when
/// cloning the waker, waking by value or reference, and dropping it.
///
/// # Safety
///
/// All functions in the vtable uphold the [`RawWaker`] invariants:
/// - the data pointer always originates from `Rc::into_raw`,
/// - reference counts are balanced across clone/wake/drop,
/// - the frame stays valid for the lifetime of every outstanding waker.
///
/// The waker inherits the shard contract: it must not be sent to or
/// woken from another thread.
fn vtable<R: Resumable + 'static>() -> &'static RawWakerVTable {
    &RawWakerVTable::new(
        clone_raw::<R>,
        wake_raw::<R>,
        wake_by_ref_raw::<R>,
        drop_raw::<R>,
    )
}

/// Creates a [`Waker`] that resumes `frame` through the shard scheduler.
///
/// Waking schedules the frame on the urgent class; without a registered
/// shard the frame resumes inline.
pub(crate) fn frame_waker<R: Resumable + 'static>(frame: Rc<R>) -> Waker {
    unsafe { Waker::from_raw(RawWaker::new(Rc::into_raw(frame).cast(), vtable::<R>())) }
}

fn wake_frame<R: Resumable + 'static>(frame: Rc<R>) {
    if let Err(task) = shard::try_schedule_urgent(resume_task(frame)) {
        task.run_and_dispose();
    }
}

fn clone_raw<R: Resumable + 'static>(ptr: *const ()) -> RawWaker {
    let frame = unsafe { Rc::<R>::from_raw(ptr.cast()) };
    let cloned = frame.clone();
    mem::forget(frame);
    RawWaker::new(Rc::into_raw(cloned).cast(), vtable::<R>())
}

fn wake_raw<R: Resumable + 'static>(ptr: *const ()) {
    let frame = unsafe { Rc::<R>::from_raw(ptr.cast()) };
    wake_frame(frame);
}

fn wake_by_ref_raw<R: Resumable + 'static>(ptr: *const ()) {
    let frame = unsafe { Rc::<R>::from_raw(ptr.cast()) };
    wake_frame(frame.clone());
    mem::forget(frame);
}

fn drop_raw<R: Resumable + 'static>(ptr: *const ()) {
    drop(unsafe { Rc::<R>::from_raw(ptr.cast::<R>()) });
}
