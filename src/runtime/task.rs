//! The task abstraction.
//!
//! A task is the polymorphic unit of deferred work a shard schedules:
//! anything that can be run once and then released, or released without
//! running. Two flavours exist: the closure task built by [`make_task`],
//! and the coroutine frame (see [`crate::future::coroutine`]), whose
//! resume and destroy map onto the same two operations.

use crate::runtime::scheduling::{current_scheduling_group, SchedulingGroup};

/// A polymorphic unit of deferred work.
///
/// Ownership: exactly one owner holds the task until it is scheduled;
/// after hand-off the scheduler invokes exactly one of
/// [`run_and_dispose`](Self::run_and_dispose) or
/// [`dispose`](Self::dispose). Dropping a `TaskBox` without running it is
/// equivalent to disposal. Neither operation may unwind into the caller.
pub trait Task {
    /// Executes the unit of work, then releases its storage.
    fn run_and_dispose(self: Box<Self>);

    /// Releases the task's storage without executing it.
    fn dispose(self: Box<Self>) {
        drop(self);
    }

    /// The scheduling group the task was constructed in.
    fn group(&self) -> SchedulingGroup;
}

/// An owned task pointer, as held by queues and continuation slots.
pub type TaskBox = Box<dyn Task>;

/// A task that invokes a closure once.
pub struct ClosureTask<F: FnOnce()> {
    group: SchedulingGroup,
    func: F,
}

impl<F: FnOnce()> ClosureTask<F> {
    /// Creates a closure task in the given scheduling group.
    pub fn new(group: SchedulingGroup, func: F) -> Self {
        Self { group, func }
    }
}

impl<F: FnOnce()> Task for ClosureTask<F> {
    fn run_and_dispose(self: Box<Self>) {
        (self.func)();
    }

    fn group(&self) -> SchedulingGroup {
        self.group
    }
}

/// Builds a task from a nullary closure in the current scheduling group.
pub fn make_task<F>(func: F) -> TaskBox
where
    F: FnOnce() + 'static,
{
    make_task_in(current_scheduling_group(), func)
}

/// Builds a task from a nullary closure in an explicit scheduling group.
pub fn make_task_in<F>(group: SchedulingGroup, func: F) -> TaskBox
where
    F: FnOnce() + 'static,
{
    Box::new(ClosureTask::new(group, func))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::scheduling::with_scheduling_group;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn run_and_dispose_invokes_once() {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let task = make_task(move || seen.set(seen.get() + 1));
        task.run_and_dispose();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dispose_releases_without_running() {
        let ran = Rc::new(Cell::new(false));
        let dropped = Rc::new(Cell::new(false));

        struct DropFlag(Rc<Cell<bool>>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let flag = DropFlag(dropped.clone());
        let ran_seen = ran.clone();
        let task = make_task(move || {
            let _keep = &flag;
            ran_seen.set(true);
        });
        task.dispose();
        assert!(!ran.get());
        assert!(dropped.get());
    }

    #[test]
    fn group_frozen_at_construction() {
        let sg = SchedulingGroup::new(5);
        let task = with_scheduling_group(sg, || make_task(|| {}));
        assert_eq!(task.group(), sg);
    }

    #[test]
    fn explicit_group_overrides_ambient() {
        let sg = SchedulingGroup::new(11);
        let task = make_task_in(sg, || {});
        assert_eq!(task.group(), sg);
    }
}
