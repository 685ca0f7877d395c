//! Shard task queue and pump.
//!
//! A shard is a single OS thread running a cooperative scheduler. This
//! module provides the task queue with its two injection endpoints
//! ([`schedule`] at the tail, [`schedule_urgent`] at the head class) and
//! the minimal pump that drains it. The surrounding event-loop reactor is
//! a collaborator, not part of the core: callers that own a reactor embed
//! the pump in their poll cycle, tests drive it directly.
//!
//! Ordering guarantees: FIFO within each priority class, urgent tasks
//! before normal ones. Nothing else is promised.

use crate::runtime::scheduling::with_scheduling_group;
use crate::runtime::task::TaskBox;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
struct Queues {
    urgent: VecDeque<TaskBox>,
    normal: VecDeque<TaskBox>,
}

pub(crate) struct ShardInner {
    queues: RefCell<Queues>,
}

impl ShardInner {
    pub(crate) fn push_normal(&self, task: TaskBox) {
        self.queues.borrow_mut().normal.push_back(task);
    }

    pub(crate) fn push_urgent(&self, task: TaskBox) {
        self.queues.borrow_mut().urgent.push_back(task);
    }

    fn pop(&self) -> Option<TaskBox> {
        let mut queues = self.queues.borrow_mut();
        queues.urgent.pop_front().or_else(|| queues.normal.pop_front())
    }

    fn pending(&self) -> usize {
        let queues = self.queues.borrow();
        queues.urgent.len() + queues.normal.len()
    }
}

thread_local! {
    static CURRENT_SHARD: RefCell<Option<Rc<ShardInner>>> = const { RefCell::new(None) };
}

/// The per-thread task scheduler.
///
/// Constructing a `Shard` registers it as the thread's ambient scheduler;
/// [`schedule`], [`schedule_urgent`] and promise completion reach it
/// through that registration. At most one shard exists per thread.
/// Dropping the shard disposes every task still queued.
pub struct Shard {
    inner: Rc<ShardInner>,
}

impl Shard {
    /// Creates the shard for this thread and registers it.
    ///
    /// # Panics
    ///
    /// Panics if the thread already has a shard.
    #[must_use]
    pub fn new() -> Self {
        let inner = Rc::new(ShardInner {
            queues: RefCell::new(Queues::default()),
        });
        CURRENT_SHARD.with(|current| {
            let mut current = current.borrow_mut();
            assert!(current.is_none(), "thread already has a shard");
            *current = Some(inner.clone());
        });
        Self { inner }
    }

    /// Runs one scheduler turn: pops and runs the next task, urgent class
    /// first. The task executes with its frozen scheduling group as the
    /// ambient current group. Returns false when both queues are empty.
    pub fn run_one(&self) -> bool {
        match self.inner.pop() {
            Some(task) => {
                let group = task.group();
                with_scheduling_group(group, || task.run_and_dispose());
                true
            }
            None => false,
        }
    }

    /// Pumps the queues until both are empty. Returns the number of tasks
    /// run, including tasks scheduled while draining.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        tracing::trace!(tasks = ran, "shard drained to idle");
        ran
    }

    /// Number of tasks currently queued across both classes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending()
    }
}

impl Default for Shard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Shard {
    fn drop(&mut self) {
        CURRENT_SHARD.with(|current| current.borrow_mut().take());
        let Queues { urgent, normal } = self.inner.queues.take();
        let leftover = urgent.len() + normal.len();
        if leftover > 0 {
            tracing::debug!(tasks = leftover, "disposing tasks queued at shard teardown");
        }
        for task in urgent.into_iter().chain(normal) {
            task.dispose();
        }
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Hands `task` to the shard scheduler at the tail of the normal class.
///
/// Infallible from the caller's standpoint; the task now belongs to the
/// scheduler.
///
/// # Panics
///
/// Panics if the thread has no shard.
pub fn schedule(task: TaskBox) {
    with_current(|shard| shard.push_normal(task)).expect("no shard on this thread");
}

/// Hands `task` to the shard scheduler at the tail of the urgent class,
/// ahead of every normal task.
///
/// # Panics
///
/// Panics if the thread has no shard.
pub fn schedule_urgent(task: TaskBox) {
    with_current(|shard| shard.push_urgent(task)).expect("no shard on this thread");
}

/// Urgent-schedules `task` when a shard is registered; otherwise hands the
/// task back. Promise completion uses this to fall back to inline
/// continuation runs outside a shard.
pub(crate) fn try_schedule_urgent(task: TaskBox) -> Result<(), TaskBox> {
    let mut task = Some(task);
    let scheduled = with_current(|shard| {
        shard.push_urgent(task.take().expect("task consumed twice"));
    });
    match scheduled {
        Some(()) => Ok(()),
        None => Err(task.take().expect("task neither scheduled nor returned")),
    }
}

fn with_current<R>(f: impl FnOnce(&ShardInner) -> R) -> Option<R> {
    CURRENT_SHARD.with(|current| current.borrow().as_deref().map(f))
}
