//! Shard scheduler core: scheduling groups, tasks, and the task queue.
//!
//! The pieces here are deliberately small. A [`Task`](task::Task) is
//! anything that can be run once and released; a [`Shard`](shard::Shard)
//! owns the two FIFO queues tasks travel through; a
//! [`SchedulingGroup`](scheduling::SchedulingGroup) tags each task with
//! the accounting class it was created under.

pub mod scheduling;
pub mod shard;
pub mod task;

pub use scheduling::{current_scheduling_group, with_scheduling_group, SchedulingGroup};
pub use shard::{schedule, schedule_urgent, Shard};
pub use task::{make_task, make_task_in, ClosureTask, Task, TaskBox};
