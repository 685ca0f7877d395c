//! Scheduling group identities.
//!
//! A scheduling group is an opaque accounting class. Every task snapshots
//! the ambient current group at construction; the scheduler itself treats
//! the group as an inert tag.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// An opaque identity tag for a scheduling accounting class.
///
/// Identities are process-wide per shard; equality is structural.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchedulingGroup(u16);

impl SchedulingGroup {
    /// The default group tasks belong to unless overridden.
    pub const MAIN: Self = Self(0);

    /// Creates a group with the given index.
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the group index.
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl Default for SchedulingGroup {
    fn default() -> Self {
        Self::MAIN
    }
}

impl fmt::Debug for SchedulingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchedulingGroup({})", self.0)
    }
}

impl fmt::Display for SchedulingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sg{}", self.0)
    }
}

thread_local! {
    static CURRENT_GROUP: Cell<SchedulingGroup> = const { Cell::new(SchedulingGroup::MAIN) };
}

/// Returns the ambient current scheduling group.
///
/// Read when a task is constructed and frozen into it.
#[must_use]
pub fn current_scheduling_group() -> SchedulingGroup {
    CURRENT_GROUP.with(Cell::get)
}

/// Runs `f` with `group` as the ambient current scheduling group.
///
/// The previous group is restored when `f` returns, including by panic.
pub fn with_scheduling_group<R>(group: SchedulingGroup, f: impl FnOnce() -> R) -> R {
    struct Restore(SchedulingGroup);
    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT_GROUP.with(|current| current.set(self.0));
        }
    }
    let _restore = Restore(CURRENT_GROUP.with(|current| current.replace(group)));
    f()
}
