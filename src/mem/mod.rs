//! Shard-local memory facilities.
//!
//! [`temporary`] is the monotonic bump allocator for short-lived
//! allocations; [`temp_box`] is the opt-in smart pointer that routes a
//! value's storage through the thread-local allocator instance.

pub mod temp_box;
pub mod temporary;

pub use temp_box::TempBox;
pub use temporary::{
    with_temporary_allocator, AllocatorStats, TemporaryMemoryAllocator, ALIGNMENT, BLOCK_SIZE,
    MAX_OBJECT_SIZE,
};
