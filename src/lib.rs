//! Monoshard: the systems core of a shard-per-core asynchronous runtime.
//!
//! # Overview
//!
//! A shard is one OS thread running a cooperative scheduler and owning
//! all of its state; nothing here is shared across threads. This crate
//! is the shard's hard machinery, three tightly coupled subsystems:
//!
//! - **Task / future / coroutine layer** — deferred computations as
//!   [`Task`](runtime::Task)s, chained through
//!   [`Promise`](future::Promise)/[`Future`](future::Future) pairs and
//!   `async` bodies bridged by [`coroutine`](future::coroutine), so that
//!   suspension hands control back to the scheduler without heap thrash.
//! - **Temporary memory allocator** — a per-thread monotonic bump
//!   allocator ([`mem::TemporaryMemoryAllocator`]) that turns
//!   short-lived allocations into pointer increments and amortises
//!   deallocation to the block header.
//! - **Fragmented LZ4 codec** — a chunk-framed streaming compressor
//!   ([`codec::Lz4FragmentedCompressor`]) for RPC frames that preserves
//!   scatter-gather layout on both input and output.
//!
//! # Core guarantees
//!
//! - **One-shot futures**: exactly one producer resolves a future and
//!   exactly one consumer takes the outcome; continuations fire exactly
//!   once.
//! - **Serialised shards**: tasks on a shard interleave only at
//!   explicit suspension points; the queue is FIFO per priority class.
//! - **Captured failures**: errors and panics inside coroutine bodies
//!   resolve the coroutine's future instead of unwinding through the
//!   scheduler.
//! - **Exact reclamation**: every allocator block is returned to the
//!   system on its last free, whatever order the frees arrive in.
//!
//! # Module structure
//!
//! - [`runtime`]: scheduling groups, tasks, and the shard task queue
//! - [`future`]: promise/future pairs and the coroutine bridge
//! - [`mem`]: the temporary allocator and its opt-in smart pointer
//! - [`codec`]: the fragmented streaming LZ4 frame codec
//! - [`bytes`]: scatter-gather wire buffers
//! - [`error`](mod@error): the failure value futures carry
//! - [`util`]: deterministic test utilities

// Default to deny for unsafe code - the allocator and the waker vtable
// opt back in with module-level allows where they touch raw memory.
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod bytes;
pub mod codec;
pub mod error;
pub mod future;
pub mod mem;
pub mod runtime;
pub mod util;

// Re-exports for convenient access to core types
pub use bytes::{FragmentedBuf, CHUNK_SIZE};
pub use codec::{FrameError, Lz4FragmentedCompressor};
pub use error::{Error, Result};
pub use future::{coroutine, Future, Promise};
pub use mem::{TempBox, TemporaryMemoryAllocator};
pub use runtime::{
    current_scheduling_group, make_task, make_task_in, schedule, schedule_urgent,
    with_scheduling_group, SchedulingGroup, Shard, Task, TaskBox,
};
