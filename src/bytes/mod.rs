//! Wire buffer types shared by the codec and its callers.
//!
//! The RPC layer moves frames around as scatter-gather byte sequences:
//! either one contiguous buffer or an ordered run of chunk-sized segments.
//! [`FragmentedBuf`] is that sequence; [`CHUNK_SIZE`] is the segment
//! convention both the buffering layer and the codec agree on.

pub mod fragmented;

pub use fragmented::{FragmentedBuf, CHUNK_SIZE};
