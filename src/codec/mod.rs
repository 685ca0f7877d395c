//! Frame codecs for the RPC transport.
//!
//! One codec lives here: the fragmented streaming LZ4 compressor used on
//! RPC frames. It consumes and produces the scatter-gather
//! [`FragmentedBuf`](crate::bytes::FragmentedBuf) shape so compression
//! never forces a coalescing copy on either side of the wire.

pub mod lz4_fragmented;

pub use lz4_fragmented::{FrameError, Lz4FragmentedCompressor};
