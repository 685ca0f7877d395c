//! Fragmented streaming LZ4 compressor.
//!
//! Compressed frame format: one or more data chunks, each preceded by a
//! 4-byte little-endian header whose value determines the chunk kind:
//!
//! - high bit clear: intermediate chunk; the 31 low bits carry the
//!   compressed size of the chunk as it appears on the wire, and the
//!   decompressed size is exactly [`CHUNK_SIZE`];
//! - high bit set: last chunk; the 31 low bits carry the decompressed
//!   size, and the compressed payload is whatever remains of the frame.
//!
//! Every frame ends with exactly one last chunk. Compression streams:
//! within a frame each chunk is compressed against the previous chunk's
//! plaintext as its dictionary, and both endpoints start every frame
//! from an empty dictionary — that empty start is the per-frame stream
//! reset, so one sender instance pairs 1:1 with one receiver instance.
//!
//! Input follows the scatter-gather convention of
//! [`FragmentedBuf`]: every segment except the last is exactly one
//! chunk long. Output is a single contiguous buffer (small-message fast
//! path) or chunk-sized segments with the first one enlarged to hold the
//! caller's reserved head space.

use crate::bytes::{FragmentedBuf, CHUNK_SIZE};
use lz4_flex::block::{
    compress_into, compress_into_with_dict, decompress_into, decompress_into_with_dict,
    get_maximum_output_size, DecompressError,
};
use std::cell::RefCell;
use thiserror::Error;

const LAST_CHUNK_FLAG: u32 = 1 << 31;
const CHUNK_HEADER_SIZE: usize = 4;

const _: () = assert!(CHUNK_SIZE < LAST_CHUNK_FLAG as usize);

/// Frame-level codec failure.
///
/// Any of these invalidates the per-peer stream for the frame in flight;
/// the caller drops the frame and resets before handling another one.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame ended before a header or a chunk payload was complete.
    #[error("truncated compressed frame")]
    Truncated,
    /// A chunk payload did not decompress.
    #[error("chunk decompression failed: {0}")]
    Decompress(#[from] DecompressError),
    /// A chunk decompressed to the wrong length.
    #[error("chunk decompressed to {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        /// Length the frame header promised.
        expected: usize,
        /// Length the chunk actually produced.
        actual: usize,
    },
    /// A last-chunk header declared more decompressed bytes than fit in
    /// one chunk.
    #[error("last chunk declares {0} decompressed bytes, above the chunk limit")]
    Oversized(usize),
}

/// Streaming LZ4 compressor/decompressor with chunk framing.
///
/// Holds the scratch buffers the two directions reuse across frames: a
/// fixed compression scratch sized to the worst-case chunk bound, and a
/// decompression scratch grown on demand when a peer sends larger
/// compressed chunks than ours would produce.
pub struct Lz4FragmentedCompressor {
    compress_scratch: RefCell<Vec<u8>>,
    decompress_scratch: RefCell<Vec<u8>>,
}

impl Lz4FragmentedCompressor {
    /// Codec name, as negotiated between RPC peers.
    pub const NAME: &'static str = "LZ4_FRAGMENTED";

    /// Creates a compressor with scratch sized for one chunk.
    #[must_use]
    pub fn new() -> Self {
        let bound = get_maximum_output_size(CHUNK_SIZE);
        Self {
            compress_scratch: RefCell::new(vec![0; bound]),
            // Do not assume the remote shares our compression bound;
            // this one grows to whatever chunk sizes actually arrive.
            decompress_scratch: RefCell::new(vec![0; bound]),
        }
    }

    /// Compresses `data` into a framed message, reserving `head_space`
    /// bytes at the start of the first output segment for the caller's
    /// own framing. The reserved bytes are returned as allocated, never
    /// written by the codec.
    #[must_use]
    pub fn compress(&self, head_space: usize, data: &FragmentedBuf) -> FragmentedBuf {
        let size = data.len();

        let single_chunk_size = get_maximum_output_size(size) + head_space + CHUNK_HEADER_SIZE;
        if single_chunk_size <= CHUNK_SIZE && size <= CHUNK_SIZE {
            // Faster path for small messages: one output buffer, one
            // last chunk.
            let src = data.segments().next().unwrap_or(&[]);
            debug_assert_eq!(src.len(), size);
            let mut dst = vec![0u8; single_chunk_size];
            dst[head_space..head_space + CHUNK_HEADER_SIZE]
                .copy_from_slice(&(LAST_CHUNK_FLAG | size as u32).to_le_bytes());
            let compressed = compress_into(src, &mut dst[head_space + CHUNK_HEADER_SIZE..])
                .expect("scratch sized to the compression bound");
            dst.truncate(head_space + CHUNK_HEADER_SIZE + compressed);
            return FragmentedBuf::single(dst);
        }

        let mut scratch = self.compress_scratch.borrow_mut();
        let mut writer = SegmentWriter::new(head_space);
        let mut dict: Option<&[u8]> = None;
        let mut segments = data.segments();
        let mut remaining = size;

        // Intermediate chunks.
        while remaining > CHUNK_SIZE {
            let src = segments.next().expect("segments cover the input length");
            assert_eq!(
                src.len(),
                CHUNK_SIZE,
                "intermediate input segments must be chunk-sized"
            );
            let compressed = compress_chunk(src, &mut scratch, dict);
            writer.write(&(compressed as u32).to_le_bytes());
            writer.write(&scratch[..compressed]);
            dict = Some(src);
            remaining -= CHUNK_SIZE;
        }

        // Last chunk.
        let src = segments.next().expect("segments cover the input length");
        debug_assert_eq!(src.len(), remaining);
        let compressed = compress_chunk(src, &mut scratch, dict);
        writer.write(&(LAST_CHUNK_FLAG | remaining as u32).to_le_bytes());
        writer.write(&scratch[..compressed]);

        let out = writer.finish();
        tracing::trace!(
            decompressed = size,
            compressed = out.len() - head_space,
            "compressed rpc frame"
        );
        out
    }

    /// Decompresses a framed message back into its scatter-gather shape.
    ///
    /// On any error the frame is unusable and the per-peer stream must be
    /// reset before handling another frame.
    pub fn decompress(&self, data: &FragmentedBuf) -> Result<FragmentedBuf, FrameError> {
        if data.len() < CHUNK_HEADER_SIZE {
            return Err(FrameError::Truncated);
        }

        if let Some(src) = data.as_contiguous() {
            let header = u32::from_le_bytes(
                src[..CHUNK_HEADER_SIZE]
                    .try_into()
                    .expect("slice of header length"),
            );
            if header & LAST_CHUNK_FLAG != 0 {
                // Faster path for small messages: a single last chunk in
                // a single buffer decompresses straight into the output.
                let size = (header & !LAST_CHUNK_FLAG) as usize;
                if size > CHUNK_SIZE {
                    return Err(FrameError::Oversized(size));
                }
                let mut dst = vec![0u8; size];
                decompress_chunk(&src[CHUNK_HEADER_SIZE..], &mut dst, None)?;
                return Ok(FragmentedBuf::single(dst));
            }
            // Multiple chunks in a single buffer: no fast path.
        }

        let mut cursor = SegmentCursor::new(data);
        let mut scratch = self.decompress_scratch.borrow_mut();
        let mut out_segments: Vec<Vec<u8>> = Vec::new();

        // Intermediate chunks.
        let mut header = cursor.read_header()?;
        while header & LAST_CHUNK_FLAG == 0 {
            let compressed_size = header as usize;
            if compressed_size > cursor.remaining() {
                return Err(FrameError::Truncated);
            }
            if scratch.len() < compressed_size {
                scratch.resize(compressed_size, 0);
            }
            cursor.copy_into(&mut scratch[..compressed_size])?;
            let mut dst = vec![0u8; CHUNK_SIZE];
            decompress_chunk(
                &scratch[..compressed_size],
                &mut dst,
                out_segments.last().map(Vec::as_slice),
            )?;
            out_segments.push(dst);
            header = cursor.read_header()?;
        }

        // Last chunk: the compressed size is implicit in what remains.
        let size = (header & !LAST_CHUNK_FLAG) as usize;
        if size > CHUNK_SIZE {
            return Err(FrameError::Oversized(size));
        }
        let compressed_size = cursor.remaining();
        if scratch.len() < compressed_size {
            scratch.resize(compressed_size, 0);
        }
        cursor.copy_into(&mut scratch[..compressed_size])?;
        let mut dst = vec![0u8; size];
        decompress_chunk(
            &scratch[..compressed_size],
            &mut dst,
            out_segments.last().map(Vec::as_slice),
        )?;
        out_segments.push(dst);

        let total: usize = out_segments.iter().map(Vec::len).sum();
        tracing::trace!(decompressed = total, "decompressed rpc frame");
        Ok(FragmentedBuf::from_segments(out_segments))
    }
}

impl Default for Lz4FragmentedCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Lz4FragmentedCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lz4FragmentedCompressor")
            .field("name", &Self::NAME)
            .finish_non_exhaustive()
    }
}

/// Compresses one chunk against the previous chunk's plaintext.
fn compress_chunk(src: &[u8], scratch: &mut [u8], dict: Option<&[u8]>) -> usize {
    let result = match dict {
        Some(dict) => compress_into_with_dict(src, scratch, dict),
        None => compress_into(src, scratch),
    };
    result.expect("scratch sized to the compression bound")
}

/// Decompresses one chunk, checking it fills `dst` exactly.
fn decompress_chunk(src: &[u8], dst: &mut [u8], dict: Option<&[u8]>) -> Result<(), FrameError> {
    if dst.is_empty() {
        // An empty last chunk carries no payload worth decoding.
        return Ok(());
    }
    let written = match dict {
        Some(dict) => decompress_into_with_dict(src, dst, dict)?,
        None => decompress_into(src, dst)?,
    };
    if written != dst.len() {
        return Err(FrameError::ChunkSizeMismatch {
            expected: dst.len(),
            actual: written,
        });
    }
    Ok(())
}

/// Accumulates codec output across chunk-sized segments, starting with a
/// first segment large enough for the caller's head space.
struct SegmentWriter {
    segments: Vec<Vec<u8>>,
    offset: usize,
}

impl SegmentWriter {
    fn new(head_space: usize) -> Self {
        Self {
            segments: vec![vec![0; head_space.max(CHUNK_SIZE)]],
            offset: head_space,
        }
    }

    fn write(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let segment = self.segments.last_mut().expect("writer keeps one segment");
            if self.offset == segment.len() {
                self.segments.push(vec![0; CHUNK_SIZE]);
                self.offset = 0;
                continue;
            }
            let take = bytes.len().min(segment.len() - self.offset);
            segment[self.offset..self.offset + take].copy_from_slice(&bytes[..take]);
            self.offset += take;
            bytes = &bytes[take..];
        }
    }

    fn finish(mut self) -> FragmentedBuf {
        let last = self.segments.last_mut().expect("writer keeps one segment");
        last.truncate(self.offset);
        FragmentedBuf::from_segments(self.segments)
    }
}

/// A read cursor over the segments of a frame.
struct SegmentCursor<'a> {
    segments: Vec<&'a [u8]>,
    index: usize,
    offset: usize,
    remaining: usize,
}

impl<'a> SegmentCursor<'a> {
    fn new(buf: &'a FragmentedBuf) -> Self {
        Self {
            segments: buf.segments().collect(),
            index: 0,
            offset: 0,
            remaining: buf.len(),
        }
    }

    fn remaining(&self) -> usize {
        self.remaining
    }

    fn read_header(&mut self) -> Result<u32, FrameError> {
        let mut header = [0u8; CHUNK_HEADER_SIZE];
        self.copy_into(&mut header)?;
        Ok(u32::from_le_bytes(header))
    }

    fn copy_into(&mut self, mut dst: &mut [u8]) -> Result<(), FrameError> {
        if dst.len() > self.remaining {
            return Err(FrameError::Truncated);
        }
        self.remaining -= dst.len();
        while !dst.is_empty() {
            let segment = self.segments[self.index];
            if self.offset == segment.len() {
                self.index += 1;
                self.offset = 0;
                continue;
            }
            let take = dst.len().min(segment.len() - self.offset);
            dst[..take].copy_from_slice(&segment[self.offset..self.offset + take]);
            self.offset += take;
            dst = &mut dst[take..];
        }
        Ok(())
    }
}
