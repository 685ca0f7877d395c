//! Scatter-gather byte buffer.
//!
//! [`FragmentedBuf`] carries a logical byte sequence as one contiguous
//! buffer or as an ordered vector of segments. Every segment except the
//! last is exactly [`CHUNK_SIZE`] long; producers that cannot guarantee
//! this must coalesce before handing buffers to the codec.

/// Segment size convention for fragmented buffers, in bytes.
pub const CHUNK_SIZE: usize = 128 * 1024;

/// A scatter-gather byte buffer: one contiguous buffer or an ordered
/// sequence of segments.
///
/// The two shapes are observable through [`as_contiguous`](Self::as_contiguous)
/// because the codec has a fast path that depends on which one it gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentedBuf {
    len: usize,
    storage: Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Storage {
    Contiguous(Vec<u8>),
    Segments(Vec<Vec<u8>>),
}

impl FragmentedBuf {
    /// An empty buffer.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            len: 0,
            storage: Storage::Contiguous(Vec::new()),
        }
    }

    /// Wraps a single contiguous buffer.
    #[must_use]
    pub fn single(data: Vec<u8>) -> Self {
        Self {
            len: data.len(),
            storage: Storage::Contiguous(data),
        }
    }

    /// Wraps an ordered sequence of segments.
    ///
    /// Message producers keep every segment except the last exactly
    /// [`CHUNK_SIZE`] long — the convention the codec's compress side
    /// depends on. Codec output relaxes it in one place: the first
    /// segment may be enlarged to hold caller head space.
    #[must_use]
    pub fn from_segments(segments: Vec<Vec<u8>>) -> Self {
        let len = segments.iter().map(Vec::len).sum();
        if segments.len() == 1 {
            let mut segments = segments;
            return Self::single(segments.pop().unwrap_or_default());
        }
        Self {
            len,
            storage: Storage::Segments(segments),
        }
    }

    /// Slices a byte string into [`CHUNK_SIZE`] segments.
    ///
    /// Produces the canonical scatter-gather shape for a message of the
    /// given size: a single buffer when it fits in one chunk, chunk-sized
    /// segments with a trimmed tail otherwise.
    #[must_use]
    pub fn chunked(data: &[u8]) -> Self {
        if data.len() <= CHUNK_SIZE {
            return Self::single(data.to_vec());
        }
        let segments = data.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        Self::from_segments(segments)
    }

    /// Total number of logical bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer carries no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The whole sequence as one slice, when contiguous.
    #[must_use]
    pub fn as_contiguous(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Contiguous(data) => Some(data),
            Storage::Segments(_) => None,
        }
    }

    /// Iterates the segments in order. A contiguous buffer is one segment.
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        let (single, many) = match &self.storage {
            Storage::Contiguous(data) => (Some(data.as_slice()), None),
            Storage::Segments(segments) => (None, Some(segments.iter().map(Vec::as_slice))),
        };
        single.into_iter().chain(many.into_iter().flatten())
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        match &self.storage {
            Storage::Contiguous(_) => 1,
            Storage::Segments(segments) => segments.len(),
        }
    }

    /// Copies the logical byte sequence into one `Vec`.
    #[must_use]
    pub fn linearize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for segment in self.segments() {
            out.extend_from_slice(segment);
        }
        out
    }
}

impl Default for FragmentedBuf {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<u8>> for FragmentedBuf {
    fn from(data: Vec<u8>) -> Self {
        Self::single(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buf = FragmentedBuf::empty();
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.segment_count(), 1);
        assert_eq!(buf.linearize(), Vec::<u8>::new());
    }

    #[test]
    fn single_is_contiguous() {
        let buf = FragmentedBuf::single(vec![1, 2, 3]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.as_contiguous(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn from_segments_collapses_singleton() {
        let buf = FragmentedBuf::from_segments(vec![vec![9; 10]]);
        assert!(buf.as_contiguous().is_some());
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn chunked_respects_convention() {
        let data = vec![0xabu8; CHUNK_SIZE * 2 + 17];
        let buf = FragmentedBuf::chunked(&data);
        assert_eq!(buf.len(), data.len());
        assert_eq!(buf.segment_count(), 3);
        let lens: Vec<usize> = buf.segments().map(<[u8]>::len).collect();
        assert_eq!(lens, vec![CHUNK_SIZE, CHUNK_SIZE, 17]);
        assert_eq!(buf.linearize(), data);
    }

    #[test]
    fn chunked_small_input_is_single() {
        let buf = FragmentedBuf::chunked(&[1, 2, 3]);
        assert!(buf.as_contiguous().is_some());
    }

    #[test]
    fn segments_iterate_in_order() {
        let buf = FragmentedBuf::from_segments(vec![vec![1; CHUNK_SIZE], vec![2; 4]]);
        let first: Vec<u8> = buf.segments().flat_map(|s| s.iter().copied()).collect();
        assert_eq!(first.len(), CHUNK_SIZE + 4);
        assert_eq!(first[CHUNK_SIZE], 2);
    }
}
