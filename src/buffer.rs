//! Bounded accumulation buffer
//!
//! Absorbs raw chunks from the byte source until the synchronizer can carve
//! frames out of them. The length never exceeds the configured capacity:
//! when a chunk does not fit, the oldest bytes are evicted first so the
//! retained bytes keep their stream order.

use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::constants::BUFFER_CAPACITY;

/// Fixed-capacity byte buffer with oldest-first eviction
#[derive(Debug, Clone)]
pub struct AccumulationBuffer {
    data: BytesMut,
    capacity: usize,
}

impl AccumulationBuffer {
    /// Create an empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a chunk, evicting the oldest bytes if it does not fit.
    ///
    /// Returns the number of bytes evicted (previously buffered bytes plus
    /// any leading part of `chunk` that could never fit).
    pub fn append(&mut self, chunk: &[u8]) -> usize {
        if chunk.is_empty() {
            return 0;
        }

        if chunk.len() >= self.capacity {
            // Only the tail of the chunk survives
            let evicted = self.data.len() + (chunk.len() - self.capacity);
            self.data.clear();
            self.data
                .extend_from_slice(&chunk[chunk.len() - self.capacity..]);
            debug!("Buffer overflow: evicted {} bytes", evicted);
            return evicted;
        }

        let available = self.capacity - self.data.len();
        let evicted = chunk.len().saturating_sub(available);
        if evicted > 0 {
            self.data.advance(evicted);
            debug!("Buffer overflow: evicted {} bytes", evicted);
        }
        self.data.extend_from_slice(chunk);
        evicted
    }

    /// Discard every byte before `from`.
    ///
    /// Offsets past the end simply empty the buffer.
    #[inline]
    pub fn compact(&mut self, from: usize) {
        let from = from.min(self.data.len());
        self.data.advance(from);
    }

    /// Keep only the last `keep` bytes.
    #[inline]
    pub fn retain_tail(&mut self, keep: usize) {
        let len = self.data.len();
        if len > keep {
            self.compact(len - keep);
        }
    }

    /// Buffered bytes, oldest first
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get current length
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Maximum number of bytes retained
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all buffered bytes
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Default for AccumulationBuffer {
    fn default() -> Self {
        Self::new(BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_within_capacity() {
        let mut buf = AccumulationBuffer::new(8);
        assert_eq!(buf.append(&[1, 2, 3]), 0);
        assert_eq!(buf.append(&[4, 5]), 0);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let mut buf = AccumulationBuffer::new(8);
        buf.append(&[1, 2]);
        assert_eq!(buf.append(&[]), 0);
        assert_eq!(buf.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buf = AccumulationBuffer::new(6);
        buf.append(&[1, 2, 3, 4, 5]);
        assert_eq!(buf.append(&[6, 7, 8]), 2);
        assert_eq!(buf.as_slice(), &[3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_oversized_chunk_keeps_its_tail() {
        let mut buf = AccumulationBuffer::new(4);
        buf.append(&[1, 2]);
        let evicted = buf.append(&[10, 11, 12, 13, 14, 15]);
        assert_eq!(evicted, 4);
        assert_eq!(buf.as_slice(), &[12, 13, 14, 15]);
    }

    #[test]
    fn test_compact_and_retain_tail() {
        let mut buf = AccumulationBuffer::new(16);
        buf.append(&[1, 2, 3, 4, 5, 6]);

        buf.compact(2);
        assert_eq!(buf.as_slice(), &[3, 4, 5, 6]);

        buf.retain_tail(3);
        assert_eq!(buf.as_slice(), &[4, 5, 6]);

        buf.retain_tail(10);
        assert_eq!(buf.as_slice(), &[4, 5, 6]);

        buf.compact(100);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(AccumulationBuffer::default().capacity(), BUFFER_CAPACITY);
    }

    proptest! {
        #[test]
        fn prop_length_never_exceeds_capacity(
            capacity in 1usize..256,
            chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..400), 0..20),
        ) {
            let mut buf = AccumulationBuffer::new(capacity);
            let mut stream = Vec::new();
            for chunk in &chunks {
                buf.append(chunk);
                stream.extend_from_slice(chunk);
                prop_assert!(buf.len() <= capacity);
            }
            // Retained bytes are always the most recent part of the stream
            let keep = stream.len().min(capacity);
            prop_assert_eq!(buf.as_slice(), &stream[stream.len() - keep..]);
        }
    }
}
