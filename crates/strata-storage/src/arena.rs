//! Record buffer arena
//!
//! Payloads read from a file are carved out of large chunks so that
//! reading many small records does not cost a heap allocation each.
//! Issued buffers are never moved; a chunk is released once the
//! allocator has moved past it and every record slicing it is dropped.

use crate::header::Fields;
use bytes::BytesMut;
use parking_lot::Mutex;
use strata_common::{DEFAULT_CHUNK_SIZE, Error, Result};
use tracing::debug;

/// Allocator statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Configured minimum chunk size
    pub chunk_size: usize,
    /// Chunks started since creation
    pub chunks: u64,
    /// Total payload bytes handed out
    pub bytes_issued: u64,
    /// Room left in the current chunk
    pub remaining: usize,
}

struct Arena {
    current: BytesMut,
    chunks: u64,
    bytes_issued: u64,
}

/// Chunked allocator for record payloads
///
/// Safe to share between readers through an `Arc`; concurrent `alloc`
/// calls are serialized.
pub struct RecordBufferAllocator {
    chunk_size: usize,
    arena: Mutex<Arena>,
}

impl RecordBufferAllocator {
    /// Create an allocator; a `chunk_size` of 0 selects the 1 MiB default
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };

        Self {
            chunk_size,
            arena: Mutex::new(Arena {
                current: BytesMut::new(),
                chunks: 0,
                bytes_issued: 0,
            }),
        }
    }

    /// Configured minimum chunk size
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hand out a zeroed buffer of exactly `fields.length` bytes
    ///
    /// `fields.length` must already be the record's logical length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordTooLarge`] if the length does not fit in
    /// memory on this target.
    pub fn alloc(&self, fields: &Fields) -> Result<BytesMut> {
        let len = usize::try_from(fields.length)
            .ok()
            .filter(|&len| isize::try_from(len).is_ok())
            .ok_or(Error::RecordTooLarge {
                length: fields.length,
                limit: isize::MAX.unsigned_abs() as u64,
            })?;
        Ok(self.alloc_len(len))
    }

    fn alloc_len(&self, len: usize) -> BytesMut {
        let mut arena = self.arena.lock();

        if arena.current.capacity() < len {
            let size = len.max(self.chunk_size);
            arena.current = BytesMut::with_capacity(size);
            arena.chunks += 1;
            debug!("record arena: chunk {} of {} bytes", arena.chunks, size);
        }

        // Stays within capacity, so the chunk is never reallocated
        arena.current.resize(len, 0);
        arena.bytes_issued += len as u64;
        arena.current.split()
    }

    /// Abandon the current chunk; the next allocation starts a new one
    pub fn reset(&self) {
        let mut arena = self.arena.lock();
        arena.current = BytesMut::new();
    }

    /// Snapshot of allocator counters
    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        let arena = self.arena.lock();
        AllocatorStats {
            chunk_size: self.chunk_size,
            chunks: arena.chunks,
            bytes_issued: arena.bytes_issued,
            remaining: arena.current.capacity(),
        }
    }
}

impl Default for RecordBufferAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for RecordBufferAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBufferAllocator")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fields(length: u64) -> Fields {
        Fields {
            length,
            ..Fields::default()
        }
    }

    #[test]
    fn test_default_chunk_size() {
        assert_eq!(RecordBufferAllocator::new(0).chunk_size(), 1 << 20);
        assert_eq!(RecordBufferAllocator::default().chunk_size(), 1 << 20);
        assert_eq!(RecordBufferAllocator::new(4096).chunk_size(), 4096);
    }

    #[test]
    fn test_small_allocs_share_chunk() {
        let alloc = RecordBufferAllocator::new(1024);

        let a = alloc.alloc(&fields(100)).unwrap();
        let b = alloc.alloc(&fields(200)).unwrap();
        assert_eq!(a.len(), 100);
        assert_eq!(b.len(), 200);

        let stats = alloc.stats();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.bytes_issued, 300);
        assert_eq!(stats.remaining, 724);
    }

    #[test]
    fn test_buffers_are_not_relocated() {
        let alloc = RecordBufferAllocator::new(256);

        let mut first = alloc.alloc(&fields(64)).unwrap();
        first.copy_from_slice(&[0xAB; 64]);
        let first = first.freeze();
        let ptr = first.as_ptr();

        // Force several chunk rollovers
        let mut others = Vec::new();
        for _ in 0..10 {
            let mut buf = alloc.alloc(&fields(100)).unwrap();
            buf.fill(0x11);
            others.push(buf.freeze());
        }

        assert_eq!(first.as_ptr(), ptr);
        assert!(first.iter().all(|&b| b == 0xAB));
        assert!(others.iter().all(|b| b.iter().all(|&x| x == 0x11)));
    }

    #[test]
    fn test_oversized_request_gets_own_chunk() {
        let alloc = RecordBufferAllocator::new(128);
        let buf = alloc.alloc(&fields(1000)).unwrap();
        assert_eq!(buf.len(), 1000);
        assert_eq!(alloc.stats().chunks, 1);
        assert_eq!(alloc.stats().remaining, 0);

        let _small = alloc.alloc(&fields(10)).unwrap();
        assert_eq!(alloc.stats().chunks, 2);
        assert_eq!(alloc.stats().remaining, 118);
    }

    #[test]
    fn test_zero_length_alloc() {
        let alloc = RecordBufferAllocator::new(128);
        let buf = alloc.alloc(&fields(0)).unwrap();
        assert!(buf.is_empty());
        assert_eq!(alloc.stats().chunks, 0);
    }

    #[test]
    fn test_unaddressable_length_is_rejected() {
        let alloc = RecordBufferAllocator::new(128);
        let err = alloc.alloc(&fields(u64::MAX)).unwrap_err();
        assert!(matches!(err, Error::RecordTooLarge { length: u64::MAX, .. }));
        assert_eq!(alloc.stats().chunks, 0);
        assert_eq!(alloc.stats().bytes_issued, 0);
    }

    #[test]
    fn test_reset_starts_new_chunk() {
        let alloc = RecordBufferAllocator::new(1024);
        let kept = alloc.alloc(&fields(10)).unwrap().freeze();
        alloc.reset();
        assert_eq!(alloc.stats().remaining, 0);

        let _next = alloc.alloc(&fields(10)).unwrap();
        assert_eq!(alloc.stats().chunks, 2);
        assert_eq!(kept.len(), 10);
    }

    #[test]
    fn test_shared_between_threads() {
        let alloc = Arc::new(RecordBufferAllocator::new(4096));

        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| {
                            let mut buf = alloc.alloc(&fields(16)).unwrap();
                            buf.fill(i);
                            buf.freeze()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let bufs = handle.join().unwrap();
            assert!(bufs.iter().all(|b| b.iter().all(|&x| x == i as u8)));
        }
        assert_eq!(alloc.stats().bytes_issued, 4 * 100 * 16);
    }
}
