//! Bucketed transmission-buffer pool.
//!
//! Frames are staged in fixed-capacity byte buffers rented from this pool
//! and returned once the frame completes, so steady-state traffic performs
//! no per-message allocation. Buffers are bucketed by power-of-two size
//! class to avoid fragmentation.
//!
//! # Discipline
//!
//! Rented buffers are always fully initialized (`len == capacity`), so they
//! can be handed to completion-based I/O and resliced freely without
//! touching uninitialized memory. A buffer returned with the secure-erase
//! flag is zeroed before it becomes rentable again.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{LongeronError, Result};

/// Smallest bucket capacity. Requests below this are rounded up.
const MIN_BUCKET_CAPACITY: usize = 512;

/// One size class: all buffers in a bucket share the same capacity.
struct Bucket {
    capacity: usize,
    idle: Mutex<Vec<Vec<u8>>>,
}

/// Snapshot of pool activity counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferPoolStats {
    /// Total successful rents
    pub rents: u64,
    /// Total returns accepted back into a bucket
    pub returns: u64,
    /// Rents that had to allocate a fresh buffer
    pub misses: u64,
    /// Returns dropped because the bucket was at its retention target
    pub discards: u64,
}

/// Concurrent pool of fixed-capacity byte buffers, bucketed by size class.
pub struct BufferPool {
    buckets: Box<[Bucket]>,
    max_buffer_size: usize,
    retention_per_bucket: usize,
    rents: AtomicU64,
    returns: AtomicU64,
    misses: AtomicU64,
    discards: AtomicU64,
}

impl BufferPool {
    /// Create a pool serving capacities up to `max_buffer_size`, retaining at
    /// most `retention_per_bucket` idle buffers per size class.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `max_buffer_size` is zero.
    pub fn new(max_buffer_size: usize, retention_per_bucket: usize) -> Result<Self> {
        if max_buffer_size == 0 {
            return Err(LongeronError::invalid_config(
                "buffer pool max_buffer_size must be > 0",
            ));
        }

        // Power-of-two ladder, with the top class clamped to the pool bound
        // so a rented buffer never exceeds `max_buffer_size`.
        let mut buckets = Vec::new();
        let mut capacity = MIN_BUCKET_CAPACITY.min(max_buffer_size);
        loop {
            buckets.push(Bucket {
                capacity,
                idle: Mutex::new(Vec::new()),
            });
            if capacity >= max_buffer_size {
                break;
            }
            capacity = (capacity * 2).min(max_buffer_size);
        }

        Ok(Self {
            buckets: buckets.into_boxed_slice(),
            max_buffer_size,
            retention_per_bucket,
            rents: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            discards: AtomicU64::new(0),
        })
    }

    /// Upper bound on rentable buffer capacity.
    #[inline]
    #[must_use]
    pub const fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Rent a buffer with `len == capacity >= min_capacity`.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooLarge` if `min_capacity` exceeds the pool bound.
    pub fn rent(&self, min_capacity: usize) -> Result<Vec<u8>> {
        if min_capacity > self.max_buffer_size {
            return Err(LongeronError::BufferTooLarge {
                size: min_capacity,
                max: self.max_buffer_size,
            });
        }

        let bucket = self
            .buckets
            .iter()
            .find(|b| b.capacity >= min_capacity)
            .expect("bucket table covers max_buffer_size");

        self.rents.fetch_add(1, Ordering::Relaxed);

        if let Some(buf) = bucket.idle.lock().pop() {
            return Ok(buf);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(vec![0u8; bucket.capacity])
    }

    /// Return a buffer to its size class.
    ///
    /// When `clear` is set the backing bytes are zeroed before the buffer is
    /// made available again. Buffers beyond the per-bucket retention target,
    /// and buffers smaller than the smallest class, are dropped.
    pub fn give_back(&self, mut buf: Vec<u8>, clear: bool) {
        // Largest class that fits inside the buffer's allocation.
        let Some(bucket) = self
            .buckets
            .iter()
            .rev()
            .find(|b| b.capacity <= buf.capacity())
        else {
            self.discards.fetch_add(1, Ordering::Relaxed);
            return;
        };

        buf.resize(bucket.capacity, 0);
        if clear {
            buf.fill(0);
        }

        let mut idle = bucket.idle.lock();
        if idle.len() >= self.retention_per_bucket {
            drop(idle);
            self.discards.fetch_add(1, Ordering::Relaxed);
            trace!(
                "[BufferPool] retention target reached; dropping a {} byte buffer",
                bucket.capacity
            );
            return;
        }
        idle.push(buf);
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    /// Preallocate `count` idle buffers in the class covering `capacity`.
    ///
    /// Respects the retention target; a zero or oversize `capacity` request
    /// is ignored.
    pub fn warm(&self, capacity: usize, count: usize) {
        if capacity == 0 || capacity > self.max_buffer_size {
            return;
        }
        let bucket = self
            .buckets
            .iter()
            .find(|b| b.capacity >= capacity)
            .expect("bucket table covers max_buffer_size");

        let mut idle = bucket.idle.lock();
        while idle.len() < count.min(self.retention_per_bucket) {
            idle.push(vec![0u8; bucket.capacity]);
        }
    }

    /// Number of idle buffers currently held across all buckets.
    #[must_use]
    pub fn idle_buffers(&self) -> usize {
        self.buckets.iter().map(|b| b.idle.lock().len()).sum()
    }

    /// Snapshot of the activity counters.
    #[must_use]
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            rents: self.rents.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_rounds_up_to_class() {
        let pool = BufferPool::new(8192, 4).unwrap();
        let buf = pool.rent(700).unwrap();
        assert_eq!(buf.len(), 1024);
        assert_eq!(buf.capacity(), 1024);
    }

    #[test]
    fn rent_too_large_fails() {
        let pool = BufferPool::new(8192, 4).unwrap();
        let err = pool.rent(8193).unwrap_err();
        assert!(matches!(err, LongeronError::BufferTooLarge { .. }));
    }

    #[test]
    fn give_back_reuses() {
        let pool = BufferPool::new(8192, 4).unwrap();
        let mut buf = pool.rent(4096).unwrap();
        buf[0] = 0xAB;
        pool.give_back(buf, false);

        let again = pool.rent(4096).unwrap();
        assert_eq!(again[0], 0xAB);
        assert_eq!(pool.stats().misses, 1);
    }

    #[test]
    fn clear_zeroes_before_reuse() {
        let pool = BufferPool::new(8192, 4).unwrap();
        let mut buf = pool.rent(4096).unwrap();
        buf.fill(0xEE);
        pool.give_back(buf, true);

        let again = pool.rent(4096).unwrap();
        assert!(again.iter().all(|&b| b == 0));
    }

    #[test]
    fn retention_target_bounds_idle_set() {
        let pool = BufferPool::new(8192, 2).unwrap();
        for _ in 0..5 {
            let buf = pool.rent(1024).unwrap();
            pool.give_back(buf, false);
        }
        // Sequential rent/return keeps one idle slot cycling.
        let a = pool.rent(1024).unwrap();
        let b = pool.rent(1024).unwrap();
        let c = pool.rent(1024).unwrap();
        pool.give_back(a, false);
        pool.give_back(b, false);
        pool.give_back(c, false);
        assert_eq!(pool.idle_buffers(), 2);
        assert!(pool.stats().discards >= 1);
    }

    #[test]
    fn warm_preallocates() {
        let pool = BufferPool::new(8192, 8).unwrap();
        pool.warm(8192, 4);
        assert_eq!(pool.idle_buffers(), 4);
        let buf = pool.rent(8192).unwrap();
        assert_eq!(buf.len(), 8192);
        assert_eq!(pool.stats().misses, 0);
    }
}
