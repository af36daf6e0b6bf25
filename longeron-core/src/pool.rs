//! Generic object pool with pluggable lifecycle hooks.
//!
//! Completion state carriers would be stack-allocated per operation in a
//! synchronous design; at millions of frames per second the allocation cost
//! dominates, so they are pooled instead. The pool is parameterised by a
//! [`Recycle`] strategy (create / reset / can_reuse / destroy) rather than
//! by subclassing, and stores objects homogeneously.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// Lifecycle hooks for pooled objects.
///
/// `give_back` runs `can_reuse` first; a rejected object is `destroy`ed and
/// dropped, an accepted one is `reset` and stored.
pub trait Recycle<T>: Send + Sync {
    /// Build a fresh instance when the idle set is empty.
    fn create(&self) -> T;

    /// Restore a reusable instance to its pristine state.
    fn reset(&self, _item: &mut T) {}

    /// Decide whether a returned instance may be stored for reuse.
    fn can_reuse(&self, _item: &mut T) -> bool {
        true
    }

    /// Tear down an instance leaving the pool for good.
    fn destroy(&self, item: T) {
        drop(item);
    }
}

/// Concurrent pool of `T`, loosely bounded by a retention target.
pub struct ObjectPool<T> {
    recycler: Arc<dyn Recycle<T>>,
    idle: Mutex<Vec<T>>,
    retention: usize,
}

impl<T> ObjectPool<T> {
    /// Create a pool with `preallocate` warm objects, retaining at most
    /// `retention` idle objects thereafter.
    ///
    /// The retention target is raised to `preallocate` if smaller, so warm
    /// objects are never immediately discarded.
    pub fn new(recycler: Arc<dyn Recycle<T>>, preallocate: usize, retention: usize) -> Self {
        let pool = Self {
            recycler,
            idle: Mutex::new(Vec::with_capacity(preallocate)),
            retention: retention.max(preallocate),
        };
        pool.warm(preallocate);
        pool
    }

    /// Top the idle set up to `count` objects.
    pub fn warm(&self, count: usize) {
        let mut idle = self.idle.lock();
        while idle.len() < count {
            idle.push(self.recycler.create());
        }
    }

    /// Rent an object, reusing an idle one when available.
    pub fn rent(&self) -> T {
        if let Some(item) = self.idle.lock().pop() {
            return item;
        }
        self.recycler.create()
    }

    /// Return an object to the pool.
    pub fn give_back(&self, mut item: T) {
        if !self.recycler.can_reuse(&mut item) {
            self.recycler.destroy(item);
            return;
        }
        self.recycler.reset(&mut item);

        let mut idle = self.idle.lock();
        if idle.len() >= self.retention {
            drop(idle);
            self.recycler.destroy(item);
            return;
        }
        idle.push(item);
    }

    /// Number of idle objects currently stored.
    #[must_use]
    pub fn idle_objects(&self) -> usize {
        self.idle.lock().len()
    }

    /// Destroy every stored object. Rented objects are unaffected.
    pub fn dispose(&self) {
        let drained: Vec<T> = std::mem::take(&mut *self.idle.lock());
        if !drained.is_empty() {
            debug!("[ObjectPool] disposing {} idle objects", drained.len());
        }
        for item in drained {
            self.recycler.destroy(item);
        }
    }
}

impl<T> Drop for ObjectPool<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        resets: AtomicUsize,
        destroyed: AtomicUsize,
    }

    struct CountingRecycler {
        counters: Arc<Counters>,
        reusable: bool,
    }

    impl Recycle<u64> for CountingRecycler {
        fn create(&self) -> u64 {
            self.counters.created.fetch_add(1, Ordering::Relaxed);
            0
        }

        fn reset(&self, item: &mut u64) {
            self.counters.resets.fetch_add(1, Ordering::Relaxed);
            *item = 0;
        }

        fn can_reuse(&self, _item: &mut u64) -> bool {
            self.reusable
        }

        fn destroy(&self, _item: u64) {
            self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn pool_with(reusable: bool, preallocate: usize) -> (ObjectPool<u64>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let recycler = Arc::new(CountingRecycler {
            counters: counters.clone(),
            reusable,
        });
        (ObjectPool::new(recycler, preallocate, 8), counters)
    }

    #[test]
    fn rent_reuses_idle_objects() {
        let (pool, counters) = pool_with(true, 1);
        let mut item = pool.rent();
        item += 42;
        pool.give_back(item);

        let again = pool.rent();
        assert_eq!(again, 0, "reset hook restores pristine state");
        assert_eq!(counters.created.load(Ordering::Relaxed), 1);
        assert_eq!(counters.resets.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn rejected_objects_are_destroyed() {
        let (pool, counters) = pool_with(false, 0);
        let item = pool.rent();
        pool.give_back(item);

        assert_eq!(pool.idle_objects(), 0);
        assert_eq!(counters.destroyed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn repeated_roundtrips_are_idempotent() {
        let (pool, counters) = pool_with(true, 0);
        for _ in 0..100 {
            let item = pool.rent();
            pool.give_back(item);
        }
        assert_eq!(counters.created.load(Ordering::Relaxed), 1);
        assert_eq!(pool.idle_objects(), 1);
    }

    #[test]
    fn dispose_destroys_idle_set() {
        let (pool, counters) = pool_with(true, 4);
        pool.dispose();
        assert_eq!(pool.idle_objects(), 0);
        assert_eq!(counters.destroyed.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn retention_bounds_idle_set() {
        let counters = Arc::new(Counters::default());
        let recycler = Arc::new(CountingRecycler {
            counters: counters.clone(),
            reusable: true,
        });
        let pool = ObjectPool::new(recycler, 0, 2);

        let items: Vec<u64> = (0..4).map(|_| pool.rent()).collect();
        for item in items {
            pool.give_back(item);
        }
        assert_eq!(pool.idle_objects(), 2);
        assert_eq!(counters.destroyed.load(Ordering::Relaxed), 2);
    }
}
