//! Bounded free list of recyclable objects.

/// Default number of recycled objects kept per pool.
pub const DEFAULT_POOL_CAPACITY: usize = 256;

/// Objects that can be reset to their newly-constructed state.
///
/// After `recycle` the object must be observably identical to
/// `T::default()` apart from its lifecycle generation.
pub trait Recycle {
    /// Reset every field and bump the lifecycle generation.
    fn recycle(&mut self);
}

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects constructed because the free list was empty.
    pub created: u64,
    /// Objects handed out from the free list.
    pub reused: u64,
    /// Objects currently waiting in the free list.
    pub available: usize,
    /// Objects dropped because the free list was full.
    pub dropped: u64,
}

/// A bounded free list.
#[derive(Debug)]
pub struct Pool<T: Recycle + Default> {
    free: Vec<T>,
    capacity: usize,
    created: u64,
    reused: u64,
    dropped: u64,
}

impl<T: Recycle + Default> Default for Pool<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }
}

impl<T: Recycle + Default> Pool<T> {
    /// Create a pool retaining at most `capacity` recycled objects.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Vec::new(),
            capacity,
            created: 0,
            reused: 0,
            dropped: 0,
        }
    }

    /// Take an object from the free list, or construct one.
    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(item) => {
                self.reused += 1;
                item
            }
            None => {
                self.created += 1;
                T::default()
            }
        }
    }

    /// Recycle `item` and keep it for reuse unless the pool is full.
    pub fn release(&mut self, mut item: T) {
        item.recycle();
        if self.free.len() < self.capacity {
            self.free.push(item);
        } else {
            self.dropped += 1;
        }
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created,
            reused: self.reused,
            available: self.free.len(),
            dropped: self.dropped,
        }
    }

    /// Maximum number of retained objects.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every retained object.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}
