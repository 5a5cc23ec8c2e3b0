//! Fixed-capacity history with oldest-first eviction.
//!
//! One abstraction backs the innovation history, the theft flag log and
//! both anchor windows. Storage is a `HeapRb` allocated once at
//! construction; pushing into a full history overwrites the oldest entry.

use std::fmt;

use ringbuf::{traits::*, HeapRb};

/// Bounded FIFO history
pub struct BoundedHistory<T> {
    ring: HeapRb<T>,
    evicted: u64,
}

impl<T: fmt::Debug> fmt::Debug for BoundedHistory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedHistory")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("evicted", &self.evicted)
            .finish()
    }
}

impl<T> BoundedHistory<T> {
    /// Create an empty history holding at most `capacity` items (min 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity.max(1)),
            evicted: 0,
        }
    }

    /// Append an item, returning the evicted oldest item when full
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = self.ring.push_overwrite(item);
        if evicted.is_some() {
            self.evicted += 1;
        }
        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    /// Items from oldest to newest
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.ring.iter()
    }

    /// Oldest retained item
    #[inline]
    pub fn oldest(&self) -> Option<&T> {
        self.ring.iter().next()
    }

    /// Newest item
    #[inline]
    pub fn newest(&self) -> Option<&T> {
        self.ring.iter().last()
    }

    /// Drop every item
    #[inline]
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Total items evicted by overflow since construction
    #[inline]
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Copy of the contents, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.ring.iter().cloned().collect()
    }
}
