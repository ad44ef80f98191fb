use alloc::collections::vec_deque::{Iter, VecDeque};
use core::fmt::Debug;

/// A bounded FIFO that keeps the newest `capacity` items.
///
/// Pushing into a full ring evicts the oldest item, so the ring never grows
/// past its capacity. A capacity of zero drops everything.
pub struct BoundedRing<T> {
    inner: VecDeque<T>,
    capacity: usize,
    dropped: usize,
}

impl<T> BoundedRing<T> {
    pub const fn new(capacity: usize) -> BoundedRing<T> {
        BoundedRing {
            inner: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Push `value`, return the evicted item if the ring was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            self.dropped += 1;
            return Some(value);
        }
        let evicted = if self.inner.len() == self.capacity {
            self.dropped += 1;
            self.inner.pop_front()
        } else {
            None
        };
        self.inner.push_back(value);
        evicted
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of items evicted since creation.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<T: Debug> Debug for BoundedRing<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.inner.iter()).finish()
    }
}
