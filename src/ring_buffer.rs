//! Fixed-capacity record log with FIFO eviction
//!
//! The buffer keeps the most recent `capacity` completed calls. Appends land at
//! the tail; once the length exceeds the capacity the oldest entries are evicted
//! from the head until the bound holds again.
//!
//! # Design
//!
//! ```text
//!   append(E) with capacity 4
//!
//!   head                 tail
//!   ┌────┬────┬────┬────┐
//!   │ A  │ B  │ C  │ D  │   ← full
//!   └────┴────┴────┴────┘
//!     │
//!     └── evicted
//!   ┌────┬────┬────┬────┐
//!   │ B  │ C  │ D  │ E  │
//!   └────┴────┴────┴────┘
//! ```
//!
//! Insertion order is completion order: a slow call that finishes late lands
//! after faster calls that started after it.
//!
//! The buffer itself is not synchronized. The hub keeps it inside the same
//! critical section as the observer registry, so a snapshot never observes a
//! half-applied append.

use std::collections::VecDeque;

/// Capacity-bounded, insertion-ordered store
///
/// # Example
///
/// ```
/// use http_observe::ring_buffer::RingBuffer;
///
/// let mut buffer = RingBuffer::new(2);
/// buffer.append("A");
/// buffer.append("B");
/// buffer.append("C");
/// assert_eq!(buffer.snapshot(), vec!["B", "C"]);
///
/// buffer.append("D");
/// assert_eq!(buffer.snapshot(), vec!["C", "D"]);
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,

    /// Total entries ever appended
    total_appended: u64,

    /// Total entries evicted from the head
    total_evicted: u64,
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty buffer bounded at `capacity` entries
    ///
    /// A capacity of zero is accepted; every append is then evicted at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            total_appended: 0,
            total_evicted: 0,
        }
    }

    /// Append at the tail, evicting from the head while over capacity
    pub fn append(&mut self, entry: T) {
        self.entries.push_back(entry);
        self.total_appended += 1;
        self.evict_overflow();
    }

    /// Change the bound, evicting immediately if the buffer is now over it
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_overflow();
    }

    /// Empty the buffer. Idempotent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Independent copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffer statistics
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            total_appended: self.total_appended,
            total_evicted: self.total_evicted,
            current_size: self.entries.len(),
            capacity: self.capacity,
        }
    }

    fn evict_overflow(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.total_evicted += 1;
        }
    }
}

/// Ring buffer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub total_appended: u64,
    pub total_evicted: u64,
    pub current_size: usize,
    pub capacity: usize,
}

impl BufferStats {
    /// Calculate buffer utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.current_size as f64 / self.capacity as f64
        }
    }
}
