//! Priority ready queue
//!
//! Fixed table of FIFO buckets indexed by priority level, with an occupancy
//! bitmap for constant-time lookup of the best nonempty bucket. Iteration
//! yields threads in ascending priority value (highest scheduling priority
//! first), FIFO within equal priority.

use crate::thread::{Thread, THREAD_PRIORITY_COUNT};
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Number of priority buckets.
pub const PRIORITY_LEVELS: usize = THREAD_PRIORITY_COUNT as usize;

/// Per-core queue of Ready threads, ordered by priority then FIFO.
pub struct ReadyQueue {
    buckets: Vec<VecDeque<Arc<Thread>>>,
    /// Bit `p` set iff bucket `p` is nonempty.
    occupied: u64,
    len: usize,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            buckets: (0..PRIORITY_LEVELS).map(|_| VecDeque::new()).collect(),
            occupied: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a thread to the back of its priority bucket.
    pub fn push_back(&mut self, thread: Arc<Thread>, priority: u32) {
        let bucket = Self::bucket_index(priority);
        self.buckets[bucket].push_back(thread);
        self.occupied |= 1 << bucket;
        self.len += 1;
    }

    /// Insert a thread at the front of its priority bucket, ahead of its
    /// equal-priority peers.
    pub fn push_front(&mut self, thread: Arc<Thread>, priority: u32) {
        let bucket = Self::bucket_index(priority);
        self.buckets[bucket].push_front(thread);
        self.occupied |= 1 << bucket;
        self.len += 1;
    }

    /// Remove a thread from its priority bucket. Returns whether the thread
    /// was present.
    pub fn remove(&mut self, thread: &Arc<Thread>, priority: u32) -> bool {
        let bucket = Self::bucket_index(priority);
        let queue = &mut self.buckets[bucket];
        let Some(position) = queue.iter().position(|t| t.id() == thread.id()) else {
            return false;
        };
        queue.remove(position);
        if queue.is_empty() {
            self.occupied &= !(1 << bucket);
        }
        self.len -= 1;
        true
    }

    /// Move a thread between priority buckets. It lands at the back of the
    /// new bucket; FIFO order among its former peers is otherwise untouched.
    ///
    /// Halts if the thread is not queued at `old_priority`.
    pub fn adjust(&mut self, thread: &Arc<Thread>, old_priority: u32, new_priority: u32) {
        let removed = self.remove(thread, old_priority);
        assert!(
            removed,
            "thread {} not queued at priority {} during adjust",
            thread.id(),
            old_priority
        );
        self.push_back(thread.clone(), new_priority);
    }

    /// Highest-priority ready thread, or none when the queue is empty.
    pub fn front(&self) -> Option<Arc<Thread>> {
        if self.occupied == 0 {
            return None;
        }
        let bucket = self.occupied.trailing_zeros() as usize;
        self.buckets[bucket].front().cloned()
    }

    /// Iterate in ascending priority value, FIFO within equal priority.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Thread>> {
        self.buckets.iter().flat_map(|bucket| bucket.iter())
    }

    fn bucket_index(priority: u32) -> usize {
        assert!(
            priority < THREAD_PRIORITY_COUNT,
            "priority {} out of range 0..{}",
            priority,
            THREAD_PRIORITY_COUNT
        );
        priority as usize
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
