//! Fixed-capacity FIFO ring buffer.
//!
//! `BoundedQueue` is unsynchronized and never blocks. Callers that
//! share it between threads wrap it in a lock and perform the fullness check
//! and the insert under the same guard (see [`super::WorkQueue`]).

use super::types::{QueueError, QueueFull};

/// A fixed-capacity FIFO buffer.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    count: usize,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }

        let slots = std::iter::repeat_with(|| None).take(capacity).collect();
        Ok(Self {
            slots,
            head: 0,
            count: 0,
        })
    }

    /// Insert at the tail. A full queue hands the item back.
    pub fn push(&mut self, item: T) -> Result<(), QueueFull<T>> {
        if self.is_full() {
            return Err(QueueFull(item));
        }

        let tail = (self.head + self.count) % self.slots.len();
        debug_assert!(self.slots[tail].is_none());
        self.slots[tail] = Some(item);
        self.count += 1;
        Ok(())
    }

    /// Remove from the head.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        item
    }

    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        let result = BoundedQueue::<String>::new(0);
        assert!(matches!(result, Err(QueueError::ZeroCapacity)));
    }

    #[test]
    fn test_new_queue_is_empty() {
        let queue = BoundedQueue::<u32>::new(3).unwrap();
        assert!(queue.is_empty());
        assert!(!queue.is_full());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.capacity(), 3);
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let mut queue = BoundedQueue::<u32>::new(2).unwrap();
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_push_full_hands_item_back() {
        let mut queue = BoundedQueue::new(2).unwrap();
        queue.push("a".to_string()).unwrap();
        queue.push("b".to_string()).unwrap();
        assert!(queue.is_full());

        let QueueFull(rejected) = queue.push("c".to_string()).unwrap_err();
        assert_eq!(rejected, "c");
        assert_eq!(queue.len(), 2);

        // Space frees only after a pop
        assert_eq!(queue.pop().as_deref(), Some("a"));
        queue.push("c".to_string()).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_fifo_order_across_wraparound() {
        let mut queue = BoundedQueue::new(3).unwrap();
        let mut expected = Vec::new();
        let mut popped = Vec::new();

        // Interleave pushes and pops so head and tail wrap several times
        for i in 0..20u32 {
            queue.push(i).unwrap();
            expected.push(i);
            if i % 2 == 1 {
                popped.push(queue.pop().unwrap());
            }
            if queue.is_full() {
                popped.push(queue.pop().unwrap());
            }
        }
        while let Some(item) = queue.pop() {
            popped.push(item);
        }

        assert_eq!(popped, expected);
    }

    #[test]
    fn test_count_stays_within_bounds() {
        let mut queue = BoundedQueue::new(4).unwrap();
        // Deterministic pseudo-random op sequence
        let mut seed = 0x2545_f491_u32;
        for step in 0..500u32 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            if seed % 3 == 0 {
                queue.pop();
            } else {
                let was_full = queue.is_full();
                let result = queue.push(step);
                assert_eq!(result.is_err(), was_full);
            }
            assert!(queue.len() <= queue.capacity());
            assert_eq!(queue.is_empty(), queue.len() == 0);
            assert_eq!(queue.is_full(), queue.len() == queue.capacity());
        }
    }

    #[test]
    fn test_capacity_one() {
        let mut queue = BoundedQueue::new(1).unwrap();
        queue.push("alpha").unwrap();
        assert!(queue.is_full());
        assert!(queue.push("beta").is_err());
        assert_eq!(queue.pop(), Some("alpha"));
        queue.push("beta").unwrap();
        assert_eq!(queue.pop(), Some("beta"));
        assert!(queue.is_empty());
    }
}
