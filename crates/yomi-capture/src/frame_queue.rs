use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use yomi_types::Frame;

/// Fixed-capacity FIFO between the capture and OCR threads
///
/// `push` never blocks: when full the oldest entry is evicted. `pop` blocks up
/// to a timeout. Dropping frames is the only backpressure.
#[derive(Debug)]
pub struct FrameQueue<T = Frame> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> FrameQueue<T> {
    pub const DEFAULT_CAPACITY: usize = 5;

    /// Capacity is at least 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Returns `true` if the oldest item had to be dropped
    pub fn push(&self, item: T) -> bool {
        let evicted = {
            let mut items = self.lock();
            let evicted = if items.len() >= self.capacity {
                items.pop_front();
                true
            } else {
                false
            };
            items.push_back(item);
            evicted
        };
        self.available.notify_one();
        evicted
    }

    /// `None` once `timeout` elapses with nothing queued
    pub fn pop(&self, timeout: Duration) -> Option<T> {
        let items = self.lock();
        let (mut items, _) = self
            .available
            .wait_timeout_while(items, timeout, |items| items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let queue = FrameQueue::<u32>::new(3);
        for i in 1..=4 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 3);
        let popped: Vec<_> = (0..3)
            .filter_map(|_| queue.pop(Duration::from_millis(1)))
            .collect();
        assert_eq!(popped, vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_becomes_one() {
        let queue = FrameQueue::<u32>::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(!queue.push(1));
        assert!(queue.push(2));
        assert_eq!(queue.pop(Duration::ZERO), Some(2));
    }

    #[test]
    fn pop_times_out_on_empty() {
        let queue = FrameQueue::<u32>::new(2);
        let start = Instant::now();
        assert_eq!(queue.pop(Duration::from_millis(50)), None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
    }

    #[test]
    fn pop_wakes_on_push() {
        let queue = Arc::new(FrameQueue::<u32>::new(2));
        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.pop(Duration::from_secs(5)))
        };
        std::thread::sleep(Duration::from_millis(20));
        queue.push(7);
        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn clear_drains() {
        let queue = FrameQueue::default();
        queue.push(Frame::filled(2, 2, [1, 1, 1]));
        queue.push(Frame::filled(2, 2, [2, 2, 2]));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 5);
    }
}
