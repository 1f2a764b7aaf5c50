//! The bounded queue of serialized samples awaiting delivery.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::Error;

/// A bounded FIFO of serialized samples.
///
/// The queue has its own lock, distinct from the registry's, so snapshotting
/// and flushing never serialize against registration.
#[derive(Debug)]
pub(crate) struct PendingQueue {
    samples: Mutex<VecDeque<String>>,
    capacity: usize,
    throw_on_full: bool,
}

impl PendingQueue {
    pub fn new(capacity: usize, throw_on_full: bool) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            capacity,
            throw_on_full,
        }
    }

    /// Appends samples up to the remaining capacity and drops the rest.
    ///
    /// Returns the number of samples accepted. If the queue is full afterwards
    /// and the queue is configured to raise, [`Error::QueueFull`] is returned
    /// instead; the accepted samples stay queued either way.
    pub fn enqueue<I>(&self, samples: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = String>,
    {
        let mut queue = self.samples.lock().unwrap();
        let remaining = self.capacity.saturating_sub(queue.len());
        let before = queue.len();
        queue.extend(samples.into_iter().take(remaining));
        let accepted = queue.len() - before;

        if queue.len() >= self.capacity {
            bosun_debug!("pending queue is full ({} samples)", self.capacity);
            if self.throw_on_full {
                return Err(Error::QueueFull {
                    capacity: self.capacity,
                });
            }
        }
        Ok(accepted)
    }

    /// Removes and returns up to `max_size` samples from the head.
    pub fn dequeue_batch(&self, max_size: usize) -> Vec<String> {
        let mut queue = self.samples.lock().unwrap();
        if queue.len() <= max_size {
            return std::mem::take(&mut *queue).into();
        }
        queue.drain(..max_size).collect()
    }

    /// Puts a failed batch back at the head, keeping its original order.
    ///
    /// If samples were enqueued in the meantime and the queue would exceed its
    /// capacity, the newest samples at the tail are dropped. Like
    /// [`enqueue`](Self::enqueue) this returns [`Error::QueueFull`] in that
    /// case when the queue is configured to raise.
    pub fn requeue_front(&self, batch: Vec<String>) -> Result<(), Error> {
        let mut queue = self.samples.lock().unwrap();
        for sample in batch.into_iter().rev() {
            queue.push_front(sample);
        }
        if queue.len() > self.capacity {
            bosun_debug!(
                "dropping {} samples to requeue a failed batch",
                queue.len() - self.capacity
            );
            queue.truncate(self.capacity);
            if self.throw_on_full {
                return Err(Error::QueueFull {
                    capacity: self.capacity,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
        range.map(|i| i.to_string()).collect()
    }

    #[test]
    fn test_enqueue_truncates_to_capacity() {
        let queue = PendingQueue::new(3, false);
        assert_eq!(queue.enqueue(samples(1..=2)).unwrap(), 2);
        assert_eq!(queue.enqueue(samples(3..=5)).unwrap(), 1);
        assert_eq!(queue.enqueue(samples(6..=6)).unwrap(), 0);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dequeue_batch(10), samples(1..=3));
    }

    #[test]
    fn test_queue_full_error() {
        let queue = PendingQueue::new(3, true);
        assert_eq!(queue.enqueue(samples(1..=2)).unwrap(), 2);
        let err = queue.enqueue(samples(3..=5)).unwrap_err();
        assert!(matches!(err, Error::QueueFull { capacity: 3 }));
        // the accepted sample was still queued
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_dequeue_batches_preserve_order() {
        let queue = PendingQueue::new(10, false);
        assert!(queue.dequeue_batch(2).is_empty());

        queue.enqueue(samples(1..=5)).unwrap();
        assert_eq!(queue.dequeue_batch(2), samples(1..=2));
        assert_eq!(queue.dequeue_batch(2), samples(3..=4));
        assert_eq!(queue.dequeue_batch(2), samples(5..=5));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_front() {
        let queue = PendingQueue::new(4, false);
        queue.enqueue(samples(1..=4)).unwrap();
        let batch = queue.dequeue_batch(2);
        queue.enqueue(samples(5..=6)).unwrap();

        queue.requeue_front(batch).unwrap();
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.dequeue_batch(10), samples(1..=4));
    }

    #[test]
    fn test_requeue_overflow_error() {
        let queue = PendingQueue::new(3, true);
        queue.enqueue(samples(1..=2)).unwrap();
        let batch = queue.dequeue_batch(2);
        assert!(queue.enqueue(samples(3..=5)).is_err());

        let err = queue.requeue_front(batch).unwrap_err();
        assert!(matches!(err, Error::QueueFull { capacity: 3 }));
        assert_eq!(queue.dequeue_batch(10), samples(1..=3));

        // nothing dropped, nothing raised
        let queue = PendingQueue::new(3, true);
        queue.requeue_front(samples(1..=2)).unwrap();
        assert_eq!(queue.len(), 2);
    }
}
