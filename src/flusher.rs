//! Drains the pending queue in batches.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::queue::PendingQueue;
use crate::transmitter::{Delivery, Transmitter};
use crate::{Error, ExceptionHandler};

/// Resets the in-progress flag when a flush returns.
struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sends queued samples with at most one flush in flight.
///
/// After a failed post the following `backoff_ticks` flushes are skipped.
/// Samples dropped to put a failed batch back are reported to the exception
/// handler when the queue is configured to raise.
pub(crate) struct Flusher {
    queue: Arc<PendingQueue>,
    transmitter: Arc<Transmitter>,
    in_progress: AtomicBool,
    skip: AtomicUsize,
    batch_size: usize,
    backoff_ticks: usize,
    throw_on_post_fail: bool,
    exception_handler: ExceptionHandler,
}

impl Flusher {
    pub fn new(
        queue: Arc<PendingQueue>,
        transmitter: Arc<Transmitter>,
        batch_size: usize,
        backoff_ticks: usize,
        throw_on_post_fail: bool,
        exception_handler: ExceptionHandler,
    ) -> Self {
        Self {
            queue,
            transmitter,
            in_progress: AtomicBool::new(false),
            skip: AtomicUsize::new(0),
            batch_size: batch_size.max(1),
            backoff_ticks,
            throw_on_post_fail,
            exception_handler,
        }
    }

    /// Runs one flush tick, honouring the backoff.
    pub fn tick(&self) -> Result<(), Error> {
        self.run(true)
    }

    /// Drains the queue regardless of a pending backoff.
    pub fn flush_remaining(&self) -> Result<(), Error> {
        self.run(false)
    }

    fn run(&self, honour_backoff: bool) -> Result<(), Error> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            bosun_debug!("flush already in progress, skipping tick");
            return Ok(());
        }
        let guard = InProgress(&self.in_progress);

        let skip = self.skip.load(Ordering::Relaxed);
        if honour_backoff && skip > 0 {
            self.skip.store(skip - 1, Ordering::Relaxed);
            bosun_debug!("backing off, {} flush ticks left to skip", skip - 1);
            return Ok(());
        }

        match self.drain() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.skip.store(self.backoff_ticks, Ordering::Relaxed);
                drop(guard);
                if self.throw_on_post_fail {
                    return Err(err);
                }
                bosun_debug!("flush failed, backing off: {}", err);
                Ok(())
            }
        }
    }

    fn drain(&self) -> Result<(), Error> {
        loop {
            let batch = self.queue.dequeue_batch(self.batch_size);
            if batch.is_empty() {
                return Ok(());
            }
            match self.transmitter.post_batch(&batch) {
                Ok(Delivery::Sent) => {
                    bosun_debug!("sent batch of {} samples", batch.len());
                }
                Ok(Delivery::NoDestination) => {
                    bosun_debug!("no api url configured, dropping {} samples", batch.len());
                }
                Err(err) => {
                    if let Err(full) = self.queue.requeue_front(batch) {
                        (self.exception_handler)(&full);
                    }
                    return Err(err);
                }
            }
        }
    }
}
