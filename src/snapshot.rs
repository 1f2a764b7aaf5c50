//! Captures the current value of every registered metric.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::queue::PendingQueue;
use crate::registry::Registry;
use crate::transmitter::Transmitter;
use crate::{Error, ExceptionHandler};

pub(crate) struct Snapshotter {
    registry: Arc<Registry>,
    queue: Arc<PendingQueue>,
    transmitter: Arc<Transmitter>,
    exception_handler: ExceptionHandler,
}

impl Snapshotter {
    pub fn new(
        registry: Arc<Registry>,
        queue: Arc<PendingQueue>,
        transmitter: Arc<Transmitter>,
        exception_handler: ExceptionHandler,
    ) -> Self {
        Self {
            registry,
            queue,
            transmitter,
            exception_handler,
        }
    }

    /// Serializes all instances with one shared timestamp and queues the samples.
    ///
    /// A failing instance is reported to the exception handler and skipped.
    /// Only a full queue (when configured to raise) fails the tick.
    pub fn tick(&self) -> Result<(), Error> {
        let started = Instant::now();
        if self.transmitter.resolve_destination().is_none() {
            bosun_debug!("no api url configured, the snapshot will not be delivered");
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let metrics = self.registry.metrics();
        let mut samples = Vec::with_capacity(metrics.len());
        for metric in &metrics {
            if let Err(err) = metric.serialize(timestamp, &mut samples) {
                bosun_debug!("failed to serialize {:?}: {}", metric, err);
                (self.exception_handler)(&err);
            }
        }

        let count = samples.len();
        let accepted = self.queue.enqueue(samples)?;
        if accepted < count {
            bosun_debug!("queue is full, dropped {} samples", count - accepted);
        }
        bosun_debug!(
            "snapshot of {} metrics produced {} samples in {:?}",
            metrics.len(),
            count,
            started.elapsed()
        );
        Ok(())
    }
}
