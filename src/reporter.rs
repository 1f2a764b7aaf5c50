use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::flusher::Flusher;
use crate::metadata::MetadataReporter;
use crate::metric::BosunMetric;
use crate::queue::PendingQueue;
use crate::registry::{RegisteredMetric, Registry};
use crate::snapshot::Snapshotter;
use crate::tags::{TagResolver, Tags};
use crate::ticker::Ticker;
use crate::transmitter::Transmitter;
use crate::transports::DefaultTransportFactory;
use crate::validation::is_valid_metric_name;
use crate::{Error, ExceptionHandler, ReporterOptions, TransportFactory};

/// Collects metrics and ships them to Bosun.
///
/// The reporter owns every registered metric and three background tickers:
/// one taking snapshots, one flushing the pending queue and one posting
/// metadata. Dropping the reporter stops them.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use bosun_metrics::metrics::Counter;
/// use bosun_metrics::test::TestTransport;
/// use bosun_metrics::{MetricsReporter, ReporterOptions, Tags};
///
/// let mut options = ReporterOptions::new(Arc::new(|err| eprintln!("{err}")));
/// options.name_prefix = "app.".into();
/// options.transport = Some(Arc::new(TestTransport::new()));
/// let reporter = MetricsReporter::new(options).unwrap();
///
/// let requests = reporter
///     .get_default_metric::<Counter>("requests", Tags::new().with_tag("route", "home"))
///     .unwrap();
/// requests.increment();
/// ```
pub struct MetricsReporter {
    name_prefix: String,
    tag_resolver: TagResolver,
    registry: Arc<Registry>,
    queue: Arc<PendingQueue>,
    snapshotter: Arc<Snapshotter>,
    flusher: Arc<Flusher>,
    exception_handler: ExceptionHandler,
    tickers: Mutex<Vec<Ticker>>,
    flush_on_shutdown: bool,
    is_shut_down: AtomicBool,
}

impl MetricsReporter {
    /// Creates a reporter and starts its background tickers.
    ///
    /// Fails if the name prefix or a default tag is invalid, if the snapshot
    /// or flush interval is zero, or if the transport cannot be created.
    pub fn new(options: ReporterOptions) -> Result<Self, Error> {
        if options.snapshot_interval.is_zero() {
            return Err(Error::InvalidOption {
                name: "snapshot_interval",
                reason: "must not be zero",
            });
        }
        if options.flush_interval.is_zero() {
            return Err(Error::InvalidOption {
                name: "flush_interval",
                reason: "must not be zero",
            });
        }
        if !options.name_prefix.is_empty() && !is_valid_metric_name(&options.name_prefix) {
            return Err(Error::InvalidName {
                name: options.name_prefix,
            });
        }
        let tag_resolver = TagResolver::new(
            options.property_to_tag_name.clone(),
            options.tag_value_converter.clone(),
            &options.default_tags,
        )?;

        let transport = match options.transport {
            Some(ref factory) => factory.create_transport(&options)?,
            None => DefaultTransportFactory.create_transport(&options)?,
        };
        let transmitter = Arc::new(Transmitter::new(transport, &options));
        let registry = Arc::new(Registry::new());
        let queue = Arc::new(PendingQueue::new(
            options.max_queue_length,
            options.throw_on_queue_full,
        ));
        let handler = options.exception_handler.clone();

        let snapshotter = Arc::new(Snapshotter::new(
            registry.clone(),
            queue.clone(),
            transmitter.clone(),
            handler.clone(),
        ));
        let flusher = Arc::new(Flusher::new(
            queue.clone(),
            transmitter.clone(),
            options.batch_size,
            options.flush_backoff_ticks,
            options.throw_on_post_fail,
            handler.clone(),
        ));

        let mut tickers = Vec::with_capacity(3);
        tickers.push({
            let snapshotter = snapshotter.clone();
            Ticker::spawn(
                "bosun-snapshot",
                options.snapshot_interval,
                options.snapshot_interval,
                handler.clone(),
                move || snapshotter.tick(),
            )?
        });
        tickers.push({
            let flusher = flusher.clone();
            Ticker::spawn(
                "bosun-flush",
                options.flush_interval,
                options.flush_interval,
                handler.clone(),
                move || flusher.tick(),
            )?
        });
        if let Some(interval) = options.metadata_interval.filter(|i| !i.is_zero()) {
            let metadata = MetadataReporter::new(
                registry.clone(),
                transmitter,
                options.throw_on_post_fail,
            );
            tickers.push(Ticker::spawn(
                "bosun-metadata",
                options.metadata_initial_delay,
                interval,
                handler.clone(),
                move || metadata.tick(),
            )?);
        } else {
            bosun_debug!("metadata reporting is disabled");
        }

        bosun_debug!(
            "started metrics reporter (snapshot every {:?}, flush every {:?})",
            options.snapshot_interval,
            options.flush_interval
        );
        Ok(Self {
            name_prefix: options.name_prefix,
            tag_resolver,
            registry,
            queue,
            snapshotter,
            flusher,
            exception_handler: handler,
            tickers: Mutex::new(tickers),
            flush_on_shutdown: options.flush_on_shutdown,
            is_shut_down: AtomicBool::new(false),
        })
    }

    /// Returns the metric registered under `name` and `tags`, creating it with
    /// `factory` if it does not exist yet.
    ///
    /// The name prefix is prepended to `name`. Registering a name that is
    /// already claimed by another metric type, either as its root name or as
    /// one of its suffixed names, fails.
    ///
    /// The factory may register other metrics. When two threads race to
    /// create the same instance, both factories can run and one result is
    /// discarded.
    pub fn get_metric<M, F>(&self, name: &str, tags: Tags, factory: F) -> Result<Arc<M>, Error>
    where
        M: BosunMetric,
        F: FnOnce() -> M,
    {
        if !is_valid_metric_name(name) {
            return Err(Error::InvalidName {
                name: name.to_owned(),
            });
        }
        let full_name = format!("{}{}", self.name_prefix, name);
        let tags = self.tag_resolver.resolve(&tags, M::include_default_tags())?;
        self.registry.register(full_name, tags, factory)
    }

    /// Like [`get_metric`](Self::get_metric), creating new instances with `M::default()`.
    pub fn get_default_metric<M>(&self, name: &str, tags: Tags) -> Result<Arc<M>, Error>
    where
        M: BosunMetric + Default,
    {
        self.get_metric(name, tags, M::default)
    }

    /// All registered metric instances, in registration order.
    pub fn metrics(&self) -> Vec<Arc<RegisteredMetric>> {
        self.registry.metrics()
    }

    /// Takes a snapshot right away and queues the samples.
    pub fn snapshot(&self) -> Result<(), Error> {
        self.snapshotter.tick()
    }

    /// Runs one flush tick right away.
    ///
    /// This is a no-op while another flush is in progress or while backing off
    /// after a failed post.
    pub fn flush(&self) -> Result<(), Error> {
        self.flusher.tick()
    }

    /// The number of samples waiting to be sent.
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Stops the background tickers.
    ///
    /// This waits for in-flight ticks to finish and then, unless disabled with
    /// `flush_on_shutdown`, posts the samples that are still queued. Called
    /// automatically on drop; calling it more than once has no effect.
    pub fn shutdown(&self) {
        if self.is_shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let tickers = std::mem::take(&mut *self.tickers.lock().unwrap());
        drop(tickers);

        if self.flush_on_shutdown && !self.queue.is_empty() {
            bosun_debug!("flushing {} samples before shutdown", self.queue.len());
            if let Err(err) = self.flusher.flush_remaining() {
                (self.exception_handler)(&err);
            }
        }
        bosun_debug!("metrics reporter shut down");
    }
}

impl Drop for MetricsReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for MetricsReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsReporter")
            .field("name_prefix", &self.name_prefix)
            .field("metrics", &self.registry.len())
            .field("pending", &self.queue.len())
            .field("is_shut_down", &self.is_shut_down.load(Ordering::Relaxed))
            .finish()
    }
}
