//! This crate collects application metrics and ships them to a [Bosun]
//! (OpenTSDB compatible) ingestion API.
//!
//! # Core Concepts
//!
//! The [`MetricsReporter`] owns all metric instances. Application code asks
//! it for a metric by name and tags and records values on the returned
//! instance. Every metric type implements [`BosunMetric`], which tells the
//! reporter which series it emits and how to serialize its current value.
//!
//! In the background the reporter runs three tickers:
//!
//! - the snapshot ticker serializes every metric into the pending queue,
//! - the flush ticker posts the queued samples in batches to `/api/put`,
//! - the metadata ticker posts type and description metadata to
//!   `/api/metadata/put`.
//!
//! Failed posts are retried after a short backoff. Errors raised on the
//! tickers are passed to the exception handler given to [`ReporterOptions::new`].
//!
//! ```
//! use std::sync::Arc;
//! use bosun_metrics::metrics::{AggregateGauge, Counter};
//! use bosun_metrics::{MetricsReporter, ReporterOptions, Tags};
//!
//! let mut options = ReporterOptions::new(Arc::new(|err| eprintln!("metrics: {err}")));
//! options.name_prefix = "shop.".into();
//! options.default_tags.insert("host".into(), "web01".into());
//! # options.transport = Some(Arc::new(bosun_metrics::test::TestTransport::new()));
//!
//! let reporter = MetricsReporter::new(options).unwrap();
//! let orders = reporter
//!     .get_default_metric::<Counter>("orders", Tags::new().with_tag("region", "eu"))
//!     .unwrap();
//! let latency = reporter
//!     .get_default_metric::<AggregateGauge>("checkout.latency", Tags::new())
//!     .unwrap();
//!
//! orders.increment();
//! latency.record(12.5);
//! ```
//!
//! # Features
//!
//! - `transport`: enables the default [`ReqwestHttpTransport`] with native TLS.
//!   (*enabled by default*)
//! - `rustls`: uses `rustls` instead of native TLS for the reqwest transport.
//!
//! [Bosun]: https://bosun.org/
//! [`ReqwestHttpTransport`]: transports/struct.ReqwestHttpTransport.html

#![cfg_attr(doc_cfg, feature(doc_cfg))]
#![warn(missing_docs)]

// macros; these need to be first to be used by other modules
#[macro_use]
mod macros;

mod error;
mod flusher;
mod metadata;
mod metric;
mod options;
mod queue;
mod registry;
mod reporter;
mod snapshot;
mod tags;
mod ticker;
mod transmitter;
mod transport;

pub mod metrics;
pub mod transports;
pub mod validation;

// public api or exports from this crate
pub use crate::error::{Error, ExceptionHandler, TransmissionError, TransportError};
pub use crate::metadata::MetaData;
pub use crate::metric::{BosunMetric, MetricType, SampleValue, SampleWriter};
pub use crate::options::{ReporterOptions, TokenResolver, UrlResolver, USER_AGENT};
pub use crate::registry::RegisteredMetric;
pub use crate::reporter::MetricsReporter;
pub use crate::tags::{PropertyToTagName, TagMap, TagSet, TagValueConverter, Tags};
pub use crate::transport::{ApiRequest, ApiResponse, Transport, TransportFactory};
