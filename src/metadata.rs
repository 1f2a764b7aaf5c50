//! Metric metadata descriptors.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::registry::{RegisteredMetric, Registry};
use crate::tags::TagMap;
use crate::transmitter::{Delivery, Transmitter};
use crate::Error;

/// A single metadata descriptor as accepted by `/api/metadata/put`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetaData {
    /// The full series name.
    pub metric: String,
    /// The metadata key, e.g. `rate`, `desc` or `unit`.
    pub name: String,
    /// The metadata value.
    pub value: String,
    /// Tags restricting the descriptor, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagMap>,
}

impl MetaData {
    /// Creates an untagged descriptor.
    pub fn new(metric: &str, name: &str, value: &str) -> Self {
        Self {
            metric: metric.to_owned(),
            name: name.to_owned(),
            value: value.to_owned(),
            tags: None,
        }
    }
}

/// Gathers one set of descriptors per distinct registered name.
///
/// The first instance registered under a name provides the descriptors;
/// further instances with other tag sets are skipped.
pub(crate) fn gather(metrics: &[Arc<RegisteredMetric>]) -> Vec<MetaData> {
    let mut seen = HashSet::new();
    let mut rv = Vec::new();
    for metric in metrics {
        if !seen.insert(metric.name()) {
            continue;
        }
        rv.extend(metric.metadata());
    }
    rv
}

/// Posts metadata for all registered metrics on each tick.
#[derive(Debug)]
pub(crate) struct MetadataReporter {
    registry: Arc<Registry>,
    transmitter: Arc<Transmitter>,
    throw_on_post_fail: bool,
}

impl MetadataReporter {
    pub fn new(registry: Arc<Registry>, transmitter: Arc<Transmitter>, throw_on_post_fail: bool) -> Self {
        Self {
            registry,
            transmitter,
            throw_on_post_fail,
        }
    }

    pub fn tick(&self) -> Result<(), Error> {
        bosun_debug!("gathering metadata");
        let metadata = gather(&self.registry.metrics());
        match self.transmitter.post_metadata(&metadata) {
            Ok(Delivery::Sent) => {
                bosun_debug!("sent {} metadata entries", metadata.len());
                Ok(())
            }
            Ok(Delivery::NoDestination) => {
                bosun_debug!("no api url configured, not sending metadata");
                Ok(())
            }
            Err(err) if self.throw_on_post_fail => Err(err),
            Err(err) => {
                bosun_debug!("posting metadata failed: {}", err);
                Ok(())
            }
        }
    }
}
