//! Name claims and instance de-duplication.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::metadata::MetaData;
use crate::metric::{BosunMetric, SampleWriter};
use crate::tags::TagSet;
use crate::validation::is_valid_metric_name;
use crate::Error;

/// A metric instance together with the identity it was registered under.
pub struct RegisteredMetric {
    name: String,
    tags: TagSet,
    suffixes: &'static [&'static str],
    type_name: &'static str,
    metric: Arc<dyn BosunMetric>,
    any: Arc<dyn Any + Send + Sync>,
}

impl RegisteredMetric {
    /// The root name, including the configured prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved tags of this instance.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// The suffixes claimed by the metric type.
    pub fn suffixes(&self) -> &'static [&'static str] {
        self.suffixes
    }

    /// The Rust type name of the metric.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The metric instance.
    pub fn metric(&self) -> &dyn BosunMetric {
        &*self.metric
    }

    /// Appends the serialized samples of this instance to `out`.
    ///
    /// If the metric fails, none of its samples are kept.
    pub(crate) fn serialize(&self, timestamp: u64, out: &mut Vec<String>) -> Result<(), Error> {
        let mark = out.len();
        let mut writer = SampleWriter::new(&self.name, &self.tags, self.suffixes, timestamp, out);
        let rv = self.metric.serialize(&mut writer);
        if rv.is_err() {
            out.truncate(mark);
        }
        rv
    }

    pub(crate) fn metadata(&self) -> Vec<MetaData> {
        self.metric.metadata(&self.name, self.suffixes)
    }
}

impl fmt::Debug for RegisteredMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredMetric")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    // all root names mapped to the type that claimed them
    root_types: HashMap<String, (TypeId, &'static str)>,
    // every root and suffixed name mapped to its root, to detect suffix collisions
    name_to_root: HashMap<String, String>,
    // root name + canonical tags, to de-duplicate instances
    instances: HashMap<String, Arc<RegisteredMetric>>,
    // instances in registration order
    ordered: Vec<Arc<RegisteredMetric>>,
}

/// Owns every metric instance and enforces globally unique naming.
///
/// All three mappings are guarded by a single lock. Registration validates
/// every claim before committing any of them, so a failed registration never
/// leaves partial state behind.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the instance registered under `name` and `tags`, creating it
    /// with `factory` if it does not exist yet.
    ///
    /// The factory runs without holding the lock, so it may register other
    /// metrics. All claims are checked again before the new instance is
    /// committed; if another thread created the same instance in the
    /// meantime, that one is returned and the new one discarded.
    pub fn register<M, F>(&self, name: String, tags: TagSet, factory: F) -> Result<Arc<M>, Error>
    where
        M: BosunMetric,
        F: FnOnce() -> M,
    {
        if !is_valid_metric_name(&name) {
            return Err(Error::InvalidName { name });
        }
        let key = format!("{name}{}", tags.canonical());

        let lookup = self.state.lock().unwrap().lookup::<M>(&name, &key)?;
        if let Lookup::Existing(existing) = lookup {
            return Ok(existing);
        }

        let metric = Arc::new(factory());

        let mut state = self.state.lock().unwrap();
        let mut claims = match state.lookup::<M>(&name, &key)? {
            Lookup::Existing(existing) => return Ok(existing),
            Lookup::Vacant(claims) => claims,
        };

        let type_name = std::any::type_name::<M>();
        let entry = Arc::new(RegisteredMetric {
            name: name.clone(),
            tags,
            suffixes: M::suffixes(),
            type_name,
            metric: metric.clone(),
            any: metric.clone(),
        });

        claims.push(name.clone());
        for claim in claims {
            state.name_to_root.insert(claim, name.clone());
        }
        state
            .root_types
            .insert(name, (TypeId::of::<M>(), type_name));
        state.instances.insert(key, entry.clone());
        state.ordered.push(entry);

        Ok(metric)
    }

    /// A snapshot of all registered instances, in registration order.
    pub fn metrics(&self) -> Vec<Arc<RegisteredMetric>> {
        self.state.lock().unwrap().ordered.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().ordered.len()
    }
}

enum Lookup<M> {
    Existing(Arc<M>),
    // the suffixed names to claim
    Vacant(Vec<String>),
}

impl RegistryState {
    /// Checks every claim `M` would make under `name` without committing any.
    fn lookup<M: BosunMetric>(&self, name: &str, key: &str) -> Result<Lookup<M>, Error> {
        let type_id = TypeId::of::<M>();
        let type_name = std::any::type_name::<M>();

        if let Some(&(existing_id, existing)) = self.root_types.get(name) {
            if existing_id != type_id {
                return Err(Error::NameConflict {
                    name: name.to_owned(),
                    existing,
                    requested: type_name,
                });
            }
        } else if let Some(root) = self.name_to_root.get(name) {
            return Err(self.suffix_conflict(name.to_owned(), root, type_name));
        }

        let suffixes = M::suffixes();
        let mut claims = Vec::with_capacity(suffixes.len() + 1);
        for suffix in suffixes {
            let suffixed = format!("{name}{suffix}");
            if !is_valid_metric_name(&suffixed) {
                return Err(Error::InvalidName { name: suffixed });
            }
            if let Some(root) = self.name_to_root.get(&suffixed) {
                if root != name {
                    return Err(self.suffix_conflict(suffixed, root, type_name));
                }
            }
            claims.push(suffixed);
        }

        match self.instances.get(key) {
            Some(existing) => existing
                .any
                .clone()
                .downcast::<M>()
                .map(Lookup::Existing)
                .map_err(|_| Error::NameConflict {
                    name: name.to_owned(),
                    existing: existing.type_name,
                    requested: type_name,
                }),
            None => Ok(Lookup::Vacant(claims)),
        }
    }

    fn suffix_conflict(&self, name: String, root: &str, requested: &'static str) -> Error {
        Error::SuffixConflict {
            name,
            root: root.to_owned(),
            existing: self.root_types.get(root).map_or("unknown", |&(_, n)| n),
            requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{AggregateGauge, Counter, SamplingGauge};
    use crate::tags::{TagMap, TagResolver, Tags};

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        TagResolver::new(None, None, &TagMap::new())
            .unwrap()
            .resolve(&pairs.iter().copied().collect::<Tags>(), true)
            .unwrap()
    }

    #[test]
    fn test_idempotent_registration() {
        let registry = Registry::new();
        let a = registry
            .register("app.requests".into(), tags(&[("route", "home")]), Counter::new)
            .unwrap();
        let b = registry
            .register("app.requests".into(), tags(&[("route", "home")]), || -> Counter {
                panic!("factory must not run for an existing instance")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = registry
            .register("app.requests".into(), tags(&[("route", "about")]), Counter::new)
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_name_conflict() {
        let registry = Registry::new();
        registry
            .register("app.latency".into(), tags(&[]), Counter::new)
            .unwrap();
        let err = registry
            .register("app.latency".into(), tags(&[("a", "b")]), AggregateGauge::new)
            .unwrap_err();
        assert!(matches!(err, Error::NameConflict { ref name, .. } if name == "app.latency"));

        // the aggregate suffixes were never claimed
        registry
            .register("app.latency.max".into(), tags(&[]), SamplingGauge::new)
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_suffix_conflict_leaves_no_partial_claims() {
        let registry = Registry::new();
        registry
            .register("app.latency.max".into(), tags(&[]), Counter::new)
            .unwrap();

        // ".avg" and ".min" are checked before ".max" fails
        let err = registry
            .register("app.latency".into(), tags(&[]), AggregateGauge::new)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SuffixConflict { ref name, ref root, .. }
                if name == "app.latency.max" && root == "app.latency.max"
        ));

        registry
            .register("app.latency.min".into(), tags(&[]), Counter::new)
            .unwrap();
        registry
            .register("app.latency".into(), tags(&[]), Counter::new)
            .unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_root_inside_other_suffix() {
        let registry = Registry::new();
        registry
            .register("app.latency".into(), tags(&[]), AggregateGauge::new)
            .unwrap();
        let err = registry
            .register("app.latency.count".into(), tags(&[]), Counter::new)
            .unwrap_err();
        assert!(matches!(err, Error::SuffixConflict { ref root, .. } if root == "app.latency"));

        // the same type may add more tag sets under its own root
        registry
            .register("app.latency".into(), tags(&[("host", "b")]), AggregateGauge::new)
            .unwrap();
    }

    struct Composite {
        inner: Arc<Counter>,
    }

    impl BosunMetric for Composite {
        fn metric_type(&self) -> crate::MetricType {
            crate::MetricType::Counter
        }

        fn serialize(&self, writer: &mut SampleWriter<'_>) -> Result<(), Error> {
            writer.write("", self.inner.value())
        }
    }

    #[test]
    fn test_factory_may_register_metrics() {
        let registry = Registry::new();
        let outer = registry
            .register("app.outer".into(), tags(&[]), || Composite {
                inner: registry
                    .register("app.inner".into(), tags(&[]), Counter::new)
                    .unwrap(),
            })
            .unwrap();
        outer.inner.increment();

        let names: Vec<_> = registry
            .metrics()
            .iter()
            .map(|m| m.name().to_owned())
            .collect();
        assert_eq!(names, ["app.inner", "app.outer"]);
    }

    #[test]
    fn test_claims_rechecked_after_factory() {
        let registry = Registry::new();
        // the suffix is claimed while the factory runs
        let err = registry
            .register("app.latency".into(), tags(&[]), || {
                registry
                    .register("app.latency.max".into(), tags(&[]), Counter::new)
                    .unwrap();
                AggregateGauge::new()
            })
            .unwrap_err();
        assert!(matches!(err, Error::SuffixConflict { ref name, .. } if name == "app.latency.max"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_name() {
        let registry = Registry::new();
        let err = registry
            .register(".app".into(), tags(&[]), Counter::new)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidName { .. }));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_concurrent_registration_resolves_to_one_instance() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .register("app.shared".into(), tags(&[("k", "v")]), Counter::new)
                        .unwrap()
                })
            })
            .collect();
        let metrics: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(metrics.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
