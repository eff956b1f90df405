//! Connection pool collector implementation.
//!
//! See [`PoolCollector`] for details.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, MetricEncoder, NoLabelSet};
use tracing::{debug, error, trace};

use crate::descriptor::{Descriptor, Descriptors, Kind, Options, ValueType};
use crate::error::RegisterError;
use crate::stats::{pool_id, PoolStats, StatsSource};

/// A [`Collector`] exposing the statistics of one or more connection pools.
///
/// Each registered pool is tagged with its own label values. On every scrape
/// the statistics of each pool are read exactly once and turned into eight
/// samples, see [`Kind`].
///
/// [`PoolCollector`] is a cheap handle on shared state. Register a clone with
/// a [`Registry`](prometheus_client::registry::Registry) and keep another one
/// around to register pools discovered at runtime.
///
/// ```
/// # use db_pool_collector::collector::PoolCollector;
/// # use db_pool_collector::descriptor::Options;
/// # use db_pool_collector::stats::PoolStats;
/// # use prometheus_client::encoding::text::encode;
/// # use prometheus_client::registry::Registry;
/// # use std::sync::Arc;
/// #
/// let collector = PoolCollector::new(Options::new("db_").with_labels(["service"]));
///
/// let mut registry = Registry::default();
/// registry.register_collector(Box::new(collector.clone()));
///
/// let orders = Arc::new(|| PoolStats {
///     max_open_connections: 10,
///     ..Default::default()
/// });
/// collector.register(orders, ["orders"]);
///
/// let mut buffer = String::new();
/// encode(&mut buffer, &registry).unwrap();
/// assert!(buffer.contains("db_connections_max{service=\"orders\"} 10.0\n"));
/// ```
#[derive(Clone, Debug)]
pub struct PoolCollector {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    descriptors: Descriptors,
    fixed: bool,
    pools: RwLock<HashMap<usize, Registration>>,
}

#[derive(Clone)]
struct Registration {
    pool: Arc<dyn StatsSource>,
    label_values: Arc<[String]>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("label_values", &self.label_values)
            .finish_non_exhaustive()
    }
}

impl PoolCollector {
    /// Creates a collector without any pools.
    pub fn new(options: Options) -> Self {
        Self {
            inner: Arc::new(Inner {
                descriptors: Descriptors::new(&options),
                fixed: false,
                pools: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Creates a collector bound to exactly one pool.
    ///
    /// Further registrations are rejected with [`RegisterError::Fixed`].
    pub fn with_pool<P, I, L>(
        options: Options,
        pool: Arc<P>,
        label_values: I,
    ) -> Result<Self, RegisterError>
    where
        P: StatsSource,
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let descriptors = Descriptors::new(&options);
        let registration = Registration::new(&descriptors, pool.clone(), label_values)?;
        debug!(labels = ?registration.label_values, "bound collector to single pool");

        let mut pools = HashMap::with_capacity(1);
        pools.insert(pool_id(&pool), registration);

        Ok(Self {
            inner: Arc::new(Inner {
                descriptors,
                fixed: true,
                pools: RwLock::new(pools),
            }),
        })
    }

    /// Registers a pool with the given label values.
    ///
    /// The label values must match the configured label names in count and
    /// order. A pool can only be registered once per collector.
    pub fn try_register<P, I, L>(&self, pool: Arc<P>, label_values: I) -> Result<(), RegisterError>
    where
        P: StatsSource,
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        if self.inner.fixed {
            return Err(RegisterError::Fixed);
        }

        let id = pool_id(&pool);
        let registration = Registration::new(&self.inner.descriptors, pool, label_values)?;

        match self.inner.pools.write().entry(id) {
            Entry::Occupied(existing) => Err(RegisterError::Duplicate(
                existing.get().label_values.to_vec(),
            )),
            Entry::Vacant(entry) => {
                debug!(labels = ?registration.label_values, "registered pool");
                entry.insert(registration);
                Ok(())
            }
        }
    }

    /// Registers a pool with the given label values.
    ///
    /// # Panics
    ///
    /// Panics on any [`RegisterError`], most notably when the pool is already
    /// registered. The existing registration is kept.
    pub fn register<P, I, L>(&self, pool: Arc<P>, label_values: I)
    where
        P: StatsSource,
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        if let Err(e) = self.try_register(pool, label_values) {
            error!(error = %e, "failed to register pool");
            panic!("{e}");
        }
    }

    /// Removes a pool, returning whether it was registered.
    ///
    /// A collector bound to a single pool never removes it.
    pub fn unregister<P: StatsSource + ?Sized>(&self, pool: &Arc<P>) -> bool {
        if self.inner.fixed {
            return false;
        }

        match self.inner.pools.write().remove(&pool_id(pool)) {
            Some(registration) => {
                debug!(labels = ?registration.label_values, "unregistered pool");
                true
            }
            None => false,
        }
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.inner.pools.read().len()
    }

    /// Whether no pool is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.pools.read().is_empty()
    }

    /// The descriptors of all metrics this collector produces.
    pub fn descriptors(&self) -> &Descriptors {
        &self.inner.descriptors
    }

    /// Iterates the eight descriptors [`PoolCollector::collect`] emits samples
    /// for, independent of the registered pools.
    pub fn describe(&self) -> std::slice::Iter<'_, Descriptor> {
        self.inner.descriptors.iter()
    }

    /// Reads the statistics of every registered pool once and passes eight
    /// samples per pool to `emit`.
    ///
    /// The registry lock is released before any statistics are read, thus
    /// `emit` may register further pools. Those are picked up on the next
    /// call.
    pub fn collect<F>(&self, mut emit: F)
    where
        F: FnMut(Sample<'_>),
    {
        for (label_values, stats) in self.snapshot() {
            for descriptor in self.describe() {
                emit(Sample {
                    descriptor,
                    value: descriptor.kind().value(&stats),
                    label_values: &label_values,
                });
            }
        }
    }

    /// Copies the registry under the read lock, then reads each pool once.
    fn snapshot(&self) -> Vec<(Arc<[String]>, PoolStats)> {
        let registrations: Vec<Registration> = self.inner.pools.read().values().cloned().collect();
        trace!(pools = registrations.len(), "collecting pool statistics");

        registrations
            .into_iter()
            .map(|r| {
                let stats = r.pool.stats();
                (r.label_values, stats)
            })
            .collect()
    }
}

impl Registration {
    fn new<P, I, L>(
        descriptors: &Descriptors,
        pool: Arc<P>,
        label_values: I,
    ) -> Result<Self, RegisterError>
    where
        P: StatsSource,
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let label_values: Arc<[String]> = label_values.into_iter().map(Into::into).collect();

        let expected = descriptors.label_names().len();
        if label_values.len() != expected {
            return Err(RegisterError::LabelCount {
                expected,
                actual: label_values.len(),
            });
        }

        Ok(Self { pool, label_values })
    }
}

impl Collector for PoolCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
        // Every pool is read before the first family is written, so all
        // families of one scrape share the same snapshot.
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }

        let label_names = self.inner.descriptors.label_names();

        for descriptor in self.describe() {
            let mut metric_encoder = encoder.encode_descriptor(
                descriptor.family(),
                descriptor.help(),
                descriptor.unit(),
                descriptor.value_type().metric_type(),
            )?;

            for (label_values, stats) in &snapshot {
                let value = descriptor.kind().value(stats);

                if label_names.is_empty() {
                    encode_value(&mut metric_encoder, descriptor.value_type(), value)?;
                    continue;
                }

                let labels: Vec<(&str, &str)> = label_names
                    .iter()
                    .map(String::as_str)
                    .zip(label_values.iter().map(String::as_str))
                    .collect();
                let mut family_encoder = metric_encoder.encode_family(&labels)?;
                encode_value(&mut family_encoder, descriptor.value_type(), value)?;
            }
        }

        Ok(())
    }
}

fn encode_value(
    encoder: &mut MetricEncoder,
    value_type: ValueType,
    value: f64,
) -> Result<(), std::fmt::Error> {
    match value_type {
        ValueType::Gauge => encoder.encode_gauge(&value),
        ValueType::Counter => encoder.encode_counter::<NoLabelSet, _, f64>(&value, None),
    }
}

/// One value of one pool, produced by [`PoolCollector::collect`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample<'a> {
    descriptor: &'a Descriptor,
    value: f64,
    label_values: &'a [String],
}

impl<'a> Sample<'a> {
    /// The metric the sample belongs to.
    pub fn descriptor(&self) -> &'a Descriptor {
        self.descriptor
    }

    /// Full metric name.
    pub fn name(&self) -> &'a str {
        self.descriptor.name()
    }

    /// The statistic sampled.
    pub fn kind(&self) -> Kind {
        self.descriptor.kind()
    }

    /// Gauge or counter.
    pub fn value_type(&self) -> ValueType {
        self.descriptor.value_type()
    }

    /// The sampled value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label values of the pool, in the order of
    /// [`Descriptor::label_names`].
    pub fn label_values(&self) -> &'a [String] {
        self.label_values
    }
}

/// Formats the sample as an exposition line, e.g.
/// `db_connections_max{service="orders"} 10`.
impl fmt::Display for Sample<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;

        if !self.label_values.is_empty() {
            f.write_str("{")?;
            let labels = self.descriptor.label_names().iter().zip(self.label_values);
            for (i, (name, value)) in labels.enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{name}=\"")?;
                for c in value.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '"' => f.write_str("\\\"")?,
                        '\n' => f.write_str("\\n")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")?;
            }
            f.write_str("}")?;
        }

        write!(f, " {}", self.value)
    }
}
