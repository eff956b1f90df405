//! Metric descriptors of the connection pool statistics.
//!
//! See [`Descriptors`] for details.

use std::sync::Arc;

use prometheus_client::metrics::MetricType;
use prometheus_client::registry::Unit;

use crate::stats::PoolStats;

static SECONDS: Unit = Unit::Seconds;

/// Configuration of a [`PoolCollector`](crate::collector::PoolCollector).
///
/// The prefix is prepended verbatim to every metric name, thus it usually
/// ends with an underscore, e.g. `db_`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Prefix of every metric name.
    pub prefix: String,
    /// Names of the labels attached to the metrics of each pool.
    pub labels: Vec<String>,
}

impl Options {
    /// Creates [`Options`] with the given prefix and no labels.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            labels: Vec::new(),
        }
    }

    /// Sets the label names.
    pub fn with_labels<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Whether a metric reports the current state or a cumulative total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Current state, may go up and down.
    Gauge,
    /// Cumulative total, never decreases.
    Counter,
}

impl ValueType {
    /// The OpenMetrics type of the value.
    pub fn metric_type(self) -> MetricType {
        match self {
            ValueType::Gauge => MetricType::Gauge,
            ValueType::Counter => MetricType::Counter,
        }
    }
}

/// The statistics exported for every pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Maximum number of open connections.
    MaxOpenConnections,
    /// Open connections, in use and idle.
    OpenConnections,
    /// Connections in use.
    InUse,
    /// Idle connections.
    Idle,
    /// Connections waited for.
    WaitCount,
    /// Time spent waiting for a connection.
    WaitDuration,
    /// Connections closed due to the max idle limit.
    MaxIdleClosed,
    /// Connections closed due to the max lifetime limit.
    MaxLifetimeClosed,
}

impl Kind {
    /// All kinds in exposition order.
    pub const ALL: [Kind; 8] = [
        Kind::MaxOpenConnections,
        Kind::OpenConnections,
        Kind::InUse,
        Kind::Idle,
        Kind::WaitCount,
        Kind::WaitDuration,
        Kind::MaxIdleClosed,
        Kind::MaxLifetimeClosed,
    ];

    /// Name of the metric without prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            Kind::MaxOpenConnections => "connections_max",
            Kind::OpenConnections => "connections_open",
            Kind::InUse => "connections_in_use",
            Kind::Idle => "connections_idle",
            Kind::WaitCount => "connections_wait_count_total",
            Kind::WaitDuration => "connections_wait_duration_seconds_total",
            Kind::MaxIdleClosed => "connections_max_idle_closed_total",
            Kind::MaxLifetimeClosed => "connections_max_lifetime_closed_total",
        }
    }

    /// Help text of the metric.
    pub fn help(self) -> &'static str {
        match self {
            Kind::MaxOpenConnections => "Max number of open connections to the DB",
            Kind::OpenConnections => {
                "Current number of established connections both in use and idle"
            }
            Kind::InUse => "The number of connections currently in use",
            Kind::Idle => "The number of idle connections",
            Kind::WaitCount => "The total number of connections waited for",
            Kind::WaitDuration => "The total time blocked waiting for a new connection in seconds",
            Kind::MaxIdleClosed => {
                "The total number of connections closed due to the max idle limit"
            }
            Kind::MaxLifetimeClosed => {
                "The total number of connections closed due to the max lifetime limit"
            }
        }
    }

    /// Whether the metric is a gauge or a counter.
    pub fn value_type(self) -> ValueType {
        match self {
            Kind::MaxOpenConnections | Kind::OpenConnections | Kind::InUse | Kind::Idle => {
                ValueType::Gauge
            }
            Kind::WaitCount | Kind::WaitDuration | Kind::MaxIdleClosed | Kind::MaxLifetimeClosed => {
                ValueType::Counter
            }
        }
    }

    /// Unit of the metric, if any.
    pub fn unit(self) -> Option<&'static Unit> {
        match self {
            Kind::WaitDuration => Some(&SECONDS),
            _ => None,
        }
    }

    /// Reads the value of this kind from the given snapshot.
    ///
    /// Integers are widened to `f64`, durations are converted to seconds.
    pub fn value(self, stats: &PoolStats) -> f64 {
        match self {
            Kind::MaxOpenConnections => stats.max_open_connections as f64,
            Kind::OpenConnections => stats.open_connections as f64,
            Kind::InUse => stats.in_use as f64,
            Kind::Idle => stats.idle as f64,
            Kind::WaitCount => stats.wait_count as f64,
            Kind::WaitDuration => stats.wait_duration.as_secs_f64(),
            Kind::MaxIdleClosed => stats.max_idle_closed as f64,
            Kind::MaxLifetimeClosed => stats.max_lifetime_closed as f64,
        }
    }
}

/// Static description of one metric: name, help text and label names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    kind: Kind,
    name: String,
    family: String,
    label_names: Arc<[String]>,
}

impl Descriptor {
    fn new(kind: Kind, prefix: &str, label_names: Arc<[String]>) -> Self {
        let name = format!("{prefix}{}", kind.suffix());

        // The OpenMetrics encoder appends the unit and the `_total` suffix on
        // its own, thus they are stripped from the family name.
        let mut family = name.as_str();
        if kind.value_type() == ValueType::Counter {
            family = family.strip_suffix("_total").unwrap_or(family);
        }
        if let Some(unit) = kind.unit() {
            family = family
                .strip_suffix(unit.as_str())
                .and_then(|f| f.strip_suffix('_'))
                .unwrap_or(family);
        }
        let family = family.to_owned();

        Self {
            kind,
            name,
            family,
            label_names,
        }
    }

    /// The statistic described.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Full metric name, including prefix and suffixes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metric family name as handed to the OpenMetrics encoder, i.e. without
    /// unit and `_total` suffix.
    pub(crate) fn family(&self) -> &str {
        &self.family
    }

    /// Help text.
    pub fn help(&self) -> &'static str {
        self.kind.help()
    }

    /// Gauge or counter.
    pub fn value_type(&self) -> ValueType {
        self.kind.value_type()
    }

    /// Unit of the metric, if any.
    pub fn unit(&self) -> Option<&'static Unit> {
        self.kind.unit()
    }

    /// Ordered label names.
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

/// The set of eight descriptors, one per [`Kind`], built from [`Options`].
///
/// ```
/// # use db_pool_collector::descriptor::{Descriptors, Options};
/// let descriptors = Descriptors::new(&Options::new("db_").with_labels(["service"]));
///
/// let names: Vec<_> = descriptors.iter().map(|d| d.name()).collect();
/// assert_eq!(8, names.len());
/// assert_eq!("db_connections_max", names[0]);
/// assert_eq!("db_connections_wait_duration_seconds_total", names[5]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptors {
    descriptors: [Descriptor; 8],
}

impl Descriptors {
    /// Builds the descriptors for the given configuration.
    pub fn new(options: &Options) -> Self {
        let label_names: Arc<[String]> = options.labels.clone().into();
        let descriptors =
            Kind::ALL.map(|kind| Descriptor::new(kind, &options.prefix, label_names.clone()));

        Self { descriptors }
    }

    /// Iterates the descriptors in exposition order.
    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.descriptors.iter()
    }

    /// The descriptor of the given kind.
    pub fn get(&self, kind: Kind) -> &Descriptor {
        // Discriminants match the order of `Kind::ALL`.
        &self.descriptors[kind as usize]
    }

    /// Ordered label names shared by all descriptors.
    pub fn label_names(&self) -> &[String] {
        self.descriptors[0].label_names()
    }

    /// Number of descriptors, always eight.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl<'a> IntoIterator for &'a Descriptors {
    type Item = &'a Descriptor;
    type IntoIter = std::slice::Iter<'a, Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
