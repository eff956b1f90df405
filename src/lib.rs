#![deny(dead_code)]
#![deny(missing_docs)]
#![deny(unused)]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]

//! Exposes the statistics of database connection pools as [Open
//! Metrics](https://github.com/OpenObservability/OpenMetrics), to be scraped by
//! monitoring systems like [Prometheus](https://prometheus.io/).
//!
//! A [`PoolCollector`](collector::PoolCollector) implements the
//! [`prometheus_client`] [`Collector`](prometheus_client::collector::Collector)
//! trait. On each scrape it reads the [`PoolStats`](stats::PoolStats) of every
//! registered pool once and reports eight metrics per pool, each tagged with
//! the label values the pool was registered with.
//!
//! # Examples
//!
//! ```
//! use db_pool_collector::collector::PoolCollector;
//! use db_pool_collector::descriptor::Options;
//! use db_pool_collector::stats::{PoolStats, StatsSource};
//! use prometheus_client::encoding::text::encode;
//! use prometheus_client::registry::Registry;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! // Any pool type able to report its statistics can be registered.
//! #[derive(Debug)]
//! struct Pool;
//!
//! impl StatsSource for Pool {
//!     fn stats(&self) -> PoolStats {
//!         PoolStats {
//!             max_open_connections: 10,
//!             open_connections: 3,
//!             in_use: 1,
//!             idle: 2,
//!             wait_count: 5,
//!             wait_duration: Duration::from_millis(1500),
//!             max_idle_closed: 0,
//!             max_lifetime_closed: 2,
//!         }
//!     }
//! }
//!
//! // Name every metric `db_*` and label each pool with the service using it.
//! let collector = PoolCollector::new(Options::new("db_").with_labels(["service"]));
//!
//! let mut registry = Registry::default();
//! registry.register_collector(Box::new(collector.clone()));
//!
//! // Pools can be registered at any time, also after the collector has been
//! // handed to the registry.
//! collector.register(Arc::new(Pool), ["orders"]);
//!
//! // Collect samples directly ...
//! let mut samples = Vec::new();
//! collector.collect(|sample| samples.push(sample.to_string()));
//! assert_eq!("db_connections_max{service=\"orders\"} 10", samples[0]);
//! assert_eq!(
//!     "db_connections_wait_duration_seconds_total{service=\"orders\"} 1.5",
//!     samples[5],
//! );
//!
//! // ... or encode the registry when Prometheus scrapes the process.
//! let mut buffer = String::new();
//! encode(&mut buffer, &registry).unwrap();
//! assert!(buffer.contains("db_connections_in_use{service=\"orders\"} 1.0\n"));
//! ```

pub mod collector;
pub mod descriptor;
pub mod error;
pub mod stats;

pub use collector::{PoolCollector, Sample};
pub use descriptor::Options;
pub use error::RegisterError;
pub use stats::{PoolStats, StatsSource};

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn options_from_config() {
        let options: Options =
            serde_json::from_str(r#"{"prefix": "db_", "labels": ["service", "shard"]}"#).unwrap();
        assert_eq!(
            Options::new("db_").with_labels(["service", "shard"]),
            options
        );

        let options: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(Options::default(), options);
    }
}
