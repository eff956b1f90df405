//! Connection pool statistics.
//!
//! See [`StatsSource`] for details.

use std::sync::Arc;
use std::time::Duration;

/// Point in time statistics of a database connection pool.
///
/// The counters ending in `_closed` as well as `wait_count` and
/// `wait_duration` are cumulative since the pool was created. The remaining
/// fields describe the current state of the pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum number of open connections to the database.
    pub max_open_connections: u64,
    /// Number of established connections, both in use and idle.
    pub open_connections: u64,
    /// Number of connections currently in use.
    pub in_use: u64,
    /// Number of idle connections.
    pub idle: u64,
    /// Total number of connections waited for.
    pub wait_count: u64,
    /// Total time blocked waiting for a new connection.
    pub wait_duration: Duration,
    /// Total number of connections closed due to the max idle limit.
    pub max_idle_closed: u64,
    /// Total number of connections closed due to the max lifetime limit.
    pub max_lifetime_closed: u64,
}

/// A handle to a connection pool able to report its [`PoolStats`].
///
/// Implementations are expected to read in-memory counters only. The
/// collector calls [`StatsSource::stats`] exactly once per pool on each scrape
/// and never caches the result.
///
/// Any `Fn() -> PoolStats` closure is a [`StatsSource`], which makes it easy
/// to adapt a pool type from another crate:
///
/// ```
/// # use db_pool_collector::stats::{PoolStats, StatsSource};
/// # use std::sync::Arc;
/// let source = Arc::new(|| PoolStats {
///     max_open_connections: 10,
///     ..Default::default()
/// });
///
/// assert_eq!(10, source.stats().max_open_connections);
/// ```
pub trait StatsSource: Send + Sync + 'static {
    /// Returns the current statistics of the pool.
    fn stats(&self) -> PoolStats;
}

impl<F> StatsSource for F
where
    F: Fn() -> PoolStats + Send + Sync + 'static,
{
    fn stats(&self) -> PoolStats {
        self()
    }
}

/// Identity of a pool handle, derived from the address of its shared
/// allocation.
pub(crate) fn pool_id<P: ?Sized>(pool: &Arc<P>) -> usize {
    Arc::as_ptr(pool) as *const () as usize
}
