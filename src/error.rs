//! Registration errors.

/// Error returned by [`PoolCollector::try_register`](crate::collector::PoolCollector::try_register).
///
/// The registry is left untouched whenever an error is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// The pool handle is already registered with this collector.
    #[error("duplicate register: pool is already registered with label values {0:?}")]
    Duplicate(Vec<String>),
    /// The number of label values does not match the configured label names.
    #[error("expected {expected} label values, got {actual}")]
    LabelCount {
        /// Number of configured label names.
        expected: usize,
        /// Number of label values passed.
        actual: usize,
    },
    /// The collector is bound to a single pool.
    #[error("collector is bound to a single pool and does not accept registrations")]
    Fixed,
}
