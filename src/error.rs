//! Configuration errors.
//!
//! Every constructor that accepts user-supplied configuration validates it
//! eagerly and returns a [`ConfigError`] before any cache instance exists.
//!
//! ```
//! use concurrent_lfu::config::ConcurrentLfuCacheConfig;
//! use concurrent_lfu::error::ConfigError;
//! use concurrent_lfu::ConcurrentLfuCache;
//!
//! let err = ConcurrentLfuCache::<u32, u32>::from_config(ConcurrentLfuCacheConfig::new(1))
//!     .unwrap_err();
//! assert!(matches!(err, ConfigError::CapacityTooSmall { .. }));
//! ```

use thiserror::Error;

/// Error returned when cache configuration parameters are invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The capacity cannot hold one window slot and one probation slot.
    #[error("capacity {capacity} is below the minimum of {minimum}")]
    CapacityTooSmall {
        /// Requested capacity.
        capacity: usize,
        /// Smallest accepted capacity.
        minimum: usize,
    },

    /// The concurrency level must be at least 1.
    #[error("concurrency level must be greater than zero")]
    InvalidConcurrencyLevel,

    /// A segment proportion fell outside the open interval (0, 1).
    #[error("{name} proportion {value} must be in the open interval (0, 1)")]
    InvalidProportion {
        /// Which proportion was rejected.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// More than one expiry policy was configured.
    #[error("at most one of expire-after-access, expire-after-write and expire-after may be set")]
    ConflictingExpiry,

    /// A scoped cache cannot use a custom expiry calculator.
    #[error("a scoped cache supports expire-after-access and expire-after-write only")]
    ScopedCustomExpiry,
}
