//! Time-based expiry.
//!
//! A cache runs at most one expiry policy:
//!
//! | Policy | Refreshed on |
//! |--------|--------------|
//! | [`ExpiryPolicy::AfterAccess`] | every read and write |
//! | [`ExpiryPolicy::AfterWrite`] | writes only |
//! | [`ExpiryPolicy::Custom`] | whatever the [`Expiry`] calculator returns per event |
//!
//! Timestamps come from an injectable [`Clock`]. [`SystemClock`] reads a
//! monotonic `Instant`; [`ManualClock`] only moves when told to, which lets
//! tests step past a deadline without sleeping.
//!
//! ```
//! use concurrent_lfu::expiry::{Clock, ManualClock};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now(), Duration::from_secs(5));
//! ```

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timestamp meaning "never expires".
pub(crate) const NEVER: u64 = u64::MAX;

/// Source of the logical time used for expiry decisions.
///
/// `now` returns the time elapsed since an arbitrary fixed origin and must be
/// monotonic.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time relative to the clock's origin.
    fn now(&self) -> Duration;
}

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is the moment of construction.
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only advances when [`ManualClock::advance`] is called.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(to_nanos(by), Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

/// Per-entry expiry calculator.
///
/// Each method returns how long the entry should live from now. `current`
/// is the time the entry had left before the event.
pub trait Expiry<K, V>: Send + Sync {
    /// Lifetime of a newly created entry.
    fn expire_after_create(&self, key: &K, value: &V) -> Duration;

    /// Lifetime after a read. Defaults to leaving the deadline unchanged.
    fn expire_after_read(&self, _key: &K, _value: &V, current: Duration) -> Duration {
        current
    }

    /// Lifetime after the value is replaced. Defaults to leaving the
    /// deadline unchanged.
    fn expire_after_update(&self, _key: &K, _value: &V, current: Duration) -> Duration {
        current
    }
}

/// Expiry policy selected at construction.
pub enum ExpiryPolicy<K, V> {
    /// Entries expire `ttl` after their last read or write.
    AfterAccess(Duration),
    /// Entries expire `ttl` after they were last written.
    AfterWrite(Duration),
    /// Lifetimes come from a caller-supplied calculator.
    Custom(Arc<dyn Expiry<K, V>>),
}

impl<K, V> Clone for ExpiryPolicy<K, V> {
    fn clone(&self) -> Self {
        match self {
            ExpiryPolicy::AfterAccess(ttl) => ExpiryPolicy::AfterAccess(*ttl),
            ExpiryPolicy::AfterWrite(ttl) => ExpiryPolicy::AfterWrite(*ttl),
            ExpiryPolicy::Custom(calc) => ExpiryPolicy::Custom(Arc::clone(calc)),
        }
    }
}

impl<K, V> fmt::Debug for ExpiryPolicy<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryPolicy::AfterAccess(ttl) => f.debug_tuple("AfterAccess").field(ttl).finish(),
            ExpiryPolicy::AfterWrite(ttl) => f.debug_tuple("AfterWrite").field(ttl).finish(),
            ExpiryPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl<K, V> ExpiryPolicy<K, V> {
    /// The fixed time-to-live, if the policy has one.
    pub fn time_to_live(&self) -> Option<Duration> {
        match self {
            ExpiryPolicy::AfterAccess(ttl) | ExpiryPolicy::AfterWrite(ttl) => Some(*ttl),
            ExpiryPolicy::Custom(_) => None,
        }
    }

    /// Deadline for a freshly inserted entry.
    pub(crate) fn on_create(&self, key: &K, value: &V, now: u64) -> u64 {
        let ttl = match self {
            ExpiryPolicy::AfterAccess(ttl) | ExpiryPolicy::AfterWrite(ttl) => *ttl,
            ExpiryPolicy::Custom(calc) => calc.expire_after_create(key, value),
        };
        deadline(now, ttl)
    }

    /// Deadline after a read hit, given the entry's current deadline.
    pub(crate) fn on_read(&self, key: &K, value: &V, now: u64, current: u64) -> u64 {
        match self {
            ExpiryPolicy::AfterAccess(ttl) => deadline(now, *ttl),
            ExpiryPolicy::AfterWrite(_) => current,
            ExpiryPolicy::Custom(calc) => {
                let left = remaining(now, current);
                deadline(now, calc.expire_after_read(key, value, left))
            }
        }
    }

    /// Deadline after the value was replaced.
    pub(crate) fn on_update(&self, key: &K, value: &V, now: u64, current: u64) -> u64 {
        match self {
            ExpiryPolicy::AfterAccess(ttl) | ExpiryPolicy::AfterWrite(ttl) => deadline(now, *ttl),
            ExpiryPolicy::Custom(calc) => {
                let left = remaining(now, current);
                deadline(now, calc.expire_after_update(key, value, left))
            }
        }
    }
}

/// Converts a duration to saturating nanoseconds.
#[inline]
pub(crate) fn to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[inline]
fn deadline(now: u64, ttl: Duration) -> u64 {
    now.saturating_add(to_nanos(ttl))
}

#[inline]
fn remaining(now: u64, deadline: u64) -> Duration {
    Duration::from_nanos(deadline.saturating_sub(now))
}

/// An entry is expired once its deadline is at or before `now`.
#[inline]
pub(crate) fn is_expired(deadline: u64, now: u64) -> bool {
    deadline <= now
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PerKey;

    impl Expiry<u32, u32> for PerKey {
        fn expire_after_create(&self, key: &u32, _value: &u32) -> Duration {
            Duration::from_secs(u64::from(*key))
        }

        fn expire_after_read(&self, _key: &u32, _value: &u32, current: Duration) -> Duration {
            current + Duration::from_secs(1)
        }
    }

    const SEC: u64 = 1_000_000_000;

    #[test]
    fn test_after_access_refreshes_on_read_and_write() {
        let policy: ExpiryPolicy<u32, u32> = ExpiryPolicy::AfterAccess(Duration::from_secs(10));
        assert_eq!(policy.on_create(&1, &1, 0), 10 * SEC);
        assert_eq!(policy.on_read(&1, &1, 5 * SEC, 10 * SEC), 15 * SEC);
        assert_eq!(policy.on_update(&1, &1, 6 * SEC, 15 * SEC), 16 * SEC);
    }

    #[test]
    fn test_after_write_ignores_reads() {
        let policy: ExpiryPolicy<u32, u32> = ExpiryPolicy::AfterWrite(Duration::from_secs(10));
        assert_eq!(policy.on_read(&1, &1, 5 * SEC, 10 * SEC), 10 * SEC);
        assert_eq!(policy.on_update(&1, &1, 5 * SEC, 10 * SEC), 15 * SEC);
        assert_eq!(policy.time_to_live(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_custom_calculator() {
        let policy: ExpiryPolicy<u32, u32> = ExpiryPolicy::Custom(Arc::new(PerKey));
        assert_eq!(policy.on_create(&3, &0, 0), 3 * SEC);
        // 2s left + 1s granted by the calculator
        assert_eq!(policy.on_read(&3, &0, SEC, 3 * SEC), 4 * SEC);
        // default update keeps the remaining time
        assert_eq!(policy.on_update(&3, &0, SEC, 3 * SEC), 3 * SEC);
        assert_eq!(policy.time_to_live(), None);
    }

    #[test]
    fn test_deadline_saturates() {
        let policy: ExpiryPolicy<u32, u32> = ExpiryPolicy::AfterWrite(Duration::MAX);
        assert_eq!(policy.on_create(&1, &1, 5), NEVER);
        assert!(!is_expired(NEVER, u64::MAX - 1));
        assert!(is_expired(10, 10));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(1500));
    }
}
