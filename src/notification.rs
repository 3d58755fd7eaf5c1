//! Removal notifications.
//!
//! A listener registered through
//! [`ConcurrentLfuCacheConfig::with_removal_listener`](crate::config::ConcurrentLfuCacheConfig::with_removal_listener)
//! is told, exactly once, when a node's life ends and why. Replacing a value
//! in place also reports the displaced value with [`RemovalCause::Replaced`].
//!
//! A panicking listener is caught and logged. It never aborts a drain or
//! disturbs bookkeeping for other keys.

use core::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// Dropped by the eviction policy to stay within capacity.
    Evicted,
    /// Removed by an explicit `remove` or `clear`.
    Removed,
    /// The value was overwritten by a newer one for the same key.
    Replaced,
    /// The entry outlived its expiry deadline.
    Expired,
}

impl RemovalCause {
    /// `true` when the cache itself chose to drop the entry.
    pub fn was_evicted(self) -> bool {
        matches!(self, RemovalCause::Evicted | RemovalCause::Expired)
    }
}

impl fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemovalCause::Evicted => "evicted",
            RemovalCause::Removed => "removed",
            RemovalCause::Replaced => "replaced",
            RemovalCause::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Callback invoked with the key, the departing value and the cause.
pub type RemovalListener<K, V> = Arc<dyn Fn(&K, &V, RemovalCause) + Send + Sync>;

/// Invokes `listener`, containing any panic it raises.
pub(crate) fn notify<K, V>(listener: &RemovalListener<K, V>, key: &K, value: &V, cause: RemovalCause) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| listener(key, value, cause)));
    if result.is_err() {
        log::warn!("removal listener panicked while handling a {cause} entry; continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_listener_receives_cause() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let listener: RemovalListener<u32, u32> = Arc::new(move |k, v, cause| {
            assert_eq!((*k, *v), (1, 10));
            assert_eq!(cause, RemovalCause::Expired);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        notify(&listener, &1, &10, RemovalCause::Expired);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let listener: RemovalListener<u32, u32> = Arc::new(|_, _, _| panic!("listener failure"));
        notify(&listener, &1, &1, RemovalCause::Removed);
    }

    #[test]
    fn test_cause_helpers() {
        assert!(RemovalCause::Evicted.was_evicted());
        assert!(RemovalCause::Expired.was_evicted());
        assert!(!RemovalCause::Replaced.was_evicted());
        assert_eq!(RemovalCause::Replaced.to_string(), "replaced");
    }
}
