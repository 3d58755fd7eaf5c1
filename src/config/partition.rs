//! Capacity partitioning across the admission segments.

use crate::error::ConfigError;

/// Default share of capacity given to the admission window.
pub const DEFAULT_WINDOW_RATIO: f64 = 0.01;
/// Default share of the main space reserved for protected entries.
pub const DEFAULT_PROTECTED_RATIO: f64 = 0.8;
/// Smallest capacity that holds one window and one probation slot.
pub const MIN_CAPACITY: usize = 2;

/// How a total capacity is split between Window, Probation and Protected.
///
/// ```text
///   ┌────────┬──────────────────────────────────────────┐
///   │ window │                  main                    │
///   │  ~1%   │  probation ~20%  │     protected ~80%     │
///   └────────┴──────────────────────────────────────────┘
/// ```
///
/// The window always has at least one slot and the main space at least one
/// slot. Protected is a soft cap on the main space; probation takes whatever
/// protected does not use.
///
/// # Examples
///
/// ```
/// use concurrent_lfu::config::CapacityPartition;
///
/// let p = CapacityPartition::new(1000).unwrap();
/// assert_eq!(p.window(), 10);
/// assert_eq!(p.protected(), 792);
/// assert_eq!(p.probation(), 198);
/// assert!(CapacityPartition::new(1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityPartition {
    capacity: usize,
    window: usize,
    protected: usize,
    window_ratio: f64,
    protected_ratio: f64,
}

impl CapacityPartition {
    /// Splits `capacity` with the default proportions.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_proportions(capacity, DEFAULT_WINDOW_RATIO, DEFAULT_PROTECTED_RATIO)
    }

    /// Splits `capacity` giving `window_ratio` of it to the window and
    /// `protected_ratio` of the remainder to the protected segment.
    pub fn with_proportions(
        capacity: usize,
        window_ratio: f64,
        protected_ratio: f64,
    ) -> Result<Self, ConfigError> {
        check_ratio("window", window_ratio)?;
        check_ratio("protected", protected_ratio)?;
        if capacity < MIN_CAPACITY {
            return Err(ConfigError::CapacityTooSmall {
                capacity,
                minimum: MIN_CAPACITY,
            });
        }

        let main = ((capacity as f64) * (1.0 - window_ratio)).floor() as usize;
        let window = capacity.saturating_sub(main).clamp(1, capacity - 1);
        let main = capacity - window;
        let protected = (((main as f64) * protected_ratio).floor() as usize).min(main - 1);

        Ok(CapacityPartition {
            capacity,
            window,
            protected,
            window_ratio,
            protected_ratio,
        })
    }

    /// The same proportions applied to a different capacity.
    pub fn resize(&self, capacity: usize) -> Result<Self, ConfigError> {
        Self::with_proportions(capacity, self.window_ratio, self.protected_ratio)
    }

    /// Total number of entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window slots.
    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Probation plus protected slots.
    #[inline]
    pub fn main(&self) -> usize {
        self.capacity - self.window
    }

    /// Upper bound on protected entries.
    #[inline]
    pub fn protected(&self) -> usize {
        self.protected
    }

    /// Slots left to probation when protected is full.
    #[inline]
    pub fn probation(&self) -> usize {
        self.main() - self.protected
    }
}

fn check_ratio(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidProportion { name, value })
    }
}
