//! Count-Min frequency sketch.
//!
//! A fixed-size table of 4-bit saturating counters estimating how often each
//! key has been seen recently. Every key maps to four counters, each in a
//! different 64-bit word, and the estimate is the minimum of the four. The
//! estimate can over-count (hash collisions) but never under-counts.
//!
//! Once the number of recorded increments reaches the sample size (ten times
//! the cache capacity), every counter is halved. Halving keeps the relative
//! order of keys while letting stale popularity fade.
//!
//! ```text
//!   table: [u64; N]           one u64 = 16 counters x 4 bits
//!   ┌────────────────┐
//!   │ c15 ... c1 c0  │ ◀── row i picks word index_of(hash, i)
//!   ├────────────────┤     and counter (hash & 3) * 4 + i
//!   │      ...       │
//!   └────────────────┘
//! ```

const SEEDS: [u64; 4] = [
    0xc3a5_c85c_97cb_3127,
    0xb492_b66f_be98_f273,
    0x9ae1_6a3b_2f90_404f,
    0xcbf2_9ce4_8422_2325,
];

const RESET_MASK: u64 = 0x7777_7777_7777_7777;
const ONE_MASK: u64 = 0x1111_1111_1111_1111;

/// Largest value a single counter can hold.
pub const MAX_FREQUENCY: u8 = 15;

const MIN_TABLE_LEN: usize = 64;
/// 32 MiB of counters, enough for tens of millions of keys.
const MAX_TABLE_LEN: usize = 1 << 22;

/// Probabilistic per-key access-count estimator with periodic decay.
#[derive(Debug, Clone)]
pub struct FrequencySketch {
    table: Box<[u64]>,
    table_mask: u64,
    sample_size: usize,
    size: usize,
}

impl FrequencySketch {
    /// Creates a sketch sized for a cache of `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let len = table_len(capacity);
        FrequencySketch {
            table: vec![0u64; len].into_boxed_slice(),
            table_mask: (len - 1) as u64,
            sample_size: capacity.saturating_mul(10),
            size: 0,
        }
    }

    /// Number of increments that triggers a reset.
    #[inline]
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Increments recorded since the last reset.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the estimated number of occurrences of `hash`, at most 15.
    pub fn frequency(&self, hash: u64) -> u8 {
        let hash = rehash(hash);
        let start = ((hash & 3) << 2) as u32;
        let mut frequency = MAX_FREQUENCY as u64;
        for i in 0..4u32 {
            let index = self.index_of(hash, i as usize);
            let offset = (start + i) << 2;
            let count = (self.table[index] >> offset) & 0xf;
            frequency = frequency.min(count);
        }
        frequency as u8
    }

    /// Records one occurrence of `hash`.
    ///
    /// Counters already at 15 are left alone. When no counter moves the
    /// increment is not counted toward the sample size.
    pub fn increment(&mut self, hash: u64) {
        let hash = rehash(hash);
        let start = ((hash & 3) << 2) as u32;
        let mut added = false;
        for i in 0..4u32 {
            let index = self.index_of(hash, i as usize);
            added |= self.increment_at(index, start + i);
        }

        if added {
            self.size += 1;
            if self.size >= self.sample_size {
                self.reset();
            }
        }
    }

    /// Halves every counter.
    pub fn reset(&mut self) {
        let mut odd = 0u32;
        for word in self.table.iter_mut() {
            odd += (*word & ONE_MASK).count_ones();
            *word = (*word >> 1) & RESET_MASK;
        }
        self.size = (self.size >> 1).saturating_sub((odd >> 2) as usize);
    }

    /// Resizes for a new cache capacity.
    ///
    /// Growing past the current table reallocates and forgets all counts;
    /// otherwise only the sample size changes.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        let len = table_len(capacity);
        if len > self.table.len() {
            *self = FrequencySketch::new(capacity);
        } else {
            self.sample_size = capacity.saturating_mul(10);
        }
    }

    /// Zeroes every counter.
    pub fn clear(&mut self) {
        self.table.iter_mut().for_each(|word| *word = 0);
        self.size = 0;
    }

    fn increment_at(&mut self, index: usize, counter: u32) -> bool {
        let offset = counter << 2;
        let mask = 0xfu64 << offset;
        if self.table[index] & mask != mask {
            self.table[index] += 1u64 << offset;
            true
        } else {
            false
        }
    }

    #[inline]
    fn index_of(&self, hash: u64, row: usize) -> usize {
        let mut h = hash.wrapping_add(SEEDS[row]).wrapping_mul(SEEDS[row]);
        h = h.wrapping_add(h >> 32);
        (h & self.table_mask) as usize
    }
}

/// Spreads a caller hash so that the low bits used for counter selection
/// are well mixed.
#[inline]
fn rehash(x: u64) -> u64 {
    let mut x = x.wrapping_mul(0x31848bab_u64);
    x ^= x >> 14;
    x
}

fn table_len(capacity: usize) -> usize {
    capacity.clamp(MIN_TABLE_LEN, MAX_TABLE_LEN).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_len_is_bounded() {
        assert_eq!(FrequencySketch::new(10).table.len(), MIN_TABLE_LEN);
        assert_eq!(FrequencySketch::new(1000).table.len(), 1024);

        let mut sketch = FrequencySketch::new(usize::MAX / 2);
        assert_eq!(sketch.table.len(), MAX_TABLE_LEN);
        assert_eq!(sketch.sample_size(), usize::MAX);
        sketch.increment(9);
        assert_eq!(sketch.frequency(9), 1);

        sketch.ensure_capacity(usize::MAX);
        assert_eq!(sketch.table.len(), MAX_TABLE_LEN);
    }

    #[test]
    fn test_unseen_key_is_zero() {
        let sketch = FrequencySketch::new(100);
        assert_eq!(sketch.frequency(42), 0);
    }

    #[test]
    fn test_increment_is_monotone_and_saturates() {
        let mut sketch = FrequencySketch::new(512);
        let mut last = 0;
        for _ in 0..20 {
            sketch.increment(7);
            let f = sketch.frequency(7);
            assert!(f >= last);
            last = f;
        }
        assert_eq!(sketch.frequency(7), MAX_FREQUENCY);
    }

    #[test]
    fn test_estimate_never_undercounts() {
        let mut sketch = FrequencySketch::new(1024);
        for key in 0..200u64 {
            for _ in 0..(key % 8) {
                sketch.increment(key);
            }
        }
        for key in 0..200u64 {
            assert!(sketch.frequency(key) as u64 >= key % 8);
        }
    }

    #[test]
    fn test_reset_halves_and_preserves_order() {
        let mut sketch = FrequencySketch::new(1000);
        for _ in 0..12 {
            sketch.increment(1);
        }
        for _ in 0..4 {
            sketch.increment(2);
        }
        let (hot, warm) = (sketch.frequency(1), sketch.frequency(2));
        sketch.reset();
        assert_eq!(sketch.frequency(1), hot / 2);
        assert_eq!(sketch.frequency(2), warm / 2);
        assert!(sketch.frequency(1) > sketch.frequency(2));
    }

    #[test]
    fn test_reset_triggers_at_sample_size() {
        let mut sketch = FrequencySketch::new(4);
        assert_eq!(sketch.sample_size(), 40);
        for key in 0..39u64 {
            sketch.increment(key);
        }
        assert_eq!(sketch.size(), 39);
        sketch.increment(1000);
        assert!(sketch.size() < 40);
    }

    #[test]
    fn test_ensure_capacity() {
        let mut sketch = FrequencySketch::new(16);
        sketch.increment(3);
        sketch.ensure_capacity(32);
        assert_eq!(sketch.sample_size(), 320);
        assert_eq!(sketch.frequency(3), 1);

        sketch.ensure_capacity(4096);
        assert_eq!(sketch.sample_size(), 40_960);
        assert_eq!(sketch.frequency(3), 0);
    }

    #[test]
    fn test_clear() {
        let mut sketch = FrequencySketch::new(16);
        sketch.increment(3);
        sketch.clear();
        assert_eq!(sketch.frequency(3), 0);
        assert_eq!(sketch.size(), 0);
    }
}
