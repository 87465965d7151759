//! Construction-time sizing for the hash maps.

/// Growth increment used when none is configured: plain doubling.
pub const DEFAULT_MIN_GROWTH: usize = 1;

/// Largest capacity a table may reach. Slot indices are stored as `i32`
/// and the bucket array is twice the capacity.
pub const MAX_CAPACITY: usize = 1 << 30;

/// Initial capacity and growth policy for a hash map.
///
/// ```
/// use native_containers::collections::hash::TableConfig;
///
/// let config = TableConfig::new(100).min_growth(256);
/// assert_eq!(config.capacity, 100);
/// assert_eq!(config.min_growth, 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    /// Requested slot count; rounded up to a power of two on construction.
    pub capacity: usize,
    /// Smallest number of slots added by a grow. Rounded up to a power of two.
    pub min_growth: usize,
}

impl TableConfig {
    /// A config with the given initial capacity and the default growth.
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            min_growth: DEFAULT_MIN_GROWTH,
        }
    }

    /// Sets the minimum growth increment.
    #[must_use]
    pub const fn min_growth(mut self, min_growth: usize) -> Self {
        self.min_growth = min_growth;
        self
    }

    pub(crate) fn growth_log2(min_growth: usize) -> u32 {
        min_growth
            .clamp(1, MAX_CAPACITY)
            .next_power_of_two()
            .trailing_zeros()
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
