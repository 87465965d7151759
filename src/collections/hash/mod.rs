//! Bucket-chained hash maps over a single raw allocation.
//!
//! [`HashMap`] keeps one value per key; [`MultiHashMap`] keeps any number.
//! Both are thin façades over the same engine (`raw_table`), so growth,
//! slot reuse and rehashing behave identically.

pub mod config;
pub mod hash_map;
pub mod iter;
pub mod multi_map;
pub mod parallel;
pub(crate) mod raw_table;
pub mod read_only;

pub use config::{TableConfig, DEFAULT_MIN_GROWTH, MAX_CAPACITY};
pub use hash_map::HashMap;
pub use iter::{Iter, IterMut, Keys, Values, ValuesForKey};
pub use multi_map::{MultiHashMap, MultiValueCursor};
pub use parallel::{MultiParallelWriter, ParallelWriter};
pub use read_only::{DetachedReadOnly, ReadOnly};

/// Keys and values copied out of a map; `keys[i]` maps to `values[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueArrays<K, V> {
    /// The keys, in iteration order.
    pub keys: Vec<K>,
    /// The values, matching `keys`.
    pub values: Vec<V>,
}

impl<K, V> KeyValueArrays<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over the pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.keys.iter().zip(&self.values)
    }
}
