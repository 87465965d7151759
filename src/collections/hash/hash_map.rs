//! `HashMap`: a single-value hash map over one raw allocation.
//!
//! Keys and values are `Copy` and are moved around by raw byte copies; the
//! map never runs destructors for them. Every structural mutation bumps the
//! map's safety generation, which invalidates detached views in debug builds.

use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::collections::hash_map::RandomState;

use crate::alloc::{Global, RawAlloc};
use crate::collections::hash::config::TableConfig;
use crate::collections::hash::iter::{Iter, IterMut, Keys, Values};
use crate::collections::hash::parallel::ParallelWriter;
use crate::collections::hash::raw_table::RawTable;
use crate::collections::hash::read_only::{DetachedReadOnly, ReadOnly};
use crate::collections::hash::KeyValueArrays;
use crate::error::{CollectionError, Result};
use crate::jobs::Dispose;
use crate::safety::SafetyHandle;

/// A hash map with unique keys, generic over hasher and allocator.
///
/// ```
/// use native_containers::collections::HashMap;
///
/// let mut map = HashMap::with_capacity(1);
/// map.add("a", 1).unwrap();
/// map.add("b", 2).unwrap();
/// assert_eq!(map.try_get_value(&"b"), Some(2));
/// assert!(map.add("a", 3).is_err());
/// ```
pub struct HashMap<K, V, S = RandomState, A: RawAlloc = Global> {
    table: RawTable<K, V, S, A>,
    safety: SafetyHandle,
}

impl<K, V> HashMap<K, V, RandomState, Global>
where
    K: Copy + Eq + Hash,
    V: Copy,
{
    /// Creates an empty map without allocating; the first insertion does.
    pub fn new() -> Self {
        Self::with_hasher_in(RandomState::new(), Global)
    }

    /// Creates a map holding at least `capacity` entries before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config_in(TableConfig::new(capacity), RandomState::new(), Global)
    }
}

impl<K, V, S, A> HashMap<K, V, S, A>
where
    K: Copy + Eq + Hash,
    V: Copy,
    S: BuildHasher,
    A: RawAlloc,
{
    /// Creates an empty map over `alloc` without allocating.
    pub fn with_hasher_in(hash_builder: S, alloc: A) -> Self {
        Self {
            table: RawTable::unallocated(TableConfig::default().min_growth, hash_builder, alloc),
            safety: SafetyHandle::new::<Self>(),
        }
    }

    /// Creates a map sized by `config` over `alloc`.
    ///
    /// # Panics
    /// Panics if the capacity overflows; aborts through
    /// [`std::alloc::handle_alloc_error`] if the allocator fails.
    pub fn with_config_in(config: TableConfig, hash_builder: S, alloc: A) -> Self {
        Self {
            table: RawTable::with_config(config, hash_builder, alloc),
            safety: SafetyHandle::new::<Self>(),
        }
    }

    /// Creates a map sized by `config`, reporting allocation failure.
    ///
    /// # Errors
    /// `CapacityOverflow` or `Alloc`.
    pub fn try_with_config_in(config: TableConfig, hash_builder: S, alloc: A) -> Result<Self> {
        Ok(Self {
            table: RawTable::try_with_config(config, hash_builder, alloc)?,
            safety: SafetyHandle::new::<Self>(),
        })
    }

    /// Whether the map owns a backing store.
    pub fn is_created(&self) -> bool {
        self.table.is_allocated()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot capacity (a power of two, or zero before the first allocation).
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Grows or shrinks to `next_pow2(max(capacity, len, min_growth))`.
    ///
    /// # Errors
    /// `CapacityBelowLength` if `capacity < len`.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        self.safety.check_write();
        self.table.set_capacity(capacity)
    }

    /// Shrinks to the smallest power of two that holds the entries.
    pub fn trim_excess(&mut self) {
        self.safety.check_write();
        self.table.trim_excess();
    }

    /// Removes every entry, keeping the allocation.
    pub fn clear(&mut self) {
        self.safety.check_write();
        self.table.clear();
    }

    /// Inserts `key` unless present. Returns whether it was inserted.
    pub fn try_add(&mut self, key: K, value: V) -> bool {
        self.safety.check_write();
        match self.table.try_insert_slot(key) {
            Ok(slot) => {
                // SAFETY: fresh slot from the table.
                unsafe { self.table.write_value(slot, value) };
                true
            }
            Err(_) => false,
        }
    }

    /// Inserts `key`, failing if it is already present.
    ///
    /// # Errors
    /// `DuplicateKey`.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        if self.try_add(key, value) {
            Ok(())
        } else {
            Err(CollectionError::DuplicateKey)
        }
    }

    /// Inserts or overwrites, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.safety.check_write();
        match self.table.try_insert_slot(key) {
            Ok(slot) => {
                // SAFETY: fresh slot from the table.
                unsafe { self.table.write_value(slot, value) };
                None
            }
            // SAFETY: `slot` is live.
            Err(slot) => Some(core::mem::replace(unsafe { self.table.value_mut(slot) }, value)),
        }
    }

    /// Removes `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.take(key).is_some()
    }

    /// Removes `key` and returns its value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        self.safety.check_write();
        let slot = self.table.remove_first(key)?;
        // SAFETY: unlinking leaves the value bytes in place until reuse.
        Some(unsafe { *self.table.parts().value(slot) })
    }

    /// The value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let slot = self.table.find(key)?;
        // SAFETY: `find` returns live slots.
        Some(unsafe { self.table.value(slot) })
    }

    /// The value for `key`, mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let slot = self.table.find(key)?;
        // SAFETY: as above.
        Some(unsafe { self.table.value_mut(slot) })
    }

    /// Copies out the value for `key`.
    pub fn try_get_value(&self, key: &K) -> Option<V> {
        self.get(key).copied()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.find(key).is_some()
    }

    /// Copies the keys out.
    pub fn keys_to_vec(&self) -> Vec<K> {
        self.table.keys_to_vec()
    }

    /// Copies the values out.
    pub fn values_to_vec(&self) -> Vec<V> {
        self.table.values_to_vec()
    }

    /// Copies keys and values out in matching order.
    pub fn to_key_value_arrays(&self) -> KeyValueArrays<K, V> {
        self.table.to_key_value_arrays()
    }

    /// Iterates over `(&K, &V)` pairs in unspecified order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.table.iter())
    }

    /// Iterates over `(&K, &mut V)` pairs.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(self.table.iter())
    }

    /// Iterates over keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Iterates over values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// A read-only view borrowing the map.
    pub fn as_read_only(&self) -> ReadOnly<'_, K, V, S, A> {
        self.safety.check_exists();
        ReadOnly::new(&self.table)
    }

    /// A lock-free insertion view for many threads.
    ///
    /// The map must already have room for every entry the writers add; see
    /// [`HashMap::set_capacity`].
    pub fn as_parallel_writer(&mut self) -> ParallelWriter<'_, K, V, S, A> {
        self.safety.check_write();
        // SAFETY: `&mut self` is held for the writer's lifetime.
        unsafe { ParallelWriter::new(&self.table) }
    }

    /// A `'static` read view for use inside scheduled jobs.
    ///
    /// # Safety
    /// Until the view's last use, the map must not be mutated, dropped or
    /// disposed. Schedule the map's
    /// [`dispose_deferred`](crate::jobs::Dispose::dispose_deferred) after the
    /// jobs holding the view. Debug builds panic on violations.
    pub unsafe fn as_detached_read_only(&self) -> DetachedReadOnly<K, V, S>
    where
        S: Clone,
    {
        self.safety.check_exists();
        DetachedReadOnly::new(&self.table, self.safety.view())
    }

    /// The allocator backing the map.
    pub fn allocator(&self) -> &A {
        self.table.allocator()
    }

    /// The map's hasher.
    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }
}

impl<K, V, S, A> Index<&K> for HashMap<K, V, S, A>
where
    K: Copy + Eq + Hash,
    V: Copy,
    S: BuildHasher,
    A: RawAlloc,
{
    type Output = V;

    /// # Panics
    /// Panics if `key` is not present.
    fn index(&self, key: &K) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("{}", CollectionError::KeyNotFound),
        }
    }
}

impl<K, V, S, A> Default for HashMap<K, V, S, A>
where
    K: Copy + Eq + Hash,
    V: Copy,
    S: BuildHasher + Default,
    A: RawAlloc + Default,
{
    fn default() -> Self {
        Self::with_hasher_in(S::default(), A::default())
    }
}

impl<K, V, S, A> Extend<(K, V)> for HashMap<K, V, S, A>
where
    K: Copy + Eq + Hash,
    V: Copy,
    S: BuildHasher,
    A: RawAlloc,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for HashMap<K, V, RandomState, Global>
where
    K: Copy + Eq + Hash,
    V: Copy,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity(iter.size_hint().0);
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S, A> IntoIterator for &'a HashMap<K, V, S, A>
where
    K: Copy + Eq + Hash,
    V: Copy,
    S: BuildHasher,
    A: RawAlloc,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S, A> fmt::Debug for HashMap<K, V, S, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: RawAlloc,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(Iter::new(self.table.iter())).finish()
    }
}

impl<K, V, S, A: RawAlloc> Drop for HashMap<K, V, S, A> {
    fn drop(&mut self) {
        self.safety.release();
    }
}

impl<K, V, S, A: RawAlloc> Dispose for HashMap<K, V, S, A> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_overwrites_and_returns_previous() {
        let mut map = HashMap::new();
        assert_eq!(map.insert(1u32, 10u32), None);
        assert_eq!(map.insert(1, 11), Some(10));
        assert_eq!(map[&1], 11);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn new_map_allocates_lazily() {
        let mut map: HashMap<u8, u8> = HashMap::new();
        assert!(!map.is_created());
        assert_eq!(map.capacity(), 0);
        assert!(!map.contains_key(&1));
        map.add(1, 1).unwrap();
        assert!(map.is_created());
    }

    #[test]
    fn take_returns_removed_value() {
        let mut map: HashMap<i32, f64> = (0..10).map(|i| (i, f64::from(i) / 2.0)).collect();
        assert_eq!(map.take(&4), Some(2.0));
        assert_eq!(map.take(&4), None);
        assert_eq!(map.len(), 9);
    }

    #[test]
    fn iter_mut_updates_in_place() {
        let mut map: HashMap<u16, u32> = (0..50).map(|i| (i, 0)).collect();
        for (k, v) in map.iter_mut() {
            *v = u32::from(*k) * 3;
        }
        assert!(map.iter().all(|(k, v)| *v == u32::from(*k) * 3));
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_panics_on_missing_key() {
        let map: HashMap<u8, u8> = HashMap::with_capacity(4);
        let _value = map[&3];
    }

    #[test]
    fn debug_lists_entries() {
        let mut map = HashMap::with_capacity(2);
        map.add('x', 1).unwrap();
        assert_eq!(format!("{map:?}"), "{'x': 1}");
    }
}
