//! `MultiHashMap`: a hash map that keeps every value added under a key.
//!
//! Entries for one key share a bucket chain (possibly with other keys that
//! hash to the same bucket). Walking a key's values uses a value-type
//! [`MultiValueCursor`] that is handed back to the map on every step, so the
//! borrow checker cannot tie it to the map; instead it carries a safety stamp
//! and its slot indices are bounds-checked in every build.

use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

use crate::alloc::{Global, RawAlloc};
use crate::collections::hash::config::TableConfig;
use crate::collections::hash::iter::{Iter, ValuesForKey};
use crate::collections::hash::parallel::MultiParallelWriter;
use crate::collections::hash::raw_table::RawTable;
use crate::collections::hash::read_only::{DetachedReadOnly, ReadOnly};
use crate::collections::hash::KeyValueArrays;
use crate::concurrency::free_list::NONE;
use crate::error::Result;
use crate::jobs::Dispose;
use crate::safety::{SafetyHandle, SafetyStamp};

/// Position within the values stored under one key.
///
/// Invalidated by any structural mutation of the map (add, remove, resize,
/// clear); debug builds panic when a stale cursor is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiValueCursor<K> {
    key: K,
    entry: i32,
    next_entry: i32,
    stamp: SafetyStamp,
}

impl<K: Copy> MultiValueCursor<K> {
    /// The key this cursor walks.
    pub fn key(&self) -> K {
        self.key
    }
}

/// A hash map that allows any number of values per key.
///
/// ```
/// use native_containers::collections::MultiHashMap;
///
/// let mut map = MultiHashMap::with_capacity(4);
/// map.add(1, 'a');
/// map.add(1, 'b');
/// map.add(2, 'c');
/// assert_eq!(map.count_values_for_key(&1), 2);
///
/// let (first, mut cursor) = map.try_get_first_value(&1).unwrap();
/// let second = map.try_get_next_value(&mut cursor).unwrap();
/// assert_ne!(first, second);
/// assert_eq!(map.try_get_next_value(&mut cursor), None);
/// ```
pub struct MultiHashMap<K, V, S = RandomState, A: RawAlloc = Global> {
    table: RawTable<K, V, S, A>,
    safety: SafetyHandle,
}

impl<K, V> MultiHashMap<K, V, RandomState, Global>
where
    K: Copy + Eq + Hash,
    V: Copy,
{
    /// Creates an empty map without allocating.
    pub fn new() -> Self {
        Self::with_hasher_in(RandomState::new(), Global)
    }

    /// Creates a map holding at least `capacity` entries before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config_in(TableConfig::new(capacity), RandomState::new(), Global)
    }
}

impl<K, V, S, A> MultiHashMap<K, V, S, A>
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
    /// Panics if the capacity overflows; aborts if the allocator fails.
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

    /// Number of entries, counting every value of every key.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot capacity.
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

    /// Adds an entry. Never fails on duplicate keys.
    pub fn add(&mut self, key: K, value: V) {
        self.safety.check_write();
        let slot = self.table.push_entry(key);
        // SAFETY: fresh slot from the table.
        unsafe { self.table.write_value(slot, value) };
    }

    /// Whether any value is stored under `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.find(key).is_some()
    }

    /// Walks `key`'s chain from `from`, returning the first slot for `key`.
    /// Slots at or past `allocated` end the walk.
    fn seek(&self, key: &K, mut from: i32) -> Option<usize> {
        let parts = self.table.parts();
        let allocated = self.table.allocated();
        while from != NONE {
            let slot = from as usize;
            if slot >= allocated {
                return None;
            }
            // SAFETY: `slot < allocated`, so its key and link were written.
            unsafe {
                if parts.key(slot) == key {
                    return Some(slot);
                }
                from = parts.link(slot);
            }
        }
        None
    }

    fn cursor_at(&self, key: K, slot: usize) -> (V, MultiValueCursor<K>) {
        let parts = self.table.parts();
        // SAFETY: callers pass slots returned by `seek`.
        unsafe {
            let cursor = MultiValueCursor {
                key,
                entry: slot as i32,
                next_entry: parts.link(slot),
                stamp: self.safety.stamp(),
            };
            (*parts.value(slot), cursor)
        }
    }

    /// The first value for `key` and a cursor positioned on it.
    pub fn try_get_first_value(&self, key: &K) -> Option<(V, MultiValueCursor<K>)> {
        self.safety.check_exists();
        let slot = self.seek(key, self.table.chain_for(key))?;
        Some(self.cursor_at(*key, slot))
    }

    /// Advances `cursor` to the next value for its key.
    ///
    /// # Panics
    /// Panics in debug builds if the map was structurally modified since the
    /// cursor was created.
    pub fn try_get_next_value(&self, cursor: &mut MultiValueCursor<K>) -> Option<V> {
        self.safety.check_stamp(cursor.stamp);
        let slot = self.seek(&cursor.key, cursor.next_entry)?;
        let (value, next) = self.cursor_at(cursor.key, slot);
        *cursor = next;
        Some(value)
    }

    fn checked_entry(&self, cursor: &MultiValueCursor<K>) -> usize {
        self.safety.check_stamp(cursor.stamp);
        let slot = cursor.entry;
        assert!(
            slot != NONE && (slot as usize) < self.table.allocated(),
            "multi-value cursor does not refer to an entry of this map"
        );
        slot as usize
    }

    /// Overwrites the value under `cursor` in place. Cursors stay valid.
    ///
    /// # Panics
    /// Panics if the cursor is out of range (or stale, in debug builds).
    pub fn set_value(&mut self, value: V, cursor: &MultiValueCursor<K>) {
        let slot = self.checked_entry(cursor);
        // SAFETY: bounds-checked against the claimed slots.
        unsafe { self.table.write_value(slot, value) };
    }

    /// Removes the single entry under `cursor`. Returns whether it was live.
    ///
    /// # Panics
    /// Panics if the cursor is out of range (or stale, in debug builds).
    pub fn remove_at(&mut self, cursor: MultiValueCursor<K>) -> bool {
        let slot = self.checked_entry(&cursor);
        self.safety.check_write();
        self.table.remove_slot(slot)
    }

    /// Removes every value for `key`. Returns how many were removed.
    pub fn remove(&mut self, key: &K) -> usize {
        self.safety.check_write();
        self.table.remove_all(key)
    }

    /// Number of values stored under `key`.
    pub fn count_values_for_key(&self, key: &K) -> usize {
        self.table.count_for(key)
    }

    /// Iterates over the values stored under `key`.
    pub fn get_values_for_key(&self, key: &K) -> ValuesForKey<'_, K, V> {
        // SAFETY: the chain head is live and `&self` is borrowed.
        unsafe { ValuesForKey::new(self.table.parts(), *key, self.table.chain_for(key)) }
    }

    /// Each distinct key once.
    pub fn unique_keys(&self) -> Vec<K> {
        let parts = self.table.parts();
        let mut keys = Vec::new();
        for bucket in 0..parts.bucket_count() {
            let first = keys.len();
            // SAFETY: walking live chains of a borrowed table.
            unsafe {
                let mut slot = parts.bucket_head(bucket);
                while slot != NONE {
                    let key = *parts.key(slot as usize);
                    // Equal keys always share a chain.
                    if !keys[first..].contains(&key) {
                        keys.push(key);
                    }
                    slot = parts.link(slot as usize);
                }
            }
        }
        keys
    }

    /// Copies the keys out, once per value.
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

    /// Iterates over every `(&K, &V)` entry.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.table.iter())
    }

    /// A read-only view borrowing the map.
    pub fn as_read_only(&self) -> ReadOnly<'_, K, V, S, A> {
        self.safety.check_exists();
        ReadOnly::new(&self.table)
    }

    /// A lock-free insertion view for many threads. The map must be pre-sized.
    pub fn as_parallel_writer(&mut self) -> MultiParallelWriter<'_, K, V, S, A> {
        self.safety.check_write();
        // SAFETY: `&mut self` is held for the writer's lifetime.
        unsafe { MultiParallelWriter::new(&self.table) }
    }

    /// A `'static` read view for use inside scheduled jobs.
    ///
    /// # Safety
    /// Same contract as [`HashMap::as_detached_read_only`](crate::collections::HashMap::as_detached_read_only).
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
}

impl<K, V, S, A> Default for MultiHashMap<K, V, S, A>
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

impl<K, V, S, A> Extend<(K, V)> for MultiHashMap<K, V, S, A>
where
    K: Copy + Eq + Hash,
    V: Copy,
    S: BuildHasher,
    A: RawAlloc,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<K, V, S, A> fmt::Debug for MultiHashMap<K, V, S, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: RawAlloc,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(Iter::new(self.table.iter())).finish()
    }
}

impl<K, V, S, A: RawAlloc> Drop for MultiHashMap<K, V, S, A> {
    fn drop(&mut self) {
        self.safety.release();
    }
}

impl<K, V, S, A: RawAlloc> Dispose for MultiHashMap<K, V, S, A> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_keeps_cursor_valid() {
        let mut map = MultiHashMap::with_capacity(8);
        map.add(5u8, 1u32);
        map.add(5, 2);
        let (_, mut cursor) = map.try_get_first_value(&5).unwrap();
        map.set_value(100, &cursor);
        assert!(map.try_get_next_value(&mut cursor).is_some());
        let mut values = map.values_to_vec();
        values.sort_unstable();
        assert_eq!(values.iter().filter(|&&v| v == 100).count(), 1);
    }

    #[test]
    fn unique_keys_dedupes() {
        let mut map = MultiHashMap::with_capacity(2);
        for i in 0..30u32 {
            map.add(i % 7, i);
        }
        let mut keys = map.unique_keys();
        keys.sort_unstable();
        assert_eq!(keys, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn cursor_walk_skips_other_keys_in_bucket() {
        let mut map = MultiHashMap::with_capacity(1);
        for i in 0..64u32 {
            map.add(i % 2, i);
        }
        let mut seen = 0;
        let mut next = map.try_get_first_value(&1);
        while let Some((value, mut cursor)) = next {
            assert_eq!(value % 2, 1);
            seen += 1;
            next = map.try_get_next_value(&mut cursor).map(|v| (v, cursor));
        }
        assert_eq!(seen, 32);
    }

    #[test]
    #[should_panic(expected = "does not refer to an entry")]
    fn cursor_from_cleared_map_is_rejected() {
        let mut map = MultiHashMap::with_capacity(4);
        map.add(1u8, 1u8);
        let (_, cursor) = map.try_get_first_value(&1).unwrap();
        map.table.clear();
        map.set_value(2, &cursor);
    }
}
