//! Read-only views over the hash maps.
//!
//! [`ReadOnly`] borrows its map, so the borrow checker keeps it from
//! outliving or overlapping a mutation. [`DetachedReadOnly`] carries no
//! lifetime and exists for jobs that run on other threads while the map's
//! owner waits on their handles; its validity is checked against the map's
//! [`SafetyHandle`](crate::safety::SafetyHandle) in debug builds.

use core::fmt;
use core::hash::{BuildHasher, Hash};

use crate::alloc::RawAlloc;
use crate::collections::hash::iter::{Iter, Keys, Values, ValuesForKey};
use crate::collections::hash::raw_table::{hash_key, RawIter, RawParts, RawTable};
use crate::collections::hash::KeyValueArrays;
use crate::concurrency::free_list::NONE;
use crate::safety::SafetyView;

impl<K: Copy, V: Copy, S, A: RawAlloc> RawTable<K, V, S, A> {
    pub(crate) fn keys_to_vec(&self) -> Vec<K> {
        let parts = self.parts();
        // SAFETY: the iterator yields live slots.
        self.iter().map(|slot| unsafe { *parts.key(slot) }).collect()
    }

    pub(crate) fn values_to_vec(&self) -> Vec<V> {
        let parts = self.parts();
        // SAFETY: as above.
        self.iter().map(|slot| unsafe { *parts.value(slot) }).collect()
    }

    pub(crate) fn to_key_value_arrays(&self) -> KeyValueArrays<K, V> {
        let parts = self.parts();
        let mut arrays = KeyValueArrays::with_capacity(self.len());
        for slot in self.iter() {
            // SAFETY: as above.
            unsafe {
                arrays.keys.push(*parts.key(slot));
                arrays.values.push(*parts.value(slot));
            }
        }
        arrays
    }
}

impl<K, V, S, A> RawTable<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: RawAlloc,
{
    /// The head of the chain that holds every entry for `key`.
    pub(crate) fn chain_for(&self, key: &K) -> i32 {
        if !self.is_allocated() {
            return NONE;
        }
        let parts = self.parts();
        // SAFETY: bucket index in bounds; `&self` excludes mutation.
        unsafe { parts.bucket_head(parts.bucket_of(self.hash(key))) }
    }

    pub(crate) fn count_for(&self, key: &K) -> usize {
        let parts = self.parts();
        let mut slot = self.chain_for(key);
        let mut count = 0;
        while slot != NONE {
            // SAFETY: walking a live chain.
            unsafe {
                if parts.key(slot as usize) == key {
                    count += 1;
                }
                slot = parts.link(slot as usize);
            }
        }
        count
    }
}

/// A borrowed, read-only view of a map.
pub struct ReadOnly<'a, K, V, S, A: RawAlloc> {
    table: &'a RawTable<K, V, S, A>,
}

impl<K, V, S, A: RawAlloc> Clone for ReadOnly<'_, K, V, S, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, S, A: RawAlloc> Copy for ReadOnly<'_, K, V, S, A> {}

impl<'a, K, V, S, A: RawAlloc> ReadOnly<'a, K, V, S, A> {
    pub(crate) fn new(table: &'a RawTable<K, V, S, A>) -> Self {
        Self { table }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot capacity.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Iterates over `(&K, &V)` pairs.
    pub fn iter(&self) -> Iter<'a, K, V> {
        Iter::new(self.table.iter())
    }

    /// Iterates over keys.
    pub fn keys(&self) -> Keys<'a, K, V> {
        Keys { inner: self.iter() }
    }

    /// Iterates over values.
    pub fn values(&self) -> Values<'a, K, V> {
        Values { inner: self.iter() }
    }
}

impl<'a, K, V, S, A> ReadOnly<'a, K, V, S, A>
where
    K: Copy + Eq + Hash,
    V: Copy,
    S: BuildHasher,
    A: RawAlloc,
{
    /// The value for `key` (the first one found, for multi-value maps).
    pub fn get(&self, key: &K) -> Option<&'a V> {
        let slot = self.table.find(key)?;
        // SAFETY: `find` returns live slots; the table is borrowed for `'a`.
        Some(unsafe { self.table.parts().value(slot) })
    }

    /// Copies out the value for `key`.
    pub fn try_get_value(&self, key: &K) -> Option<V> {
        self.get(key).copied()
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.table.find(key).is_some()
    }

    /// Number of entries stored under `key`.
    pub fn count_values_for_key(&self, key: &K) -> usize {
        self.table.count_for(key)
    }

    /// Every value stored under `key`.
    pub fn get_values_for_key(&self, key: &K) -> ValuesForKey<'a, K, V> {
        // SAFETY: the chain head is live and the table is borrowed for `'a`.
        unsafe { ValuesForKey::new(self.table.parts(), *key, self.table.chain_for(key)) }
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
}

impl<K: fmt::Debug, V: fmt::Debug, S, A: RawAlloc> fmt::Debug for ReadOnly<'_, K, V, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// A `'static` read view that can be moved into a scheduled job.
///
/// Created with the unsafe `as_detached_read_only` on a map. Every access
/// first checks, in debug builds, that the map still exists and was not
/// structurally modified since the view was taken.
pub struct DetachedReadOnly<K, V, S> {
    parts: RawParts<K, V>,
    len: usize,
    hash_builder: S,
    safety: SafetyView,
}

// SAFETY: a detached view only reads `Sync` data.
unsafe impl<K: Sync, V: Sync, S: Send> Send for DetachedReadOnly<K, V, S> {}
// SAFETY: as above.
unsafe impl<K: Sync, V: Sync, S: Sync> Sync for DetachedReadOnly<K, V, S> {}

impl<K, V, S: Clone> Clone for DetachedReadOnly<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            parts: self.parts,
            len: self.len,
            hash_builder: self.hash_builder.clone(),
            safety: self.safety.clone(),
        }
    }
}

impl<K, V, S> DetachedReadOnly<K, V, S> {
    /// # Safety
    /// See the map's `as_detached_read_only`.
    pub(crate) unsafe fn new<A: RawAlloc>(table: &RawTable<K, V, S, A>, safety: SafetyView) -> Self
    where
        S: Clone,
    {
        Self {
            parts: table.parts(),
            len: table.len(),
            hash_builder: table.hasher().clone(),
            safety,
        }
    }

    /// Number of entries when the view was taken.
    pub fn len(&self) -> usize {
        self.safety.check();
        self.len
    }

    /// Whether the map was empty when the view was taken.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, S> DetachedReadOnly<K, V, S>
where
    K: Copy + Eq + Hash,
    V: Copy,
    S: BuildHasher,
{
    /// Copies out the value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.safety.check();
        if self.parts.capacity() == 0 {
            return None;
        }
        let bucket = self.parts.bucket_of(hash_key(&self.hash_builder, key));
        // SAFETY: the constructor's contract keeps the parts alive and unmodified.
        unsafe {
            let slot = self.parts.find_in_bucket(bucket, key)?;
            Some(*self.parts.value(slot))
        }
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Calls `f` with every entry.
    pub fn for_each(&self, mut f: impl FnMut(K, V)) {
        self.safety.check();
        // SAFETY: as above.
        for slot in unsafe { RawIter::new(self.parts, self.len) } {
            unsafe { f(*self.parts.key(slot), *self.parts.value(slot)) };
        }
    }

    /// Copies keys and values out in matching order.
    pub fn to_key_value_arrays(&self) -> KeyValueArrays<K, V> {
        let mut arrays = KeyValueArrays::with_capacity(self.len);
        self.for_each(|k, v| {
            arrays.keys.push(k);
            arrays.values.push(v);
        });
        arrays
    }
}

impl<K, V, S> fmt::Debug for DetachedReadOnly<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachedReadOnly")
            .field("len", &self.len)
            .field("capacity", &self.parts.capacity())
            .finish_non_exhaustive()
    }
}
