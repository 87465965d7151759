//! Borrowing iterators over the hash maps.
//!
//! Iteration order follows bucket order and is unspecified; it changes after
//! any resize.

use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;

use crate::collections::hash::raw_table::{RawIter, RawParts};
use crate::concurrency::free_list::NONE;

/// Iterator over `(&K, &V)` pairs.
pub struct Iter<'a, K, V> {
    raw: RawIter<'a, K, V>,
    marker: PhantomData<(&'a K, &'a V)>,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(raw: RawIter<'a, K, V>) -> Self {
        Self {
            raw,
            marker: PhantomData,
        }
    }
}

// SAFETY: behaves like a pair of shared slices.
unsafe impl<K: Sync, V: Sync> Send for Iter<'_, K, V> {}
// SAFETY: as above.
unsafe impl<K: Sync, V: Sync> Sync for Iter<'_, K, V> {}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.raw.next()?;
        let parts = self.raw.parts();
        // SAFETY: `slot` is live and the map is borrowed for `'a`.
        unsafe { Some((parts.key(slot), parts.value(slot))) }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rest = Iter::new(self.raw.clone());
        f.debug_list().entries(rest).finish()
    }
}

/// Iterator over `(&K, &mut V)` pairs.
pub struct IterMut<'a, K, V> {
    raw: RawIter<'a, K, V>,
    marker: PhantomData<(&'a K, &'a mut V)>,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(raw: RawIter<'a, K, V>) -> Self {
        Self {
            raw,
            marker: PhantomData,
        }
    }
}

// SAFETY: behaves like a shared key slice and a unique value slice.
unsafe impl<K: Sync, V: Send> Send for IterMut<'_, K, V> {}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.raw.next()?;
        let parts = self.raw.parts();
        // SAFETY: every live slot is yielded once and the map is mutably
        // borrowed for `'a`.
        unsafe { Some((parts.key(slot), &mut *parts.values().add(slot))) }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Iterator over keys.
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// Iterator over values.
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// Iterator over every value stored under one key of a multi-value map.
pub struct ValuesForKey<'a, K, V> {
    parts: RawParts<K, V>,
    key: K,
    next: i32,
    marker: PhantomData<&'a V>,
}

impl<'a, K, V> ValuesForKey<'a, K, V> {
    /// # Safety
    /// `first` must be `-1` or a live slot on `key`'s chain, and the map must
    /// stay borrowed for `'a`.
    pub(crate) unsafe fn new(parts: RawParts<K, V>, key: K, first: i32) -> Self {
        Self {
            parts,
            key,
            next: first,
            marker: PhantomData,
        }
    }
}

impl<'a, K: Eq, V> Iterator for ValuesForKey<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        while self.next != NONE {
            let slot = self.next as usize;
            // SAFETY: walking a live chain of a borrowed map.
            unsafe {
                self.next = self.parts.link(slot);
                if *self.parts.key(slot) == self.key {
                    return Some(self.parts.value(slot));
                }
            }
        }
        None
    }
}

impl<K: Eq, V> FusedIterator for ValuesForKey<'_, K, V> {}
