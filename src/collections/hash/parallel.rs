//! Lock-free insertion views over a pre-sized hash table.
//!
//! A writer is taken with `&mut map`, so nothing else can touch the table
//! while it is alive; the writer itself is `Copy + Send + Sync` and is shared
//! by reference with worker threads. It never resizes: claiming a slot past
//! the capacity panics without corrupting the table.
//!
//! Slot claims pop the tagged free list or bump `allocated` with a bounded
//! CAS. The key and value are written into the claimed slot and the slot is
//! then published by a CAS on its bucket head. For the unique-key writer, a
//! failed publish re-scans only the entries prepended since the last attempt.

use core::hash::{BuildHasher, Hash};
use core::ptr;
use core::sync::atomic::Ordering;

use crossbeam_utils::Backoff;

use crate::alloc::RawAlloc;
use crate::collections::hash::raw_table::RawTable;
use crate::concurrency::atomic_link;
use crate::concurrency::free_list::NONE;

#[cold]
#[track_caller]
fn capacity_exceeded(capacity: usize) -> ! {
    panic!("parallel writer exceeded the pre-sized capacity of {capacity} slots")
}

impl<K, V, S, A> RawTable<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: RawAlloc,
{
    fn claim_slot_shared(&self) -> usize {
        let links = self.parts.links();
        // SAFETY: free-listed indices are below capacity; links are only
        // accessed atomically while writers exist.
        if let Some(slot) = unsafe { self.free.pop_shared(links) } {
            return slot;
        }
        let capacity = self.parts.capacity();
        let mut current = self.allocated.load(Ordering::Relaxed);
        loop {
            if current >= capacity {
                capacity_exceeded(capacity);
            }
            match self.allocated.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }

    /// Whether a slot holding `key` lies on the chain from `from` up to (not
    /// including) `stop`.
    ///
    /// # Safety
    /// Slots on the chain were published with release ordering.
    unsafe fn chain_contains(&self, mut from: i32, stop: i32, key: &K) -> bool {
        let parts = self.parts;
        while from != stop && from != NONE {
            let slot = from as usize;
            if parts.key(slot) == key {
                return true;
            }
            from = atomic_link(parts.links(), slot).load(Ordering::Acquire);
        }
        false
    }

    /// Inserts from a shared reference. With `unique`, fails if the key is
    /// already present (or is published concurrently first).
    ///
    /// # Safety
    /// No `&mut` access and no non-atomic chain access may happen while any
    /// thread is inside this call.
    pub(super) unsafe fn add_shared(&self, key: K, value: V, unique: bool) -> bool {
        let parts = self.parts;
        if parts.capacity() == 0 {
            capacity_exceeded(0);
        }
        let bucket = parts.bucket_of(self.hash(&key));
        let head = atomic_link(parts.buckets(), bucket);

        let mut observed = head.load(Ordering::Acquire);
        if unique && self.chain_contains(observed, NONE, &key) {
            return false;
        }

        let slot = self.claim_slot_shared();
        ptr::write(parts.keys().add(slot), key);
        ptr::write(parts.values().add(slot), value);
        let link = atomic_link(parts.links(), slot);

        let backoff = Backoff::new();
        loop {
            link.store(observed, Ordering::Relaxed);
            match head.compare_exchange_weak(observed, slot as i32, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(current) => {
                    if unique && self.chain_contains(current, observed, parts.key(slot)) {
                        self.free.push_shared(slot, parts.links());
                        return false;
                    }
                    observed = current;
                    backoff.spin();
                }
            }
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Concurrent `try_add` view over a [`HashMap`](crate::collections::HashMap).
pub struct ParallelWriter<'a, K, V, S, A: RawAlloc> {
    table: &'a RawTable<K, V, S, A>,
}

/// Concurrent `add` view over a [`MultiHashMap`](crate::collections::MultiHashMap).
pub struct MultiParallelWriter<'a, K, V, S, A: RawAlloc> {
    table: &'a RawTable<K, V, S, A>,
}

macro_rules! writer_common {
    ($writer:ident) => {
        impl<'a, K, V, S, A: RawAlloc> $writer<'a, K, V, S, A> {
            /// # Safety
            /// The caller holds the table exclusively for `'a`.
            pub(crate) unsafe fn new(table: &'a RawTable<K, V, S, A>) -> Self {
                Self { table }
            }

            /// Slot capacity; inserting past it panics.
            pub fn capacity(&self) -> usize {
                self.table.capacity()
            }

            /// Entries inserted so far, including those from other threads.
            pub fn len(&self) -> usize {
                self.table.count.load(Ordering::Relaxed)
            }

            /// Whether nothing has been inserted yet.
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }

        impl<K, V, S, A: RawAlloc> Clone for $writer<'_, K, V, S, A> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<K, V, S, A: RawAlloc> Copy for $writer<'_, K, V, S, A> {}

        // SAFETY: writers move keys and values into the table from any thread
        // and read keys written by other threads.
        unsafe impl<K: Send + Sync, V: Send, S: Sync, A: RawAlloc + Sync> Send for $writer<'_, K, V, S, A> {}
        // SAFETY: as above.
        unsafe impl<K: Send + Sync, V: Send, S: Sync, A: RawAlloc + Sync> Sync for $writer<'_, K, V, S, A> {}

        impl<K, V, S, A: RawAlloc> core::fmt::Debug for $writer<'_, K, V, S, A> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_struct(stringify!($writer))
                    .field("len", &self.len())
                    .field("capacity", &self.capacity())
                    .finish()
            }
        }
    };
}

writer_common!(ParallelWriter);
writer_common!(MultiParallelWriter);

impl<K, V, S, A> ParallelWriter<'_, K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: RawAlloc,
{
    /// Inserts `key` unless it is present. Returns `false` for duplicates,
    /// including one inserted concurrently by another thread.
    ///
    /// # Panics
    /// Panics if the table is full.
    pub fn try_add(&self, key: K, value: V) -> bool {
        // SAFETY: the writer holds the table exclusively.
        unsafe { self.table.add_shared(key, value, true) }
    }
}

impl<K, V, S, A> MultiParallelWriter<'_, K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: RawAlloc,
{
    /// Appends an entry for `key`.
    ///
    /// # Panics
    /// Panics if the table is full.
    pub fn add(&self, key: K, value: V) {
        // SAFETY: the writer holds the table exclusively.
        unsafe {
            self.table.add_shared(key, value, false);
        }
    }
}
