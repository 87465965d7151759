//! `RawTable`: the bucket-chained hash engine behind both map façades.
//!
//! One allocation holds four regions laid out back to back:
//!
//! ```text
//! [ values: V × cap ][ keys: K × cap ][ links: i32 × cap ][ buckets: i32 × 2·cap ]
//! ```
//!
//! `buckets[b]` is the first slot of the chain for bucket `b`, and
//! `links[slot]` is the next slot in whichever list the slot is on: a bucket
//! chain while live, the free list once removed. `-1` terminates both.
//! Slots below `allocated` have been claimed at least once; above it the
//! key/value memory is uninitialized.
//!
//! The engine writes keys only. Callers write the value into the slot they
//! get back before the slot can be observed through `&self`.

use core::alloc::Layout;
use core::hash::{BuildHasher, Hash, Hasher};
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicUsize, Ordering};
use std::alloc::handle_alloc_error;

use crate::alloc::RawAlloc;
use crate::collections::hash::config::{TableConfig, MAX_CAPACITY};
use crate::concurrency::free_list::{FreeList, NONE};
use crate::error::{CollectionError, Result};
use crate::macros::trace_event;

/// Byte offsets of each region for one capacity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableLayout {
    layout: Layout,
    keys: usize,
    links: usize,
    buckets: usize,
}

impl TableLayout {
    const EMPTY: Self = Self {
        layout: Layout::new::<()>(),
        keys: 0,
        links: 0,
        buckets: 0,
    };

    fn new<K, V>(capacity: usize) -> Option<Self> {
        let values = Layout::array::<V>(capacity).ok()?;
        let (layout, keys) = values.extend(Layout::array::<K>(capacity).ok()?).ok()?;
        let (layout, links) = layout.extend(Layout::array::<i32>(capacity).ok()?).ok()?;
        let (layout, buckets) = layout
            .extend(Layout::array::<i32>(capacity.checked_mul(2)?).ok()?)
            .ok()?;
        Some(Self {
            layout: layout.pad_to_align(),
            keys,
            links,
            buckets,
        })
    }
}

/// A copyable snapshot of the backing store: base pointer, offsets and
/// capacity. Valid until the owning table resizes or is dropped.
pub(crate) struct RawParts<K, V> {
    ptr: NonNull<u8>,
    layout: TableLayout,
    capacity: usize,
    marker: PhantomData<(K, V)>,
}

impl<K, V> Clone for RawParts<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for RawParts<K, V> {}

impl<K, V> RawParts<K, V> {
    const fn dangling() -> Self {
        Self {
            ptr: NonNull::dangling(),
            layout: TableLayout::EMPTY,
            capacity: 0,
            marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) const fn capacity(self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) const fn bucket_count(self) -> usize {
        self.capacity * 2
    }

    #[inline]
    pub(crate) fn values(self) -> *mut V {
        self.ptr.as_ptr().cast()
    }

    #[inline]
    pub(crate) fn keys(self) -> *mut K {
        // SAFETY: the offset is inside the allocation (or zero when unallocated).
        unsafe { self.ptr.as_ptr().add(self.layout.keys).cast() }
    }

    #[inline]
    pub(crate) fn links(self) -> *mut i32 {
        // SAFETY: as above.
        unsafe { self.ptr.as_ptr().add(self.layout.links).cast() }
    }

    #[inline]
    pub(crate) fn buckets(self) -> *mut i32 {
        // SAFETY: as above.
        unsafe { self.ptr.as_ptr().add(self.layout.buckets).cast() }
    }

    /// # Safety
    /// `slot` must be below the table's `allocated` mark.
    #[inline]
    pub(crate) unsafe fn key<'a>(self, slot: usize) -> &'a K {
        &*self.keys().add(slot)
    }

    /// # Safety
    /// `slot` must be a live slot whose value was written.
    #[inline]
    pub(crate) unsafe fn value<'a>(self, slot: usize) -> &'a V {
        &*self.values().add(slot)
    }

    /// # Safety
    /// `slot < capacity`, no concurrent atomic access.
    #[inline]
    pub(crate) unsafe fn link(self, slot: usize) -> i32 {
        *self.links().add(slot)
    }

    /// # Safety
    /// `bucket < bucket_count`, no concurrent atomic access.
    #[inline]
    pub(crate) unsafe fn bucket_head(self, bucket: usize) -> i32 {
        *self.buckets().add(bucket)
    }

    #[inline]
    pub(crate) fn bucket_of(self, hash: u64) -> usize {
        (hash as usize) & (self.bucket_count() - 1)
    }

    /// Pushes `slot` onto the front of `bucket`'s chain.
    ///
    /// # Safety
    /// Both indices in bounds, exclusive access.
    #[inline]
    unsafe fn link_front(self, slot: usize, bucket: usize) {
        let head = self.buckets().add(bucket);
        *self.links().add(slot) = *head;
        *head = slot as i32;
    }

    /// Walks the chain of `bucket` for the first slot holding `key`.
    ///
    /// # Safety
    /// The parts must be allocated and not concurrently mutated.
    pub(crate) unsafe fn find_in_bucket(self, bucket: usize, key: &K) -> Option<usize>
    where
        K: Eq,
    {
        let mut slot = self.bucket_head(bucket);
        while slot != NONE {
            let s = slot as usize;
            if self.key(s) == key {
                return Some(s);
            }
            slot = self.link(s);
        }
        None
    }
}

/// Hashes a key with the table's hasher.
#[inline]
pub(crate) fn hash_key<K: Hash + ?Sized, S: BuildHasher>(hash_builder: &S, key: &K) -> u64 {
    let mut hasher = hash_builder.build_hasher();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cold]
#[track_caller]
fn capacity_overflow() -> ! {
    panic!("hash table capacity overflow")
}

/// The hash engine: storage, growth policy, free list and chain maintenance.
pub(crate) struct RawTable<K, V, S, A: RawAlloc> {
    pub(super) parts: RawParts<K, V>,
    pub(super) count: AtomicUsize,
    pub(super) allocated: AtomicUsize,
    pub(super) free: FreeList,
    min_growth_log2: u32,
    pub(super) hash_builder: S,
    alloc: A,
}

// SAFETY: the table owns its keys and values; the raw pointer is uniquely owned.
unsafe impl<K: Send, V: Send, S: Send, A: RawAlloc + Send> Send for RawTable<K, V, S, A> {}
// SAFETY: `&RawTable` only reads, except through the parallel writer whose
// own bounds require `Send` elements.
unsafe impl<K: Sync, V: Sync, S: Sync, A: RawAlloc + Sync> Sync for RawTable<K, V, S, A> {}

impl<K, V, S, A: RawAlloc> RawTable<K, V, S, A> {
    /// A table with no backing store yet; the first insertion allocates.
    pub(crate) fn unallocated(min_growth: usize, hash_builder: S, alloc: A) -> Self {
        Self {
            parts: RawParts::dangling(),
            count: AtomicUsize::new(0),
            allocated: AtomicUsize::new(0),
            free: FreeList::new(),
            min_growth_log2: TableConfig::growth_log2(min_growth),
            hash_builder,
            alloc,
        }
    }

    /// Allocates a table sized for `config`.
    ///
    /// # Errors
    /// `CapacityOverflow` for capacities past the addressable limit and
    /// `Alloc` when the backend fails.
    pub(crate) fn try_with_config(config: TableConfig, hash_builder: S, alloc: A) -> Result<Self> {
        let mut table = Self::unallocated(config.min_growth, hash_builder, alloc);
        let capacity = table.calc_capacity(config.capacity)?;
        table.parts = Self::try_allocate_parts(&table.alloc, capacity)?;
        Ok(table)
    }

    /// Allocates a table sized for `config`, aborting on allocation failure.
    pub(crate) fn with_config(config: TableConfig, hash_builder: S, alloc: A) -> Self {
        let mut table = Self::unallocated(config.min_growth, hash_builder, alloc);
        let capacity = table.calc_capacity(config.capacity).unwrap_or_else(|_| capacity_overflow());
        table.parts = Self::allocate_parts(&table.alloc, capacity);
        table
    }

    fn try_allocate_parts(alloc: &A, capacity: usize) -> Result<RawParts<K, V>> {
        let layout = TableLayout::new::<K, V>(capacity).ok_or(CollectionError::CapacityOverflow)?;
        let ptr = alloc.allocate(layout.layout)?;
        let parts = RawParts {
            ptr,
            layout,
            capacity,
            marker: PhantomData,
        };
        // SAFETY: -1 is all ones, so filling bytes with 0xFF empties every bucket.
        unsafe { ptr::write_bytes(parts.buckets(), 0xFF, parts.bucket_count()) };
        Ok(parts)
    }

    fn allocate_parts(alloc: &A, capacity: usize) -> RawParts<K, V> {
        match Self::try_allocate_parts(alloc, capacity) {
            Ok(parts) => parts,
            Err(CollectionError::Alloc(_)) => {
                let layout = TableLayout::new::<K, V>(capacity).map_or(Layout::new::<u8>(), |l| l.layout);
                handle_alloc_error(layout)
            }
            Err(_) => capacity_overflow(),
        }
    }

    /// # Safety
    /// `parts` must have come from `allocate_parts` with this allocator.
    unsafe fn free_parts(alloc: &A, parts: RawParts<K, V>) {
        if parts.capacity != 0 {
            alloc.deallocate(parts.ptr, parts.layout.layout);
        }
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        self.parts.capacity != 0
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.parts.capacity
    }

    #[inline]
    pub(crate) fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn min_growth(&self) -> usize {
        1 << self.min_growth_log2
    }

    #[inline]
    pub(crate) fn parts(&self) -> RawParts<K, V> {
        self.parts
    }

    #[inline]
    pub(crate) fn hasher(&self) -> &S {
        &self.hash_builder
    }

    #[inline]
    pub(crate) fn allocator(&self) -> &A {
        &self.alloc
    }

    /// `next_pow2(max(requested, len, min_growth))`.
    ///
    /// # Errors
    /// `CapacityOverflow` past [`MAX_CAPACITY`].
    pub(crate) fn calc_capacity(&self, requested: usize) -> Result<usize> {
        let wanted = requested.max(self.len()).max(self.min_growth());
        match wanted.checked_next_power_of_two() {
            Some(capacity) if capacity <= MAX_CAPACITY => Ok(capacity),
            _ => Err(CollectionError::CapacityOverflow),
        }
    }

    /// Iterates over live slots.
    #[inline]
    pub(crate) fn iter(&self) -> RawIter<'_, K, V> {
        // SAFETY: the iterator borrows the table.
        unsafe { RawIter::new(self.parts, self.len()) }
    }

    /// # Safety
    /// `slot` must be live.
    #[inline]
    pub(crate) unsafe fn key(&self, slot: usize) -> &K {
        self.parts.key(slot)
    }

    /// # Safety
    /// `slot` must be live.
    #[inline]
    pub(crate) unsafe fn value(&self, slot: usize) -> &V {
        self.parts.value(slot)
    }

    /// # Safety
    /// `slot` must be live.
    #[inline]
    pub(crate) unsafe fn value_mut(&mut self, slot: usize) -> &mut V {
        &mut *self.parts.values().add(slot)
    }

    /// # Safety
    /// `slot < capacity`.
    #[inline]
    pub(crate) unsafe fn write_value(&mut self, slot: usize, value: V) {
        ptr::write(self.parts.values().add(slot), value);
    }

    /// Resets every chain and the free list, keeping the allocation.
    pub(crate) fn clear(&mut self) {
        if self.is_allocated() {
            // SAFETY: the bucket region is `bucket_count` i32s long.
            unsafe { ptr::write_bytes(self.parts.buckets(), 0xFF, self.parts.bucket_count()) };
        }
        self.free.reset();
        *self.allocated.get_mut() = 0;
        *self.count.get_mut() = 0;
    }
}

impl<K, V, S, A> RawTable<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: RawAlloc,
{
    /// Pops the free list, else claims past the high-water mark, else grows.
    fn claim_slot(&mut self) -> usize {
        // SAFETY: free-listed indices are below capacity.
        if let Some(slot) = unsafe { self.free.pop(self.parts.links()) } {
            return slot;
        }
        let allocated = *self.allocated.get_mut();
        if allocated < self.parts.capacity {
            *self.allocated.get_mut() = allocated + 1;
            return allocated;
        }
        self.grow();
        let allocated = self.allocated.get_mut();
        let slot = *allocated;
        *allocated += 1;
        slot
    }

    fn grow(&mut self) {
        let target = self
            .parts
            .capacity
            .checked_add(self.min_growth())
            .ok_or(CollectionError::CapacityOverflow)
            .and_then(|c| self.calc_capacity(c))
            .unwrap_or_else(|_| capacity_overflow());
        self.resize_to(target);
    }

    /// Replaces the backing store with one of `new_capacity` slots and
    /// re-links every live entry. The only operation that moves slots.
    pub(crate) fn resize_to(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity >= self.len());
        let old = self.parts;
        let new = Self::allocate_parts(&self.alloc, new_capacity);

        let mut next_slot = 0;
        for bucket in 0..old.bucket_count() {
            // SAFETY: walking live chains of the old store; `next_slot` stays
            // below `len <= new_capacity`.
            unsafe {
                let mut slot = old.bucket_head(bucket);
                while slot != NONE {
                    let src = slot as usize;
                    let key = old.keys().add(src);
                    let dst = next_slot;
                    next_slot += 1;
                    ptr::copy_nonoverlapping(key, new.keys().add(dst), 1);
                    ptr::copy_nonoverlapping(old.values().add(src), new.values().add(dst), 1);
                    new.link_front(dst, new.bucket_of(hash_key(&self.hash_builder, &*key)));
                    slot = old.link(src);
                }
            }
        }
        debug_assert_eq!(next_slot, self.len());

        self.parts = new;
        self.free.reset();
        *self.allocated.get_mut() = next_slot;
        // SAFETY: `old` came from this allocator and nothing refers to it now.
        unsafe { Self::free_parts(&self.alloc, old) };

        trace_event!(
            debug,
            old_capacity = old.capacity,
            new_capacity,
            len = next_slot,
            "hash table resized"
        );
    }

    /// Sets the capacity to `calc_capacity(requested)`, rehashing if it changes.
    ///
    /// # Errors
    /// `CapacityBelowLength` if `requested < len`, `CapacityOverflow` past the
    /// addressable limit.
    pub(crate) fn set_capacity(&mut self, requested: usize) -> Result<()> {
        let len = self.len();
        if requested < len {
            return Err(CollectionError::CapacityBelowLength {
                capacity: requested,
                len,
            });
        }
        let capacity = self.calc_capacity(requested)?;
        if capacity != self.parts.capacity {
            self.resize_to(capacity);
        }
        Ok(())
    }

    /// Shrinks to the smallest power of two holding `len`.
    pub(crate) fn trim_excess(&mut self) {
        if !self.is_allocated() {
            return;
        }
        let capacity = self.calc_capacity(self.len()).unwrap_or_else(|_| capacity_overflow());
        if capacity != self.parts.capacity {
            self.resize_to(capacity);
        }
    }

    #[inline]
    pub(crate) fn hash(&self, key: &K) -> u64 {
        hash_key(&self.hash_builder, key)
    }

    /// The slot holding `key`, if any.
    #[inline]
    pub(crate) fn find(&self, key: &K) -> Option<usize> {
        if !self.is_allocated() {
            return None;
        }
        let bucket = self.parts.bucket_of(self.hash(key));
        // SAFETY: allocated, and `&self` excludes mutation.
        unsafe { self.parts.find_in_bucket(bucket, key) }
    }

    /// Claims a slot for `key` unless it is already present.
    ///
    /// Returns `Ok(new_slot)` with the value still unwritten, or
    /// `Err(existing_slot)`.
    pub(crate) fn try_insert_slot(&mut self, key: K) -> core::result::Result<usize, usize> {
        match self.find(&key) {
            Some(slot) => Err(slot),
            None => Ok(self.push_entry(key)),
        }
    }

    /// Claims a slot for `key` without checking for duplicates.
    pub(crate) fn push_entry(&mut self, key: K) -> usize {
        let hash = self.hash(&key);
        let slot = self.claim_slot();
        let parts = self.parts;
        // SAFETY: `claim_slot` returned a slot below capacity of the current store.
        unsafe {
            ptr::write(parts.keys().add(slot), key);
            parts.link_front(slot, parts.bucket_of(hash));
        }
        *self.count.get_mut() += 1;
        slot
    }

    /// Removes the first entry for `key`. Returns the removed slot.
    pub(crate) fn remove_first(&mut self, key: &K) -> Option<usize> {
        let mut removed = None;
        self.remove_matching(key, |slot| {
            removed = Some(slot);
            false
        });
        removed
    }

    /// Removes every entry for `key`. Returns how many were removed.
    pub(crate) fn remove_all(&mut self, key: &K) -> usize {
        let mut removed = 0;
        self.remove_matching(key, |_| {
            removed += 1;
            true
        });
        removed
    }

    /// Unlinks entries for `key`, calling `on_removed` after each; stops when
    /// it returns `false`.
    fn remove_matching(&mut self, key: &K, mut on_removed: impl FnMut(usize) -> bool) {
        if !self.is_allocated() {
            return;
        }
        let parts = self.parts;
        let bucket = parts.bucket_of(self.hash(key));
        let mut prev = NONE;
        // SAFETY: exclusive access; indices come from the chain.
        unsafe {
            let mut slot = parts.bucket_head(bucket);
            while slot != NONE {
                let s = slot as usize;
                let next = parts.link(s);
                if parts.key(s) == key {
                    self.unlink(bucket, prev, s);
                    if !on_removed(s) {
                        return;
                    }
                } else {
                    prev = slot;
                }
                slot = next;
            }
        }
    }

    /// Removes the entry at `slot` if it is live. Used by cursors, whose slot
    /// may have been recycled.
    pub(crate) fn remove_slot(&mut self, slot: usize) -> bool {
        if slot >= self.allocated() {
            return false;
        }
        let parts = self.parts;
        // SAFETY: `slot < allocated`, so its key was written at some point.
        unsafe {
            let bucket = parts.bucket_of(self.hash(parts.key(slot)));
            let mut prev = NONE;
            let mut current = parts.bucket_head(bucket);
            while current != NONE {
                if current as usize == slot {
                    self.unlink(bucket, prev, slot);
                    return true;
                }
                prev = current;
                current = parts.link(current as usize);
            }
        }
        false
    }

    /// # Safety
    /// `slot` is on `bucket`'s chain right after `prev` (or first if `prev` is -1).
    unsafe fn unlink(&mut self, bucket: usize, prev: i32, slot: usize) {
        let parts = self.parts;
        let next = parts.link(slot);
        if prev == NONE {
            *parts.buckets().add(bucket) = next;
        } else {
            *parts.links().add(prev as usize) = next;
        }
        self.free.push(slot, parts.links());
        *self.count.get_mut() -= 1;
    }

    /// Whether `slot` is currently on a bucket chain.
    pub(crate) fn is_live(&self, slot: usize) -> bool {
        if slot >= self.allocated() {
            return false;
        }
        let parts = self.parts;
        // SAFETY: `slot < allocated`.
        unsafe {
            let bucket = parts.bucket_of(self.hash(parts.key(slot)));
            let mut current = parts.bucket_head(bucket);
            while current != NONE {
                if current as usize == slot {
                    return true;
                }
                current = parts.link(current as usize);
            }
        }
        false
    }
}

impl<K, V, S, A: RawAlloc> Drop for RawTable<K, V, S, A> {
    fn drop(&mut self) {
        let parts = mem::replace(&mut self.parts, RawParts::dangling());
        // SAFETY: the store came from this allocator and is no longer reachable.
        unsafe { Self::free_parts(&self.alloc, parts) };
    }
}

/// Walks live slots bucket by bucket: `(bucket, next)` enumeration state.
pub(crate) struct RawIter<'a, K, V> {
    parts: RawParts<K, V>,
    bucket: usize,
    next: i32,
    remaining: usize,
    marker: PhantomData<&'a ()>,
}

impl<K, V> Clone for RawIter<'_, K, V> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<K, V> RawIter<'_, K, V> {
    /// # Safety
    /// `parts` must stay valid and unmodified for the iterator's lifetime, and
    /// `len` must be the number of live entries.
    pub(crate) unsafe fn new(parts: RawParts<K, V>, len: usize) -> Self {
        Self {
            parts,
            bucket: 0,
            next: NONE,
            remaining: len,
            marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn parts(&self) -> RawParts<K, V> {
        self.parts
    }
}

impl<K, V> Iterator for RawIter<'_, K, V> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        loop {
            if self.next != NONE {
                let slot = self.next as usize;
                // SAFETY: `slot` came from a live chain.
                self.next = unsafe { self.parts.link(slot) };
                self.remaining = self.remaining.saturating_sub(1);
                return Some(slot);
            }
            if self.bucket >= self.parts.bucket_count() {
                return None;
            }
            // SAFETY: bucket index in bounds.
            self.next = unsafe { self.parts.bucket_head(self.bucket) };
            self.bucket += 1;
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for RawIter<'_, K, V> {}
