//! A lock-free free list of slot indices.
//!
//! This is a Treiber stack whose `next` pointers live in an external `i32`
//! array (the hash table's chain links), so the list itself is one word:
//! - the low 32 bits hold the head index (`-1` for empty)
//! - the high 32 bits hold a tag bumped by every shared push/pop
//!
//! The tag makes the shared pop immune to ABA: a head that was popped and
//! pushed back between our load and our CAS has a different tag.
//!
//! The exclusive `push`/`pop` take `&mut self` and skip atomics entirely.

use core::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::Backoff;

use crate::concurrency::atomic_link;

/// Sentinel for an empty list or a null link.
pub(crate) const NONE: i32 = -1;

#[inline]
const fn pack(index: i32, tag: u32) -> u64 {
    ((tag as u64) << 32) | (index as u32 as u64)
}

#[inline]
const fn index_of(word: u64) -> i32 {
    word as u32 as i32
}

#[inline]
const fn tag_of(word: u64) -> u32 {
    (word >> 32) as u32
}

#[derive(Debug)]
pub(crate) struct FreeList {
    head: AtomicU64,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self {
            head: AtomicU64::new(pack(NONE, 0)),
        }
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        let tag = tag_of(*self.head.get_mut());
        *self.head.get_mut() = pack(NONE, tag);
    }

    #[cfg(test)]
    pub(crate) fn head(&mut self) -> i32 {
        index_of(*self.head.get_mut())
    }

    /// Pushes `slot` with exclusive access.
    ///
    /// # Safety
    /// `links` must point to an array with more than `slot` elements.
    #[inline]
    pub(crate) unsafe fn push(&mut self, slot: usize, links: *mut i32) {
        let word = self.head.get_mut();
        *links.add(slot) = index_of(*word);
        *word = pack(slot as i32, tag_of(*word));
    }

    /// Pops a slot with exclusive access.
    ///
    /// # Safety
    /// Every index on the list must be in bounds of `links`.
    #[inline]
    pub(crate) unsafe fn pop(&mut self, links: *mut i32) -> Option<usize> {
        let word = self.head.get_mut();
        let head = index_of(*word);
        if head == NONE {
            return None;
        }
        *word = pack(*links.add(head as usize), tag_of(*word));
        Some(head as usize)
    }

    /// Pushes `slot` while other threads may push and pop concurrently.
    ///
    /// # Safety
    /// `links` must be in bounds for `slot` and accessed only atomically while
    /// shared operations are in flight. `slot` must not already be on the list.
    pub(crate) unsafe fn push_shared(&self, slot: usize, links: *mut i32) {
        let link = atomic_link(links, slot);
        let backoff = Backoff::new();
        let mut word = self.head.load(Ordering::Acquire);
        loop {
            link.store(index_of(word), Ordering::Relaxed);
            let new = pack(slot as i32, tag_of(word).wrapping_add(1));
            match self
                .head
                .compare_exchange_weak(word, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(current) => {
                    word = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Pops a slot while other threads may push and pop concurrently.
    ///
    /// # Safety
    /// Same as [`FreeList::push_shared`], for every index on the list.
    pub(crate) unsafe fn pop_shared(&self, links: *mut i32) -> Option<usize> {
        let backoff = Backoff::new();
        let mut word = self.head.load(Ordering::Acquire);
        loop {
            let head = index_of(word);
            if head == NONE {
                return None;
            }
            let next = atomic_link(links, head as usize).load(Ordering::Relaxed);
            let new = pack(next, tag_of(word).wrapping_add(1));
            match self
                .head
                .compare_exchange_weak(word, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(head as usize),
                Err(current) => {
                    word = current;
                    backoff.spin();
                }
            }
        }
    }
}
