//! Lock-free building blocks shared by the parallel writer views.
//!
//! Cache padding and spin backoff come from `crossbeam-utils`; this module
//! only adds the index free list that the hash engine threads through its
//! chain-link array.

pub(crate) mod free_list;

pub use crossbeam_utils::{Backoff, CachePadded};

use core::sync::atomic::AtomicI32;

/// Views element `index` of a raw `i32` array as an atomic.
///
/// # Safety
/// `base.add(index)` must be in bounds, aligned, and only accessed
/// atomically for the lifetime `'a`.
#[inline]
pub(crate) unsafe fn atomic_link<'a>(base: *mut i32, index: usize) -> &'a AtomicI32 {
    AtomicI32::from_ptr(base.add(index))
}
