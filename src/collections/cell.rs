//! `ValueCell`: a single `Copy` value in allocator-owned memory.

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;
use std::alloc::handle_alloc_error;

use crate::alloc::{Global, RawAlloc};
use crate::error::Result;
use crate::jobs::Dispose;
use crate::safety::SafetyHandle;

/// One value stored in memory obtained from `A`.
///
/// Useful as a shared result slot: a job writes it through `&mut`, and the
/// cell is later disposed together with the other containers of that job.
pub struct ValueCell<T, A: RawAlloc = Global> {
    ptr: NonNull<T>,
    alloc: A,
    safety: SafetyHandle,
}

// SAFETY: the cell owns its value.
unsafe impl<T: Send, A: RawAlloc + Send> Send for ValueCell<T, A> {}
// SAFETY: `&ValueCell` only reads.
unsafe impl<T: Sync, A: RawAlloc + Sync> Sync for ValueCell<T, A> {}

impl<T: Copy> ValueCell<T, Global> {
    /// Stores `value` on the global heap.
    pub fn new(value: T) -> Self {
        Self::new_in(value, Global)
    }
}

impl<T: Copy, A: RawAlloc> ValueCell<T, A> {
    /// Stores `value` in memory from `alloc`, aborting on allocation failure.
    pub fn new_in(value: T, alloc: A) -> Self {
        match Self::try_new_in(value, alloc) {
            Ok(cell) => cell,
            Err(_) => handle_alloc_error(Layout::new::<T>()),
        }
    }

    /// Stores `value` in memory from `alloc`.
    ///
    /// # Errors
    /// `Alloc` if the allocator fails.
    pub fn try_new_in(value: T, alloc: A) -> Result<Self> {
        let ptr = alloc.allocate(Layout::new::<T>())?.cast::<T>();
        // SAFETY: fresh allocation for one `T`.
        unsafe { ptr.as_ptr().write(value) };
        Ok(Self {
            ptr,
            alloc,
            safety: SafetyHandle::new::<Self>(),
        })
    }

    /// Whether the cell holds a value. Construction allocates it, so this
    /// only turns false once the cell is gone.
    pub fn is_created(&self) -> bool {
        self.safety.exists()
    }

    /// Copies the value out.
    pub fn get(&self) -> T {
        *self.value()
    }

    /// The stored value.
    pub fn value(&self) -> &T {
        self.safety.check_exists();
        // SAFETY: initialized in the constructor and owned by `self`.
        unsafe { self.ptr.as_ref() }
    }

    /// The stored value, mutably.
    pub fn value_mut(&mut self) -> &mut T {
        self.safety.check_exists();
        // SAFETY: as above, with exclusive access.
        unsafe { self.ptr.as_mut() }
    }

    /// Replaces the value, returning the old one.
    pub fn set(&mut self, value: T) -> T {
        core::mem::replace(self.value_mut(), value)
    }

    /// Copies the value of `other` into this cell.
    pub fn copy_from<B: RawAlloc>(&mut self, other: &ValueCell<T, B>) {
        self.set(other.get());
    }

    /// A read-only view borrowing the cell.
    pub fn as_read_only(&self) -> ReadOnlyCell<'_, T> {
        ReadOnlyCell { value: self.value() }
    }

    /// The allocator backing the cell.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }
}

impl<T, A: RawAlloc> Drop for ValueCell<T, A> {
    fn drop(&mut self) {
        self.safety.release();
        // SAFETY: allocated in the constructor with this layout.
        unsafe { self.alloc.deallocate(self.ptr.cast(), Layout::new::<T>()) };
    }
}

impl<T, A: RawAlloc> Dispose for ValueCell<T, A> {}

impl<T: Copy + PartialEq, A: RawAlloc, B: RawAlloc> PartialEq<ValueCell<T, B>> for ValueCell<T, A> {
    fn eq(&self, other: &ValueCell<T, B>) -> bool {
        self.value() == other.value()
    }
}

impl<T: Copy + fmt::Debug, A: RawAlloc> fmt::Debug for ValueCell<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueCell").field(self.value()).finish()
    }
}

/// A borrowed read-only view of a [`ValueCell`].
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyCell<'a, T> {
    value: &'a T,
}

impl<'a, T: Copy> ReadOnlyCell<'a, T> {
    /// Copies the value out.
    pub fn get(&self) -> T {
        *self.value
    }

    /// The stored value.
    pub fn value(&self) -> &'a T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::CountingAlloc;

    #[test]
    fn set_and_copy() {
        let mut a = ValueCell::new(3u64);
        let b = ValueCell::new(9u64);
        assert_eq!(a.set(4), 3);
        a.copy_from(&b);
        assert_eq!(a, b);
        *a.value_mut() += 1;
        assert_eq!(a.as_read_only().get(), 10);
    }

    #[test]
    fn frees_on_drop() {
        let counter = CountingAlloc::new();
        {
            let cell = ValueCell::new_in([7u32; 4], &counter);
            assert_eq!(counter.live_bytes(), 16);
            assert_eq!(cell.get()[3], 7);
        }
        assert_eq!(counter.live_blocks(), 0);
    }

    #[test]
    fn zero_sized_values() {
        let cell = ValueCell::new(());
        assert!(cell.is_created());
        let () = cell.get();
    }
}
