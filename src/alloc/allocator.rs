use core::alloc::Layout;
use core::ptr::{self, NonNull};
use std::sync::Arc;

/// A raw memory backend for the unmanaged containers.
///
/// This trait is similar to `std::alloc::Allocator` but stays usable on stable
/// Rust. Every container in this crate takes its backend as a type parameter,
/// so the same hash map code runs over the global heap, OS pages, a scratch
/// arena or any `GlobalAlloc`.
///
/// Implementations must be usable through a shared reference: the parallel
/// writer views allocate from `&self` while several threads hold the writer.
pub trait RawAlloc {
    /// Allocates memory according to the given layout.
    ///
    /// Zero-sized layouts must succeed and return a well-aligned dangling
    /// pointer that is never dereferenced.
    ///
    /// # Errors
    /// Returns `AllocError` if the backend cannot satisfy the request.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Allocates zero-initialized memory.
    ///
    /// # Errors
    /// Returns `AllocError` if the backend cannot satisfy the request.
    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.allocate(layout)?;
        // SAFETY: `allocate` returned a block of at least `layout.size()` bytes.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, layout.size()) };
        Ok(ptr)
    }

    /// Deallocates memory.
    ///
    /// # Safety
    /// `ptr` must denote a block of memory currently allocated by this allocator.
    /// `layout` must be the same layout that was used to allocate that block of memory.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

impl<A: RawAlloc + ?Sized> RawAlloc for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate_zeroed(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout);
    }
}

impl<A: RawAlloc + ?Sized> RawAlloc for Arc<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate_zeroed(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout);
    }
}

/// The process-wide heap (`std::alloc`), the persistent default backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Global;

impl RawAlloc for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }
        // SAFETY: the layout has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc(layout) }).ok_or(AllocError)
    }

    #[inline]
    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }
        // SAFETY: the layout has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) }).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            std::alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}

/// Returns a non-null pointer aligned for `layout` that must never be read.
#[inline]
pub(crate) fn dangling_for(layout: Layout) -> NonNull<u8> {
    // SAFETY: alignments are non-zero, so the address is never null.
    unsafe { NonNull::new_unchecked(ptr::null_mut::<u8>().wrapping_add(layout.align())) }
}

/// The error type for allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl std::error::Error for AllocError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_round_trip() {
        let layout = Layout::array::<u64>(16).unwrap();
        let ptr = Global.allocate_zeroed(layout).unwrap();
        unsafe {
            let words = ptr.as_ptr().cast::<u64>();
            assert_eq!(*words.add(15), 0);
            *words.add(3) = 7;
            assert_eq!(*words.add(3), 7);
            Global.deallocate(ptr, layout);
        }
    }

    #[test]
    fn zero_sized_requests_are_aligned() {
        let layout = Layout::from_size_align(0, 64).unwrap();
        let ptr = Global.allocate(layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
        unsafe { Global.deallocate(ptr, layout) };
    }
}
