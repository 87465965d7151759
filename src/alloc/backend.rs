//! Adapters from `GlobalAlloc` implementations to [`RawAlloc`].

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;

use crate::alloc::allocator::{dangling_for, AllocError, RawAlloc};

/// Wraps any `GlobalAlloc` so containers can allocate from it directly
/// without installing it as the process allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalBackend<G>(pub G);

impl<G: GlobalAlloc> RawAlloc for GlobalBackend<G> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }
        // SAFETY: non-zero size.
        NonNull::new(unsafe { self.0.alloc(layout) }).ok_or(AllocError)
    }

    #[inline]
    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }
        // SAFETY: non-zero size.
        NonNull::new(unsafe { self.0.alloc_zeroed(layout) }).ok_or(AllocError)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            self.0.dealloc(ptr.as_ptr(), layout);
        }
    }
}

/// `std::alloc::System` as a container backend.
pub type SystemBackend = GlobalBackend<std::alloc::System>;

/// mimalloc as a container backend.
#[cfg(feature = "alloc-mimalloc")]
pub type MiMallocBackend = GlobalBackend<mimalloc::MiMalloc>;

/// snmalloc as a container backend.
#[cfg(feature = "alloc-snmalloc")]
pub type SnMallocBackend = GlobalBackend<snmalloc_rs::SnMalloc>;

/// jemalloc as a container backend.
#[cfg(feature = "alloc-jemalloc")]
pub type JemallocBackend = GlobalBackend<jemallocator::Jemalloc>;
