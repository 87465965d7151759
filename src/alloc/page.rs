//! Page-granular backend that maps memory straight from the OS.
//!
//! Large hash tables spend most of their life at a single capacity; mapping
//! their one backing buffer directly avoids fragmenting the process heap and
//! returns the pages to the OS as soon as the container is disposed.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::alloc::allocator::{dangling_for, AllocError, RawAlloc};
use crate::alloc::syscall::{map_pages, unmap_pages};

/// Granularity used for every region request.
pub const PAGE_SIZE: usize = 4096;

/// Rounds `value` up to a multiple of `align` (a power of two, or zero for no rounding).
pub const fn align_up(value: usize, align: usize) -> usize {
    if align == 0 {
        value
    } else {
        (value + (align - 1)) & !(align - 1)
    }
}

/// A backend that hands out whole pages (`mmap` / `VirtualAlloc`).
///
/// Requests are rounded up to [`PAGE_SIZE`]; alignments larger than a page
/// are rejected. Memory is always zero-filled by the OS.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageAlloc;

impl RawAlloc for PageAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.align() > PAGE_SIZE {
            return Err(AllocError);
        }
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }
        let len = align_up(layout.size(), PAGE_SIZE);
        // SAFETY: `len` is a non-zero whole number of pages.
        unsafe { map_pages(len) }
    }

    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        // Fresh anonymous mappings are already zeroed.
        self.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            unmap_pages(ptr, align_up(layout.size(), PAGE_SIZE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_pages() {
        assert_eq!(align_up(1, PAGE_SIZE), PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE, PAGE_SIZE), PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE + 1, PAGE_SIZE), 2 * PAGE_SIZE);
        assert_eq!(align_up(17, 0), 17);
    }

    #[test]
    fn pages_are_aligned_and_zeroed() {
        let layout = Layout::from_size_align(10_000, 64).unwrap();
        let ptr = PageAlloc.allocate(layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % PAGE_SIZE, 0);
        unsafe {
            let bytes = core::slice::from_raw_parts_mut(ptr.as_ptr(), layout.size());
            assert!(bytes.iter().all(|&b| b == 0));
            bytes[9_999] = 0xAB;
            PageAlloc.deallocate(ptr, layout);
        }
    }

    #[test]
    fn over_aligned_requests_fail() {
        let layout = Layout::from_size_align(64, 2 * PAGE_SIZE).unwrap();
        assert_eq!(PageAlloc.allocate(layout), Err(AllocError));
    }
}
