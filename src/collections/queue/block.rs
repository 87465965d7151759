//! Fixed-size blocks backing [`Queue`](super::Queue).
//!
//! Each block is one allocation: a header followed by `per_block` element
//! slots. `reserved` counts the positions handed out in this block; parallel
//! writers may push it past `per_block` when they race for the last slot, so
//! the number of filled slots is `min(reserved, per_block)`.

use core::alloc::Layout;
use core::mem;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::alloc::handle_alloc_error;

use crate::alloc::RawAlloc;
use crate::macros::trace_event;

/// Bytes per block, header included.
pub const BLOCK_BYTES: usize = 16 * 1024;

#[repr(C)]
pub(crate) struct BlockHeader {
    pub(crate) next: AtomicPtr<BlockHeader>,
    pub(crate) reserved: AtomicUsize,
}

/// Layout of a block for one element type.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockGeometry {
    layout: Layout,
    data_offset: usize,
    pub(crate) per_block: usize,
}

impl BlockGeometry {
    pub(crate) fn of<T>() -> Self {
        let header = Layout::new::<BlockHeader>();
        let data_offset = header.size().next_multiple_of(mem::align_of::<T>());
        let per_block = match mem::size_of::<T>() {
            0 => BLOCK_BYTES,
            size => (BLOCK_BYTES.saturating_sub(data_offset) / size).max(1),
        };
        let align = header.align().max(mem::align_of::<T>());
        let size = data_offset + per_block * mem::size_of::<T>();
        match Layout::from_size_align(size, align) {
            Ok(layout) => Self {
                layout: layout.pad_to_align(),
                data_offset,
                per_block,
            },
            Err(_) => panic!("queue element type is too large for a block"),
        }
    }

    /// Allocates an empty block with `reserved` preset.
    pub(crate) fn allocate<A: RawAlloc>(&self, alloc: &A, reserved: usize) -> NonNull<BlockHeader> {
        let Ok(ptr) = alloc.allocate(self.layout) else {
            handle_alloc_error(self.layout)
        };
        let block = ptr.cast::<BlockHeader>();
        // SAFETY: fresh allocation sized and aligned for the header.
        unsafe {
            block.as_ptr().write(BlockHeader {
                next: AtomicPtr::new(ptr::null_mut()),
                reserved: AtomicUsize::new(reserved),
            });
        }
        trace_event!(trace, per_block = self.per_block, "queue block allocated");
        block
    }

    /// # Safety
    /// `block` came from `allocate` with the same allocator and geometry.
    pub(crate) unsafe fn free<A: RawAlloc>(&self, alloc: &A, block: NonNull<BlockHeader>) {
        alloc.deallocate(block.cast(), self.layout);
    }

    /// Pointer to element `index` of `block`.
    ///
    /// # Safety
    /// `index < per_block`.
    #[inline]
    pub(crate) unsafe fn slot<T>(&self, block: NonNull<BlockHeader>, index: usize) -> *mut T {
        block.as_ptr().cast::<u8>().add(self.data_offset).cast::<T>().add(index)
    }

    /// Number of written slots in `block`.
    ///
    /// # Safety
    /// `block` is live.
    #[inline]
    pub(crate) unsafe fn filled(&self, block: NonNull<BlockHeader>) -> usize {
        block.as_ref().reserved.load(Ordering::Acquire).min(self.per_block)
    }
}
