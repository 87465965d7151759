use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::alloc::allocator::{AllocError, Global, RawAlloc};

/// Wraps a backend and tracks how many blocks and bytes are currently live.
///
/// Containers usually borrow it (`&CountingAlloc`) so the counters can be
/// inspected after the container is gone.
#[derive(Debug, Default)]
pub struct CountingAlloc<A = Global> {
    inner: A,
    live_blocks: AtomicUsize,
    live_bytes: AtomicUsize,
    total_allocations: AtomicUsize,
}

impl CountingAlloc<Global> {
    /// Counts allocations made from the global heap.
    pub const fn new() -> Self {
        Self::wrap(Global)
    }
}

impl<A> CountingAlloc<A> {
    /// Counts allocations made from `inner`.
    pub const fn wrap(inner: A) -> Self {
        Self {
            inner,
            live_blocks: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
            total_allocations: AtomicUsize::new(0),
        }
    }

    /// Blocks allocated and not yet freed.
    pub fn live_blocks(&self) -> usize {
        self.live_blocks.load(Ordering::Acquire)
    }

    /// Bytes allocated and not yet freed.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Acquire)
    }

    /// Allocations performed since construction.
    pub fn total_allocations(&self) -> usize {
        self.total_allocations.load(Ordering::Acquire)
    }
}

impl<A: RawAlloc> RawAlloc for CountingAlloc<A> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.inner.allocate(layout)?;
        self.record_alloc(layout);
        Ok(ptr)
    }

    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.inner.allocate_zeroed(layout)?;
        self.record_alloc(layout);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.inner.deallocate(ptr, layout);
        self.live_blocks.fetch_sub(1, Ordering::AcqRel);
        self.live_bytes.fetch_sub(layout.size(), Ordering::AcqRel);
    }
}

impl<A> CountingAlloc<A> {
    fn record_alloc(&self, layout: Layout) {
        self.live_blocks.fetch_add(1, Ordering::AcqRel);
        self.live_bytes.fetch_add(layout.size(), Ordering::AcqRel);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
    }
}
