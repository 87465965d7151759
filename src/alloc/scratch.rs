use core::alloc::Layout;
use core::ptr::NonNull;
use std::sync::{Mutex, PoisonError};

use crate::alloc::allocator::{dangling_for, AllocError, Global, RawAlloc};
use crate::macros::trace_event;

const FIRST_CHUNK: usize = 4 * 1024;
const MAX_CHUNK: usize = 1024 * 1024;
const CHUNK_ALIGN: usize = 16;

/// A chunk of memory in the scratch arena.
struct Chunk {
    ptr: NonNull<u8>,
    layout: Layout,
    allocated: usize,
}

impl Chunk {
    fn new(size: usize, align: usize) -> Result<Self, AllocError> {
        let layout = Layout::from_size_align(size, align.max(CHUNK_ALIGN)).map_err(|_| AllocError)?;
        let ptr = Global.allocate(layout)?;
        trace_event!(trace, size, "scratch arena chunk allocated");
        Ok(Self {
            ptr,
            layout,
            allocated: 0,
        })
    }

    fn try_alloc(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        let start = self.ptr.as_ptr() as usize;
        let current = start + self.allocated;

        let align_offset = (current as *const u8).align_offset(layout.align());
        if align_offset == usize::MAX {
            return None;
        }

        let aligned = current.checked_add(align_offset)?;
        let end = aligned.checked_add(layout.size())?;

        if end <= start + self.layout.size() {
            self.allocated = end - start;
            // SAFETY: `aligned` lies inside this chunk, which is non-null.
            Some(unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(aligned - start)) })
        } else {
            None
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: the chunk owns this block and it was allocated by `Global`.
        unsafe { Global.deallocate(self.ptr, self.layout) };
    }
}

// SAFETY: a chunk is plain owned memory.
unsafe impl Send for Chunk {}

#[derive(Default)]
struct ScratchState {
    full: Vec<Chunk>,
    current: Option<Chunk>,
}

/// A bump arena for short-lived containers (the "temporary" allocator kind).
///
/// Containers borrow the arena (`HashMap<K, V, S, &ScratchArena>`), so the
/// borrow checker keeps every container inside the arena's scope. Freeing a
/// block is a no-op; all memory comes back at once on [`ScratchArena::reset`]
/// or when the arena is dropped.
pub struct ScratchArena {
    state: Mutex<ScratchState>,
}

impl ScratchArena {
    /// Creates an empty arena. The first chunk is allocated lazily.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScratchState::default()),
        }
    }

    /// Releases every chunk. Requires `&mut self`, so no container can still
    /// be borrowing the arena.
    pub fn reset(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.full.clear();
        state.current = None;
    }

    /// Bytes handed out since the last reset, including alignment padding.
    pub fn allocated_bytes(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.full.iter().map(|c| c.allocated).sum::<usize>()
            + state.current.as_ref().map_or(0, |c| c.allocated)
    }

    fn next_chunk_size(current: usize, layout: Layout) -> usize {
        let grown = (current * 2).clamp(FIRST_CHUNK, MAX_CHUNK);
        grown.max(layout.size() + layout.align())
    }
}

impl Default for ScratchArena {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAlloc for ScratchArena {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(ptr) = state.current.as_mut().and_then(|c| c.try_alloc(layout)) {
            return Ok(ptr);
        }

        let previous = state.current.as_ref().map_or(0, |c| c.layout.size());
        let mut chunk = Chunk::new(Self::next_chunk_size(previous, layout), layout.align())?;
        let ptr = chunk.try_alloc(layout).ok_or(AllocError)?;
        if let Some(full) = state.current.replace(chunk) {
            state.full.push(full);
        }
        Ok(ptr)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        // No-op: memory is reclaimed by `reset` or when the arena is dropped.
    }
}
