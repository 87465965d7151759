//! Thin OS mapping calls behind [`PageAlloc`](super::PageAlloc).
//!
//! Callers pass lengths already rounded to whole pages and never zero.

use core::ptr::NonNull;

use crate::alloc::allocator::AllocError;
use crate::macros::trace_event;

/// Maps `len` bytes of fresh, zero-filled, read-write memory.
///
/// # Safety
/// `len` is a non-zero multiple of the page size.
#[cfg(unix)]
pub(crate) unsafe fn map_pages(len: usize) -> Result<NonNull<u8>, AllocError> {
    let mapped = libc::mmap(
        core::ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANON,
        -1,
        0,
    );
    if mapped == libc::MAP_FAILED {
        trace_event!(warn, len, "mmap failed");
        return Err(AllocError);
    }
    NonNull::new(mapped.cast::<u8>()).ok_or(AllocError)
}

/// Returns a mapping made by [`map_pages`] to the OS.
///
/// # Safety
/// `base` and `len` describe exactly one live mapping from `map_pages`.
#[cfg(unix)]
pub(crate) unsafe fn unmap_pages(base: NonNull<u8>, len: usize) {
    let _status = libc::munmap(base.as_ptr().cast::<libc::c_void>(), len);
    trace_event!(trace, len, status = _status, "pages unmapped");
}

/// Maps `len` bytes of fresh, zero-filled, read-write memory.
///
/// # Safety
/// `len` is a non-zero multiple of the page size.
#[cfg(windows)]
pub(crate) unsafe fn map_pages(len: usize) -> Result<NonNull<u8>, AllocError> {
    use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};

    let mapped = VirtualAlloc(core::ptr::null_mut(), len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE);
    let result = NonNull::new(mapped.cast::<u8>()).ok_or(AllocError);
    if result.is_err() {
        trace_event!(warn, len, "VirtualAlloc failed");
    }
    result
}

/// Returns a mapping made by [`map_pages`] to the OS.
///
/// # Safety
/// `base` is the start of one live mapping from `map_pages`.
#[cfg(windows)]
pub(crate) unsafe fn unmap_pages(base: NonNull<u8>, _len: usize) {
    use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};

    // MEM_RELEASE drops the whole reservation and requires a zero size.
    let _released = VirtualFree(base.as_ptr().cast::<core::ffi::c_void>(), 0, MEM_RELEASE);
    trace_event!(trace, len = _len, released = _released, "pages released");
}
