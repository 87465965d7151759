use core::alloc::Layout;
use core::fmt;
use core::mem;
use core::ptr::{self, NonNull};
use std::alloc::handle_alloc_error;

use zerocopy::{AsBytes, FromBytes};

use crate::alloc::{Global, RawAlloc};
use crate::collections::buffer::{Reader, ABSENT_LEN};
use crate::error::{CollectionError, Result};
use crate::jobs::Dispose;
use crate::macros::trace_event;
use crate::safety::SafetyHandle;

/// A growable byte buffer with push/pop at the tail only.
///
/// ```
/// use native_containers::collections::AppendBuffer;
///
/// let mut buffer = AppendBuffer::new(16, 4);
/// buffer.add(7i32);
/// buffer.add(9u8);
///
/// let mut reader = buffer.reader();
/// assert_eq!(reader.read_next::<i32>(), 7);
/// assert_eq!(reader.read_next::<u8>(), 9);
/// assert!(reader.end_of_buffer());
/// ```
pub struct AppendBuffer<A: RawAlloc = Global> {
    ptr: NonNull<u8>,
    len: usize,
    capacity: usize,
    alignment: usize,
    /// `None` when the memory belongs to the caller.
    alloc: Option<A>,
    safety: SafetyHandle,
}

// SAFETY: the buffer owns (or exclusively borrows) plain bytes.
unsafe impl<A: RawAlloc + Send> Send for AppendBuffer<A> {}
// SAFETY: `&AppendBuffer` only reads.
unsafe impl<A: RawAlloc + Sync> Sync for AppendBuffer<A> {}

#[cold]
#[track_caller]
fn growth_failed(err: CollectionError) -> ! {
    panic!("append buffer cannot grow: {err}")
}

impl AppendBuffer<Global> {
    /// Creates a buffer on the global heap.
    ///
    /// # Panics
    /// Panics if `alignment` is not a power of two.
    pub fn new(capacity: usize, alignment: usize) -> Self {
        Self::new_in(capacity, alignment, Global)
    }

    /// Wraps caller-owned memory. The buffer never frees it and cannot grow
    /// past `capacity`.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `capacity` bytes for the
    /// buffer's lifetime, the first `len` bytes must be initialized, and
    /// `len <= capacity`.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize, capacity: usize) -> Self {
        Self {
            ptr,
            len,
            capacity,
            alignment: 1,
            alloc: None,
            safety: SafetyHandle::new::<Self>(),
        }
    }
}

impl<A: RawAlloc> AppendBuffer<A> {
    /// Creates a buffer whose memory comes from `alloc` with the given
    /// alignment.
    ///
    /// # Panics
    /// Panics if `alignment` is not a power of two; aborts if the allocator
    /// fails.
    pub fn new_in(capacity: usize, alignment: usize, alloc: A) -> Self {
        let layout = match Layout::from_size_align(capacity, alignment) {
            Ok(layout) => layout,
            Err(_) => panic!("invalid append buffer layout: {capacity} bytes aligned to {alignment}"),
        };
        let Ok(ptr) = alloc.allocate(layout) else {
            handle_alloc_error(layout)
        };
        Self {
            ptr,
            len: 0,
            capacity,
            alignment,
            alloc: Some(alloc),
            safety: SafetyHandle::new::<Self>(),
        }
    }

    /// Whether the buffer has backing memory. A zero-capacity buffer has
    /// none until its first write.
    pub fn is_created(&self) -> bool {
        self.capacity != 0
    }

    /// Bytes written.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes available without growing.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Alignment of the backing memory.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Whether the buffer frees (and may reallocate) its memory.
    pub fn is_owned(&self) -> bool {
        self.alloc.is_some()
    }

    /// The written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.safety.check_exists();
        // SAFETY: the first `len` bytes are initialized.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Pointer to the first byte.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Forgets the contents, keeping the memory.
    pub fn clear(&mut self) {
        self.safety.check_write();
        self.len = 0;
    }

    /// Reallocates to exactly `capacity` bytes.
    ///
    /// # Errors
    /// `CapacityBelowLength` if `capacity < len`, `BufferNotOwned` for
    /// caller-owned memory, `Alloc` if the allocator fails.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        self.safety.check_write();
        if capacity < self.len {
            return Err(CollectionError::CapacityBelowLength {
                capacity,
                len: self.len,
            });
        }
        if capacity == self.capacity {
            return Ok(());
        }
        self.reallocate(capacity)
    }

    /// Ensures room for `additional` more bytes, growing to at least double
    /// the current capacity.
    ///
    /// # Errors
    /// `BufferNotOwned` for caller-owned memory that is too small,
    /// `CapacityOverflow`, or `Alloc`.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .len
            .checked_add(additional)
            .ok_or(CollectionError::CapacityOverflow)?;
        if needed <= self.capacity {
            return Ok(());
        }
        let target = needed.max(self.capacity.saturating_mul(2));
        self.reallocate(target)
    }

    fn reallocate(&mut self, capacity: usize) -> Result<()> {
        let Some(alloc) = self.alloc.as_ref() else {
            return Err(CollectionError::BufferNotOwned);
        };
        let new_layout =
            Layout::from_size_align(capacity, self.alignment).map_err(|_| CollectionError::CapacityOverflow)?;
        let new_ptr = alloc.allocate(new_layout)?;
        // SAFETY: both blocks hold at least `len` bytes and do not overlap;
        // the old block was allocated with the old layout.
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len);
            let old_layout = Layout::from_size_align_unchecked(self.capacity, self.alignment);
            alloc.deallocate(self.ptr, old_layout);
        }
        trace_event!(trace, old = self.capacity, capacity, "append buffer reallocated");
        self.ptr = new_ptr;
        self.capacity = capacity;
        Ok(())
    }

    /// Sets the length, zero-filling any newly exposed bytes.
    ///
    /// # Errors
    /// As [`AppendBuffer::reserve`].
    pub fn resize_zeroed(&mut self, len: usize) -> Result<()> {
        self.safety.check_write();
        if len > self.len {
            self.reserve(len - self.len)?;
            // SAFETY: `reserve` made room for `len` bytes.
            unsafe { ptr::write_bytes(self.ptr.as_ptr().add(self.len), 0, len - self.len) };
        }
        self.len = len;
        Ok(())
    }

    /// Appends raw bytes.
    ///
    /// # Panics
    /// Panics if the buffer has to grow and cannot.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.safety.check_write();
        if let Err(err) = self.reserve(bytes.len()) {
            growth_failed(err);
        }
        // SAFETY: room reserved above; `bytes` cannot alias our buffer while
        // we hold `&mut self`.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(self.len), bytes.len());
        }
        self.len += bytes.len();
    }

    /// Appends the bytes of `value`.
    pub fn add<T: AsBytes>(&mut self, value: T) {
        self.add_bytes(value.as_bytes());
    }

    /// Appends an `i32` length followed by the elements.
    ///
    /// # Panics
    /// Panics if `values` has more than `i32::MAX` elements.
    pub fn add_array<T: AsBytes>(&mut self, values: &[T]) {
        self.add(length_prefix(values.len()));
        self.add_bytes(values.as_bytes());
    }

    /// Appends a length-prefixed UTF-8 string, or `-1` for `None`.
    pub fn add_str(&mut self, value: Option<&str>) {
        match value {
            Some(text) => {
                self.add(length_prefix(text.len()));
                self.add_bytes(text.as_bytes());
            }
            None => self.add(ABSENT_LEN),
        }
    }

    /// Removes and returns the last `size_of::<T>()` bytes as a `T`.
    ///
    /// # Panics
    /// Panics if fewer bytes remain.
    pub fn pop<T: FromBytes>(&mut self) -> T {
        match self.try_pop() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Removes and returns the last `size_of::<T>()` bytes as a `T`.
    ///
    /// # Errors
    /// `EndOfBuffer` if fewer bytes remain.
    pub fn try_pop<T: FromBytes>(&mut self) -> Result<T> {
        self.safety.check_write();
        let size = mem::size_of::<T>();
        let start = self.len.checked_sub(size).ok_or(CollectionError::EndOfBuffer {
            needed: size,
            remaining: self.len,
        })?;
        let value = T::read_from(&self.as_bytes()[start..]).ok_or(CollectionError::EndOfBuffer {
            needed: size,
            remaining: self.len,
        })?;
        self.len = start;
        Ok(value)
    }

    /// A reader positioned at the first byte.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(self.as_bytes())
    }

    /// A read-only view borrowing the buffer.
    pub fn as_read_only(&self) -> ReadOnlyBuffer<'_> {
        ReadOnlyBuffer {
            bytes: self.as_bytes(),
        }
    }
}

/// A borrowed, read-only view of an [`AppendBuffer`]'s bytes.
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyBuffer<'a> {
    bytes: &'a [u8],
}

impl<'a> ReadOnlyBuffer<'a> {
    /// Bytes written when the view was taken.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer was empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The written bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// A fresh reader positioned at the first byte.
    pub fn reader(&self) -> Reader<'a> {
        Reader::new(self.bytes)
    }
}

fn length_prefix(len: usize) -> i32 {
    match i32::try_from(len) {
        Ok(len) => len,
        Err(_) => panic!("{} elements do not fit an i32 length prefix", len),
    }
}

impl<A: RawAlloc> Drop for AppendBuffer<A> {
    fn drop(&mut self) {
        self.safety.release();
        if let Some(alloc) = self.alloc.as_ref() {
            // SAFETY: allocated by `alloc` with this layout.
            unsafe {
                let layout = Layout::from_size_align_unchecked(self.capacity, self.alignment);
                alloc.deallocate(self.ptr, layout);
            }
        }
    }
}

impl<A: RawAlloc> Dispose for AppendBuffer<A> {}

impl<A: RawAlloc> fmt::Debug for AppendBuffer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppendBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("alignment", &self.alignment)
            .field("owned", &self.is_owned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::CountingAlloc;

    #[test]
    fn pop_is_the_reverse_of_add() {
        let mut buffer = AppendBuffer::new(0, 8);
        buffer.add(1u16);
        buffer.add(2.5f64);
        buffer.add(3u8);
        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.pop::<u8>(), 3);
        assert_eq!(buffer.pop::<f64>(), 2.5);
        assert_eq!(buffer.pop::<u16>(), 1);
        assert!(buffer.try_pop::<u8>().is_err());
    }

    #[test]
    fn growth_at_least_doubles() {
        let mut buffer = AppendBuffer::new(8, 4);
        buffer.add_bytes(&[0; 9]);
        assert_eq!(buffer.capacity(), 16);
        buffer.add_bytes(&[0; 100]);
        assert_eq!(buffer.capacity(), 109);
    }

    #[test]
    fn set_capacity_rejects_shrinking_below_len() {
        let mut buffer = AppendBuffer::new(8, 1);
        buffer.add(7u32);
        assert_eq!(
            buffer.set_capacity(2),
            Err(CollectionError::CapacityBelowLength { capacity: 2, len: 4 })
        );
        buffer.set_capacity(4).unwrap();
        assert_eq!(buffer.as_bytes(), &7u32.to_ne_bytes());
    }

    #[test]
    fn caller_owned_memory_is_not_freed_or_grown() {
        let mut storage = [0u8; 8];
        let ptr = NonNull::new(storage.as_mut_ptr()).unwrap();
        let mut buffer = unsafe { AppendBuffer::from_raw_parts(ptr, 0, storage.len()) };
        buffer.add(5u32);
        buffer.add(6u32);
        assert_eq!(buffer.reserve(1), Err(CollectionError::BufferNotOwned));
        drop(buffer);
        assert_eq!(&storage[..4], &5u32.to_ne_bytes());
    }

    #[test]
    #[should_panic(expected = "cannot grow")]
    fn caller_owned_memory_panics_on_overflow() {
        let mut storage = [0u8; 2];
        let ptr = NonNull::new(storage.as_mut_ptr()).unwrap();
        let mut buffer = unsafe { AppendBuffer::from_raw_parts(ptr, 0, storage.len()) };
        buffer.add(5u32);
    }

    #[test]
    fn clear_keeps_memory_and_views_read_independently() {
        let mut buffer = AppendBuffer::new(0, 4);
        assert!(!buffer.is_created());
        buffer.add(3u16);
        buffer.add_str(Some("hi"));
        assert!(buffer.is_created());

        let view = buffer.as_read_only();
        let (mut first, mut second) = (view.reader(), view.reader());
        assert_eq!(first.read_next::<u16>(), 3);
        assert_eq!(second.read_next::<u16>(), 3);
        assert_eq!(first.read_next_str(), Ok(Some("hi")));
        assert_eq!(view.len(), 8);

        let capacity = buffer.capacity();
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.is_created());
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn frees_through_its_allocator() {
        let counter = CountingAlloc::new();
        let mut buffer = AppendBuffer::new_in(4, 4, &counter);
        buffer.add_array(&[1u64, 2, 3]);
        assert_eq!(counter.live_blocks(), 1);
        drop(buffer);
        assert_eq!(counter.live_blocks(), 0);
    }
}
