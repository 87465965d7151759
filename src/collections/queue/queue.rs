use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::alloc::{Global, RawAlloc};
use crate::collections::queue::block::{BlockGeometry, BlockHeader};
use crate::collections::queue::parallel::ParallelWriter;
use crate::error::{CollectionError, Result};
use crate::jobs::Dispose;
use crate::safety::SafetyHandle;

/// A FIFO queue of `Copy` values stored in linked fixed-size blocks.
///
/// Blocks come from the queue's allocator; an exhausted head block is freed
/// as soon as its last value is dequeued. Blocks linked after the tail are
/// spares: `clear` and `set_capacity` leave them in place for later enqueues.
///
/// ```
/// use native_containers::collections::Queue;
///
/// let mut queue = Queue::new();
/// queue.enqueue(1);
/// queue.enqueue(2);
/// assert_eq!(queue.try_dequeue(), Some(1));
/// assert_eq!(queue.peek(), Some(&2));
/// ```
pub struct Queue<T, A: RawAlloc = Global> {
    head: Option<NonNull<BlockHeader>>,
    read_index: usize,
    pub(super) tail: CachePadded<AtomicPtr<BlockHeader>>,
    pub(super) count: CachePadded<AtomicUsize>,
    pub(super) geometry: BlockGeometry,
    pub(super) alloc: A,
    safety: SafetyHandle,
    marker: PhantomData<T>,
}

// SAFETY: the queue owns its blocks and the values in them.
unsafe impl<T: Send, A: RawAlloc + Send> Send for Queue<T, A> {}
// SAFETY: `&Queue` only reads.
unsafe impl<T: Sync, A: RawAlloc + Sync> Sync for Queue<T, A> {}

impl<T: Copy> Queue<T, Global> {
    /// Creates an empty queue. No block is allocated until the first enqueue.
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<T: Copy> Default for Queue<T, Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, A: RawAlloc> Queue<T, A> {
    /// Creates an empty queue over `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self {
            head: None,
            read_index: 0,
            tail: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            count: CachePadded::new(AtomicUsize::new(0)),
            geometry: BlockGeometry::of::<T>(),
            alloc,
            safety: SafetyHandle::new::<Self>(),
            marker: PhantomData,
        }
    }

    /// Whether any block is allocated.
    pub fn is_created(&self) -> bool {
        self.head.is_some()
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values per block.
    pub fn block_capacity(&self) -> usize {
        self.geometry.per_block
    }

    /// Slots in every allocated block, spares included. The consumed front of
    /// the head block still counts until that block is freed.
    pub fn capacity(&self) -> usize {
        let mut blocks = 0;
        let mut block = self.head;
        while let Some(current) = block {
            blocks += 1;
            // SAFETY: walking owned, live blocks.
            block = NonNull::new(unsafe { current.as_ref().next.load(Ordering::Acquire) });
        }
        blocks * self.geometry.per_block
    }

    /// Keeps just enough blocks for `capacity` values, linking or releasing
    /// spare blocks after the tail. Blocks that hold values are never freed,
    /// so the resulting capacity may exceed the request. On an empty queue,
    /// `set_capacity(0)` releases every block.
    ///
    /// # Errors
    /// `CapacityBelowLength` if `capacity < len`.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        self.safety.check_write();
        let len = *self.count.get_mut();
        if capacity < len {
            return Err(CollectionError::CapacityBelowLength { capacity, len });
        }
        if capacity == 0 {
            self.free_blocks();
            return Ok(());
        }
        let wanted = capacity.div_ceil(self.geometry.per_block);
        let tail = self.ensure_tail();
        let mut in_use = 1;
        let mut block = self.head;
        while let Some(current) = block {
            if current == tail {
                break;
            }
            in_use += 1;
            // SAFETY: blocks from head to tail are live.
            block = NonNull::new(unsafe { current.as_ref().next.load(Ordering::Relaxed) });
        }

        let spares = wanted.saturating_sub(in_use);
        let mut last = tail;
        // SAFETY: `last` walks owned blocks; detached spares are freed once.
        unsafe {
            for _ in 0..spares {
                last = match NonNull::new(*last.as_mut().next.get_mut()) {
                    Some(next) => next,
                    None => {
                        let block = self.geometry.allocate(&self.alloc, 0);
                        *last.as_mut().next.get_mut() = block.as_ptr();
                        block
                    }
                };
            }
            let mut extra = NonNull::new(core::mem::replace(last.as_mut().next.get_mut(), ptr::null_mut()));
            while let Some(block) = extra {
                extra = NonNull::new(block.as_ref().next.load(Ordering::Relaxed));
                self.geometry.free(&self.alloc, block);
            }
        }
        Ok(())
    }

    /// The tail block, allocating the first one if needed.
    pub(super) fn ensure_tail(&mut self) -> NonNull<BlockHeader> {
        if let Some(tail) = NonNull::new(*self.tail.get_mut()) {
            return tail;
        }
        let block = self.geometry.allocate(&self.alloc, 0);
        self.head = Some(block);
        self.read_index = 0;
        *self.tail.get_mut() = block.as_ptr();
        block
    }

    /// Appends `value` at the back.
    pub fn enqueue(&mut self, value: T) {
        self.safety.check_write();
        let mut tail = self.ensure_tail();
        // SAFETY: `tail` is live and exclusively ours.
        unsafe {
            let mut position = *tail.as_mut().reserved.get_mut();
            if position >= self.geometry.per_block {
                let block = match NonNull::new(*tail.as_mut().next.get_mut()) {
                    Some(spare) => spare,
                    None => {
                        let block = self.geometry.allocate(&self.alloc, 0);
                        *tail.as_mut().next.get_mut() = block.as_ptr();
                        block
                    }
                };
                *self.tail.get_mut() = block.as_ptr();
                tail = block;
                position = 0;
            }
            self.geometry.slot::<T>(tail, position).write(value);
            *tail.as_mut().reserved.get_mut() = position + 1;
        }
        *self.count.get_mut() += 1;
    }

    /// Removes and returns the front value.
    ///
    /// # Panics
    /// Panics if the queue is empty.
    pub fn dequeue(&mut self) -> T {
        match self.try_dequeue() {
            Some(value) => value,
            None => panic!("dequeue from an empty queue"),
        }
    }

    /// Removes and returns the front value, if any.
    pub fn try_dequeue(&mut self) -> Option<T> {
        self.safety.check_write();
        if *self.count.get_mut() == 0 {
            return None;
        }
        loop {
            let mut head = self.head?;
            // SAFETY: blocks between head and tail are live and owned.
            unsafe {
                if self.read_index < self.geometry.filled(head) {
                    let value = self.geometry.slot::<T>(head, self.read_index).read();
                    self.read_index += 1;
                    let count = self.count.get_mut();
                    *count -= 1;
                    if *count == 0 && head.as_ptr() == *self.tail.get_mut() {
                        // Rewind the only block instead of freeing it.
                        *head.as_mut().reserved.get_mut() = 0;
                        self.read_index = 0;
                    }
                    return Some(value);
                }
                let next = NonNull::new(*head.as_mut().next.get_mut())?;
                self.geometry.free(&self.alloc, head);
                self.head = Some(next);
                self.read_index = 0;
            }
        }
    }

    /// The front value, if any.
    pub fn peek(&self) -> Option<&T> {
        self.safety.check_exists();
        if self.is_empty() {
            return None;
        }
        let mut block = self.head?;
        let mut index = self.read_index;
        // SAFETY: walking owned, live blocks; `&self` excludes mutation.
        unsafe {
            while index >= self.geometry.filled(block) {
                block = NonNull::new(block.as_ref().next.load(Ordering::Acquire))?;
                index = 0;
            }
            Some(&*self.geometry.slot::<T>(block, index))
        }
    }

    /// Removes every value. Allocated blocks are rewound and kept as spares.
    pub fn clear(&mut self) {
        self.safety.check_write();
        let mut block = self.head;
        while let Some(mut current) = block {
            // SAFETY: owned, live blocks; `&mut self` excludes writers.
            unsafe {
                *current.as_mut().reserved.get_mut() = 0;
                block = NonNull::new(*current.as_mut().next.get_mut());
            }
        }
        *self.tail.get_mut() = self.head.map_or(ptr::null_mut(), NonNull::as_ptr);
        *self.count.get_mut() = 0;
        self.read_index = 0;
    }

    fn free_blocks(&mut self) {
        let mut block = self.head.take();
        while let Some(current) = block {
            // SAFETY: each block is freed once, after reading its link.
            unsafe {
                block = NonNull::new(current.as_ref().next.load(Ordering::Acquire));
                self.geometry.free(&self.alloc, current);
            }
        }
        *self.tail.get_mut() = ptr::null_mut();
        *self.count.get_mut() = 0;
        self.read_index = 0;
    }

    /// Iterates front to back.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            geometry: self.geometry,
            block: self.head,
            index: self.read_index,
            remaining: self.len(),
            marker: PhantomData,
        }
    }

    /// Copies the values out, front to back.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().copied().collect()
    }

    /// A read-only view borrowing the queue.
    pub fn as_read_only(&self) -> ReadOnlyQueue<'_, T, A> {
        self.safety.check_exists();
        ReadOnlyQueue { queue: self }
    }

    /// A lock-free enqueue view for many threads.
    pub fn as_parallel_writer(&mut self) -> ParallelWriter<'_, T, A> {
        self.safety.check_write();
        self.ensure_tail();
        // SAFETY: `&mut self` is held for the writer's lifetime and a tail exists.
        unsafe { ParallelWriter::new(self) }
    }

    /// The allocator backing the queue.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }
}

impl<T: Copy, A: RawAlloc> Extend<T> for Queue<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.enqueue(value);
        }
    }
}

impl<T: Copy + fmt::Debug, A: RawAlloc> fmt::Debug for Queue<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, A: RawAlloc> Drop for Queue<T, A> {
    fn drop(&mut self) {
        self.safety.release();
        let geometry = self.geometry;
        let mut block = self.head.take();
        while let Some(current) = block {
            // SAFETY: as in `free_blocks`.
            unsafe {
                block = NonNull::new(current.as_ref().next.load(Ordering::Acquire));
                geometry.free(&self.alloc, current);
            }
        }
    }
}

impl<T, A: RawAlloc> Dispose for Queue<T, A> {}

/// A borrowed, read-only view of a [`Queue`].
pub struct ReadOnlyQueue<'a, T, A: RawAlloc = Global> {
    queue: &'a Queue<T, A>,
}

impl<T, A: RawAlloc> Clone for ReadOnlyQueue<'_, T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A: RawAlloc> Copy for ReadOnlyQueue<'_, T, A> {}

impl<'a, T: Copy, A: RawAlloc> ReadOnlyQueue<'a, T, A> {
    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The front value, if any.
    pub fn peek(&self) -> Option<&'a T> {
        self.queue.peek()
    }

    /// Iterates front to back.
    pub fn iter(&self) -> Iter<'a, T> {
        self.queue.iter()
    }

    /// Copies the values out, front to back.
    pub fn to_vec(&self) -> Vec<T> {
        self.queue.to_vec()
    }
}

impl<T: Copy + fmt::Debug, A: RawAlloc> fmt::Debug for ReadOnlyQueue<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Front-to-back iterator over a [`Queue`].
pub struct Iter<'a, T> {
    geometry: BlockGeometry,
    block: Option<NonNull<BlockHeader>>,
    index: usize,
    remaining: usize,
    marker: PhantomData<&'a T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let mut block = self.block?;
        // SAFETY: the queue is borrowed for `'a`; blocks and filled slots are live.
        unsafe {
            while self.index >= self.geometry.filled(block) {
                block = NonNull::new(block.as_ref().next.load(Ordering::Acquire))?;
                self.block = Some(block);
                self.index = 0;
            }
            let item = &*self.geometry.slot::<T>(block, self.index);
            self.index += 1;
            self.remaining -= 1;
            Some(item)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T: Copy, A: RawAlloc> IntoIterator for &'a Queue<T, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_cross_block_boundaries_in_order() {
        let mut queue = Queue::new();
        let per_block = queue.block_capacity();
        let total = per_block * 3 + 7;
        queue.extend(0..total as u32);
        assert_eq!(queue.len(), total);
        assert!(queue.iter().copied().eq(0..total as u32));
        for expected in 0..total as u32 {
            assert_eq!(queue.dequeue(), expected);
        }
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn draining_the_only_block_rewinds_it() {
        let mut queue = Queue::new();
        queue.enqueue(1u8);
        queue.enqueue(2);
        assert_eq!(queue.try_dequeue(), Some(1));
        assert_eq!(queue.try_dequeue(), Some(2));
        assert_eq!(queue.read_index, 0);
        queue.enqueue(3);
        assert_eq!(queue.to_vec(), vec![3]);
    }

    #[test]
    fn clear_rewinds_blocks_for_reuse() {
        let mut queue: Queue<u64> = Queue::new();
        queue.extend(0..10_000);
        let capacity = queue.capacity();
        queue.clear();
        assert!(queue.is_created());
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), capacity);
        assert_eq!(queue.peek(), None);
        assert_eq!(*queue.tail.get_mut(), queue.head.map_or(ptr::null_mut(), NonNull::as_ptr));

        queue.extend(0..10_000);
        assert_eq!(queue.capacity(), capacity);
        assert!(queue.iter().copied().eq(0..10_000));
    }

    #[test]
    fn set_capacity_links_and_releases_spares() {
        let mut queue: Queue<u32> = Queue::new();
        let per_block = queue.block_capacity();
        queue.set_capacity(per_block * 3 + 1).unwrap();
        assert_eq!(queue.capacity(), per_block * 4);

        queue.extend(0..(per_block + 5) as u32);
        assert_eq!(queue.capacity(), per_block * 4);
        queue.set_capacity(per_block + 5).unwrap();
        assert_eq!(queue.capacity(), per_block * 2);
        assert!(queue.iter().copied().eq(0..(per_block + 5) as u32));

        assert_eq!(
            queue.set_capacity(3),
            Err(CollectionError::CapacityBelowLength { capacity: 3, len: per_block + 5 })
        );
        queue.clear();
        queue.set_capacity(0).unwrap();
        assert!(!queue.is_created());
        assert_eq!(queue.capacity(), 0);
    }
}
