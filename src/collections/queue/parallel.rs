//! Lock-free enqueue view over a [`Queue`].
//!
//! Writers claim a position in the tail block with one `fetch_add` on its
//! `reserved` counter. The writer that overflows the block allocates a
//! successor with its own value already in slot 0 and tries to link it with
//! a CAS on `next`; losers free their block and retry on the new tail.

use core::fmt;
use core::ptr::{self, NonNull};
use core::sync::atomic::Ordering;

use crossbeam_utils::Backoff;

use crate::alloc::RawAlloc;
use crate::collections::queue::Queue;

/// Concurrent `enqueue` view, shared by reference across worker threads.
pub struct ParallelWriter<'a, T, A: RawAlloc> {
    queue: &'a Queue<T, A>,
}

impl<T, A: RawAlloc> Clone for ParallelWriter<'_, T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A: RawAlloc> Copy for ParallelWriter<'_, T, A> {}

// SAFETY: writers move values into blocks owned by the queue from any thread.
unsafe impl<T: Send, A: RawAlloc + Sync> Send for ParallelWriter<'_, T, A> {}
// SAFETY: as above.
unsafe impl<T: Send, A: RawAlloc + Sync> Sync for ParallelWriter<'_, T, A> {}

impl<'a, T: Copy, A: RawAlloc> ParallelWriter<'a, T, A> {
    /// # Safety
    /// The caller holds the queue exclusively for `'a` and it has a tail block.
    pub(crate) unsafe fn new(queue: &'a Queue<T, A>) -> Self {
        Self { queue }
    }

    /// Appends `value`. Values from one thread keep their relative order.
    pub fn enqueue(&self, value: T) {
        let queue = self.queue;
        let geometry = queue.geometry;
        let backoff = Backoff::new();
        loop {
            let tail_ptr = queue.tail.load(Ordering::Acquire);
            let Some(tail) = NonNull::new(tail_ptr) else {
                unreachable!("parallel writer created without a tail block")
            };
            // SAFETY: blocks are only freed with `&mut Queue`, which the
            // writer's borrow excludes.
            unsafe {
                let position = tail.as_ref().reserved.fetch_add(1, Ordering::AcqRel);
                if position < geometry.per_block {
                    geometry.slot::<T>(tail, position).write(value);
                    queue.count.fetch_add(1, Ordering::Relaxed);
                    return;
                }

                let next = tail.as_ref().next.load(Ordering::Acquire);
                if next.is_null() {
                    let block = geometry.allocate(&queue.alloc, 1);
                    geometry.slot::<T>(block, 0).write(value);
                    match tail.as_ref().next.compare_exchange(
                        ptr::null_mut(),
                        block.as_ptr(),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            let _ = queue.tail.compare_exchange(
                                tail_ptr,
                                block.as_ptr(),
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            );
                            queue.count.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                        Err(linked) => {
                            geometry.free(&queue.alloc, block);
                            let _ = queue.tail.compare_exchange(
                                tail_ptr,
                                linked,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            );
                        }
                    }
                } else {
                    let _ = queue
                        .tail
                        .compare_exchange(tail_ptr, next, Ordering::AcqRel, Ordering::Acquire);
                }
            }
            backoff.spin();
        }
    }

    /// Values in the queue, including those enqueued by other threads so far.
    pub fn len(&self) -> usize {
        self.queue.count.load(Ordering::Relaxed)
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, A: RawAlloc> fmt::Debug for ParallelWriter<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelWriter")
            .field("len", &self.queue.count.load(Ordering::Relaxed))
            .finish()
    }
}
