use native_containers::alloc::RawAlloc;
use native_containers::collections::Queue;

use super::Workload;

/// Enqueues three values for every two dequeues, so the queue keeps crossing
/// block boundaries while head blocks are released.
pub struct QueueCycle;

impl Workload for QueueCycle {
    const NAME: &'static str = "queue_cycle";
    const OPS: u64 = 50_000;

    fn run<A: RawAlloc>(alloc: &A, _seed: u64) -> usize {
        let mut queue = Queue::new_in(alloc);
        let mut sum = 0u64;
        for i in 0..Self::OPS / 5 {
            queue.extend([i, i + 1, i + 2]);
            sum += queue.dequeue();
            sum += queue.dequeue();
        }
        queue.len() + (sum & 1) as usize
    }
}
