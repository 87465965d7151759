use native_containers::alloc::RawAlloc;
use native_containers::collections::{AppendBuffer, HashMap, Queue};
use std::collections::hash_map::RandomState;

use super::{Keys, Workload};

const SIZES: [u64; 4] = [64, 512, 4096, 128];
const ROUNDS: usize = 32;

/// Builds and drops a map, a queue and an append buffer per round, the way a
/// frame-scoped job would.
pub struct Temporary;

impl Workload for Temporary {
    const NAME: &'static str = "temporary_containers";
    const OPS: u64 = 3 * (ROUNDS as u64 / 4) * (SIZES[0] + SIZES[1] + SIZES[2] + SIZES[3]);

    fn run<A: RawAlloc>(alloc: &A, seed: u64) -> usize {
        let mut keys = Keys::new(seed);
        let mut total = 0;
        for round in 0..ROUNDS {
            let size = SIZES[round % SIZES.len()];
            let mut map = HashMap::with_hasher_in(RandomState::new(), alloc);
            let mut queue = Queue::new_in(alloc);
            let mut buffer = AppendBuffer::new_in(64, 8, alloc);
            for i in 0..size {
                let value = keys.next_u64();
                map.insert(i, value);
                queue.enqueue(value);
                buffer.add(value);
            }
            total += map.len() + queue.len() + buffer.len();
        }
        total
    }
}
