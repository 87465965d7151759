use native_containers::alloc::RawAlloc;
use native_containers::collections::HashMap;
use std::collections::hash_map::RandomState;

use super::{Keys, Workload};

const KEYS: u32 = 1024;

/// Toggles random keys in a map grown from capacity 1: removals feed the
/// free list and reinserts pull from it.
pub struct Churn;

impl Workload for Churn {
    const NAME: &'static str = "map_churn";
    const OPS: u64 = 20_000;

    fn run<A: RawAlloc>(alloc: &A, seed: u64) -> usize {
        let mut keys = Keys::new(seed);
        let mut map = HashMap::with_hasher_in(RandomState::new(), alloc);
        for _ in 0..Self::OPS {
            let key = keys.below(KEYS);
            if !map.remove(&key) {
                map.insert(key, keys.next_u64());
            }
        }
        map.len()
    }
}
