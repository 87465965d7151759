use native_containers::alloc::RawAlloc;
use native_containers::collections::MultiHashMap;
use std::collections::hash_map::RandomState;

use super::{Keys, Workload};

const KEYS: u32 = 512;
const VALUES_PER_KEY: u32 = 8;

/// Adds several values per key, then walks every key with a cursor.
pub struct Fanout;

impl Workload for Fanout {
    const NAME: &'static str = "multi_map_fanout";
    const OPS: u64 = 2 * (KEYS * VALUES_PER_KEY) as u64;

    fn run<A: RawAlloc>(alloc: &A, seed: u64) -> usize {
        let mut keys = Keys::new(seed);
        let mut map = MultiHashMap::with_hasher_in(RandomState::new(), alloc);
        for _ in 0..KEYS * VALUES_PER_KEY {
            map.add(keys.below(KEYS), keys.next_u64());
        }

        let mut seen = 0;
        for key in 0..KEYS {
            let mut next = map.try_get_first_value(&key);
            while let Some((_, mut cursor)) = next {
                seen += 1;
                next = map.try_get_next_value(&mut cursor).map(|value| (value, cursor));
            }
        }
        seen
    }
}
