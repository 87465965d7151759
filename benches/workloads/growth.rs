use native_containers::alloc::RawAlloc;
use native_containers::collections::hash::TableConfig;
use native_containers::collections::HashMap;
use std::collections::hash_map::RandomState;

use super::{Keys, Workload};

/// Fills a map from capacity 1, paying for every doubling.
pub struct Growth;

impl Workload for Growth {
    const NAME: &'static str = "map_growth";
    const OPS: u64 = 8192;

    fn run<A: RawAlloc>(alloc: &A, seed: u64) -> usize {
        let mut keys = Keys::new(seed);
        let mut map = HashMap::with_config_in(TableConfig::new(1), RandomState::new(), alloc);
        for key in 0..Self::OPS {
            map.insert(key, keys.next_u64());
        }
        map.capacity()
    }
}
