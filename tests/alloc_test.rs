use std::alloc::Layout;
use std::collections::hash_map::RandomState;

use native_containers::alloc::{
    CountingAlloc, Global, GlobalBackend, PageAlloc, RawAlloc, ScratchArena, SystemBackend,
};
use native_containers::collections::{HashMap, Queue};

fn exercise<A: RawAlloc>(alloc: &A) {
    for (size, align) in [(1, 1), (24, 8), (4096, 64), (100_000, 4096)] {
        let layout = Layout::from_size_align(size, align).unwrap();
        let ptr = alloc.allocate(layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % align, 0);
        unsafe {
            ptr.as_ptr().write_bytes(0xA5, size);
            assert_eq!(*ptr.as_ptr().add(size - 1), 0xA5);
            alloc.deallocate(ptr, layout);
        }
    }
}

#[test]
fn every_backend_honours_layouts() {
    exercise(&Global);
    exercise(&PageAlloc);
    exercise(&SystemBackend::default());
    exercise(&GlobalBackend(std::alloc::System));
    let arena = ScratchArena::new();
    exercise(&&arena);
    exercise(&CountingAlloc::new());
}

#[test]
fn zeroed_allocations_are_zero() {
    let layout = Layout::array::<u64>(512).unwrap();
    for alloc in [&Global as &dyn RawAlloc, &PageAlloc] {
        let ptr = alloc.allocate_zeroed(layout).unwrap();
        unsafe {
            let words = std::slice::from_raw_parts(ptr.as_ptr().cast::<u64>(), 512);
            assert!(words.iter().all(|&w| w == 0));
            alloc.deallocate(ptr, layout);
        }
    }
}

#[test]
fn scratch_arena_backs_temporary_containers() {
    let mut arena = ScratchArena::new();
    for round in 0..3u32 {
        {
            let mut map = HashMap::with_hasher_in(RandomState::new(), &arena);
            let mut queue = Queue::new_in(&arena);
            for k in 0..500u32 {
                map.insert(k, k + round);
                queue.enqueue(k);
            }
            assert_eq!(map.try_get_value(&499), Some(499 + round));
            assert_eq!(queue.len(), 500);
        }
        assert!(arena.allocated_bytes() > 0);
        arena.reset();
        assert_eq!(arena.allocated_bytes(), 0);
    }
}

#[test]
fn counting_tracks_bytes_and_totals() {
    let counter = CountingAlloc::wrap(PageAlloc);
    {
        let mut map = HashMap::with_hasher_in(RandomState::new(), &counter);
        map.extend((0..10u64).map(|k| (k, k)));
        assert_eq!(counter.live_blocks(), 1);
        assert!(counter.live_bytes() > 0);
        assert!(counter.total_allocations() > 1);
    }
    assert_eq!(counter.live_blocks(), 0);
    assert_eq!(counter.live_bytes(), 0);
}
