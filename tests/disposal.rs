use std::collections::hash_map::RandomState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use native_containers::alloc::CountingAlloc;
use native_containers::collections::{AppendBuffer, HashMap, MultiHashMap, Queue, ValueCell};
use native_containers::jobs::{Dispose, JobHandle, ManualScheduler, Schedule, ThreadScheduler};

fn counted_map(counter: &Arc<CountingAlloc>) -> HashMap<u32, u64, RandomState, Arc<CountingAlloc>> {
    let mut map = HashMap::with_hasher_in(RandomState::new(), Arc::clone(counter));
    map.extend((0..100).map(|k| (k, u64::from(k) * 3)));
    map
}

#[test]
fn dispose_frees_every_container() {
    let counter = CountingAlloc::new();

    let mut map = HashMap::with_hasher_in(RandomState::new(), &counter);
    map.insert(1u8, 1u8);
    let mut multi = MultiHashMap::with_hasher_in(RandomState::new(), &counter);
    multi.add(1u8, 1u8);
    let mut queue = Queue::new_in(&counter);
    queue.enqueue(1u8);
    let cell = ValueCell::new_in(1u8, &counter);
    let mut buffer = AppendBuffer::new_in(8, 8, &counter);
    buffer.add(1u8);
    assert_eq!(counter.live_blocks(), 5);

    map.dispose();
    multi.dispose();
    queue.dispose();
    cell.dispose();
    buffer.dispose();
    assert_eq!(counter.live_blocks(), 0);
}

#[test]
fn deferred_disposal_waits_for_readers() {
    let scheduler = ManualScheduler::new();
    let counter = Arc::new(CountingAlloc::new());
    let map = counted_map(&counter);

    let view = unsafe { map.as_detached_read_only() };
    let seen = Arc::new(AtomicU64::new(0));
    let sink = Arc::clone(&seen);
    let read = scheduler.spawn(
        move || sink.store(view.get(&7).unwrap_or_default(), Ordering::SeqCst),
        &[],
    );
    let freed = map.dispose_deferred(&scheduler, &[read.clone()]);
    assert_eq!(counter.live_blocks(), 1);

    assert_eq!(scheduler.run_ready(), 1);
    assert!(read.is_completed());
    assert!(!freed.is_completed());
    assert_eq!(seen.load(Ordering::SeqCst), 21);
    assert_eq!(counter.live_blocks(), 1);

    assert_eq!(scheduler.run_ready(), 1);
    assert!(freed.is_completed());
    assert_eq!(counter.live_blocks(), 0);
}

#[test]
fn deferred_disposal_waits_for_external_handles() {
    let scheduler = ManualScheduler::new();
    let counter = Arc::new(CountingAlloc::new());
    let mut queue = Queue::new_in(Arc::clone(&counter));
    queue.extend(0..10u32);

    let (gate_done, gate) = JobHandle::channel();
    let freed = queue.dispose_deferred(&scheduler, &[gate]);
    assert_eq!(scheduler.run_all(), 0);
    assert_eq!(counter.live_blocks(), 1);

    gate_done.complete();
    assert_eq!(scheduler.run_all(), 1);
    freed.wait();
    assert_eq!(counter.live_blocks(), 0);
}

#[test]
fn deferred_disposal_on_worker_threads() {
    let counter = Arc::new(CountingAlloc::new());
    let handles: Vec<JobHandle> = (0..4)
        .map(|_| counted_map(&counter).dispose_deferred(&ThreadScheduler, &[]))
        .collect();
    JobHandle::combine(&handles).wait();
    assert_eq!(counter.live_blocks(), 0);
}

#[cfg(feature = "parallel")]
#[test]
fn deferred_disposal_on_the_rayon_pool() {
    use native_containers::jobs::RayonScheduler;

    let counter = Arc::new(CountingAlloc::new());
    let first = counted_map(&counter).dispose_deferred(&RayonScheduler, &[]);
    let second = counted_map(&counter).dispose_deferred(&RayonScheduler, &[first]);
    second.wait();
    assert_eq!(counter.live_blocks(), 0);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "was used after it was disposed")]
fn detached_reads_after_disposal_panic() {
    let scheduler = ManualScheduler::new();
    let counter = Arc::new(CountingAlloc::new());
    let map = counted_map(&counter);
    let view = unsafe { map.as_detached_read_only() };

    let freed = map.dispose_deferred(&scheduler, &[]);
    scheduler.run_all();
    assert!(freed.is_completed());
    let _ = view.len();
}
