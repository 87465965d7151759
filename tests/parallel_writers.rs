use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use native_containers::collections::{HashMap, MultiHashMap, Queue};

const THREADS: u32 = 8;
const PER_THREAD: u32 = 1_000;

#[test]
fn disjoint_keys_all_land() {
    let mut map = HashMap::with_capacity((THREADS * PER_THREAD) as usize);
    {
        let writer = map.as_parallel_writer();
        thread::scope(|scope| {
            for t in 0..THREADS {
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        assert!(writer.try_add(t * PER_THREAD + i, i));
                    }
                });
            }
        });
        assert_eq!(writer.len(), (THREADS * PER_THREAD) as usize);
    }
    assert_eq!(map.len(), (THREADS * PER_THREAD) as usize);
    for key in 0..THREADS * PER_THREAD {
        assert_eq!(map[&key], key % PER_THREAD);
    }
}

#[test]
fn racing_duplicates_insert_once() {
    let mut map = HashMap::with_capacity((THREADS * PER_THREAD) as usize);
    let wins = AtomicUsize::new(0);
    {
        let writer = map.as_parallel_writer();
        let wins = &wins;
        thread::scope(|scope| {
            for t in 0..THREADS {
                scope.spawn(move || {
                    for key in 0..PER_THREAD {
                        if writer.try_add(key, t) {
                            wins.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
    }
    assert_eq!(wins.load(Ordering::Relaxed), PER_THREAD as usize);
    assert_eq!(map.len(), PER_THREAD as usize);
    for key in 0..PER_THREAD {
        assert!(map[&key] < THREADS);
    }
}

#[test]
fn parallel_writers_reuse_removed_slots() {
    let mut map = HashMap::with_capacity(2048);
    map.extend((0..2048u32).map(|k| (k, k)));
    for k in 0..1024 {
        map.remove(&k);
    }
    {
        let writer = map.as_parallel_writer();
        thread::scope(|scope| {
            for t in 0..4u32 {
                scope.spawn(move || {
                    for i in 0..256 {
                        writer.try_add(10_000 + t * 256 + i, i);
                    }
                });
            }
        });
    }
    assert_eq!(map.len(), 2048);
    assert_eq!(map.capacity(), 2048);
    assert_eq!(map.try_get_value(&(10_000 + 3 * 256 + 255)), Some(255));
}

#[test]
#[should_panic(expected = "exceeded the pre-sized capacity")]
fn writing_past_capacity_panics() {
    let mut map = HashMap::with_capacity(4);
    let writer = map.as_parallel_writer();
    for key in 0..5u8 {
        writer.try_add(key, key);
    }
}

#[test]
fn multi_writers_keep_every_value() {
    let mut map = MultiHashMap::with_capacity((THREADS * PER_THREAD) as usize);
    {
        let writer = map.as_parallel_writer();
        thread::scope(|scope| {
            for t in 0..THREADS {
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        writer.add(i % 10, t);
                    }
                });
            }
        });
    }
    assert_eq!(map.len(), (THREADS * PER_THREAD) as usize);
    for key in 0..10 {
        assert_eq!(map.count_values_for_key(&key), (THREADS * PER_THREAD / 10) as usize);
    }
}

#[test]
fn queue_writers_keep_per_thread_order() {
    let mut queue = Queue::new();
    let per_thread = 3 * queue.block_capacity() as u32;
    {
        let writer = queue.as_parallel_writer();
        thread::scope(|scope| {
            for t in 0..4u32 {
                scope.spawn(move || {
                    for i in 0..per_thread {
                        writer.enqueue((t, i));
                    }
                });
            }
        });
    }
    assert_eq!(queue.len(), 4 * per_thread as usize);

    let mut next = [0u32; 4];
    while let Some((t, i)) = queue.try_dequeue() {
        assert_eq!(next[t as usize], i);
        next[t as usize] += 1;
    }
    assert_eq!(next, [per_thread; 4]);
}

#[cfg(feature = "parallel")]
#[test]
fn rayon_workers_share_one_writer() {
    use rayon::prelude::*;

    let mut map = HashMap::with_capacity(100_000);
    {
        let writer = map.as_parallel_writer();
        (0..100_000u32).into_par_iter().for_each(|k| {
            assert!(writer.try_add(k, k * 2));
        });
    }
    assert_eq!(map.len(), 100_000);
    assert_eq!(map[&99_999], 199_998);
}
