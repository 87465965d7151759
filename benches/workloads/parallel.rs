use criterion::measurement::WallTime;
use criterion::{black_box, BenchmarkGroup, BenchmarkId, Criterion, Throughput};
#[allow(unused_imports)]
use native_containers::alloc::{Global, GlobalBackend, PageAlloc, RawAlloc, SystemBackend};
use native_containers::collections::{HashMap, Queue};
use std::collections::hash_map::RandomState;
use std::thread;

const PER_THREAD: usize = 20_000;
const THREADS: [usize; 4] = [1, 2, 4, 8];

/// Fills a pre-sized map through its parallel writer.
fn fill_map<A: RawAlloc + Sync>(alloc: &A, threads: usize) -> usize {
    let mut map = HashMap::with_hasher_in(RandomState::new(), alloc);
    map.set_capacity(PER_THREAD * threads).unwrap();
    {
        let writer = map.as_parallel_writer();
        thread::scope(|scope| {
            for id in 0..threads {
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        writer.try_add((id * PER_THREAD + i) as u64, i as u32);
                    }
                });
            }
        });
    }
    map.len()
}

/// Enqueues from every thread through the queue's parallel writer.
fn fill_queue<A: RawAlloc + Sync>(alloc: &A, threads: usize) -> usize {
    let mut queue = Queue::new_in(alloc);
    {
        let writer = queue.as_parallel_writer();
        thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        writer.enqueue(i as u64);
                    }
                });
            }
        });
    }
    queue.len()
}

type Fill<A> = fn(&A, usize) -> usize;

fn bench_backend<A: RawAlloc + Sync>(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, alloc: &A, fill: Fill<A>) {
    for threads in THREADS {
        group.throughput(Throughput::Elements((PER_THREAD * threads) as u64));
        group.bench_with_input(BenchmarkId::new(name, threads), &threads, |b, &threads| {
            b.iter(|| black_box(fill(alloc, threads)))
        });
    }
}

macro_rules! each_shared_backend {
    ($group:expr, $fill:ident) => {{
        bench_backend($group, "global", &Global, $fill);
        bench_backend($group, "system", &SystemBackend::default(), $fill);
        bench_backend($group, "pages", &PageAlloc, $fill);
        #[cfg(feature = "alloc-mimalloc")]
        bench_backend($group, "mimalloc", &GlobalBackend(mimalloc::MiMalloc), $fill);
        #[cfg(feature = "alloc-snmalloc")]
        bench_backend($group, "snmalloc", &GlobalBackend(snmalloc_rs::SnMalloc), $fill);
        #[cfg(feature = "alloc-jemalloc")]
        bench_backend($group, "jemalloc", &GlobalBackend(jemallocator::Jemalloc), $fill);
    }};
}

/// The scratch arena is single-threaded, so only shareable backends run here.
pub fn run(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_map_fill");
    each_shared_backend!(&mut group, fill_map);
    group.finish();

    let mut group = c.benchmark_group("parallel_queue_fill");
    each_shared_backend!(&mut group, fill_queue);
    group.finish();
}
