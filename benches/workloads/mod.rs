//! Container workloads, each measured once per allocation backend.
//!
//! A criterion group per workload, one benchmark per backend, so
//! `cargo xtask report` can lay the results out as a workload × backend table.

pub mod churn;
pub mod fanout;
pub mod growth;
pub mod parallel;
pub mod queue_cycle;
pub mod temporary;

use criterion::{black_box, Criterion, Throughput};
use native_containers::alloc::{Global, PageAlloc, RawAlloc, ScratchArena, SystemBackend};

pub const SEED: u64 = 0x5eed_cafe;

/// A single-threaded workload, generic over where its containers allocate.
pub trait Workload {
    const NAME: &'static str;
    /// Container operations performed by one `run`.
    const OPS: u64;

    fn run<A: RawAlloc>(alloc: &A, seed: u64) -> usize;
}

pub fn measure<W: Workload>(c: &mut Criterion) {
    let mut group = c.benchmark_group(W::NAME);
    group.throughput(Throughput::Elements(W::OPS));

    group.bench_function("global", |b| b.iter(|| black_box(W::run(&Global, SEED))));
    group.bench_function("system", |b| {
        let backend = SystemBackend::default();
        b.iter(|| black_box(W::run(&backend, SEED)))
    });
    group.bench_function("pages", |b| b.iter(|| black_box(W::run(&PageAlloc, SEED))));
    group.bench_function("scratch", |b| {
        let mut arena = ScratchArena::new();
        b.iter(|| {
            let result = W::run(&arena, SEED);
            arena.reset();
            black_box(result)
        })
    });

    #[cfg(feature = "alloc-mimalloc")]
    group.bench_function("mimalloc", |b| {
        let backend = native_containers::alloc::GlobalBackend(mimalloc::MiMalloc);
        b.iter(|| black_box(W::run(&backend, SEED)))
    });
    #[cfg(feature = "alloc-snmalloc")]
    group.bench_function("snmalloc", |b| {
        let backend = native_containers::alloc::GlobalBackend(snmalloc_rs::SnMalloc);
        b.iter(|| black_box(W::run(&backend, SEED)))
    });
    #[cfg(feature = "alloc-jemalloc")]
    group.bench_function("jemalloc", |b| {
        let backend = native_containers::alloc::GlobalBackend(jemallocator::Jemalloc);
        b.iter(|| black_box(W::run(&backend, SEED)))
    });

    group.finish();
}

/// SplitMix64 key stream; the same seed yields the same workload on every
/// backend.
pub struct Keys(u64);

impl Keys {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform in `0..bound`.
    pub fn below(&mut self, bound: u32) -> u32 {
        (((self.next_u64() >> 32) * u64::from(bound)) >> 32) as u32
    }
}
