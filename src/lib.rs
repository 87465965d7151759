//! # `native-containers` - Allocator-Agnostic Unmanaged Containers
//!
//! Hash maps, a multi-value hash map, a FIFO queue, a value cell and a byte
//! append buffer whose memory comes from an explicit allocator instead of the
//! global heap. Containers are freed by dropping them, by an explicit
//! [`Dispose::dispose`], or later through a scheduled job
//! ([`Dispose::dispose_deferred`]) so that readers already queued on a
//! scheduler finish first.
//!
//! ## Architecture
//!
//! 1. **Allocators** ([`alloc`]): the [`RawAlloc`] trait plus persistent
//!    ([`Global`], [`alloc::PageAlloc`]), scoped ([`alloc::ScratchArena`]) and
//!    global-allocator backends.
//! 2. **Hash engine** ([`collections::hash`]): one allocation holding value,
//!    key, chain-link and bucket-head arrays. Removed slots go onto a free
//!    list threaded through the link array and are reused before the table
//!    grows.
//! 3. **Views**: borrowed read-only views, detached read-only views for
//!    scheduled jobs, and lock-free parallel writers.
//! 4. **Safety handle** ([`safety`]): debug-only existence and generation
//!    checks for the accesses the borrow checker cannot see.
//! 5. **Jobs** ([`jobs`]): the [`Schedule`] seam, [`JobHandle`] and deferred
//!    disposal.
//!
//! ## Feature flags
//!
//! - `parallel`: a `rayon`-backed scheduler.
//! - `tracing`: structured events on allocation, growth and disposal.
//! - `alloc-mimalloc`, `alloc-snmalloc`, `alloc-jemalloc`: extra
//!   [`alloc::GlobalBackend`] aliases.
//!
//! ## Example
//!
//! ```rust
//! use native_containers::collections::HashMap;
//!
//! let mut map = HashMap::with_capacity(1);
//! map.add("a", 1).unwrap();
//! map.add("b", 2).unwrap();
//! map.add("c", 3).unwrap();
//!
//! assert_eq!(map.get(&"b"), Some(&2));
//! assert!(map.remove(&"a"));
//! assert_eq!(map.len(), 2);
//! assert!(map.add("b", 9).is_err());
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]

mod macros;

pub mod alloc;
pub mod collections;
pub mod concurrency;
pub mod error;
pub mod jobs;
pub mod safety;

pub use alloc::{AllocError, Global, RawAlloc};
pub use collections::{AppendBuffer, HashMap, MultiHashMap, Queue, ValueCell};
pub use error::{CollectionError, Result};
pub use jobs::{Dispose, JobHandle, Schedule};
pub use safety::SafetyHandle;

// Compile-time assertions for memory layout
const _: () = {
    use core::mem;

    // Release builds carry no safety state at all.
    #[cfg(not(debug_assertions))]
    {
        assert!(mem::size_of::<safety::SafetyHandle>() == 0);
        assert!(mem::size_of::<safety::SafetyStamp>() == 0);
        assert!(mem::size_of::<safety::SafetyView>() == 0);
    }

    // Cells are one pointer plus a zero-sized allocator handle.
    #[cfg(not(debug_assertions))]
    assert!(mem::size_of::<ValueCell<u64>>() == mem::size_of::<usize>());

    // Parallel writers are copied into every worker closure.
    assert!(
        mem::size_of::<
            collections::hash::ParallelWriter<'static, u32, u32, std::collections::hash_map::RandomState, Global>,
        >() == mem::size_of::<usize>()
    );
};
