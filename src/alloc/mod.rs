//! Memory backends for the containers.
//!
//! Every container is generic over a [`RawAlloc`]. [`Global`] is the default
//! persistent backend, [`ScratchArena`] is the scoped/temporary kind, and
//! caller-owned memory is expressed by the containers themselves (see
//! [`crate::collections::AppendBuffer::from_raw_parts`]).

pub mod allocator;
pub mod backend;
pub mod counting;
pub mod page;
pub mod scratch;
mod syscall;

pub use allocator::{AllocError, Global, RawAlloc};
pub use backend::{GlobalBackend, SystemBackend};
pub use counting::CountingAlloc;
pub use page::PageAlloc;
pub use scratch::ScratchArena;

#[cfg(feature = "alloc-jemalloc")]
pub use backend::JemallocBackend;
#[cfg(feature = "alloc-mimalloc")]
pub use backend::MiMallocBackend;
#[cfg(feature = "alloc-snmalloc")]
pub use backend::SnMallocBackend;
