//! A chunked FIFO queue with a lock-free parallel enqueue view.

pub(crate) mod block;
pub mod parallel;
#[allow(clippy::module_inception)]
mod queue;

pub use block::BLOCK_BYTES;
pub use parallel::ParallelWriter;
pub use queue::{Iter, Queue, ReadOnlyQueue};
