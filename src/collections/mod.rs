//! Unmanaged containers over a pluggable allocator.
//!
//! Containers are organized by data structure type:
//! - `hash`: the chained hash table engine with [`HashMap`] and [`MultiHashMap`]
//! - `queue`: a block-linked FIFO [`Queue`]
//! - `buffer`: a byte-level [`AppendBuffer`] with its [`Reader`]
//! - `cell`: a single allocator-owned [`ValueCell`]

pub mod buffer;
pub mod cell;
pub mod hash;
pub mod queue;

pub use buffer::{AppendBuffer, ReadOnlyBuffer, Reader};
pub use cell::{ReadOnlyCell, ValueCell};
pub use hash::{
    DetachedReadOnly, HashMap, KeyValueArrays, MultiHashMap, MultiValueCursor, ReadOnly, TableConfig,
};
pub use queue::{Queue, ReadOnlyQueue};
