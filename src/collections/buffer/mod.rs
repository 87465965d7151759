//! A byte-oriented append buffer and its sequential reader.
//!
//! Values are written back to back with no padding or type tags, so every
//! access is unaligned and the reader must ask for the same sequence of types
//! the writer used. Arrays carry an `i32` native-endian length prefix; the
//! string helpers use `-1` for an absent string.

mod append_buffer;
mod reader;

pub use append_buffer::{AppendBuffer, ReadOnlyBuffer};
pub use reader::Reader;

/// Length prefix marking an absent string.
pub const ABSENT_LEN: i32 = -1;
