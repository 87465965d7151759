//! Debug-only existence and generation tracking for containers.
//!
//! Ownership and borrow lifetimes already rule out most misuse: mutation
//! needs `&mut self`, read-only views borrow the container, and disposal
//! consumes it. Two things escape the borrow checker:
//!
//! - value-type cursors ([`crate::collections::hash::MultiValueCursor`]) that
//!   are handed back to the container on every step, and
//! - detached `'static` views used from scheduled jobs.
//!
//! For those, every container carries a [`SafetyHandle`]. With
//! `debug_assertions` on, it holds an `exists` flag and a generation counter
//! that is bumped by every structural mutation; views capture the generation
//! and panic on use if it moved on or the container was freed. Without
//! `debug_assertions` the handle and every view are zero-sized and each check
//! compiles to nothing.

mod handle;

pub use handle::{SafetyHandle, SafetyStamp, SafetyView};
