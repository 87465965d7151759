//! Crate-internal logging shim.
//!
//! `trace_event!(debug, old, new, "table resized")` forwards to the matching
//! `tracing` macro when the `tracing` feature is enabled and expands to
//! nothing otherwise. Only pass fields that are already used elsewhere in the
//! calling function, so the disabled build has no unused bindings.

macro_rules! trace_event {
    ($level:ident, $($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        {
            ::tracing::$level!($($arg)+);
        }
    }};
}

pub(crate) use trace_event;
