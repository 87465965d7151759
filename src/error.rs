//! Error types shared by every container.

use core::fmt;

use crate::alloc::AllocError;

/// Usage and resource errors reported by the strict container APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionError {
    /// A strict `add` found the key already present.
    DuplicateKey,
    /// A lookup that requires the key found nothing.
    KeyNotFound,
    /// A requested capacity cannot hold the current contents.
    CapacityBelowLength {
        /// The requested capacity.
        capacity: usize,
        /// The number of live elements.
        len: usize,
    },
    /// A requested capacity exceeds what the container can address.
    CapacityOverflow,
    /// The backend could not satisfy an allocation.
    Alloc(AllocError),
    /// A read ran past the end of an append buffer.
    EndOfBuffer {
        /// Bytes the read needed.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },
    /// The buffer wraps caller-owned memory and cannot be reallocated.
    BufferNotOwned,
    /// A length-prefixed string did not hold valid UTF-8.
    InvalidUtf8,
    /// An array length prefix was negative.
    InvalidLength(i32),
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey => f.write_str("an item with the same key has already been added"),
            Self::KeyNotFound => f.write_str("key not found"),
            Self::CapacityBelowLength { capacity, len } => {
                write!(f, "capacity {capacity} is below the current length {len}")
            }
            Self::CapacityOverflow => f.write_str("capacity overflow"),
            Self::Alloc(err) => write!(f, "{err}"),
            Self::EndOfBuffer { needed, remaining } => {
                write!(f, "read of {needed} bytes with only {remaining} remaining")
            }
            Self::BufferNotOwned => f.write_str("buffer does not own its memory and cannot grow"),
            Self::InvalidUtf8 => f.write_str("buffer string is not valid UTF-8"),
            Self::InvalidLength(len) => write!(f, "invalid length prefix {len}"),
        }
    }
}

impl std::error::Error for CollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Alloc(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AllocError> for CollectionError {
    fn from(err: AllocError) -> Self {
        Self::Alloc(err)
    }
}

/// Result alias for container operations.
pub type Result<T> = core::result::Result<T, CollectionError>;
