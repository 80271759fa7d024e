//! Error types for chunk vector operations.

use std::error::Error;
use std::fmt;

/// Errors that can occur while mutating a [`ChunkVec`](crate::ChunkVec).
///
/// Every operation that returns one of these leaves the vector exactly as it
/// was before the call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkError {
    /// The allocator could not provide (or resize) the store.
    AllocationFailed {
        /// Number of bytes requested from the allocator. `usize::MAX` when
        /// the size computation itself overflowed.
        requested_bytes: usize,
    },
    /// `set` was called with an index beyond the end of the live range.
    IndexPastEnd {
        /// The rejected index.
        index: usize,
        /// Length of the vector at the time of the call.
        len: usize,
    },
}

impl ChunkError {
    /// Allocation failure for a size that does not fit in `usize`.
    pub(crate) fn overflow() -> Self {
        Self::AllocationFailed {
            requested_bytes: usize::MAX,
        }
    }

    /// Whether this error reports an allocation failure.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed {
                requested_bytes: usize::MAX,
            } => write!(f, "store allocation failed: size overflows usize"),
            Self::AllocationFailed { requested_bytes } => {
                write!(f, "store allocation failed: requested {requested_bytes} bytes")
            }
            Self::IndexPastEnd { index, len } => {
                write!(f, "index {index} is past the end of a vector of length {len}")
            }
        }
    }
}

impl Error for ChunkError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_allocation_failure() {
        let e = ChunkError::AllocationFailed {
            requested_bytes: 64,
        };
        assert_eq!(e.to_string(), "store allocation failed: requested 64 bytes");
        assert!(e.is_allocation_failure());
    }

    #[test]
    fn display_overflow() {
        assert!(ChunkError::overflow().to_string().contains("overflows"));
    }

    #[test]
    fn index_past_end_is_not_allocation_failure() {
        let e = ChunkError::IndexPastEnd { index: 7, len: 3 };
        assert!(!e.is_allocation_failure());
        assert_eq!(
            e.to_string(),
            "index 7 is past the end of a vector of length 3"
        );
    }
}
