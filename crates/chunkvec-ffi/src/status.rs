//! C-compatible status codes.
//!
//! [`ChvStatus`] is a `repr(i32)` enum returned by every `chv_*` function.
//! Conversion from [`ChunkError`] is provided.

use chunkvec::ChunkError;

/// C-compatible status code returned by all FFI functions.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChvStatus {
    /// Success.
    Ok = 0,
    /// Handle is invalid or the vector was already destroyed.
    InvalidHandle = -1,
    /// A required pointer is null or an argument is otherwise invalid.
    InvalidArgument = -2,
    /// The allocator could not provide memory. The vector is unchanged.
    AllocationFailed = -3,
    /// `chv_set` was given an index greater than the length.
    IndexPastEnd = -4,
    /// Called from inside a hook while this thread's vector table is in use.
    Reentrant = -5,
    /// Internal error.
    InternalError = -6,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&ChunkError> for ChvStatus {
    fn from(e: &ChunkError) -> Self {
        match e {
            ChunkError::AllocationFailed { .. } => ChvStatus::AllocationFailed,
            ChunkError::IndexPastEnd { .. } => ChvStatus::IndexPastEnd,
        }
    }
}

impl From<Result<(), ChunkError>> for ChvStatus {
    fn from(r: Result<(), ChunkError>) -> Self {
        match r {
            Ok(()) => ChvStatus::Ok,
            Err(e) => ChvStatus::from(&e),
        }
    }
}
