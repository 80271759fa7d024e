//! C FFI bindings for chunkvec.
//!
//! Exposes vectors to C through `u64` handles and `chv_*` functions that
//! all return an `i32` [`ChvStatus`](status::ChvStatus). Hooks are plain C
//! function pointers; the opaque context is a `void *` handed back by
//! `chv_destroy`. This crate is one of two that may contain `unsafe` code
//! (along with `chunkvec`).
//!
//! Vectors are not `Send`, so each thread has its own handle table: a
//! handle is only valid on the thread that created it. A hook that calls
//! back into `chv_*` on the same thread while the table is in use gets
//! `ChvStatus::Reentrant`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run an FFI body, converting a caught panic into `ChvStatus::Panicked`.
macro_rules! ffi_guard {
    ($body:block) => {
        match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| -> i32 { $body })) {
            Ok(code) => code,
            Err(_) => {
                ::tracing::warn!("panic caught at the C boundary");
                $crate::status::ChvStatus::Panicked as i32
            }
        }
    };
}

/// Unwrap a `Result<T, ChvStatus>` inside `ffi_guard!`, returning the
/// status code on error.
macro_rules! ffi_try {
    ($e:expr) => {
        match $e {
            Ok(value) => value,
            Err(status) => return status as i32,
        }
    };
}

pub mod alloc;
mod handle;
pub mod status;
pub mod types;
pub mod vector;

pub use alloc::FfiAllocator;
pub use status::ChvStatus;
