//! Type-erased contiguous vector of fixed-width records.
//!
//! A [`ChunkVec`] stores records of a width chosen at runtime inline in one
//! allocation, rather than as pointers to separately allocated objects. It
//! never interprets record bytes; it copies them, compacts them, and tells
//! you when they go away or move. This crate is one of two that may contain
//! `unsafe` code (along with `chunkvec-ffi`), confined to `raw.rs`,
//! `alloc.rs` and a few marked entry points.
//!
//! # Architecture
//!
//! ```text
//! ChunkVec<A: ChunkAllocator>
//! ├── RawStore<A>   (cap * width bytes, always initialised, owns the allocation)
//! ├── len / cap / width
//! └── Hooks
//!     ├── Destructor         (record removed for good)
//!     ├── RelocationHandler  (store base address moved)
//!     └── Context            (opaque, returned by destroy)
//! ```
//!
//! # Hook firing points
//!
//! | operation                     | destructor | relocation handler |
//! |-------------------------------|------------|--------------------|
//! | `discard`, `clear`, `destroy`, drop | yes  | no                 |
//! | `filter` (rejected records)   | yes        | no                 |
//! | `write` (overwritten live records) | yes   | if it grows and moves |
//! | `pop`, `top`, `get`, `read`   | no         | no                 |
//! | `set` (in place)              | no         | no                 |
//! | `push`, `set` at `len`, `resize` | no      | if the store moves |
//!
//! # Example
//!
//! ```
//! use chunkvec::ChunkVec;
//!
//! let mut v = ChunkVec::new(4)?;
//! for x in 1i32..=5 {
//!     v.push(&x.to_ne_bytes())?;
//! }
//! v.swap(0, 4);
//! v.filter(|r| i32::from_ne_bytes(r.try_into().unwrap()) % 2 == 0);
//! assert_eq!(v.len(), 2);
//! # Ok::<(), chunkvec::ChunkError>(())
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod alloc;
pub mod buffer;
mod bulk;
pub mod config;
pub mod error;
pub mod hooks;
mod raw;
pub mod vec;

// Public re-exports for the primary API surface.
pub use alloc::{ChunkAllocator, SystemAllocator, STORE_ALIGN};
pub use buffer::ChunkBuffer;
pub use config::ChunkConfig;
pub use error::ChunkError;
pub use hooks::{Context, Destructor, Relocation, RelocationHandler};
pub use vec::ChunkVec;
