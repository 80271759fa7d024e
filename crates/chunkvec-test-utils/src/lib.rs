//! Test utilities for chunkvec development.
//!
//! - [`TrackingAllocator`]: counts allocator calls, keeps a ledger of live
//!   blocks, fails on demand, and can force reallocations to move or to
//!   stay in place.
//! - [`DestructorLog`] / [`RelocationLog`]: shared recorders to install as
//!   hooks and inspect afterwards.
//! - [`record`] helpers for building `i32` records.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod allocator;
pub mod record;
pub mod recorder;

pub use allocator::{AllocStats, ReallocMode, TrackingAllocator};
pub use recorder::{DestructorLog, RecordBytes, RelocationLog, SeenRelocation};
