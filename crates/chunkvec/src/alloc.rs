//! Pluggable memory primitives backing a chunk store.
//!
//! A [`ChunkVec`](crate::ChunkVec) never talks to the global allocator
//! directly. It goes through a [`ChunkAllocator`] object owned by the vector,
//! so a store can be placed in a custom heap, counted in tests, or handed to
//! C code that frees it with its own `free`.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Alignment of every region returned by [`SystemAllocator`].
///
/// Matches the guarantee of `malloc` on 64-bit targets, so records holding
/// primitive values may be read in place through [`ChunkVec::as_ptr`].
///
/// [`ChunkVec::as_ptr`]: crate::ChunkVec::as_ptr
pub const STORE_ALIGN: usize = 16;

/// The three memory primitives a store needs: allocate, reallocate, release.
///
/// Sizes are always non-zero. The size passed to `reallocate` and `release`
/// is the size the region currently has.
///
/// # Safety
///
/// Implementors must uphold:
/// - `allocate(n)` returns a region valid for reads and writes of `n` bytes
///   that stays valid until it is released or reallocated.
/// - `reallocate` preserves the first `min(old_size, new_size)` bytes. On
///   success the old pointer is invalidated; on failure (`None`) the old
///   region is left untouched and still owned by the caller.
/// - `release` accepts any pointer previously returned by `allocate` or
///   `reallocate` on an equal allocator.
pub unsafe trait ChunkAllocator {
    /// Allocate `size` bytes. Returns `None` when memory is unavailable.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Resize the region at `ptr` from `old_size` to `new_size` bytes.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator and currently span
    /// `old_size` bytes.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>>;

    /// Release the region at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator, currently span
    /// `size` bytes, and must not be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

/// Allocator backed by the Rust global allocator, aligned to [`STORE_ALIGN`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemAllocator;

impl SystemAllocator {
    fn layout(size: usize) -> Option<Layout> {
        Layout::from_size_align(size, STORE_ALIGN).ok()
    }
}

// SAFETY: delegates to `std::alloc` with a layout rebuilt from the size the
// caller reports; `realloc` preserves contents and leaves the old block
// untouched on failure.
unsafe impl ChunkAllocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        debug_assert!(size > 0, "zero-sized store request");
        let layout = Self::layout(size)?;
        // SAFETY: layout has non-zero size.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        // Rejects sizes that would overflow isize once rounded to the alignment.
        Self::layout(new_size)?;
        let old = Self::layout(old_size)?;
        // SAFETY: ptr was allocated by us with `old`, new_size is non-zero and valid.
        NonNull::new(unsafe { alloc::realloc(ptr.as_ptr(), old, new_size) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        if let Some(layout) = Self::layout(size) {
            // SAFETY: ptr was allocated by us with this layout.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}
