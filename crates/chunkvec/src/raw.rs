//! Low-level owned memory region behind every chunk vector.
//!
//! [`RawStore`] is the only type that touches allocator pointers. It keeps
//! one invariant that lets the rest of the crate stay in safe code: every
//! byte of the region is initialised. Fresh regions and grown tails are
//! zero-filled, so the whole store can be viewed as `&[u8]` at any time.
//! Each `unsafe` block carries a `// SAFETY:` comment.

#![allow(unsafe_code)]

use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};
use std::slice;

use tracing::{debug, trace};

use crate::alloc::ChunkAllocator;
use crate::error::ChunkError;
use crate::hooks::Relocation;

/// An allocator-owned, fully initialised byte region.
pub(crate) struct RawStore<A: ChunkAllocator> {
    ptr: NonNull<u8>,
    /// Size of the region in bytes. Never zero.
    bytes: usize,
    alloc: A,
}

impl<A: ChunkAllocator> RawStore<A> {
    /// Allocate a zero-filled region of `bytes` bytes (coerced to at least 1).
    pub(crate) fn allocate(bytes: usize, alloc: A) -> Result<Self, ChunkError> {
        let bytes = bytes.max(1);
        let ptr = alloc.allocate(bytes).ok_or_else(|| {
            debug!(requested_bytes = bytes, "store allocation failed");
            ChunkError::AllocationFailed {
                requested_bytes: bytes,
            }
        })?;
        // SAFETY: the allocator returned a region valid for `bytes` writes.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, bytes) };
        Ok(Self { ptr, bytes, alloc })
    }

    /// Resize the region to `new_bytes` (coerced to at least 1).
    ///
    /// Returns `Some(Relocation)` when the base address changed. On failure
    /// the region is untouched.
    pub(crate) fn reallocate(
        &mut self,
        new_bytes: usize,
    ) -> Result<Option<Relocation>, ChunkError> {
        let new_bytes = new_bytes.max(1);
        if new_bytes == self.bytes {
            return Ok(None);
        }
        let old_base = self.ptr.as_ptr() as usize;
        let old_bytes = self.bytes;
        // SAFETY: `ptr` came from `alloc` and currently spans `self.bytes` bytes.
        let ptr = unsafe { self.alloc.reallocate(self.ptr, old_bytes, new_bytes) }.ok_or_else(
            || {
                debug!(old_bytes, requested_bytes = new_bytes, "store reallocation failed");
                ChunkError::AllocationFailed {
                    requested_bytes: new_bytes,
                }
            },
        )?;
        if new_bytes > old_bytes {
            // SAFETY: the region spans `new_bytes`; the tail past `old_bytes`
            // is uninitialised until written here.
            unsafe { ptr::write_bytes(ptr.as_ptr().add(old_bytes), 0, new_bytes - old_bytes) };
        }
        self.ptr = ptr;
        self.bytes = new_bytes;

        let new_base = ptr.as_ptr() as usize;
        trace!(old_bytes, new_bytes, moved = new_base != old_base, "store reallocated");
        Ok((new_base != old_base)
            .then(|| Relocation::new(old_base, new_base, old_bytes, new_bytes)))
    }

    /// Size of the region in bytes.
    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }

    pub(crate) fn allocator(&self) -> &A {
        &self.alloc
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// The whole region.
    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: the region spans `bytes` initialised bytes (see module docs)
        // and is exclusively owned by `self`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.bytes) }
    }

    /// The whole region, mutably.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`; `&mut self` guarantees uniqueness.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.bytes) }
    }

    /// Copy `len` bytes from `src` to offset `dst` with `memmove` semantics.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads of `len` bytes. It may point into this
    /// store. `dst + len` must not exceed [`bytes`](Self::bytes).
    pub(crate) unsafe fn copy_in(&mut self, dst: usize, src: *const u8, len: usize) {
        debug_assert!(dst + len <= self.bytes);
        // SAFETY: caller contract; `ptr::copy` tolerates overlap.
        unsafe { ptr::copy(src, self.ptr.as_ptr().add(dst), len) };
    }

    /// Give up ownership of the region without releasing it.
    pub(crate) fn into_raw_parts(self) -> (NonNull<u8>, usize, A) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the allocator is moved out exactly once.
        let alloc = unsafe { ptr::read(&this.alloc) };
        (this.ptr, this.bytes, alloc)
    }

    /// Rebuild a store from parts produced by [`into_raw_parts`](Self::into_raw_parts).
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by `alloc`, span `bytes` initialised
    /// bytes, and not be owned by anything else.
    pub(crate) unsafe fn from_raw_parts(ptr: NonNull<u8>, bytes: usize, alloc: A) -> Self {
        Self { ptr, bytes, alloc }
    }
}

impl<A: ChunkAllocator> Drop for RawStore<A> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `alloc`, spans `bytes`, and is never used again.
        unsafe { self.alloc.release(self.ptr, self.bytes) };
    }
}
