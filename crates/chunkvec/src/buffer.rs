//! Plain owned byte buffers detached from a chunk vector.
//!
//! A [`ChunkBuffer`] is what a vector turns into when its raw records are
//! handed to other code: either the vector's own store
//! ([`ChunkVec::into_store`](crate::ChunkVec::into_store)) or a fresh copy of
//! its live records ([`ChunkVec::copy_store`](crate::ChunkVec::copy_store)).
//! The bytes are `len` back-to-back records in host byte order, no header.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::alloc::{ChunkAllocator, SystemAllocator};
use crate::raw::RawStore;

/// Owned region whose first `len()` bytes are live record data.
///
/// Releases the region through its allocator when dropped. No destructor
/// hook ever runs on a buffer's contents.
pub struct ChunkBuffer<A: ChunkAllocator = SystemAllocator> {
    store: RawStore<A>,
    /// Number of live bytes at the start of the region.
    len: usize,
}

impl<A: ChunkAllocator> ChunkBuffer<A> {
    pub(crate) fn new(store: RawStore<A>, len: usize) -> Self {
        debug_assert!(len <= store.bytes());
        Self { store, len }
    }

    /// Size of the underlying region in bytes (at least 1, at least `len()`).
    pub fn capacity_bytes(&self) -> usize {
        self.store.bytes()
    }

    /// The allocator that owns the region.
    pub fn allocator(&self) -> &A {
        self.store.allocator()
    }

    /// Decompose into `(ptr, len, capacity_bytes, allocator)` without releasing.
    ///
    /// The caller becomes responsible for releasing `ptr` (spanning
    /// `capacity_bytes`) through the returned allocator, or for rebuilding
    /// the buffer with [`from_raw_parts`](Self::from_raw_parts).
    pub fn into_raw_parts(self) -> (NonNull<u8>, usize, usize, A) {
        let len = self.len;
        let (ptr, bytes, alloc) = self.store.into_raw_parts();
        (ptr, len, bytes, alloc)
    }

    /// Rebuild a buffer from parts produced by [`into_raw_parts`](Self::into_raw_parts).
    ///
    /// # Safety
    ///
    /// The parts must come from `into_raw_parts` (or describe an equivalent
    /// region: allocated by `alloc`, `capacity_bytes` initialised bytes,
    /// `len <= capacity_bytes`, not owned elsewhere).
    #[allow(unsafe_code)]
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize, capacity_bytes: usize, alloc: A) -> Self {
        // SAFETY: forwarded caller contract.
        let store = unsafe { RawStore::from_raw_parts(ptr, capacity_bytes, alloc) };
        Self::new(store, len)
    }
}

impl<A: ChunkAllocator> Deref for ChunkBuffer<A> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.store.as_slice()[..self.len]
    }
}

impl<A: ChunkAllocator> DerefMut for ChunkBuffer<A> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.store.as_mut_slice()[..len]
    }
}

impl<A: ChunkAllocator> AsRef<[u8]> for ChunkBuffer<A> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl<A: ChunkAllocator> fmt::Debug for ChunkBuffer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkBuffer")
            .field("len", &self.len)
            .field("capacity_bytes", &self.capacity_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(bytes: &[u8], capacity: usize) -> ChunkBuffer {
        let mut store = RawStore::allocate(capacity, SystemAllocator).unwrap();
        store.as_mut_slice()[..bytes.len()].copy_from_slice(bytes);
        ChunkBuffer::new(store, bytes.len())
    }

    #[test]
    fn deref_exposes_only_live_bytes() {
        let buf = buffer_with(&[1, 2, 3], 16);
        assert_eq!(&*buf, &[1, 2, 3]);
        assert_eq!(buf.capacity_bytes(), 16);
    }

    #[test]
    fn empty_buffer_still_owns_one_byte() {
        let buf = buffer_with(&[], 0);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity_bytes(), 1);
    }

    #[test]
    #[allow(unsafe_code)]
    fn raw_parts_round_trip() {
        let buf = buffer_with(&[5, 6], 8);
        let (ptr, len, cap, alloc) = buf.into_raw_parts();
        assert_eq!((len, cap), (2, 8));
        let mut buf = unsafe { ChunkBuffer::from_raw_parts(ptr, len, cap, alloc) };
        buf[1] = 7;
        assert_eq!(buf.as_ref(), &[5, 7]);
    }
}
