//! Bulk transfer and structural operations on a [`ChunkVec`].
//!
//! Everything here works on whole runs of records: `write` and `read` move
//! many records at once, `filter` compacts in place, `clear` and `discard`
//! remove from the tail. These are the points where the destructor hook
//! fires.

use std::ops::Range;

use crate::alloc::ChunkAllocator;
use crate::error::ChunkError;
use crate::vec::{store_bytes, ChunkVec};

impl<A: ChunkAllocator> ChunkVec<A> {
    /// Run the destructor on records in `range`, first to last.
    fn destruct_forward(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let Some(destructor) = self.hooks.destructor.as_mut() else {
            return;
        };
        let width = self.width;
        let bytes = &mut self.store.as_mut_slice()[range.start * width..range.end * width];
        for record in bytes.chunks_exact_mut(width) {
            destructor(record);
        }
    }

    /// Run the destructor on records in `range`, last to first.
    fn destruct_backward(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let Some(destructor) = self.hooks.destructor.as_mut() else {
            return;
        };
        let width = self.width;
        let bytes = &mut self.store.as_mut_slice()[range.start * width..range.end * width];
        for record in bytes.rchunks_exact_mut(width) {
            destructor(record);
        }
    }

    /// Copy `src.len() / width()` records into the vector starting at `index`.
    ///
    /// Grows first when `index + count` exceeds the capacity, to
    /// `max((cap << 1) | 1, index + count)`; on allocation failure nothing
    /// changes. Live records about to be overwritten are passed to the
    /// destructor before the copy. Afterwards `len() == max(len(), index + count)`.
    /// If `index > len()`, the records between the old end and `index`
    /// become live as zero bytes. Trailing bytes of `src` that do not form a
    /// whole record are ignored.
    ///
    /// If the destructor panics, the vector is left truncated at `index`.
    #[allow(unsafe_code)]
    pub fn write(&mut self, index: usize, src: &[u8]) -> Result<(), ChunkError> {
        let count = src.len() / self.width;
        // SAFETY: `src` is a shared borrow valid for `count * width` bytes and
        // cannot alias the store while `self` is borrowed mutably.
        unsafe { self.write_raw(index, src.as_ptr(), count) }
    }

    /// Pointer-based [`write`](Self::write) whose source may lie inside the
    /// vector's own store.
    ///
    /// The copy has `memmove` semantics. If growth moves the store, a source
    /// pointer into the old store is rebased before copying.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads of `count * width()` bytes, either in
    /// foreign memory or entirely within the store's first
    /// `capacity() * width()` bytes.
    #[allow(unsafe_code)]
    pub unsafe fn write_raw(
        &mut self,
        index: usize,
        src: *const u8,
        count: usize,
    ) -> Result<(), ChunkError> {
        if count == 0 {
            return Ok(());
        }
        let width = self.width;
        let end = index.checked_add(count).ok_or_else(ChunkError::overflow)?;
        let src_bytes = store_bytes(width, count)?;
        store_bytes(width, end)?;

        let base = self.store.as_ptr() as usize;
        let interior = (src as usize)
            .checked_sub(base)
            .filter(|&off| off < self.store.bytes());

        self.reserve_for(end)?;

        let src = match interior {
            // SAFETY: the offset was inside the old store and the store only grew.
            Some(off) => unsafe { self.store.as_ptr().add(off) },
            None => src,
        };

        // Until the copy lands, records from `index` on are out of the live
        // range: a panicking destructor truncates the vector at `index`.
        let old_len = self.len;
        self.len = old_len.min(index);
        self.destruct_forward(index..end.min(old_len));
        self.len = old_len;
        if index > self.len {
            self.store.as_mut_slice()[self.len * width..index * width].fill(0);
        }
        // SAFETY: `src` is valid for `src_bytes` reads per caller contract
        // (rebased above if it pointed into a moved store), and
        // `index * width + src_bytes == end * width <= capacity * width`.
        unsafe { self.store.copy_in(index * width, src, src_bytes) };
        self.len = self.len.max(end);
        Ok(())
    }

    /// Copy up to `dest.len() / width()` records starting at `index` into
    /// `dest`. Returns the number of records copied.
    ///
    /// The count is truncated at the end of the live range; `index >= len()`
    /// copies nothing. Compare the result with the requested count to detect
    /// truncation.
    pub fn read(&self, index: usize, dest: &mut [u8]) -> usize {
        if index >= self.len {
            return 0;
        }
        let width = self.width;
        let count = (dest.len() / width).min(self.len - index);
        let bytes = count * width;
        dest[..bytes].copy_from_slice(&self.as_bytes()[index * width..index * width + bytes]);
        count
    }

    /// Visit live records first to last, stopping the first time `f`
    /// returns `false`.
    ///
    /// `f` may modify record bytes; it cannot change the vector's shape.
    pub fn for_each<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut [u8]) -> bool,
    {
        for record in self.records_mut() {
            if !f(record) {
                break;
            }
        }
    }

    /// Keep only the records for which `keep` returns `true`.
    ///
    /// One left-to-right pass with a read and a write cursor: survivors are
    /// compacted into a dense prefix in their original order, rejected
    /// records go to the destructor. O(n) time, no extra memory.
    ///
    /// If `keep` or the destructor panics, the unvisited records are shifted
    /// down behind the survivors and stay live; no record is destructed
    /// twice.
    pub fn filter<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[u8]) -> bool,
    {
        let len = self.len;
        let mut pass = FilterPass {
            vec: self,
            len,
            read: 0,
            kept: 0,
        };
        let width = pass.vec.width;
        while pass.read < pass.len {
            let at = pass.read * width;
            let keep_it = keep(&pass.vec.store.as_slice()[at..at + width]);
            pass.read += 1;
            if keep_it {
                if pass.kept != pass.read - 1 {
                    pass.vec
                        .store
                        .as_mut_slice()
                        .copy_within(at..at + width, pass.kept * width);
                }
                pass.kept += 1;
            } else if let Some(destructor) = pass.vec.hooks.destructor.as_mut() {
                destructor(&mut pass.vec.store.as_mut_slice()[at..at + width]);
            }
        }
    }

    /// Remove every live record, running the destructor on each in index
    /// order. Capacity is unchanged.
    ///
    /// The records leave the live range before the destructor runs, so a
    /// panicking destructor leaks the rest instead of leaving them live.
    pub fn clear(&mut self) {
        let len = self.len;
        self.len = 0;
        self.destruct_forward(0..len);
    }

    /// Remove the last `min(n, len())` records, running the destructor on
    /// each, highest index first. Capacity is unchanged.
    pub fn discard(&mut self, n: usize) {
        let old_len = self.len;
        self.len = old_len - n.min(old_len);
        self.destruct_backward(self.len..old_len);
    }
}

/// In-progress `filter`. Dropping it, on completion or unwind, closes the
/// gap between the survivors and the unvisited tail and fixes `len`.
struct FilterPass<'a, A: ChunkAllocator> {
    vec: &'a mut ChunkVec<A>,
    /// Live length before the pass.
    len: usize,
    /// Records classified so far.
    read: usize,
    /// Survivors compacted into `[0, kept)`.
    kept: usize,
}

impl<A: ChunkAllocator> Drop for FilterPass<'_, A> {
    fn drop(&mut self) {
        let width = self.vec.width;
        if self.read < self.len && self.kept != self.read {
            self.vec.store.as_mut_slice().copy_within(
                self.read * width..self.len * width,
                self.kept * width,
            );
        }
        self.vec.len = self.kept + (self.len - self.read);
    }
}
