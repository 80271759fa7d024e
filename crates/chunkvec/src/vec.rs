//! The chunk vector: construction, capacity management, element access and
//! lifecycle.
//!
//! Bulk operations (`write`, `read`, `filter`, ...) live in `bulk.rs` as a
//! second `impl` block on the same type.

use std::any::Any;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr;
use std::slice::{ChunksExact, ChunksExactMut};

use tracing::trace;

use crate::alloc::{ChunkAllocator, SystemAllocator};
use crate::buffer::ChunkBuffer;
use crate::config::ChunkConfig;
use crate::error::ChunkError;
use crate::hooks::{Context, Destructor, Hooks, Relocation, RelocationHandler};
use crate::raw::RawStore;

/// Size of the stack block `swap` exchanges records through.
pub(crate) const SWAP_BLOCK: usize = 16;

/// Growth policy: `(cap << 1) | 1`, always odd and at least double.
///
/// Returns `None` if the doubled capacity overflows.
pub(crate) fn grown_capacity(cap: usize) -> Option<usize> {
    cap.checked_mul(2).map(|c| c | 1)
}

/// Byte size of `capacity` records of `width` bytes.
pub(crate) fn store_bytes(width: usize, capacity: usize) -> Result<usize, ChunkError> {
    width.checked_mul(capacity).ok_or_else(ChunkError::overflow)
}

/// A contiguous, growable vector of fixed-width byte records.
///
/// The vector owns one store of `capacity() * width()` bytes. The first
/// `len()` records are live; the rest of the store is spare room. Records
/// are copied in and out as raw bytes and never interpreted.
///
/// An optional destructor runs on records that are removed for good, an
/// optional relocation handler is told whenever a resize moves the store,
/// and an opaque context travels with the vector until
/// [`destroy`](Self::destroy) hands it back.
///
/// Single-record operations take item/destination buffers of at least
/// `width()` bytes and use only the first `width()` of them.
///
/// # Panics
///
/// Passing an item or destination buffer shorter than `width()` bytes
/// panics, like a mismatched `copy_from_slice`.
pub struct ChunkVec<A: ChunkAllocator = SystemAllocator> {
    pub(crate) store: RawStore<A>,
    pub(crate) len: usize,
    pub(crate) cap: usize,
    pub(crate) width: usize,
    pub(crate) hooks: Hooks,
}

impl ChunkVec<SystemAllocator> {
    /// Create a vector of `width`-byte records with the default capacity (8).
    pub fn new(width: usize) -> Result<Self, ChunkError> {
        Self::with_config(ChunkConfig::new(width))
    }

    /// Create a vector of `width`-byte records able to hold `capacity`
    /// records before growing. Zero arguments are coerced to 1.
    pub fn with_capacity(width: usize, capacity: usize) -> Result<Self, ChunkError> {
        Self::with_config(ChunkConfig::new(width).with_capacity(capacity))
    }

    /// Create a vector from a [`ChunkConfig`].
    pub fn with_config(config: ChunkConfig) -> Result<Self, ChunkError> {
        Self::with_config_in(config, SystemAllocator)
    }
}

impl<A: ChunkAllocator> ChunkVec<A> {
    /// Like [`ChunkVec::new`], with an explicit allocator.
    pub fn new_in(width: usize, alloc: A) -> Result<Self, ChunkError> {
        Self::with_config_in(ChunkConfig::new(width), alloc)
    }

    /// Like [`ChunkVec::with_capacity`], with an explicit allocator.
    pub fn with_capacity_in(width: usize, capacity: usize, alloc: A) -> Result<Self, ChunkError> {
        Self::with_config_in(ChunkConfig::new(width).with_capacity(capacity), alloc)
    }

    /// Like [`ChunkVec::with_config`], with an explicit allocator.
    pub fn with_config_in(config: ChunkConfig, alloc: A) -> Result<Self, ChunkError> {
        let width = config.effective_width();
        let cap = config.effective_capacity();
        let store = RawStore::allocate(store_bytes(width, cap)?, alloc)?;
        trace!(width, capacity = cap, "chunk vector created");
        Ok(Self {
            store,
            len: 0,
            cap,
            width,
            hooks: Hooks::default(),
        })
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no live records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of records the store holds without reallocating. Always >= 1.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Size of one record in bytes. Always >= 1.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The allocator owning the store.
    pub fn allocator(&self) -> &A {
        self.store.allocator()
    }

    /// Live records as one contiguous byte slice of `len() * width()` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.store.as_slice()[..self.len * self.width]
    }

    /// Live records as one mutable byte slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let live = self.len * self.width;
        &mut self.store.as_mut_slice()[..live]
    }

    /// Iterator over live records, first to last.
    pub fn records(&self) -> ChunksExact<'_, u8> {
        self.as_bytes().chunks_exact(self.width)
    }

    /// Mutable iterator over live records, first to last.
    pub fn records_mut(&mut self) -> ChunksExactMut<'_, u8> {
        let width = self.width;
        self.as_bytes_mut().chunks_exact_mut(width)
    }

    /// Base address of the store.
    ///
    /// Valid until the next resize; install a relocation handler to learn
    /// when it moves.
    pub fn as_ptr(&self) -> *const u8 {
        self.store.as_ptr()
    }

    /// Mutable base address of the store.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.store.as_mut_ptr()
    }

    // ── Hooks ───────────────────────────────────────────────────────

    /// Install the destructor run on records removed for good.
    pub fn set_destructor<F>(&mut self, destructor: F)
    where
        F: FnMut(&mut [u8]) + 'static,
    {
        self.hooks.destructor = Some(Box::new(destructor));
    }

    /// Remove and return the destructor, if any.
    pub fn take_destructor(&mut self) -> Option<Destructor> {
        self.hooks.destructor.take()
    }

    /// Whether a destructor is installed.
    pub fn has_destructor(&self) -> bool {
        self.hooks.has_destructor()
    }

    /// Install the handler told about store moves.
    pub fn set_relocation_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&Relocation, Option<&mut (dyn Any + 'static)>) + 'static,
    {
        self.hooks.relocation = Some(Box::new(handler));
    }

    /// Remove and return the relocation handler, if any.
    pub fn take_relocation_handler(&mut self) -> Option<RelocationHandler> {
        self.hooks.relocation.take()
    }

    /// Attach an opaque context, returning the previous one.
    pub fn set_context<T: Any>(&mut self, context: T) -> Option<Context> {
        self.hooks.context.replace(Box::new(context))
    }

    /// Borrow the context if it is a `T`.
    pub fn context<T: Any>(&self) -> Option<&T> {
        self.hooks.context.as_deref()?.downcast_ref()
    }

    /// Mutably borrow the context if it is a `T`.
    pub fn context_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.hooks.context.as_deref_mut()?.downcast_mut()
    }

    /// Detach and return the context.
    pub fn take_context(&mut self) -> Option<Context> {
        self.hooks.context.take()
    }

    // ── Capacity ────────────────────────────────────────────────────

    /// Set the capacity to `new_capacity` records (coerced to at least 1).
    ///
    /// A same-capacity call succeeds without touching the store. On
    /// allocation failure the vector is unchanged. When the store moves,
    /// the relocation handler (if any) runs once with the byte delta.
    /// Shrinking below `len()` truncates the live range without running the
    /// destructor on the cut records.
    pub fn resize(&mut self, new_capacity: usize) -> Result<(), ChunkError> {
        let new_capacity = new_capacity.max(1);
        if new_capacity == self.cap {
            return Ok(());
        }
        let moved = self.store.reallocate(store_bytes(self.width, new_capacity)?)?;
        trace!(
            old_capacity = self.cap,
            new_capacity,
            width = self.width,
            "chunk vector resized"
        );
        self.cap = new_capacity;
        self.len = self.len.min(new_capacity);
        if let Some(relocation) = moved {
            trace!(offset = relocation.offset(), "chunk store relocated");
            self.hooks.relocated(&relocation);
        }
        Ok(())
    }

    /// Grow by the doubling policy if the store is full.
    fn reserve_one(&mut self) -> Result<(), ChunkError> {
        if self.len < self.cap {
            return Ok(());
        }
        let next = grown_capacity(self.cap).ok_or_else(ChunkError::overflow)?;
        self.resize(next)
    }

    /// Ensure room for `min_capacity` records, growing to at least the
    /// doubling-policy size.
    pub(crate) fn reserve_for(&mut self, min_capacity: usize) -> Result<(), ChunkError> {
        if min_capacity <= self.cap {
            return Ok(());
        }
        let target = grown_capacity(self.cap).map_or(min_capacity, |g| g.max(min_capacity));
        self.resize(target)
    }

    // ── Element access ──────────────────────────────────────────────

    fn head<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        assert!(
            buf.len() >= self.width,
            "record buffer of {} bytes is shorter than width {}",
            buf.len(),
            self.width
        );
        &buf[..self.width]
    }

    fn head_mut<'b>(&self, buf: &'b mut [u8]) -> &'b mut [u8] {
        assert!(
            buf.len() >= self.width,
            "record buffer of {} bytes is shorter than width {}",
            buf.len(),
            self.width
        );
        &mut buf[..self.width]
    }

    /// Append a record, growing the store if it is full.
    ///
    /// On allocation failure nothing changes.
    pub fn push(&mut self, item: &[u8]) -> Result<(), ChunkError> {
        let item = self.head(item);
        self.reserve_one()?;
        let at = self.len * self.width;
        self.store.as_mut_slice()[at..at + self.width].copy_from_slice(item);
        self.len += 1;
        Ok(())
    }

    /// Move the last record into `dest`. Returns `false` when empty.
    ///
    /// The destructor does not run: the record now belongs to the caller.
    pub fn pop(&mut self, dest: &mut [u8]) -> bool {
        if !self.top(dest) {
            return false;
        }
        self.len -= 1;
        true
    }

    /// Copy the last record into `dest` without removing it.
    pub fn top(&self, dest: &mut [u8]) -> bool {
        match self.len.checked_sub(1) {
            Some(last) => self.get(last, dest),
            None => false,
        }
    }

    /// Copy record `index` into `dest`. Returns `false` if out of range.
    pub fn get(&self, index: usize, dest: &mut [u8]) -> bool {
        let Some(record) = self.record(index) else {
            return false;
        };
        self.head_mut(dest).copy_from_slice(record);
        true
    }

    /// Borrow record `index`, or `None` if out of range.
    pub fn record(&self, index: usize) -> Option<&[u8]> {
        if index >= self.len {
            return None;
        }
        let at = index * self.width;
        Some(&self.store.as_slice()[at..at + self.width])
    }

    /// Mutably borrow record `index`, or `None` if out of range.
    pub fn record_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        if index >= self.len {
            return None;
        }
        let at = index * self.width;
        let width = self.width;
        Some(&mut self.store.as_mut_slice()[at..at + width])
    }

    /// Overwrite record `index`, or append when `index == len()`.
    ///
    /// In-place overwrites do not run the destructor on the old record.
    /// `index > len()` fails with [`ChunkError::IndexPastEnd`].
    pub fn set(&mut self, index: usize, item: &[u8]) -> Result<(), ChunkError> {
        if index > self.len {
            return Err(ChunkError::IndexPastEnd {
                index,
                len: self.len,
            });
        }
        if index == self.len {
            return self.push(item);
        }
        let item = self.head(item);
        let at = index * self.width;
        let width = self.width;
        self.store.as_mut_slice()[at..at + width].copy_from_slice(item);
        Ok(())
    }

    /// Exchange two records. Equal or out-of-range indices are ignored.
    ///
    /// Bytes move through a [`SWAP_BLOCK`]-sized stack block, so any width
    /// is handled without a record-sized temporary.
    pub fn swap(&mut self, i1: usize, i2: usize) {
        if i1 == i2 || i1 >= self.len || i2 >= self.len {
            return;
        }
        let (lo, hi) = (i1.min(i2), i1.max(i2));
        let width = self.width;
        let (head, tail) = self.store.as_mut_slice().split_at_mut(hi * width);
        let a = &mut head[lo * width..(lo + 1) * width];
        let b = &mut tail[..width];

        let mut block = [0u8; SWAP_BLOCK];
        for (a, b) in a.chunks_mut(SWAP_BLOCK).zip(b.chunks_mut(SWAP_BLOCK)) {
            let n = a.len();
            block[..n].copy_from_slice(a);
            a.copy_from_slice(b);
            b.copy_from_slice(&block[..n]);
        }
    }

    // ── Copies and lifecycle ────────────────────────────────────────

    /// Duplicate the vector: same width and capacity, same live records.
    ///
    /// Hooks and context are not carried over; the copy starts bare.
    pub fn try_clone(&self) -> Result<Self, ChunkError>
    where
        A: Clone,
    {
        let mut copy = Self::with_capacity_in(self.width, self.cap, self.allocator().clone())?;
        let live = self.len * self.width;
        copy.store.as_mut_slice()[..live].copy_from_slice(self.as_bytes());
        copy.len = self.len;
        Ok(copy)
    }

    /// Copy the live records into a detached buffer of exactly
    /// `len() * width()` bytes (at least 1 byte is allocated).
    pub fn copy_store(&self) -> Result<ChunkBuffer<A>, ChunkError>
    where
        A: Clone,
    {
        let live = self.as_bytes();
        let mut store = RawStore::allocate(live.len(), self.allocator().clone())?;
        store.as_mut_slice()[..live.len()].copy_from_slice(live);
        Ok(ChunkBuffer::new(store, live.len()))
    }

    /// Destroy the vector, running the destructor on every live record in
    /// index order, and return the context.
    ///
    /// Dropping a vector performs the same cleanup and discards the context.
    pub fn destroy(mut self) -> Option<Context> {
        self.clear();
        trace!(capacity = self.cap, width = self.width, "chunk vector destroyed");
        self.hooks.context.take()
    }

    /// Turn the vector into its raw store without running the destructor.
    ///
    /// The returned buffer holds the live records and owns the whole store;
    /// hooks and context are dropped.
    #[allow(unsafe_code)]
    pub fn into_store(self) -> ChunkBuffer<A> {
        let live = self.len * self.width;
        let mut this = ManuallyDrop::new(self);
        this.hooks = Hooks::default();
        // SAFETY: `this` is never dropped or used again, so the store is
        // moved out exactly once and released only by the returned buffer.
        let store = unsafe { ptr::read(&this.store) };
        ChunkBuffer::new(store, live)
    }
}

impl<A: ChunkAllocator> Drop for ChunkVec<A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<A: ChunkAllocator> fmt::Debug for ChunkVec<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkVec")
            .field("len", &self.len)
            .field("capacity", &self.cap)
            .field("width", &self.width)
            .field("hooks", &self.hooks)
            .finish()
    }
}
