//! A counting, failure-injecting allocator for tests.

#![allow(unsafe_code)]

use std::cell::RefCell;
use std::ptr::{self, NonNull};
use std::rc::Rc;

use chunkvec::{ChunkAllocator, SystemAllocator};
use indexmap::IndexMap;

/// How [`TrackingAllocator`] serves `reallocate`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReallocMode {
    /// Forward to the system allocator, which may or may not move.
    #[default]
    System,
    /// Always hand out a fresh block and copy, so every resize moves.
    AlwaysMove,
    /// Reserve `reserve` bytes per block up front and resize in place
    /// while the new size fits; move only past the reservation.
    InPlace {
        /// Minimum bytes reserved for each block.
        reserve: usize,
    },
}

/// Call counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub allocations: usize,
    pub reallocations: usize,
    /// Reallocations that returned a different address.
    pub moves: usize,
    pub releases: usize,
    /// Requests refused by failure injection.
    pub failures: usize,
}

#[derive(Clone, Copy, Debug)]
struct Block {
    size: usize,
    reserved: usize,
}

#[derive(Debug, Default)]
struct State {
    mode: ReallocMode,
    stats: AllocStats,
    /// Live blocks by address, in allocation order.
    live: IndexMap<usize, Block>,
    /// Requests left before every request fails. `None` never fails.
    fail_after: Option<usize>,
}

impl State {
    fn admit(&mut self) -> bool {
        match self.fail_after.as_mut() {
            Some(0) => {
                self.stats.failures += 1;
                false
            }
            Some(n) => {
                *n -= 1;
                true
            }
            None => true,
        }
    }

    fn reserve_for(&self, size: usize) -> usize {
        match self.mode {
            ReallocMode::InPlace { reserve } => size.max(reserve),
            _ => size,
        }
    }
}

/// Allocator that wraps [`SystemAllocator`] and records what it does.
///
/// Clones share state, so a test can keep one handle and give a clone to
/// the vector under test.
#[derive(Clone, Debug, Default)]
pub struct TrackingAllocator {
    inner: SystemAllocator,
    state: Rc<RefCell<State>>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: ReallocMode) -> Self {
        let alloc = Self::default();
        alloc.state.borrow_mut().mode = mode;
        alloc
    }

    /// Every reallocation moves the block.
    pub fn always_move() -> Self {
        Self::with_mode(ReallocMode::AlwaysMove)
    }

    /// Blocks reserve `reserve` bytes and resize in place within it.
    pub fn in_place(reserve: usize) -> Self {
        Self::with_mode(ReallocMode::InPlace { reserve })
    }

    pub fn stats(&self) -> AllocStats {
        self.state.borrow().stats
    }

    /// Let the next `n` allocate/reallocate requests succeed, then refuse
    /// every request until [`heal`](Self::heal).
    pub fn fail_after(&self, n: usize) {
        self.state.borrow_mut().fail_after = Some(n);
    }

    /// Refuse the next request and every one after it.
    pub fn fail_now(&self) {
        self.fail_after(0);
    }

    /// Stop refusing requests.
    pub fn heal(&self) {
        self.state.borrow_mut().fail_after = None;
    }

    /// Number of blocks allocated and not yet released.
    pub fn live_blocks(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Sizes of live blocks, oldest first.
    pub fn live_sizes(&self) -> Vec<usize> {
        self.state.borrow().live.values().map(|b| b.size).collect()
    }

    /// Whether `ptr` is the base of a live block.
    pub fn is_live(&self, ptr: *const u8) -> bool {
        self.state.borrow().live.contains_key(&(ptr as usize))
    }
}

// SAFETY: every block comes from `SystemAllocator` with its reserved size,
// which the ledger remembers and passes back on reallocate and release.
// In-place resizes stay within the reserved size; moves copy the live prefix.
unsafe impl ChunkAllocator for TrackingAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let mut state = self.state.borrow_mut();
        if !state.admit() {
            return None;
        }
        let reserved = state.reserve_for(size);
        let ptr = self.inner.allocate(reserved)?;
        state.stats.allocations += 1;
        state
            .live
            .insert(ptr.as_ptr() as usize, Block { size, reserved });
        Some(ptr)
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let mut state = self.state.borrow_mut();
        if !state.admit() {
            return None;
        }
        let key = ptr.as_ptr() as usize;
        let old = state.live.get(&key).copied().unwrap_or(Block {
            size: old_size,
            reserved: old_size,
        });

        let (new_ptr, reserved) = match state.mode {
            ReallocMode::InPlace { .. } if new_size <= old.reserved => (ptr, old.reserved),
            ReallocMode::System => {
                // SAFETY: ptr was allocated by `inner` with `old.reserved` bytes.
                let p = unsafe { self.inner.reallocate(ptr, old.reserved, new_size) }?;
                (p, new_size)
            }
            _ => {
                let reserved = state.reserve_for(new_size);
                let fresh = self.inner.allocate(reserved)?;
                // SAFETY: both blocks are valid for the copied prefix and are
                // distinct allocations; the old one is released afterwards.
                unsafe {
                    ptr::copy_nonoverlapping(ptr.as_ptr(), fresh.as_ptr(), old_size.min(new_size));
                    self.inner.release(ptr, old.reserved);
                }
                (fresh, reserved)
            }
        };

        state.stats.reallocations += 1;
        if new_ptr != ptr {
            state.stats.moves += 1;
        }
        state.live.shift_remove(&key);
        state.live.insert(
            new_ptr.as_ptr() as usize,
            Block {
                size: new_size,
                reserved,
            },
        );
        Some(new_ptr)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        let mut state = self.state.borrow_mut();
        state.stats.releases += 1;
        let reserved = state
            .live
            .shift_remove(&(ptr.as_ptr() as usize))
            .map_or(size, |b| b.reserved);
        // SAFETY: ptr came from `inner` with `reserved` bytes.
        unsafe { self.inner.release(ptr, reserved) };
    }
}
