//! Side-effect hooks attached to a chunk vector.
//!
//! - **Destructor:** runs on a record's bytes when the record is removed
//!   for good (discard, clear, filter rejection, overwrite by `write`,
//!   destroy or drop).
//! - **Relocation handler:** runs when a resize moves the store to a new
//!   base address, so code holding raw addresses into the old store can
//!   rebase them.
//! - **Context:** an opaque value handed to the relocation handler and
//!   returned by [`ChunkVec::destroy`](crate::ChunkVec::destroy).

use std::any::Any;
use std::fmt;

/// Callback invoked on the bytes of a record being removed.
pub type Destructor = Box<dyn FnMut(&mut [u8])>;

/// Callback invoked after the store moved, with the vector's context.
pub type RelocationHandler = Box<dyn FnMut(&Relocation, Option<&mut (dyn Any + 'static)>)>;

/// Opaque value owned by a vector until it is destroyed.
pub type Context = Box<dyn Any>;

/// Describes a store move caused by a resize.
///
/// Addresses are plain integers; they are only meaningful for rebasing
/// pointers the caller took through [`ChunkVec::as_ptr`](crate::ChunkVec::as_ptr).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    old_base: usize,
    new_base: usize,
    old_bytes: usize,
    new_bytes: usize,
}

impl Relocation {
    pub(crate) fn new(old_base: usize, new_base: usize, old_bytes: usize, new_bytes: usize) -> Self {
        Self {
            old_base,
            new_base,
            old_bytes,
            new_bytes,
        }
    }

    /// Base address of the store before the move.
    pub fn old_base(&self) -> usize {
        self.old_base
    }

    /// Base address of the store after the move.
    pub fn new_base(&self) -> usize {
        self.new_base
    }

    /// Size of the store before the move, in bytes.
    pub fn old_bytes(&self) -> usize {
        self.old_bytes
    }

    /// Size of the store after the move, in bytes.
    pub fn new_bytes(&self) -> usize {
        self.new_bytes
    }

    /// Signed byte delta `new_base - old_base`.
    pub fn offset(&self) -> isize {
        self.new_base.wrapping_sub(self.old_base) as isize
    }

    /// Whether `addr` pointed into the old store.
    pub fn contains_old(&self, addr: usize) -> bool {
        addr >= self.old_base && addr - self.old_base < self.old_bytes
    }

    /// Translate an address into the old store to the same position in the new one.
    pub fn rebase(&self, addr: usize) -> usize {
        addr.wrapping_add_signed(self.offset())
    }
}

/// Hook slots of a single vector.
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) destructor: Option<Destructor>,
    pub(crate) relocation: Option<RelocationHandler>,
    pub(crate) context: Option<Context>,
}

impl Hooks {
    pub(crate) fn has_destructor(&self) -> bool {
        self.destructor.is_some()
    }

    pub(crate) fn relocated(&mut self, relocation: &Relocation) {
        if let Some(handler) = self.relocation.as_mut() {
            handler(relocation, self.context.as_deref_mut());
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("destructor", &self.destructor.is_some())
            .field("relocation", &self.relocation.is_some())
            .field("context", &self.context.is_some())
            .finish()
    }
}
