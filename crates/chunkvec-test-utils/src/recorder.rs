//! Shared recorders to install as vector hooks.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chunkvec::Relocation;
use smallvec::SmallVec;

use crate::record::decode;

/// One destructed record. Records up to 16 bytes stay inline.
pub type RecordBytes = SmallVec<[u8; 16]>;

/// Records the bytes of every record handed to a destructor, in call order.
#[derive(Clone, Debug, Default)]
pub struct DestructorLog {
    seen: Rc<RefCell<Vec<RecordBytes>>>,
}

impl DestructorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A destructor closure feeding this log.
    pub fn hook(&self) -> impl FnMut(&mut [u8]) + 'static {
        let seen = Rc::clone(&self.seen);
        move |record: &mut [u8]| seen.borrow_mut().push(SmallVec::from_slice(record))
    }

    /// Like [`hook`](Self::hook), but panics the first time it is handed a
    /// record equal to `value`, after logging it.
    pub fn hook_panicking_once(&self, value: i32) -> impl FnMut(&mut [u8]) + 'static {
        let seen = Rc::clone(&self.seen);
        let armed = Cell::new(true);
        move |record: &mut [u8]| {
            seen.borrow_mut().push(SmallVec::from_slice(record));
            if armed.get() && decode(record) == value {
                armed.set(false);
                panic!("destructor failed on {value}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    /// How many times `value` reached the destructor.
    pub fn count(&self, value: i32) -> usize {
        self.seen
            .borrow()
            .iter()
            .filter(|r| decode(r) == value)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }

    pub fn records(&self) -> Vec<RecordBytes> {
        self.seen.borrow().clone()
    }

    /// Destructed records decoded as `i32`.
    pub fn ints(&self) -> Vec<i32> {
        self.seen.borrow().iter().map(|r| decode(r)).collect()
    }

    pub fn clear(&self) {
        self.seen.borrow_mut().clear();
    }
}

/// One relocation as seen by a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeenRelocation {
    pub relocation: Relocation,
    /// Whether the handler was given a context.
    pub had_context: bool,
}

/// Records every relocation a handler is told about.
#[derive(Clone, Debug, Default)]
pub struct RelocationLog {
    seen: Rc<RefCell<Vec<SeenRelocation>>>,
}

impl RelocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A relocation handler closure feeding this log.
    pub fn hook(&self) -> impl FnMut(&Relocation, Option<&mut (dyn Any + 'static)>) + 'static {
        let seen = Rc::clone(&self.seen);
        move |relocation: &Relocation, ctx: Option<&mut (dyn Any + 'static)>| {
            seen.borrow_mut().push(SeenRelocation {
                relocation: *relocation,
                had_context: ctx.is_some(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }

    pub fn events(&self) -> Vec<SeenRelocation> {
        self.seen.borrow().clone()
    }

    /// Byte offsets of every relocation, in order.
    pub fn offsets(&self) -> Vec<isize> {
        self.seen
            .borrow()
            .iter()
            .map(|e| e.relocation.offset())
            .collect()
    }
}
