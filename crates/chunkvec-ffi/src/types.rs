//! C callback signatures.

use std::ffi::c_void;

/// `malloc`-like: return `size` usable bytes or null.
pub type ChvMallocFn = unsafe extern "C" fn(size: usize) -> *mut c_void;

/// `realloc`-like: resize `ptr` to `size` bytes, or return null and leave
/// `ptr` untouched.
pub type ChvReallocFn = unsafe extern "C" fn(ptr: *mut c_void, size: usize) -> *mut c_void;

/// `free`-like.
pub type ChvFreeFn = unsafe extern "C" fn(ptr: *mut c_void);

/// Called on a record's bytes when the record is removed for good.
pub type ChvDestructorFn = unsafe extern "C" fn(record: *mut c_void);

/// Called after a resize moved the store. `offset` is `new_base - old_base`
/// in bytes; `context` is the vector's context (null if none).
pub type ChvRelocationFn = unsafe extern "C" fn(handle: u64, offset: isize, context: *mut c_void);

/// Visitor for `chv_foreach`. Returning `false` stops the walk.
pub type ChvVisitFn = unsafe extern "C" fn(record: *mut c_void, arg: *mut c_void) -> bool;

/// Predicate for `chv_filter`. Returning `false` removes the record.
pub type ChvKeepFn = unsafe extern "C" fn(record: *const c_void, arg: *mut c_void) -> bool;
