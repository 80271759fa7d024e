//! The allocator triple used by vectors created through the C API.
//!
//! Each vector captures the process-wide triple when it is created and
//! keeps using it for its whole life, so changing the triple later never
//! mixes allocators within one store. The default triple is libc
//! `malloc`/`realloc`/`free`, which makes stores handed out by
//! `chv_destroy_soft` and `chv_internal_copy` releasable with `free()`.
//!
//! Installing a triple is expected to happen once at startup. Changing it
//! while other threads are creating vectors is a precondition violation
//! of the C contract, not guarded against beyond keeping each store on the
//! triple it started with.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::RwLock;

use chunkvec::ChunkAllocator;
use tracing::debug;

use crate::status::ChvStatus;
use crate::types::{ChvFreeFn, ChvMallocFn, ChvReallocFn};

/// A C allocator triple.
#[derive(Clone, Copy, Debug)]
pub struct FfiAllocator {
    malloc: ChvMallocFn,
    realloc: ChvReallocFn,
    free: ChvFreeFn,
}

impl FfiAllocator {
    /// libc `malloc`/`realloc`/`free`.
    pub const LIBC: Self = Self {
        malloc: libc::malloc,
        realloc: libc::realloc,
        free: libc::free,
    };

    /// Build a triple from C function pointers.
    pub fn new(malloc: ChvMallocFn, realloc: ChvReallocFn, free: ChvFreeFn) -> Self {
        Self {
            malloc,
            realloc,
            free,
        }
    }

    /// Release a region handed out through the C API with this triple's `free`.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from this triple and not be used afterwards.
    #[allow(unsafe_code)]
    pub unsafe fn free(&self, ptr: *mut c_void) {
        // SAFETY: forwarded caller contract.
        unsafe { (self.free)(ptr) }
    }
}

impl Default for FfiAllocator {
    fn default() -> Self {
        Self::LIBC
    }
}

// SAFETY: the triple follows the C `malloc` contract: `malloc(n)` yields
// `n` usable bytes, `realloc` preserves the prefix and leaves the old block
// alone when it returns null, `free` accepts anything the other two
// returned. Installing a triple that breaks this is a caller error the C
// API documents.
#[allow(unsafe_code)]
unsafe impl ChunkAllocator for FfiAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: size is non-zero; any malloc-like function accepts it.
        NonNull::new(unsafe { (self.malloc)(size) }.cast())
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        _old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        // SAFETY: ptr came from this triple per the trait contract.
        NonNull::new(unsafe { (self.realloc)(ptr.as_ptr().cast(), new_size) }.cast())
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _size: usize) {
        // SAFETY: ptr came from this triple per the trait contract.
        unsafe { (self.free)(ptr.as_ptr().cast()) }
    }
}

static CURRENT: RwLock<FfiAllocator> = RwLock::new(FfiAllocator::LIBC);

/// The triple new vectors will capture.
pub(crate) fn current() -> FfiAllocator {
    match CURRENT.read() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn install(alloc: FfiAllocator) {
    match CURRENT.write() {
        Ok(mut guard) => *guard = alloc,
        Err(poisoned) => *poisoned.into_inner() = alloc,
    }
}

/// Install the allocator triple used by vectors created from now on.
///
/// Pass three non-null functions to install them, or three nulls to
/// restore libc `malloc`/`realloc`/`free`. A mix of null and non-null is
/// rejected with `InvalidArgument`. Existing vectors keep the triple they
/// were created with.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_set_allocator(
    malloc: Option<ChvMallocFn>,
    realloc: Option<ChvReallocFn>,
    free: Option<ChvFreeFn>,
) -> i32 {
    ffi_guard!({
        match (malloc, realloc, free) {
            (Some(m), Some(r), Some(f)) => {
                install(FfiAllocator::new(m, r, f));
                debug!("custom allocator triple installed");
            }
            (None, None, None) => {
                install(FfiAllocator::LIBC);
                debug!("default allocator triple restored");
            }
            _ => return ChvStatus::InvalidArgument as i32,
        }
        ChvStatus::Ok as i32
    })
}

/// Release a store returned by `chv_destroy_soft` or `chv_internal_copy`
/// with the current triple's `free`. Null is ignored.
///
/// Only valid while the triple that allocated the store is still installed.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_free(data: *mut c_void) -> i32 {
    ffi_guard!({
        if !data.is_null() {
            // SAFETY: data came from the current triple per caller contract.
            unsafe { current().free(data) };
        }
        ChvStatus::Ok as i32
    })
}
