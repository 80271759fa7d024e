//! Vector lifecycle, element and bulk operations for C callers.
//!
//! Record pointers passed in (`item`, `src`) may point into a vector's own
//! store, including the one being modified. Record pointers passed out
//! (`dest`) may too; every copy out of a store has `memmove` semantics.
//! Callers must supply `width` bytes per record behind every record
//! pointer.

use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;
use std::slice;

use chunkvec::{ChunkBuffer, ChunkVec};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, warn};

use crate::alloc::{self, FfiAllocator};
use crate::handle::HandleTable;
use crate::status::ChvStatus;
use crate::types::{ChvDestructorFn, ChvKeepFn, ChvRelocationFn, ChvVisitFn};

type FfiVec = ChunkVec<FfiAllocator>;

/// Stack buffer for one record on its way in or out.
type Scratch = SmallVec<[u8; 64]>;

thread_local! {
    static VECTORS: RefCell<HandleTable<FfiVec>> = const { RefCell::new(HandleTable::new()) };
}

/// A C context pointer stored in a vector.
#[derive(Clone, Copy, Debug)]
struct FfiContext(*mut c_void);

fn reentrant() -> ChvStatus {
    warn!("chv_* called from inside a hook on the same thread");
    ChvStatus::Reentrant
}

fn invalid(handle: u64) -> ChvStatus {
    warn!(handle, "invalid or stale vector handle");
    ChvStatus::InvalidHandle
}

fn with_table<R>(f: impl FnOnce(&mut HandleTable<FfiVec>) -> R) -> Result<R, ChvStatus> {
    VECTORS.with(|cell| {
        let mut table = cell.try_borrow_mut().map_err(|_| reentrant())?;
        Ok(f(&mut table))
    })
}

fn with_vector<R>(handle: u64, f: impl FnOnce(&mut FfiVec) -> R) -> Result<R, ChvStatus> {
    with_table(|table| table.get_mut(handle).map(f))?.ok_or_else(|| invalid(handle))
}

/// Shared-borrow lookup for queries.
fn inspect<R>(handle: u64, f: impl FnOnce(&FfiVec) -> R) -> Result<R, ChvStatus> {
    VECTORS.with(|cell| {
        let table = cell.try_borrow().map_err(|_| reentrant())?;
        table.get(handle).map(f).ok_or_else(|| invalid(handle))
    })
}

fn take_vector(handle: u64) -> Result<FfiVec, ChvStatus> {
    with_table(|table| table.remove(handle))?.ok_or_else(|| invalid(handle))
}

fn register(v: FfiVec) -> Result<u64, ChvStatus> {
    with_table(|table| table.insert(v))
}

/// Copy one record from C memory.
#[allow(unsafe_code)]
fn copy_in(item: *const c_void, width: usize) -> Scratch {
    // SAFETY: `item` is non-null and valid for `width` reads per caller
    // contract. No vector is borrowed while it is read, so it may point
    // into a store.
    SmallVec::from_slice(unsafe { slice::from_raw_parts(item.cast::<u8>(), width) })
}

/// Copy bytes to C memory that may overlap a store.
#[allow(unsafe_code)]
fn copy_out(dest: *mut c_void, bytes: &[u8]) {
    // SAFETY: `dest` is non-null and valid for `bytes.len()` writes per
    // caller contract; `ptr::copy` tolerates overlap.
    unsafe { ptr::copy(bytes.as_ptr(), dest.cast::<u8>(), bytes.len()) }
}

#[allow(unsafe_code)]
fn write_out<T>(out: *mut T, value: T) {
    if !out.is_null() {
        // SAFETY: non-null out-pointers are valid for writes per caller contract.
        unsafe { out.write(value) }
    }
}

/// Hand a detached store to C: `(data, len_bytes)`, released with the
/// vector's `free`.
fn detach(buffer: ChunkBuffer<FfiAllocator>) -> (*mut c_void, usize) {
    let (ptr, len, _, _) = buffer.into_raw_parts();
    (ptr.as_ptr().cast(), len)
}

// ── Lifecycle ────────────────────────────────────────────────────────

/// Create a vector of `width`-byte records with the default capacity.
///
/// A `width` of 0 is treated as 1. Uses the allocator triple installed at
/// the time of the call.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_new(width: usize, handle_out: *mut u64) -> i32 {
    chv_new_sized(width, chunkvec::ChunkConfig::DEFAULT_CAPACITY, handle_out)
}

/// Create a vector able to hold `capacity` records before growing.
///
/// Zero `width` or `capacity` is treated as 1.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_new_sized(width: usize, capacity: usize, handle_out: *mut u64) -> i32 {
    ffi_guard!({
        if handle_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        let v = match ChunkVec::with_capacity_in(width, capacity, alloc::current()) {
            Ok(v) => v,
            Err(e) => return ChvStatus::from(&e) as i32,
        };
        let handle = ffi_try!(register(v));
        debug!(handle, width, capacity, "vector created");
        write_out(handle_out, handle);
        ChvStatus::Ok as i32
    })
}

/// Destroy a vector, running the destructor on every live record in index
/// order, and hand back its context through `context_out` (null if none;
/// `context_out` itself may be null).
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_destroy(handle: u64, context_out: *mut *mut c_void) -> i32 {
    ffi_guard!({
        let v = ffi_try!(take_vector(handle));
        let context = v
            .destroy()
            .and_then(|c| c.downcast::<FfiContext>().ok())
            .map_or(ptr::null_mut(), |c| c.0);
        debug!(handle, "vector destroyed");
        write_out(context_out, context);
        ChvStatus::Ok as i32
    })
}

/// Destroy a vector without running its destructor and take its store.
///
/// `data_out` receives the store (its first `len_out` bytes are the live
/// records), which the caller releases with the vector's allocator `free`.
/// The context is dropped.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_destroy_soft(
    handle: u64,
    data_out: *mut *mut c_void,
    len_out: *mut usize,
) -> i32 {
    ffi_guard!({
        if data_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        let v = ffi_try!(take_vector(handle));
        let (data, len) = detach(v.into_store());
        debug!(handle, len, "vector soft-destroyed");
        write_out(data_out, data);
        write_out(len_out, len);
        ChvStatus::Ok as i32
    })
}

/// Duplicate a vector's records into a new vector with no hooks.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_copy(handle: u64, handle_out: *mut u64) -> i32 {
    ffi_guard!({
        if handle_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        let copy = match ffi_try!(with_vector(handle, |v| v.try_clone())) {
            Ok(c) => c,
            Err(e) => return ChvStatus::from(&e) as i32,
        };
        let new_handle = ffi_try!(register(copy));
        write_out(handle_out, new_handle);
        ChvStatus::Ok as i32
    })
}

/// Copy the live records into a fresh buffer of exactly `len * width`
/// bytes (at least one byte is allocated), released with the vector's
/// allocator `free`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_internal_copy(
    handle: u64,
    data_out: *mut *mut c_void,
    len_out: *mut usize,
) -> i32 {
    ffi_guard!({
        if data_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        let buffer = match ffi_try!(with_vector(handle, |v| v.copy_store())) {
            Ok(b) => b,
            Err(e) => return ChvStatus::from(&e) as i32,
        };
        let (data, len) = detach(buffer);
        write_out(data_out, data);
        write_out(len_out, len);
        ChvStatus::Ok as i32
    })
}

// ── Queries ──────────────────────────────────────────────────────────

/// Number of live records.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_len(handle: u64, len_out: *mut usize) -> i32 {
    ffi_guard!({
        if len_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        write_out(len_out, ffi_try!(inspect(handle, |v| v.len())));
        ChvStatus::Ok as i32
    })
}

/// Capacity in records.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_cap(handle: u64, cap_out: *mut usize) -> i32 {
    ffi_guard!({
        if cap_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        write_out(cap_out, ffi_try!(inspect(handle, |v| v.capacity())));
        ChvStatus::Ok as i32
    })
}

/// Record width in bytes.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_width(handle: u64, width_out: *mut usize) -> i32 {
    ffi_guard!({
        if width_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        write_out(width_out, ffi_try!(inspect(handle, |v| v.width())));
        ChvStatus::Ok as i32
    })
}

/// Base address of the store, valid until the next resize.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_data(handle: u64, data_out: *mut *mut c_void) -> i32 {
    ffi_guard!({
        if data_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        let data = ffi_try!(with_vector(handle, |v| v.as_mut_ptr()));
        write_out(data_out, data.cast());
        ChvStatus::Ok as i32
    })
}

// ── Element operations ───────────────────────────────────────────────

/// Set the capacity (0 is treated as 1). Shrinking below the length
/// truncates without running the destructor.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_resize(handle: u64, capacity: usize) -> i32 {
    ffi_guard!({
        ChvStatus::from(ffi_try!(with_vector(handle, |v| v.resize(capacity)))) as i32
    })
}

/// Append one record.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_push(handle: u64, item: *const c_void) -> i32 {
    ffi_guard!({
        if item.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        let record = copy_in(item, ffi_try!(inspect(handle, |v| v.width())));
        let result = ffi_try!(with_vector(handle, |v| v.push(&record)));
        ChvStatus::from(result) as i32
    })
}

/// Shared body of pop/top/get: fetch one record through a scratch buffer.
fn fetch_record(
    handle: u64,
    dest: *mut c_void,
    found_out: *mut bool,
    fetch: impl FnOnce(&mut FfiVec, &mut [u8]) -> bool,
) -> Result<(), ChvStatus> {
    if dest.is_null() {
        return Err(ChvStatus::InvalidArgument);
    }
    let (found, record) = with_vector(handle, |v| {
        let mut record: Scratch = smallvec![0; v.width()];
        let found = fetch(v, &mut record);
        (found, record)
    })?;
    if found {
        copy_out(dest, &record);
    }
    write_out(found_out, found);
    Ok(())
}

/// Move the last record into `dest`. `found_out` (nullable) is set to
/// whether a record was there; an empty vector is not an error.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_pop(handle: u64, dest: *mut c_void, found_out: *mut bool) -> i32 {
    ffi_guard!({
        ffi_try!(fetch_record(handle, dest, found_out, |v, r| v.pop(r)));
        ChvStatus::Ok as i32
    })
}

/// Copy the last record into `dest` without removing it.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_top(handle: u64, dest: *mut c_void, found_out: *mut bool) -> i32 {
    ffi_guard!({
        ffi_try!(fetch_record(handle, dest, found_out, |v, r| v.top(r)));
        ChvStatus::Ok as i32
    })
}

/// Copy record `index` into `dest`. Out of range is not an error;
/// `found_out` reports it.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_get(
    handle: u64,
    index: usize,
    dest: *mut c_void,
    found_out: *mut bool,
) -> i32 {
    ffi_guard!({
        ffi_try!(fetch_record(handle, dest, found_out, |v, r| v.get(index, r)));
        ChvStatus::Ok as i32
    })
}

/// Overwrite record `index` (no destructor) or append at `index == len`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_set(handle: u64, index: usize, item: *const c_void) -> i32 {
    ffi_guard!({
        if item.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        let record = copy_in(item, ffi_try!(inspect(handle, |v| v.width())));
        let result = ffi_try!(with_vector(handle, |v| v.set(index, &record)));
        ChvStatus::from(result) as i32
    })
}

/// Exchange two records. Equal or out-of-range indices are ignored.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_swap(handle: u64, i1: usize, i2: usize) -> i32 {
    ffi_guard!({
        ffi_try!(with_vector(handle, |v| v.swap(i1, i2)));
        ChvStatus::Ok as i32
    })
}

// ── Bulk operations ──────────────────────────────────────────────────

/// Copy `count` records from `src` into the vector at `index`, growing as
/// needed and destructing overwritten live records. `src` may point into
/// the vector's own store.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_write(handle: u64, index: usize, src: *const c_void, count: usize) -> i32 {
    ffi_guard!({
        if src.is_null() && count > 0 {
            return ChvStatus::InvalidArgument as i32;
        }
        let result = ffi_try!(with_vector(handle, |v| {
            // SAFETY: src is valid for `count * width` reads per caller
            // contract; `write_raw` accepts sources inside the store.
            unsafe { v.write_raw(index, src.cast::<u8>(), count) }
        }));
        ChvStatus::from(result) as i32
    })
}

/// Copy up to `count` records starting at `index` into `dest`. The number
/// actually copied (truncated at the length) goes to `read_out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_read(
    handle: u64,
    index: usize,
    dest: *mut c_void,
    count: usize,
    read_out: *mut usize,
) -> i32 {
    ffi_guard!({
        if dest.is_null() && count > 0 {
            return ChvStatus::InvalidArgument as i32;
        }
        let copied = ffi_try!(inspect(handle, |v| {
            let width = v.width();
            let available = v.len().saturating_sub(index);
            let n = count.min(available);
            if n > 0 {
                copy_out(dest, &v.as_bytes()[index * width..(index + n) * width]);
            }
            n
        }));
        write_out(read_out, copied);
        ChvStatus::Ok as i32
    })
}

/// Visit live records first to last until `visit` returns false.
///
/// The visitor may modify record bytes; calling back into `chv_*` on this
/// thread from inside it returns `Reentrant`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_foreach(handle: u64, visit: Option<ChvVisitFn>, arg: *mut c_void) -> i32 {
    ffi_guard!({
        let Some(visit) = visit else {
            return ChvStatus::InvalidArgument as i32;
        };
        ffi_try!(with_vector(handle, |v| {
            v.for_each(|record| {
                // SAFETY: record is a live, writable record of width bytes.
                unsafe { visit(record.as_mut_ptr().cast(), arg) }
            })
        }));
        ChvStatus::Ok as i32
    })
}

/// Keep only records for which `keep` returns true, in order. Rejected
/// records go to the destructor.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_filter(handle: u64, keep: Option<ChvKeepFn>, arg: *mut c_void) -> i32 {
    ffi_guard!({
        let Some(keep) = keep else {
            return ChvStatus::InvalidArgument as i32;
        };
        ffi_try!(with_vector(handle, |v| {
            v.filter(|record| {
                // SAFETY: record is a live record of width bytes.
                unsafe { keep(record.as_ptr().cast(), arg) }
            })
        }));
        ChvStatus::Ok as i32
    })
}

/// Remove every record, destructing each in index order.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_clear(handle: u64) -> i32 {
    ffi_guard!({
        ffi_try!(with_vector(handle, |v| v.clear()));
        ChvStatus::Ok as i32
    })
}

/// Remove the last `min(n, len)` records, destructing the highest index first.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_discard(handle: u64, n: usize) -> i32 {
    ffi_guard!({
        ffi_try!(with_vector(handle, |v| v.discard(n)));
        ChvStatus::Ok as i32
    })
}

// ── Hooks ────────────────────────────────────────────────────────────

/// Install (or with null, remove) the destructor.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_set_destructor(handle: u64, destructor: Option<ChvDestructorFn>) -> i32 {
    ffi_guard!({
        ffi_try!(with_vector(handle, |v| match destructor {
            Some(f) => v.set_destructor(move |record: &mut [u8]| {
                // SAFETY: record is a writable record of width bytes that
                // is being removed.
                unsafe { f(record.as_mut_ptr().cast()) }
            }),
            None => {
                v.take_destructor();
            }
        }));
        ChvStatus::Ok as i32
    })
}

/// Install (or with null, remove) the relocation handler. It receives the
/// vector's handle, the byte offset `new_base - old_base`, and the context.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_set_relocation_handler(
    handle: u64,
    handler: Option<ChvRelocationFn>,
) -> i32 {
    ffi_guard!({
        ffi_try!(with_vector(handle, |v| match handler {
            Some(f) => v.set_relocation_handler(move |relocation, context| {
                let context = context
                    .and_then(|c| c.downcast_mut::<FfiContext>())
                    .map_or(ptr::null_mut(), |c| c.0);
                // SAFETY: plain values only; the C side owns `context`.
                unsafe { f(handle, relocation.offset(), context) }
            }),
            None => {
                v.take_relocation_handler();
            }
        }));
        ChvStatus::Ok as i32
    })
}

/// Attach an opaque context (null detaches it). The vector never
/// dereferences it; `chv_destroy` hands it back.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_set_context(handle: u64, context: *mut c_void) -> i32 {
    ffi_guard!({
        ffi_try!(with_vector(handle, |v| {
            if context.is_null() {
                v.take_context();
            } else {
                v.set_context(FfiContext(context));
            }
        }));
        ChvStatus::Ok as i32
    })
}

/// Number of live vectors owned by the calling thread.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn chv_live_count(count_out: *mut usize) -> i32 {
    ffi_guard!({
        if count_out.is_null() {
            return ChvStatus::InvalidArgument as i32;
        }
        let count = ffi_try!(VECTORS.with(|cell| {
            cell.try_borrow()
                .map(|table| table.len())
                .map_err(|_| reentrant())
        }));
        write_out(count_out, count);
        ChvStatus::Ok as i32
    })
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::alloc::{chv_free, chv_set_allocator};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OK: i32 = ChvStatus::Ok as i32;

    fn new_int_vec(values: &[i32]) -> u64 {
        let mut h = 0;
        assert_eq!(chv_new(4, &mut h), OK);
        for v in values {
            assert_eq!(chv_push(h, (v as *const i32).cast()), OK);
        }
        h
    }

    fn read_ints(h: u64) -> Vec<i32> {
        let mut len = 0;
        assert_eq!(chv_len(h, &mut len), OK);
        let mut out = vec![0i32; len];
        let mut n = 0;
        assert_eq!(chv_read(h, 0, out.as_mut_ptr().cast(), len, &mut n), OK);
        assert_eq!(n, len);
        out
    }

    unsafe extern "C" fn keep_even(record: *const c_void, _arg: *mut c_void) -> bool {
        unsafe { *record.cast::<i32>() % 2 == 0 }
    }

    thread_local! {
        static DESTRUCTED: RefCell<Vec<i32>> = const { RefCell::new(Vec::new()) };
        static NESTED_STATUS: Cell<i32> = const { Cell::new(0) };
    }

    unsafe extern "C" fn log_destruct(record: *mut c_void) {
        let value = unsafe { *record.cast::<i32>() };
        DESTRUCTED.with(|d| d.borrow_mut().push(value));
    }

    unsafe extern "C" fn nested_call(_record: *mut c_void) {
        let mut len = 0;
        NESTED_STATUS.with(|s| s.set(chv_len(0, &mut len)));
    }

    unsafe extern "C" fn sum_offsets(_handle: u64, offset: isize, context: *mut c_void) {
        unsafe { *context.cast::<isize>() += offset };
    }

    #[test]
    fn push_swap_filter_scenario() {
        let h = new_int_vec(&[1, 2, 3, 4, 5]);
        assert_eq!(chv_swap(h, 0, 4), OK);
        assert_eq!(read_ints(h), vec![5, 2, 3, 4, 1]);
        assert_eq!(chv_filter(h, Some(keep_even), ptr::null_mut()), OK);
        assert_eq!(read_ints(h), vec![2, 4]);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    #[test]
    fn destroyed_handle_is_rejected() {
        let h = new_int_vec(&[1]);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
        let mut len = 0;
        assert_eq!(chv_len(h, &mut len), ChvStatus::InvalidHandle as i32);
        assert_eq!(chv_destroy(h, ptr::null_mut()), ChvStatus::InvalidHandle as i32);
        assert_eq!(chv_push(h, (&1i32 as *const i32).cast()), ChvStatus::InvalidHandle as i32);
    }

    #[test]
    fn null_arguments_are_rejected() {
        let h = new_int_vec(&[]);
        let invalid = ChvStatus::InvalidArgument as i32;
        assert_eq!(chv_new(4, ptr::null_mut()), invalid);
        assert_eq!(chv_push(h, ptr::null()), invalid);
        assert_eq!(chv_len(h, ptr::null_mut()), invalid);
        assert_eq!(chv_write(h, 0, ptr::null(), 1), invalid);
        assert_eq!(chv_write(h, 0, ptr::null(), 0), OK);
        assert_eq!(chv_foreach(h, None, ptr::null_mut()), invalid);
        assert_eq!(chv_set_allocator(None, Some(libc::realloc), None), invalid);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    #[test]
    fn destructor_runs_at_removal_points_only() {
        DESTRUCTED.with(|d| d.borrow_mut().clear());
        let h = new_int_vec(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(chv_set_destructor(h, Some(log_destruct)), OK);

        let mut out = 0i32;
        let mut found = false;
        assert_eq!(chv_pop(h, (&mut out as *mut i32).cast(), &mut found), OK);
        assert!(found);
        assert_eq!(out, 6);
        assert_eq!(chv_set(h, 0, (&10i32 as *const i32).cast()), OK);

        assert_eq!(chv_discard(h, 2), OK);
        let replacement = [20i32, 30];
        assert_eq!(chv_write(h, 1, replacement.as_ptr().cast(), 2), OK);
        assert_eq!(read_ints(h), vec![10, 20, 30]);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);

        DESTRUCTED.with(|d| assert_eq!(*d.borrow(), vec![5, 4, 2, 3, 10, 20, 30]));
    }

    #[test]
    fn hook_calling_back_in_gets_reentrant() {
        let h = new_int_vec(&[1]);
        assert_eq!(chv_set_destructor(h, Some(nested_call)), OK);
        assert_eq!(chv_clear(h), OK);
        NESTED_STATUS.with(|s| assert_eq!(s.get(), ChvStatus::Reentrant as i32));
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    #[test]
    fn relocation_offsets_track_base_address() {
        let mut total: isize = 0;
        let ctx = (&mut total as *mut isize).cast::<c_void>();
        let mut h = 0;
        assert_eq!(chv_new_sized(1, 1, &mut h), OK);
        assert_eq!(chv_set_context(h, ctx), OK);
        assert_eq!(chv_set_relocation_handler(h, Some(sum_offsets)), OK);

        let mut first: *mut c_void = ptr::null_mut();
        assert_eq!(chv_data(h, &mut first), OK);
        for cap in [16, 4096, 3, 1 << 20] {
            assert_eq!(chv_resize(h, cap), OK);
        }
        let mut last: *mut c_void = ptr::null_mut();
        assert_eq!(chv_data(h, &mut last), OK);

        let mut returned: *mut c_void = ptr::null_mut();
        assert_eq!(chv_destroy(h, &mut returned), OK);
        assert_eq!(returned, ctx);
        assert_eq!(total, (last as usize).wrapping_sub(first as usize) as isize);
    }

    #[test]
    fn soft_destroy_hands_over_freeable_store() {
        let h = new_int_vec(&[7, 8, 9]);
        assert_eq!(chv_set_destructor(h, Some(log_destruct)), OK);
        DESTRUCTED.with(|d| d.borrow_mut().clear());

        let mut data: *mut c_void = ptr::null_mut();
        let mut len = 0;
        assert_eq!(chv_destroy_soft(h, &mut data, &mut len), OK);
        assert_eq!(len, 12);
        let values = unsafe { slice::from_raw_parts(data.cast::<i32>(), 3) };
        assert_eq!(values, &[7, 8, 9]);
        DESTRUCTED.with(|d| assert!(d.borrow().is_empty()));
        unsafe { libc::free(data) };
    }

    #[test]
    fn internal_copy_and_copy_leave_source_alone() {
        let h = new_int_vec(&[1, 2]);
        let mut data: *mut c_void = ptr::null_mut();
        let mut len = 0;
        assert_eq!(chv_internal_copy(h, &mut data, &mut len), OK);
        assert_eq!(len, 8);
        assert_eq!(unsafe { *data.cast::<i32>().add(1) }, 2);
        assert_eq!(chv_free(data), OK);

        let mut dup = 0;
        assert_eq!(chv_copy(h, &mut dup), OK);
        assert_ne!(dup, h);
        assert_eq!(read_ints(dup), vec![1, 2]);
        let mut cap = 0;
        assert_eq!(chv_cap(dup, &mut cap), OK);
        assert_eq!(cap, 8);
        assert_eq!(chv_destroy(dup, ptr::null_mut()), OK);
        assert_eq!(read_ints(h), vec![1, 2]);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    #[test]
    fn write_from_own_store_survives_growth() {
        let h = new_int_vec(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut data: *mut c_void = ptr::null_mut();
        assert_eq!(chv_data(h, &mut data), OK);
        assert_eq!(chv_write(h, 8, data, 8), OK);
        assert_eq!(read_ints(h), vec![1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    #[test]
    fn push_from_own_store() {
        let h = new_int_vec(&[42]);
        let mut data: *mut c_void = ptr::null_mut();
        assert_eq!(chv_resize(h, 1), OK);
        assert_eq!(chv_data(h, &mut data), OK);
        assert_eq!(chv_push(h, data), OK);
        assert_eq!(read_ints(h), vec![42, 42]);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    #[test]
    fn read_truncates_and_get_reports_range() {
        let h = new_int_vec(&[1, 2, 3, 4, 5]);
        let mut out = [0i32; 10];
        let mut n = 0;
        assert_eq!(chv_read(h, 3, out.as_mut_ptr().cast(), 10, &mut n), OK);
        assert_eq!(n, 2);
        assert_eq!(&out[..3], &[4, 5, 0]);

        let mut value = -1i32;
        let mut found = true;
        assert_eq!(chv_get(h, 9, (&mut value as *mut i32).cast(), &mut found), OK);
        assert!(!found);
        assert_eq!(value, -1);
        assert_eq!(chv_top(h, (&mut value as *mut i32).cast(), &mut found), OK);
        assert!(found);
        assert_eq!(value, 5);

        assert_eq!(
            chv_set(h, 7, (&0i32 as *const i32).cast()),
            ChvStatus::IndexPastEnd as i32
        );
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    #[test]
    fn foreach_stops_when_visitor_says_so() {
        unsafe extern "C" fn count_until_three(record: *mut c_void, arg: *mut c_void) -> bool {
            unsafe {
                *arg.cast::<usize>() += 1;
                *record.cast::<i32>() != 3
            }
        }
        let h = new_int_vec(&[1, 2, 3, 4]);
        let mut visited = 0usize;
        assert_eq!(
            chv_foreach(h, Some(count_until_three), (&mut visited as *mut usize).cast()),
            OK
        );
        assert_eq!(visited, 3);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    static COUNTED_MALLOCS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_malloc(size: usize) -> *mut c_void {
        COUNTED_MALLOCS.fetch_add(1, Ordering::SeqCst);
        unsafe { libc::malloc(size) }
    }

    #[test]
    fn installed_triple_is_captured_at_creation() {
        assert_eq!(
            chv_set_allocator(Some(counting_malloc), Some(libc::realloc), Some(libc::free)),
            OK
        );
        let before = COUNTED_MALLOCS.load(Ordering::SeqCst);
        let h = new_int_vec(&[1]);
        assert_eq!(chv_set_allocator(None, None, None), OK);
        assert!(COUNTED_MALLOCS.load(Ordering::SeqCst) > before);

        let mut data: *mut c_void = ptr::null_mut();
        let mut len = 0;
        let at = COUNTED_MALLOCS.load(Ordering::SeqCst);
        assert_eq!(chv_internal_copy(h, &mut data, &mut len), OK);
        assert!(COUNTED_MALLOCS.load(Ordering::SeqCst) > at);
        unsafe { libc::free(data) };
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }

    #[test]
    fn live_count_follows_lifecycle() {
        let mut count = 0;
        assert_eq!(chv_live_count(&mut count), OK);
        let start = count;
        let h = new_int_vec(&[]);
        assert_eq!(chv_live_count(&mut count), OK);
        assert_eq!(count, start + 1);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
        assert_eq!(chv_live_count(&mut count), OK);
        assert_eq!(count, start);
    }

    #[test]
    fn zero_width_and_capacity_are_coerced() {
        let mut h = 0;
        assert_eq!(chv_new_sized(0, 0, &mut h), OK);
        let (mut width, mut cap) = (0, 0);
        assert_eq!(chv_width(h, &mut width), OK);
        assert_eq!(chv_cap(h, &mut cap), OK);
        assert_eq!((width, cap), (1, 1));
        assert_eq!(chv_push(h, (&9u8 as *const u8).cast()), OK);
        assert_eq!(chv_destroy(h, ptr::null_mut()), OK);
    }
}
