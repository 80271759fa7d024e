//! Integration test: a panicking predicate or destructor never leads to a
//! record being destructed twice.
//!
//! Each scenario unwinds out of a vector operation, checks the live range
//! the vector is left with, then drops the vector and counts destructor
//! calls per record.

use std::panic::{catch_unwind, AssertUnwindSafe};

use chunkvec::ChunkVec;
use chunkvec_test_utils::record::{decode, encode_all, int_vec, ints, is_even};
use chunkvec_test_utils::DestructorLog;

fn assert_at_most_once(log: &DestructorLog, values: &[i32]) {
    for &x in values {
        assert!(log.count(x) <= 1, "{x} destructed {} times", log.count(x));
    }
}

#[test]
fn panicking_predicate_keeps_unvisited_tail_live() {
    let log = DestructorLog::new();
    let mut v = int_vec(&[1, 2, 3]);
    v.set_destructor(log.hook());

    let result = catch_unwind(AssertUnwindSafe(|| {
        v.filter(|r| match decode(r) {
            3 => panic!("predicate failed"),
            x => x != 1,
        })
    }));
    assert!(result.is_err());
    assert_eq!(ints(&v), vec![2, 3]);
    assert_eq!(log.ints(), vec![1]);

    drop(v);
    assert_eq!(log.ints(), vec![1, 2, 3]);
}

#[test]
fn panicking_destructor_in_filter_drops_only_that_record() {
    let log = DestructorLog::new();
    let mut v = int_vec(&[1, 2, 3, 4]);
    v.set_destructor(log.hook_panicking_once(3));

    let result = catch_unwind(AssertUnwindSafe(|| v.filter(is_even)));
    assert!(result.is_err());
    assert_eq!(ints(&v), vec![2, 4]);
    assert_eq!(log.ints(), vec![1, 3]);

    drop(v);
    assert_eq!(log.ints(), vec![1, 3, 2, 4]);
    assert_at_most_once(&log, &[1, 2, 3, 4]);
}

#[test]
fn panicking_destructor_in_clear_leaves_vector_empty() {
    let log = DestructorLog::new();
    let mut v = int_vec(&[1, 2, 3]);
    v.set_destructor(log.hook_panicking_once(2));

    assert!(catch_unwind(AssertUnwindSafe(|| v.clear())).is_err());
    assert!(v.is_empty());

    drop(v);
    assert_eq!(log.ints(), vec![1, 2]);
    assert_at_most_once(&log, &[1, 2, 3]);
}

#[test]
fn panicking_destructor_in_discard_truncates_first() {
    let log = DestructorLog::new();
    let mut v = int_vec(&[1, 2, 3, 4]);
    v.set_destructor(log.hook_panicking_once(3));

    assert!(catch_unwind(AssertUnwindSafe(|| v.discard(3))).is_err());
    assert_eq!(ints(&v), vec![1]);

    drop(v);
    assert_eq!(log.ints(), vec![4, 3, 1]);
    assert_at_most_once(&log, &[1, 2, 3, 4]);
}

#[test]
fn panicking_destructor_in_write_truncates_at_index() {
    let log = DestructorLog::new();
    let mut v = int_vec(&[1, 2, 3, 4]);
    v.set_destructor(log.hook_panicking_once(2));

    let result = catch_unwind(AssertUnwindSafe(|| v.write(1, &encode_all(&[10, 20]))));
    assert!(result.is_err());
    assert_eq!(ints(&v), vec![1]);

    drop(v);
    assert_eq!(log.ints(), vec![2, 1]);
    assert_at_most_once(&log, &[1, 2, 3, 4]);
}

#[test]
fn panicking_destructor_in_destroy_is_not_rerun_by_drop() {
    let log = DestructorLog::new();
    let mut v: ChunkVec = int_vec(&[1, 2, 3]);
    v.set_destructor(log.hook_panicking_once(1));

    assert!(catch_unwind(AssertUnwindSafe(move || v.destroy())).is_err());
    assert_eq!(log.ints(), vec![1]);
}
