//! Integration test: amortised growth and relocation notifications.
//!
//! Pushes many records through a tracked allocator and checks that the
//! number of reallocations stays logarithmic, that record order survives
//! every move, and that the relocation handler fires exactly when the
//! store's base address changes.

use chunkvec::{ChunkConfig, ChunkVec};
use chunkvec_test_utils::record::{decode, encode, encode_all, ints, push_all, I32_WIDTH};
use chunkvec_test_utils::{RelocationLog, TrackingAllocator};

// ── Growth ───────────────────────────────────────────────────────────

#[test]
fn pushing_k_records_reallocates_logarithmically() {
    let alloc = TrackingAllocator::new();
    let mut v = ChunkVec::with_capacity_in(I32_WIDTH, 1, alloc.clone()).unwrap();
    let values: Vec<i32> = (0..1000).collect();
    push_all(&mut v, &values);

    // 1 -> 3 -> 7 -> ... -> 1023
    assert_eq!(v.capacity(), 1023);
    assert_eq!(alloc.stats().allocations, 1);
    assert_eq!(alloc.stats().reallocations, 9);
    assert_eq!(ints(&v), values);
}

#[test]
fn growth_from_default_capacity_follows_double_plus_one() {
    let mut v = ChunkVec::with_config(ChunkConfig::new(I32_WIDTH)).unwrap();
    let mut caps = vec![v.capacity()];
    for x in 0..200 {
        v.push(&encode(x)).unwrap();
        if *caps.last().unwrap() != v.capacity() {
            caps.push(v.capacity());
        }
    }
    assert_eq!(caps, vec![8, 17, 35, 71, 143, 287]);
}

#[test]
fn zero_capacity_vector_accepts_pushes() {
    let mut v = ChunkVec::with_capacity(8, 0).unwrap();
    assert_eq!(v.capacity(), 1);
    for i in 0..5u8 {
        v.push(&[i; 8]).unwrap();
    }
    assert_eq!(v.len(), 5);
    assert_eq!(v.record(4).unwrap(), &[4; 8]);
}

#[test]
fn order_survives_forced_moves() {
    let alloc = TrackingAllocator::always_move();
    let mut v = ChunkVec::with_capacity_in(I32_WIDTH, 1, alloc.clone()).unwrap();
    push_all(&mut v, &[3, 1, 4, 1, 5, 9, 2, 6]);
    assert_eq!(ints(&v), vec![3, 1, 4, 1, 5, 9, 2, 6]);
    assert_eq!(alloc.stats().moves, alloc.stats().reallocations);
    drop(v);
    assert_eq!(alloc.live_blocks(), 0);
}

// ── Relocation ───────────────────────────────────────────────────────

#[test]
fn moving_resize_reports_exact_offset_once() {
    let log = RelocationLog::new();
    let mut v = ChunkVec::with_capacity_in(I32_WIDTH, 1, TrackingAllocator::always_move()).unwrap();
    v.set_relocation_handler(log.hook());
    v.push(&encode(1)).unwrap();
    assert!(log.is_empty());

    let before = v.as_ptr() as usize;
    v.push(&encode(2)).unwrap();
    let after = v.as_ptr() as usize;

    let events = log.events();
    assert_eq!(events.len(), 1);
    let r = events[0].relocation;
    assert_eq!(r.old_base(), before);
    assert_eq!(r.new_base(), after);
    assert_eq!(r.offset(), after.wrapping_sub(before) as isize);
    assert_eq!((r.old_bytes(), r.new_bytes()), (4, 12));
}

#[test]
fn in_place_resize_does_not_notify() {
    let log = RelocationLog::new();
    let alloc = TrackingAllocator::in_place(4096);
    let mut v = ChunkVec::with_capacity_in(I32_WIDTH, 1, alloc.clone()).unwrap();
    v.set_relocation_handler(log.hook());
    push_all(&mut v, &(0..500).collect::<Vec<_>>());
    v.resize(10).unwrap();

    assert!(alloc.stats().reallocations > 0);
    assert_eq!(alloc.stats().moves, 0);
    assert!(log.is_empty());
}

#[test]
fn handler_receives_context() {
    let log = RelocationLog::new();
    let mut v = ChunkVec::with_capacity_in(1, 1, TrackingAllocator::always_move()).unwrap();
    v.set_relocation_handler(log.hook());
    v.resize(4).unwrap();
    v.set_context(42u64);
    v.resize(9).unwrap();

    let events = log.events();
    assert_eq!(events.len(), 2);
    assert!(!events[0].had_context);
    assert!(events[1].had_context);
}

#[test]
fn handler_can_update_context() {
    let mut v = ChunkVec::with_capacity_in(1, 1, TrackingAllocator::always_move()).unwrap();
    v.set_context(0usize);
    v.set_relocation_handler(|_, ctx| {
        if let Some(moves) = ctx.and_then(|c| c.downcast_mut::<usize>()) {
            *moves += 1;
        }
    });
    for _ in 0..3 {
        let next = v.capacity() * 2;
        v.resize(next).unwrap();
    }
    assert_eq!(v.destroy().and_then(|c| c.downcast::<usize>().ok()).map(|b| *b), Some(3));
}

#[test]
fn interior_address_can_be_rebased() {
    let log = RelocationLog::new();
    let mut v = ChunkVec::with_capacity_in(I32_WIDTH, 3, TrackingAllocator::always_move()).unwrap();
    v.set_relocation_handler(log.hook());
    push_all(&mut v, &[10, 20, 30]);
    let third = v.as_ptr() as usize + 2 * I32_WIDTH;

    v.push(&encode(40)).unwrap();

    let r = log.events()[0].relocation;
    assert!(r.contains_old(third));
    let rebased = r.rebase(third);
    assert_eq!(rebased, v.as_ptr() as usize + 2 * I32_WIDTH);
    let offset = rebased - v.as_ptr() as usize;
    assert_eq!(decode(&v.as_bytes()[offset..]), 30);
}

#[test]
fn write_growth_notifies_and_uses_max_policy() {
    let log = RelocationLog::new();
    let mut v = ChunkVec::with_capacity_in(I32_WIDTH, 2, TrackingAllocator::always_move()).unwrap();
    v.set_relocation_handler(log.hook());
    v.write(0, &encode_all(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])).unwrap();
    assert_eq!(v.capacity(), 10);
    assert_eq!(log.len(), 1);
    v.write(10, &encode_all(&[11])).unwrap();
    assert_eq!(v.capacity(), 21);
    assert_eq!(log.len(), 2);
}
