//! Helpers for vectors of native-endian `i32` records.

use chunkvec::{ChunkAllocator, ChunkVec};

/// Width of an `i32` record.
pub const I32_WIDTH: usize = std::mem::size_of::<i32>();

pub fn encode(value: i32) -> [u8; I32_WIDTH] {
    value.to_ne_bytes()
}

/// Decode the first four bytes of `record`.
pub fn decode(record: &[u8]) -> i32 {
    let mut raw = [0u8; I32_WIDTH];
    raw.copy_from_slice(&record[..I32_WIDTH]);
    i32::from_ne_bytes(raw)
}

/// Concatenated records for `values`, ready for `ChunkVec::write`.
pub fn encode_all(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn decode_all(bytes: &[u8]) -> Vec<i32> {
    bytes.chunks_exact(I32_WIDTH).map(decode).collect()
}

/// A fresh `i32` vector holding `values`.
pub fn int_vec(values: &[i32]) -> ChunkVec {
    let mut v = ChunkVec::new(I32_WIDTH).expect("allocation");
    push_all(&mut v, values);
    v
}

pub fn push_all<A: ChunkAllocator>(v: &mut ChunkVec<A>, values: &[i32]) {
    for &x in values {
        v.push(&encode(x)).expect("push");
    }
}

/// Live records of `v` as integers.
pub fn ints<A: ChunkAllocator>(v: &ChunkVec<A>) -> Vec<i32> {
    v.records().map(decode).collect()
}

pub fn is_even(record: &[u8]) -> bool {
    decode(record) % 2 == 0
}
