//! Benchmark workloads for chunkvec.
//!
//! Every workload is generated from a seed with ChaCha8, so a profile is
//! the same on every run and every machine:
//!
//! - [`record_stream`]: `count` records of `width` bytes, back to back
//! - [`mixed_ops`]: a random sequence of [`Op`]s over a vector of bounded size
//! - [`apply`]: run one [`Op`] against a vector

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use chunkvec::{ChunkAllocator, ChunkError, ChunkVec};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Record width used by the reference profiles (two `u64`s).
pub const REFERENCE_WIDTH: usize = 16;

/// One step of a mixed workload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// Append the record.
    Push(Vec<u8>),
    /// Remove the last record.
    Pop,
    /// Overwrite or append at the index (clamped to the length).
    Set(usize, Vec<u8>),
    /// Exchange two records.
    Swap(usize, usize),
    /// Bulk-write `count` copies of the record at the index (clamped).
    Write(usize, usize, Vec<u8>),
    /// Drop up to this many records from the tail.
    Discard(usize),
}

/// `count` deterministic records of `width` bytes, concatenated.
pub fn record_stream(seed: u64, width: usize, count: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut bytes = vec![0u8; width * count];
    rng.fill_bytes(&mut bytes);
    bytes
}

fn below(rng: &mut ChaCha8Rng, bound: usize) -> usize {
    (rng.next_u64() % bound.max(1) as u64) as usize
}

fn record(rng: &mut ChaCha8Rng, width: usize) -> Vec<u8> {
    let mut r = vec![0u8; width];
    rng.fill_bytes(&mut r);
    r
}

/// A deterministic sequence of `n` operations. Indices are drawn below
/// `max_len`, so the vector stays around that size.
pub fn mixed_ops(seed: u64, width: usize, n: usize, max_len: usize) -> Vec<Op> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| match below(&mut rng, 10) {
            0..=3 => Op::Push(record(&mut rng, width)),
            4 => Op::Pop,
            5 | 6 => Op::Set(below(&mut rng, max_len), record(&mut rng, width)),
            7 => Op::Swap(below(&mut rng, max_len), below(&mut rng, max_len)),
            8 => Op::Write(
                below(&mut rng, max_len),
                1 + below(&mut rng, 8),
                record(&mut rng, width),
            ),
            _ => Op::Discard(below(&mut rng, 4)),
        })
        .collect()
}

/// Run one operation. Out-of-range indices are clamped to the length, so
/// every operation succeeds unless allocation fails.
pub fn apply<A: ChunkAllocator>(v: &mut ChunkVec<A>, op: &Op) -> Result<(), ChunkError> {
    match op {
        Op::Push(r) => v.push(r),
        Op::Pop => {
            let mut out = vec![0u8; v.width()];
            v.pop(&mut out);
            Ok(())
        }
        Op::Set(i, r) => v.set((*i).min(v.len()), r),
        Op::Swap(i, j) => {
            v.swap(*i, *j);
            Ok(())
        }
        Op::Write(i, count, r) => {
            let src = r.repeat(*count);
            v.write((*i).min(v.len()), &src)
        }
        Op::Discard(n) => {
            v.discard(*n);
            Ok(())
        }
    }
}
