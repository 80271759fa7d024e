//! Construction parameters for a chunk vector.

/// Record width and initial capacity for a [`ChunkVec`](crate::ChunkVec).
///
/// Zero values are accepted and coerced to 1 at construction; the
/// `effective_*` accessors report what will actually be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Size of one record in bytes.
    pub width: usize,

    /// Number of records the initial store can hold.
    ///
    /// Default: 8.
    pub capacity: usize,
}

impl ChunkConfig {
    /// Default initial capacity in records.
    pub const DEFAULT_CAPACITY: usize = 8;

    /// Config for records of `width` bytes with the default capacity.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            capacity: Self::DEFAULT_CAPACITY,
        }
    }

    /// Config whose width is the size of `T`.
    pub fn for_type<T>() -> Self {
        Self::new(std::mem::size_of::<T>())
    }

    /// Override the initial capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Width after coercion (at least 1).
    pub fn effective_width(&self) -> usize {
        self.width.max(1)
    }

    /// Capacity after coercion (at least 1).
    pub fn effective_capacity(&self) -> usize {
        self.capacity.max(1)
    }

    /// Size of the initial store in bytes, or `None` on overflow.
    pub fn store_bytes(&self) -> Option<usize> {
        self.effective_width()
            .checked_mul(self.effective_capacity())
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::new(1)
    }
}
