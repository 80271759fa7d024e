//! Slot+generation handle table for vectors owned across the C boundary.
//!
//! C code holds a `u64`, never a pointer to a vector. A destroyed vector's
//! slot gets a new generation, so stale handles resolve to `None` instead
//! of reaching freed memory, and destroying twice is a safe no-op.

/// Upper 32 bits: slot index. Lower 32 bits: generation.
fn pack(slot: u32, generation: u32) -> u64 {
    (u64::from(slot) << 32) | u64::from(generation)
}

/// Split a handle into slot index and generation.
fn unpack(handle: u64) -> (usize, u32) {
    ((handle >> 32) as usize, handle as u32)
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Maps `u64` handles to owned values, recycling vacated slots.
pub(crate) struct HandleTable<T> {
    entries: Vec<Entry<T>>,
    vacant: Vec<u32>,
}

impl<T> HandleTable<T> {
    /// An empty table. `const` so it can seed a `thread_local!`.
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            vacant: Vec::new(),
        }
    }

    /// Store `value` and return its handle.
    pub(crate) fn insert(&mut self, value: T) -> u64 {
        match self.vacant.pop() {
            Some(slot) => {
                let entry = &mut self.entries[slot as usize];
                entry.value = Some(value);
                pack(slot, entry.generation)
            }
            None => {
                let slot = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 0,
                    value: Some(value),
                });
                pack(slot, 0)
            }
        }
    }

    /// The entry behind `handle` if its generation still matches.
    fn entry_mut(&mut self, handle: u64) -> Option<&mut Entry<T>> {
        let (slot, generation) = unpack(handle);
        self.entries
            .get_mut(slot)
            .filter(|e| e.generation == generation)
    }

    /// Borrow the value behind `handle`.
    ///
    /// `None` if the handle is stale (its vector was destroyed) or was never
    /// issued by this table.
    pub(crate) fn get(&self, handle: u64) -> Option<&T> {
        let (slot, generation) = unpack(handle);
        let entry = self.entries.get(slot)?;
        if entry.generation != generation {
            return None;
        }
        entry.value.as_ref()
    }

    /// Mutably borrow the value behind `handle`. `None` if stale or unknown.
    pub(crate) fn get_mut(&mut self, handle: u64) -> Option<&mut T> {
        self.entry_mut(handle)?.value.as_mut()
    }

    /// Take the value out and invalidate the handle.
    ///
    /// A slot whose generation wraps to 0 is retired for good, so a handle
    /// from its first life can never match again.
    pub(crate) fn remove(&mut self, handle: u64) -> Option<T> {
        let (slot, _) = unpack(handle);
        let entry = self.entry_mut(handle)?;
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        if entry.generation != 0 {
            self.vacant.push(slot as u32);
        }
        Some(value)
    }

    /// Number of live values.
    pub(crate) fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value.is_some()).count()
    }
}
