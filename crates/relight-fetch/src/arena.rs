//! Reusable fetch buffers.

use crate::error::FetchError;

/// A buffer checked out of a [`SlotArena`].
#[derive(Debug)]
pub struct Slot {
    /// Slot number, to hand back with [`SlotArena::release`].
    pub index: usize,
    /// The buffer. Its capacity is kept across uses.
    pub buffer: Vec<u8>,
}

/// Fixed pool of byte buffers, one per plane request that may be in flight.
///
/// Sized `max_requested * planes` so a full request window never allocates
/// more than once per slot.
#[derive(Debug)]
pub struct SlotArena {
    buffers: Vec<Option<Vec<u8>>>,
    free: Vec<usize>,
}

impl SlotArena {
    /// Arena with `capacity` empty buffers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: (0..capacity).map(|_| Some(Vec::new())).collect(),
            free: (0..capacity).rev().collect(),
        }
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    /// Slots not checked out.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Check out a buffer.
    pub fn acquire(&mut self) -> Result<Slot, FetchError> {
        let index = self.free.pop().ok_or(FetchError::ArenaExhausted {
            capacity: self.buffers.len(),
        })?;
        let buffer = self.buffers[index].take().unwrap_or_default();
        Ok(Slot { index, buffer })
    }

    /// Return a buffer. Unknown or already free slots are ignored.
    pub fn release(&mut self, index: usize, mut buffer: Vec<u8>) {
        let Some(entry) = self.buffers.get_mut(index) else {
            return;
        };
        if entry.is_some() {
            return;
        }
        buffer.clear();
        *entry = Some(buffer);
        self.free.push(index);
    }
}
