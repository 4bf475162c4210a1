use std::collections::VecDeque;

use super::frame_pool::BufferSlot;

/// Packs variable-sized hardware packets into queued fixed-size slots.
///
/// Backends whose native API hands out packets of arbitrary length use this
/// to behave like a buffer queue: each slot that fills up is passed to the
/// input callback, and the slot the callback returns goes to the back of the
/// queue. The deque is sized for the pool up front so steady-state operation
/// does not allocate.
#[derive(Debug)]
pub struct SlotFiller {
    empty: VecDeque<BufferSlot>,
    current: Option<BufferSlot>,
    filled: usize,
}

impl SlotFiller {
    pub fn with_capacity(slots: usize) -> Self {
        Self {
            empty: VecDeque::with_capacity(slots),
            current: None,
            filled: 0,
        }
    }

    /// Queue an empty slot for filling.
    pub fn enqueue(&mut self, slot: BufferSlot) {
        self.empty.push_back(slot);
    }

    /// Copy `samples` into the queued slots.
    ///
    /// `on_full` receives every slot that becomes full and returns the slot
    /// to re-queue. Returns the number of samples dropped because no slot
    /// was queued.
    pub fn write<F>(&mut self, mut samples: &[i16], mut on_full: F) -> usize
    where
        F: FnMut(BufferSlot) -> BufferSlot,
    {
        while !samples.is_empty() {
            let mut slot = match self.current.take().or_else(|| self.empty.pop_front()) {
                Some(slot) => slot,
                None => return samples.len(),
            };

            let space = slot.capacity() - self.filled;
            let n = space.min(samples.len());
            slot.samples_mut()[self.filled..self.filled + n].copy_from_slice(&samples[..n]);
            self.filled += n;
            samples = &samples[n..];

            if self.filled == slot.capacity() {
                self.filled = 0;
                let recycled = on_full(slot);
                self.empty.push_back(recycled);
            } else {
                self.current = Some(slot);
            }
        }
        0
    }

    /// Samples written into the partially filled slot.
    pub fn pending_samples(&self) -> usize {
        self.filled
    }

    /// Number of slots held, filled or not.
    pub fn slot_count(&self) -> usize {
        self.empty.len() + usize::from(self.current.is_some())
    }

    /// Discard the partial frame, keeping its slot queued.
    pub fn reset(&mut self) {
        if let Some(slot) = self.current.take() {
            self.empty.push_front(slot);
        }
        self.filled = 0;
    }

    /// Give back every slot, partially filled ones included.
    pub fn into_slots(mut self) -> Vec<BufferSlot> {
        self.reset();
        self.empty.into_iter().collect()
    }
}
