use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::error::CaptureError;

/// One fixed-size sample buffer cycled through the hardware queue.
///
/// Slots are moved, never shared: at any time a slot is held by exactly one
/// of the pool, the hardware queue, or the callback draining it. Dropping a
/// slot returns its memory and decrements the owning pool's live count.
pub struct BufferSlot {
    index: usize,
    samples: Box<[i16]>,
    live: Arc<AtomicUsize>,
}

impl BufferSlot {
    /// Position of this slot in the set it was allocated with.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Capacity in bytes of 16-bit PCM.
    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Mutable view for the hardware side to fill.
    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }
}

impl Drop for BufferSlot {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for BufferSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSlot")
            .field("index", &self.index)
            .field("capacity", &self.samples.len())
            .finish()
    }
}

/// Allocator and bookkeeper for the buffers handed to the hardware queue.
///
/// All memory is allocated up front in `allocate`; nothing on the hardware
/// path allocates or locks. Clones share the live count.
#[derive(Debug, Default, Clone)]
pub struct FramePool {
    live: Arc<AtomicUsize>,
}

impl FramePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `count` zeroed slots of `bytes_per_buffer` bytes each.
    pub fn allocate(
        &self,
        count: usize,
        bytes_per_buffer: usize,
    ) -> Result<Vec<BufferSlot>, CaptureError> {
        let sample_size = std::mem::size_of::<i16>();
        if count == 0 || bytes_per_buffer == 0 {
            return Err(CaptureError::EngineStart(format!(
                "cannot allocate {} buffers of {} bytes",
                count, bytes_per_buffer
            )));
        }
        if bytes_per_buffer % sample_size != 0 {
            return Err(CaptureError::EngineStart(format!(
                "buffer size {} is not a whole number of 16-bit samples",
                bytes_per_buffer
            )));
        }

        let samples_per_buffer = bytes_per_buffer / sample_size;
        let mut slots = Vec::new();
        slots.try_reserve_exact(count).map_err(|e| {
            CaptureError::EngineStart(format!("cannot allocate {} buffers: {}", count, e))
        })?;
        for index in 0..count {
            let samples = zeroed_samples(samples_per_buffer)?;
            self.live.fetch_add(1, Ordering::AcqRel);
            slots.push(BufferSlot {
                index,
                samples,
                live: Arc::clone(&self.live),
            });
        }
        Ok(slots)
    }

    /// View a filled slot as exactly `frame_length` samples.
    ///
    /// Runs on the hardware thread: no allocation, no locking.
    #[inline]
    pub fn drain(slot: &BufferSlot, frame_length: usize) -> &[i16] {
        let samples = slot.samples();
        &samples[..frame_length.min(samples.len())]
    }

    /// Free the slots returned by the hardware queue on teardown.
    ///
    /// Returns how many slots of this pool are still alive afterwards,
    /// which is zero unless something upstream leaked one.
    pub fn release_all(&self, slots: Vec<BufferSlot>) -> usize {
        let returned = slots.len();
        drop(slots);

        let remaining = self.outstanding();
        if remaining > 0 {
            log::warn!(
                "{} buffer(s) still outstanding after releasing {}",
                remaining,
                returned
            );
        }
        remaining
    }

    /// Number of slots allocated by this pool that have not been freed.
    pub fn outstanding(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// A zeroed buffer of `len` samples, or `EngineStart` if it cannot be allocated.
pub fn zeroed_samples(len: usize) -> Result<Box<[i16]>, CaptureError> {
    let mut samples = Vec::new();
    samples.try_reserve_exact(len).map_err(|e| {
        CaptureError::EngineStart(format!("cannot allocate {} samples: {}", len, e))
    })?;
    samples.resize(len, 0);
    Ok(samples.into_boxed_slice())
}
