use std::sync::Arc;

use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;
use crate::processing::frame_pool::BufferSlot;

/// Hardware callback bound to an input queue.
///
/// Receives ownership of a slot the hardware has completely filled and
/// returns the slot to put back into the queue. Runs on the time-critical
/// audio thread: it must not block, lock or allocate.
pub type InputCallback = Box<dyn FnMut(BufferSlot) -> BufferSlot + Send + 'static>;

/// Notification of a runtime failure after capture has started
/// (device removed, stream invalidated).
pub type FaultCallback = Arc<dyn Fn(CaptureError) + Send + Sync + 'static>;

/// Factory for the platform's native input queue.
///
/// Implemented by:
/// - `WasapiInputBackend` (Windows)
/// - `SimulatedInput` (tests and demos)
pub trait InputBackend: Send {
    /// Whether an input device is present.
    fn is_available(&self) -> bool;

    /// Create a native input queue in `format`, bound to `callback`.
    ///
    /// The queue does not capture anything until `InputQueue::start`.
    fn open(
        &mut self,
        format: &AudioFormat,
        callback: InputCallback,
        on_fault: FaultCallback,
    ) -> Result<Box<dyn InputQueue>, CaptureError>;
}

/// A native input queue cycling caller-provided slots.
pub trait InputQueue: Send {
    /// Hand an empty slot to the hardware for filling.
    fn enqueue(&mut self, slot: BufferSlot) -> Result<(), CaptureError>;

    /// Begin capture.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Deliver or discard partially filled buffers ahead of teardown.
    fn flush(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Stop capture and release the native queue synchronously.
    ///
    /// Once this returns the callback will never run again and has been
    /// dropped. Every slot still owned by the queue is handed back.
    fn dispose(self: Box<Self>) -> Vec<BufferSlot>;
}
