use crate::models::audio_models::AudioFormat;
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::processing::frame_pool::{BufferSlot, FramePool};
use crate::traits::input_backend::{FaultCallback, InputBackend, InputCallback, InputQueue};

/// Callback receiving each completed frame on the hardware thread.
pub type FrameCallback = Box<dyn FnMut(&[i16]) + Send + 'static>;

/// Turns a native input queue into a stream of fixed-length frames.
///
/// State machine: not started → started → not started. Starting while
/// started and stopping while not started are no-op successes.
pub struct InputEngine {
    backend: Box<dyn InputBackend>,
    num_buffers: usize,
    pool: FramePool,
    queue: Option<Box<dyn InputQueue>>,
    frame_callback: Option<FrameCallback>,
}

impl InputEngine {
    pub fn new(backend: Box<dyn InputBackend>, num_buffers: usize) -> Self {
        Self {
            backend,
            num_buffers,
            pool: FramePool::new(),
            queue: None,
            frame_callback: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.queue.is_some()
    }

    /// Buffers currently allocated by the engine's pool.
    pub fn allocated_buffers(&self) -> usize {
        self.pool.outstanding()
    }

    /// The pool buffers are allocated from, for lock-free accounting.
    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    /// Register the callback for the next `start`. Frames are delivered on
    /// the hardware thread; the engine does no thread hopping.
    pub fn register_frame_callback(&mut self, callback: FrameCallback) {
        self.frame_callback = Some(callback);
    }

    /// Open the native queue, prime it with the pool and begin capture.
    ///
    /// On failure everything acquired so far is torn down before returning.
    pub fn start(
        &mut self,
        config: CaptureConfig,
        on_fault: FaultCallback,
    ) -> Result<(), CaptureError> {
        if self.is_started() {
            log::debug!("input engine already started");
            return Ok(());
        }
        config.validate()?;
        if !self.backend.is_available() {
            return Err(CaptureError::EngineStart("no audio input device available".into()));
        }

        let format = AudioFormat::pcm_i16_mono(config.sample_rate);
        let frame_length = config.frame_length as usize;
        let mut on_frame = self
            .frame_callback
            .take()
            .unwrap_or_else(|| Box::new(|_: &[i16]| {}) as FrameCallback);

        let callback: InputCallback = Box::new(move |slot: BufferSlot| {
            on_frame(FramePool::drain(&slot, frame_length));
            slot
        });

        let mut queue = self
            .backend
            .open(&format, callback, on_fault)
            .map_err(engine_start_error)?;

        if let Err(e) = self.prime(queue.as_mut(), &config) {
            self.teardown(queue);
            return Err(e);
        }

        if let Err(e) = queue.start() {
            self.teardown(queue);
            return Err(engine_start_error(e));
        }

        log::info!(
            "input engine started: {} samples/frame at {} Hz, {} buffers",
            config.frame_length,
            config.sample_rate,
            self.num_buffers
        );
        self.queue = Some(queue);
        Ok(())
    }

    /// Flush, halt and dispose the native queue, then free every buffer.
    ///
    /// Synchronous: no frame callback runs after this returns.
    pub fn stop(&mut self) {
        let Some(mut queue) = self.queue.take() else {
            log::debug!("input engine not started");
            return;
        };

        if let Err(e) = queue.flush() {
            log::warn!("failed to flush input queue: {}", e);
        }
        self.teardown(queue);
        self.frame_callback = None;
        log::info!("input engine stopped");
    }

    fn prime(&self, queue: &mut dyn InputQueue, config: &CaptureConfig) -> Result<(), CaptureError> {
        let slots = self.pool.allocate(self.num_buffers, config.bytes_per_frame())?;
        for slot in slots {
            queue.enqueue(slot).map_err(engine_start_error)?;
        }
        Ok(())
    }

    fn teardown(&self, queue: Box<dyn InputQueue>) {
        let slots = queue.dispose();
        self.pool.release_all(slots);
    }
}

impl Drop for InputEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn engine_start_error(err: CaptureError) -> CaptureError {
    match err {
        CaptureError::EngineStart(_) => err,
        other => CaptureError::EngineStart(other.to_string()),
    }
}
