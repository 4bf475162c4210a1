#![allow(dead_code)]

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use voice_processor_core::simulated::{
    SimulatedInputHandle, SimulatedPermissions, SimulatedPlatform, SimulatedSession,
};
use voice_processor_core::{ProcessorOptions, VoiceProcessor};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A processor on the simulated platform, with handles to script it and
/// channels collecting everything its listeners receive.
pub struct Harness {
    pub processor: VoiceProcessor,
    pub input: SimulatedInputHandle,
    pub session: Arc<SimulatedSession>,
    pub permissions: Arc<SimulatedPermissions>,
    pub frames: Receiver<Vec<i16>>,
    pub errors: Receiver<String>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(ProcessorOptions::default())
    }

    pub fn with_options(options: ProcessorOptions) -> Self {
        init_logging();
        let SimulatedPlatform {
            platform,
            input,
            session,
            permissions,
        } = SimulatedPlatform::new();
        let processor = VoiceProcessor::new(platform, options).unwrap();

        let (frame_tx, frames) = mpsc::channel();
        processor.add_frame_listener(Arc::new(move |frame: &[i16]| {
            let _ = frame_tx.send(frame.to_vec());
        }));
        let (error_tx, errors) = mpsc::channel();
        processor.add_error_listener(Arc::new(move |message: &str| {
            let _ = error_tx.send(message.to_string());
        }));

        Self {
            processor,
            input,
            session,
            permissions,
            frames,
            errors,
        }
    }

    /// Discard frames received so far.
    pub fn drain_frames(&self) -> usize {
        self.frames.try_iter().count()
    }

    /// Collect frames until `count` have arrived or `timeout` elapses.
    pub fn collect_frames(&self, count: usize, timeout: Duration) -> Vec<Vec<i16>> {
        let deadline = Instant::now() + timeout;
        let mut frames = Vec::with_capacity(count);
        while frames.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.frames.recv_timeout(remaining) {
                Ok(frame) => frames.push(frame),
                Err(_) => break,
            }
        }
        frames
    }
}
