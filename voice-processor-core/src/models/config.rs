use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{SessionCategory, SessionOptions};
use super::error::CaptureError;

/// Number of buffers cycled through the hardware queue.
pub const DEFAULT_NUM_BUFFERS: usize = 3;

/// Interval between two session monitor checks.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(100);

/// Frames that may wait for delivery before new ones are dropped.
pub const DEFAULT_DELIVERY_QUEUE_FRAMES: usize = 32;

/// Largest accepted frame, in samples (about a minute of audio at 16 kHz).
pub const MAX_FRAME_LENGTH: u32 = 1 << 20;

/// Parameters of a single capture run.
///
/// Fixed for the lifetime of a run; changing them requires stop + start.
/// Deserializes from the bridge's `{"frameLength": .., "sampleRate": ..}` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Samples per delivered frame.
    pub frame_length: u32,

    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl CaptureConfig {
    pub fn new(frame_length: u32, sample_rate: u32) -> Self {
        Self {
            frame_length,
            sample_rate,
        }
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.frame_length == 0 {
            return Err(CaptureError::InvalidArgument(
                "frameLength must be positive".into(),
            ));
        }
        if self.frame_length > MAX_FRAME_LENGTH {
            return Err(CaptureError::InvalidArgument(format!(
                "frameLength must not exceed {}",
                MAX_FRAME_LENGTH
            )));
        }
        if self.sample_rate == 0 {
            return Err(CaptureError::InvalidArgument(
                "sampleRate must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Size in bytes of one frame of 16-bit mono PCM.
    pub fn bytes_per_frame(&self) -> usize {
        self.frame_length as usize * std::mem::size_of::<i16>()
    }
}

/// Tuning knobs of a `VoiceProcessor`, set once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorOptions {
    /// Buffers cycled through the hardware queue (default: 3).
    pub num_buffers: usize,

    /// Session monitor polling interval (default: 100 ms).
    pub monitor_interval: Duration,

    /// Frames buffered between the hardware thread and listeners (default: 32).
    pub delivery_queue_frames: usize,

    /// Category the session is configured with on start.
    pub session_category: SessionCategory,

    /// Options applied together with `session_category`.
    pub session_options: SessionOptions,
}

impl ProcessorOptions {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.num_buffers == 0 {
            return Err(CaptureError::InvalidArgument(
                "num_buffers must be positive".into(),
            ));
        }
        if self.monitor_interval.is_zero() {
            return Err(CaptureError::InvalidArgument(
                "monitor_interval must be positive".into(),
            ));
        }
        if self.delivery_queue_frames == 0 {
            return Err(CaptureError::InvalidArgument(
                "delivery_queue_frames must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            num_buffers: DEFAULT_NUM_BUFFERS,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            delivery_queue_frames: DEFAULT_DELIVERY_QUEUE_FRAMES,
            session_category: SessionCategory::PlayAndRecord,
            session_options: SessionOptions::default(),
        }
    }
}
