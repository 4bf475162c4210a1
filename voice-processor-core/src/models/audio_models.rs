use serde::{Deserialize, Serialize};

/// Linear PCM stream description handed to the input backend.
///
/// The processor only ever captures one layout: mono, signed 16-bit,
/// packed, little-endian, non-interleaved, one frame per packet. Only the
/// rate varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub bytes_per_frame: u16,
    pub frames_per_packet: u16,
    pub is_signed: bool,
    pub is_packed: bool,
    pub is_little_endian: bool,
    /// Each channel in its own buffer. Trivially true for mono.
    pub is_non_interleaved: bool,
}

impl AudioFormat {
    /// Mono 16-bit signed linear PCM at `sample_rate`.
    pub fn pcm_i16_mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
            bytes_per_frame: 2,
            frames_per_packet: 1,
            is_signed: true,
            is_packed: true,
            is_little_endian: true,
            is_non_interleaved: true,
        }
    }

    pub fn bytes_per_packet(&self) -> u16 {
        self.bytes_per_frame * self.frames_per_packet
    }
}

/// Audio session category, modeled on mobile audio session categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionCategory {
    PlayAndRecord,
    Record,
    Playback,
    Ambient,
    SoloAmbient,
    MultiRoute,
    Other(String),
}

/// Options applied together with a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub mix_with_others: bool,
    pub allow_bluetooth: bool,
    pub default_to_speaker: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mix_with_others: true,
            allow_bluetooth: true,
            default_to_speaker: true,
        }
    }
}

/// Observable session configuration.
///
/// The monitor compares the live snapshot against the one taken right
/// after activation; any difference counts as drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub category: SessionCategory,

    /// Identifier of the active input route, where the platform exposes one.
    pub input_route: Option<String>,
}

impl SessionSnapshot {
    pub fn new(category: SessionCategory) -> Self {
        Self {
            category,
            input_route: None,
        }
    }

    pub fn with_input_route(mut self, route: impl Into<String>) -> Self {
        self.input_route = Some(route.into());
        self
    }
}

/// Counters and identity of the current (or last) capture run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessorDiagnostics {
    pub run_id: Option<String>,
    pub started_at: Option<String>,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub drift_reported: bool,
}
