//! # voice-processor-core
//!
//! Platform-agnostic real-time voice capture core.
//!
//! Captures microphone audio as fixed-size frames of 16-bit mono PCM and
//! hands them to registered listeners on a dedicated delivery thread.
//! Platform backends (Windows WASAPI, or the in-process `simulated`
//! platform) implement `InputBackend`, `AudioSession` and
//! `PermissionProvider` and plug into the generic `VoiceProcessor`.
//!
//! ## Architecture
//!
//! ```text
//! voice-processor-core (this crate)
//! ├── traits/       ← InputBackend, InputQueue, AudioSession, PermissionProvider, listeners
//! ├── models/       ← CaptureError, EngineState, CaptureConfig, ProcessorOptions, SessionSnapshot
//! ├── processing/   ← FramePool, SlotFiller, PCM conversion and resampling
//! ├── engine/       ← InputEngine (buffer pool + input queue lifecycle)
//! ├── monitor/      ← SessionMonitor (settings drift watchdog)
//! ├── controller/   ← VoiceProcessor, listener registry, frame delivery
//! ├── bridge/       ← method-call dispatch for host-language bindings
//! └── simulated     ← hardware-free platform for tests and demos
//! ```

pub mod bridge;
pub mod controller;
pub mod engine;
pub mod models;
pub mod monitor;
pub mod processing;
pub mod simulated;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use bridge::method_call::{handle_method_call, MethodCall, MethodResult, Reply};
pub use controller::listeners::ListenerId;
pub use controller::voice_processor::{Platform, VoiceProcessor};
pub use engine::input_engine::{FrameCallback, InputEngine};
pub use models::audio_models::{
    AudioFormat, ProcessorDiagnostics, SessionCategory, SessionOptions, SessionSnapshot,
};
pub use models::config::{CaptureConfig, ProcessorOptions};
pub use models::error::CaptureError;
pub use models::state::EngineState;
pub use monitor::session_monitor::{DriftCallback, SessionMonitor};
pub use processing::frame_pool::{BufferSlot, FramePool};
pub use processing::slot_filler::SlotFiller;
pub use traits::audio_session::AudioSession;
pub use traits::input_backend::{FaultCallback, InputBackend, InputCallback, InputQueue};
pub use traits::listener::{ErrorListener, FrameListener};
pub use traits::permissions::{PermissionCallback, PermissionProvider};
