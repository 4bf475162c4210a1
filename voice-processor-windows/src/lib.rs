//! # voice-processor-windows
//!
//! Windows WASAPI backend for voice-processor-core.
//!
//! Provides:
//! - `WasapiInputBackend`: microphone input queue on a shared-mode WASAPI capture endpoint
//! - `WindowsAudioSession`: session model whose input route is the default capture endpoint
//! - `WindowsPermissions`: microphone privacy check
//! - `DeviceEnumerator`: capture endpoint lookup via the MMDevice API
//!
//! ## Usage
//! ```ignore
//! use voice_processor_core::{ProcessorOptions, VoiceProcessor};
//!
//! let processor = VoiceProcessor::install(voice_processor_windows::platform(), ProcessorOptions::default())?;
//! processor.start(512, 16000)?;
//! ```

pub mod error;
pub mod format_converter;

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod permissions;
#[cfg(target_os = "windows")]
pub mod session;
#[cfg(target_os = "windows")]
pub mod wasapi_input;

pub use error::WindowsAudioError;
#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use permissions::WindowsPermissions;
#[cfg(target_os = "windows")]
pub use session::WindowsAudioSession;
#[cfg(target_os = "windows")]
pub use wasapi_input::WasapiInputBackend;

/// The default microphone, session and permission services of this machine.
#[cfg(target_os = "windows")]
pub fn platform() -> voice_processor_core::Platform {
    use std::sync::Arc;

    voice_processor_core::Platform {
        input: Box::new(WasapiInputBackend::default_device()),
        session: Arc::new(WindowsAudioSession::new()),
        permissions: Arc::new(WindowsPermissions::new()),
    }
}
