use thiserror::Error;

use voice_processor_core::models::error::CaptureError;

/// Failures of the Windows audio stack, before they are mapped onto the
/// lifecycle step that hit them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowsAudioError {
    #[error("COM initialization failed: {0}")]
    ComInit(String),

    #[error("no capture device available")]
    NoCaptureDevice,

    #[error("microphone access is disabled in privacy settings")]
    AccessDenied,

    #[error("{call} failed: {message}")]
    Call { call: &'static str, message: String },

    #[error("unsupported mix format: {0} bits per sample")]
    UnsupportedFormat(u16),
}

impl WindowsAudioError {
    pub fn call(call: &'static str, message: impl ToString) -> Self {
        Self::Call {
            call,
            message: message.to_string(),
        }
    }
}

/// Errors raised while opening or starting a capture stream.
impl From<WindowsAudioError> for CaptureError {
    fn from(err: WindowsAudioError) -> Self {
        match err {
            WindowsAudioError::AccessDenied => CaptureError::PermissionDenied,
            other => CaptureError::EngineStart(other.to_string()),
        }
    }
}
