use thiserror::Error;

/// Bridge error code for malformed `start` arguments.
pub const INVALID_ARGUMENT_CODE: &str = "PV_INVALID_ARGUMENT";

/// Bridge error code for every failure raised by the capture core.
pub const AUDIO_RECORDER_ERROR_CODE: &str = "PV_AUDIO_RECORDER_ERROR";

/// Errors that can occur during voice capture operations.
///
/// None of these are fatal: after any of them the processor is left idle
/// and `start` can be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("record audio permission denied")]
    PermissionDenied,

    #[error("audio session configuration failed: {0}")]
    SessionConfiguration(String),

    #[error("unable to start audio engine: {0}")]
    EngineStart(String),

    #[error("{0}")]
    SettingsDrift(String),

    #[error("unable to stop audio engine: {0}")]
    Stop(String),

    #[error("audio device fault: {0}")]
    DeviceFault(String),

    #[error("voice processor already installed")]
    AlreadyInstalled,
}

impl CaptureError {
    /// Error code surfaced to the method-call bridge.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => INVALID_ARGUMENT_CODE,
            _ => AUDIO_RECORDER_ERROR_CODE,
        }
    }
}
