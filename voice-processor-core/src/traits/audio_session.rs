use crate::models::audio_models::{SessionCategory, SessionOptions, SessionSnapshot};

/// Platform audio session shared with other applications.
///
/// Errors are returned as plain messages; the processor maps them onto
/// `CaptureError::SessionConfiguration` or `CaptureError::Stop` depending on
/// which lifecycle step failed.
pub trait AudioSession: Send + Sync {
    /// Set the session category and its options.
    fn set_category(&self, category: &SessionCategory, options: SessionOptions)
        -> Result<(), String>;

    /// Activate or deactivate the session. On deactivation,
    /// `notify_others` lets interrupted sessions of other apps resume.
    fn set_active(&self, active: bool, notify_others: bool) -> Result<(), String>;

    /// The live session configuration. Called from the monitor thread every
    /// polling interval, so it must be cheap.
    fn snapshot(&self) -> SessionSnapshot;
}
