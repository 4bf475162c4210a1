//! Audio session model for Windows.
//!
//! WASAPI has no app-wide session category to negotiate. The configured
//! category is recorded so the session reads back what was asked of it, and
//! the default capture endpoint stands in as the input route: switching
//! or unplugging the default microphone is what drift looks like here.

use parking_lot::Mutex;

use voice_processor_core::models::audio_models::{SessionCategory, SessionOptions, SessionSnapshot};
use voice_processor_core::traits::audio_session::AudioSession;

use crate::com::ComGuard;
use crate::device_enumerator::DeviceEnumerator;
use crate::error::WindowsAudioError;

#[derive(Debug)]
struct SessionState {
    category: SessionCategory,
    options: SessionOptions,
    active: bool,
}

/// Windows audio session.
pub struct WindowsAudioSession {
    state: Mutex<SessionState>,
}

impl WindowsAudioSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState {
                category: SessionCategory::SoloAmbient,
                options: SessionOptions::default(),
                active: false,
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn options(&self) -> SessionOptions {
        self.state.lock().options
    }
}

impl Default for WindowsAudioSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSession for WindowsAudioSession {
    fn set_category(&self, category: &SessionCategory, options: SessionOptions) -> Result<(), String> {
        log::debug!("session category {:?} with {:?}", category, options);
        let mut state = self.state.lock();
        state.category = category.clone();
        state.options = options;
        Ok(())
    }

    fn set_active(&self, active: bool, _notify_others: bool) -> Result<(), String> {
        if active {
            let route = default_input_route().map_err(|e| e.to_string())?;
            log::debug!("session active on {}", route);
        }
        self.state.lock().active = active;
        Ok(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        let category = self.state.lock().category.clone();
        SessionSnapshot {
            category,
            input_route: default_input_route().ok(),
        }
    }
}

fn default_input_route() -> Result<String, WindowsAudioError> {
    let _com = ComGuard::init()?;
    DeviceEnumerator::new()?.default_capture_device_id()
}
