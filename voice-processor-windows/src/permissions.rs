//! Windows microphone privacy check.
//!
//! Microphone access for desktop apps is governed by the global toggle at
//! Settings > Privacy > Microphone. Unpackaged apps get no consent prompt,
//! so a "request" can only report the current state.

use windows::Win32::Foundation::E_ACCESSDENIED;
use windows::Win32::Media::Audio::{IAudioClient, AUDCLNT_E_DEVICE_IN_USE};
use windows::Win32::System::Com::CLSCTX_ALL;

use voice_processor_core::traits::permissions::{PermissionCallback, PermissionProvider};

use crate::com::ComGuard;
use crate::device_enumerator::DeviceEnumerator;
use crate::error::WindowsAudioError;

/// Microphone permission read from the privacy settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPermissions;

impl WindowsPermissions {
    pub fn new() -> Self {
        Self
    }
}

impl PermissionProvider for WindowsPermissions {
    fn has_record_permission(&self) -> bool {
        match check_microphone_access() {
            Ok(()) => true,
            Err(WindowsAudioError::AccessDenied) => false,
            // No device or an unexpected failure is not a denial; start reports it.
            Err(e) => {
                log::debug!("microphone permission undetermined: {}", e);
                true
            }
        }
    }

    fn request_record_permission(&self, callback: PermissionCallback) {
        let granted = self.has_record_permission();
        if !granted {
            log::info!("microphone access must be enabled in Settings > Privacy > Microphone");
        }
        callback(granted);
    }
}

/// Open the default capture endpoint's audio client. Activation fails with
/// `E_ACCESSDENIED` (or `AUDCLNT_E_DEVICE_IN_USE`) when the privacy toggle is off.
fn check_microphone_access() -> Result<(), WindowsAudioError> {
    let _com = ComGuard::init()?;
    let device = DeviceEnumerator::new()?.capture_device(None)?;

    let activated: windows::core::Result<IAudioClient> = unsafe { device.Activate(CLSCTX_ALL, None) };
    match activated {
        Ok(_) => Ok(()),
        Err(e) if e.code() == E_ACCESSDENIED || e.code() == AUDCLNT_E_DEVICE_IN_USE => {
            Err(WindowsAudioError::AccessDenied)
        }
        Err(e) => {
            log::warn!("unexpected error checking microphone permission: {}", e);
            Err(WindowsAudioError::call("IMMDevice::Activate", e))
        }
    }
}
