//! Capture endpoint lookup via the MMDevice API.

use windows::core::PCWSTR;
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator, DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{CoCreateInstance, CoTaskMemFree, CLSCTX_ALL, STGM_READ};

use crate::error::WindowsAudioError;

/// Capture endpoint enumerator.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, WindowsAudioError> {
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
                .map_err(|e| WindowsAudioError::call("CoCreateInstance(MMDeviceEnumerator)", e))?;
        Ok(Self { enumerator })
    }

    /// IDs of the active capture endpoints.
    pub fn capture_device_ids(&self) -> Result<Vec<String>, WindowsAudioError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .map_err(|e| WindowsAudioError::call("EnumAudioEndpoints", e))?;
            let count = collection
                .GetCount()
                .map_err(|e| WindowsAudioError::call("GetCount", e))?;

            let mut ids = Vec::with_capacity(count as usize);
            for i in 0..count {
                if let Ok(device) = collection.Item(i) {
                    if let Some(id) = device_id(&device) {
                        ids.push(id);
                    }
                }
            }
            Ok(ids)
        }
    }

    /// ID of the default console capture endpoint. This is the input route
    /// the session reports, so a change of default microphone shows up as drift.
    pub fn default_capture_device_id(&self) -> Result<String, WindowsAudioError> {
        let device = self.capture_device(None)?;
        device_id(&device).ok_or(WindowsAudioError::NoCaptureDevice)
    }

    /// The capture endpoint with `id`, or the default one.
    pub fn capture_device(&self, id: Option<&str>) -> Result<IMMDevice, WindowsAudioError> {
        unsafe {
            match id {
                Some(id) => {
                    let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
                    self.enumerator
                        .GetDevice(PCWSTR(wide.as_ptr()))
                        .map_err(|_| WindowsAudioError::NoCaptureDevice)
                }
                None => self
                    .enumerator
                    .GetDefaultAudioEndpoint(eCapture, eConsole)
                    .map_err(|_| WindowsAudioError::NoCaptureDevice),
            }
        }
    }

    /// PKEY_Device_FriendlyName of `device`, for logs.
    pub fn friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;
            let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
            let name = value.to_string();
            (!name.is_empty()).then_some(name)
        }
    }
}

fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let raw = device.GetId().ok()?;
        let id = raw.to_string().ok();
        CoTaskMemFree(Some(raw.0 as *const _));
        id
    }
}
