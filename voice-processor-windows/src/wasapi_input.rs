//! WASAPI microphone input queue.
//!
//! Opens a capture endpoint in shared mode on a dedicated thread registered
//! with MMCSS, converts each packet of the endpoint's mix format to mono
//! 16-bit PCM at the requested rate and fills the core's buffer slots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use windows::core::w;
use windows::Win32::Media::Audio::{
    IAudioCaptureClient, IAudioClient, AUDCLNT_BUFFERFLAGS_SILENT, AUDCLNT_SHAREMODE_SHARED,
    AUDCLNT_STREAMFLAGS_NOPERSIST,
};
use windows::Win32::System::Com::{CoTaskMemFree, CLSCTX_ALL};
use windows::Win32::System::Threading::{
    AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW,
};

use voice_processor_core::models::audio_models::AudioFormat;
use voice_processor_core::models::error::CaptureError;
use voice_processor_core::processing::frame_pool::BufferSlot;
use voice_processor_core::processing::slot_filler::SlotFiller;
use voice_processor_core::traits::input_backend::{
    FaultCallback, InputBackend, InputCallback, InputQueue,
};

use crate::com::ComGuard;
use crate::device_enumerator::DeviceEnumerator;
use crate::error::WindowsAudioError;
use crate::format_converter::{MixFormatConverter, MixSampleFormat};

/// Shared-mode buffer duration in 100 ns units (100 ms).
const BUFFER_DURATION_HNS: i64 = 1_000_000;

/// Sleep between two polls of the capture client.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// WASAPI capture endpoint used as the processor's input.
pub struct WasapiInputBackend {
    device_id: Option<String>,
}

impl WasapiInputBackend {
    /// Capture from the system default microphone.
    pub fn default_device() -> Self {
        Self { device_id: None }
    }

    /// Capture from a specific endpoint.
    pub fn with_device(id: impl Into<String>) -> Self {
        Self {
            device_id: Some(id.into()),
        }
    }
}

impl InputBackend for WasapiInputBackend {
    fn is_available(&self) -> bool {
        let available = || -> Result<bool, WindowsAudioError> {
            let _com = ComGuard::init()?;
            Ok(!DeviceEnumerator::new()?.capture_device_ids()?.is_empty())
        };
        available().unwrap_or(false)
    }

    fn open(
        &mut self,
        format: &AudioFormat,
        callback: InputCallback,
        on_fault: FaultCallback,
    ) -> Result<Box<dyn InputQueue>, CaptureError> {
        Ok(Box::new(WasapiInputQueue {
            device_id: self.device_id.clone(),
            target_rate: format.sample_rate,
            callback: Some(callback),
            on_fault,
            pending: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }))
    }
}

/// Input queue backed by a capture thread.
///
/// Slots enqueued before `start` are handed to the thread; from then on the
/// callback returns each slot for refilling. `dispose` joins the thread and
/// gets every slot back.
pub struct WasapiInputQueue {
    device_id: Option<String>,
    target_rate: u32,
    callback: Option<InputCallback>,
    on_fault: FaultCallback,
    pending: Vec<BufferSlot>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<Vec<BufferSlot>>>,
}

impl InputQueue for WasapiInputQueue {
    fn enqueue(&mut self, slot: BufferSlot) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            return Err(CaptureError::DeviceFault(
                "capture thread already owns the buffer queue".into(),
            ));
        }
        self.pending.push(slot);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let Some(callback) = self.callback.take() else {
            return Err(CaptureError::EngineStart("input queue already started".into()));
        };

        let mut filler = SlotFiller::with_capacity(self.pending.len());
        for slot in self.pending.drain(..) {
            filler.enqueue(slot);
        }

        self.running.store(true, Ordering::SeqCst);
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let worker = CaptureWorker {
            device_id: self.device_id.clone(),
            target_rate: self.target_rate,
            running: Arc::clone(&self.running),
            on_fault: Arc::clone(&self.on_fault),
        };

        let handle = thread::Builder::new()
            .name("wasapi-input".into())
            .spawn(move || worker.run(filler, callback, ready_tx))
            .map_err(|e| CaptureError::EngineStart(format!("failed to spawn capture thread: {}", e)))?;
        self.handle = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::EngineStart(
                "capture thread exited during initialization".into(),
            )),
        }
    }

    fn dispose(mut self: Box<Self>) -> Vec<BufferSlot> {
        self.running.store(false, Ordering::SeqCst);
        let mut slots: Vec<BufferSlot> = self.pending.drain(..).collect();
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(returned) => slots.extend(returned),
                Err(_) => log::error!("wasapi capture thread panicked"),
            }
        }
        slots
    }
}

struct CaptureWorker {
    device_id: Option<String>,
    target_rate: u32,
    running: Arc<AtomicBool>,
    on_fault: FaultCallback,
}

impl CaptureWorker {
    /// Thread body. Reports the outcome of stream setup through `ready`,
    /// then captures until `running` is cleared or the device fails.
    fn run(
        self,
        mut filler: SlotFiller,
        mut callback: InputCallback,
        ready: mpsc::SyncSender<Result<(), CaptureError>>,
    ) -> Vec<BufferSlot> {
        let setup = ComGuard::init().and_then(|com| {
            CaptureStream::open(self.device_id.as_deref(), self.target_rate).map(|s| (com, s))
        });

        let (_com, mut stream) = match setup {
            Ok(opened) => opened,
            Err(e) => {
                log::error!("failed to open capture stream: {}", e);
                let _ = ready.send(Err(e.into()));
                return filler.into_slots();
            }
        };

        if let Err(e) = stream.start() {
            let _ = ready.send(Err(e.into()));
            return filler.into_slots();
        }
        let _ = ready.send(Ok(()));

        let mmcss = unsafe {
            let mut task_index: u32 = 0;
            AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index)
        };

        if let Err(e) = stream.capture(&self.running, &mut filler, &mut callback) {
            log::error!("capture stream failed: {}", e);
            (self.on_fault)(CaptureError::DeviceFault(e.to_string()));
        }
        stream.stop();
        drop(stream);

        if let Ok(task) = mmcss {
            unsafe {
                let _ = AvRevertMmThreadCharacteristics(task);
            }
        }

        drop(callback);
        filler.into_slots()
    }
}

struct CaptureStream {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    converter: MixFormatConverter,
}

impl CaptureStream {
    /// Activate the endpoint and initialize it in shared mode with its own
    /// mix format. Requires COM on the calling thread.
    fn open(device_id: Option<&str>, target_rate: u32) -> Result<Self, WindowsAudioError> {
        let enumerator = DeviceEnumerator::new()?;
        let device = enumerator.capture_device(device_id)?;
        if let Some(name) = DeviceEnumerator::friendly_name(&device) {
            log::info!("capturing from {}", name);
        }

        unsafe {
            let audio_client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| WindowsAudioError::call("IMMDevice::Activate", e))?;

            let mix_format_ptr = audio_client
                .GetMixFormat()
                .map_err(|e| WindowsAudioError::call("GetMixFormat", e))?;
            let mix_format = std::ptr::read_unaligned(mix_format_ptr);
            let channels = mix_format.nChannels;
            let sample_rate = mix_format.nSamplesPerSec;
            let bits = mix_format.wBitsPerSample;

            let initialized = audio_client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_NOPERSIST,
                BUFFER_DURATION_HNS,
                0,
                mix_format_ptr,
                None,
            );
            CoTaskMemFree(Some(mix_format_ptr as *const _));
            initialized.map_err(|e| WindowsAudioError::call("IAudioClient::Initialize", e))?;

            let sample_format = MixSampleFormat::from_bits(bits)?;
            log::debug!(
                "mix format: {} Hz, {} channels, {:?}; converting to {} Hz mono",
                sample_rate,
                channels,
                sample_format,
                target_rate
            );

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| WindowsAudioError::call("GetService", e))?;

            Ok(Self {
                audio_client,
                capture_client,
                converter: MixFormatConverter::new(sample_format, channels, sample_rate, target_rate),
            })
        }
    }

    fn start(&self) -> Result<(), WindowsAudioError> {
        unsafe { self.audio_client.Start() }.map_err(|e| WindowsAudioError::call("IAudioClient::Start", e))
    }

    fn stop(&self) {
        if let Err(e) = unsafe { self.audio_client.Stop() } {
            log::warn!("IAudioClient::Stop failed: {}", e);
        }
    }

    /// Poll the capture client and push converted samples through `filler`.
    fn capture(
        &mut self,
        running: &AtomicBool,
        filler: &mut SlotFiller,
        callback: &mut InputCallback,
    ) -> Result<(), WindowsAudioError> {
        let block_align = self.converter.block_align();

        while running.load(Ordering::SeqCst) {
            thread::sleep(POLL_INTERVAL);

            let mut packet_length = unsafe { self.capture_client.GetNextPacketSize() }
                .map_err(|e| WindowsAudioError::call("GetNextPacketSize", e))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                unsafe {
                    self.capture_client
                        .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                        .map_err(|e| WindowsAudioError::call("GetBuffer", e))?;
                }

                let samples = if num_frames == 0 || buffer_ptr.is_null() {
                    &[][..]
                } else if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 {
                    self.converter.silence(num_frames as usize)
                } else {
                    let bytes = unsafe {
                        std::slice::from_raw_parts(buffer_ptr, num_frames as usize * block_align)
                    };
                    self.converter.convert(bytes)
                };

                let dropped = filler.write(samples, |slot| callback(slot));
                if dropped > 0 {
                    log::warn!("no free capture buffer; dropped {} samples", dropped);
                }

                unsafe { self.capture_client.ReleaseBuffer(num_frames) }
                    .map_err(|e| WindowsAudioError::call("ReleaseBuffer", e))?;

                packet_length = unsafe { self.capture_client.GetNextPacketSize() }
                    .map_err(|e| WindowsAudioError::call("GetNextPacketSize", e))?;
            }
        }
        Ok(())
    }
}
