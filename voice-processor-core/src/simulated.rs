//! In-process platform with no audio hardware.
//!
//! `SimulatedInput` runs a paced "hardware" thread that produces a ramp of
//! consecutive sample values at the requested rate, in packets that do not
//! line up with frame boundaries. `SimulatedSession` and
//! `SimulatedPermissions` are scriptable stand-ins for the platform session
//! and permission services. Used by the integration tests and for running
//! a processor on machines without a capture device.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::controller::voice_processor::Platform;
use crate::models::audio_models::{AudioFormat, SessionCategory, SessionOptions, SessionSnapshot};
use crate::models::error::CaptureError;
use crate::processing::frame_pool::BufferSlot;
use crate::processing::slot_filler::SlotFiller;
use crate::traits::audio_session::AudioSession;
use crate::traits::input_backend::{FaultCallback, InputBackend, InputCallback, InputQueue};
use crate::traits::permissions::{PermissionCallback, PermissionProvider};

/// Samples per simulated hardware packet (10 ms at 16 kHz).
const DEFAULT_PACKET_SAMPLES: usize = 160;

#[derive(Default)]
struct InputControl {
    unplugged: AtomicBool,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
    queues_opened: AtomicUsize,
    active_queues: AtomicUsize,
    callbacks: AtomicU64,
    fault: Mutex<Option<String>>,
}

/// Simulated input device.
pub struct SimulatedInput {
    control: Arc<InputControl>,
    packet_samples: usize,
}

/// Test-side handle to a `SimulatedInput` after it has been moved into a processor.
#[derive(Clone)]
pub struct SimulatedInputHandle {
    control: Arc<InputControl>,
}

impl SimulatedInput {
    pub fn new() -> Self {
        Self::with_packet_size(DEFAULT_PACKET_SAMPLES)
    }

    pub fn with_packet_size(packet_samples: usize) -> Self {
        Self {
            control: Arc::new(InputControl::default()),
            packet_samples: packet_samples.max(1),
        }
    }

    pub fn handle(&self) -> SimulatedInputHandle {
        SimulatedInputHandle {
            control: Arc::clone(&self.control),
        }
    }
}

impl Default for SimulatedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedInputHandle {
    /// Report no input device present.
    pub fn set_unplugged(&self, unplugged: bool) {
        self.control.unplugged.store(unplugged, Ordering::SeqCst);
    }

    /// Make the next `open` fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.control.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Make the next queue `start` fail.
    pub fn set_fail_start(&self, fail: bool) {
        self.control.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Raise a runtime fault on the running queue; it stops producing.
    pub fn inject_fault(&self, reason: impl Into<String>) {
        *self.control.fault.lock() = Some(reason.into());
    }

    pub fn queues_opened(&self) -> usize {
        self.control.queues_opened.load(Ordering::SeqCst)
    }

    /// Queues opened and not yet disposed.
    pub fn active_queues(&self) -> usize {
        self.control.active_queues.load(Ordering::SeqCst)
    }

    /// Hardware callbacks fired so far, across all queues.
    pub fn callbacks(&self) -> u64 {
        self.control.callbacks.load(Ordering::SeqCst)
    }
}

impl InputBackend for SimulatedInput {
    fn is_available(&self) -> bool {
        !self.control.unplugged.load(Ordering::SeqCst)
    }

    fn open(
        &mut self,
        format: &AudioFormat,
        callback: InputCallback,
        on_fault: FaultCallback,
    ) -> Result<Box<dyn InputQueue>, CaptureError> {
        if self.control.fail_open.load(Ordering::SeqCst) {
            return Err(CaptureError::EngineStart("simulated input unavailable".into()));
        }
        self.control.queues_opened.fetch_add(1, Ordering::SeqCst);
        self.control.active_queues.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SimulatedQueue {
            control: Arc::clone(&self.control),
            sample_rate: format.sample_rate,
            packet_samples: self.packet_samples,
            callback: Some(callback),
            on_fault,
            pending: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }))
    }
}

struct SimulatedQueue {
    control: Arc<InputControl>,
    sample_rate: u32,
    packet_samples: usize,
    callback: Option<InputCallback>,
    on_fault: FaultCallback,
    pending: Vec<BufferSlot>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<Vec<BufferSlot>>>,
}

impl InputQueue for SimulatedQueue {
    fn enqueue(&mut self, slot: BufferSlot) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            return Err(CaptureError::DeviceFault(
                "slots are recycled by the callback once started".into(),
            ));
        }
        self.pending.push(slot);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.control.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::EngineStart("simulated queue failed to start".into()));
        }
        let Some(callback) = self.callback.take() else {
            return Err(CaptureError::EngineStart("queue already started".into()));
        };

        let mut filler = SlotFiller::with_capacity(self.pending.len());
        for slot in self.pending.drain(..) {
            filler.enqueue(slot);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let control = Arc::clone(&self.control);
        let on_fault = Arc::clone(&self.on_fault);
        let period = Duration::from_secs_f64(self.packet_samples as f64 / self.sample_rate as f64);
        let packet_samples = self.packet_samples;

        let handle = thread::Builder::new()
            .name("simulated-input".into())
            .spawn(move || {
                hardware_loop(running, control, on_fault, filler, callback, packet_samples, period)
            })
            .map_err(|e| CaptureError::EngineStart(format!("failed to spawn input thread: {}", e)))?;

        self.handle = Some(handle);
        Ok(())
    }

    fn dispose(mut self: Box<Self>) -> Vec<BufferSlot> {
        self.running.store(false, Ordering::SeqCst);
        let mut slots: Vec<BufferSlot> = self.pending.drain(..).collect();
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(returned) => slots.extend(returned),
                Err(_) => log::error!("simulated input thread panicked"),
            }
        }
        self.callback = None;
        self.control.active_queues.fetch_sub(1, Ordering::SeqCst);
        slots
    }
}

fn hardware_loop(
    running: Arc<AtomicBool>,
    control: Arc<InputControl>,
    on_fault: FaultCallback,
    mut filler: SlotFiller,
    mut callback: InputCallback,
    packet_samples: usize,
    period: Duration,
) -> Vec<BufferSlot> {
    let mut packet = vec![0i16; packet_samples];
    let mut next_value: i16 = 0;
    let mut faulted = false;
    let mut deadline = Instant::now();

    while running.load(Ordering::SeqCst) {
        if !faulted {
            if let Some(reason) = control.fault.try_lock().and_then(|mut f| f.take()) {
                faulted = true;
                on_fault(CaptureError::DeviceFault(reason));
            }
        }

        if !faulted {
            for sample in packet.iter_mut() {
                *sample = next_value;
                next_value = next_value.wrapping_add(1);
            }
            filler.write(&packet, |slot| {
                control.callbacks.fetch_add(1, Ordering::SeqCst);
                callback(slot)
            });
        }

        deadline += period;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else {
            deadline = now;
        }
    }

    drop(callback);
    filler.into_slots()
}

#[derive(Debug)]
struct SessionState {
    category: SessionCategory,
    options: Option<SessionOptions>,
    active: bool,
    route: Option<String>,
    fail_category: bool,
    fail_activation: bool,
    fail_deactivation: bool,
    calls: usize,
    activations: usize,
    deactivations: usize,
}

/// Scriptable audio session.
pub struct SimulatedSession {
    state: Mutex<SessionState>,
}

impl SimulatedSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState {
                category: SessionCategory::SoloAmbient,
                options: None,
                active: false,
                route: Some("built-in-mic".into()),
                fail_category: false,
                fail_activation: false,
                fail_deactivation: false,
                calls: 0,
                activations: 0,
                deactivations: 0,
            }),
        }
    }

    /// Change the category behind the processor's back, as another app would.
    pub fn force_category(&self, category: SessionCategory) {
        self.state.lock().category = category;
    }

    /// Change the active input route, as plugging in a headset would.
    pub fn force_route(&self, route: Option<String>) {
        self.state.lock().route = route;
    }

    pub fn set_fail_category(&self, fail: bool) {
        self.state.lock().fail_category = fail;
    }

    pub fn set_fail_activation(&self, fail: bool) {
        self.state.lock().fail_activation = fail;
    }

    pub fn set_fail_deactivation(&self, fail: bool) {
        self.state.lock().fail_deactivation = fail;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn category(&self) -> SessionCategory {
        self.state.lock().category.clone()
    }

    pub fn options(&self) -> Option<SessionOptions> {
        self.state.lock().options
    }

    /// Number of `set_category`/`set_active` calls received.
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    pub fn activations(&self) -> usize {
        self.state.lock().activations
    }

    pub fn deactivations(&self) -> usize {
        self.state.lock().deactivations
    }
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSession for SimulatedSession {
    fn set_category(&self, category: &SessionCategory, options: SessionOptions) -> Result<(), String> {
        let mut state = self.state.lock();
        state.calls += 1;
        if state.fail_category {
            return Err(format!("category {:?} rejected", category));
        }
        state.category = category.clone();
        state.options = Some(options);
        Ok(())
    }

    fn set_active(&self, active: bool, _notify_others: bool) -> Result<(), String> {
        let mut state = self.state.lock();
        state.calls += 1;
        if active {
            if state.fail_activation {
                return Err("session activation refused".into());
            }
            state.activations += 1;
        } else {
            if state.fail_deactivation {
                return Err("session deactivation refused".into());
            }
            state.deactivations += 1;
        }
        state.active = active;
        Ok(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            category: state.category.clone(),
            input_route: state.route.clone(),
        }
    }
}

/// Scriptable permission subsystem.
pub struct SimulatedPermissions {
    granted: AtomicBool,
    grant_on_request: AtomicBool,
    requests: AtomicUsize,
}

impl SimulatedPermissions {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            grant_on_request: AtomicBool::new(true),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    /// What the simulated user answers to the next request.
    pub fn set_grant_on_request(&self, grant: bool) {
        self.grant_on_request.store(grant, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for SimulatedPermissions {
    fn has_record_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_record_permission(&self, callback: PermissionCallback) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let granted = self.grant_on_request.load(Ordering::SeqCst);
        self.granted.store(granted, Ordering::SeqCst);
        callback(granted);
    }
}

/// A simulated platform plus handles to script it.
pub struct SimulatedPlatform {
    pub platform: Platform,
    pub input: SimulatedInputHandle,
    pub session: Arc<SimulatedSession>,
    pub permissions: Arc<SimulatedPermissions>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        let input = SimulatedInput::new();
        let handle = input.handle();
        let session = Arc::new(SimulatedSession::new());
        let permissions = Arc::new(SimulatedPermissions::new(true));

        Self {
            platform: Platform {
                input: Box::new(input),
                session: session.clone(),
                permissions: permissions.clone(),
            },
            input: handle,
            session,
            permissions,
        }
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}
