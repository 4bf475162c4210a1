use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::delivery::{DeliveryStats, FrameDelivery};
use super::listeners::{ListenerId, Listeners};
use crate::engine::input_engine::InputEngine;
use crate::models::audio_models::{ProcessorDiagnostics, SessionSnapshot};
use crate::models::config::{CaptureConfig, ProcessorOptions};
use crate::models::error::{CaptureError, AUDIO_RECORDER_ERROR_CODE};
use crate::models::state::EngineState;
use crate::monitor::session_monitor::{DriftCallback, SessionMonitor};
use crate::processing::frame_pool::FramePool;
use crate::traits::audio_session::AudioSession;
use crate::traits::input_backend::{FaultCallback, InputBackend};
use crate::traits::listener::{ErrorListener, FrameListener};
use crate::traits::permissions::{PermissionCallback, PermissionProvider};

static SHARED: OnceLock<VoiceProcessor> = OnceLock::new();

/// The platform services a processor is built on.
pub struct Platform {
    pub input: Box<dyn InputBackend>,
    pub session: Arc<dyn AudioSession>,
    pub permissions: Arc<dyn PermissionProvider>,
}

/// The running parts. Locked for the whole of `start` and `stop`, including
/// the thread joins in `stop`.
struct Lifecycle {
    engine: InputEngine,
    monitor: SessionMonitor,
    delivery: Option<FrameDelivery>,
}

/// What the accessors report. Only ever locked briefly, never across a join,
/// so listeners running on the joined threads can read it.
#[derive(Default)]
struct Status {
    state: EngineState,
    config: Option<CaptureConfig>,
    run_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
}

/// Voice capture controller.
///
/// Coordinates the audio session, the input engine, the session monitor
/// and frame delivery:
/// ```text
/// [InputBackend] → [InputEngine] → [FrameSender] ─rtrb→ [delivery thread] → frame listeners
/// [AudioSession] ← [SessionMonitor] ──────────────────────────────────────→ error listeners
/// ```
///
/// `start` and `stop` are idempotent and serialized by one lock; `stop` is
/// synchronous and returns only after capture has fully ceased. Accessors
/// never wait on that lock and are safe to call from any listener. Listeners
/// must not call `start`/`stop` while another thread is in the middle of
/// one; calling `stop` from a listener when nothing else is stopping is fine.
pub struct VoiceProcessor {
    options: ProcessorOptions,
    session: Arc<dyn AudioSession>,
    permissions: Arc<dyn PermissionProvider>,
    listeners: Arc<Listeners>,
    stats: Arc<DeliveryStats>,
    drift_reported: Arc<AtomicBool>,
    recording: AtomicBool,
    buffers: FramePool,
    status: Mutex<Status>,
    lifecycle: Mutex<Lifecycle>,
}

impl std::fmt::Debug for VoiceProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceProcessor")
            .field("options", &self.options)
            .field("recording", &self.recording.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl VoiceProcessor {
    pub fn new(platform: Platform, options: ProcessorOptions) -> Result<Self, CaptureError> {
        options.validate()?;

        let engine = InputEngine::new(platform.input, options.num_buffers);
        let monitor = SessionMonitor::new(Arc::clone(&platform.session), options.monitor_interval);
        let buffers = engine.pool().clone();

        Ok(Self {
            options,
            session: platform.session,
            permissions: platform.permissions,
            listeners: Arc::new(Listeners::new()),
            stats: Arc::new(DeliveryStats::default()),
            drift_reported: Arc::new(AtomicBool::new(false)),
            recording: AtomicBool::new(false),
            buffers,
            status: Mutex::new(Status::default()),
            lifecycle: Mutex::new(Lifecycle {
                engine,
                monitor,
                delivery: None,
            }),
        })
    }

    /// Install the process-wide processor.
    ///
    /// The shared instance lives until the process exits; removing its last
    /// listener does not stop or destroy it. Fails with `AlreadyInstalled`
    /// if one exists, leaving the existing instance untouched.
    pub fn install(
        platform: Platform,
        options: ProcessorOptions,
    ) -> Result<&'static VoiceProcessor, CaptureError> {
        if SHARED.get().is_some() {
            return Err(CaptureError::AlreadyInstalled);
        }
        let processor = Self::new(platform, options)?;

        let mut installed = false;
        let shared = SHARED.get_or_init(|| {
            installed = true;
            processor
        });
        if installed {
            log::info!("voice processor installed");
            Ok(shared)
        } else {
            Err(CaptureError::AlreadyInstalled)
        }
    }

    /// The process-wide processor, if installed.
    pub fn shared() -> Option<&'static VoiceProcessor> {
        SHARED.get()
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Start capturing `frame_length`-sample frames at `sample_rate` Hz.
    ///
    /// Returns immediately with success if already recording. Otherwise
    /// validates the arguments, checks permission, configures and activates
    /// the session, then starts the engine and the monitor. Any failure
    /// after activation deactivates the session again before returning.
    pub fn start(&self, frame_length: u32, sample_rate: u32) -> Result<(), CaptureError> {
        let config = CaptureConfig::new(frame_length, sample_rate);
        config.validate()?;

        let mut lifecycle = self.lifecycle.lock();
        {
            let status = self.status.lock();
            if status.state.is_running() {
                if status.config != Some(config) {
                    log::warn!(
                        "already recording with {:?}; ignoring start with {:?}",
                        status.config,
                        config
                    );
                } else {
                    log::debug!("audio engine already running");
                }
                return Ok(());
            }
        }

        if !self.permissions.has_record_permission() {
            log::warn!("record audio permission denied");
            return Err(CaptureError::PermissionDenied);
        }

        self.status.lock().state = EngineState::Starting;
        match self.start_locked(&mut lifecycle, config) {
            Ok(()) => {
                let run_id = Uuid::new_v4();
                {
                    let mut status = self.status.lock();
                    status.state = EngineState::Running;
                    status.config = Some(config);
                    status.run_id = Some(run_id);
                    status.started_at = Some(Utc::now());
                }
                self.recording.store(true, Ordering::SeqCst);
                log::info!(
                    "voice processor started (run {}): {} samples/frame at {} Hz",
                    run_id,
                    frame_length,
                    sample_rate
                );
                Ok(())
            }
            Err(e) => {
                self.status.lock().state = EngineState::Idle;
                log::error!("unable to start voice processor: {}", e);
                Err(e)
            }
        }
    }

    /// Stop capturing and deactivate the session.
    ///
    /// A no-op success if not recording. If deactivation fails the error is
    /// returned and sent to error listeners, but the processor still ends
    /// up idle and can be started again.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let mut lifecycle = self.lifecycle.lock();
        {
            let mut status = self.status.lock();
            if !status.state.is_running() {
                log::debug!("voice processor not running");
                return Ok(());
            }
            status.state = EngineState::Stopping;
        }
        self.recording.store(false, Ordering::SeqCst);

        // Joins the threads listeners run on; `status` stays unlocked meanwhile.
        lifecycle.monitor.stop();
        lifecycle.engine.stop();
        if let Some(delivery) = lifecycle.delivery.take() {
            delivery.stop();
        }

        let deactivated = self.session.set_active(false, true);
        {
            let mut status = self.status.lock();
            status.state = EngineState::Idle;
            status.config = None;
        }
        drop(lifecycle);

        match deactivated {
            Ok(()) => {
                log::info!("voice processor stopped");
                Ok(())
            }
            Err(reason) => {
                let err = CaptureError::Stop(reason);
                log::error!("{}", err);
                self.listeners.deliver_error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Whether frames are being captured. Reflects the engine, not the session.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> EngineState {
        self.status.lock().state
    }

    /// Configuration of the running capture, if any.
    pub fn config(&self) -> Option<CaptureConfig> {
        self.status.lock().config
    }

    /// Buffers currently held by the input engine's pool.
    pub fn allocated_buffers(&self) -> usize {
        self.buffers.outstanding()
    }

    pub fn has_record_permission(&self) -> bool {
        self.permissions.has_record_permission()
    }

    pub fn request_record_permission(&self, callback: PermissionCallback) {
        self.permissions.request_record_permission(callback);
    }

    pub fn add_frame_listener(&self, listener: FrameListener) -> ListenerId {
        self.listeners.add_frame(listener)
    }

    pub fn remove_frame_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove_frame(id)
    }

    pub fn add_error_listener(&self, listener: ErrorListener) -> ListenerId {
        self.listeners.add_error(listener)
    }

    pub fn remove_error_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove_error(id)
    }

    pub fn frame_listener_count(&self) -> usize {
        self.listeners.frame_count()
    }

    pub fn error_listener_count(&self) -> usize {
        self.listeners.error_count()
    }

    pub fn diagnostics(&self) -> ProcessorDiagnostics {
        let status = self.status.lock();
        ProcessorDiagnostics {
            run_id: status.run_id.map(|id| id.to_string()),
            started_at: status.started_at.map(|t| t.to_rfc3339()),
            frames_delivered: self.stats.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
            drift_reported: self.drift_reported.load(Ordering::SeqCst),
        }
    }

    // --- Internal helpers ---

    fn start_locked(
        &self,
        lifecycle: &mut Lifecycle,
        config: CaptureConfig,
    ) -> Result<(), CaptureError> {
        let previous = self.session.snapshot();
        self.session
            .set_category(&self.options.session_category, self.options.session_options)
            .map_err(CaptureError::SessionConfiguration)?;
        if let Err(reason) = self.session.set_active(true, false) {
            self.restore_category(&previous);
            return Err(CaptureError::SessionConfiguration(reason));
        }

        let expected = self.session.snapshot();
        if let Err(e) = self.start_capture(lifecycle, config, expected) {
            if let Err(reason) = self.session.set_active(false, true) {
                log::warn!("failed to deactivate session after failed start: {}", reason);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Best-effort undo of `set_category` when activation fails.
    fn restore_category(&self, previous: &SessionSnapshot) {
        if previous.category == self.options.session_category {
            return;
        }
        match self
            .session
            .set_category(&previous.category, self.options.session_options)
        {
            Ok(()) => log::info!("session category restored to {:?}", previous.category),
            Err(reason) => log::warn!(
                "session left in {:?}, unable to restore {:?}: {}",
                self.options.session_category,
                previous.category,
                reason
            ),
        }
    }

    fn start_capture(
        &self,
        lifecycle: &mut Lifecycle,
        config: CaptureConfig,
        expected: SessionSnapshot,
    ) -> Result<(), CaptureError> {
        self.stats.reset();
        self.drift_reported.store(false, Ordering::SeqCst);

        let (delivery, mut sender) = FrameDelivery::spawn(
            config.frame_length as usize,
            self.options.delivery_queue_frames,
            Arc::clone(&self.listeners),
            Arc::clone(&self.stats),
        )?;
        lifecycle
            .engine
            .register_frame_callback(Box::new(move |frame: &[i16]| sender.send(frame)));

        let listeners = Arc::clone(&self.listeners);
        let on_fault: FaultCallback = Arc::new(move |err: CaptureError| {
            log::error!("input device fault: {}", err);
            listeners.deliver_error(&format!("{}: {}", AUDIO_RECORDER_ERROR_CODE, err));
        });

        if let Err(e) = lifecycle.engine.start(config, on_fault) {
            delivery.stop();
            return Err(e);
        }

        let listeners = Arc::clone(&self.listeners);
        let drift_reported = Arc::clone(&self.drift_reported);
        let on_drift: DriftCallback = Arc::new(move |err: CaptureError| {
            drift_reported.store(true, Ordering::SeqCst);
            listeners.deliver_error(&err.to_string());
        });

        if let Err(e) = lifecycle.monitor.start(expected, on_drift) {
            lifecycle.engine.stop();
            delivery.stop();
            return Err(e);
        }

        lifecycle.delivery = Some(delivery);
        Ok(())
    }
}

impl Drop for VoiceProcessor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("error stopping voice processor on drop: {}", e);
        }
    }
}
