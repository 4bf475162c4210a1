use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::SessionSnapshot;
use crate::models::error::CaptureError;
use crate::traits::audio_session::AudioSession;

/// Receives the single drift error raised per run.
pub type DriftCallback = Arc<dyn Fn(CaptureError) + Send + Sync + 'static>;

/// Monitor state. Guarded by one mutex shared by the polling thread and
/// the controller's start/stop.
#[derive(Debug, Default)]
struct MonitorState {
    expected: Option<SessionSnapshot>,
    reported: bool,
    active: bool,
}

struct MonitorShared {
    state: Mutex<MonitorState>,
    wake: Condvar,
}

/// Watchdog polling the audio session for configuration drift.
///
/// While active it compares the live session snapshot against the one
/// taken at start every `interval`, and reports the first mismatch of a
/// run exactly once.
pub struct SessionMonitor {
    session: Arc<dyn AudioSession>,
    interval: Duration,
    shared: Arc<MonitorShared>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SessionMonitor {
    pub fn new(session: Arc<dyn AudioSession>, interval: Duration) -> Self {
        Self {
            session,
            interval,
            shared: Arc::new(MonitorShared {
                state: Mutex::new(MonitorState::default()),
                wake: Condvar::new(),
            }),
            handle: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// Whether drift has been reported since the last start.
    pub fn has_reported(&self) -> bool {
        self.shared.state.lock().reported
    }

    /// Arm the monitor with the snapshot to hold the session to and start
    /// polling. Restarts cleanly if already running.
    pub fn start(
        &mut self,
        expected: SessionSnapshot,
        on_drift: DriftCallback,
    ) -> Result<(), CaptureError> {
        self.stop();

        {
            let mut state = self.shared.state.lock();
            state.expected = Some(expected);
            state.reported = false;
            state.active = true;
        }

        let shared = Arc::clone(&self.shared);
        let session = Arc::clone(&self.session);
        let interval = self.interval;

        let spawned = thread::Builder::new()
            .name("session-monitor".into())
            .spawn(move || Self::run(&shared, session.as_ref(), interval, on_drift.as_ref()));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.disarm();
                Err(CaptureError::EngineStart(format!(
                    "failed to spawn session monitor: {}",
                    e
                )))
            }
        }
    }

    /// Cancel polling and clear the reported flag.
    pub fn stop(&mut self) {
        self.disarm();

        if let Some(handle) = self.handle.take() {
            // A drift listener may call stop from the monitor thread itself.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("session monitor thread panicked");
            }
        }
    }

    /// Run one check now. Returns `true` if this call reported drift.
    pub fn check_now(&self, on_drift: &dyn Fn(CaptureError)) -> bool {
        Self::check(&self.shared, self.session.as_ref(), on_drift)
    }

    fn disarm(&self) {
        let mut state = self.shared.state.lock();
        state.active = false;
        state.reported = false;
        state.expected = None;
        self.shared.wake.notify_all();
    }

    fn run(
        shared: &MonitorShared,
        session: &dyn AudioSession,
        interval: Duration,
        on_drift: &(dyn Fn(CaptureError) + Send + Sync),
    ) {
        loop {
            {
                let mut state = shared.state.lock();
                if !state.active {
                    break;
                }
                shared.wake.wait_for(&mut state, interval);
                if !state.active {
                    break;
                }
            }
            Self::check(shared, session, on_drift);
        }
        log::debug!("session monitor exited");
    }

    fn check(shared: &MonitorShared, session: &dyn AudioSession, on_drift: &dyn Fn(CaptureError)) -> bool {
        // Query the platform outside the lock; the guarded section stays O(1).
        let live = session.snapshot();

        let drift = {
            let mut state = shared.state.lock();
            if !state.active || state.reported {
                return false;
            }
            let Some(expected) = state.expected.as_ref() else {
                return false;
            };
            if *expected == live {
                return false;
            }
            let drift = CaptureError::SettingsDrift(format!(
                "audio settings have changed and microphone audio is no longer being received \
                 (expected {:?}, found {:?})",
                expected, live
            ));
            state.reported = true;
            drift
        };

        log::warn!("{}", drift);
        on_drift(drift);
        true
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
