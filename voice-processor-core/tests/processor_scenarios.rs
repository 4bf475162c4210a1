mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::Harness;
use voice_processor_core::simulated::SimulatedPlatform;
use voice_processor_core::{
    CaptureError, EngineState, ProcessorOptions, SessionCategory, VoiceProcessor,
};

const SETTLE: Duration = Duration::from_secs(2);

fn assert_contiguous(frames: &[Vec<i16>]) {
    for pair in frames.windows(2) {
        let last = *pair[0].last().unwrap();
        assert_eq!(pair[1][0], last.wrapping_add(1), "gap between consecutive frames");
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn start_delivers_frames_of_requested_length() {
    let h = Harness::new();
    let started = Instant::now();
    h.processor.start(512, 16000).unwrap();

    assert!(h.processor.is_recording());
    assert_eq!(h.processor.state(), EngineState::Running);

    // 512 samples at 16 kHz is 32 ms of audio; the first frame must follow
    // within 200 ms of start.
    let first = h.frames.recv_timeout(Duration::from_millis(200)).unwrap();
    assert_eq!(first.len(), 512);
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(first[0], 0);

    h.processor.stop().unwrap();
    assert!(!h.processor.is_recording());
}

#[test]
fn frames_keep_their_shape_across_packet_boundaries() {
    let h = Harness::new();
    // 100-sample frames out of 160-sample hardware packets.
    h.processor.start(100, 16000).unwrap();

    let frames = h.collect_frames(40, SETTLE);
    h.processor.stop().unwrap();

    assert_eq!(frames.len(), 40);
    assert!(frames.iter().all(|f| f.len() == 100));
    assert_contiguous(&frames);
}

#[test]
fn second_start_is_a_no_op() {
    let h = Harness::new();
    h.processor.start(512, 16000).unwrap();
    h.processor.start(512, 16000).unwrap();

    assert_eq!(h.input.queues_opened(), 1);
    assert_eq!(h.input.active_queues(), 1);
    assert_eq!(h.session.activations(), 1);

    // A differing config while running is ignored, not applied.
    h.processor.start(256, 8000).unwrap();
    assert_eq!(h.input.queues_opened(), 1);
    assert_eq!(h.processor.config().unwrap().frame_length, 512);

    h.processor.stop().unwrap();
}

#[test]
fn stop_when_idle_touches_nothing() {
    let h = Harness::new();
    h.processor.stop().unwrap();
    h.processor.stop().unwrap();

    assert_eq!(h.session.calls(), 0);
    assert_eq!(h.input.queues_opened(), 0);
    assert!(h.errors.try_recv().is_err());
}

#[test]
fn denied_permission_fails_before_session_is_touched() {
    let h = Harness::new();
    h.permissions.set_granted(false);

    let err = h.processor.start(512, 16000).unwrap_err();
    assert_eq!(err, CaptureError::PermissionDenied);
    assert_eq!(h.session.calls(), 0);
    assert_eq!(h.input.queues_opened(), 0);
    assert!(!h.processor.is_recording());
    assert_eq!(h.processor.state(), EngineState::Idle);
}

#[test]
fn invalid_arguments_are_rejected_before_any_allocation() {
    let h = Harness::new();

    for (frame_length, sample_rate) in [(0, 16000), (512, 0), (u32::MAX, 16000)] {
        let err = h.processor.start(frame_length, sample_rate).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidArgument(_)));
        assert_eq!(err.code(), "PV_INVALID_ARGUMENT");
    }
    assert_eq!(h.session.calls(), 0);
    assert_eq!(h.input.queues_opened(), 0);
    assert_eq!(h.processor.allocated_buffers(), 0);
}

#[test]
fn drift_is_reported_once_per_run() {
    let h = Harness::new();
    h.processor.start(160, 16000).unwrap();
    assert_eq!(h.session.category(), SessionCategory::PlayAndRecord);
    assert!(h.errors.recv_timeout(Duration::from_millis(250)).is_err());

    h.session.force_category(SessionCategory::Record);
    let message = h.errors.recv_timeout(Duration::from_millis(500)).unwrap();
    assert!(message.contains("audio settings have changed"), "{}", message);

    assert_eq!(
        h.errors.recv_timeout(Duration::from_millis(350)),
        Err(RecvTimeoutError::Timeout)
    );
    assert!(h.processor.diagnostics().drift_reported);
    assert!(h.processor.is_recording());
    h.processor.stop().unwrap();

    // The next run starts from a clean slate and reports again.
    h.processor.start(160, 16000).unwrap();
    assert!(!h.processor.diagnostics().drift_reported);
    assert!(h.errors.recv_timeout(Duration::from_millis(250)).is_err());

    h.session.force_route(Some("bluetooth-headset".into()));
    assert!(h.errors.recv_timeout(Duration::from_millis(500)).is_ok());
    assert!(h.errors.recv_timeout(Duration::from_millis(350)).is_err());
    h.processor.stop().unwrap();
}

#[test]
fn drift_is_detected_within_one_interval_of_a_slow_monitor() {
    let h = Harness::with_options(ProcessorOptions {
        monitor_interval: Duration::from_millis(300),
        ..ProcessorOptions::default()
    });
    h.processor.start(160, 16000).unwrap();

    h.session.force_category(SessionCategory::Ambient);
    let changed = Instant::now();
    h.errors.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(changed.elapsed() < Duration::from_millis(600));

    h.processor.stop().unwrap();
}

#[test]
fn repeated_cycles_leak_no_buffers() {
    let h = Harness::new();
    for _ in 0..100 {
        h.processor.start(256, 16000).unwrap();
        assert_eq!(h.processor.allocated_buffers(), 3);
        h.processor.stop().unwrap();
        assert_eq!(h.processor.allocated_buffers(), 0);
    }

    assert_eq!(h.input.queues_opened(), 100);
    assert_eq!(h.input.active_queues(), 0);
    assert_eq!(h.session.activations(), 100);
    assert_eq!(h.session.deactivations(), 100);
}

#[test]
fn failed_engine_start_rolls_back_session() {
    let h = Harness::new();
    h.input.set_fail_start(true);

    let err = h.processor.start(512, 16000).unwrap_err();
    assert!(matches!(err, CaptureError::EngineStart(_)));
    assert_eq!(err.code(), "PV_AUDIO_RECORDER_ERROR");
    assert_eq!(h.session.activations(), 1);
    assert_eq!(h.session.deactivations(), 1);
    assert!(!h.session.is_active());
    assert_eq!(h.processor.state(), EngineState::Idle);
    assert_eq!(h.processor.allocated_buffers(), 0);
    assert_eq!(h.input.active_queues(), 0);

    h.input.set_fail_start(false);
    h.processor.start(512, 16000).unwrap();
    assert!(h.processor.is_recording());
    h.processor.stop().unwrap();
}

#[test]
fn failed_open_rolls_back_session() {
    let h = Harness::new();
    h.input.set_fail_open(true);

    let err = h.processor.start(512, 16000).unwrap_err();
    assert!(matches!(err, CaptureError::EngineStart(_)));
    assert!(!h.session.is_active());
    assert_eq!(h.input.queues_opened(), 0);
    assert!(!h.processor.is_recording());
}

#[test]
fn missing_input_device_rolls_back_session() {
    let h = Harness::new();
    h.input.set_unplugged(true);

    let err = h.processor.start(512, 16000).unwrap_err();
    assert!(matches!(err, CaptureError::EngineStart(_)));
    assert_eq!(h.input.queues_opened(), 0);
    assert_eq!(h.session.deactivations(), 1);
    assert!(!h.session.is_active());
    assert_eq!(h.processor.allocated_buffers(), 0);
}

#[test]
fn refused_activation_restores_previous_category() {
    let h = Harness::new();
    assert_eq!(h.session.category(), SessionCategory::SoloAmbient);
    h.session.set_fail_activation(true);

    let err = h.processor.start(512, 16000).unwrap_err();
    assert!(matches!(err, CaptureError::SessionConfiguration(_)));
    assert_eq!(h.session.category(), SessionCategory::SoloAmbient);
    assert!(!h.session.is_active());
    assert_eq!(h.input.queues_opened(), 0);
    assert_eq!(h.processor.state(), EngineState::Idle);

    h.session.set_fail_activation(false);
    h.processor.start(512, 16000).unwrap();
    assert_eq!(h.session.category(), SessionCategory::PlayAndRecord);
    h.processor.stop().unwrap();
}

#[test]
fn rejected_category_fails_without_activation() {
    let h = Harness::new();
    h.session.set_fail_category(true);

    let err = h.processor.start(512, 16000).unwrap_err();
    assert!(matches!(err, CaptureError::SessionConfiguration(_)));
    assert_eq!(h.session.activations(), 0);
    assert_eq!(h.input.queues_opened(), 0);
}

#[test]
fn session_is_configured_for_play_and_record() {
    let h = Harness::new();
    h.processor.start(512, 16000).unwrap();

    let options = h.session.options().unwrap();
    assert!(options.mix_with_others);
    assert!(options.allow_bluetooth);
    assert!(options.default_to_speaker);
    assert!(h.session.is_active());

    h.processor.stop().unwrap();
    assert!(!h.session.is_active());
}

#[test]
fn failed_deactivation_still_stops() {
    let h = Harness::new();
    h.processor.start(512, 16000).unwrap();
    h.session.set_fail_deactivation(true);

    let err = h.processor.stop().unwrap_err();
    assert!(matches!(err, CaptureError::Stop(_)));
    assert!(!h.processor.is_recording());
    assert_eq!(h.processor.state(), EngineState::Idle);
    assert_eq!(h.processor.allocated_buffers(), 0);

    let message = h.errors.recv_timeout(Duration::from_millis(500)).unwrap();
    assert!(message.starts_with("unable to stop audio engine"), "{}", message);

    h.session.set_fail_deactivation(false);
    h.processor.start(512, 16000).unwrap();
    h.processor.stop().unwrap();
}

#[test]
fn device_fault_reaches_error_listeners() {
    let h = Harness::new();
    h.processor.start(160, 16000).unwrap();
    h.collect_frames(1, SETTLE);

    h.input.inject_fault("device unplugged");
    let message = h.errors.recv_timeout(SETTLE).unwrap();
    assert_eq!(
        message,
        "PV_AUDIO_RECORDER_ERROR: audio device fault: device unplugged"
    );

    h.processor.stop().unwrap();
    assert_eq!(h.processor.allocated_buffers(), 0);
}

#[test]
fn diagnostics_track_the_run() {
    let h = Harness::new();
    assert_eq!(h.processor.diagnostics().run_id, None);

    h.processor.start(160, 16000).unwrap();
    let frames = h.collect_frames(10, SETTLE);
    assert_eq!(frames.len(), 10);
    assert_contiguous(&frames);

    let first = h.processor.diagnostics();
    assert!(first.run_id.is_some());
    assert!(first.started_at.is_some());
    assert!(first.frames_delivered >= 10);
    assert_eq!(first.frames_dropped, 0);

    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json["drift_reported"], false);

    h.processor.stop().unwrap();
    h.processor.start(160, 16000).unwrap();
    let second = h.processor.diagnostics();
    assert_ne!(second.run_id, first.run_id);
    h.processor.stop().unwrap();
}

#[test]
fn slow_listener_drops_newest_frames() {
    let h = Harness::with_options(ProcessorOptions {
        delivery_queue_frames: 2,
        ..ProcessorOptions::default()
    });
    h.processor.add_frame_listener(Arc::new(|_: &[i16]| {
        thread::sleep(Duration::from_millis(50));
    }));

    h.processor.start(160, 16000).unwrap();
    assert!(wait_until(SETTLE, || h.processor.diagnostics().frames_dropped > 0));
    h.processor.stop().unwrap();

    // Whatever reached the listeners is still in capture order.
    let frames: Vec<Vec<i16>> = h.frames.try_iter().collect();
    assert!(!frames.is_empty());
    for pair in frames.windows(2) {
        assert!(pair[1][0].wrapping_sub(pair[0][0]) > 0);
    }
}

#[test]
fn removed_listeners_stay_removed() {
    let h = Harness::new();
    assert_eq!(h.processor.frame_listener_count(), 1);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let id = h.processor.add_frame_listener(Arc::new(move |_: &[i16]| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(h.processor.frame_listener_count(), 2);

    assert!(h.processor.remove_frame_listener(id));
    assert!(!h.processor.remove_frame_listener(id));
    assert_eq!(h.processor.frame_listener_count(), 1);

    h.processor.start(160, 16000).unwrap();
    assert_eq!(h.collect_frames(5, SETTLE).len(), 5);
    h.processor.stop().unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn listener_can_stop_the_processor() {
    common::init_logging();
    let sim = SimulatedPlatform::new();
    let processor = Arc::new(VoiceProcessor::new(sim.platform, ProcessorOptions::default()).unwrap());

    let weak = Arc::downgrade(&processor);
    let stopped = Arc::new(AtomicBool::new(false));
    let stopped_by_listener = Arc::clone(&stopped);
    processor.add_frame_listener(Arc::new(move |_: &[i16]| {
        if stopped_by_listener.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(processor) = weak.upgrade() {
            let _ = processor.stop();
        }
    }));

    processor.start(160, 16000).unwrap();
    assert!(wait_until(SETTLE, || !processor.is_recording()));
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(processor.state(), EngineState::Idle);
    assert_eq!(processor.allocated_buffers(), 0);
    assert_eq!(sim.input.active_queues(), 0);
    assert!(!sim.session.is_active());

    // And it can be started again afterwards.
    processor.start(160, 16000).unwrap();
    assert!(processor.is_recording());
    processor.stop().unwrap();
}

#[test]
fn listeners_can_read_status_while_stop_joins_them() {
    common::init_logging();
    let sim = SimulatedPlatform::new();
    let processor = Arc::new(VoiceProcessor::new(sim.platform, ProcessorOptions::default()).unwrap());

    let weak = Arc::downgrade(&processor);
    let reads = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&reads);
    processor.add_frame_listener(Arc::new(move |_: &[i16]| {
        thread::sleep(Duration::from_millis(5));
        if let Some(processor) = weak.upgrade() {
            let _ = processor.diagnostics();
            let _ = processor.state();
            let _ = processor.config();
            let _ = processor.allocated_buffers();
            counted.fetch_add(1, Ordering::SeqCst);
        }
    }));

    processor.start(160, 16000).unwrap();
    assert!(wait_until(SETTLE, || reads.load(Ordering::SeqCst) >= 3));

    let (done_tx, done) = mpsc::channel();
    let stopper = Arc::clone(&processor);
    thread::spawn(move || {
        let _ = done_tx.send(stopper.stop());
    });

    let outcome = done
        .recv_timeout(Duration::from_secs(3))
        .expect("stop blocked on a listener reading diagnostics");
    assert!(outcome.is_ok());
    assert_eq!(processor.state(), EngineState::Idle);
    assert_eq!(processor.allocated_buffers(), 0);
    assert_eq!(sim.input.active_queues(), 0);
}
