mod common;

use std::sync::mpsc;
use std::time::Duration;

use serde_json::json;

use common::Harness;
use voice_processor_core::{handle_method_call, MethodCall, MethodResult, VoiceProcessor};

fn call(processor: &VoiceProcessor, method: &str, arguments: serde_json::Value) -> MethodResult {
    let (tx, rx) = mpsc::channel();
    handle_method_call(
        processor,
        MethodCall::new(method, arguments),
        Box::new(move |result| {
            let _ = tx.send(result);
        }),
    );
    let result = rx
        .recv_timeout(Duration::from_secs(1))
        .expect("every method call gets a reply");
    assert!(rx.try_recv().is_err(), "method call replied more than once");
    result
}

#[test]
fn start_and_stop_through_the_bridge() {
    let h = Harness::new();
    let p = &h.processor;

    assert_eq!(call(p, "isRecording", json!(null)), MethodResult::Success(json!(false)));
    assert_eq!(
        call(p, "start", json!({"frameLength": 512, "sampleRate": 16000})),
        MethodResult::Success(json!(true))
    );
    assert_eq!(call(p, "isRecording", json!(null)), MethodResult::Success(json!(true)));
    assert_eq!(h.collect_frames(1, Duration::from_secs(2))[0].len(), 512);

    assert_eq!(call(p, "stop", json!(null)), MethodResult::Success(json!(true)));
    assert_eq!(call(p, "stop", json!(null)), MethodResult::Success(json!(true)));
    assert_eq!(call(p, "isRecording", json!(null)), MethodResult::Success(json!(false)));
}

#[test]
fn bad_start_arguments_reply_with_invalid_argument() {
    let h = Harness::new();

    for arguments in [
        json!({}),
        json!({"frameLength": 512}),
        json!({"frameLength": "512", "sampleRate": 16000}),
        json!({"frameLength": 0, "sampleRate": 16000}),
    ] {
        match call(&h.processor, "start", arguments) {
            MethodResult::Error { code, message } => {
                assert_eq!(code, "PV_INVALID_ARGUMENT");
                assert!(
                    message.contains("VoiceProcessor.start") || message.contains("frameLength"),
                    "{}",
                    message
                );
            }
            other => panic!("expected an error, got {:?}", other),
        }
    }
    assert_eq!(h.session.calls(), 0);
}

#[test]
fn start_failures_reply_with_recorder_error() {
    let h = Harness::new();
    h.permissions.set_granted(false);

    assert_eq!(
        call(&h.processor, "start", json!({"frameLength": 512, "sampleRate": 16000})),
        MethodResult::Error {
            code: "PV_AUDIO_RECORDER_ERROR".into(),
            message: "record audio permission denied".into(),
        }
    );
}

#[test]
fn permission_methods_reply() {
    let h = Harness::new();
    assert_eq!(
        call(&h.processor, "hasRecordAudioPermission", json!(null)),
        MethodResult::Success(json!(true))
    );

    h.permissions.set_granted(false);
    h.permissions.set_grant_on_request(false);
    assert_eq!(
        call(&h.processor, "requestRecordAudioPermission", json!(null)),
        MethodResult::Success(json!(false))
    );

    h.permissions.set_grant_on_request(true);
    assert_eq!(
        call(&h.processor, "requestRecordAudioPermission", json!(null)),
        MethodResult::Success(json!(true))
    );
    assert_eq!(h.permissions.requests(), 2);
    assert_eq!(
        call(&h.processor, "hasRecordAudioPermission", json!(null)),
        MethodResult::Success(json!(true))
    );
}

#[test]
fn unknown_methods_reply_not_implemented() {
    let h = Harness::new();
    for method in ["hasRecordAudioPermissions", "pause", ""] {
        assert_eq!(call(&h.processor, method, json!(null)), MethodResult::NotImplemented);
    }
}
