use serde_json::{json, Value};

use crate::controller::voice_processor::VoiceProcessor;
use crate::models::config::CaptureConfig;
use crate::models::error::{CaptureError, INVALID_ARGUMENT_CODE};

pub const METHOD_START: &str = "start";
pub const METHOD_STOP: &str = "stop";
pub const METHOD_IS_RECORDING: &str = "isRecording";
pub const METHOD_HAS_RECORD_AUDIO_PERMISSION: &str = "hasRecordAudioPermission";
pub const METHOD_REQUEST_RECORD_AUDIO_PERMISSION: &str = "requestRecordAudioPermission";

/// A call arriving from the host-language bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// The single reply every method call receives.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    Success(Value),
    Error { code: String, message: String },
    NotImplemented,
}

impl MethodResult {
    pub fn from_error(err: &CaptureError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    fn from_outcome(outcome: Result<(), CaptureError>) -> Self {
        match outcome {
            Ok(()) => Self::Success(json!(true)),
            Err(e) => Self::from_error(&e),
        }
    }
}

/// Receives the reply to a method call, possibly on another thread.
pub type Reply = Box<dyn FnOnce(MethodResult) + Send + 'static>;

/// Dispatch `call` to `processor`. `reply` is invoked exactly once, for
/// known and unknown methods alike.
pub fn handle_method_call(processor: &VoiceProcessor, call: MethodCall, reply: Reply) {
    log::debug!("method call: {}", call.method);
    match call.method.as_str() {
        METHOD_START => match parse_start_arguments(&call.arguments) {
            Ok(config) => reply(MethodResult::from_outcome(
                processor.start(config.frame_length, config.sample_rate),
            )),
            Err(e) => reply(MethodResult::from_error(&e)),
        },
        METHOD_STOP => reply(MethodResult::from_outcome(processor.stop())),
        METHOD_IS_RECORDING => reply(MethodResult::Success(json!(processor.is_recording()))),
        METHOD_HAS_RECORD_AUDIO_PERMISSION => {
            reply(MethodResult::Success(json!(processor.has_record_permission())))
        }
        METHOD_REQUEST_RECORD_AUDIO_PERMISSION => {
            processor.request_record_permission(Box::new(move |granted| {
                reply(MethodResult::Success(json!(granted)))
            }))
        }
        other => {
            log::warn!("method not implemented: {}", other);
            reply(MethodResult::NotImplemented)
        }
    }
}

/// Parse `{"frameLength": <u32>, "sampleRate": <u32>}`.
///
/// Missing, mistyped or out-of-range values are rejected here, before the
/// processor sees them.
pub fn parse_start_arguments(arguments: &Value) -> Result<CaptureConfig, CaptureError> {
    serde_json::from_value::<CaptureConfig>(arguments.clone()).map_err(|e| {
        log::debug!("{}: {}", INVALID_ARGUMENT_CODE, e);
        CaptureError::InvalidArgument(format!(
            "Invalid argument provided to VoiceProcessor.start: {}",
            e
        ))
    })
}
