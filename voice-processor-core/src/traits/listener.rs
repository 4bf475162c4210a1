use std::sync::Arc;

/// Receives each captured frame, in capture order.
///
/// Called from the frame delivery thread, never from the hardware thread.
/// The slice is only valid for the duration of the call.
pub type FrameListener = Arc<dyn Fn(&[i16]) + Send + Sync + 'static>;

/// Receives human-readable error notifications: settings drift, device
/// faults and failed stops.
///
/// Called from whichever thread detected the error. Implementations should
/// marshal to their own thread before calling back into the processor.
pub type ErrorListener = Arc<dyn Fn(&str) + Send + Sync + 'static>;
