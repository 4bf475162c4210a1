use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::traits::listener::{ErrorListener, FrameListener};

/// Handle returned by listener registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registered frame and error listeners.
///
/// Listeners are held as `Arc`s; delivery works on a snapshot so a listener
/// can add or remove listeners from inside its own callback.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    frames: RwLock<Vec<(ListenerId, FrameListener)>>,
    errors: RwLock<Vec<(ListenerId, ErrorListener)>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_frame(&self, listener: FrameListener) -> ListenerId {
        let id = self.next_id();
        self.frames.write().push((id, listener));
        id
    }

    pub fn remove_frame(&self, id: ListenerId) -> bool {
        let mut frames = self.frames.write();
        let before = frames.len();
        frames.retain(|(existing, _)| *existing != id);
        frames.len() != before
    }

    pub fn add_error(&self, listener: ErrorListener) -> ListenerId {
        let id = self.next_id();
        self.errors.write().push((id, listener));
        id
    }

    pub fn remove_error(&self, id: ListenerId) -> bool {
        let mut errors = self.errors.write();
        let before = errors.len();
        errors.retain(|(existing, _)| *existing != id);
        errors.len() != before
    }

    pub fn frame_count(&self) -> usize {
        self.frames.read().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.read().len()
    }

    pub fn deliver_frame(&self, frame: &[i16]) {
        let snapshot: Vec<FrameListener> =
            self.frames.read().iter().map(|(_, l)| l.clone()).collect();
        for listener in snapshot {
            listener(frame);
        }
    }

    pub fn deliver_error(&self, message: &str) {
        let snapshot: Vec<ErrorListener> =
            self.errors.read().iter().map(|(_, l)| l.clone()).collect();
        if snapshot.is_empty() {
            log::debug!("no error listener registered for: {}", message);
        }
        for listener in snapshot {
            listener(message);
        }
    }
}
