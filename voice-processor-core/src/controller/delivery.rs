use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};

use super::listeners::Listeners;
use crate::models::error::CaptureError;
use crate::processing::frame_pool::zeroed_samples;

/// How long the delivery thread sleeps when no frame has arrived.
const IDLE_PARK: Duration = Duration::from_millis(10);

type FrameBuffer = Box<[i16]>;

/// Counters shared by the hardware side, the delivery thread and the controller.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    pub frames_delivered: AtomicU64,
    pub frames_dropped: AtomicU64,
}

impl DeliveryStats {
    pub fn reset(&self) {
        self.frames_delivered.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
    }
}

/// Hardware-thread half of the delivery hop.
///
/// Copies each frame into a preallocated buffer taken from the free ring and
/// pushes it to the delivery thread. Lock-free and allocation-free; if every
/// buffer is waiting for delivery the frame is dropped and counted.
pub struct FrameSender {
    free: Consumer<FrameBuffer>,
    filled: Producer<FrameBuffer>,
    stats: Arc<DeliveryStats>,
    delivery_thread: thread::Thread,
}

impl FrameSender {
    pub fn send(&mut self, frame: &[i16]) {
        let Ok(mut buffer) = self.free.pop() else {
            self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let n = frame.len().min(buffer.len());
        buffer[..n].copy_from_slice(&frame[..n]);

        // Both rings have one slot per buffer, so the filled ring always has room.
        if self.filled.push(buffer).is_err() {
            self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.delivery_thread.unpark();
    }
}

/// Delivery thread forwarding frames to listeners in capture order.
pub struct FrameDelivery {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameDelivery {
    /// Spawn the delivery thread with `capacity` preallocated frames of
    /// `frame_length` samples.
    pub fn spawn(
        frame_length: usize,
        capacity: usize,
        listeners: Arc<Listeners>,
        stats: Arc<DeliveryStats>,
    ) -> Result<(Self, FrameSender), CaptureError> {
        let (mut free_tx, free_rx) = RingBuffer::<FrameBuffer>::new(capacity);
        let (filled_tx, filled_rx) = RingBuffer::<FrameBuffer>::new(capacity);
        for _ in 0..capacity {
            if free_tx.push(zeroed_samples(frame_length)?).is_err() {
                break;
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let thread_stats = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name("frame-delivery".into())
            .spawn(move || {
                Self::run(&thread_running, filled_rx, free_tx, &listeners, &thread_stats)
            })
            .map_err(|e| {
                CaptureError::EngineStart(format!("failed to spawn frame delivery thread: {}", e))
            })?;

        let sender = FrameSender {
            free: free_rx,
            filled: filled_tx,
            stats,
            delivery_thread: handle.thread().clone(),
        };

        Ok((
            Self {
                running,
                handle: Some(handle),
            },
            sender,
        ))
    }

    /// Deliver whatever is still queued, then end the thread.
    ///
    /// Call after the hardware side has stopped producing.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return;
        };
        handle.thread().unpark();

        // A frame listener may stop the processor from the delivery thread.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            log::error!("frame delivery thread panicked");
        }
    }

    fn run(
        running: &AtomicBool,
        mut filled: Consumer<FrameBuffer>,
        mut free: Producer<FrameBuffer>,
        listeners: &Listeners,
        stats: &DeliveryStats,
    ) {
        loop {
            let keep_running = running.load(Ordering::SeqCst);

            while let Ok(buffer) = filled.pop() {
                listeners.deliver_frame(&buffer);
                stats.frames_delivered.fetch_add(1, Ordering::Relaxed);
                let _ = free.push(buffer);
            }

            if !keep_running {
                break;
            }
            thread::park_timeout(IDLE_PARK);
        }
        log::debug!("frame delivery exited");
    }
}

impl Drop for FrameDelivery {
    fn drop(&mut self) {
        self.shutdown();
    }
}
