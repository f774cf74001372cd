//! Capacity-1, drop-oldest hand-off between a capture thread and the
//! pipeline. A new frame always replaces an unconsumed one, so the consumer
//! only ever sees the freshest frame.

use schema::Frame;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio::sync::Notify;

struct Slot {
    frame: Mutex<Option<Frame>>,
    notify: Notify,
    sender_closed: AtomicBool,
    receiver_closed: AtomicBool,
    displaced: AtomicU64,
}

impl Slot {
    fn take(&self) -> Option<Frame> {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Producer half. Dropping it closes the channel.
pub struct FrameSender {
    slot: Arc<Slot>,
}

/// Consumer half.
pub struct FrameReceiver {
    slot: Arc<Slot>,
}

pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    let slot = Arc::new(Slot {
        frame: Mutex::new(None),
        notify: Notify::new(),
        sender_closed: AtomicBool::new(false),
        receiver_closed: AtomicBool::new(false),
        displaced: AtomicU64::new(0),
    });

    (
        FrameSender { slot: slot.clone() },
        FrameReceiver { slot },
    )
}

impl FrameSender {
    /// Store `frame`, returning the unconsumed frame it replaced.
    pub fn push(&self, frame: Frame) -> Option<Frame> {
        let displaced = self
            .slot
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(frame);

        if let Some(old) = &displaced {
            self.slot.displaced.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(frame_sequence = old.sequence, "Stale frame displaced");
        }

        self.slot.notify.notify_one();
        displaced
    }

    /// True once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.slot.receiver_closed.load(Ordering::Acquire)
    }

    pub fn displaced_count(&self) -> u64 {
        self.slot.displaced.load(Ordering::Relaxed)
    }
}

impl Drop for FrameSender {
    fn drop(&mut self) {
        self.slot.sender_closed.store(true, Ordering::Release);
        self.slot.notify.notify_one();
    }
}

impl FrameReceiver {
    /// Wait for the next frame. Returns `None` once the sender is gone and
    /// the slot is empty.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.slot.take() {
                return Some(frame);
            }
            if self.slot.sender_closed.load(Ordering::Acquire) {
                // A push may have landed between the take and the flag check
                return self.slot.take();
            }
            self.slot.notify.notified().await;
        }
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        self.slot.take()
    }

    /// Frames overwritten before they were consumed.
    pub fn displaced_count(&self) -> u64 {
        self.slot.displaced.load(Ordering::Relaxed)
    }
}

impl Drop for FrameReceiver {
    fn drop(&mut self) {
        self.slot.receiver_closed.store(true, Ordering::Release);
    }
}
