use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Epoch value meaning "no session is accepting frames".
const CLOSED: u64 = 0;

/// Single-slot, overwrite-on-arrival mailbox between the capture callback
/// (producer) and the render loop (consumer).
///
/// Frames are accepted only under the epoch that is currently open, so a
/// callback that outlives its session cannot publish into the next one.
pub struct LatestFrame<T> {
    slot: Mutex<Option<Arc<T>>>,
    fresh: AtomicBool,
    epoch: AtomicU64,
    next_epoch: AtomicU64,
}

impl<T> Default for LatestFrame<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
            fresh: AtomicBool::new(false),
            epoch: AtomicU64::new(CLOSED),
            next_epoch: AtomicU64::new(1),
        }
    }
}

impl<T> LatestFrame<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting frames under a new epoch and return it.
    pub fn open(&self) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let _slot = self.slot.lock();
        self.fresh.store(false, Ordering::Release);
        self.epoch.store(epoch, Ordering::Release);
        epoch
    }

    /// Stop accepting frames. The held frame stays readable.
    pub fn close(&self) {
        let _slot = self.slot.lock();
        self.epoch.store(CLOSED, Ordering::Release);
        self.fresh.store(false, Ordering::Release);
    }

    pub fn is_open(&self, epoch: u64) -> bool {
        epoch != CLOSED && self.epoch.load(Ordering::Acquire) == epoch
    }

    /// Replace the held frame and raise the new-frame flag.
    ///
    /// Returns `false`, leaving the slot untouched, when `epoch` is no
    /// longer the open one.
    pub fn publish(&self, epoch: u64, frame: Arc<T>) -> bool {
        let mut slot = self.slot.lock();
        if !self.is_open(epoch) {
            return false;
        }
        *slot = Some(frame);
        self.fresh.store(true, Ordering::Release);
        true
    }

    pub fn has_new_frame(&self) -> bool {
        self.fresh.load(Ordering::Acquire)
    }

    /// Clear the new-frame flag and return the held frame, if any.
    pub fn take_latest(&self) -> Option<Arc<T>> {
        let slot = self.slot.lock();
        self.fresh.store(false, Ordering::Release);
        slot.clone()
    }

    /// Drop the held frame.
    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        self.fresh.store(false, Ordering::Release);
        *slot = None;
    }
}
