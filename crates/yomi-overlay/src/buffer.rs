use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use yomi_types::FuriganaInfo;

#[derive(Debug, Default)]
struct Slots {
    buffers: [Vec<FuriganaInfo>; 2],
    front: usize,
}

/// Single-writer/single-reader mailbox between the pipeline and the render loop
///
/// The writer fills the back slot and flips `front` inside one critical
/// section, the reader copies the front slot under the same lock.
#[derive(Debug, Default)]
pub struct FuriganaBuffer {
    slots: Mutex<Slots>,
    updated: AtomicBool,
}

impl FuriganaBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, furigana: Vec<FuriganaInfo>) {
        let mut slots = self.lock();
        let back = 1 - slots.front;
        slots.buffers[back] = furigana;
        slots.front = back;
        self.updated.store(true, Ordering::Release);
    }

    /// Copy of the front slot if it changed since the last call
    pub fn take_if_updated(&self) -> Option<Vec<FuriganaInfo>> {
        if !self.updated.swap(false, Ordering::AcqRel) {
            return None;
        }
        Some(self.snapshot())
    }

    pub fn snapshot(&self) -> Vec<FuriganaInfo> {
        let slots = self.lock();
        slots.buffers[slots.front].clone()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
