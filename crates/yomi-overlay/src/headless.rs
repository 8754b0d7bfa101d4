use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use yomi_core::{OverlayError, OverlaySurface};
use yomi_types::{FuriganaInfo, Rect};

#[derive(Debug, Default)]
struct State {
    bounds: Option<Rect>,
    draw_count: u64,
    last_drawn: Vec<FuriganaInfo>,
    close_requested: bool,
    destroyed: bool,
    fail_create: bool,
}

/// Surface without a native window
///
/// Logs furigana changes and records what was drawn. Clones share state, so
/// a clone kept outside the render thread can inspect or close it.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<State>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface whose `create` always fails
    pub fn failing() -> Self {
        let surface = Self::default();
        surface.lock().fail_create = true;
        surface
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.lock().bounds
    }

    pub fn draw_count(&self) -> u64 {
        self.lock().draw_count
    }

    pub fn last_drawn(&self) -> Vec<FuriganaInfo> {
        self.lock().last_drawn.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Behave like the user closed the window
    pub fn request_close(&self) {
        self.lock().close_requested = true;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OverlaySurface for HeadlessSurface {
    fn create(&mut self, bounds: Rect) -> Result<(), OverlayError> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(OverlayError::CreateFailed("headless surface set to fail".into()));
        }
        tracing::debug!("[OVERLAY] Headless surface at {:?}", bounds);
        state.bounds = Some(bounds);
        state.destroyed = false;
        state.close_requested = false;
        Ok(())
    }

    fn process_messages(&mut self) -> bool {
        !self.lock().close_requested
    }

    fn draw(&mut self, furigana: &[FuriganaInfo]) {
        let mut state = self.lock();
        state.draw_count += 1;
        if state.last_drawn.as_slice() != furigana {
            for item in furigana.iter().filter(|item| item.needs_ruby) {
                tracing::debug!(
                    "[OVERLAY] {}({}) at ({}, {})",
                    item.base_text,
                    item.reading,
                    item.ruby_position.x,
                    item.ruby_position.y
                );
            }
            state.last_drawn = furigana.to_vec();
        }
    }

    fn destroy(&mut self) {
        let mut state = self.lock();
        state.destroyed = true;
        state.bounds = None;
    }
}
