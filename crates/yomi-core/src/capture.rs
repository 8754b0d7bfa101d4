use yomi_types::{CaptureTarget, Frame, Point, Rect};

use crate::error::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Mirrors composed screen pixels of a whole output, bounded wait
    Duplication,
    /// Copies a single window's content
    Blit,
}

impl BackendKind {
    pub fn other(self) -> Self {
        match self {
            BackendKind::Duplication => BackendKind::Blit,
            BackendKind::Blit => BackendKind::Duplication,
        }
    }

    /// Backend order to try for a target
    ///
    /// Duplication grabs the whole monitor, so a real window goes through the
    /// blit path first.
    pub fn preference(target: CaptureTarget) -> [BackendKind; 2] {
        match target {
            CaptureTarget::Desktop => [BackendKind::Duplication, BackendKind::Blit],
            CaptureTarget::Window(_) => [BackendKind::Blit, BackendKind::Duplication],
        }
    }
}

#[derive(Debug)]
pub enum CaptureOutcome {
    /// `origin` is the screen position of the frame's top-left pixel
    Frame { frame: Frame, origin: Point },
    /// Nothing new within the bounded wait, not a failure
    Timeout,
    Failed(String),
}

/// One way of grabbing pixels for a target
pub trait CaptureBackend: Send {
    fn kind(&self) -> BackendKind;

    fn initialize(&mut self, target: CaptureTarget) -> Result<(), CaptureError>;

    fn capture_frame(&mut self) -> CaptureOutcome;

    /// Safe on an uninitialized or already shut down backend
    fn shutdown(&mut self);

    fn is_initialized(&self) -> bool;
}

/// Window queries the capture loop needs, all in screen coordinates
pub trait WindowSystem: Send + Sync {
    fn is_valid(&self, target: CaptureTarget) -> bool;

    fn is_minimized(&self, target: CaptureTarget) -> bool;

    fn client_rect(&self, target: CaptureTarget) -> Option<Rect>;

    /// Rectangles of visible windows above the target in z-order
    fn occluders(&self, target: CaptureTarget) -> Vec<Rect>;
}
