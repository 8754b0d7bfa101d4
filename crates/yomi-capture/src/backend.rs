use std::fmt;
use std::sync::Arc;

use yomi_core::{BackendKind, CaptureBackend, CaptureError, CaptureOutcome};
use yomi_types::CaptureTarget;

/// Builds an uninitialized backend of the requested kind
pub type BackendFactory = Arc<dyn Fn(BackendKind) -> Box<dyn CaptureBackend> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveBackend {
    Primary,
    Fallback,
}

/// Owns the live capture backend and swaps to the other kind once
/// consecutive failures reach the threshold
pub struct BackendSelector {
    factory: BackendFactory,
    target: CaptureTarget,
    backend: Box<dyn CaptureBackend>,
    active: ActiveBackend,
    consecutive_failures: u32,
    threshold: u32,
}

impl BackendSelector {
    /// Initialize the preferred backend for `target`, or the other one if that fails
    pub fn start(
        factory: BackendFactory,
        target: CaptureTarget,
        threshold: u32,
    ) -> Result<Self, CaptureError> {
        for (index, kind) in BackendKind::preference(target).into_iter().enumerate() {
            let mut backend = factory(kind);
            match backend.initialize(target) {
                Ok(()) => {
                    tracing::info!("[CAPTURE] Using {:?} backend for {:?}", kind, target);
                    let active = if index == 0 {
                        ActiveBackend::Primary
                    } else {
                        ActiveBackend::Fallback
                    };
                    return Ok(Self {
                        factory,
                        target,
                        backend,
                        active,
                        consecutive_failures: 0,
                        threshold: threshold.max(1),
                    });
                }
                Err(e) => {
                    tracing::warn!("[CAPTURE] {:?} backend unavailable: {}", kind, e);
                    backend.shutdown();
                }
            }
        }

        Err(CaptureError::NoBackendAvailable(target))
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn active(&self) -> ActiveBackend {
        self.active
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn capture(&mut self) -> CaptureOutcome {
        self.backend.capture_frame()
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Returns `true` if this failure made the selector switch backends
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures < self.threshold {
            return false;
        }
        self.switch()
    }

    fn switch(&mut self) -> bool {
        let current = self.backend.kind();
        let next_kind = current.other();
        tracing::warn!(
            "[CAPTURE] {} consecutive failures on {:?}, switching to {:?}",
            self.consecutive_failures,
            current,
            next_kind
        );

        let mut next = (self.factory)(next_kind);
        let switched = match next.initialize(self.target) {
            Ok(()) => {
                self.backend.shutdown();
                self.backend = next;
                self.active = match self.active {
                    ActiveBackend::Primary => ActiveBackend::Fallback,
                    ActiveBackend::Fallback => ActiveBackend::Primary,
                };
                true
            }
            Err(e) => {
                tracing::warn!(
                    "[CAPTURE] {:?} backend failed to initialize ({}), reinitializing {:?}",
                    next_kind,
                    e,
                    current
                );
                next.shutdown();
                self.backend.shutdown();
                if let Err(e) = self.backend.initialize(self.target) {
                    tracing::error!("[CAPTURE] {:?} reinitialization failed: {}", current, e);
                }
                false
            }
        };

        self.consecutive_failures = 0;
        switched
    }

    pub fn shutdown(&mut self) {
        self.backend.shutdown();
    }
}

impl fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSelector")
            .field("target", &self.target)
            .field("kind", &self.backend.kind())
            .field("active", &self.active)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("threshold", &self.threshold)
            .finish()
    }
}
