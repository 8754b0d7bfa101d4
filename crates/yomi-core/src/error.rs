use yomi_types::{CaptureTarget, OcrEngineKind};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Invalid capture target: {0:?}")]
    InvalidTarget(CaptureTarget),

    #[error("Capture is already running")]
    AlreadyRunning,

    #[error("No capture backend could be initialized for {0:?}")]
    NoBackendAvailable(CaptureTarget),

    #[error("Backend initialization failed: {0}")]
    BackendInit(String),

    #[error("Failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine is not initialized")]
    NotInitialized,

    #[error("OCR worker is already running")]
    AlreadyRunning,

    #[error("{engine} failed to initialize: {reason}")]
    InitFailed { engine: String, reason: String },

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("Unsupported OCR engine: {0}")]
    Unsupported(OcrEngineKind),

    #[error("Failed to spawn OCR thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("Tokenizer is not initialized")]
    NotInitialized,

    #[error("Dictionary load failed: {0}")]
    Dictionary(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Overlay window creation failed: {0}")]
    CreateFailed(String),

    #[error("Failed to spawn overlay thread: {0}")]
    Spawn(#[from] std::io::Error),
}
