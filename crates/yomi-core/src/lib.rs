pub mod capture;
pub mod error;
pub mod language;
pub mod ocr;
pub mod overlay;
pub mod signal;
pub mod stats;

pub use capture::{BackendKind, CaptureBackend, CaptureOutcome, WindowSystem};
pub use error::{CaptureError, OcrError, OverlayError, TokenizeError};
pub use language::Tokenizer;
pub use ocr::OcrEngine;
pub use overlay::OverlaySurface;
pub use signal::StopSignal;
pub use stats::FpsCounter;
