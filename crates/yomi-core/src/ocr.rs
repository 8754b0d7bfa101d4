use yomi_types::{Frame, TextSegment};

use crate::error::OcrError;

/// Text recognition engine
///
/// Engines are initialized once and then shared behind an `Arc` with the OCR
/// worker, so everything after `initialize` takes `&self`. Implementations
/// that wrap a non thread-safe library serialize internally.
pub trait OcrEngine: Send + Sync {
    fn initialize(&mut self, model_path: &str, language: &str) -> Result<(), OcrError>;

    /// Segments in frame coordinates, in engine order
    fn recognize_text(&self, frame: &Frame) -> Result<Vec<TextSegment>, OcrError>;

    fn shutdown(&self);

    fn is_initialized(&self) -> bool;

    fn engine_name(&self) -> &str;
}
