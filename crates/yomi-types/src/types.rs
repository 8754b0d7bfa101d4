use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

/// One piece of recognized text in captured-frame coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    pub text: String,
    pub bbox: Rect,
    /// 0..=100
    pub confidence: f32,
}

impl TextSegment {
    pub fn new(text: impl Into<String>, bbox: Rect, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub surface: String,
    pub reading: String,
    pub base_form: String,
    pub part_of_speech: String,
    pub bbox: Rect,
    pub confidence: f32,
}

/// Ruby annotation ready for the overlay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuriganaInfo {
    pub base_text: String,
    /// Hiragana
    pub reading: String,
    pub position: Point,
    pub ruby_position: Point,
    pub needs_ruby: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureTarget {
    /// Whole primary monitor
    Desktop,
    /// Top-level window by id
    Window(u32),
}

impl CaptureTarget {
    pub fn is_desktop(&self) -> bool {
        matches!(self, CaptureTarget::Desktop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    Windows,
    Tesseract,
    Paddle,
}

impl OcrEngineKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            OcrEngineKind::Windows => "Windows OCR",
            OcrEngineKind::Tesseract => "Tesseract",
            OcrEngineKind::Paddle => "PaddleOCR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "windows" | "winrt" => Some(OcrEngineKind::Windows),
            "tesseract" => Some(OcrEngineKind::Tesseract),
            "paddle" | "paddleocr" => Some(OcrEngineKind::Paddle),
            _ => None,
        }
    }
}

impl fmt::Display for OcrEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureStatistics {
    pub total_frames_captured: u64,
    pub frames_skipped: u64,
    pub failed_attempts: u64,
    pub consecutive_failures: u32,
    pub current_fps: f64,
    pub using_duplication: bool,
    pub window_occluded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrStatistics {
    pub total_frames_processed: u64,
    pub total_text_segments: u64,
    pub current_fps: f64,
    pub engine_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayStatistics {
    pub frames_rendered: u64,
    pub furigana_updates: u64,
    pub current_fps: f64,
}

/// Which workers were stopped by a cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownSummary {
    pub overlay_stopped: bool,
    pub ocr_stopped: bool,
    pub capture_stopped: bool,
}

impl ShutdownSummary {
    pub fn any(&self) -> bool {
        self.overlay_stopped || self.ocr_stopped || self.capture_stopped
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    // Commands from the presentation side
    StartCapture {
        target: CaptureTarget,
    },
    StopCapture,
    SelectRoi(Rect),
    ClearRoi,
    SetCaptureInterval(f64),
    SetOcrEngine(OcrEngineKind),
    SetChangeDetection(bool),
    ClearSentences,
    ExportSnapshot,
    RequestShutdown,

    // Notifications towards the presentation side
    StatusUpdate {
        status: String,
        capturing: bool,
    },
    SentenceDetected {
        text: String,
        tokens: Vec<Token>,
    },
    CaptureStopped(ShutdownSummary),
    SnapshotSaved {
        image_path: String,
        json_path: String,
    },
    ShutdownComplete,
}
