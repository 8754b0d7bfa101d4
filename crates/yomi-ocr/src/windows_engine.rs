use std::io::Cursor;

use anyhow::{Context, Result};
use image::ImageFormat;
use windows::{
    Globalization::Language,
    Graphics::Imaging::BitmapDecoder,
    Media::Ocr::{OcrEngine as WinOcrEngine, OcrLine},
    Storage::Streams::{DataWriter, InMemoryRandomAccessStream},
    core::HSTRING,
};
use yomi_core::{OcrEngine, OcrError};
use yomi_types::{Frame, Rect, TextSegment};

use crate::com::ComGuard;

const ENGINE_NAME: &str = "Windows OCR";

/// Windows.Media.Ocr has no per-line score
const WINDOWS_CONFIDENCE: f32 = 100.0;

/// Windows.Media.Ocr engine, one segment per recognized line
#[derive(Default)]
pub struct WindowsOcrEngine {
    engine: Option<WinOcrEngine>,
    language: String,
}

impl WindowsOcrEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognizer language tag, e.g. "ja"
    pub fn recognizer_language(&self) -> Result<String> {
        let engine = self.engine.as_ref().context("Engine not initialized")?;
        engine
            .RecognizerLanguage()
            .context("Failed to get recognizer language")?
            .LanguageTag()
            .map(|tag| tag.to_string())
            .context("Failed to get language tag")
    }
}

impl OcrEngine for WindowsOcrEngine {
    fn initialize(&mut self, _model_path: &str, language: &str) -> Result<(), OcrError> {
        let create = || -> Result<WinOcrEngine> {
            let _com = ComGuard::initialize()?;
            let language = Language::CreateLanguage(&HSTRING::from(language))
                .context("Failed to create language")?;
            WinOcrEngine::TryCreateFromLanguage(&language)
                .context("Failed to create OCR engine for language")
        };

        let engine = create().map_err(|e| OcrError::InitFailed {
            engine: ENGINE_NAME.to_string(),
            reason: format!("{e:#}"),
        })?;

        tracing::info!("[OCR] {} ready for '{}'", ENGINE_NAME, language);
        self.engine = Some(engine);
        self.language = language.to_string();
        Ok(())
    }

    fn recognize_text(&self, frame: &Frame) -> Result<Vec<TextSegment>, OcrError> {
        let engine = self.engine.as_ref().ok_or(OcrError::NotInitialized)?;
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        recognize(engine, frame, joins_without_spaces(&self.language))
            .map_err(|e| OcrError::Recognition(format!("{e:#}")))
    }

    fn shutdown(&self) {}

    fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    fn engine_name(&self) -> &str {
        ENGINE_NAME
    }
}

fn joins_without_spaces(language: &str) -> bool {
    let lang = language.to_ascii_lowercase();
    lang.starts_with("ja") || lang.starts_with("zh")
}

fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    frame
        .image()
        .write_to(&mut buffer, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(buffer.into_inner())
}

fn recognize(engine: &WinOcrEngine, frame: &Frame, cjk: bool) -> Result<Vec<TextSegment>> {
    let _com = ComGuard::initialize()?;
    let png = encode_png(frame)?;

    let stream = InMemoryRandomAccessStream::new().context("Failed to create stream")?;
    let writer = DataWriter::CreateDataWriter(&stream).context("Failed to create writer")?;
    writer.WriteBytes(&png).context("Failed to write image bytes")?;
    writer
        .StoreAsync()
        .context("Failed to store async")?
        .get()
        .context("Failed to store data")?;
    writer.FlushAsync().context("Failed to flush")?.get()?;
    stream.Seek(0).context("Failed to seek")?;

    let decoder = BitmapDecoder::CreateAsync(&stream)
        .context("Failed to create decoder async")?
        .get()
        .context("Failed to get decoder")?;
    let bitmap = decoder
        .GetSoftwareBitmapAsync()
        .context("Failed to get bitmap async")?
        .get()
        .context("Failed to get software bitmap")?;

    let result = engine
        .RecognizeAsync(&bitmap)
        .context("Failed to recognize async")?
        .get()
        .context("Failed to get OCR result")?;

    let lines = result.Lines().context("Failed to get lines")?;
    let mut segments = Vec::new();
    for i in 0..lines.Size()? {
        if let Some(segment) = line_segment(&lines.GetAt(i)?, cjk)? {
            segments.push(segment);
        }
    }
    Ok(segments)
}

/// Line text plus the union of its word boxes
fn line_segment(line: &OcrLine, cjk: bool) -> Result<Option<TextSegment>> {
    let words = line.Words().context("Failed to get words")?;

    let mut text = String::new();
    let mut bounds: Option<(f32, f32, f32, f32)> = None;
    for i in 0..words.Size()? {
        let word = words.GetAt(i)?;
        let word_text = word.Text()?.to_string();
        if !cjk && !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&word_text);

        let r = word.BoundingRect()?;
        bounds = Some(match bounds {
            None => (r.X, r.Y, r.X + r.Width, r.Y + r.Height),
            Some((l, t, rt, b)) => (
                l.min(r.X),
                t.min(r.Y),
                rt.max(r.X + r.Width),
                b.max(r.Y + r.Height),
            ),
        });
    }

    let Some((left, top, right, bottom)) = bounds else {
        return Ok(None);
    };
    if text.trim().is_empty() {
        return Ok(None);
    }

    let bbox = Rect::new(
        left.floor() as i32,
        top.floor() as i32,
        (right - left).ceil() as i32,
        (bottom - top).ceil() as i32,
    );
    Ok(Some(TextSegment::new(text, bbox, WINDOWS_CONFIDENCE)))
}
