use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use serde_json::{Map, Value, json};
use yomi_core::OcrEngine;
use yomi_types::{Frame, Rect, TextSegment};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Nothing to export: no frame has been recognized yet")]
    NoFrame,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OCR error: {0}")]
    Ocr(#[from] yomi_core::OcrError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub image: PathBuf,
    pub json: PathBuf,
}

/// Descriptor written next to the annotated image
///
/// Keys come out sorted and `segments` is omitted when empty; diagnostics
/// tooling reads these files.
pub fn snapshot_json(
    engine_name: &str,
    image_width: u32,
    image_height: u32,
    segments: &[TextSegment],
) -> Value {
    let mut root = Map::new();
    root.insert("engine_name".into(), json!(engine_name));
    root.insert("image_height".into(), json!(image_height));
    root.insert("image_width".into(), json!(image_width));
    root.insert("segment_count".into(), json!(segments.len()));

    if !segments.is_empty() {
        let items = segments
            .iter()
            .map(|segment| {
                json!({
                    "bbox": {
                        "height": segment.bbox.height,
                        "width": segment.bbox.width,
                        "x": segment.bbox.x,
                        "y": segment.bbox.y,
                    },
                    "confidence": f64::from(segment.confidence),
                    "text": segment.text,
                })
            })
            .collect();
        root.insert("segments".into(), Value::Array(items));
    }

    Value::Object(root)
}

/// Copy of the frame with a green box around every segment
pub fn annotate(frame: &Frame, segments: &[TextSegment]) -> RgbImage {
    let mut image = frame.image().clone();
    for segment in segments {
        draw_box(&mut image, segment.bbox);
    }
    image
}

fn draw_box(image: &mut RgbImage, rect: Rect) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let mut put = |x: i32, y: i32| {
        if x >= 0 && y >= 0 && x < width && y < height {
            image.put_pixel(x as u32, y as u32, BOX_COLOR);
        }
    };

    for t in 0..BOX_THICKNESS {
        for x in rect.x..rect.right() {
            put(x, rect.y + t);
            put(x, rect.bottom() - 1 - t);
        }
        for y in rect.y..rect.bottom() {
            put(rect.x + t, y);
            put(rect.right() - 1 - t, y);
        }
    }
}

/// Write `snapshot_<timestamp>.png` and `.json` into `dir`
pub fn export_snapshot(
    dir: &Path,
    engine_name: &str,
    frame: &Frame,
    segments: &[TextSegment],
) -> Result<SnapshotPaths, SnapshotError> {
    fs::create_dir_all(dir)?;

    let stem = format!("snapshot_{}", chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"));
    let paths = SnapshotPaths {
        image: dir.join(format!("{stem}.png")),
        json: dir.join(format!("{stem}.json")),
    };

    annotate(frame, segments).save(&paths.image)?;

    let descriptor = snapshot_json(engine_name, frame.width(), frame.height(), segments);
    fs::write(&paths.json, serde_json::to_string_pretty(&descriptor)?)?;

    tracing::info!(
        "[OCR] Snapshot with {} segments written to {}",
        segments.len(),
        paths.json.display()
    );
    Ok(paths)
}

/// Recognize a single image file, for checking an engine outside a session
pub fn recognize_image_file(
    engine: &dyn OcrEngine,
    path: &Path,
) -> Result<(Frame, Vec<TextSegment>), SnapshotError> {
    let image = image::open(path)?.to_rgb8();
    let frame = Frame::new(image);
    let segments = engine.recognize_text(&frame)?;
    for segment in &segments {
        tracing::info!(
            "[OCR] {:?} conf={:.1} bbox=({}, {}, {}x{})",
            segment.text,
            segment.confidence,
            segment.bbox.x,
            segment.bbox.y,
            segment.bbox.width,
            segment.bbox.height
        );
    }
    Ok((frame, segments))
}
