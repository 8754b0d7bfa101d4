use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use yomi_capture::FrameQueue;
use yomi_core::{FpsCounter, OcrEngine, OcrError};
use yomi_types::{Frame, OcrStatistics, Rect, TextSegment};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Shared {
    running: AtomicBool,
    latest: Mutex<Vec<TextSegment>>,
    last_frame: Mutex<Option<Frame>>,
    roi: Mutex<Option<Rect>>,
    stats: Mutex<OcrStatistics>,
    fps: Mutex<Option<FpsCounter>>,
}

/// Pops frames off the queue and keeps the latest recognition result
pub struct OcrWorker {
    queue: Arc<FrameQueue>,
    engine: Option<Arc<dyn OcrEngine>>,
    poll_timeout: Duration,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl OcrWorker {
    pub fn new(
        queue: Arc<FrameQueue>,
        engine: Option<Arc<dyn OcrEngine>>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            engine,
            poll_timeout,
            shared: Arc::new(Shared::default()),
            handle: None,
        }
    }

    pub fn start(&mut self) -> Result<(), OcrError> {
        let engine = match &self.engine {
            Some(engine) if engine.is_initialized() => engine.clone(),
            _ => return Err(OcrError::NotInitialized),
        };
        if self.handle.is_some() {
            return Err(OcrError::AlreadyRunning);
        }

        {
            let mut stats = lock(&self.shared.stats);
            *stats = OcrStatistics {
                engine_name: engine.engine_name().to_string(),
                ..Default::default()
            };
        }
        *lock(&self.shared.fps) = Some(FpsCounter::new());
        self.shared.running.store(true, Ordering::SeqCst);

        let queue = self.queue.clone();
        let shared = self.shared.clone();
        let poll_timeout = self.poll_timeout;
        let spawned = std::thread::Builder::new()
            .name("yomi-ocr".to_string())
            .spawn(move || run(queue, engine, shared, poll_timeout));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("[OCR] Worker started");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(OcrError::Spawn(e))
            }
        }
    }

    /// Idempotent, returns whether a running loop was stopped
    pub fn stop(&mut self) -> bool {
        self.shared.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return false;
        };
        if handle.join().is_err() {
            tracing::error!("[OCR] Worker thread panicked");
        }
        tracing::info!("[OCR] Worker stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.shared.running.load(Ordering::SeqCst)
    }

    /// Recognize one frame on the calling thread
    pub fn process_frame(&self, frame: Frame) {
        if let Some(engine) = &self.engine {
            process(engine.as_ref(), &self.shared, frame);
        }
    }

    /// Segments of the most recent successful recognition
    pub fn latest_results(&self) -> Vec<TextSegment> {
        lock(&self.shared.latest).clone()
    }

    /// Frame the latest results were recognized on, after ROI cropping
    pub fn last_frame(&self) -> Option<Frame> {
        lock(&self.shared.last_frame).clone()
    }

    pub fn clear_results(&self) {
        lock(&self.shared.latest).clear();
    }

    pub fn statistics(&self) -> OcrStatistics {
        lock(&self.shared.stats).clone()
    }

    /// Restrict recognition to `roi`, in captured-frame coordinates
    pub fn set_roi(&self, roi: Option<Rect>) {
        *lock(&self.shared.roi) = roi;
    }

    pub fn clear_roi(&self) {
        self.set_roi(None);
    }

    pub fn roi(&self) -> Option<Rect> {
        *lock(&self.shared.roi)
    }

    pub fn engine(&self) -> Option<&Arc<dyn OcrEngine>> {
        self.engine.as_ref()
    }
}

impl Drop for OcrWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    queue: Arc<FrameQueue>,
    engine: Arc<dyn OcrEngine>,
    shared: Arc<Shared>,
    poll_timeout: Duration,
) {
    tracing::debug!("[OCR] Loop running with {}", engine.engine_name());
    while shared.running.load(Ordering::SeqCst) {
        let Some(frame) = queue.pop(poll_timeout) else {
            continue;
        };
        process(engine.as_ref(), &shared, frame);
    }
    tracing::debug!("[OCR] Loop exited");
}

fn process(engine: &dyn OcrEngine, shared: &Shared, frame: Frame) {
    let roi = *lock(&shared.roi);
    let frame = match roi {
        Some(roi) => frame.crop(roi).unwrap_or(frame),
        None => frame,
    };

    let segments = match panic::catch_unwind(AssertUnwindSafe(|| engine.recognize_text(&frame))) {
        Ok(Ok(segments)) => segments,
        Ok(Err(e)) => {
            tracing::warn!("[OCR] Recognition failed: {}", e);
            return;
        }
        Err(_) => {
            tracing::error!("[OCR] {} panicked during recognition", engine.engine_name());
            return;
        }
    };

    let count = segments.len() as u64;
    *lock(&shared.latest) = segments;
    *lock(&shared.last_frame) = Some(frame);

    let mut stats = lock(&shared.stats);
    stats.total_frames_processed += 1;
    stats.total_text_segments += count;
    if let Some(fps) = lock(&shared.fps).as_mut().and_then(FpsCounter::tick) {
        stats.current_fps = fps;
        tracing::debug!(
            "[OCR] {:.1} fps, {} frames, {} segments",
            fps,
            stats.total_frames_processed,
            stats.total_text_segments
        );
    }
}
