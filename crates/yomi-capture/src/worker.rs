use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use yomi_config::capture::CaptureConfig;
use yomi_core::{BackendKind, CaptureError, CaptureOutcome, FpsCounter, StopSignal, WindowSystem};
use yomi_types::{CaptureStatistics, CaptureTarget, Frame};

use crate::analysis::{ChangeDetector, is_nearly_black};
use crate::backend::{BackendFactory, BackendSelector};
use crate::frame_queue::FrameQueue;
use crate::occlusion::{client_crop_rect, is_significant_occlusion, occlusion_ratio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// What one capture attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Pushed,
    /// Unchanged frame dropped by change detection
    Skipped,
    TimedOut,
    Failed,
}

/// State shared between the worker handle and its thread
#[derive(Debug)]
struct Shared {
    stop: StopSignal,
    interval_ms: AtomicU64,
    change_detection: AtomicBool,
    reset_detector: AtomicBool,
    stats: Mutex<CaptureStatistics>,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, CaptureStatistics> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loop body of the capture thread, usable directly with fake backends
pub struct CaptureLoop {
    target: CaptureTarget,
    selector: BackendSelector,
    window_system: Arc<dyn WindowSystem>,
    queue: Arc<FrameQueue>,
    shared: Arc<Shared>,
    detector: ChangeDetector,
    fps: FpsCounter,
    occlusion_threshold: f64,
    failure_backoff: Duration,
}

impl CaptureLoop {
    /// One capture attempt
    pub fn step(&mut self) -> StepResult {
        if self.shared.reset_detector.swap(false, Ordering::SeqCst) {
            self.detector.reset();
        }

        let ws = &self.window_system;
        if !ws.is_valid(self.target) || ws.is_minimized(self.target) {
            tracing::debug!("[CAPTURE] Target {:?} unavailable or minimized", self.target);
            return self.fail();
        }

        let client = ws.client_rect(self.target);

        if !self.target.is_desktop() {
            let occluded = client
                .map(|rect| {
                    let ratio = occlusion_ratio(rect, &ws.occluders(self.target));
                    is_significant_occlusion(ratio, self.occlusion_threshold)
                })
                .unwrap_or(false);
            self.shared.stats().window_occluded = occluded;

            // Screen pixels of an occluded window are whatever covers it
            if occluded && self.selector.kind() == BackendKind::Duplication {
                tracing::debug!("[CAPTURE] Target occluded, skipping duplication capture");
                return self.fail();
            }
        }

        let (frame, origin) = match self.selector.capture() {
            CaptureOutcome::Frame { frame, origin } => (frame, origin),
            CaptureOutcome::Timeout => return StepResult::TimedOut,
            CaptureOutcome::Failed(reason) => {
                tracing::debug!("[CAPTURE] Capture failed: {}", reason);
                return self.fail();
            }
        };

        let frame = match (self.target, client) {
            (CaptureTarget::Window(_), Some(client)) => {
                match frame.crop(client_crop_rect(client, origin)) {
                    Some(cropped) => cropped,
                    None => {
                        tracing::debug!("[CAPTURE] Client area outside frame, using it whole");
                        frame
                    }
                }
            }
            _ => frame,
        };

        if is_nearly_black(&frame) {
            tracing::debug!(
                "[CAPTURE] Rejected near-black {}x{} frame",
                frame.width(),
                frame.height()
            );
            return self.fail();
        }

        self.selector.record_success();
        self.shared.stats().consecutive_failures = 0;

        if self.shared.change_detection.load(Ordering::SeqCst) && !self.detector.is_changed(&frame)
        {
            self.shared.stats().frames_skipped += 1;
            return StepResult::Skipped;
        }

        self.push(frame);
        StepResult::Pushed
    }

    fn push(&mut self, frame: Frame) {
        if self.queue.push(frame) {
            tracing::trace!("[CAPTURE] Frame queue full, dropped oldest frame");
        }

        let mut stats = self.shared.stats();
        stats.total_frames_captured += 1;
        if let Some(fps) = self.fps.tick() {
            stats.current_fps = fps;
            tracing::debug!(
                "[CAPTURE] {:.1} fps, {} captured, {} skipped, {} failed",
                fps,
                stats.total_frames_captured,
                stats.frames_skipped,
                stats.failed_attempts
            );
        }
    }

    fn fail(&mut self) -> StepResult {
        let switched = self.selector.record_failure();
        let mut stats = self.shared.stats();
        stats.failed_attempts += 1;
        stats.consecutive_failures = self.selector.consecutive_failures();
        if switched {
            stats.using_duplication = self.selector.kind() == BackendKind::Duplication;
            tracing::info!("[CAPTURE] Now using {:?} backend", self.selector.kind());
        }
        StepResult::Failed
    }

    fn delay_after(&self, result: StepResult) -> Duration {
        match result {
            StepResult::Failed => self.failure_backoff,
            _ => Duration::from_millis(self.shared.interval_ms.load(Ordering::SeqCst)),
        }
    }

    fn run(mut self) {
        tracing::info!("[CAPTURE] Loop started for {:?}", self.target);

        while !self.shared.stop.is_stopped() {
            let result = match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!("[CAPTURE] Capture attempt panicked");
                    StepResult::Failed
                }
            };

            if self.shared.stop.wait_timeout(self.delay_after(result)) {
                break;
            }
        }

        self.selector.shutdown();
        tracing::info!("[CAPTURE] Loop exited");
    }
}

/// Runs a `CaptureLoop` on its own thread and feeds the frame queue
pub struct CaptureWorker {
    queue: Arc<FrameQueue>,
    window_system: Arc<dyn WindowSystem>,
    factory: BackendFactory,
    config: CaptureConfig,
    shared: Arc<Shared>,
    state: Arc<Mutex<CaptureState>>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    pub fn new(
        queue: Arc<FrameQueue>,
        window_system: Arc<dyn WindowSystem>,
        factory: BackendFactory,
        config: &CaptureConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            stop: StopSignal::new(),
            interval_ms: AtomicU64::new(config.interval_ms().max(1)),
            change_detection: AtomicBool::new(config.change_detection),
            reset_detector: AtomicBool::new(false),
            stats: Mutex::new(CaptureStatistics::default()),
        });

        Self {
            queue,
            window_system,
            factory,
            config: config.clone(),
            shared,
            state: Arc::new(Mutex::new(CaptureState::Stopped)),
            handle: None,
        }
    }

    /// Validate `target`, pick a backend and build the loop without spawning it
    ///
    /// `start` runs the result on a thread; tests drive `step()` by hand.
    pub fn prepare(&self, target: CaptureTarget) -> Result<CaptureLoop, CaptureError> {
        if !self.window_system.is_valid(target) {
            return Err(CaptureError::InvalidTarget(target));
        }

        let selector = BackendSelector::start(
            self.factory.clone(),
            target,
            self.config.max_failures_before_fallback,
        )?;

        {
            let mut stats = self.shared.stats();
            *stats = CaptureStatistics::default();
            stats.using_duplication = selector.kind() == BackendKind::Duplication;
        }

        Ok(CaptureLoop {
            target,
            selector,
            window_system: self.window_system.clone(),
            queue: self.queue.clone(),
            shared: self.shared.clone(),
            detector: ChangeDetector::new(self.config.change_threshold),
            fps: FpsCounter::new(),
            occlusion_threshold: self.config.occlusion_threshold,
            failure_backoff: Duration::from_millis(self.config.failure_backoff_ms),
        })
    }

    pub fn start(&mut self, target: CaptureTarget) -> Result<(), CaptureError> {
        {
            let mut state = self.lock_state();
            if *state != CaptureState::Stopped {
                return Err(CaptureError::AlreadyRunning);
            }
            *state = CaptureState::Starting;
        }

        let capture_loop = match self.prepare(target) {
            Ok(capture_loop) => capture_loop,
            Err(e) => {
                *self.lock_state() = CaptureState::Stopped;
                return Err(e);
            }
        };

        self.shared.stop.reset();
        let spawned = std::thread::Builder::new()
            .name("yomi-capture".to_string())
            .spawn(move || capture_loop.run());

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                *self.lock_state() = CaptureState::Running;
                Ok(())
            }
            Err(e) => {
                *self.lock_state() = CaptureState::Stopped;
                Err(CaptureError::Spawn(e))
            }
        }
    }

    /// Returns whether a running loop was stopped
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };

        *self.lock_state() = CaptureState::Stopping;
        self.shared.stop.stop();
        if handle.join().is_err() {
            tracing::error!("[CAPTURE] Capture thread panicked");
        }
        *self.lock_state() = CaptureState::Stopped;
        true
    }

    pub fn state(&self) -> CaptureState {
        *self.lock_state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == CaptureState::Running
    }

    pub fn statistics(&self) -> CaptureStatistics {
        self.shared.stats().clone()
    }

    pub fn interval_ms(&self) -> u64 {
        self.shared.interval_ms.load(Ordering::SeqCst)
    }

    /// Takes effect on the next sleep, minimum 1ms
    pub fn set_interval_ms(&self, interval_ms: u64) {
        self.shared
            .interval_ms
            .store(interval_ms.max(1), Ordering::SeqCst);
    }

    pub fn set_change_detection(&self, enabled: bool) {
        self.shared.change_detection.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.shared.reset_detector.store(true, Ordering::SeqCst);
        }
    }

    pub fn change_detection(&self) -> bool {
        self.shared.change_detection.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use yomi_core::CaptureBackend;
    use yomi_types::{Point, Rect};

    use super::*;

    #[derive(Default)]
    struct FakeWindows {
        client: Rect,
        occluders: Vec<Rect>,
        minimized: bool,
    }

    impl WindowSystem for FakeWindows {
        fn is_valid(&self, target: CaptureTarget) -> bool {
            target != CaptureTarget::Window(0)
        }

        fn is_minimized(&self, _target: CaptureTarget) -> bool {
            self.minimized
        }

        fn client_rect(&self, _target: CaptureTarget) -> Option<Rect> {
            Some(self.client)
        }

        fn occluders(&self, _target: CaptureTarget) -> Vec<Rect> {
            self.occluders.clone()
        }
    }

    /// Hands out scripted outcomes, repeating a plain gray frame once empty
    struct ScriptedBackend {
        kind: BackendKind,
        init_ok: bool,
        outcomes: Arc<Mutex<VecDeque<CaptureOutcome>>>,
        captures: Arc<AtomicU64>,
    }

    impl CaptureBackend for ScriptedBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn initialize(&mut self, _target: CaptureTarget) -> Result<(), CaptureError> {
            if self.init_ok {
                Ok(())
            } else {
                Err(CaptureError::BackendInit("scripted".into()))
            }
        }

        fn capture_frame(&mut self) -> CaptureOutcome {
            self.captures.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| gray_frame(100, 100))
        }

        fn shutdown(&mut self) {}

        fn is_initialized(&self) -> bool {
            true
        }
    }

    fn gray_frame(width: u32, height: u32) -> CaptureOutcome {
        let image = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 200) as u8 + 20, (y % 200) as u8 + 20, 90])
        });
        CaptureOutcome::Frame {
            frame: Frame::new(image),
            origin: Point::default(),
        }
    }

    struct Harness {
        worker: CaptureWorker,
        queue: Arc<FrameQueue>,
        outcomes: Arc<Mutex<VecDeque<CaptureOutcome>>>,
        captures: Arc<AtomicU64>,
    }

    fn harness(windows: FakeWindows, blit_ok: bool, config: CaptureConfig) -> Harness {
        let queue = Arc::new(FrameQueue::new(config.queue_capacity));
        let outcomes = Arc::new(Mutex::new(VecDeque::new()));
        let captures = Arc::new(AtomicU64::new(0));
        let factory: BackendFactory = {
            let outcomes = outcomes.clone();
            let captures = captures.clone();
            Arc::new(move |kind| {
                Box::new(ScriptedBackend {
                    kind,
                    init_ok: kind == BackendKind::Duplication || blit_ok,
                    outcomes: outcomes.clone(),
                    captures: captures.clone(),
                })
            })
        };
        let worker = CaptureWorker::new(queue.clone(), Arc::new(windows), factory, &config);
        Harness {
            worker,
            queue,
            outcomes,
            captures,
        }
    }

    fn client_100() -> FakeWindows {
        FakeWindows {
            client: Rect::new(0, 0, 100, 100),
            ..Default::default()
        }
    }

    #[test]
    fn identical_frames_are_skipped_with_change_detection() {
        let config = CaptureConfig {
            change_detection: true,
            ..Default::default()
        };
        let h = harness(client_100(), true, config);
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();

        assert_eq!(capture.step(), StepResult::Pushed);
        assert_eq!(capture.step(), StepResult::Skipped);
        assert_eq!(capture.step(), StepResult::Skipped);

        let stats = h.worker.statistics();
        assert_eq!(stats.total_frames_captured, 1);
        assert_eq!(stats.frames_skipped, 2);
        assert_eq!(h.queue.len(), 1);
    }

    #[test]
    fn disabling_change_detection_pushes_everything() {
        let config = CaptureConfig {
            change_detection: true,
            ..Default::default()
        };
        let h = harness(client_100(), true, config);
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();

        assert_eq!(capture.step(), StepResult::Pushed);
        h.worker.set_change_detection(false);
        assert_eq!(capture.step(), StepResult::Pushed);
        h.worker.set_change_detection(true);
        // reference histogram was cleared when disabled
        assert_eq!(capture.step(), StepResult::Pushed);
        assert_eq!(capture.step(), StepResult::Skipped);
    }

    #[test]
    fn occluded_window_skips_duplication_capture() {
        let windows = FakeWindows {
            client: Rect::new(0, 0, 100, 100),
            occluders: vec![Rect::new(0, 0, 100, 30)],
            minimized: false,
        };
        // blit unavailable, so the window is captured through duplication
        let h = harness(windows, false, CaptureConfig::default());
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();

        assert_eq!(capture.step(), StepResult::Failed);

        let stats = h.worker.statistics();
        assert!(stats.window_occluded);
        assert!(stats.using_duplication);
        assert_eq!(stats.failed_attempts, 1);
        assert_eq!(stats.consecutive_failures, 1);
        assert_eq!(h.captures.load(Ordering::SeqCst), 0);
        assert!(h.queue.is_empty());
    }

    #[test]
    fn small_occlusion_still_captures() {
        let windows = FakeWindows {
            client: Rect::new(0, 0, 100, 100),
            occluders: vec![Rect::new(0, 0, 100, 10)],
            minimized: false,
        };
        let h = harness(windows, false, CaptureConfig::default());
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();

        assert_eq!(capture.step(), StepResult::Pushed);
        assert!(!h.worker.statistics().window_occluded);
    }

    #[test]
    fn black_frames_count_as_failures_and_trigger_fallback() {
        let config = CaptureConfig {
            max_failures_before_fallback: 3,
            ..Default::default()
        };
        let h = harness(client_100(), true, config);
        {
            let mut outcomes = h.outcomes.lock().unwrap();
            for _ in 0..3 {
                outcomes.push_back(CaptureOutcome::Frame {
                    frame: Frame::filled(100, 100, [0, 0, 0]),
                    origin: Point::default(),
                });
            }
        }
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();
        assert!(!h.worker.statistics().using_duplication);

        for _ in 0..3 {
            assert_eq!(capture.step(), StepResult::Failed);
        }
        let stats = h.worker.statistics();
        assert!(stats.using_duplication);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.failed_attempts, 3);

        assert_eq!(capture.step(), StepResult::Pushed);
    }

    #[test]
    fn timeout_is_not_a_failure() {
        let h = harness(client_100(), true, CaptureConfig::default());
        h.outcomes.lock().unwrap().push_back(CaptureOutcome::Timeout);
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();

        assert_eq!(capture.step(), StepResult::TimedOut);
        assert_eq!(h.worker.statistics().failed_attempts, 0);
        assert_eq!(capture.delay_after(StepResult::TimedOut), Duration::from_millis(1000));
        assert_eq!(capture.delay_after(StepResult::Failed), Duration::from_millis(10));
    }

    #[test]
    fn frame_is_cropped_to_client_area() {
        let windows = FakeWindows {
            client: Rect::new(110, 220, 40, 30),
            ..Default::default()
        };
        let h = harness(windows, true, CaptureConfig::default());
        h.outcomes.lock().unwrap().push_back(match gray_frame(100, 100) {
            CaptureOutcome::Frame { frame, .. } => CaptureOutcome::Frame {
                frame,
                origin: Point::new(100, 200),
            },
            other => other,
        });
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();

        assert_eq!(capture.step(), StepResult::Pushed);
        let frame = h.queue.pop(Duration::ZERO).unwrap();
        assert_eq!((frame.width(), frame.height()), (40, 30));
        assert_eq!(frame.image().get_pixel(0, 0).0, [30, 40, 90]);
    }

    #[test]
    fn minimized_target_fails_without_capturing() {
        let windows = FakeWindows {
            client: Rect::new(0, 0, 100, 100),
            minimized: true,
            ..Default::default()
        };
        let h = harness(windows, true, CaptureConfig::default());
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();

        assert_eq!(capture.step(), StepResult::Failed);
        assert_eq!(h.captures.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn minimized_target_counts_toward_fallback() {
        let windows = FakeWindows {
            client: Rect::new(0, 0, 100, 100),
            minimized: true,
            ..Default::default()
        };
        let config = CaptureConfig {
            max_failures_before_fallback: 2,
            ..Default::default()
        };
        let h = harness(windows, true, config);
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();
        assert!(!h.worker.statistics().using_duplication);

        assert_eq!(capture.step(), StepResult::Failed);
        assert_eq!(h.worker.statistics().consecutive_failures, 1);
        assert_eq!(capture.step(), StepResult::Failed);

        let stats = h.worker.statistics();
        assert!(stats.using_duplication);
        assert_eq!(stats.failed_attempts, 2);
        assert_eq!(stats.consecutive_failures, 0);
    }

    #[test]
    fn client_area_outside_frame_keeps_whole_frame() {
        let windows = FakeWindows {
            client: Rect::new(500, 500, 40, 30),
            ..Default::default()
        };
        let h = harness(windows, true, CaptureConfig::default());
        let mut capture = h.worker.prepare(CaptureTarget::Window(1)).unwrap();

        assert_eq!(capture.step(), StepResult::Pushed);
        assert_eq!(h.worker.statistics().failed_attempts, 0);
        let frame = h.queue.pop(Duration::ZERO).unwrap();
        assert_eq!((frame.width(), frame.height()), (100, 100));
    }

    #[test]
    fn start_rejects_invalid_target() {
        let mut h = harness(client_100(), true, CaptureConfig::default());
        let result = h.worker.start(CaptureTarget::Window(0));
        assert!(matches!(result, Err(CaptureError::InvalidTarget(_))));
        assert_eq!(h.worker.state(), CaptureState::Stopped);
    }

    #[test]
    fn thread_runs_and_stops() {
        let config = CaptureConfig {
            interval_seconds: 0.1,
            ..Default::default()
        };
        let mut h = harness(client_100(), true, config);
        h.worker.start(CaptureTarget::Window(1)).unwrap();
        assert!(h.worker.is_running());
        assert!(matches!(
            h.worker.start(CaptureTarget::Window(1)),
            Err(CaptureError::AlreadyRunning)
        ));

        let frame = h.queue.pop(Duration::from_secs(2));
        assert!(frame.is_some());

        assert!(h.worker.stop());
        assert_eq!(h.worker.state(), CaptureState::Stopped);
        assert!(!h.worker.stop());
    }
}
