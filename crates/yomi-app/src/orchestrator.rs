use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use chrono::{DateTime, Local};
use kanal::{AsyncReceiver, AsyncSender};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use yomi_capture::{BackendFactory, CaptureWorker, FrameQueue};
use yomi_config::capture::clamp_interval_seconds;
use yomi_core::{OverlaySurface, Tokenizer, WindowSystem};
use yomi_lang_japanese::{FuriganaMapper, place_tokens};
use yomi_ocr::{OcrEngineBootstrapper, OcrWorker, SnapshotPaths};
use yomi_overlay::OverlayWorker;
use yomi_types::{
    AppEvent, CaptureStatistics, CaptureTarget, OcrEngineKind, OcrStatistics, OverlayStatistics,
    Rect, ShutdownSummary, Token,
};

use crate::assembler::SentenceAssembler;
use crate::dispatcher::{Completion, TokenizationDispatcher};
use crate::state::AppState;

/// Builds a fresh overlay surface for each capture session
pub type SurfaceFactory = Box<dyn Fn() -> Box<dyn OverlaySurface> + Send + Sync>;

/// External collaborators the pipeline is wired from
pub struct Services {
    pub window_system: Arc<dyn WindowSystem>,
    pub backend_factory: BackendFactory,
    pub ocr_engines: OcrEngineBootstrapper,
    /// Initialized before it is handed over
    pub tokenizer: Arc<dyn Tokenizer>,
    pub overlay_surface: SurfaceFactory,
}

/// A sentence that made it through tokenization
#[derive(Debug, Clone, Serialize)]
pub struct SentenceRecord {
    pub id: Uuid,
    pub text: String,
    pub tokens: Vec<Token>,
    pub published_at: DateTime<Local>,
}

/// Workers of one capture session, torn down together
struct Session {
    queue: Arc<FrameQueue>,
    capture: CaptureWorker,
    ocr: OcrWorker,
    overlay: Option<OverlayWorker>,
}

impl Session {
    /// Overlay first, then OCR and its engine, then capture, then drop queued frames
    fn shutdown(mut self) -> ShutdownSummary {
        let mut summary = ShutdownSummary::default();

        if let Some(mut overlay) = self.overlay.take() {
            overlay.stop();
            summary.overlay_stopped = true;
        }

        self.ocr.stop();
        if let Some(engine) = self.ocr.engine() {
            engine.shutdown();
        }
        summary.ocr_stopped = true;

        self.capture.stop();
        summary.capture_stopped = true;

        self.queue.clear();
        summary
    }
}

/// Owns the capture session and runs the assemble/dispatch cycle
///
/// All assembler and dispatcher state lives here and is only touched from
/// the task running [`Orchestrator::run`]. Worker teardown happens on the
/// blocking pool and reports back through a channel.
pub struct Orchestrator {
    state: Arc<AppState>,
    services: Services,
    events_tx: AsyncSender<AppEvent>,

    session: Option<Session>,
    target: Option<CaptureTarget>,
    roi: Option<Rect>,

    assembler: SentenceAssembler,
    dispatcher: TokenizationDispatcher,
    completions_rx: AsyncReceiver<Completion>,
    furigana: FuriganaMapper,
    history: Vec<SentenceRecord>,

    cleanup_tx: AsyncSender<ShutdownSummary>,
    cleanup_rx: AsyncReceiver<ShutdownSummary>,
    cleanups_in_flight: usize,
    shutdown_requested: bool,
}

impl Orchestrator {
    pub async fn new(
        state: Arc<AppState>,
        services: Services,
        events_tx: AsyncSender<AppEvent>,
    ) -> Self {
        let (assembler, furigana, roi) = {
            let config = state.config.read().await;
            (
                SentenceAssembler::new(
                    config.assembler.clone(),
                    config.capture.required_stable_frames(),
                ),
                FuriganaMapper::new(config.overlay.ruby_offset),
                config.ocr.roi,
            )
        };

        let (completions_tx, completions_rx) = kanal::unbounded_async();
        let (cleanup_tx, cleanup_rx) = kanal::unbounded_async();
        let dispatcher = TokenizationDispatcher::new(services.tokenizer.clone(), completions_tx);

        Self {
            state,
            services,
            events_tx,
            session: None,
            target: None,
            roi,
            assembler,
            dispatcher,
            completions_rx,
            furigana,
            history: Vec::new(),
            cleanup_tx,
            cleanup_rx,
            cleanups_in_flight: 0,
            shutdown_requested: false,
        }
    }

    /// Event loop: commands, poll ticks, tokenizer completions, cleanups
    ///
    /// Returns after a shutdown request (command, closed command channel or
    /// cancellation) once every cleanup has finished.
    pub async fn run(
        mut self,
        commands: AsyncReceiver<AppEvent>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let poll_interval = {
            let config = self.state.config.read().await;
            Duration::from_millis(config.poll_interval_ms.max(1))
        };
        let mut poll = tokio::time::interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let completions = self.completions_rx.clone();
        let cleanups = self.cleanup_rx.clone();
        let mut commands_open = true;

        tracing::info!("[PIPELINE] Event loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled(), if !self.shutdown_requested => {
                    tracing::info!("[PIPELINE] Cancelled");
                    self.request_shutdown().await;
                }
                command = commands.recv(), if commands_open => match command {
                    Ok(event) => self.handle_event(event).await?,
                    Err(_) => {
                        tracing::info!("[PIPELINE] Command channel closed");
                        commands_open = false;
                        self.request_shutdown().await;
                    }
                },
                Ok(completion) = completions.recv() => {
                    self.handle_completion(completion).await;
                }
                Ok(summary) = cleanups.recv() => {
                    self.finish_cleanup(summary).await;
                }
                _ = poll.tick(), if self.session.is_some() => {
                    self.poll();
                }
            }

            if self.shutdown_requested && self.session.is_none() && self.cleanups_in_flight == 0 {
                break;
            }
        }

        tracing::info!("[PIPELINE] All cleanup finished, exiting");
        self.emit(AppEvent::ShutdownComplete).await;
        Ok(())
    }

    pub async fn handle_event(&mut self, event: AppEvent) -> anyhow::Result<()> {
        match event {
            AppEvent::StartCapture { target } => self.start_capture(target).await,
            AppEvent::StopCapture => self.stop_capture().await,
            AppEvent::SelectRoi(roi) => {
                self.select_roi(roi).await;
            }
            AppEvent::ClearRoi => self.clear_roi().await,
            AppEvent::SetCaptureInterval(seconds) => self.set_capture_interval(seconds).await,
            AppEvent::SetOcrEngine(kind) => self.set_ocr_engine(kind).await,
            AppEvent::SetChangeDetection(enabled) => self.set_change_detection(enabled).await,
            AppEvent::ClearSentences => self.clear_sentences(),
            AppEvent::ExportSnapshot => match self.export_snapshot().await {
                Ok(paths) => {
                    self.emit(AppEvent::SnapshotSaved {
                        image_path: paths.image.display().to_string(),
                        json_path: paths.json.display().to_string(),
                    })
                    .await;
                }
                Err(e) => tracing::warn!("[PIPELINE] Snapshot failed: {:#}", e),
            },
            AppEvent::RequestShutdown => self.request_shutdown().await,
            AppEvent::StatusUpdate { .. }
            | AppEvent::SentenceDetected { .. }
            | AppEvent::CaptureStopped(_)
            | AppEvent::SnapshotSaved { .. }
            | AppEvent::ShutdownComplete => {
                // Outbound only
            }
        }
        Ok(())
    }

    pub async fn start_capture(&mut self, target: CaptureTarget) {
        if self.shutdown_requested {
            tracing::warn!("[PIPELINE] Shutdown in progress, not starting capture");
            return;
        }
        if self.session.is_some() {
            tracing::warn!("[PIPELINE] Already capturing");
            return;
        }

        self.select_target(target);
        let config = self.state.config.read().await.clone();

        let Some(client) = self.services.window_system.client_rect(target) else {
            self.set_status("Could not read the target window size", false)
                .await;
            return;
        };
        let roi = self
            .roi
            .unwrap_or_else(|| Rect::new(0, 0, client.width, client.height));
        tracing::info!(
            "[PIPELINE] Starting capture of {:?}, ROI ({}, {}, {}x{})",
            target,
            roi.x,
            roi.y,
            roi.width,
            roi.height
        );

        self.assembler.reset();
        self.assembler
            .set_required_hits(config.capture.required_stable_frames());

        let engine = match self.services.ocr_engines.create(&config.ocr) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::error!("[PIPELINE] OCR engine initialization failed: {}", e);
                self.record_error().await;
                self.set_status("OCR engine initialization failed", false)
                    .await;
                return;
            }
        };
        tracing::info!("[PIPELINE] OCR engine: {}", engine.engine_name());

        if !self.dispatcher.tokenizer().is_initialized() {
            tracing::error!("[PIPELINE] Tokenizer is not initialized");
            self.record_error().await;
            self.set_status("Tokenizer initialization failed", false).await;
            return;
        }

        let queue = Arc::new(FrameQueue::new(config.capture.queue_capacity));

        let mut capture = CaptureWorker::new(
            queue.clone(),
            self.services.window_system.clone(),
            self.services.backend_factory.clone(),
            &config.capture,
        );
        if let Err(e) = capture.start(target) {
            tracing::error!("[PIPELINE] Capture start failed: {}", e);
            self.record_error().await;
            self.set_status("Capture failed to start", false).await;
            return;
        }

        let mut ocr = OcrWorker::new(
            queue.clone(),
            Some(engine),
            Duration::from_millis(config.ocr.poll_timeout_ms),
        );
        ocr.set_roi(Some(roi));
        if let Err(e) = ocr.start() {
            tracing::error!("[PIPELINE] OCR start failed: {}", e);
            capture.stop();
            queue.clear();
            self.record_error().await;
            self.set_status("OCR failed to start", false).await;
            return;
        }

        let overlay = if config.overlay.enabled {
            let overlay =
                OverlayWorker::new(Duration::from_micros(config.overlay.frame_budget_micros()));
            let bounds = Rect::new(client.x + roi.x, client.y + roi.y, roi.width, roi.height);
            let surface = (self.services.overlay_surface)();

            // start blocks until the render thread has created its surface
            let started = tokio::task::spawn_blocking(move || {
                let mut overlay = overlay;
                overlay.start(surface, bounds).map(|()| overlay)
            })
            .await;

            match started {
                Ok(Ok(overlay)) => Some(overlay),
                Ok(Err(e)) => {
                    // capture keeps running without annotations
                    tracing::warn!("[OVERLAY] Failed to start: {}", e);
                    None
                }
                Err(e) => {
                    tracing::error!("[OVERLAY] Start task error: {}", e);
                    None
                }
            }
        } else {
            None
        };

        self.session = Some(Session {
            queue,
            capture,
            ocr,
            overlay,
        });
        self.set_status("Capturing", true).await;
    }

    /// Hand the session to a background cleanup, returns immediately
    pub async fn stop_capture(&mut self) {
        let Some(session) = self.session.take() else {
            if self.cleanups_in_flight > 0 {
                self.set_status("Stopping...", false).await;
            }
            return;
        };

        self.assembler.reset();
        self.set_status("Stopping...", false).await;

        self.cleanups_in_flight += 1;
        let tx = self.cleanup_tx.clone();
        tokio::spawn(async move {
            let summary = match tokio::task::spawn_blocking(move || session.shutdown()).await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::error!("[PIPELINE] Cleanup task error: {}", e);
                    ShutdownSummary::default()
                }
            };
            let _ = tx.send(summary).await;
        });
    }

    pub async fn request_shutdown(&mut self) {
        if self.shutdown_requested {
            tracing::info!("[PIPELINE] Shutdown already in progress");
        } else {
            tracing::info!("[PIPELINE] Shutdown requested");
            self.shutdown_requested = true;
        }
        self.stop_capture().await;
    }

    /// One assembler pass over the OCR worker's latest results
    pub fn poll(&mut self) {
        let Some(session) = &self.session else {
            self.assembler.reset();
            return;
        };

        let segments = session.ocr.latest_results();
        let Some(assembled) = self.assembler.try_assemble(&segments) else {
            return;
        };

        tracing::debug!("[PIPELINE] Stable sentence {:?}", assembled.text);
        self.assembler.mark_in_flight(&assembled.text);
        self.dispatcher.dispatch(assembled.text, assembled.segments);
    }

    pub async fn handle_completion(&mut self, completion: Completion) {
        let Completion {
            text,
            mut tokens,
            segments,
        } = completion;

        self.dispatcher.complete(&text);
        self.assembler.clear_in_flight(&text);

        if text.is_empty() {
            return;
        }
        if tokens.is_empty() {
            tracing::warn!("[PIPELINE] Tokenization of {:?} produced no tokens", text);
            return;
        }

        place_tokens(&mut tokens, &segments);
        self.assembler.mark_published(&text);

        let record = SentenceRecord {
            id: Uuid::new_v4(),
            text: text.clone(),
            tokens: tokens.clone(),
            published_at: Local::now(),
        };
        self.history.push(record);

        {
            let mut status = self.state.status.pipeline.write().await;
            status.sentences_published += 1;
            status.last_published_at = Some(SystemTime::now());
        }

        if let Some(overlay) = self.session.as_ref().and_then(|s| s.overlay.as_ref()) {
            overlay.update_furigana(self.furigana.map(&tokens));
        }

        tracing::info!("[PIPELINE] Sentence detected: {}", text);
        self.emit(AppEvent::SentenceDetected { text, tokens }).await;
    }

    async fn finish_cleanup(&mut self, summary: ShutdownSummary) {
        self.cleanups_in_flight = self.cleanups_in_flight.saturating_sub(1);

        if summary.overlay_stopped {
            tracing::info!("[PIPELINE] Overlay worker cleaned up");
        }
        if summary.ocr_stopped {
            tracing::info!("[PIPELINE] OCR worker cleaned up");
        }
        if summary.capture_stopped {
            tracing::info!("[PIPELINE] Capture worker cleaned up");
        }

        self.emit(AppEvent::CaptureStopped(summary)).await;

        if self.session.is_none() && self.cleanups_in_flight == 0 {
            self.set_status("Stopped", false).await;
        }
    }

    /// Clamp `roi` to the target's client area and apply it
    ///
    /// Returns the applied rectangle, `None` without a valid target.
    pub async fn select_roi(&mut self, roi: Rect) -> Option<Rect> {
        let Some(target) = self.target_for_roi() else {
            tracing::warn!("[PIPELINE] No target selected, ROI ignored");
            return None;
        };
        let Some(client) = self.services.window_system.client_rect(target) else {
            tracing::warn!("[PIPELINE] Client area unavailable, ROI ignored");
            return None;
        };

        let clamped = clamp_roi(roi, client.width, client.height);
        self.roi = Some(clamped);
        if let Some(session) = &self.session {
            session.ocr.set_roi(Some(clamped));
        }
        self.state.config.write().await.ocr.roi = Some(clamped);

        tracing::info!(
            "[PIPELINE] ROI selected: ({}, {}, {}x{})",
            clamped.x,
            clamped.y,
            clamped.width,
            clamped.height
        );
        Some(clamped)
    }

    pub async fn clear_roi(&mut self) {
        self.roi = None;
        if let Some(session) = &self.session {
            session.ocr.clear_roi();
        }
        self.state.config.write().await.ocr.roi = None;
        tracing::info!("[PIPELINE] ROI cleared");
    }

    /// Remember which target later ROI selections refer to
    pub fn select_target(&mut self, target: CaptureTarget) {
        if self.target != Some(target) {
            self.roi = None;
        }
        self.target = Some(target);
    }

    pub async fn set_capture_interval(&mut self, seconds: f64) {
        let clamped = clamp_interval_seconds(seconds);
        let (interval_ms, required_hits) = {
            let mut config = self.state.config.write().await;
            config.capture.interval_seconds = clamped;
            (
                config.capture.interval_ms(),
                config.capture.required_stable_frames(),
            )
        };

        self.assembler.set_required_hits(required_hits);
        if let Some(session) = &self.session {
            session.capture.set_interval_ms(interval_ms);
        }
        tracing::info!("[PIPELINE] Capture interval {:.2}s", clamped);
    }

    /// Takes effect on the next capture start
    pub async fn set_ocr_engine(&mut self, kind: OcrEngineKind) {
        {
            let mut config = self.state.config.write().await;
            if config.ocr.engine == kind {
                return;
            }
            config.ocr.engine = kind;
        }

        tracing::info!("[PIPELINE] OCR engine set to {}", kind);
        if self.session.is_some() {
            tracing::info!("[PIPELINE] Engine change applies on the next capture start");
        }
    }

    pub async fn set_change_detection(&mut self, enabled: bool) {
        self.state.config.write().await.capture.change_detection = enabled;
        if let Some(session) = &self.session {
            session.capture.set_change_detection(enabled);
        }
    }

    pub fn clear_sentences(&mut self) {
        self.history.clear();
        self.assembler.reset();
        tracing::info!("[PIPELINE] Sentence list cleared");
    }

    pub fn sentences(&self) -> &[SentenceRecord] {
        &self.history
    }

    /// Save the frame behind the latest OCR results with its boxes drawn in
    pub async fn export_snapshot(&self) -> anyhow::Result<SnapshotPaths> {
        let session = self.session.as_ref().context("not capturing")?;
        let frame = session
            .ocr
            .last_frame()
            .context("no frame has been recognized yet")?;
        let segments = session.ocr.latest_results();
        let engine_name = session.ocr.statistics().engine_name;
        let dir = self.state.config.read().await.diagnostics.snapshot_dir.clone();

        let paths = tokio::task::spawn_blocking(move || {
            yomi_ocr::export_snapshot(&dir, &engine_name, &frame, &segments)
        })
        .await
        .context("snapshot task failed")??;
        Ok(paths)
    }

    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    pub fn roi(&self) -> Option<Rect> {
        self.roi
    }

    pub fn assembler(&self) -> &SentenceAssembler {
        &self.assembler
    }

    pub fn dispatcher(&self) -> &TokenizationDispatcher {
        &self.dispatcher
    }

    pub fn capture_statistics(&self) -> Option<CaptureStatistics> {
        self.session.as_ref().map(|s| s.capture.statistics())
    }

    pub fn ocr_statistics(&self) -> Option<OcrStatistics> {
        self.session.as_ref().map(|s| s.ocr.statistics())
    }

    pub fn overlay_statistics(&self) -> Option<OverlayStatistics> {
        self.session
            .as_ref()
            .and_then(|s| s.overlay.as_ref())
            .map(|o| o.statistics())
    }

    /// Handle completions and cleanups that already arrived, without `run`
    pub async fn drain_pending(&mut self) {
        while let Ok(Some(completion)) = self.completions_rx.try_recv() {
            self.handle_completion(completion).await;
        }
        while let Ok(Some(summary)) = self.cleanup_rx.try_recv() {
            self.finish_cleanup(summary).await;
        }
    }

    pub fn cleanups_in_flight(&self) -> usize {
        self.cleanups_in_flight
    }

    fn target_for_roi(&self) -> Option<CaptureTarget> {
        self.target
            .filter(|target| self.services.window_system.is_valid(*target))
    }

    async fn record_error(&self) {
        self.state.status.pipeline.write().await.error_count += 1;
    }

    async fn set_status(&self, message: &str, capturing: bool) {
        {
            let mut status = self.state.status.pipeline.write().await;
            if status.current_message == message && status.capturing == capturing {
                return;
            }
            status.current_message = message.to_string();
            status.capturing = capturing;
        }

        tracing::info!("[PIPELINE] Status: {}", message);
        self.emit(AppEvent::StatusUpdate {
            status: message.to_string(),
            capturing,
        })
        .await;
    }

    async fn emit(&self, event: AppEvent) {
        if let Err(e) = self.events_tx.send(event).await {
            tracing::debug!("[PIPELINE] Event dropped: {}", e);
        }
    }
}

/// Clamp a client-relative ROI into a `client_width` x `client_height` area
pub fn clamp_roi(roi: Rect, client_width: i32, client_height: i32) -> Rect {
    let client_width = client_width.max(1);
    let client_height = client_height.max(1);

    let x = roi.x.clamp(0, client_width - 1);
    let y = roi.y.clamp(0, client_height - 1);
    let width = roi.width.min(client_width - x).max(1);
    let height = roi.height.min(client_height - y).max(1);
    Rect::new(x, y, width, height)
}
