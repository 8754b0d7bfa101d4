use std::sync::Arc;
use std::time::Duration;

use kanal::AsyncReceiver;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use yomi_config::Config;
use yomi_core::{OcrEngine, OverlaySurface, Tokenizer};
use yomi_lang_japanese::ScriptTokenizer;
use yomi_ocr::OcrEngineBootstrapper;
use yomi_overlay::HeadlessSurface;
use yomi_types::{AppEvent, CaptureTarget, OcrEngineKind, Rect, ShutdownSummary};

use super::fakes::{
    EmptyTokenizer, FakeWindows, ScriptedOcr, kyoto_segments, static_backend_factory,
};
use crate::orchestrator::{Orchestrator, Services};
use crate::state::AppState;

fn test_config() -> Config {
    let mut config = Config::new();
    config.capture.interval_seconds = 0.1;
    config.ocr.engine = OcrEngineKind::Windows;
    config.ocr.allow_fallback = false;
    config.ocr.roi = None;
    config.ocr.poll_timeout_ms = 20;
    config.overlay.enabled = true;
    config.poll_interval_ms = 20;
    config
}

fn services(engines: OcrEngineBootstrapper, surface: HeadlessSurface) -> Services {
    let mut tokenizer = ScriptTokenizer::new();
    tokenizer.initialize("").unwrap();
    services_with(engines, surface, Arc::new(tokenizer))
}

fn services_with(
    engines: OcrEngineBootstrapper,
    surface: HeadlessSurface,
    tokenizer: Arc<dyn Tokenizer>,
) -> Services {
    Services {
        window_system: Arc::new(FakeWindows),
        backend_factory: static_backend_factory(),
        ocr_engines: engines,
        tokenizer,
        overlay_surface: Box::new(move || Box::new(surface.clone()) as Box<dyn OverlaySurface>),
    }
}

fn kyoto_engines() -> OcrEngineBootstrapper {
    let mut engines = OcrEngineBootstrapper::new();
    engines.register(OcrEngineKind::Windows, || {
        Box::new(ScriptedOcr::new(kyoto_segments())) as Box<dyn OcrEngine>
    });
    engines
}

async fn orchestrator(engines: OcrEngineBootstrapper) -> (Orchestrator, AsyncReceiver<AppEvent>) {
    let state = Arc::new(AppState::new(test_config()));
    let (tx, rx) = kanal::bounded_async(256);
    let orchestrator = Orchestrator::new(state, services(engines, HeadlessSurface::new()), tx).await;
    (orchestrator, rx)
}

/// Wait for the first event `pick` accepts, skipping the rest
async fn wait_for<T>(
    events: &AsyncReceiver<AppEvent>,
    mut pick: impl FnMut(AppEvent) -> Option<T>,
) -> T {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if let Some(found) = pick(event) {
                return found;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Test 1: a stable window publishes once, draws furigana and shuts down cleanly
#[tokio::test]
async fn test_full_session() {
    let state = Arc::new(AppState::new(test_config()));
    let surface = HeadlessSurface::new();
    let (events_tx, events) = kanal::bounded_async(256);
    let (commands_tx, commands) = kanal::bounded_async(16);

    let orchestrator =
        Orchestrator::new(state.clone(), services(kyoto_engines(), surface.clone()), events_tx).await;
    let run = tokio::spawn(orchestrator.run(commands, CancellationToken::new()));

    commands_tx
        .send(AppEvent::StartCapture {
            target: CaptureTarget::Window(1),
        })
        .await
        .unwrap();

    let capturing = wait_for(&events, |event| match event {
        AppEvent::StatusUpdate { status, capturing } if status == "Capturing" => Some(capturing),
        _ => None,
    })
    .await;
    assert!(capturing);

    let (text, tokens) = wait_for(&events, |event| match event {
        AppEvent::SentenceDetected { text, tokens } => Some((text, tokens)),
        _ => None,
    })
    .await;
    assert_eq!(text, "京都へ");
    assert_eq!(tokens[0].surface, "京都");
    assert_eq!(tokens[0].bbox, Rect::new(10, 10, 60, 20));

    // The overlay picks up the furigana on its next frame
    timeout(Duration::from_secs(5), async {
        while surface.last_drawn().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("overlay never drew");
    let drawn = surface.last_drawn();
    assert_eq!(drawn[0].base_text, "京都");
    assert_eq!(drawn[0].reading, "きょうと");
    assert!(drawn[0].needs_ruby);
    assert!(!drawn[1].needs_ruby);
    assert_eq!(surface.bounds(), Some(Rect::new(100, 200, 320, 240)));

    // Same text on screen, nothing new should be published
    tokio::time::sleep(Duration::from_millis(200)).await;
    commands_tx.send(AppEvent::RequestShutdown).await.unwrap();

    let mut summaries = Vec::new();
    let mut sentences = 0;
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.expect("event channel closed") {
                AppEvent::SentenceDetected { .. } => sentences += 1,
                AppEvent::CaptureStopped(summary) => summaries.push(summary),
                AppEvent::ShutdownComplete => break,
                _ => {}
            }
        }
    })
    .await
    .expect("shutdown never completed");

    assert_eq!(sentences, 0);
    assert_eq!(
        summaries,
        [ShutdownSummary {
            overlay_stopped: true,
            ocr_stopped: true,
            capture_stopped: true,
        }]
    );
    assert!(run.await.unwrap().is_ok());
    assert!(surface.is_destroyed());

    let status = state.status.pipeline.read().await;
    assert_eq!(status.sentences_published, 1);
    assert!(!status.capturing);
    assert_eq!(status.current_message, "Stopped");
}

/// Test 2: no usable OCR engine leaves the pipeline idle
#[tokio::test]
async fn test_engine_init_failure() {
    let (mut orchestrator, events) = orchestrator(OcrEngineBootstrapper::new()).await;

    orchestrator.start_capture(CaptureTarget::Window(1)).await;
    assert!(!orchestrator.is_capturing());

    let (status, capturing) = wait_for(&events, |event| match event {
        AppEvent::StatusUpdate { status, capturing } => Some((status, capturing)),
        _ => None,
    })
    .await;
    assert_eq!(status, "OCR engine initialization failed");
    assert!(!capturing);
}

/// Test 3: a window that can't be measured is reported before anything starts
#[tokio::test]
async fn test_invalid_target() {
    let (mut orchestrator, events) = orchestrator(kyoto_engines()).await;

    orchestrator.start_capture(CaptureTarget::Window(7)).await;
    assert!(!orchestrator.is_capturing());

    let status = wait_for(&events, |event| match event {
        AppEvent::StatusUpdate { status, .. } => Some(status),
        _ => None,
    })
    .await;
    assert_eq!(status, "Could not read the target window size");
}

/// Test 4: ROI selection needs a target and is clamped to its client area
#[tokio::test]
async fn test_select_roi() {
    let (mut orchestrator, _events) = orchestrator(kyoto_engines()).await;

    assert_eq!(orchestrator.select_roi(Rect::new(0, 0, 50, 50)).await, None);

    orchestrator.select_target(CaptureTarget::Window(1));
    let applied = orchestrator.select_roi(Rect::new(300, -5, 100, 40)).await;
    assert_eq!(applied, Some(Rect::new(300, 0, 20, 40)));
    assert_eq!(orchestrator.roi(), applied);

    // switching targets forgets the old region
    orchestrator.select_target(CaptureTarget::Window(2));
    assert_eq!(orchestrator.roi(), None);
    assert_eq!(orchestrator.select_roi(Rect::new(0, 0, 50, 50)).await, None);

    orchestrator.select_target(CaptureTarget::Window(1));
    orchestrator.select_roi(Rect::new(0, 0, 50, 50)).await;
    orchestrator.clear_roi().await;
    assert_eq!(orchestrator.roi(), None);
}

/// Test 5: stop without a session and clearing an empty history are no-ops
#[tokio::test]
async fn test_idle_commands() {
    let (mut orchestrator, events) = orchestrator(kyoto_engines()).await;

    orchestrator.stop_capture().await;
    orchestrator.clear_sentences();
    orchestrator.drain_pending().await;

    assert!(!orchestrator.is_capturing());
    assert_eq!(orchestrator.cleanups_in_flight(), 0);
    assert!(orchestrator.sentences().is_empty());
    assert!(events.is_empty());
}

/// Test 6: interval changes adjust how many stable polls a sentence needs
#[tokio::test]
async fn test_capture_interval() {
    let (mut orchestrator, _events) = orchestrator(kyoto_engines()).await;
    assert_eq!(orchestrator.assembler().required_hits(), 1);

    orchestrator.set_capture_interval(1.0).await;
    assert_eq!(orchestrator.assembler().required_hits(), 2);

    orchestrator.set_capture_interval(0.0).await;
    assert_eq!(orchestrator.assembler().required_hits(), 1);
}

/// Test 7: a sentence the tokenizer returns nothing for is not published and comes back
#[tokio::test]
async fn test_empty_tokenization_is_retried() {
    let tokenizer = EmptyTokenizer::default();
    let state = Arc::new(AppState::new(test_config()));
    let (events_tx, events) = kanal::bounded_async(256);
    let services = services_with(
        kyoto_engines(),
        HeadlessSurface::new(),
        Arc::new(tokenizer.clone()),
    );
    let mut orchestrator = Orchestrator::new(state.clone(), services, events_tx).await;

    orchestrator.start_capture(CaptureTarget::Window(1)).await;
    assert!(orchestrator.is_capturing());

    timeout(Duration::from_secs(5), async {
        while tokenizer.calls() < 2 {
            orchestrator.poll();
            tokio::time::sleep(Duration::from_millis(20)).await;
            orchestrator.drain_pending().await;
        }
    })
    .await
    .expect("sentence was never dispatched again");

    let seen = tokenizer.seen.lock().unwrap().clone();
    assert_eq!(seen[..2], ["京都へ", "京都へ"]);
    assert!(orchestrator.sentences().is_empty());
    assert_eq!(orchestrator.assembler().last_published(), "");
    assert_eq!(state.status.pipeline.read().await.sentences_published, 0);

    orchestrator.stop_capture().await;
    finish_cleanups(&mut orchestrator).await;

    while let Ok(Some(event)) = events.try_recv() {
        assert!(
            !matches!(event, AppEvent::SentenceDetected { .. }),
            "unexpected {event:?}"
        );
    }
}

async fn finish_cleanups(orchestrator: &mut Orchestrator) {
    timeout(Duration::from_secs(5), async {
        while orchestrator.cleanups_in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            orchestrator.drain_pending().await;
        }
    })
    .await
    .expect("cleanup never finished");
}

/// Test 8: an overlay that can't open leaves capture and OCR running
#[tokio::test]
async fn test_overlay_failure_keeps_capturing() {
    let state = Arc::new(AppState::new(test_config()));
    let (events_tx, events) = kanal::bounded_async(256);
    let services = services(kyoto_engines(), HeadlessSurface::failing());
    let mut orchestrator = Orchestrator::new(state, services, events_tx).await;

    orchestrator.start_capture(CaptureTarget::Window(1)).await;
    assert!(orchestrator.is_capturing());
    assert!(orchestrator.overlay_statistics().is_none());
    assert!(orchestrator.capture_statistics().is_some());
    assert!(orchestrator.ocr_statistics().is_some());

    orchestrator.stop_capture().await;
    finish_cleanups(&mut orchestrator).await;

    let summary = wait_for(&events, |event| match event {
        AppEvent::CaptureStopped(summary) => Some(summary),
        _ => None,
    })
    .await;
    assert_eq!(
        summary,
        ShutdownSummary {
            overlay_stopped: false,
            ocr_stopped: true,
            capture_stopped: true,
        }
    );
}

/// Test 9: ending a session shuts the OCR engine down once
#[tokio::test]
async fn test_session_end_shuts_engine_down() {
    let shutdowns = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let mut engines = OcrEngineBootstrapper::new();
    let counter = shutdowns.clone();
    engines.register(OcrEngineKind::Windows, move || {
        let mut engine = ScriptedOcr::new(kyoto_segments());
        engine.shutdowns = counter.clone();
        Box::new(engine) as Box<dyn OcrEngine>
    });
    let (mut orchestrator, _events) = orchestrator(engines).await;

    orchestrator.start_capture(CaptureTarget::Window(1)).await;
    assert!(orchestrator.is_capturing());
    assert_eq!(shutdowns.load(std::sync::atomic::Ordering::SeqCst), 0);

    orchestrator.stop_capture().await;
    finish_cleanups(&mut orchestrator).await;
    assert_eq!(shutdowns.load(std::sync::atomic::Ordering::SeqCst), 1);
}
