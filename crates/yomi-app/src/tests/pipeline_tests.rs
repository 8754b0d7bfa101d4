use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::timeout;
use yomi_capture::{CaptureWorker, FrameQueue, StepResult};
use yomi_config::assembler::AssemblerConfig;
use yomi_config::capture::CaptureConfig;
use yomi_core::{OcrEngine, Tokenizer};
use yomi_lang_japanese::ScriptTokenizer;
use yomi_ocr::OcrWorker;
use yomi_types::CaptureTarget;

use super::fakes::{FakeWindows, ScriptedOcr, kyoto_segments, static_backend_factory};
use crate::assembler::SentenceAssembler;
use crate::dispatcher::TokenizationDispatcher;

/// Test 1: two stable ticks at 1s cadence publish "京都へ" exactly once
#[tokio::test]
async fn test_kyoto_published_once() {
    let capture = CaptureConfig::default();
    let mut assembler = SentenceAssembler::new(
        AssemblerConfig::default(),
        capture.required_stable_frames(),
    );
    assert_eq!(assembler.required_hits(), 2);

    let mut tokenizer = ScriptTokenizer::new();
    tokenizer.initialize("").unwrap();
    let (tx, rx) = kanal::unbounded_async();
    let mut dispatcher = TokenizationDispatcher::new(Arc::new(tokenizer), tx);

    // tick 1
    assert_eq!(assembler.try_assemble(&kyoto_segments()), None);

    // tick 2
    let assembled = assembler.try_assemble(&kyoto_segments()).unwrap();
    assert_eq!(assembled.text, "京都へ");
    assembler.mark_in_flight(&assembled.text);
    assert!(dispatcher.dispatch(assembled.text, assembled.segments));

    // still in flight
    assert_eq!(assembler.try_assemble(&kyoto_segments()), None);

    let completion = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("tokenizer never finished")
        .unwrap();
    let surfaces: Vec<&str> = completion.tokens.iter().map(|t| t.surface.as_str()).collect();
    assert_eq!(surfaces, ["京都", "へ"]);

    dispatcher.complete(&completion.text);
    assembler.clear_in_flight(&completion.text);
    assembler.mark_published(&completion.text);

    // tick 3 onwards
    for _ in 0..3 {
        assert_eq!(assembler.try_assemble(&kyoto_segments()), None);
    }
    assert_eq!(assembler.last_published(), "京都へ");
}

/// Test 2: identical frames with change detection reach OCR only once
#[tokio::test]
async fn test_identical_frames_recognized_once() {
    let config = CaptureConfig {
        interval_seconds: 0.1,
        change_detection: true,
        ..CaptureConfig::default()
    };
    let queue = Arc::new(FrameQueue::new(config.queue_capacity));
    let worker = CaptureWorker::new(
        queue.clone(),
        Arc::new(FakeWindows),
        static_backend_factory(),
        &config,
    );

    let mut capture_loop = worker.prepare(CaptureTarget::Window(1)).unwrap();
    let steps: Vec<StepResult> = (0..3).map(|_| capture_loop.step()).collect();
    assert_eq!(
        steps,
        [StepResult::Pushed, StepResult::Skipped, StepResult::Skipped]
    );
    assert_eq!(queue.len(), 1);
    assert_eq!(worker.statistics().frames_skipped, 2);

    let engine = ScriptedOcr::new(kyoto_segments()).initialized();
    let calls = engine.calls.clone();
    let engine: Arc<dyn OcrEngine> = Arc::new(engine);
    let mut ocr = OcrWorker::new(queue.clone(), Some(engine), Duration::from_millis(20));
    ocr.start().unwrap();

    timeout(Duration::from_secs(5), async {
        while ocr.statistics().total_frames_processed < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("frame never processed");

    // give a stray second frame the chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(ocr.stop());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ocr.statistics().total_frames_processed, 1);
    assert_eq!(ocr.statistics().total_text_segments, 2);
    assert_eq!(ocr.latest_results(), kyoto_segments());
    assert!(queue.is_empty());
}
