use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use yomi_app::controller::AppController;
use yomi_app::orchestrator::Services;
use yomi_app::profile::{load_config, save_config};
use yomi_app::state::AppState;
use yomi_capture::{XcapWindowSystem, find_window_by_title, list_windows, xcap_backend_factory};
use yomi_config::Config;
use yomi_core::{OverlaySurface, Tokenizer};
use yomi_lang_japanese::ScriptTokenizer;
use yomi_ocr::OcrEngineBootstrapper;
use yomi_overlay::HeadlessSurface;
use yomi_types::{AppEvent, CaptureTarget};

#[derive(Parser, Debug)]
#[command(name = "yomi")]
#[command(version, about = "Live OCR and furigana for Japanese text in another window", long_about = None)]
struct Args {
    /// JSON config file, env defaults are used if missing
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Capture the first window whose title contains this text
    #[arg(short, long, conflicts_with_all = ["window_id", "desktop"])]
    window: Option<String>,

    /// Capture the window with this id
    #[arg(long, conflicts_with = "desktop")]
    window_id: Option<u32>,

    /// Capture the whole primary monitor
    #[arg(long)]
    desktop: bool,

    /// List capturable windows and exit
    #[arg(long)]
    list_windows: bool,

    /// Run OCR once on an image file, write an annotated snapshot and exit
    #[arg(long, value_name = "IMAGE")]
    sample: Option<PathBuf>,

    /// Write the effective config to `--config` and exit
    #[arg(long)]
    write_config: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.log_json);

    let config = load_config(&args.config)?;

    if args.write_config {
        return save_config(&args.config, &config);
    }

    if args.list_windows {
        for window in list_windows()? {
            println!("{:>10}  {}", window.id, window.title);
        }
        return Ok(());
    }

    if let Some(image) = &args.sample {
        return run_sample(&config, image);
    }

    let target = resolve_target(&args)?;

    let mut tokenizer = ScriptTokenizer::new();
    tokenizer
        .initialize(&config.tokenizer.dictionary_path)
        .context("failed to initialize tokenizer")?;

    let services = Services {
        window_system: Arc::new(XcapWindowSystem),
        backend_factory: xcap_backend_factory(Duration::from_millis(
            config.capture.duplication_timeout_ms,
        )),
        ocr_engines: OcrEngineBootstrapper::with_platform_engines(),
        tokenizer: Arc::new(tokenizer),
        overlay_surface: Box::new(|| Box::new(HeadlessSurface::new()) as Box<dyn OverlaySurface>),
    };

    let state = Arc::new(AppState::new(config));
    let controller = AppController::new(state);
    let mut tasks = controller.spawn_tasks(services).await;

    match target {
        Some(target) => {
            controller
                .commands()
                .send(AppEvent::StartCapture { target })
                .await?;
        }
        None => tracing::warn!("No capture target given, waiting for commands"),
    }

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("failed to listen for ctrl+c")?;
            tracing::info!("Shutdown requested");
            controller.shutdown();
        }
        Some(result) = tasks.join_next() => {
            log_task_exit(result);
            controller.shutdown();
        }
    }

    while let Some(result) = tasks.join_next().await {
        log_task_exit(result);
    }

    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(atty::is(atty::Stream::Stdout))
            .try_init();
    }
}

fn log_task_exit(result: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => tracing::debug!("task exited"),
        Ok(Err(e)) => tracing::error!("task failed: {:#}", e),
        Err(e) => tracing::error!("task panicked: {}", e),
    }
}

fn resolve_target(args: &Args) -> anyhow::Result<Option<CaptureTarget>> {
    if args.desktop {
        return Ok(Some(CaptureTarget::Desktop));
    }
    if let Some(id) = args.window_id {
        return Ok(Some(CaptureTarget::Window(id)));
    }
    if let Some(title) = &args.window {
        let id = find_window_by_title(title)?
            .with_context(|| format!("no window with a title containing {title:?}"))?;
        return Ok(Some(CaptureTarget::Window(id)));
    }
    Ok(None)
}

fn run_sample(config: &Config, image: &Path) -> anyhow::Result<()> {
    let engines = OcrEngineBootstrapper::with_platform_engines();
    let engine = engines
        .create(&config.ocr)
        .context("failed to initialize OCR engine")?;

    let (frame, segments) = yomi_ocr::recognize_image_file(engine.as_ref(), image)
        .with_context(|| format!("sample OCR failed for {}", image.display()))?;

    let lines: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
    if !lines.is_empty() {
        tracing::info!("Sample OCR text:\n{}", lines.join("\n"));
    }

    let paths = yomi_ocr::export_snapshot(
        &config.diagnostics.snapshot_dir,
        engine.engine_name(),
        &frame,
        &segments,
    )?;
    tracing::info!("Annotated sample written to {}", paths.image.display());
    engine.shutdown();
    Ok(())
}
