use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use yomi_core::{FpsCounter, OverlayError, OverlaySurface, StopSignal};
use yomi_types::{FuriganaInfo, OverlayStatistics, Rect};

use crate::buffer::FuriganaBuffer;

#[derive(Debug, Default)]
struct Shared {
    stop: StopSignal,
    running: AtomicBool,
    buffer: FuriganaBuffer,
    stats: Mutex<OverlayStatistics>,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, OverlayStatistics> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-rate render loop for the furigana overlay
pub struct OverlayWorker {
    frame_budget: Duration,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl OverlayWorker {
    pub fn new(frame_budget: Duration) -> Self {
        Self {
            frame_budget,
            shared: Arc::new(Shared::default()),
            handle: None,
        }
    }

    /// Create `surface` on the render thread and start drawing
    ///
    /// A no-op if already running. Fails if the surface can't be created.
    pub fn start(
        &mut self,
        surface: Box<dyn OverlaySurface>,
        bounds: Rect,
    ) -> Result<(), OverlayError> {
        if self.is_running() {
            return Ok(());
        }
        // Reap a loop that ended on its own (window closed)
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        self.shared.stop.reset();
        *self.shared.stats() = OverlayStatistics::default();

        let (ready_tx, ready_rx) = kanal::bounded(1);
        let shared = self.shared.clone();
        let budget = self.frame_budget;
        let handle = std::thread::Builder::new()
            .name("yomi-overlay".to_string())
            .spawn(move || run(surface, bounds, shared, budget, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.handle = Some(handle);
                tracing::info!("[OVERLAY] Started at {:?}", bounds);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(OverlayError::CreateFailed(
                    "render thread exited during startup".to_string(),
                ))
            }
        }
    }

    /// Idempotent, returns whether a running loop was stopped
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        self.shared.stop.stop();
        if handle.join().is_err() {
            tracing::error!("[OVERLAY] Render thread panicked");
        }
        tracing::info!("[OVERLAY] Stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Replace the annotations drawn from the next frame on
    pub fn update_furigana(&self, furigana: Vec<FuriganaInfo>) {
        self.shared.buffer.update(furigana);
    }

    pub fn statistics(&self) -> OverlayStatistics {
        self.shared.stats().clone()
    }
}

impl Drop for OverlayWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    mut surface: Box<dyn OverlaySurface>,
    bounds: Rect,
    shared: Arc<Shared>,
    budget: Duration,
    ready_tx: kanal::Sender<Result<(), OverlayError>>,
) {
    if let Err(e) = surface.create(bounds) {
        let _ = ready_tx.send(Err(e));
        return;
    }
    shared.running.store(true, Ordering::SeqCst);
    let _ = ready_tx.send(Ok(()));

    let mut visible: Vec<FuriganaInfo> = shared.buffer.snapshot();
    let mut fps = FpsCounter::new();

    while !shared.stop.is_stopped() {
        let started = Instant::now();

        if !surface.process_messages() {
            tracing::info!("[OVERLAY] Window closed");
            break;
        }

        let updated = match shared.buffer.take_if_updated() {
            Some(furigana) => {
                visible = furigana;
                true
            }
            None => false,
        };

        surface.draw(&visible);

        {
            let mut stats = shared.stats();
            stats.frames_rendered += 1;
            if updated {
                stats.furigana_updates += 1;
            }
            if let Some(rate) = fps.tick() {
                stats.current_fps = rate;
            }
        }

        // Overran frames go straight to the next one
        let elapsed = started.elapsed();
        if elapsed < budget && shared.stop.wait_timeout(budget - elapsed) {
            break;
        }
    }

    surface.destroy();
    shared.running.store(false, Ordering::SeqCst);
}
