use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use xcap::{Monitor, Window};
use yomi_core::{BackendKind, CaptureBackend, CaptureError, CaptureOutcome, WindowSystem};
use yomi_types::{CaptureTarget, Frame, Point, Rect};

use crate::backend::BackendFactory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: u32,
    pub title: String,
}

/// Visible, titled top-level windows
pub fn list_windows() -> Result<Vec<WindowInfo>, CaptureError> {
    let windows = Window::all().map_err(|e| CaptureError::BackendInit(e.to_string()))?;
    Ok(windows
        .into_iter()
        .filter(|w| !w.title().is_empty() && !w.is_minimized())
        .map(|w| WindowInfo {
            id: w.id(),
            title: w.title().to_string(),
        })
        .collect())
}

/// First window whose title contains `title`, case-insensitive
pub fn find_window_by_title(title: &str) -> Result<Option<u32>, CaptureError> {
    let needle = title.to_lowercase();
    Ok(list_windows()?
        .into_iter()
        .find(|w| w.title.to_lowercase().contains(&needle))
        .map(|w| w.id))
}

/// Factory for the xcap-backed capture backends
///
/// `duplication_timeout` bounds how long the monitor backend waits for a
/// changed screen before reporting a timeout.
pub fn xcap_backend_factory(duplication_timeout: Duration) -> BackendFactory {
    Arc::new(move |kind| match kind {
        BackendKind::Duplication => Box::new(ScreenDuplicationBackend::new(duplication_timeout)),
        BackendKind::Blit => Box::new(WindowBlitBackend::new()),
    })
}

fn find_window(id: u32) -> Option<Window> {
    Window::all().ok()?.into_iter().find(|w| w.id() == id)
}

fn window_rect(window: &Window) -> Rect {
    Rect::new(
        window.x(),
        window.y(),
        window.width() as i32,
        window.height() as i32,
    )
}

fn monitor_rect(monitor: &Monitor) -> Rect {
    Rect::new(
        monitor.x(),
        monitor.y(),
        monitor.width() as i32,
        monitor.height() as i32,
    )
}

/// Monitor containing the centre of `rect`, else the first one
fn monitor_for(rect: Option<Rect>) -> Option<Monitor> {
    let monitors = Monitor::all().ok()?;
    let index = rect
        .and_then(|rect| {
            let (cx, cy) = (rect.center_x(), rect.center_y());
            monitors.iter().position(|m| {
                let bounds = monitor_rect(m);
                cx >= bounds.x && cy >= bounds.y && cx < bounds.right() && cy < bounds.bottom()
            })
        })
        .unwrap_or(0);
    monitors.into_iter().nth(index)
}

/// Whole-monitor capture standing in for desktop duplication
///
/// Returns composed screen pixels, so anything on top of the target ends up
/// in the frame. Like duplication it only delivers a frame once the screen
/// changed, waiting at most `timeout`. Only the monitor id is kept so the
/// backend stays `Send`.
#[derive(Debug)]
pub struct ScreenDuplicationBackend {
    monitor_id: Option<u32>,
    timeout: Duration,
    last: Option<RgbaImage>,
}

impl ScreenDuplicationBackend {
    pub fn new(timeout: Duration) -> Self {
        Self {
            monitor_id: None,
            timeout,
            last: None,
        }
    }
}

impl CaptureBackend for ScreenDuplicationBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Duplication
    }

    fn initialize(&mut self, target: CaptureTarget) -> Result<(), CaptureError> {
        let hint = match target {
            CaptureTarget::Desktop => None,
            CaptureTarget::Window(id) => {
                let window = find_window(id).ok_or(CaptureError::InvalidTarget(target))?;
                Some(window_rect(&window))
            }
        };

        let monitor = monitor_for(hint)
            .ok_or_else(|| CaptureError::BackendInit("no monitor found".to_string()))?;
        self.monitor_id = Some(monitor.id());
        self.last = None;
        Ok(())
    }

    fn capture_frame(&mut self) -> CaptureOutcome {
        let Some(id) = self.monitor_id else {
            return CaptureOutcome::Failed("backend not initialized".to_string());
        };

        let monitor = match Monitor::all() {
            Ok(monitors) => monitors.into_iter().find(|m| m.id() == id),
            Err(e) => return CaptureOutcome::Failed(e.to_string()),
        };
        let Some(monitor) = monitor else {
            return CaptureOutcome::Failed(format!("monitor {id} disappeared"));
        };

        let grab = || monitor.capture_image().map_err(|e| e.to_string());
        match acquire_changed(self.last.as_ref(), self.timeout, grab) {
            Ok(Some(image)) => {
                let frame = Frame::from_rgba(&image);
                self.last = Some(image);
                CaptureOutcome::Frame {
                    frame,
                    origin: Point::new(monitor.x(), monitor.y()),
                }
            }
            Ok(None) => CaptureOutcome::Timeout,
            Err(reason) => CaptureOutcome::Failed(reason),
        }
    }

    fn shutdown(&mut self) {
        self.monitor_id = None;
        self.last = None;
    }

    fn is_initialized(&self) -> bool {
        self.monitor_id.is_some()
    }
}

const ACQUIRE_POLL: Duration = Duration::from_millis(10);

/// Grab until the image differs from `previous` or `timeout` runs out
///
/// `Ok(None)` means nothing changed in time. The first grab always happens,
/// even with a zero timeout.
fn acquire_changed<F>(
    previous: Option<&RgbaImage>,
    timeout: Duration,
    mut grab: F,
) -> Result<Option<RgbaImage>, String>
where
    F: FnMut() -> Result<RgbaImage, String>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let image = grab()?;
        let changed = previous.is_none_or(|last| {
            last.dimensions() != image.dimensions() || last.as_raw() != image.as_raw()
        });
        if changed {
            return Ok(Some(image));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(ACQUIRE_POLL.min(deadline - now));
    }
}

/// Per-window capture, works for windows partially hidden behind others
#[derive(Debug, Default)]
pub struct WindowBlitBackend {
    window_id: Option<u32>,
}

impl WindowBlitBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureBackend for WindowBlitBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Blit
    }

    fn initialize(&mut self, target: CaptureTarget) -> Result<(), CaptureError> {
        match target {
            CaptureTarget::Desktop => Err(CaptureError::BackendInit(
                "window capture needs a window target".to_string(),
            )),
            CaptureTarget::Window(id) => {
                find_window(id).ok_or(CaptureError::InvalidTarget(target))?;
                self.window_id = Some(id);
                Ok(())
            }
        }
    }

    fn capture_frame(&mut self) -> CaptureOutcome {
        let Some(id) = self.window_id else {
            return CaptureOutcome::Failed("backend not initialized".to_string());
        };
        let Some(window) = find_window(id) else {
            return CaptureOutcome::Failed(format!("window {id} not found"));
        };

        match window.capture_image() {
            Ok(image) => CaptureOutcome::Frame {
                frame: Frame::from_rgba(&image),
                origin: Point::new(window.x(), window.y()),
            },
            Err(e) => CaptureOutcome::Failed(e.to_string()),
        }
    }

    fn shutdown(&mut self) {
        self.window_id = None;
    }

    fn is_initialized(&self) -> bool {
        self.window_id.is_some()
    }
}

/// Window queries answered from xcap's window list
///
/// xcap has no separate client area, the outer window rectangle is used.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapWindowSystem;

impl WindowSystem for XcapWindowSystem {
    fn is_valid(&self, target: CaptureTarget) -> bool {
        match target {
            CaptureTarget::Desktop => Monitor::all().map(|m| !m.is_empty()).unwrap_or(false),
            CaptureTarget::Window(id) => find_window(id).is_some(),
        }
    }

    fn is_minimized(&self, target: CaptureTarget) -> bool {
        match target {
            CaptureTarget::Desktop => false,
            CaptureTarget::Window(id) => find_window(id).is_some_and(|w| w.is_minimized()),
        }
    }

    fn client_rect(&self, target: CaptureTarget) -> Option<Rect> {
        match target {
            CaptureTarget::Desktop => monitor_for(None).map(|m| monitor_rect(&m)),
            CaptureTarget::Window(id) => find_window(id).map(|w| window_rect(&w)),
        }
    }

    fn occluders(&self, target: CaptureTarget) -> Vec<Rect> {
        let CaptureTarget::Window(id) = target else {
            return Vec::new();
        };
        let Ok(windows) = Window::all() else {
            return Vec::new();
        };

        // Window::all() is front to back
        windows
            .iter()
            .take_while(|w| w.id() != id)
            .filter(|w| !w.is_minimized() && w.width() > 0 && w.height() > 0)
            .map(window_rect)
            .collect()
    }
}
