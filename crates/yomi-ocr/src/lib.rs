mod bootstrap;
#[cfg(windows)]
mod com;
mod snapshot;
#[cfg(windows)]
mod windows_engine;
mod worker;

pub use bootstrap::{EngineFactory, OcrEngineBootstrapper};
#[cfg(windows)]
pub use com::ComGuard;
pub use snapshot::{
    SnapshotError, SnapshotPaths, annotate, export_snapshot, recognize_image_file, snapshot_json,
};
#[cfg(windows)]
pub use windows_engine::WindowsOcrEngine;
pub use worker::OcrWorker;
