mod analysis;
mod backend;
mod frame_queue;
mod occlusion;
mod screen;
mod worker;

pub use analysis::{ChangeDetector, Histogram, correlation, is_nearly_black};
pub use backend::{ActiveBackend, BackendFactory, BackendSelector};
pub use frame_queue::FrameQueue;
pub use occlusion::{client_crop_rect, is_significant_occlusion, occlusion_ratio};
pub use screen::{
    ScreenDuplicationBackend, WindowBlitBackend, WindowInfo, XcapWindowSystem, find_window_by_title,
    list_windows, xcap_backend_factory,
};
pub use worker::{CaptureLoop, CaptureState, CaptureWorker, StepResult};
