mod buffer;
mod headless;
mod worker;

pub use buffer::FuriganaBuffer;
pub use headless::HeadlessSurface;
pub use worker::OverlayWorker;
