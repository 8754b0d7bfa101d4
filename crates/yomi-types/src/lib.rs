pub mod frame;
pub mod geometry;
pub mod types;

pub use frame::Frame;
pub use geometry::{Point, Rect};
pub use types::*;
