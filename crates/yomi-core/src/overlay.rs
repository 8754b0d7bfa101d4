use yomi_types::{FuriganaInfo, Rect};

use crate::error::OverlayError;

/// Always-on-top, click-through window the furigana get painted on
///
/// Created, pumped and destroyed on the overlay render thread only.
pub trait OverlaySurface: Send {
    fn create(&mut self, bounds: Rect) -> Result<(), OverlayError>;

    /// Pump pending window-system messages, `false` once the window is gone
    fn process_messages(&mut self) -> bool;

    fn draw(&mut self, furigana: &[FuriganaInfo]);

    fn destroy(&mut self);
}
