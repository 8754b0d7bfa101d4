use image::buffer::ConvertBuffer;
use image::{RgbImage, RgbaImage, imageops};

use crate::geometry::Rect;

/// One captured bitmap, always 3-channel RGB
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Drop the alpha channel of a capture result
    pub fn from_rgba(rgba: &RgbaImage) -> Self {
        Self {
            image: rgba.convert(),
        }
    }

    /// Uniformly colored frame, mostly useful for tests and placeholders
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Copy out the part of `rect` that lies inside the frame
    ///
    /// Returns `None` when the rectangle doesn't intersect the frame at all.
    pub fn crop(&self, rect: Rect) -> Option<Frame> {
        let safe = rect.intersect(&self.bounds())?;
        let cropped = imageops::crop_imm(
            &self.image,
            safe.x as u32,
            safe.y as u32,
            safe.width as u32,
            safe.height as u32,
        )
        .to_image();
        Some(Frame::new(cropped))
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Frame::new(image)
    }
}
