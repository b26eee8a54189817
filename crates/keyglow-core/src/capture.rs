//! Frame capture: turning the current keyboard state into image bytes.

use crate::color::Rgb;
use crate::error::{Error, Result};
use crate::geometry::{Keyboard, KeyRect};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Encodes a snapshot of the keyboard.
pub trait FrameCapture {
    /// File extension of produced frames, without the dot
    fn extension(&self) -> &'static str;

    /// Capture the keyboard as it is painted right now.
    fn capture(&mut self, keyboard: &Keyboard) -> Result<Vec<u8>>;
}

/// Rasterises keys into a PNG. Labels are not drawn; a labelled keyboard
/// gets a one-time warning pointing at SVG frames.
#[derive(Debug, Clone)]
pub struct PngCapture {
    background: Rgb,
    labels_warned: bool,
}

impl Default for PngCapture {
    fn default() -> Self {
        Self::new(Rgb::new(0xFF, 0xFF, 0xFF))
    }
}

impl PngCapture {
    pub fn new(background: Rgb) -> Self {
        Self {
            background,
            labels_warned: false,
        }
    }

    /// True once a keyboard with labels has been captured without them
    pub fn labels_warned(&self) -> bool {
        self.labels_warned
    }

    /// Paint the keyboard into an RGBA buffer.
    pub fn rasterize(&self, keyboard: &Keyboard) -> Result<RgbaImage> {
        let width = keyboard.width().ceil() as u32;
        let height = keyboard.height().ceil() as u32;
        if width == 0 || height == 0 {
            return Err(Error::Capture(format!(
                "keyboard has no drawable area ({}x{})",
                width, height
            )));
        }

        let mut image = RgbaImage::from_pixel(width, height, Rgba(self.background.to_rgba()));
        for (key, fill) in keyboard.painted_keys() {
            fill_rect(&mut image, &key.rect, fill);
        }
        Ok(image)
    }
}

fn fill_rect(image: &mut RgbaImage, rect: &KeyRect, fill: Rgb) {
    let pixel = Rgba(fill.to_rgba());
    let x0 = (rect.x.round().max(0.0) as u32).min(image.width());
    let x1 = (rect.right().round().max(0.0) as u32).min(image.width());
    let y0 = (rect.y.round().max(0.0) as u32).min(image.height());
    let y1 = ((rect.y + rect.height).round().max(0.0) as u32).min(image.height());
    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x, y, pixel);
        }
    }
}

impl FrameCapture for PngCapture {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn capture(&mut self, keyboard: &Keyboard) -> Result<Vec<u8>> {
        if !self.labels_warned && !keyboard.labels().is_empty() {
            log::warn!(
                "PNG frames do not draw key labels ({} configured); use --format svg to keep them",
                keyboard.labels().len()
            );
            self.labels_warned = true;
        }
        let image = self.rasterize(keyboard)?;
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| Error::Capture(e.to_string()))?;
        Ok(bytes)
    }
}

/// Writes each frame as an SVG document, labels included.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgCapture;

impl FrameCapture for SvgCapture {
    fn extension(&self) -> &'static str {
        "svg"
    }

    fn capture(&mut self, keyboard: &Keyboard) -> Result<Vec<u8>> {
        Ok(keyboard.to_svg().into_bytes())
    }
}
