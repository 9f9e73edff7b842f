use crate::config::OverlayColor;
use crate::error::{OverlayError, Result};
use image::{imageops, Rgba, RgbaImage};

/// Turns a smoothed mask into a colored RGBA overlay at grid resolution
///
/// Cells above the threshold get the overlay color with alpha `base_alpha * opacity`,
/// every other cell is fully transparent. The buffer is reused across frames.
pub struct OverlayCompositor {
    size: u32,
    threshold: f32,
    color: OverlayColor,
    opacity: f32,
    buffer: RgbaImage,
}

impl OverlayCompositor {
    pub fn new(size: u32, threshold: f32, color: OverlayColor, opacity: f32) -> Self {
        Self {
            size,
            threshold,
            color,
            opacity,
            buffer: RgbaImage::new(size, size),
        }
    }

    pub fn color(&self) -> OverlayColor {
        self.color
    }

    /// Alpha written for foreground cells
    pub fn foreground_alpha(&self) -> u8 {
        (self.color.a as f32 * self.opacity).clamp(0.0, 255.0) as u8
    }

    /// Last rendered overlay
    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Make the whole overlay transparent
    pub fn clear(&mut self) {
        for pixel in self.buffer.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Render the overlay for `mask` into the internal buffer
    pub fn render(&mut self, mask: &[f32]) -> Result<&RgbaImage> {
        let _span = tracing::debug_span!("composite").entered();

        let expected = self.size as usize * self.size as usize;
        if mask.len() != expected {
            return Err(OverlayError::DimensionMismatch {
                expected,
                actual: mask.len(),
            });
        }

        let alpha = self.foreground_alpha();
        let foreground = Rgba([self.color.r, self.color.g, self.color.b, alpha]);
        let transparent = Rgba([0, 0, 0, 0]);

        for (pixel, &value) in self.buffer.pixels_mut().zip(mask.iter()) {
            *pixel = if value > self.threshold {
                foreground
            } else {
                transparent
            };
        }

        Ok(&self.buffer)
    }

    /// Render and upscale to a caller-chosen size with nearest-neighbour sampling
    pub fn render_scaled(&mut self, mask: &[f32], width: u32, height: u32) -> Result<RgbaImage> {
        let size = self.size;
        let overlay = self.render(mask)?;
        if (width, height) == (size, size) {
            return Ok(overlay.clone());
        }
        Ok(imageops::resize(overlay, width, height, imageops::FilterType::Nearest))
    }
}
