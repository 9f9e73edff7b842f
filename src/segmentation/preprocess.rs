use crate::error::{OverlayError, Result};
use image::{imageops, GrayImage, RgbaImage};
use ndarray::Array4;

/// Preprocessor for converting RGBA frames to model input tensors
pub struct Preprocessor {
    size: u32,
}

impl Preprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Preprocess an RGBA image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to size x size if the caller has not already done so
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Split into red, green and blue planes, dropping alpha
    ///
    /// Returns: Array4<f32> with shape [1, 3, size, size]
    pub fn prepare(&self, image: &RgbaImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("prepare_tensor").entered();

        let resized;
        let source = if image.dimensions() != (self.size, self.size) {
            tracing::debug!(
                "Resizing {}x{} frame to {}x{}",
                image.width(),
                image.height(),
                self.size,
                self.size
            );
            resized = imageops::resize(image, self.size, self.size, imageops::FilterType::Triangle);
            &resized
        } else {
            image
        };

        let side = self.size as usize;
        let mut planes = vec![0.0f32; 3 * side * side];
        self.prepare_into(source.as_raw(), &mut planes)?;

        let len = planes.len();
        Array4::from_shape_vec((1, 3, side, side), planes).map_err(|_| {
            OverlayError::DimensionMismatch {
                expected: 3 * side * side,
                actual: len,
            }
        })
    }

    /// Write the planar tensor for an already-sized RGBA buffer into `out`
    ///
    /// `rgba` must hold exactly size*size pixels and `out` exactly 3*size*size floats.
    pub fn prepare_into(&self, rgba: &[u8], out: &mut [f32]) -> Result<()> {
        let pixels = self.size as usize * self.size as usize;
        if rgba.len() != pixels * 4 {
            return Err(OverlayError::DimensionMismatch {
                expected: pixels * 4,
                actual: rgba.len(),
            });
        }
        if out.len() != pixels * 3 {
            return Err(OverlayError::DimensionMismatch {
                expected: pixels * 3,
                actual: out.len(),
            });
        }

        let (red, rest) = out.split_at_mut(pixels);
        let (green, blue) = rest.split_at_mut(pixels);
        for (i, px) in rgba.chunks_exact(4).enumerate() {
            red[i] = px[0] as f32 / 255.0;
            green[i] = px[1] as f32 / 255.0;
            blue[i] = px[2] as f32 / 255.0;
        }

        Ok(())
    }

    /// Convert a mask to a grayscale image for visualization
    pub fn mask_to_luma(mask: &[f32], size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let idx = (y * size + x) as usize;
            let value = (mask[idx] * 255.0).clamp(0.0, 255.0) as u8;
            image::Luma([value])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_planar_layout_drops_alpha() {
        let pre = Preprocessor::new(2);
        let image = RgbaImage::from_fn(2, 2, |x, y| {
            let i = (y * 2 + x) as u8;
            Rgba([i * 10, 100 + i, 255, 7])
        });

        let tensor = pre.prepare(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);

        let flat: Vec<f32> = tensor.iter().copied().collect();
        assert_eq!(flat.len(), 12);
        // Red plane first, then green, then blue
        assert_eq!(flat[0], 0.0);
        assert_eq!(flat[3], 30.0 / 255.0);
        assert_eq!(flat[4], 100.0 / 255.0);
        assert_eq!(flat[7], 103.0 / 255.0);
        assert!(flat[8..].iter().all(|&v| v == 1.0));
        assert_eq!(tensor[[0, 0, 1, 0]], 20.0 / 255.0);
    }

    #[test]
    fn test_prepare_resizes_other_sizes() {
        let pre = Preprocessor::new(4);
        let image = RgbaImage::from_pixel(16, 8, Rgba([255, 0, 0, 255]));
        let tensor = pre.prepare(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 4, 4]);
        assert!(tensor.iter().take(16).all(|&v| (v - 1.0).abs() < 0.01));
        assert!(tensor.iter().skip(16).all(|&v| v.abs() < 0.01));
    }

    #[test]
    fn test_prepare_into_checks_lengths() {
        let pre = Preprocessor::new(2);
        let mut out = vec![0.0; 12];
        let err = pre.prepare_into(&[0u8; 12], &mut out).unwrap_err();
        assert!(matches!(err, OverlayError::DimensionMismatch { expected: 16, actual: 12 }));

        let mut short = vec![0.0; 11];
        assert!(pre.prepare_into(&[0u8; 16], &mut short).is_err());
    }

    #[test]
    fn test_mask_to_luma() {
        let luma = Preprocessor::mask_to_luma(&[0.0, 1.0, 0.5, 2.0], 2);
        assert_eq!(luma.as_raw(), &vec![0, 255, 127, 255]);
    }
}
