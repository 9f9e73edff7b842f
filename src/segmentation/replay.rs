use super::types::{ProbabilityMap, SegmentationModel};
use crate::error::{OverlayError, Result};
use image::imageops;
use ndarray::Array4;
use std::path::Path;

/// Replays pre-computed probability maps instead of running a network
///
/// Useful for reproducing a recorded session or exercising the overlay without a model.
/// Maps are returned in order and wrap around.
pub struct MaskReplay {
    size: u32,
    maps: Vec<ProbabilityMap>,
    next: usize,
}

impl MaskReplay {
    pub fn new(size: u32, maps: Vec<ProbabilityMap>) -> Result<Self> {
        if maps.is_empty() {
            return Err(OverlayError::config("mask replay needs at least one map"));
        }
        Ok(Self { size, maps, next: 0 })
    }

    /// Load a grayscale mask image; white is foreground
    pub fn from_image<P: AsRef<Path>>(path: P, size: u32) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading replay mask from {}", path.display());

        let luma = image::open(path)?.to_luma8();
        let luma = if luma.dimensions() != (size, size) {
            imageops::resize(&luma, size, size, imageops::FilterType::Triangle)
        } else {
            luma
        };

        let map = luma.pixels().map(|p| p[0] as f32 / 255.0).collect();
        Self::new(size, vec![map])
    }
}

impl SegmentationModel for MaskReplay {
    fn infer(&mut self, tensor: &Array4<f32>) -> Result<ProbabilityMap> {
        let side = self.size as usize;
        if tensor.shape() != [1, 3, side, side] {
            return Err(OverlayError::inference(format!(
                "expected input [1, 3, {side}, {side}], got {:?}",
                tensor.shape()
            )));
        }

        let map = self.maps[self.next].clone();
        self.next = (self.next + 1) % self.maps.len();
        Ok(map)
    }

    fn reset_state(&mut self) {
        self.next = 0;
    }

    fn input_size(&self) -> u32 {
        self.size
    }

    fn name(&self) -> &str {
        "mask-replay"
    }
}
