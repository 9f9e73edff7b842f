use crate::error::Result;
use ndarray::Array4;

/// Raw per-pixel foreground probabilities, row-major
///
/// May be longer than the grid; only the first `size * size` values are used.
pub type ProbabilityMap = Vec<f32>;

/// Trait for segmentation models
/// Allows swapping between different backends (ONNX Runtime, replayed masks, test doubles)
pub trait SegmentationModel {
    /// Run inference on a prepared tensor
    ///
    /// # Arguments
    /// * `tensor` - Planar RGB input with shape [1, 3, size, size], values 0.0-1.0
    ///
    /// # Returns
    /// * Probabilities, flattened in row-major order
    ///
    /// Any failure should be reported as `OverlayError::InferenceUnavailable` so the
    /// frame loop can skip the frame and retry on the next one.
    fn infer(&mut self, tensor: &Array4<f32>) -> Result<ProbabilityMap>;

    /// Reset internal state (for models with temporal/recurrent components)
    ///
    /// Called when a new capture session starts.
    fn reset_state(&mut self) {
        // Default implementation: no-op for stateless models
    }

    /// Side length of the square input the model expects
    fn input_size(&self) -> u32;

    /// Backend name for logging
    fn name(&self) -> &str;
}
