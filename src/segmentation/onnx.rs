use super::types::{ProbabilityMap, SegmentationModel};
use crate::error::{OverlayError, Result};
use anyhow::Context;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Single-input, single-output person segmentation network run through ONNX Runtime
///
/// The model takes [1, 3, size, size] planar RGB in [0, 1] and returns one probability plane
/// first in its output tensor. Any trailing channels or padding are left to the pipeline,
/// which only reads the first size*size values.
pub struct OnnxSegmenter {
    session: Session,
    size: u32,
}

impl OnnxSegmenter {
    /// Create a new segmenter from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `size` - Square input resolution the model was exported with
    pub fn new<P: AsRef<Path>>(model_path: P, size: u32) -> anyhow::Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading ONNX model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("ONNX model loaded successfully");
        tracing::debug!(
            "Model inputs: {:?}, outputs: {:?}",
            session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            session.outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>()
        );

        Ok(Self { session, size })
    }
}

impl SegmentationModel for OnnxSegmenter {
    fn infer(&mut self, tensor: &Array4<f32>) -> Result<ProbabilityMap> {
        let _span = tracing::debug_span!("onnx_infer").entered();

        let (n, c, h, w) = tensor.dim();
        let data: Vec<f32> = tensor.iter().copied().collect();
        let input = Tensor::from_array(([n, c, h, w], data))
            .map_err(|e| OverlayError::inference(format!("Failed to build input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| OverlayError::inference(format!("Failed to run inference: {e}")))?;

        let (_, probabilities) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| OverlayError::inference(format!("Unexpected output tensor: {e}")))?;

        Ok(probabilities.to_vec())
    }

    fn input_size(&self) -> u32 {
        self.size
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
