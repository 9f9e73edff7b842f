#[cfg(feature = "onnx")]
mod onnx;
mod preprocess;
mod replay;
pub mod types;

#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use preprocess::Preprocessor;
pub use replay::MaskReplay;
pub use types::{ProbabilityMap, SegmentationModel};

use anyhow::Result;
use std::path::Path;

/// Create a segmentation model from a file
///
/// `.onnx` files are run through ONNX Runtime; any image file is replayed as a fixed mask.
pub fn create_model(path: &Path, size: u32) -> Result<Box<dyn SegmentationModel>> {
    let is_onnx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));

    if is_onnx {
        return load_onnx(path, size);
    }

    let model = MaskReplay::from_image(path, size)?;
    Ok(Box::new(model))
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path, size: u32) -> Result<Box<dyn SegmentationModel>> {
    Ok(Box::new(OnnxSegmenter::new(path, size)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &Path, _size: u32) -> Result<Box<dyn SegmentationModel>> {
    anyhow::bail!(
        "{} is an ONNX model but this build has no ONNX support (rebuild with --features onnx)",
        path.display()
    )
}
