mod blend;
mod file;
#[cfg(feature = "webcam")]
mod loopback;

pub use blend::blend_overlay;
pub use file::ImageFileOutput;
#[cfg(feature = "webcam")]
pub use loopback::V4L2Output;

use anyhow::Result;
use image::RgbImage;

/// Trait for output destinations
pub trait OutputSink {
    /// Write a composited frame to the output
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Get the expected output resolution, if the sink has a fixed one
    fn resolution(&self) -> Option<(u32, u32)>;
}
