mod still;
#[cfg(feature = "webcam")]
mod v4l_capture;

pub use still::StillImage;
#[cfg(feature = "webcam")]
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbaImage;

/// Trait for frame sources
pub trait CaptureSource {
    /// Grab the newest available frame
    ///
    /// Returns `None` once the source has nothing more to give (a still image after its
    /// single frame). Live sources never queue: each call returns the latest frame.
    fn capture_frame(&mut self) -> Result<Option<RgbaImage>>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}
