use super::CaptureSource;
use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::Path;

/// A single image treated as a one-frame capture session
pub struct StillImage {
    frame: Option<RgbaImage>,
    width: u32,
    height: u32,
}

impl StillImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading still image {}", path.display());

        let frame = image::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?
            .to_rgba8();

        Ok(Self::from_image(frame))
    }

    pub fn from_image(frame: RgbaImage) -> Self {
        let (width, height) = frame.dimensions();
        Self {
            frame: Some(frame),
            width,
            height,
        }
    }
}

impl CaptureSource for StillImage {
    fn capture_frame(&mut self) -> Result<Option<RgbaImage>> {
        Ok(self.frame.take())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yields_one_frame() {
        let mut source = StillImage::from_image(RgbaImage::new(3, 2));
        assert_eq!(source.resolution(), (3, 2));
        assert!(source.capture_frame().unwrap().is_some());
        assert!(source.capture_frame().unwrap().is_none());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(StillImage::open("/nonexistent/frame.png").is_err());
    }
}
