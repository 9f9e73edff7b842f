use super::OutputSink;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Writes composited frames to image files
///
/// With a single frame the path is used as given; later frames get a `_NNNNN` suffix
/// before the extension.
pub struct ImageFileOutput {
    path: PathBuf,
    written: u64,
}

impl ImageFileOutput {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        tracing::info!("Writing frames to {}", path.display());
        Self { path, written: 0 }
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }

    fn frame_path(&self) -> PathBuf {
        if self.written == 0 {
            return self.path.clone();
        }
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        let ext = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".to_string());
        self.path
            .with_file_name(format!("{}_{:05}.{}", stem, self.written, ext))
    }
}

impl OutputSink for ImageFileOutput {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let path = self.frame_path();
        frame
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!("Wrote {}", path.display());
        self.written += 1;
        Ok(())
    }

    fn resolution(&self) -> Option<(u32, u32)> {
        None
    }
}
