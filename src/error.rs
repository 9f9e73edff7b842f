//! Error types for the mask overlay pipeline

use thiserror::Error;

/// Result type alias for the overlay library
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Errors that can occur while configuring or running the pipeline
///
/// An empty mask is not an error: see [`crate::postprocess::FilterOutcome::NoForeground`].
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Invalid color format: {0:?}")]
    InvalidColorFormat(String),

    #[error("Inference unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config file could not be parsed: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl OverlayError {
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::InferenceUnavailable(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn color<S: Into<String>>(input: S) -> Self {
        Self::InvalidColorFormat(input.into())
    }

    /// Errors that only affect the current frame and leave the pipeline usable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InferenceUnavailable(_))
    }
}
