//! Real-time segmentation mask overlay
//!
//! Turns the per-pixel probabilities of a segmentation network into a stable colored
//! overlay: keep the largest connected foreground region, smooth it over time and render
//! it as RGBA.

pub mod capture;
pub mod config;
pub mod driver;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod postprocess;
pub mod segmentation;

pub use config::{OverlayColor, PipelineConfig, SessionPolicy};
pub use error::{OverlayError, Result};
pub use pipeline::{FrameOutcome, MaskPipeline, SessionHandle};
