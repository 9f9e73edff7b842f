//! Per-frame mask post-processing
//!
//! `MaskPipeline` owns every buffer that lives across frames: the component filter's
//! scratch grids, the smoothed mask and the overlay image. Exactly one pass runs at a time
//! through `&mut self`; anything that wants inference for several frames in flight needs one
//! pipeline per frame.

use crate::config::{PipelineConfig, SessionPolicy};
use crate::error::{OverlayError, Result};
use crate::postprocess::{ComponentFilter, FilterOutcome, OverlayCompositor, TemporalSmoother};
use crate::segmentation::{Preprocessor, SegmentationModel};
use image::RgbaImage;
use ndarray::Array4;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The overlay was recomputed
    Rendered(FilterOutcome),
    /// Inference failed; the smoothed mask and overlay still show the previous frame
    Skipped,
    /// The session stopped or restarted while inference was running; the result was dropped
    Discarded,
}

/// Shared stop switch for a capture session
///
/// Clones can be handed to other threads (e.g. a Ctrl+C handler). Each `start` bumps a
/// generation counter so results that belong to an earlier session can be recognised.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    active: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl SessionHandle {
    fn start(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.active.store(true, Ordering::SeqCst);
        generation
    }

    /// Ask the frame loop to stop scheduling passes
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True if the session that was current at `generation` is still running
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_active() && self.generation() == generation
    }
}

pub struct MaskPipeline {
    size: u32,
    policy: SessionPolicy,
    preprocessor: Preprocessor,
    filter: ComponentFilter,
    smoother: TemporalSmoother,
    compositor: OverlayCompositor,
    session: SessionHandle,
    /// Probability grid for the current pass, truncated from the model output
    grid: Vec<f32>,
    last_outcome: Option<FilterOutcome>,
    frames: u64,
}

impl MaskPipeline {
    /// Build a pipeline from a validated config
    ///
    /// Fails on a bad color or out-of-range parameter before any frame is touched.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let color = config.color()?;
        let size = config.grid_size;

        tracing::info!(
            "Mask pipeline {}x{}: threshold={}, smoothing={}, color={}, opacity={}",
            size,
            size,
            config.threshold,
            config.smoothing_factor,
            color,
            config.overlay_opacity
        );

        Ok(Self {
            size,
            policy: config.session_policy,
            preprocessor: Preprocessor::new(size),
            filter: ComponentFilter::new(size, size, config.threshold),
            smoother: TemporalSmoother::new(config.grid_len(), config.smoothing_factor),
            compositor: OverlayCompositor::new(
                size,
                config.threshold,
                color,
                config.overlay_opacity,
            ),
            session: SessionHandle::default(),
            grid: vec![0.0; config.grid_len()],
            last_outcome: None,
            frames: 0,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn grid_len(&self) -> usize {
        self.grid.len()
    }

    /// Handle for stopping the session from elsewhere
    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    pub fn last_outcome(&self) -> Option<FilterOutcome> {
        self.last_outcome
    }

    pub fn smoothed_mask(&self) -> &[f32] {
        self.smoother.state()
    }

    /// Overlay for the most recent rendered frame, at grid resolution
    pub fn overlay(&self) -> &RgbaImage {
        self.compositor.buffer()
    }

    /// Current overlay upscaled to a display size
    pub fn overlay_scaled(&mut self, width: u32, height: u32) -> Result<RgbaImage> {
        self.compositor
            .render_scaled(self.smoother.state(), width, height)
    }

    /// Begin a capture session, applying the configured session policy
    pub fn start_session(&mut self) {
        if self.policy == SessionPolicy::ResetOnStart {
            self.reset();
        }
        let generation = self.session.start();
        tracing::info!("Capture session {} started ({:?})", generation, self.policy);
    }

    /// End the capture session; results still in flight will be discarded
    pub fn stop_session(&mut self) {
        self.session.stop();
        tracing::info!(
            "Capture session {} stopped after {} frames",
            self.session.generation(),
            self.frames
        );
    }

    /// Clear the smoothed mask and overlay
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.last_outcome = None;
        self.compositor.clear();
    }

    /// Reject a model output length that can never fill the grid
    pub fn validate_output_len(&self, len: usize) -> Result<()> {
        if len < self.grid.len() {
            return Err(OverlayError::DimensionMismatch {
                expected: self.grid.len(),
                actual: len,
            });
        }
        if len > self.grid.len() {
            tracing::debug!(
                "Model returns {} values, using the first {}",
                len,
                self.grid.len()
            );
        }
        Ok(())
    }

    /// Check a model against this pipeline with one probe inference on a blank frame
    ///
    /// Run once at setup. A model that is merely unavailable right now passes; a model
    /// with the wrong input size or an output too short for the grid does not.
    pub fn validate_model<M: SegmentationModel + ?Sized>(&self, model: &mut M) -> Result<()> {
        if model.input_size() != self.size {
            return Err(OverlayError::config(format!(
                "model {} expects {}x{} input, pipeline grid is {}x{}",
                model.name(),
                model.input_size(),
                model.input_size(),
                self.size,
                self.size
            )));
        }

        let side = self.size as usize;
        let probe = Array4::<f32>::zeros((1, 3, side, side));
        match model.infer(&probe) {
            Ok(output) => self.validate_output_len(output.len())?,
            Err(e) if e.is_recoverable() => {
                tracing::warn!("Probe inference failed, output size not checked: {}", e);
            }
            Err(e) => return Err(e),
        }

        // The probe must not leak into recurrent model state
        model.reset_state();
        Ok(())
    }

    /// Filter, smooth and composite one model output
    ///
    /// Only the first grid_len values are read; a shorter output is an error.
    pub fn run_pass(&mut self, probabilities: &[f32]) -> Result<FilterOutcome> {
        let _span = tracing::debug_span!("post_process", frame = self.frames).entered();

        self.validate_output_len(probabilities.len())?;
        let len = self.grid.len();
        self.grid.copy_from_slice(&probabilities[..len]);

        let outcome = self.filter.apply(&mut self.grid)?;
        if outcome == FilterOutcome::NoForeground {
            tracing::debug!("No foreground detected in frame {}", self.frames);
        }
        self.smoother.update(&self.grid)?;
        self.compositor.render(self.smoother.state())?;

        self.frames += 1;
        self.last_outcome = Some(outcome);
        Ok(outcome)
    }

    /// Run the whole per-frame sequence for a captured frame
    ///
    /// Inference is the only long step. If the session is stopped or restarted while it
    /// runs, its result is dropped instead of touching the buffers.
    pub fn process_frame<M: SegmentationModel + ?Sized>(
        &mut self,
        model: &mut M,
        frame: &RgbaImage,
    ) -> Result<FrameOutcome> {
        let generation = self.session.generation();
        if !self.session.is_current(generation) {
            return Ok(FrameOutcome::Discarded);
        }

        let tensor = self.preprocessor.prepare(frame)?;

        let probabilities = {
            let _span = tracing::debug_span!("inference", model = model.name()).entered();
            match model.infer(&tensor) {
                Ok(probabilities) => probabilities,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping frame {}: {}", self.frames, e);
                    return Ok(FrameOutcome::Skipped);
                }
                Err(e) => return Err(e),
            }
        };

        if !self.session.is_current(generation) {
            tracing::debug!("Dropping inference result from stopped session {}", generation);
            return Ok(FrameOutcome::Discarded);
        }

        let outcome = self.run_pass(&probabilities)?;
        Ok(FrameOutcome::Rendered(outcome))
    }
}
