use crate::capture::CaptureSource;
use crate::output::{blend_overlay, OutputSink};
use crate::pipeline::{FrameOutcome, MaskPipeline};
use crate::segmentation::{Preprocessor, SegmentationModel};
use anyhow::{Context, Result};
use image::{imageops, DynamicImage, RgbImage};
use std::time::{Duration, Instant};

/// What the driver writes for each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Colored overlay blended onto the captured frame
    #[default]
    Overlay,
    /// Grayscale view of the smoothed mask
    Mask,
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub target_fps: u32,
    pub display: DisplayMode,
    /// Log averaged stage timings every this many frames
    pub stats_interval: u64,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            target_fps: 30,
            display: DisplayMode::Overlay,
            stats_interval: 30,
        }
    }
}

/// Counters and accumulated stage times for one session
#[derive(Debug, Clone, Default)]
pub struct DriverStats {
    pub frames: u64,
    pub rendered: u64,
    pub skipped: u64,
    pub discarded: u64,
    pub capture_time: Duration,
    pub process_time: Duration,
    pub output_time: Duration,
}

impl DriverStats {
    fn log(&self) {
        let n = self.frames.max(1) as f64;
        let avg_capture_ms = self.capture_time.as_secs_f64() * 1000.0 / n;
        let avg_process_ms = self.process_time.as_secs_f64() * 1000.0 / n;
        let avg_output_ms = self.output_time.as_secs_f64() * 1000.0 / n;
        let total_ms = avg_capture_ms + avg_process_ms + avg_output_ms;
        let actual_fps = if total_ms > 0.0 { 1000.0 / total_ms } else { 0.0 };

        tracing::info!(
            "Frame {}: capture={:.1}ms, process={:.1}ms, output={:.1}ms, total={:.1}ms, \
             fps={:.1}, skipped={}",
            self.frames,
            avg_capture_ms,
            avg_process_ms,
            avg_output_ms,
            total_ms,
            actual_fps,
            self.skipped
        );
    }
}

/// Paced capture -> process -> output loop
///
/// One pass runs to completion before the next frame is captured. A slow pass lowers the
/// frame rate; frames are never queued. The loop ends when the pipeline's session is stopped
/// (see [`MaskPipeline::session`]) or the source runs dry.
///
/// The caller starts the session with [`MaskPipeline::start_session`] before handing out
/// stop handles; `run` never restarts it, so a stop requested during setup is honoured.
pub struct FrameDriver {
    options: DriverOptions,
}

impl FrameDriver {
    pub fn new(options: DriverOptions) -> Self {
        Self { options }
    }

    pub fn run<C, O, M>(
        &self,
        capture: &mut C,
        output: &mut O,
        model: &mut M,
        pipeline: &mut MaskPipeline,
    ) -> Result<DriverStats>
    where
        C: CaptureSource + ?Sized,
        O: OutputSink + ?Sized,
        M: SegmentationModel + ?Sized,
    {
        let frame_duration =
            Duration::from_secs_f32(1.0 / self.options.target_fps.max(1) as f32);
        let mut stats = DriverStats::default();

        let session = pipeline.session();
        if !session.is_active() {
            tracing::info!("Session already stopped, not starting the frame loop");
            return Ok(stats);
        }
        model.reset_state();

        tracing::info!(
            "Starting frame loop: model={}, display={:?}, target fps={}",
            model.name(),
            self.options.display,
            self.options.target_fps
        );

        while session.is_active() {
            let loop_start = Instant::now();

            let capture_start = Instant::now();
            let Some(frame) = capture.capture_frame().context("Failed to capture frame")? else {
                tracing::info!("Capture source exhausted");
                break;
            };
            stats.capture_time += capture_start.elapsed();

            let process_start = Instant::now();
            let outcome = pipeline
                .process_frame(model, &frame)
                .context("Failed to process frame")?;
            stats.process_time += process_start.elapsed();

            match outcome {
                FrameOutcome::Rendered(_) => stats.rendered += 1,
                FrameOutcome::Skipped => stats.skipped += 1,
                FrameOutcome::Discarded => {
                    stats.discarded += 1;
                    break;
                }
            }

            let output_start = Instant::now();
            let composed = self.compose(pipeline, frame)?;
            output
                .write_frame(&composed)
                .context("Failed to write frame")?;
            stats.output_time += output_start.elapsed();

            stats.frames += 1;
            if self.options.stats_interval > 0 && stats.frames % self.options.stats_interval == 0 {
                stats.log();
            }

            // Frame rate limiting
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration && session.is_active() {
                std::thread::sleep(frame_duration - elapsed);
            }
        }

        pipeline.stop_session();
        stats.log();
        Ok(stats)
    }

    fn compose(&self, pipeline: &mut MaskPipeline, frame: image::RgbaImage) -> Result<RgbImage> {
        let (width, height) = frame.dimensions();
        match self.options.display {
            DisplayMode::Overlay => {
                let overlay = pipeline.overlay_scaled(width, height)?;
                let rgb = DynamicImage::ImageRgba8(frame).to_rgb8();
                Ok(blend_overlay(&rgb, &overlay))
            }
            DisplayMode::Mask => {
                let luma = Preprocessor::mask_to_luma(pipeline.smoothed_mask(), pipeline.size());
                let luma = if luma.dimensions() != (width, height) {
                    imageops::resize(&luma, width, height, imageops::FilterType::Triangle)
                } else {
                    luma
                };
                Ok(DynamicImage::ImageLuma8(luma).to_rgb8())
            }
        }
    }
}
