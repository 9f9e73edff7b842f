use image::{Rgba, RgbaImage};
use maskoverlay::postprocess::FilterOutcome;
use maskoverlay::segmentation::{ProbabilityMap, SegmentationModel};
use maskoverlay::{FrameOutcome, MaskPipeline, OverlayError, PipelineConfig, SessionHandle};
use ndarray::Array4;
use std::collections::VecDeque;

/// Scripted model: hands out queued responses, then repeats the last one
struct ScriptedModel {
    size: u32,
    responses: VecDeque<Result<ProbabilityMap, String>>,
    last: Option<ProbabilityMap>,
    calls: usize,
    /// Stop this session while the next call is "in flight"
    stop_during_call: Option<SessionHandle>,
}

impl ScriptedModel {
    fn new(size: u32) -> Self {
        Self {
            size,
            responses: VecDeque::new(),
            last: None,
            calls: 0,
            stop_during_call: None,
        }
    }

    fn then(mut self, map: ProbabilityMap) -> Self {
        self.responses.push_back(Ok(map));
        self
    }

    fn then_fail(mut self, reason: &str) -> Self {
        self.responses.push_back(Err(reason.to_string()));
        self
    }
}

impl SegmentationModel for ScriptedModel {
    fn infer(&mut self, tensor: &Array4<f32>) -> maskoverlay::Result<ProbabilityMap> {
        assert_eq!(tensor.shape(), &[1, 3, self.size as usize, self.size as usize]);
        self.calls += 1;

        if let Some(session) = self.stop_during_call.take() {
            session.stop();
        }

        match self.responses.pop_front() {
            Some(Ok(map)) => {
                self.last = Some(map.clone());
                Ok(map)
            }
            Some(Err(reason)) => Err(OverlayError::inference(reason)),
            None => self
                .last
                .clone()
                .ok_or_else(|| OverlayError::inference("no response scripted")),
        }
    }

    fn input_size(&self) -> u32 {
        self.size
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn config(size: u32) -> PipelineConfig {
    PipelineConfig {
        grid_size: size,
        ..PipelineConfig::default()
    }
}

fn frame(size: u32) -> RgbaImage {
    RgbaImage::from_pixel(size, size, Rgba([40, 80, 120, 255]))
}

fn two_blob_grid() -> Vec<f32> {
    let mut grid = vec![0.0; 100];
    // 3-cell blob in the top-left corner
    for idx in [0, 1, 10] {
        grid[idx] = 0.9;
    }
    // 5-cell plus shape in the middle
    for idx in [45, 54, 55, 56, 65] {
        grid[idx] = 0.9;
    }
    grid
}

#[test]
fn test_two_blobs_keep_the_larger() {
    let mut pipeline = MaskPipeline::new(&config(10)).unwrap();
    let mut model = ScriptedModel::new(10).then(two_blob_grid());
    pipeline.start_session();

    let outcome = pipeline.process_frame(&mut model, &frame(10)).unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Rendered(FilterOutcome::Retained { label: 2, pixels: 5 })
    );

    let mask = pipeline.smoothed_mask();
    for idx in [0, 1, 10] {
        assert_eq!(mask[idx], 0.0);
    }
    for idx in [45, 54, 55, 56, 65] {
        assert!((mask[idx] - 0.54).abs() < 1e-6);
    }

    // 0.54 is above the threshold, so those cells are painted
    let overlay = pipeline.overlay();
    assert_eq!(overlay.get_pixel(5, 5), &Rgba([0, 255, 0, 127]));
    assert_eq!(overlay.get_pixel(0, 0)[3], 0);
}

#[test]
fn test_no_detection_decays_smoothed_mask() {
    let mut pipeline = MaskPipeline::new(&config(4)).unwrap();
    let mut model = ScriptedModel::new(4).then(vec![1.0; 16]).then(vec![0.0; 16]);
    pipeline.start_session();

    pipeline.process_frame(&mut model, &frame(4)).unwrap();
    let mut expected = 0.6f32;
    for _ in 0..4 {
        let outcome = pipeline.process_frame(&mut model, &frame(4)).unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered(FilterOutcome::NoForeground));
        expected *= 0.4;
        assert!(pipeline
            .smoothed_mask()
            .iter()
            .all(|&v| (v - expected).abs() < 1e-6));
    }
    assert!(pipeline.overlay().pixels().all(|p| p[3] == 0));
}

#[test]
fn test_constant_input_converges_within_seven_frames() {
    let mut pipeline = MaskPipeline::new(&config(8)).unwrap();
    let mut model = ScriptedModel::new(8).then(vec![1.0; 64]);
    pipeline.start_session();

    for _ in 0..7 {
        pipeline.process_frame(&mut model, &frame(8)).unwrap();
    }
    assert!(pipeline.smoothed_mask().iter().all(|&v| v > 0.99 && v <= 1.0));
    assert_eq!(pipeline.frames_processed(), 7);
}

#[test]
fn test_longer_output_is_truncated() {
    let mut pipeline = MaskPipeline::new(&config(4)).unwrap();
    let mut output = vec![0.0; 16];
    output[5] = 0.8;
    // Trailing values would form a larger blob if they were read
    output.extend(std::iter::repeat(1.0).take(40));

    let mut model = ScriptedModel::new(4).then(output);
    pipeline.validate_model(&mut model).unwrap();
    pipeline.start_session();

    let outcome = pipeline.process_frame(&mut model, &frame(4)).unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Rendered(FilterOutcome::Retained { label: 1, pixels: 1 })
    );
}

#[test]
fn test_short_output_fails_validation() {
    let pipeline = MaskPipeline::new(&config(4)).unwrap();
    let mut model = ScriptedModel::new(4).then(vec![0.0; 15]);
    let err = pipeline.validate_model(&mut model).unwrap_err();
    assert!(matches!(
        err,
        OverlayError::DimensionMismatch {
            expected: 16,
            actual: 15
        }
    ));
}

#[test]
fn test_model_size_mismatch_fails_validation() {
    let pipeline = MaskPipeline::new(&config(4)).unwrap();
    let mut model = ScriptedModel::new(8).then(vec![0.0; 64]);
    assert!(matches!(
        pipeline.validate_model(&mut model),
        Err(OverlayError::InvalidConfig(_))
    ));
}

#[test]
fn test_unavailable_inference_skips_frame() {
    let mut pipeline = MaskPipeline::new(&config(4)).unwrap();
    let mut model = ScriptedModel::new(4)
        .then(vec![1.0; 16])
        .then_fail("model not loaded")
        .then(vec![1.0; 16]);
    pipeline.start_session();

    pipeline.process_frame(&mut model, &frame(4)).unwrap();
    let before = pipeline.smoothed_mask().to_vec();
    let overlay_before = pipeline.overlay().clone();

    let outcome = pipeline.process_frame(&mut model, &frame(4)).unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(pipeline.smoothed_mask(), before.as_slice());
    assert_eq!(pipeline.overlay(), &overlay_before);
    assert_eq!(pipeline.frames_processed(), 1);

    // Next frame retries normally
    let outcome = pipeline.process_frame(&mut model, &frame(4)).unwrap();
    assert!(matches!(outcome, FrameOutcome::Rendered(_)));
    assert_eq!(model.calls, 3);
}

#[test]
fn test_result_after_stop_is_discarded() {
    let mut pipeline = MaskPipeline::new(&config(4)).unwrap();
    let mut model = ScriptedModel::new(4).then(vec![1.0; 16]);
    pipeline.start_session();
    model.stop_during_call = Some(pipeline.session());

    let outcome = pipeline.process_frame(&mut model, &frame(4)).unwrap();
    assert_eq!(outcome, FrameOutcome::Discarded);
    assert!(pipeline.smoothed_mask().iter().all(|&v| v == 0.0));
    assert_eq!(pipeline.frames_processed(), 0);

    // Nothing is scheduled once stopped
    let outcome = pipeline.process_frame(&mut model, &frame(4)).unwrap();
    assert_eq!(outcome, FrameOutcome::Discarded);
    assert_eq!(model.calls, 1);
}

#[test]
fn test_frames_are_resized_to_the_grid() {
    let mut pipeline = MaskPipeline::new(&config(4)).unwrap();
    let mut model = ScriptedModel::new(4).then(vec![1.0; 16]);
    pipeline.start_session();

    let big = RgbaImage::from_pixel(64, 48, Rgba([255, 255, 255, 255]));
    let outcome = pipeline.process_frame(&mut model, &big).unwrap();
    assert!(matches!(outcome, FrameOutcome::Rendered(_)));
}

#[test]
fn test_invalid_color_fails_before_any_frame() {
    let config = PipelineConfig {
        overlay_color: "rgb(0, 300, 0)".into(),
        ..config(4)
    };
    assert!(matches!(
        MaskPipeline::new(&config),
        Err(OverlayError::InvalidColorFormat(_))
    ));
}
