use anyhow::{Context, Result};
use clap::Parser;
use maskoverlay::capture::{CaptureSource, StillImage};
use maskoverlay::driver::{DisplayMode, DriverOptions, FrameDriver};
use maskoverlay::output::{ImageFileOutput, OutputSink};
use maskoverlay::{segmentation, MaskPipeline, PipelineConfig, SessionPolicy};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Segmentation model: an ONNX file, or a grayscale mask image to replay
    #[arg(short, long)]
    model: PathBuf,

    /// Process a single still image instead of the webcam
    #[arg(long)]
    image: Option<PathBuf>,

    /// Write composited frames to this image file instead of a loopback device
    #[arg(long)]
    output_image: Option<PathBuf>,

    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Pipeline config file (TOML); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Foreground threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Temporal smoothing factor (weight of the newest frame)
    #[arg(long)]
    smoothing: Option<f32>,

    /// Overlay color, e.g. "#00FF00" or "rgba(255,0,0,0.8)"
    #[arg(long)]
    color: Option<String>,

    /// Overlay opacity
    #[arg(long)]
    opacity: Option<f32>,

    /// What to do with the smoothed mask when a session starts
    #[arg(long, value_enum)]
    session_policy: Option<SessionPolicy>,

    /// Show the smoothed mask (grayscale) instead of the colored overlay
    #[arg(long)]
    show_mask: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(smoothing) = self.smoothing {
            config.smoothing_factor = smoothing;
        }
        if let Some(color) = &self.color {
            config.overlay_color = color.clone();
        }
        if let Some(opacity) = self.opacity {
            config.overlay_opacity = opacity;
        }
        if let Some(policy) = self.session_policy {
            config.session_policy = policy;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("maskoverlay starting");

    // Configuration errors surface here, before any frame is captured
    let config = args.pipeline_config()?;
    let mut pipeline = MaskPipeline::new(&config).context("Invalid pipeline configuration")?;

    let mut model = segmentation::create_model(&args.model, config.grid_size)
        .context("Failed to load segmentation model")?;
    pipeline
        .validate_model(model.as_mut())
        .context("Segmentation model does not fit the pipeline")?;
    tracing::info!("Segmentation model {} ready", model.name());

    // Start before the handler exists so a Ctrl+C during device setup ends the session
    pipeline.start_session();
    let session = pipeline.session();
    ctrlc::set_handler(move || {
        tracing::info!("Stop requested");
        session.stop();
    })
    .context("Failed to install Ctrl+C handler")?;

    let mut capture = open_capture(&args)?;
    let (width, height) = capture.resolution();
    tracing::info!("Capture: {}x{}", width, height);

    let mut output = open_output(&args)?;

    let driver = FrameDriver::new(DriverOptions {
        target_fps: args.fps,
        display: if args.show_mask {
            DisplayMode::Mask
        } else {
            DisplayMode::Overlay
        },
        ..DriverOptions::default()
    });

    tracing::info!("Press Ctrl+C to stop");
    let stats = driver.run(capture.as_mut(), output.as_mut(), model.as_mut(), &mut pipeline)?;
    tracing::info!(
        "Done: {} frames, {} skipped, last outcome {:?}",
        stats.frames,
        stats.skipped,
        pipeline.last_outcome()
    );

    Ok(())
}

fn open_capture(args: &Args) -> Result<Box<dyn CaptureSource>> {
    match &args.image {
        Some(path) => Ok(Box::new(StillImage::open(path)?)),
        None => open_webcam(args),
    }
}

fn open_output(args: &Args) -> Result<Box<dyn OutputSink>> {
    match &args.output_image {
        Some(path) => Ok(Box::new(ImageFileOutput::new(path))),
        None => open_loopback(args),
    }
}

#[cfg(feature = "webcam")]
fn open_webcam(args: &Args) -> Result<Box<dyn CaptureSource>> {
    let capture = maskoverlay::capture::WebcamCapture::new(
        args.input_device,
        args.capture_width,
        args.capture_height,
    )
    .context("Failed to initialize webcam capture")?;
    Ok(Box::new(capture))
}

#[cfg(not(feature = "webcam"))]
fn open_webcam(args: &Args) -> Result<Box<dyn CaptureSource>> {
    anyhow::bail!(
        "no --image given and this build has no webcam support for device {} \
         (rebuild with --features webcam)",
        args.input_device
    )
}

#[cfg(feature = "webcam")]
fn open_loopback(args: &Args) -> Result<Box<dyn OutputSink>> {
    let output = maskoverlay::output::V4L2Output::new(
        &args.output_device,
        args.capture_width,
        args.capture_height,
    )
    .context("Failed to initialize v4l2loopback output")?;
    Ok(Box::new(output))
}

#[cfg(not(feature = "webcam"))]
fn open_loopback(args: &Args) -> Result<Box<dyn OutputSink>> {
    anyhow::bail!(
        "no --output-image given and this build has no v4l2loopback support for {} \
         (rebuild with --features webcam)",
        args.output_device
    )
}
