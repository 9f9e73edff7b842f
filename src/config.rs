use crate::error::{OverlayError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Model input resolution used by the person segmentation models this tool targets
pub const DEFAULT_GRID_SIZE: u32 = 224;
pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const DEFAULT_SMOOTHING: f32 = 0.6;
pub const DEFAULT_OPACITY: f32 = 0.5;
pub const DEFAULT_COLOR: &str = "#00FF00";

/// What a new capture session does with the smoothed mask left by the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPolicy {
    /// Start every session from an all-zero mask
    #[default]
    ResetOnStart,
    /// Keep blending into whatever the last session left behind
    Continue,
}

/// Tunables consumed by the post-processing core
///
/// Loaded from a TOML file and/or CLI flags, then checked with [`PipelineConfig::validate`]
/// before the first frame is processed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Side length of the square probability grid (model input/output resolution)
    pub grid_size: u32,
    /// Foreground threshold; a cell is foreground when strictly greater
    pub threshold: f32,
    /// Weight of the newest frame in the temporal average
    pub smoothing_factor: f32,
    /// Overlay color as `#RRGGBB`, `#RRGGBBAA`, `rgb(..)`, `rgba(..)` or a name
    pub overlay_color: String,
    /// Multiplier applied to the color's base alpha
    pub overlay_opacity: f32,
    pub session_policy: SessionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            threshold: DEFAULT_THRESHOLD,
            smoothing_factor: DEFAULT_SMOOTHING,
            overlay_color: DEFAULT_COLOR.to_string(),
            overlay_opacity: DEFAULT_OPACITY,
            session_policy: SessionPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a config file; missing keys fall back to defaults
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading pipeline config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Number of cells in the probability grid
    pub fn grid_len(&self) -> usize {
        self.grid_size as usize * self.grid_size as usize
    }

    /// Parse the configured overlay color
    pub fn color(&self) -> Result<OverlayColor> {
        self.overlay_color.parse()
    }

    /// Check every numeric range and the color string
    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 {
            return Err(OverlayError::config("grid_size must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(OverlayError::config(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(OverlayError::config(format!(
                "smoothing_factor must be in (0, 1], got {}",
                self.smoothing_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return Err(OverlayError::config(format!(
                "overlay_opacity must be in [0, 1], got {}",
                self.overlay_opacity
            )));
        }
        self.color()?;
        Ok(())
    }
}

/// Overlay color with its base alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl OverlayColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB`, `#RRGGBB`, `#RRGGBBAA`, `rgb(r, g, b)`, `rgba(r, g, b, a)` or a basic name
    ///
    /// In `rgba(..)` the alpha is either an integer 0-255 or a fraction with a decimal point.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let lower = s.to_ascii_lowercase();

        if let Some(hex) = lower.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| OverlayError::color(input));
        }
        if let Some(body) = lower.strip_prefix("rgba(").and_then(|b| b.strip_suffix(')')) {
            return parse_functional(body, true).ok_or_else(|| OverlayError::color(input));
        }
        if let Some(body) = lower.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
            return parse_functional(body, false).ok_or_else(|| OverlayError::color(input));
        }

        match lower.as_str() {
            "green" => Ok(Self::rgb(0, 255, 0)),
            "red" => Ok(Self::rgb(255, 0, 0)),
            "blue" => Ok(Self::rgb(0, 0, 255)),
            "white" => Ok(Self::rgb(255, 255, 255)),
            "black" => Ok(Self::rgb(0, 0, 0)),
            _ => Err(OverlayError::color(input)),
        }
    }
}

impl Default for OverlayColor {
    fn default() -> Self {
        Self::rgb(0, 255, 0)
    }
}

impl FromStr for OverlayColor {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for OverlayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

fn parse_hex(hex: &str) -> Option<OverlayColor> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(OverlayColor::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
        }
        6 => Some(OverlayColor::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(OverlayColor::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_functional(body: &str, with_alpha: bool) -> Option<OverlayColor> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }

    let channel = |s: &str| s.parse::<u8>().ok();
    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;

    let a = if with_alpha {
        let raw = parts[3];
        if raw.contains('.') {
            let fraction: f32 = raw.parse().ok()?;
            if !(0.0..=1.0).contains(&fraction) {
                return None;
            }
            (fraction * 255.0).round() as u8
        } else {
            channel(raw)?
        }
    } else {
        255
    };

    Some(OverlayColor::rgba(r, g, b, a))
}
