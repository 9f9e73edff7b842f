mod components;
mod overlay;
mod smoothing;

pub use components::{ComponentFilter, FilterOutcome};
pub use overlay::OverlayCompositor;
pub use smoothing::TemporalSmoother;
