//! Explainability: gradient saliency maps and heatmap overlays
//!
//! - `saliency`: per-pixel attribution from input gradients
//! - `gradient`: the blue → red colour ramp
//! - `overlay`: blending a heatmap over the original photo

pub mod gradient;
pub mod overlay;
pub mod saliency;

// Re-export main types for convenience
pub use gradient::ColorGradient;
pub use overlay::{render_overlay, CompositeImage, OverlayRenderer, DEFAULT_ALPHA};
pub use saliency::{compute_saliency, Heatmap, SaliencyMap};
