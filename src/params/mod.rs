//! Parameter definitions with units and documented semantics.
//!
//! All tuning constants are collected here with:
//! - Units (pixels, Hz, samples, normalized spectrum units)
//! - Documented ranges and meanings
//! - Type safety where possible

mod audio;
mod render;
mod shape;

// Re-export all types
pub use audio::{audio_constants, AnalysisOverrides, AnalyzerConfig, BassProbe, BeatConfig};
pub use render::{CompositorParams, RenderConfig};
pub use shape::ShapeParams;
