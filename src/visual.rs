//! Spectrum visualization: shape mapping, palette blending and the draw list.

mod color;
mod compositor;
mod shape;

pub use color::{lerp_color, EmptyPalette, Palette, Rgb};
pub use compositor::{core_width, flash_color, glow_color, ColorVertex, Compositor};
pub use shape::{
    band_position, resample, shape_amplitude, BandDistribution, RenderPoint, ShapeMapper,
    ShapeMode,
};
