//! Palette blending along the band position.

use serde::Deserialize;
use thiserror::Error;

/// 8-bit RGB triple
pub type Rgb = [u8; 3];

/// A palette needs at least one color to blend from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("palette must contain at least one color")]
pub struct EmptyPalette;

/// Ordered, non-empty color ring sampled by band position
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<Rgb>")]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: vec![
                [255, 0, 0],    // red
                [255, 69, 0],   // orange red
                [255, 255, 0],  // yellow
                [0, 0, 255],    // blue
                [138, 43, 226], // blue violet
            ],
        }
    }
}

impl TryFrom<Vec<Rgb>> for Palette {
    type Error = EmptyPalette;

    fn try_from(colors: Vec<Rgb>) -> Result<Self, Self::Error> {
        Self::new(colors)
    }
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Result<Self, EmptyPalette> {
        if colors.is_empty() {
            return Err(EmptyPalette);
        }
        Ok(Self { colors })
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Color at band position `band` in [0, 1)
    ///
    /// The palette is treated as a ring: positions past the last entry blend
    /// back toward the first, so the result is continuous across the wrap.
    /// Positions outside [0, 1) wrap around.
    pub fn blend(&self, band: f32) -> Rgb {
        let n = self.colors.len();
        let band = if band.is_finite() { band.rem_euclid(1.0) } else { 0.0 };

        let segment = band * n as f32;
        let floor = segment.floor();
        let index = (floor as usize) % n;
        let t = segment - floor;

        lerp_color(self.colors[index], self.colors[(index + 1) % n], t)
    }
}

/// Componentwise linear interpolation, truncated to integer channels
pub fn lerp_color(from: Rgb, to: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0u8; 3];
    for (channel, (&a, &b)) in out.iter_mut().zip(from.iter().zip(to.iter())) {
        let value = a as f32 + (b as f32 - a as f32) * t;
        *channel = value.clamp(0.0, 255.0) as u8;
    }
    out
}
