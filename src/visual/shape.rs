//! Spectrum to 2D geometry mapping.
//!
//! Every frame the mapper turns a spectrum snapshot into an ordered polyline
//! of `RenderPoint`s in window pixels (origin top-left, y down).

use glam::Vec2;
use serde::Deserialize;
use std::f32::consts::{PI, TAU};

use super::color::{Palette, Rgb};
use crate::params::ShapeParams;

/// Geometry the spectrum is wrapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShapeMode {
    #[default]
    Circle,
    Spiral,
    Triangle,
    Heart,
    Line,
    Donut,
}

impl ShapeMode {
    /// Cycle order used by the "next shape" control
    pub const ALL: [ShapeMode; 6] = [
        ShapeMode::Circle,
        ShapeMode::Spiral,
        ShapeMode::Triangle,
        ShapeMode::Heart,
        ShapeMode::Line,
        ShapeMode::Donut,
    ];

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            ShapeMode::Circle => "Circle",
            ShapeMode::Spiral => "Spiral",
            ShapeMode::Triangle => "Triangle",
            ShapeMode::Heart => "Heart",
            ShapeMode::Line => "Line",
            ShapeMode::Donut => "Donut",
        }
    }

    /// Whether the polyline is closed back onto its first point
    pub fn closes(self) -> bool {
        !matches!(self, ShapeMode::Line)
    }
}

/// How point indices are spread over band positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandDistribution {
    /// b = i / n
    Linear,

    /// b = log_S((S - 1) * i/n + 1); expands the bass end, compresses the treble
    Logarithmic { scale: f32 },
}

impl BandDistribution {
    pub fn is_logarithmic(&self) -> bool {
        matches!(self, BandDistribution::Logarithmic { .. })
    }
}

/// One vertex of the rendered polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPoint {
    /// Window pixels
    pub position: Vec2,
    pub color: Rgb,
    /// Shaped amplitude (drives glow and line width)
    pub amplitude: f32,
}

/// Band position of point `index` out of `count`, in [0, 1)
///
/// A logarithmic scale factor of 1 or less cannot define a log curve and
/// falls back to the linear spread.
pub fn band_position(index: usize, count: usize, distribution: BandDistribution) -> f32 {
    if count == 0 {
        return 0.0;
    }
    let linear = index as f32 / count as f32;
    match distribution {
        BandDistribution::Logarithmic { scale } if scale > 1.0 => {
            ((scale - 1.0) * linear + 1.0).ln() / scale.ln()
        }
        _ => linear,
    }
}

/// Shaped amplitude of a raw bin: `raw^exp * (1 + beat * gain) * display_scale`
pub fn shape_amplitude(raw: f32, beat: f32, params: &ShapeParams) -> f32 {
    raw.max(0.0).powf(params.amplitude_exponent)
        * (1.0 + beat * params.beat_gain)
        * params.display_scale
}

/// Resample `input` to `output.len()` points by linear interpolation over bin index
///
/// End points map to end points; equal lengths reproduce the input exactly.
pub fn resample(input: &[f32], output: &mut [f32]) {
    let m = input.len();
    let n = output.len();
    if m == 0 {
        output.fill(0.0);
        return;
    }
    if n == 1 || m == 1 {
        output.fill(input[0]);
        return;
    }

    for (i, out) in output.iter_mut().enumerate() {
        // Position i * (m - 1) / (n - 1), split into integer and fraction exactly
        let numerator = i * (m - 1);
        let index = numerator / (n - 1);
        let frac = (numerator % (n - 1)) as f32 / (n - 1) as f32;
        *out = if index + 1 < m {
            input[index] + (input[index + 1] - input[index]) * frac
        } else {
            input[m - 1]
        };
    }
}

/// Maps spectra to polylines for the current window size
pub struct ShapeMapper {
    params: ShapeParams,
    width: f32,
    height: f32,
    resampled: Vec<f32>,
}

impl ShapeMapper {
    pub fn new(params: ShapeParams, width: u32, height: u32) -> Self {
        Self {
            params,
            width: width as f32,
            height: height as f32,
            resampled: Vec::new(),
        }
    }

    /// Follow a window resize
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width as f32;
        self.height = height as f32;
    }

    pub fn params(&self) -> &ShapeParams {
        &self.params
    }

    fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Build the polyline for one frame into `points` (cleared first)
    ///
    /// The lowest `skip_bins` bins are dropped, the rest resampled to the
    /// display resolution. Closed modes repeat their first point at the end.
    pub fn map(
        &mut self,
        spectrum: &[f32],
        beat: f32,
        mode: ShapeMode,
        distribution: BandDistribution,
        palette: &Palette,
        points: &mut Vec<RenderPoint>,
    ) {
        points.clear();

        let active = spectrum.get(self.params.skip_bins..).unwrap_or(&[]);
        if active.is_empty() {
            return;
        }
        let count = self.params.resolution.unwrap_or(active.len());
        self.resampled.resize(count, 0.0);
        resample(active, &mut self.resampled);

        points.reserve(count + 1);
        for (i, &raw) in self.resampled.iter().enumerate() {
            let band = band_position(i, count, distribution);
            let amplitude = shape_amplitude(raw, beat, &self.params);
            let position = self.position(mode, i, count, band, amplitude);
            points.push(RenderPoint {
                position,
                color: palette.blend(band),
                amplitude,
            });
        }

        if mode.closes() && points.len() > 1 {
            points.push(points[0]);
        }
    }

    fn position(
        &self,
        mode: ShapeMode,
        index: usize,
        count: usize,
        band: f32,
        amplitude: f32,
    ) -> Vec2 {
        let p = &self.params;
        let center = self.center();
        let angle = TAU * band;

        match mode {
            ShapeMode::Circle => {
                let radius = p.base_radius + amplitude * p.radial_gain;
                center + Vec2::from_angle(angle) * radius
            }
            ShapeMode::Spiral => {
                let radius =
                    p.base_radius + index as f32 * p.spiral_step + amplitude * p.spiral_gain;
                center + Vec2::from_angle(angle) * radius
            }
            ShapeMode::Triangle => {
                let vertices = p.triangle.map(|[x, y]| center + Vec2::new(x, y));
                let centroid = (vertices[0] + vertices[1] + vertices[2]) / 3.0;

                let edge_pos = (band * 3.0).clamp(0.0, 3.0);
                let edge = (edge_pos.floor() as usize).min(2);
                let t = edge_pos - edge as f32;
                let base = vertices[edge].lerp(vertices[(edge + 1) % 3], t);

                centroid + (base - centroid) * (1.0 + amplitude * p.outline_gain)
            }
            ShapeMode::Heart => {
                let x = 16.0 * angle.sin().powi(3);
                let y = 13.0 * angle.cos()
                    - 5.0 * (2.0 * angle).cos()
                    - 2.0 * (3.0 * angle).cos()
                    - (4.0 * angle).cos();
                let scale = p.heart_scale * (1.0 + amplitude * p.outline_gain);
                // Curve is y-up; window is y-down
                center + Vec2::new(x, -y) * scale
            }
            ShapeMode::Line => {
                if index == 0 {
                    Vec2::new(-p.line_offscreen, self.height)
                } else if index + 1 == count {
                    Vec2::new(p.line_offscreen, -p.line_offscreen)
                } else {
                    Vec2::new(band * self.width, center.y - center.y * amplitude)
                }
            }
            ShapeMode::Donut => {
                let radius = p.base_radius + amplitude * p.radial_gain;
                // Second half of the sweep is doubled onto the first
                let fold = if angle > PI { 2.0 } else { 1.0 };
                center + Vec2::from_angle(2.0 * angle) * radius * fold / 2.0
            }
        }
    }
}
