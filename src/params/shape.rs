//! Shape mapping parameters.
//!
//! Distances are in window pixels; amplitudes are the shaped, dimensionless
//! values produced from normalized spectrum bins.

/// Geometry and amplitude-shaping constants for the shape mapper
#[derive(Debug, Clone)]
pub struct ShapeParams {
    /// Low bins dropped before mapping (they are faded to ~0 by the analyzer)
    pub skip_bins: usize,

    /// Display resolution the spectrum is resampled to (None = native bin count)
    pub resolution: Option<usize>,

    /// Exponent applied to raw bins (<1 lifts quiet passages, tempers transients)
    pub amplitude_exponent: f32,

    /// Beat amplification: amplitude *= 1 + beat * beat_gain
    pub beat_gain: f32,

    /// Final display-scale multiplier applied to every amplitude
    pub display_scale: f32,

    /// Circle/donut/spiral base radius (pixels)
    pub base_radius: f32,

    /// Circle/donut radius growth per unit amplitude (pixels)
    pub radial_gain: f32,

    /// Spiral radius growth per display point (pixels)
    pub spiral_step: f32,

    /// Spiral radius growth per unit amplitude (pixels)
    pub spiral_gain: f32,

    /// Triangle/heart displacement per unit amplitude (scale = 1 + amp * gain)
    pub outline_gain: f32,

    /// Heart curve base scale (curve units → pixels)
    pub heart_scale: f32,

    /// Triangle vertices relative to the frame center (pixels, y down)
    pub triangle: [[f32; 2]; 3],

    /// Horizontal distance the line's end points are pushed off-screen (pixels)
    pub line_offscreen: f32,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            skip_bins: 25,
            resolution: Some(512),
            amplitude_exponent: 0.7,
            beat_gain: 1.5,
            display_scale: 0.42,
            base_radius: 100.0,
            radial_gain: 300.0,
            spiral_step: 0.3,
            spiral_gain: 120.0,
            outline_gain: 2.0,
            heart_scale: 10.0,
            triangle: [[0.0, 100.0], [-100.0, -80.0], [100.0, -80.0]],
            line_offscreen: 10_000.0,
        }
    }
}
