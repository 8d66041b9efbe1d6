//! Per-frame draw list: beat flash plus glow/core line segments.
//!
//! Everything is built on the CPU as colored triangles in window pixels.
//! The renderer converts pixels to clip space and alpha-blends the list onto
//! the persistent canvas after the fade pass.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use super::color::Rgb;
use super::shape::RenderPoint;
use crate::params::CompositorParams;

/// Vertex of the geometry pass (pixels + straight RGBA)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// Glow color: every channel boosted by `amplitude * gain`, clamped to 255
pub fn glow_color(color: Rgb, amplitude: f32, gain: f32) -> Rgb {
    let boost = (amplitude.max(0.0) * gain) as u32;
    color.map(|c| (c as u32 + boost).min(255) as u8)
}

/// Core line width in pixels (never thinner than one pixel)
pub fn core_width(amplitude: f32, gain: f32) -> f32 {
    ((amplitude.max(0.0) * gain) as u32).max(1) as f32
}

/// Purple flash color for a beat pulse in [0, 1]
pub fn flash_color(beat: f32, gain: f32) -> Rgb {
    let intensity = (beat.clamp(0.0, 1.0) * gain).min(255.0) as u8;
    [intensity, 0, intensity]
}

fn rgba(color: Rgb, alpha: f32) -> [f32; 4] {
    [
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
        alpha,
    ]
}

/// Builds the geometry drawn over the faded canvas each frame
pub struct Compositor {
    params: CompositorParams,
    vertices: Vec<ColorVertex>,
}

impl Compositor {
    pub fn new(params: CompositorParams) -> Self {
        Self {
            params,
            vertices: Vec::new(),
        }
    }

    pub fn params(&self) -> &CompositorParams {
        &self.params
    }

    /// Fade layer color and opacity (straight RGBA)
    pub fn fade_rgba(&self) -> [f32; 4] {
        rgba(self.params.fade_color, self.params.fade_alpha as f32 / 255.0)
    }

    /// Build the draw list for one frame
    ///
    /// Order: optional full-frame flash, then per segment a wide glow line
    /// followed by the narrower core line in the point's own color.
    pub fn compose(
        &mut self,
        points: &[RenderPoint],
        beat: f32,
        flash_enabled: bool,
        size: (u32, u32),
    ) -> &[ColorVertex] {
        self.vertices.clear();

        if flash_enabled && beat > 0.0 {
            let color = rgba(
                flash_color(beat, self.params.flash_gain),
                self.params.flash_alpha as f32 / 255.0,
            );
            let (w, h) = (size.0 as f32, size.1 as f32);
            self.push_quad(
                [
                    Vec2::new(0.0, 0.0),
                    Vec2::new(w, 0.0),
                    Vec2::new(0.0, h),
                    Vec2::new(w, h),
                ],
                color,
            );
        }

        for pair in points.windows(2) {
            let (from, to) = (pair[0].position, pair[1].position);
            let amplitude = pair[1].amplitude;

            let glow = glow_color(pair[1].color, amplitude, self.params.glow_gain);
            self.push_segment(from, to, self.params.glow_width, rgba(glow, 1.0));

            let width = core_width(amplitude, self.params.core_width_gain);
            self.push_segment(from, to, width, rgba(pair[1].color, 1.0));
        }

        &self.vertices
    }

    /// Thick line as two triangles; zero-length segments draw nothing
    fn push_segment(&mut self, from: Vec2, to: Vec2, width: f32, color: [f32; 4]) {
        let direction = (to - from).normalize_or_zero();
        if direction == Vec2::ZERO {
            return;
        }
        let offset = direction.perp() * (width / 2.0);
        self.push_quad(
            [from + offset, to + offset, from - offset, to - offset],
            color,
        );
    }

    /// Corners ordered [a, b, c, d] with a-b and c-d opposite edges
    fn push_quad(&mut self, corners: [Vec2; 4], color: [f32; 4]) {
        let [a, b, c, d] = corners;
        for p in [a, b, c, b, d, c] {
            self.vertices.push(ColorVertex {
                position: p.to_array(),
                color,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32, y: f32, amplitude: f32) -> RenderPoint {
        RenderPoint {
            position: Vec2::new(x, y),
            color: [200, 100, 0],
            amplitude,
        }
    }

    #[test]
    fn test_glow_color_clamps() {
        assert_eq!(glow_color([200, 100, 0], 0.1, 350.0), [235, 135, 35]);
        assert_eq!(glow_color([200, 100, 0], 1.0, 350.0), [255, 255, 255]);
        assert_eq!(glow_color([10, 20, 30], 0.0, 350.0), [10, 20, 30]);
    }

    #[test]
    fn test_core_width_minimum() {
        assert_eq!(core_width(0.0, 10.0), 1.0);
        assert_eq!(core_width(0.05, 10.0), 1.0);
        assert_eq!(core_width(0.42, 10.0), 4.0);
    }

    #[test]
    fn test_flash_color_scales_with_pulse() {
        assert_eq!(flash_color(1.0, 100.0), [100, 0, 100]);
        assert_eq!(flash_color(0.5, 100.0), [50, 0, 50]);
        assert_eq!(flash_color(0.0, 100.0), [0, 0, 0]);
    }

    #[test]
    fn test_two_quads_per_segment() {
        let mut compositor = Compositor::new(CompositorParams::default());
        let points = [point(0.0, 0.0, 0.1), point(10.0, 0.0, 0.2), point(10.0, 10.0, 0.3)];

        let vertices = compositor.compose(&points, 0.0, true, (800, 600));
        // 2 segments * (glow + core) * 6 vertices, no flash at zero pulse
        assert_eq!(vertices.len(), 24);
    }

    #[test]
    fn test_flash_drawn_first_when_enabled() {
        let mut compositor = Compositor::new(CompositorParams::default());
        let points = [point(0.0, 0.0, 0.1), point(10.0, 0.0, 0.2)];

        let vertices = compositor.compose(&points, 1.0, true, (800, 600)).to_vec();
        assert_eq!(vertices.len(), 18);
        let alpha = 60.0 / 255.0;
        assert_eq!(vertices[0].color, [100.0 / 255.0, 0.0, 100.0 / 255.0, alpha]);
        assert!(vertices[..6]
            .iter()
            .any(|v| v.position == [800.0, 600.0]));

        let without = compositor.compose(&points, 1.0, false, (800, 600));
        assert_eq!(without.len(), 12);
    }

    #[test]
    fn test_segment_width() {
        let mut compositor = Compositor::new(CompositorParams::default());
        let points = [point(0.0, 0.0, 0.0), point(100.0, 0.0, 0.0)];

        let vertices = compositor.compose(&points, 0.0, false, (800, 600));
        // Glow quad is 6px wide, centered on the segment
        let glow_ys: Vec<f32> = vertices[..6].iter().map(|v| v.position[1].abs()).collect();
        assert!(glow_ys.iter().all(|&y| (y - 3.0).abs() < 1e-5));
        // Core quad falls back to 1px
        let core_ys: Vec<f32> = vertices[6..].iter().map(|v| v.position[1].abs()).collect();
        assert!(core_ys.iter().all(|&y| (y - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_degenerate_segment_skipped() {
        let mut compositor = Compositor::new(CompositorParams::default());
        let points = [point(5.0, 5.0, 0.5), point(5.0, 5.0, 0.5)];
        assert!(compositor.compose(&points, 0.0, false, (800, 600)).is_empty());
    }
}
