//! Window and compositing configuration.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Window configuration (the `[window]` config table)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Window width (pixels)
    pub width: u32,

    /// Window height (pixels)
    pub height: u32,

    /// Optional image drawn as the fade backdrop, scaled to the window
    pub background_image: Option<PathBuf>,

    /// Render tick rate (Hz), independent of the analysis cadence
    pub frame_rate_hz: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            background_image: None,
            frame_rate_hz: 60,
        }
    }
}

impl RenderConfig {
    /// Time between render ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz.max(1) as f64)
    }
}

/// Trail, flash and line-drawing constants for the compositor
#[derive(Debug, Clone)]
pub struct CompositorParams {
    /// Color the previous frame fades toward when no background image is set
    pub fade_color: [u8; 3],

    /// Opacity of the fade layer drawn over the previous frame (0-255)
    /// Higher = shorter trails
    pub fade_alpha: u8,

    /// Opacity of the beat flash layer (0-255)
    pub flash_alpha: u8,

    /// Flash red/blue channel value per unit of beat pulse
    pub flash_gain: f32,

    /// Glow line width (pixels)
    pub glow_width: f32,

    /// Glow channel boost per unit amplitude
    pub glow_gain: f32,

    /// Core line width per unit amplitude (pixels, minimum 1)
    pub core_width_gain: f32,

    /// Render-tick beat decay factor (pulse *= factor every frame)
    pub beat_decay: f32,
}

impl Default for CompositorParams {
    fn default() -> Self {
        Self {
            fade_color: [5, 5, 10], // Dark fade prevents ghosting
            fade_alpha: 80,
            flash_alpha: 60,
            flash_gain: 100.0,
            glow_width: 6.0,
            glow_gain: 350.0,
            core_width_gain: 10.0,
            beat_decay: 0.92,
        }
    }
}
