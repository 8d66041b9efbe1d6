//! Keyboard controls, display toggles and render-tick pacing.

use std::time::{Duration, Instant};
use winit::keyboard::KeyCode;

use crate::visual::{BandDistribution, ShapeMode};

/// Discrete user commands handled by the render loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    NextShape,
    ToggleFlash,
    ToggleLogScale,
    /// End the current session and move to the next queued source
    StopSession,
    /// Queue every source again from the top
    Replay,
    Quit,
}

impl Control {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Space => Some(Control::NextShape),
            KeyCode::KeyB => Some(Control::ToggleFlash),
            KeyCode::KeyL => Some(Control::ToggleLogScale),
            KeyCode::Escape => Some(Control::StopSession),
            KeyCode::KeyR => Some(Control::Replay),
            KeyCode::KeyQ => Some(Control::Quit),
            _ => None,
        }
    }
}

/// Display state mutated by controls and read every frame
#[derive(Debug, Clone, PartialEq)]
pub struct VisualState {
    pub shape: ShapeMode,
    pub flash: bool,
    pub logarithmic: bool,
    /// Log band scale factor S (used when `logarithmic` is set)
    pub log_scale: f32,
}

impl Default for VisualState {
    fn default() -> Self {
        Self {
            shape: ShapeMode::Circle,
            flash: true,
            logarithmic: false,
            log_scale: 63.0,
        }
    }
}

impl VisualState {
    /// Apply a display control; returns true if the state changed
    pub fn apply(&mut self, control: Control) -> bool {
        match control {
            Control::NextShape => self.shape = self.shape.next(),
            Control::ToggleFlash => self.flash = !self.flash,
            Control::ToggleLogScale => self.logarithmic = !self.logarithmic,
            Control::StopSession | Control::Replay | Control::Quit => return false,
        }
        true
    }

    pub fn distribution(&self) -> BandDistribution {
        if self.logarithmic {
            BandDistribution::Logarithmic {
                scale: self.log_scale,
            }
        } else {
            BandDistribution::Linear
        }
    }

    /// One-line status for the window title
    pub fn describe(&self, source: &str) -> String {
        format!(
            "{} | {} | {} | flash {} | Space: shape  B: flash  L: log/linear  Esc: next  R: replay  Q: quit",
            source,
            self.shape.name(),
            if self.logarithmic { "log" } else { "linear" },
            if self.flash { "on" } else { "off" },
        )
    }
}

/// Fixed-rate render tick scheduler
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Duration,
    next_frame: Instant,
}

impl FrameClock {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_frame: now,
        }
    }

    /// True if a frame is due at `now`; advances the schedule when it is
    ///
    /// A clock that fell more than one interval behind resyncs to `now`
    /// rather than bursting to catch up.
    pub fn tick(&mut self, now: Instant) -> bool {
        if now < self.next_frame {
            return false;
        }
        self.next_frame += self.interval;
        if self.next_frame <= now {
            self.next_frame = now + self.interval;
        }
        true
    }

    /// Deadline of the next frame
    pub fn next_frame(&self) -> Instant {
        self.next_frame
    }
}
