//! Shared spectrum state between the analysis thread and the render loop.
//!
//! `SpectrumBuffer` is the only object crossing the thread boundary. Every
//! access is a short scoped lock that copies or mutates the bins and the beat
//! pulse; nothing else happens while the lock is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Pulse values below this snap to exactly zero
pub const BEAT_FLOOR: f32 = 1e-3;

/// Decaying bass-transient pulse in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BeatState {
    pulse: f32,
}

impl BeatState {
    /// Current pulse value
    pub fn pulse(&self) -> f32 {
        self.pulse
    }

    /// Set the pulse from a detected transient (clamped to [0, 1])
    pub fn trigger(&mut self, value: f32) {
        self.pulse = value.clamp(0.0, 1.0);
    }

    /// Additive decay (analysis tick)
    pub fn decay_linear(&mut self, step: f32) {
        self.pulse = (self.pulse - step).max(0.0);
        self.snap();
    }

    /// Geometric decay (render tick)
    pub fn decay_geometric(&mut self, factor: f32) {
        self.pulse *= factor.clamp(0.0, 1.0);
        self.snap();
    }

    fn snap(&mut self) {
        if self.pulse < BEAT_FLOOR {
            self.pulse = 0.0;
        }
    }
}

/// Most recent analyzed spectrum plus beat state
#[derive(Debug, Clone, Default)]
pub struct SpectrumFrame {
    pub bins: Vec<f32>,
    pub beat: BeatState,
}

/// Thread-safe handle to the latest spectrum (cheap to clone)
#[derive(Debug, Clone)]
pub struct SpectrumBuffer {
    inner: Arc<Mutex<SpectrumFrame>>,
}

impl SpectrumBuffer {
    /// Create a zeroed buffer with `bins` spectrum bins
    pub fn new(bins: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SpectrumFrame {
                bins: vec![0.0; bins],
                beat: BeatState::default(),
            })),
        }
    }

    // Writers only copy plain floats, so a poisoned frame is still valid
    fn lock(&self) -> MutexGuard<'_, SpectrumFrame> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new spectrum and update the beat state under one lock
    pub fn publish<F>(&self, spectrum: &[f32], update_beat: F) -> f32
    where
        F: FnOnce(&mut BeatState),
    {
        let mut frame = self.lock();
        frame.bins.clear();
        frame.bins.extend_from_slice(spectrum);
        update_beat(&mut frame.beat);
        frame.beat.pulse()
    }

    /// Copy the current spectrum into `out`, returning the beat pulse
    pub fn read_into(&self, out: &mut Vec<f32>) -> f32 {
        let frame = self.lock();
        out.clear();
        out.extend_from_slice(&frame.bins);
        frame.beat.pulse()
    }

    /// Apply the render-tick decay, returning the decayed pulse
    pub fn decay_beat(&self, factor: f32) -> f32 {
        let mut frame = self.lock();
        frame.beat.decay_geometric(factor);
        frame.beat.pulse()
    }

    /// Current beat pulse
    pub fn beat(&self) -> f32 {
        self.lock().beat.pulse()
    }

    /// Owned copy of the whole frame
    pub fn snapshot(&self) -> SpectrumFrame {
        self.lock().clone()
    }
}
