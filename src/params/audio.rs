//! Audio analysis configuration and constants.
//!
//! Beat-detection constants are aesthetic tuning found by trial, not derived
//! values. Both presets can be overridden from the `[analysis.*]` config tables.

use serde::Deserialize;

/// Audio constants (compile-time)
pub mod audio_constants {
    /// Samples per analysis block
    /// 1024 samples = 23.2ms @ 44.1kHz
    pub const BLOCK_SIZE: usize = 1024;

    /// Bins kept from each FFT (mirror-symmetric half discarded)
    pub const SPECTRUM_BINS: usize = BLOCK_SIZE / 2;

    /// Added to the per-block peak before normalizing (silence guard)
    pub const NORMALIZE_EPSILON: f32 = 1e-6;
}

/// Where the bass transient detector reads its energy from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BassProbe {
    /// Magnitude of a single bin (file preset: bin 10 ≈ 430 Hz)
    Bin(usize),

    /// Mean of the first N bins (live preset: 20 bins ≈ 0-860 Hz)
    MeanOfFirst(usize),
}

impl BassProbe {
    /// Read the probe energy from a spectrum; out-of-range probes read as silence
    pub fn energy(&self, spectrum: &[f32]) -> f32 {
        match *self {
            BassProbe::Bin(bin) => spectrum.get(bin).copied().unwrap_or(0.0),
            BassProbe::MeanOfFirst(count) => {
                let count = count.min(spectrum.len());
                if count == 0 {
                    return 0.0;
                }
                spectrum[..count].iter().sum::<f32>() / count as f32
            }
        }
    }
}

/// Bass transient ("beat") detection with hysteresis
#[derive(Debug, Clone, PartialEq)]
pub struct BeatConfig {
    /// Which part of the smoothed spectrum is treated as bass energy
    pub probe: BassProbe,

    /// Energy that must be exceeded to trigger (normalized spectrum units)
    pub threshold: f32,

    /// Pulse must have decayed below this before a new trigger is accepted
    pub watermark: f32,

    /// Pulse on trigger = min(1.0, energy * gain)
    pub gain: f32,

    /// Subtracted from the pulse on every analysis tick (0 = render-side decay only)
    pub decay_per_tick: f32,
}

/// Spectral analysis parameters for one kind of input
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Apply a Hann window after DC removal
    pub hann_window: bool,

    /// Number of low bins faded in with a cubed 0→1 ramp
    pub fade_bins: usize,

    /// Whole-spectrum multiplier applied after peak normalization (headroom)
    pub attenuation: f32,

    /// Length of the uniform bin-smoothing kernel (2-3 in practice, 1 = off)
    pub smoothing_kernel: usize,

    /// EMA weight of the previous frame: smoothed = α·prev + (1−α)·current
    pub ema_alpha: f32,

    /// Transient detection
    pub beat: BeatConfig,
}

impl AnalyzerConfig {
    /// Microphone input: heavy smoothing to absorb callback jitter
    pub fn live() -> Self {
        Self {
            hann_window: true,
            fade_bins: 1, // DC only; the bass probe reads the low bins unfaded
            attenuation: 1.0,
            smoothing_kernel: 3,
            ema_alpha: 0.9,
            beat: BeatConfig {
                probe: BassProbe::MeanOfFirst(20),
                threshold: 0.65,
                watermark: 0.2,
                gain: 2.0,
                decay_per_tick: 0.0,
            },
        }
    }

    /// Pre-loaded file playback: evenly paced blocks, lighter smoothing
    pub fn file() -> Self {
        Self {
            hann_window: true,
            fade_bins: 25,
            attenuation: 0.3,
            smoothing_kernel: 2,
            ema_alpha: 0.25,
            beat: BeatConfig {
                probe: BassProbe::Bin(10),
                threshold: 0.08,
                watermark: 0.2,
                gain: 30.0,
                decay_per_tick: 0.05,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..1.0).contains(&self.ema_alpha) {
            return Err(format!("EMA alpha must be in [0, 1), got {}", self.ema_alpha));
        }
        if self.smoothing_kernel == 0 || self.smoothing_kernel > audio_constants::SPECTRUM_BINS {
            return Err(format!(
                "Smoothing kernel length must be in 1..={}, got {}",
                audio_constants::SPECTRUM_BINS,
                self.smoothing_kernel
            ));
        }
        if self.fade_bins > audio_constants::SPECTRUM_BINS {
            return Err(format!(
                "fade_bins ({}) exceeds spectrum length ({})",
                self.fade_bins,
                audio_constants::SPECTRUM_BINS
            ));
        }
        if !(0.0..=1.0).contains(&self.attenuation) {
            return Err(format!("Attenuation must be in [0, 1], got {}", self.attenuation));
        }
        if self.beat.decay_per_tick < 0.0 || self.beat.gain < 0.0 {
            return Err("Beat gain and decay must be non-negative".to_string());
        }
        Ok(())
    }
}

/// Partial analyzer settings read from a config table and layered on a preset
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisOverrides {
    pub hann_window: Option<bool>,
    pub fade_bins: Option<usize>,
    pub attenuation: Option<f32>,
    pub smoothing_kernel: Option<usize>,
    pub ema_alpha: Option<f32>,
    /// Single probe bin (mutually exclusive with `bass_mean_bins`)
    pub bass_bin: Option<usize>,
    /// Probe the mean of the first N bins
    pub bass_mean_bins: Option<usize>,
    pub beat_threshold: Option<f32>,
    pub beat_watermark: Option<f32>,
    pub beat_gain: Option<f32>,
    pub beat_decay: Option<f32>,
}

impl AnalysisOverrides {
    /// Reject combinations that cannot be layered unambiguously
    pub fn validate(&self) -> Result<(), String> {
        if self.bass_bin.is_some() && self.bass_mean_bins.is_some() {
            return Err("bass_bin and bass_mean_bins are mutually exclusive".to_string());
        }
        Ok(())
    }

    /// Layer these overrides on top of `base`
    pub fn apply(&self, mut base: AnalyzerConfig) -> AnalyzerConfig {
        if let Some(v) = self.hann_window {
            base.hann_window = v;
        }
        if let Some(v) = self.fade_bins {
            base.fade_bins = v;
        }
        if let Some(v) = self.attenuation {
            base.attenuation = v;
        }
        if let Some(v) = self.smoothing_kernel {
            base.smoothing_kernel = v;
        }
        if let Some(v) = self.ema_alpha {
            base.ema_alpha = v;
        }
        if let Some(bin) = self.bass_bin {
            base.beat.probe = BassProbe::Bin(bin);
        } else if let Some(count) = self.bass_mean_bins {
            base.beat.probe = BassProbe::MeanOfFirst(count);
        }
        if let Some(v) = self.beat_threshold {
            base.beat.threshold = v;
        }
        if let Some(v) = self.beat_watermark {
            base.beat.watermark = v;
        }
        if let Some(v) = self.beat_gain {
            base.beat.gain = v;
        }
        if let Some(v) = self.beat_decay {
            base.beat.decay_per_tick = v;
        }
        base
    }
}
