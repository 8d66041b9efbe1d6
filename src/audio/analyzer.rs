//! Per-block spectral analysis and bass transient detection.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use super::buffer::{BeatState, SpectrumBuffer};
use super::source::SampleBlock;
use crate::params::{
    audio_constants::{BLOCK_SIZE, NORMALIZE_EPSILON, SPECTRUM_BINS},
    AnalyzerConfig, BeatConfig,
};

/// Result of one analysis tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisTick {
    /// Bass energy read by the transient detector
    pub bass_energy: f32,

    /// Whether a new transient was accepted this tick
    pub triggered: bool,

    /// Beat pulse after triggering and decay
    pub beat: f32,
}

/// Bass transient detector with hysteresis
#[derive(Debug, Clone)]
pub struct BeatDetector {
    config: BeatConfig,
}

impl BeatDetector {
    pub fn new(config: BeatConfig) -> Self {
        Self { config }
    }

    /// Trigger (if allowed) and decay the pulse for one analysis tick
    ///
    /// Returns true when a new transient was accepted.
    pub fn update(&self, bass_energy: f32, beat: &mut BeatState) -> bool {
        let triggered =
            bass_energy > self.config.threshold && beat.pulse() < self.config.watermark;
        if triggered {
            // Harder hits flash stronger
            beat.trigger((bass_energy * self.config.gain).min(1.0));
        }
        beat.decay_linear(self.config.decay_per_tick);
        triggered
    }
}

/// Windowed FFT → log-compressed, normalized, smoothed spectrum
pub struct SpectralAnalyzer {
    config: AnalyzerConfig,
    detector: BeatDetector,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fade: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    current: Vec<f32>,
    convolved: Vec<f32>,
    smoothed: Vec<f32>,
}

impl SpectralAnalyzer {
    /// Create an analyzer for `BLOCK_SIZE` blocks
    pub fn new(config: AnalyzerConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(BLOCK_SIZE);
        let scratch_len = fft.get_inplace_scratch_len();

        let window = (0..BLOCK_SIZE)
            .map(|i| {
                if config.hann_window {
                    hann_window(i, BLOCK_SIZE)
                } else {
                    1.0
                }
            })
            .collect();

        Self {
            fade: fade_in_ramp(config.fade_bins),
            detector: BeatDetector::new(config.beat.clone()),
            config,
            fft,
            window,
            fft_buffer: vec![Complex::new(0.0, 0.0); BLOCK_SIZE],
            fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            current: vec![0.0; SPECTRUM_BINS],
            convolved: vec![0.0; SPECTRUM_BINS],
            smoothed: vec![0.0; SPECTRUM_BINS],
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run the spectral pipeline on one block and return the smoothed spectrum
    pub fn process(&mut self, block: &SampleBlock) -> &[f32] {
        // DC removal, then window
        let mean = block.iter().sum::<f32>() / BLOCK_SIZE as f32;
        for ((slot, &sample), &w) in self.fft_buffer.iter_mut().zip(block.iter()).zip(&self.window)
        {
            *slot = Complex::new((sample - mean) * w, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.fft_scratch);

        // Magnitudes of the non-mirrored half
        for (bin, c) in self.current.iter_mut().zip(&self.fft_buffer[..SPECTRUM_BINS]) {
            *bin = c.norm();
        }

        // Sub-bass / DC fade-in
        for (bin, &gain) in self.current.iter_mut().zip(&self.fade) {
            *bin *= gain;
        }

        // Log compression
        for bin in &mut self.current {
            *bin = bin.ln_1p();
        }

        // Peak normalization (epsilon keeps silence at zero), then headroom
        let peak = self.current.iter().copied().fold(0.0f32, f32::max);
        let scale = self.config.attenuation / (peak + NORMALIZE_EPSILON);
        for bin in &mut self.current {
            *bin *= scale;
        }

        uniform_smooth(&self.current, self.config.smoothing_kernel, &mut self.convolved);

        // Temporal EMA against the previous smoothed frame
        let alpha = self.config.ema_alpha;
        for (prev, &current) in self.smoothed.iter_mut().zip(&self.convolved) {
            *prev = (alpha * *prev + (1.0 - alpha) * current).clamp(0.0, 1.0);
        }

        &self.smoothed
    }

    /// Most recent smoothed spectrum
    pub fn spectrum(&self) -> &[f32] {
        &self.smoothed
    }

    /// Full analysis tick: process, detect transients, publish to `buffer`
    pub fn analyze(&mut self, block: &SampleBlock, buffer: &SpectrumBuffer) -> AnalysisTick {
        self.process(block);
        let bass_energy = self.config.beat.probe.energy(&self.smoothed);

        let detector = &self.detector;
        let mut triggered = false;
        let beat = buffer.publish(&self.smoothed, |beat| {
            triggered = detector.update(bass_energy, beat);
        });

        AnalysisTick {
            bass_energy,
            triggered,
            beat,
        }
    }
}

/// Hann window function for FFT analysis
pub fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

/// Cubed linear ramp 0→1 over `len` bins
fn fade_in_ramp(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            if len < 2 {
                0.0
            } else {
                (i as f32 / (len - 1) as f32).powi(3)
            }
        })
        .collect()
}

/// Uniform moving average with "same"-length output and zero padding
///
/// Output index `i` averages `input[i + (k-1)/2 - j]` for `j in 0..k`, which
/// centres odd kernels and leans even kernels one bin toward lower indices.
pub fn uniform_smooth(input: &[f32], kernel_len: usize, output: &mut [f32]) {
    debug_assert_eq!(input.len(), output.len());
    let k = kernel_len.max(1);
    let lead = (k - 1) / 2;
    let n = input.len() as isize;

    for (i, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0;
        for j in 0..k {
            let idx = i as isize + lead as isize - j as isize;
            if (0..n).contains(&idx) {
                sum += input[idx as usize];
            }
        }
        *out = sum / k as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BassProbe;

    const SAMPLE_RATE: f32 = 44100.0;

    fn sine_block(bin: usize, amplitude: f32) -> SampleBlock {
        // Bin-centred frequency: exactly `bin` cycles per block
        let freq = bin as f32 * SAMPLE_RATE / BLOCK_SIZE as f32;
        let mut block = [0.0; BLOCK_SIZE];
        for (i, s) in block.iter_mut().enumerate() {
            *s = amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin();
        }
        block
    }

    fn unsmoothed_config() -> AnalyzerConfig {
        AnalyzerConfig {
            ema_alpha: 0.0,
            attenuation: 1.0,
            ..AnalyzerConfig::file()
        }
    }

    #[test]
    fn test_hann_window() {
        let size = 1024;

        // Hann window should be 0 at edges, 1 at center
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_fade_ramp_is_cubed_and_monotonic() {
        let ramp = fade_in_ramp(25);
        assert_eq!(ramp.len(), 25);
        assert_eq!(ramp[0], 0.0);
        assert_eq!(ramp[24], 1.0);
        assert!((ramp[12] - 0.125).abs() < 1e-6);
        assert!(ramp.windows(2).all(|w| w[1] >= w[0]));

        // A single-bin fade only suppresses DC
        assert_eq!(fade_in_ramp(1), vec![0.0]);
    }

    #[test]
    fn test_uniform_smooth_alignment() {
        let input = [0.0, 3.0, 0.0, 0.0];
        let mut output = [0.0; 4];

        uniform_smooth(&input, 3, &mut output);
        assert_eq!(output, [1.0, 1.0, 1.0, 0.0]);

        uniform_smooth(&input, 2, &mut output);
        assert_eq!(output, [0.0, 1.5, 1.5, 0.0]);

        uniform_smooth(&input, 1, &mut output);
        assert_eq!(output, input);
    }

    #[test]
    fn test_silence_yields_zero_spectrum_and_no_beat() {
        let mut analyzer = SpectralAnalyzer::new(AnalyzerConfig::live());
        let buffer = SpectrumBuffer::new(SPECTRUM_BINS);
        let tick = analyzer.analyze(&[0.0; BLOCK_SIZE], &buffer);

        assert!(!tick.triggered);
        assert_eq!(tick.beat, 0.0);
        let frame = buffer.snapshot();
        assert!(frame.bins.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_spectrum_stays_in_unit_range() {
        for config in [AnalyzerConfig::live(), AnalyzerConfig::file(), unsmoothed_config()] {
            let mut analyzer = SpectralAnalyzer::new(config);
            let mut block = [0.0; BLOCK_SIZE];
            // Deterministic broadband signal: sum of sines plus a square wave
            for (i, s) in block.iter_mut().enumerate() {
                let t = i as f32 / SAMPLE_RATE;
                *s = 0.5 * (2.0 * PI * 220.0 * t).sin()
                    + 0.3 * (2.0 * PI * 3100.0 * t).sin()
                    + if (i / 37) % 2 == 0 { 0.2 } else { -0.2 };
            }
            for _ in 0..10 {
                let spectrum = analyzer.process(&block);
                assert!(spectrum.iter().all(|&b| (0.0..=1.0).contains(&b)));
            }
        }
    }

    #[test]
    fn test_unattenuated_peak_is_one() {
        let config = AnalyzerConfig {
            smoothing_kernel: 1,
            ..unsmoothed_config()
        };
        let mut analyzer = SpectralAnalyzer::new(config);
        let spectrum = analyzer.process(&sine_block(64, 0.5));
        let peak = spectrum.iter().copied().fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-4, "peak was {}", peak);
    }

    #[test]
    fn test_sine_produces_single_dominant_bin() {
        let target = 100;
        let mut analyzer = SpectralAnalyzer::new(unsmoothed_config());
        let spectrum = analyzer.process(&sine_block(target, 0.05)).to_vec();

        let (peak_bin, peak) = spectrum
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, v)| if v > best.1 { (i, v) } else { best });

        assert!(
            (peak_bin as isize - target as isize).abs() <= 1,
            "dominant bin {} not near {}",
            peak_bin,
            target
        );
        assert!(peak > 0.2);

        for (i, &v) in spectrum.iter().enumerate() {
            if (i as isize - target as isize).abs() > 4 {
                assert!(v < 0.02 * peak.max(1.0), "bin {} = {} not near zero", i, v);
            }
        }
    }

    #[test]
    fn test_ema_smooths_between_frames() {
        let mut analyzer = SpectralAnalyzer::new(AnalyzerConfig::live());
        let block = sine_block(40, 0.5);

        let first = analyzer.process(&block)[40];
        let second = analyzer.process(&block)[40];
        // α = 0.9: first frame is only 10% of the way there, the second 19%
        assert!(first > 0.0);
        assert!(second > first);
        assert!((second / first - 1.9).abs() < 1e-3);
    }

    #[test]
    fn test_beat_detector_hysteresis() {
        let detector = BeatDetector::new(AnalyzerConfig::file().beat);
        let mut beat = BeatState::default();

        // Strong hit from rest triggers
        assert!(detector.update(0.1, &mut beat));
        let after_first = beat.pulse();
        assert!(after_first > 0.0 && after_first <= 1.0);

        // Immediate second hit while above the watermark is ignored
        assert!(!detector.update(0.1, &mut beat));
        assert!(beat.pulse() < after_first);

        // Below threshold never triggers
        let mut quiet = BeatState::default();
        assert!(!detector.update(0.05, &mut quiet));
        assert_eq!(quiet.pulse(), 0.0);
    }

    #[test]
    fn test_beat_retriggers_after_decay() {
        let detector = BeatDetector::new(AnalyzerConfig::file().beat);
        let mut beat = BeatState::default();
        assert!(detector.update(0.1, &mut beat));

        let mut ticks = 0;
        while beat.pulse() >= 0.2 {
            detector.update(0.0, &mut beat);
            ticks += 1;
        }
        // 0.95 → below 0.2 in 0.05 steps
        assert!(ticks <= 16);
        assert!(detector.update(0.1, &mut beat));
    }

    #[test]
    fn test_live_beat_needs_sustained_bass() {
        // Even bins 2..=18 fill the whole 20-bin live probe once windowed
        let mut bass = [0.0; BLOCK_SIZE];
        for bin in (2..=18).step_by(2) {
            for (s, t) in bass.iter_mut().zip(sine_block(bin, 0.05)) {
                *s += t;
            }
        }

        let mut analyzer = SpectralAnalyzer::new(AnalyzerConfig::live());
        let buffer = SpectrumBuffer::new(SPECTRUM_BINS);

        // One block after silence reaches at most (1 - 0.9) of its energy
        let first = analyzer.analyze(&bass, &buffer);
        assert!(first.bass_energy <= 0.1 + 1e-6);
        assert!(!first.triggered);

        let mut triggered_at = None;
        for tick in 2..=40 {
            if analyzer.analyze(&bass, &buffer).triggered {
                triggered_at = Some(tick);
                break;
            }
        }
        // 1 - 0.9^5 < 0.65, so nothing can fire before the sixth block
        let tick = triggered_at.expect("sustained bass never triggered");
        assert!(tick > 5, "triggered at tick {}", tick);
    }

    #[test]
    fn test_bass_transient_through_buffer() {
        // Probe the bin the test signal sits on so the trigger is deterministic
        let config = AnalyzerConfig {
            ema_alpha: 0.0,
            beat: BeatConfig {
                probe: BassProbe::Bin(30),
                threshold: 0.1,
                watermark: 0.2,
                gain: 30.0,
                decay_per_tick: 0.05,
            },
            ..AnalyzerConfig::file()
        };
        let mut analyzer = SpectralAnalyzer::new(config);
        let buffer = SpectrumBuffer::new(SPECTRUM_BINS);
        let kick = sine_block(30, 0.9);

        let first = analyzer.analyze(&kick, &buffer);
        assert!(first.triggered, "energy {} did not trigger", first.bass_energy);
        assert!(first.beat > 0.0 && first.beat <= 1.0);
        assert_eq!(buffer.beat(), first.beat);

        let second = analyzer.analyze(&kick, &buffer);
        assert!(!second.triggered);
        assert!(second.beat < first.beat);
    }
}
