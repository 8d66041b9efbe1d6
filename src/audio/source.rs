//! Sample sources: pre-loaded files and live capture blocks.
//!
//! Both variants hand the analysis loop fixed-size mono blocks through the
//! `SampleSource` trait. Live capture splits into a `LiveFeed` (owned by the
//! realtime callback) and a `LiveCapture` (owned by the analysis thread),
//! joined by a lock-free SPSC ring buffer.

use rtrb::{Consumer, Producer, RingBuffer};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::error::{DeviceWarning, LoadError};
use crate::params::audio_constants::BLOCK_SIZE;

/// One analysis block of mono samples in [-1, 1]
pub type SampleBlock = [f32; BLOCK_SIZE];

/// Peaks at or below this are treated as silence when normalizing
const SILENT_PEAK: f32 = 1e-9;

/// Blocks of headroom in the live ring buffer before samples are dropped
const LIVE_RING_BLOCKS: usize = 8;

/// How long `LiveCapture` sleeps while waiting for a full block
const LIVE_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// The source has no further complete blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("end of stream")]
pub struct EndOfStream;

/// Producer of fixed-size mono sample blocks
pub trait SampleSource: Send {
    /// Sample rate of the produced blocks (Hz)
    fn sample_rate(&self) -> u32;

    /// Fill `block` with the next `BLOCK_SIZE` samples
    fn next_block(&mut self, block: &mut SampleBlock) -> Result<(), EndOfStream>;

    /// Interval the analysis loop should pace itself at (None = source paces itself)
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    /// Non-fatal problem observed since the last poll
    fn poll_warning(&mut self) -> Option<DeviceWarning> {
        None
    }
}

/// Average interleaved frames down to mono
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    let channels = channels.max(1);
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Scale samples so the absolute peak is 1.0 (silent input becomes all zero)
pub fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= SILENT_PEAK {
        samples.iter_mut().for_each(|s| *s = 0.0);
        return;
    }
    let gain = 1.0 / peak;
    samples.iter_mut().for_each(|s| *s *= gain);
}

/// Fully decoded file consumed block by block
#[derive(Debug, Clone)]
pub struct FileCapture {
    samples: Arc<[f32]>,
    sample_rate: u32,
    cursor: usize,
    paced: bool,
}

impl FileCapture {
    /// Decode a WAV file, down-mix to mono and peak-normalize
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let read_err = |source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = hound::WavReader::open(path).map_err(read_err)?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(LoadError::InvalidHeader {
                path: path.to_path_buf(),
                channels: spec.channels,
                sample_rate: spec.sample_rate,
            });
        }

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(read_err)?,
            (hound::SampleFormat::Int, bits @ 8..=32) => {
                let scale = 1.0 / (1u64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(read_err)?
            }
            (format, bits) => {
                return Err(LoadError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    bits,
                    format,
                })
            }
        };

        let capture = Self::from_interleaved(&interleaved, spec.channels, spec.sample_rate);
        log::info!(
            "Loaded {}: {} samples, {}Hz, {} channel(s), {:.1}s",
            path.display(),
            capture.samples.len(),
            spec.sample_rate,
            spec.channels,
            capture.duration().as_secs_f32()
        );
        Ok(capture)
    }

    /// Build from already-decoded interleaved PCM
    pub fn from_interleaved(interleaved: &[f32], channels: u16, sample_rate: u32) -> Self {
        let mut mono = downmix(interleaved, channels as usize);
        peak_normalize(&mut mono);
        Self {
            samples: mono.into(),
            sample_rate,
            cursor: 0,
            paced: true,
        }
    }

    /// Enable or disable real-time pacing of the analysis loop
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Shared handle to the normalized mono samples (for playback)
    pub fn samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    /// Index of the next unread sample
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Length of the loaded audio
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

impl SampleSource for FileCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_block(&mut self, block: &mut SampleBlock) -> Result<(), EndOfStream> {
        // A partial tail block is never analyzed
        let end = self.cursor + BLOCK_SIZE;
        if end > self.samples.len() {
            return Err(EndOfStream);
        }
        block.copy_from_slice(&self.samples[self.cursor..end]);
        self.cursor = end;
        Ok(())
    }

    fn tick_interval(&self) -> Option<Duration> {
        self.paced
            .then(|| Duration::from_secs_f64(BLOCK_SIZE as f64 / self.sample_rate as f64))
    }
}

/// Callback half of a live capture: down-mixes and enqueues samples
pub struct LiveFeed {
    producer: Producer<f32>,
    dropped: Arc<AtomicU64>,
}

impl LiveFeed {
    /// Push interleaved device samples as mono
    ///
    /// Runs inside the realtime callback: no allocation, locking or logging.
    /// Samples that do not fit in the ring are counted and dropped.
    pub fn push_interleaved<T>(&mut self, data: &[T], channels: usize)
    where
        T: cpal::Sample,
        f32: cpal::FromSample<T>,
    {
        let channels = channels.max(1);
        for frame in data.chunks_exact(channels) {
            let mono = frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32;
            if self.producer.push(mono).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Analysis half of a live capture: yields blocks as they fill
pub struct LiveCapture {
    consumer: Consumer<f32>,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    reported: u64,
}

/// Create the connected callback/analysis halves of a live capture
///
/// `LiveCapture::next_block` returns `EndOfStream` once `running` is cleared.
pub fn live_channel(sample_rate: u32, running: Arc<AtomicBool>) -> (LiveFeed, LiveCapture) {
    let (producer, consumer) = RingBuffer::new(BLOCK_SIZE * LIVE_RING_BLOCKS);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        LiveFeed {
            producer,
            dropped: Arc::clone(&dropped),
        },
        LiveCapture {
            consumer,
            sample_rate,
            running,
            dropped,
            reported: 0,
        },
    )
}

impl SampleSource for LiveCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_block(&mut self, block: &mut SampleBlock) -> Result<(), EndOfStream> {
        loop {
            if !self.running.load(Ordering::Acquire) {
                return Err(EndOfStream);
            }
            if let Ok(chunk) = self.consumer.read_chunk(BLOCK_SIZE) {
                let (first, second) = chunk.as_slices();
                block[..first.len()].copy_from_slice(first);
                block[first.len()..].copy_from_slice(second);
                chunk.commit_all();
                return Ok(());
            }
            thread::sleep(LIVE_POLL_INTERVAL);
        }
    }

    fn poll_warning(&mut self) -> Option<DeviceWarning> {
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > self.reported {
            let warning = DeviceWarning::Overrun {
                dropped: dropped - self.reported,
            };
            self.reported = dropped;
            return Some(warning);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(&stereo, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(downmix(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn test_peak_normalize() {
        let mut samples = vec![0.25, -0.5, 0.1];
        peak_normalize(&mut samples);
        assert_eq!(samples, vec![0.5, -1.0, 0.2]);

        // Silence stays silent instead of dividing by zero
        let mut silent = vec![0.0, 1e-12, -1e-12];
        peak_normalize(&mut silent);
        assert!(silent.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_file_capture_short_buffer_is_end_of_stream() {
        let mut capture = FileCapture::from_interleaved(&vec![0.3; BLOCK_SIZE - 1], 1, 44100);
        let mut block = [0.0; BLOCK_SIZE];
        assert_eq!(capture.next_block(&mut block), Err(EndOfStream));
        assert_eq!(capture.cursor(), 0);
    }

    #[test]
    fn test_file_capture_consumes_whole_blocks_only() {
        let samples: Vec<f32> = (0..BLOCK_SIZE * 2 + 100).map(|i| i as f32).collect();
        let mut capture = FileCapture::from_interleaved(&samples, 1, 44100);
        let mut block = [0.0; BLOCK_SIZE];

        assert!(capture.next_block(&mut block).is_ok());
        assert_eq!(capture.cursor(), BLOCK_SIZE);
        assert!(capture.next_block(&mut block).is_ok());
        let expected = BLOCK_SIZE as f32 / (samples.len() - 1) as f32;
        assert!((block[0] - expected).abs() < 1e-6);

        // The 100-sample tail is not padded out into a block
        assert_eq!(capture.next_block(&mut block), Err(EndOfStream));
        assert_eq!(capture.cursor(), BLOCK_SIZE * 2);
    }

    #[test]
    fn test_file_capture_pacing() {
        let capture = FileCapture::from_interleaved(&[0.0; 16], 1, 44100);
        let interval = capture.tick_interval().unwrap();
        assert!((interval.as_secs_f64() - BLOCK_SIZE as f64 / 44100.0).abs() < 1e-9);
        assert_eq!(capture.paced(false).tick_interval(), None);
    }

    #[test]
    fn test_open_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // L/R pairs: averages are 1000, -2000, 500
        write_wav(&path, 2, &[2000, 0, -2000, -2000, 0, 1000]);

        let capture = FileCapture::open(&path).unwrap();
        assert_eq!(capture.sample_rate(), 22050);
        let samples = capture.samples();
        assert_eq!(samples.len(), 3);
        assert!((samples[0] - 0.5).abs() < 1e-6);
        assert!((samples[1] + 1.0).abs() < 1e-6);
        assert!((samples[2] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_open_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileCapture::open(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(LoadError::Read { .. })));
    }

    #[test]
    fn test_open_garbage_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a RIFF header").unwrap();
        assert!(matches!(FileCapture::open(&path), Err(LoadError::Read { .. })));
    }

    #[test]
    fn test_live_channel_delivers_mono_blocks() {
        let running = Arc::new(AtomicBool::new(true));
        let (mut feed, mut capture) = live_channel(48000, Arc::clone(&running));

        // Stereo i16 input, one and a half blocks worth
        let frames = BLOCK_SIZE + BLOCK_SIZE / 2;
        let data: Vec<i16> = (0..frames).flat_map(|_| [i16::MAX, 0]).collect();
        feed.push_interleaved(&data, 2);

        let mut block = [0.0; BLOCK_SIZE];
        assert!(capture.next_block(&mut block).is_ok());
        assert!(block.iter().all(|&s| (s - 0.5).abs() < 1e-3));
        assert!(capture.poll_warning().is_none());

        // Half a block remains; stopping ends the stream instead of blocking
        running.store(false, Ordering::Release);
        assert_eq!(capture.next_block(&mut block), Err(EndOfStream));
    }

    #[test]
    fn test_live_overrun_is_reported_once() {
        let running = Arc::new(AtomicBool::new(true));
        let (mut feed, mut capture) = live_channel(48000, running);

        let data = vec![0.1f32; BLOCK_SIZE * LIVE_RING_BLOCKS + 10];
        feed.push_interleaved(&data, 1);

        match capture.poll_warning() {
            Some(DeviceWarning::Overrun { dropped }) => assert_eq!(dropped, 10),
            other => panic!("expected overrun, got {:?}", other),
        }
        assert!(capture.poll_warning().is_none());
    }
}
