//! Audio session managing capture, playback and the analysis thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::analyzer::SpectralAnalyzer;
use super::buffer::SpectrumBuffer;
use super::playback::Playback;
use super::source::{live_channel, FileCapture, LiveFeed, SampleSource};
use crate::error::{DeviceError, DeviceWarning, SessionError};
use crate::params::{
    audio_constants::{BLOCK_SIZE, SPECTRUM_BINS},
    AnalyzerConfig,
};

/// Where a session takes its audio from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    File(PathBuf),
    Microphone,
}

impl SessionSource {
    /// Short human-readable name (file stem or "Microphone")
    pub fn label(&self) -> String {
        match self {
            SessionSource::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            SessionSource::Microphone => "Microphone".to_string(),
        }
    }
}

/// Ordered sources still to play, plus the full list for replay
#[derive(Debug, Clone, Default)]
pub struct SessionQueue {
    pending: VecDeque<SessionSource>,
    all: Vec<SessionSource>,
}

impl SessionQueue {
    pub fn new(sources: Vec<SessionSource>) -> Self {
        Self {
            pending: sources.iter().cloned().collect(),
            all: sources,
        }
    }

    /// Sources not yet tried
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pop sources until `start` succeeds; failures are logged and skipped
    ///
    /// `None` means the queue ran dry and the caller should go idle.
    pub fn start_next<S, E, F>(&mut self, mut start: F) -> Option<S>
    where
        E: std::fmt::Display,
        F: FnMut(&SessionSource) -> Result<S, E>,
    {
        while let Some(source) = self.pending.pop_front() {
            match start(&source) {
                Ok(session) => return Some(session),
                Err(e) => log::error!("Could not start '{}': {}", source.label(), e),
            }
        }
        None
    }

    /// Refill the queue with every source, in the original order
    pub fn replay(&mut self) {
        self.pending = self.all.iter().cloned().collect();
    }
}

/// Analyzer presets and playback preference used when starting sessions
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub live: AnalyzerConfig,
    pub file: AnalyzerConfig,
    pub play_audio: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            live: AnalyzerConfig::live(),
            file: AnalyzerConfig::file(),
            play_audio: true,
        }
    }
}

/// One track or microphone capture, from start to stop
pub struct Session {
    label: String,

    /// Latest spectrum (shared with the analysis thread)
    buffer: SpectrumBuffer,

    /// Cleared to ask the analysis thread to exit
    running: Arc<AtomicBool>,

    /// Analysis thread handle; yields the number of ticks performed
    analysis_thread: Option<thread::JoinHandle<u64>>,

    /// Live input stream (kept alive)
    input_stream: Option<cpal::Stream>,

    /// File playback stream (kept alive)
    playback: Option<Playback>,
}

impl Session {
    /// Start a session for `source`
    pub fn start(source: &SessionSource, settings: &SessionSettings) -> Result<Self, SessionError> {
        match source {
            SessionSource::File(path) => {
                Self::start_file(path, settings.file.clone(), settings.play_audio)
            }
            SessionSource::Microphone => Self::start_microphone(settings.live.clone()),
        }
    }

    /// Load a WAV file and start timer-paced analysis (plus optional playback)
    ///
    /// Load failures are returned before any thread starts or any spectrum is written.
    pub fn start_file(
        path: &Path,
        analyzer: AnalyzerConfig,
        play_audio: bool,
    ) -> Result<Self, SessionError> {
        analyzer.validate().map_err(SessionError::Config)?;
        let capture = FileCapture::open(path)?;
        let label = SessionSource::File(path.to_path_buf()).label();

        let playback = if play_audio {
            match Playback::start(capture.samples(), capture.sample_rate()) {
                Ok(playback) => Some(playback),
                Err(e) => {
                    log::warn!("Playback unavailable ({}), continuing silently", e);
                    None
                }
            }
        } else {
            None
        };

        let mut session = Self::spawn(label, Box::new(capture), analyzer);
        session.playback = playback;
        Ok(session)
    }

    /// Open the default input device and start block-driven analysis
    pub fn start_microphone(analyzer: AnalyzerConfig) -> Result<Self, SessionError> {
        analyzer.validate().map_err(SessionError::Config)?;

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(DeviceError::NoDevice("input"))?;
        let supported = device.default_input_config().map_err(DeviceError::from)?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "Microphone: {} @ {}Hz, {} channel(s), {:?}",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        let running = Arc::new(AtomicBool::new(true));
        let (feed, capture) = live_channel(config.sample_rate.0, Arc::clone(&running));

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_input_stream::<f32>(&device, &config, feed)?,
            cpal::SampleFormat::I16 => build_input_stream::<i16>(&device, &config, feed)?,
            cpal::SampleFormat::U16 => build_input_stream::<u16>(&device, &config, feed)?,
            other => return Err(DeviceError::UnsupportedFormat(other).into()),
        };
        stream.play().map_err(DeviceError::from)?;

        let mut session =
            Self::spawn_with_flag("Microphone".to_string(), Box::new(capture), analyzer, running);
        session.input_stream = Some(stream);
        Ok(session)
    }

    fn spawn(label: String, source: Box<dyn SampleSource>, analyzer: AnalyzerConfig) -> Self {
        Self::spawn_with_flag(label, source, analyzer, Arc::new(AtomicBool::new(true)))
    }

    fn spawn_with_flag(
        label: String,
        mut source: Box<dyn SampleSource>,
        analyzer: AnalyzerConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        let buffer = SpectrumBuffer::new(SPECTRUM_BINS);
        let thread_buffer = buffer.clone();
        let thread_running = Arc::clone(&running);

        log::info!(
            "Session '{}' started ({}Hz, {} samples per block)",
            label,
            source.sample_rate(),
            BLOCK_SIZE
        );

        let analysis_thread = thread::spawn(move || {
            let mut analyzer = SpectralAnalyzer::new(analyzer);
            run_analysis_loop(source.as_mut(), &mut analyzer, &thread_buffer, &thread_running)
        });

        Self {
            label,
            buffer,
            running,
            analysis_thread: Some(analysis_thread),
            input_stream: None,
            playback: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Shared spectrum written by this session's analysis thread
    pub fn buffer(&self) -> &SpectrumBuffer {
        &self.buffer
    }

    /// True once the analysis loop has exited (end of track or stop)
    pub fn is_finished(&self) -> bool {
        self.analysis_thread
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Stop streams and join the analysis thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(stream) = self.input_stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause input stream: {}", e);
            }
        }
        self.playback = None;

        if let Some(handle) = self.analysis_thread.take() {
            match handle.join() {
                Ok(ticks) => log::info!(
                    "Session '{}' stopped after {} analysis ticks",
                    self.label,
                    ticks
                ),
                Err(_) => log::error!("Analysis thread for '{}' panicked", self.label),
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Analyze blocks until end of stream or until `running` is cleared
///
/// Sources with a tick interval are paced against absolute deadlines so the
/// loop does not drift behind playback. Returns the number of ticks performed.
pub fn run_analysis_loop(
    source: &mut dyn SampleSource,
    analyzer: &mut SpectralAnalyzer,
    buffer: &SpectrumBuffer,
    running: &AtomicBool,
) -> u64 {
    let mut block = [0.0f32; BLOCK_SIZE];
    let mut ticks = 0u64;
    let mut deadline = Instant::now();

    while running.load(Ordering::Acquire) {
        if source.next_block(&mut block).is_err() {
            log::debug!("End of stream after {} ticks", ticks);
            break;
        }

        let tick = analyzer.analyze(&block, buffer);
        if tick.triggered {
            log::trace!(
                "Beat: bass energy {:.3} -> pulse {:.2}",
                tick.bass_energy,
                tick.beat
            );
        }
        ticks += 1;

        while let Some(warning) = source.poll_warning() {
            log::warn!("{}", warning);
        }

        if let Some(interval) = source.tick_interval() {
            deadline += interval;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                // Fell behind; resync instead of bursting
                deadline = now;
            }
        }
    }

    ticks
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut feed: LiveFeed,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels as usize;
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            feed.push_interleaved(data, channels);
        },
        |err| log::warn!("{}", DeviceWarning::Stream(err)),
        None,
    )?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_tone(path: &Path, samples: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..samples {
            let t = i as f32 / 44100.0;
            writer
                .write_sample((2.0 * std::f32::consts::PI * 440.0 * t).sin())
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_short_file_performs_no_ticks() {
        let mut capture = FileCapture::from_interleaved(&[0.5; 700], 1, 44100).paced(false);
        let mut analyzer = SpectralAnalyzer::new(AnalyzerConfig::file());
        let buffer = SpectrumBuffer::new(SPECTRUM_BINS);
        let running = AtomicBool::new(true);

        let ticks = run_analysis_loop(&mut capture, &mut analyzer, &buffer, &running);

        assert_eq!(ticks, 0);
        let frame = buffer.snapshot();
        assert!(frame.bins.iter().all(|&b| b == 0.0));
        assert_eq!(frame.beat.pulse(), 0.0);
    }

    #[test]
    fn test_loop_analyzes_every_whole_block() {
        let samples: Vec<f32> = (0..BLOCK_SIZE * 3 + 17)
            .map(|i| (i as f32 * 0.05).sin())
            .collect();
        let mut capture = FileCapture::from_interleaved(&samples, 1, 44100).paced(false);
        let mut analyzer = SpectralAnalyzer::new(AnalyzerConfig::file());
        let buffer = SpectrumBuffer::new(SPECTRUM_BINS);
        let running = AtomicBool::new(true);

        let ticks = run_analysis_loop(&mut capture, &mut analyzer, &buffer, &running);

        assert_eq!(ticks, 3);
        assert!(buffer.snapshot().bins.iter().any(|&b| b > 0.0));
    }

    #[test]
    fn test_cleared_flag_prevents_analysis() {
        let mut capture =
            FileCapture::from_interleaved(&vec![0.5; BLOCK_SIZE * 4], 1, 44100).paced(false);
        let mut analyzer = SpectralAnalyzer::new(AnalyzerConfig::file());
        let buffer = SpectrumBuffer::new(SPECTRUM_BINS);
        let running = AtomicBool::new(false);

        assert_eq!(
            run_analysis_loop(&mut capture, &mut analyzer, &buffer, &running),
            0
        );
        assert_eq!(capture.cursor(), 0);
    }

    #[test]
    fn test_exhausted_queue_goes_idle() {
        let mut queue = SessionQueue::new(vec![
            SessionSource::File(PathBuf::from("broken.wav")),
            SessionSource::File(PathBuf::from("a.wav")),
        ]);
        let open = |source: &SessionSource| match source {
            SessionSource::File(path) if path.ends_with("broken.wav") => Err("bad header"),
            other => Ok(other.label()),
        };

        // A failed start is skipped, not fatal
        assert_eq!(queue.start_next(open), Some("a".to_string()));
        assert!(queue.is_empty());

        // Nothing left to start: idle rather than an error
        assert_eq!(queue.start_next(open), None);
        assert_eq!(queue.start_next(open), None);

        queue.replay();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.start_next(open), Some("a".to_string()));
    }

    #[test]
    fn test_empty_queue_stays_idle() {
        let mut queue = SessionQueue::default();
        let mut attempts = 0;
        let started = queue.start_next(|_| {
            attempts += 1;
            Ok::<_, String>(())
        });
        assert!(started.is_none());
        assert_eq!(attempts, 0);
    }

    #[test]
    fn test_missing_file_aborts_session() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            Session::start_file(&dir.path().join("nope.wav"), AnalyzerConfig::file(), false);
        assert!(matches!(result, Err(SessionError::Load(_))));
    }

    #[test]
    fn test_invalid_analyzer_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, BLOCK_SIZE * 2);

        let mut config = AnalyzerConfig::file();
        config.smoothing_kernel = 0;
        let result = Session::start_file(&path, config, false);
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_file_session_runs_to_end_of_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, BLOCK_SIZE * 3);

        let mut session = Session::start_file(&path, AnalyzerConfig::file(), false).unwrap();
        assert_eq!(session.label(), "tone");

        let started = Instant::now();
        while !session.is_finished() {
            assert!(started.elapsed() < Duration::from_secs(5), "session never ended");
            thread::sleep(Duration::from_millis(10));
        }
        assert!(session.buffer().snapshot().bins.iter().any(|&b| b > 0.0));
        session.stop();
        assert!(session.is_finished());
    }

    #[test]
    fn test_stop_interrupts_long_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        // ~10s of audio; stop must not wait for the end
        write_tone(&path, 44100 * 10);

        let mut session = Session::start_file(&path, AnalyzerConfig::file(), false).unwrap();
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        session.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(session.is_finished());
    }

    #[test]
    fn test_source_labels() {
        let file = SessionSource::File(PathBuf::from("music/Penn Station.wav"));
        assert_eq!(file.label(), "Penn Station");
        assert_eq!(SessionSource::Microphone.label(), "Microphone");
    }
}
