//! Audio capture and spectral analysis.
//!
//! Blocks flow from a `SampleSource` (file or microphone) through the
//! `SpectralAnalyzer` on a dedicated thread; the result lands in a shared
//! `SpectrumBuffer` that the render loop reads once per frame.

mod analyzer;
mod buffer;
mod playback;
mod source;
mod system;

pub use analyzer::{hann_window, uniform_smooth, AnalysisTick, BeatDetector, SpectralAnalyzer};
pub use buffer::{BeatState, SpectrumBuffer, SpectrumFrame, BEAT_FLOOR};
pub use playback::Playback;
pub use source::{
    downmix, live_channel, peak_normalize, EndOfStream, FileCapture, LiveCapture, LiveFeed,
    SampleBlock, SampleSource,
};
pub use system::{run_analysis_loop, Session, SessionQueue, SessionSettings, SessionSource};
