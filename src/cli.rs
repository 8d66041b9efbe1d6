//! Command-line argument parsing and track discovery.

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::audio::SessionSource;
use crate::visual::ShapeMode;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "resonograph")]
#[command(about = "Real-time audio spectrum visualizer", long_about = None)]
pub struct Args {
    /// WAV files to visualize, in order (played before discovered tracks)
    #[arg(value_name = "WAV")]
    pub inputs: Vec<PathBuf>,

    /// Visualize the default microphone after the queued tracks
    #[arg(long)]
    pub mic: bool,

    /// Directory scanned for .wav tracks
    #[arg(long, value_name = "DIR", default_value = "music")]
    pub music_dir: PathBuf,

    /// Print the discovered tracks and exit
    #[arg(long)]
    pub list: bool,

    /// Config file (default: ./resonograph.toml, then the user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Window width in pixels (overrides config)
    #[arg(long, value_name = "PIXELS")]
    pub width: Option<u32>,

    /// Window height in pixels (overrides config)
    #[arg(long, value_name = "PIXELS")]
    pub height: Option<u32>,

    /// Starting shape
    #[arg(long, value_enum)]
    pub shape: Option<ShapeMode>,

    /// Start with the logarithmic band distribution
    #[arg(long)]
    pub logarithmic: bool,

    /// Analyze files without playing them
    #[arg(long)]
    pub mute: bool,
}

impl Args {
    /// Sessions to run, in order: explicit files, discovered tracks, microphone
    ///
    /// Discovered tracks are only queued when no explicit files were given.
    pub fn session_queue(&self, discovered: &[PathBuf]) -> Vec<SessionSource> {
        let files = if self.inputs.is_empty() {
            discovered
        } else {
            &self.inputs[..]
        };
        let mut queue: Vec<SessionSource> =
            files.iter().cloned().map(SessionSource::File).collect();
        if self.mic || queue.is_empty() {
            queue.push(SessionSource::Microphone);
        }
        queue
    }
}

/// Sorted `.wav` files (any case) directly inside `dir`; a missing dir yields none
pub fn scan_music_dir(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Music directory {} unavailable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut tracks: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    tracks.sort();
    tracks
}
