//! TOML configuration file.
//!
//! Every table and key is optional; anything missing falls back to defaults.
//!
//! ```toml
//! palette = [[255, 0, 0], [0, 0, 255]]
//!
//! [window]
//! width = 1280
//! height = 720
//! background_image = "data/img/backdrop.png"
//!
//! [display]
//! log_scale = 63.0
//! logarithmic = false
//! shape = "heart"
//!
//! [analysis.file]
//! beat_threshold = 0.1
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::SessionSettings;
use crate::params::{AnalysisOverrides, AnalyzerConfig, RenderConfig};
use crate::visual::{Palette, ShapeMode};

/// File name looked up in the working directory
pub const LOCAL_CONFIG: &str = "resonograph.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid [analysis.{table}] in {path}: {message}")]
    Invalid {
        path: PathBuf,
        table: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: RenderConfig,
    pub display: DisplayConfig,
    pub palette: Palette,
    pub analysis: AnalysisConfig,
}

/// Initial display toggles (the `[display]` table)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Log band scale factor S; values <= 1 behave as linear
    pub log_scale: f32,
    pub logarithmic: bool,
    pub flash: bool,
    pub shape: ShapeMode,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            log_scale: 63.0,
            logarithmic: false,
            flash: true,
            shape: ShapeMode::Circle,
        }
    }
}

/// Analyzer preset overrides (the `[analysis.live]` and `[analysis.file]` tables)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub live: AnalysisOverrides,
    pub file: AnalysisOverrides,
}

impl AnalysisConfig {
    /// Check both tables and the presets they produce
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        self.live
            .validate()
            .and_then(|()| self.live_config().validate())
            .map_err(|message| ("live", message))?;
        self.file
            .validate()
            .and_then(|()| self.file_config().validate())
            .map_err(|message| ("file", message))
    }

    pub fn live_config(&self) -> AnalyzerConfig {
        self.live.apply(AnalyzerConfig::live())
    }

    pub fn file_config(&self) -> AnalyzerConfig {
        self.file.apply(AnalyzerConfig::file())
    }

    /// Session settings with these presets
    pub fn session_settings(&self, play_audio: bool) -> SessionSettings {
        SessionSettings {
            live: self.live_config(),
            file: self.file_config(),
            play_audio,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config
        .analysis
        .validate()
        .map_err(|(table, message)| ConfigError::Invalid {
            path: path.to_path_buf(),
            table,
            message,
        })?;
    Ok(config)
}

/// Config path: explicit path, else ./resonograph.toml, else the platform config dir
pub fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("resonograph").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Load the discovered config, falling back to defaults when absent or malformed
pub fn resolve_config(explicit: Option<&Path>) -> Config {
    let Some(path) = discover_config(explicit) else {
        log::debug!("No config file found, using defaults");
        return Config::default();
    };
    match load_config(&path) {
        Ok(config) => {
            log::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("{}; using defaults", e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BassProbe;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_empty_config_is_default() {
        let (_dir, path) = write_config("");
        let config = load_config(&path).unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert!(config.window.background_image.is_none());
        assert_eq!(config.display.log_scale, 63.0);
        assert_eq!(config.palette, Palette::default());
        assert_eq!(config.analysis.file_config(), AnalyzerConfig::file());
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"
palette = [[1, 2, 3], [4, 5, 6]]

[window]
width = 1280
height = 720
background_image = "img/back.png"

[display]
log_scale = 10.0
logarithmic = true
shape = "heart"

[analysis.live]
bass_bin = 4
beat_threshold = 0.5
"#,
        );
        let config = load_config(&path).unwrap();

        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(
            config.window.background_image,
            Some(PathBuf::from("img/back.png"))
        );
        assert_eq!(config.display.log_scale, 10.0);
        assert!(config.display.logarithmic);
        assert!(config.display.flash);
        assert_eq!(config.display.shape, ShapeMode::Heart);
        assert_eq!(config.palette.colors(), &[[1, 2, 3], [4, 5, 6]]);

        let live = config.analysis.live_config();
        assert_eq!(live.beat.probe, BassProbe::Bin(4));
        assert_eq!(live.beat.threshold, 0.5);
        assert_eq!(live.ema_alpha, AnalyzerConfig::live().ema_alpha);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let (_dir, path) = write_config("[window]\nwidth = \"wide\"\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));

        let (_dir, path) = write_config("palette = []\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));

        let (_dir, path) = write_config("[analysis.file]\nbeat_treshold = 0.1\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_analysis_overrides_are_rejected() {
        let (_dir, path) = write_config("[analysis.live]\nbass_bin = 4\nbass_mean_bins = 8\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Invalid { table: "live", .. })
        ));

        let (_dir, path) = write_config("[analysis.file]\nsmoothing_kernel = 100000000\n");
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Invalid { table: "file", .. })
        ));

        // Rejected tables fall back to the presets
        let config = resolve_config(Some(&path));
        assert_eq!(config.analysis.file_config(), AnalyzerConfig::file());
    }

    #[test]
    fn test_resolve_falls_back_to_defaults() {
        let (_dir, path) = write_config("this is not toml");
        let config = resolve_config(Some(&path));
        assert_eq!(config.window.width, 800);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(load_config(&missing), Err(ConfigError::Read { .. })));
        let config = resolve_config(Some(&missing));
        assert_eq!(config.palette, Palette::default());
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = PathBuf::from("/somewhere/custom.toml");
        assert_eq!(discover_config(Some(&path)), Some(path));
    }
}
