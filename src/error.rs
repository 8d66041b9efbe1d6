//! Error taxonomy for session start-up, the audio boundary and GPU setup.

use std::path::PathBuf;
use thiserror::Error;

/// Audio file could not be turned into a sample buffer
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read audio file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("unsupported WAV format in {path}: {bits}-bit {format:?}")]
    UnsupportedFormat {
        path: PathBuf,
        bits: u16,
        format: hound::SampleFormat,
    },

    #[error("{path} reports {channels} channels at {sample_rate}Hz")]
    InvalidHeader {
        path: PathBuf,
        channels: u16,
        sample_rate: u32,
    },
}

/// Audio device could not be opened or started
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no default {0} device available")]
    NoDevice(&'static str),

    #[error("failed to query device configuration: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to list device configurations: {0}")]
    Configs(#[from] cpal::SupportedStreamConfigsError),

    #[error("output device cannot play {rate}Hz (device default is {device_rate}Hz)")]
    UnsupportedRate { rate: u32, device_rate: u32 },

    #[error("failed to build audio stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
}

/// Transient, non-fatal problem reported while a stream keeps running
#[derive(Debug, Error)]
pub enum DeviceWarning {
    #[error("input overrun, {dropped} samples dropped")]
    Overrun { dropped: u64 },

    #[error("audio stream error: {0}")]
    Stream(#[from] cpal::StreamError),
}

/// A session could not be started
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("invalid analyzer configuration: {0}")]
    Config(String),
}

/// GPU setup failed
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}
