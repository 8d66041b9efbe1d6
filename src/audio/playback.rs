//! Audible playback of a loaded file through the default output device.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use std::sync::Arc;

use crate::error::{DeviceError, DeviceWarning};

/// Running output stream (stops when dropped)
pub struct Playback {
    _stream: cpal::Stream,
}

impl Playback {
    /// Play mono `samples` at `sample_rate`, duplicated to every output channel
    ///
    /// The file is not resampled, so the device must accept its rate.
    pub fn start(samples: Arc<[f32]>, sample_rate: u32) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoDevice("output"))?;
        let default = device.default_output_config()?;

        let supported = pick_output_config(
            device.supported_output_configs()?,
            sample_rate,
            default.channels(),
        )
        .ok_or(DeviceError::UnsupportedRate {
            rate: sample_rate,
            device_rate: default.sample_rate().0,
        })?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "Playback: {} @ {}Hz, {} channel(s), {:?}",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            config.channels,
            sample_format
        );

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_output_stream::<f32>(&device, &config, samples)?,
            cpal::SampleFormat::I16 => build_output_stream::<i16>(&device, &config, samples)?,
            cpal::SampleFormat::U16 => build_output_stream::<u16>(&device, &config, samples)?,
            other => return Err(DeviceError::UnsupportedFormat(other)),
        };
        stream.play()?;

        Ok(Self { _stream: stream })
    }
}

/// Choose an output config that runs at exactly `sample_rate`
///
/// Prefers the device's default channel count, then f32 samples.
pub fn pick_output_config<I>(
    ranges: I,
    sample_rate: u32,
    channels: cpal::ChannelCount,
) -> Option<cpal::SupportedStreamConfig>
where
    I: IntoIterator<Item = cpal::SupportedStreamConfigRange>,
{
    let rate = cpal::SampleRate(sample_rate);
    ranges
        .into_iter()
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .filter(|range| {
            matches!(
                range.sample_format(),
                cpal::SampleFormat::F32 | cpal::SampleFormat::I16 | cpal::SampleFormat::U16
            )
        })
        .max_by_key(|range| {
            (
                range.channels() == channels,
                range.sample_format() == cpal::SampleFormat::F32,
            )
        })
        .map(|range| range.with_sample_rate(rate))
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<[f32]>,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let mut cursor = 0usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                // Silence once the file is exhausted
                let value = samples.get(cursor).copied().unwrap_or(0.0).to_sample::<T>();
                cursor = (cursor + 1).min(samples.len());
                frame.iter_mut().for_each(|s| *s = value);
            }
        },
        |err| log::warn!("{}", DeviceWarning::Stream(err)),
        None,
    )?;
    Ok(stream)
}
