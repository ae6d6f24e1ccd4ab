//! WAV file reading and writing for the command-line front end.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

use crate::core::types::{sample_to_i16, StreamConfig};
use crate::error::StretchError;

/// Errors from WAV file I/O.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV I/O: {0}")]
    Hound(#[from] hound::Error),
    #[error("unsupported WAV format: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Stream(#[from] StretchError),
}

/// Sample encoding used when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// 16-bit signed PCM.
    #[default]
    Pcm16,
    /// 32-bit IEEE float.
    Float32,
}

/// Decoded interleaved audio with its stream layout.
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    pub samples: Vec<f32>,
    pub config: StreamConfig,
}

impl WavAudio {
    /// Number of frames.
    pub fn num_frames(&self) -> usize {
        self.samples.len() / self.config.channel_count()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.num_frames() as f64 / self.config.sample_rate as f64
    }
}

/// Reads a WAV file, normalising integer PCM of 8 to 32 bits and 32-bit float to [-1, 1].
pub fn read_wav_file(path: impl AsRef<Path>) -> Result<WavAudio, WavError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let config = StreamConfig::new(spec.channels, spec.sample_rate)?;

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 8..=32) => {
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(WavError::Unsupported(format!(
                "{:?} with {} bits per sample",
                format, bits
            )))
        }
    };

    Ok(WavAudio { samples, config })
}

/// Writes interleaved audio to a WAV file in the requested format.
pub fn write_wav_file(
    path: impl AsRef<Path>,
    audio: &WavAudio,
    format: OutputFormat,
) -> Result<(), WavError> {
    let (bits_per_sample, sample_format) = match format {
        OutputFormat::Pcm16 => (16, SampleFormat::Int),
        OutputFormat::Float32 => (32, SampleFormat::Float),
    };
    let spec = WavSpec {
        channels: audio.config.channels,
        sample_rate: audio.config.sample_rate,
        bits_per_sample,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec)?;
    match format {
        OutputFormat::Pcm16 => {
            for &s in &audio.samples {
                writer.write_sample(sample_to_i16(s))?;
            }
        }
        OutputFormat::Float32 => {
            for &s in &audio.samples {
                writer.write_sample(s)?;
            }
        }
    }
    writer.finalize()?;
    Ok(())
}
