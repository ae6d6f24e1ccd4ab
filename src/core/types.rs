use crate::error::StretchError;

/// A single audio sample (32-bit float, range -1.0 to 1.0).
pub type Sample = f32;

/// Full-scale divisor between 16-bit integer and normalised float samples.
const I16_SCALE: f32 = 32768.0;

/// Converts a 16-bit integer sample to a normalised float.
#[inline]
pub fn i16_to_sample(value: i16) -> Sample {
    value as f32 / I16_SCALE
}

/// Converts a normalised float sample to 16-bit, rounding and clamping at full scale.
#[inline]
pub fn sample_to_i16(value: Sample) -> i16 {
    let scaled = (value * I16_SCALE).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Channel count and sample rate of a stream.
///
/// Once samples have been pushed through a processor the configuration is
/// fixed until the processor is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Number of interleaved channels (at least 1).
    pub channels: u16,
    /// Sample rate in Hz (non-zero).
    pub sample_rate: u32,
}

impl StreamConfig {
    /// Creates a validated stream configuration.
    ///
    /// # Errors
    /// Returns `StretchError::InvalidParameter` if either value is zero.
    pub fn new(channels: u16, sample_rate: u32) -> Result<Self, StretchError> {
        if channels == 0 {
            return Err(StretchError::invalid("channel count must be at least 1"));
        }
        if sample_rate == 0 {
            return Err(StretchError::invalid("sample rate must be greater than 0"));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Number of channels as a `usize`, for indexing interleaved data.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels as usize
    }
}
