#![forbid(unsafe_code)]
//! Real-time audio tempo, rate and pitch processing.
//!
//! `tempopitch` changes the tempo of audio without altering its pitch, the
//! pitch without altering its tempo, or both together, using a streaming
//! WSOLA time stretcher and a resampling rate transposer. Audio is pushed in
//! and pulled out in arbitrary chunk sizes, so the engine can sit between a
//! decoder and an audio device.
//!
//! # Streaming
//!
//! ```
//! use tempopitch::StreamProcessor;
//!
//! let mut proc = StreamProcessor::new();
//! proc.set_channels(2).unwrap();
//! proc.set_sample_rate(44100).unwrap();
//! proc.set_pitch_semitones(3.0).unwrap();
//!
//! let chunk = vec![0.0f32; 2 * 1024];
//! let mut out = vec![0.0f32; 2 * 1024];
//! for _ in 0..8 {
//!     proc.put_samples(&chunk).unwrap();
//!     while proc.num_samples() > 0 {
//!         let frames = proc.receive_samples(&mut out);
//!         assert!(frames > 0);
//!         // hand out[..frames * 2] to the audio device
//!     }
//! }
//! proc.flush().unwrap();
//! ```
//!
//! # One-shot
//!
//! ```
//! use tempopitch::StreamConfig;
//!
//! // 1 second of 440 Hz sine at 44.1 kHz
//! let input: Vec<f32> = (0..44100)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!     .collect();
//!
//! let config = StreamConfig::new(1, 44100).unwrap();
//! let output = tempopitch::stretch(&input, config, 0.5).unwrap();
//! assert_eq!(output.len(), 88200); // half speed, twice as long
//! ```

pub mod core;
pub mod error;
#[cfg(feature = "wav")]
pub mod io;
pub mod stream;
pub mod stretch;

pub use core::resample::Interpolation;
pub use core::types::{Sample, StreamConfig};
pub use error::StretchError;
pub use stream::{ControlState, StreamProcessor};
pub use stretch::params::{Setting, Settings};

/// Library version as a string, e.g. `"0.3.0"`.
pub fn version_string() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Library version as a single integer, `major * 10000 + minor * 100 + patch`.
pub fn version_id() -> u32 {
    let parse = |s: &str| s.parse::<u32>().unwrap_or(0);
    parse(env!("CARGO_PKG_VERSION_MAJOR")) * 10000
        + parse(env!("CARGO_PKG_VERSION_MINOR")) * 100
        + parse(env!("CARGO_PKG_VERSION_PATCH"))
}

/// Runs a whole buffer through a configured processor and flushes it.
fn process_offline(
    input: &[f32],
    config: StreamConfig,
    configure: impl FnOnce(&mut StreamProcessor) -> Result<(), StretchError>,
) -> Result<Vec<f32>, StretchError> {
    let mut proc = StreamProcessor::new();
    proc.set_channels(config.channels)?;
    proc.set_sample_rate(config.sample_rate)?;
    configure(&mut proc)?;

    proc.put_samples(input)?;
    proc.flush()?;

    let mut output = vec![0.0f32; proc.num_samples() * config.channel_count()];
    let frames = proc.receive_samples(&mut output);
    output.truncate(frames * config.channel_count());
    Ok(output)
}

/// Changes the tempo of interleaved audio without changing its pitch.
///
/// A `tempo` of 2.0 plays twice as fast, so the output has half as many frames.
///
/// # Errors
///
/// Returns [`StretchError::InvalidParameter`] if `tempo` is not positive and
/// finite, or if `input` does not hold whole frames.
pub fn stretch(input: &[f32], config: StreamConfig, tempo: f64) -> Result<Vec<f32>, StretchError> {
    process_offline(input, config, |proc| proc.set_tempo(tempo))
}

/// Shifts the pitch of interleaved audio by `semitones` without changing its duration.
///
/// # Errors
///
/// Returns [`StretchError::InvalidParameter`] if the shift is not finite, or
/// if `input` does not hold whole frames.
///
/// # Example
///
/// ```
/// use tempopitch::StreamConfig;
///
/// let input = vec![0.0f32; 2 * 22050];
/// let config = StreamConfig::new(2, 44100).unwrap();
/// let output = tempopitch::pitch_shift(&input, config, -5.0).unwrap();
/// assert_eq!(output.len(), input.len());
/// ```
pub fn pitch_shift(
    input: &[f32],
    config: StreamConfig,
    semitones: f64,
) -> Result<Vec<f32>, StretchError> {
    process_offline(input, config, |proc| proc.set_pitch_semitones(semitones))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Processing usually runs on a dedicated audio thread.
    const _: () = {
        fn assert_send_sync<T: Send + Sync>() {}
        fn check() {
            assert_send_sync::<StreamProcessor>();
            assert_send_sync::<Settings>();
            assert_send_sync::<StretchError>();
        }
        let _ = check;
    };

    #[test]
    fn test_version() {
        assert_eq!(version_string(), env!("CARGO_PKG_VERSION"));
        assert_eq!(version_id(), 300);
    }

    #[test]
    fn test_stretch_empty() {
        let config = StreamConfig::new(1, 44100).unwrap();
        assert!(stretch(&[], config, 1.5).unwrap().is_empty());
    }

    #[test]
    fn test_stretch_rejects_bad_tempo() {
        let config = StreamConfig::new(1, 44100).unwrap();
        assert!(matches!(
            stretch(&[0.0; 100], config, 0.0),
            Err(StretchError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_stretch_length() {
        let config = StreamConfig::new(2, 48000).unwrap();
        let input: Vec<f32> = (0..2 * 48000).map(|i| ((i / 2) as f32 * 0.01).sin()).collect();
        let output = stretch(&input, config, 1.5).unwrap();
        assert_eq!(output.len(), 2 * 32000);
    }
}
