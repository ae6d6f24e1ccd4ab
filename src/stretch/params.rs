use serde::{Deserialize, Serialize};

use crate::core::filter::{MAX_FILTER_LENGTH, MIN_FILTER_LENGTH};
use crate::core::resample::Interpolation;
use crate::error::StretchError;

/// Default anti-alias filter length in taps.
pub const DEFAULT_AA_FILTER_LENGTH: u32 = 64;
/// Default cross-fade overlap in milliseconds.
pub const DEFAULT_OVERLAP_MS: u32 = 8;

/// Tempo range over which automatic sequence/seek lengths are interpolated.
const AUTO_TEMPO_LOW: f64 = 0.5;
const AUTO_TEMPO_HIGH: f64 = 2.0;
/// Automatic sequence length at the low and high ends of the tempo range (ms).
const AUTO_SEQUENCE_AT_LOW: f64 = 90.0;
const AUTO_SEQUENCE_AT_HIGH: f64 = 40.0;
/// Automatic seek window length at the low and high ends of the tempo range (ms).
const AUTO_SEEK_AT_LOW: f64 = 20.0;
const AUTO_SEEK_AT_HIGH: f64 = 15.0;

const SEQUENCE_MS_RANGE: std::ops::RangeInclusive<u32> = 10..=500;
const SEEK_WINDOW_MS_RANGE: std::ops::RangeInclusive<u32> = 2..=100;
const OVERLAP_MS_RANGE: std::ops::RangeInclusive<u32> = 1..=50;

/// Integer-keyed processing settings.
///
/// The numeric ids are stable and match the setting table used by
/// applications that drive the processor through a flat id/value interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Setting {
    /// Anti-alias filter in the rate transposer on/off (0/1).
    UseAaFilter = 0,
    /// Anti-alias filter length in taps (8..=128, multiple of 4).
    AaFilterLength = 1,
    /// Quick seek on/off (0/1).
    UseQuickSeek = 2,
    /// WSOLA sequence length in ms, 0 = automatic.
    SequenceMs = 3,
    /// WSOLA seek window length in ms, 0 = automatic.
    SeekWindowMs = 4,
    /// WSOLA cross-fade overlap in ms.
    OverlapMs = 5,
    /// Read-only: input frames consumed per processing sequence.
    NominalInputSequence = 6,
    /// Read-only: output frames produced per processing sequence.
    NominalOutputSequence = 7,
    /// Read-only: frames to feed before the first output appears.
    InitialLatency = 8,
}

impl Setting {
    pub const ALL: [Setting; 9] = [
        Setting::UseAaFilter,
        Setting::AaFilterLength,
        Setting::UseQuickSeek,
        Setting::SequenceMs,
        Setting::SeekWindowMs,
        Setting::OverlapMs,
        Setting::NominalInputSequence,
        Setting::NominalOutputSequence,
        Setting::InitialLatency,
    ];

    /// Numeric id of this setting.
    #[inline]
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Looks up a setting by numeric id.
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.id() == id)
    }

    /// Read-only settings report derived values and reject writes.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Setting::NominalInputSequence | Setting::NominalOutputSequence | Setting::InitialLatency
        )
    }
}

impl TryFrom<i32> for Setting {
    type Error = StretchError;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        Setting::from_id(id).ok_or(StretchError::UnknownSetting(id))
    }
}

/// Tunable processing settings.
///
/// Serialises to JSON so tuning profiles can be stored next to an
/// application's other configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Low-pass the rate transposer's low-rate side.
    pub use_aa_filter: bool,
    /// Anti-alias filter length in taps.
    pub aa_filter_length: u32,
    /// Coarse-then-fine correlation search instead of exhaustive search.
    pub use_quick_seek: bool,
    /// Sequence length in ms, 0 = derive from tempo.
    pub sequence_ms: u32,
    /// Seek window length in ms, 0 = derive from tempo.
    pub seek_window_ms: u32,
    /// Cross-fade overlap in ms.
    pub overlap_ms: u32,
    /// Rate transposer interpolation kernel.
    pub interpolation: Interpolation,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_aa_filter: true,
            aa_filter_length: DEFAULT_AA_FILTER_LENGTH,
            use_quick_seek: false,
            sequence_ms: 0,
            seek_window_ms: 0,
            overlap_ms: DEFAULT_OVERLAP_MS,
            interpolation: Interpolation::default(),
        }
    }
}

impl Settings {
    /// Validate all fields.
    pub fn validate(&self) -> Result<(), StretchError> {
        let len = self.aa_filter_length as usize;
        if !(MIN_FILTER_LENGTH..=MAX_FILTER_LENGTH).contains(&len) || len % 4 != 0 {
            return Err(StretchError::invalid(format!(
                "anti-alias filter length must be a multiple of 4 in {}..={}, got {}",
                MIN_FILTER_LENGTH, MAX_FILTER_LENGTH, len
            )));
        }
        if self.sequence_ms != 0 && !SEQUENCE_MS_RANGE.contains(&self.sequence_ms) {
            return Err(StretchError::invalid(format!(
                "sequence length must be 0 (auto) or {:?} ms, got {}",
                SEQUENCE_MS_RANGE, self.sequence_ms
            )));
        }
        if self.seek_window_ms != 0 && !SEEK_WINDOW_MS_RANGE.contains(&self.seek_window_ms) {
            return Err(StretchError::invalid(format!(
                "seek window must be 0 (auto) or {:?} ms, got {}",
                SEEK_WINDOW_MS_RANGE, self.seek_window_ms
            )));
        }
        if !OVERLAP_MS_RANGE.contains(&self.overlap_ms) {
            return Err(StretchError::invalid(format!(
                "overlap must be in {:?} ms, got {}",
                OVERLAP_MS_RANGE, self.overlap_ms
            )));
        }
        Ok(())
    }

    /// Parses and validates settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, StretchError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialises the settings as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, StretchError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a tunable setting. Returns `None` for read-only (derived) keys.
    pub fn get(&self, setting: Setting) -> Option<i32> {
        let value = match setting {
            Setting::UseAaFilter => self.use_aa_filter as i32,
            Setting::AaFilterLength => self.aa_filter_length as i32,
            Setting::UseQuickSeek => self.use_quick_seek as i32,
            Setting::SequenceMs => self.sequence_ms as i32,
            Setting::SeekWindowMs => self.seek_window_ms as i32,
            Setting::OverlapMs => self.overlap_ms as i32,
            Setting::NominalInputSequence
            | Setting::NominalOutputSequence
            | Setting::InitialLatency => return None,
        };
        Some(value)
    }

    /// Writes a tunable setting after validating the new value.
    ///
    /// # Errors
    /// `InvalidParameter` for read-only keys and out-of-range values; the
    /// settings are left unchanged in that case.
    pub fn set(&mut self, setting: Setting, value: i32) -> Result<(), StretchError> {
        if setting.is_read_only() {
            return Err(StretchError::invalid(format!(
                "setting {:?} is read-only",
                setting
            )));
        }
        let flag = |v: i32| match v {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(StretchError::invalid(format!(
                "setting {:?} expects 0 or 1, got {}",
                setting, v
            ))),
        };
        let unsigned = |v: i32| {
            u32::try_from(v).map_err(|_| {
                StretchError::invalid(format!("setting {:?} must not be negative", setting))
            })
        };

        let mut next = self.clone();
        match setting {
            Setting::UseAaFilter => next.use_aa_filter = flag(value)?,
            Setting::AaFilterLength => next.aa_filter_length = unsigned(value)?,
            Setting::UseQuickSeek => next.use_quick_seek = flag(value)?,
            Setting::SequenceMs => next.sequence_ms = unsigned(value)?,
            Setting::SeekWindowMs => next.seek_window_ms = unsigned(value)?,
            Setting::OverlapMs => next.overlap_ms = unsigned(value)?,
            Setting::NominalInputSequence
            | Setting::NominalOutputSequence
            | Setting::InitialLatency => unreachable!("read-only settings rejected above"),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// WSOLA frame lengths derived from settings, tempo and sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceParams {
    /// Frames per processing sequence, including both cross-fade regions.
    pub sequence: usize,
    /// Width of the seek window in frames.
    pub seek: usize,
    /// Cross-fade length in frames.
    pub overlap: usize,
}

impl SequenceParams {
    /// Derives frame lengths for the given effective tempo.
    pub fn derive(settings: &Settings, tempo: f64, sample_rate: u32) -> Self {
        let sequence_ms = if settings.sequence_ms == 0 {
            auto_length(tempo, AUTO_SEQUENCE_AT_LOW, AUTO_SEQUENCE_AT_HIGH)
        } else {
            settings.sequence_ms as f64
        };
        let seek_ms = if settings.seek_window_ms == 0 {
            auto_length(tempo, AUTO_SEEK_AT_LOW, AUTO_SEEK_AT_HIGH)
        } else {
            settings.seek_window_ms as f64
        };

        let to_frames = |ms: f64| (ms * sample_rate as f64 / 1000.0).round() as usize;
        let overlap = to_frames(settings.overlap_ms as f64).max(1);
        let sequence = to_frames(sequence_ms).max(2 * overlap);
        let seek = to_frames(seek_ms).max(1);

        Self {
            sequence,
            seek,
            overlap,
        }
    }

    /// Output frames emitted per sequence.
    #[inline]
    pub fn output_per_sequence(&self) -> usize {
        self.sequence - self.overlap
    }
}

/// Linear interpolation of a length over the automatic tempo range, clamped.
fn auto_length(tempo: f64, at_low: f64, at_high: f64) -> f64 {
    let slope = (at_high - at_low) / (AUTO_TEMPO_HIGH - AUTO_TEMPO_LOW);
    let value = at_low + slope * (tempo - AUTO_TEMPO_LOW);
    value.clamp(at_high.min(at_low), at_high.max(at_low))
}
