//! Tempo, rate and pitch ratios and the views derived from them.

use crate::error::StretchError;

/// Smallest tempo or rate handed to a processing stage.
pub const MIN_EFFECTIVE_RATIO: f64 = 0.01;
/// Largest tempo or rate handed to a processing stage.
pub const MAX_EFFECTIVE_RATIO: f64 = 100.0;

/// The three independent playback ratios.
///
/// Tempo changes duration only, rate changes duration and pitch together,
/// pitch changes pitch only. Internally pitch is realised by stretching with
/// `tempo / pitch` and resampling with `rate * pitch`. Any positive finite
/// ratio is accepted, but the effective stage ratios are clamped to
/// [`MIN_EFFECTIVE_RATIO`]..=[`MAX_EFFECTIVE_RATIO`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    tempo: f64,
    rate: f64,
    pitch: f64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            tempo: 1.0,
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

fn check_ratio(name: &str, value: f64) -> Result<f64, StretchError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(StretchError::invalid(format!(
            "{} must be positive and finite, got {}",
            name, value
        )))
    }
}

fn percent_to_ratio(percent: f64) -> f64 {
    1.0 + 0.01 * percent
}

fn ratio_to_percent(ratio: f64) -> f64 {
    (ratio - 1.0) * 100.0
}

impl ControlState {
    /// Tempo ratio as set, 1.0 is the original speed.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Playback rate ratio as set.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Pitch ratio as set.
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Sets the tempo ratio. Fails unless positive and finite.
    pub fn set_tempo(&mut self, tempo: f64) -> Result<(), StretchError> {
        self.tempo = check_ratio("tempo", tempo)?;
        Ok(())
    }

    /// Sets tempo as a percentage change, e.g. `25.0` plays 1.25x as fast.
    pub fn set_tempo_change_percent(&mut self, percent: f64) -> Result<(), StretchError> {
        self.tempo = check_ratio("tempo", percent_to_ratio(percent))?;
        Ok(())
    }

    /// Sets the playback rate ratio. Fails unless positive and finite.
    pub fn set_rate(&mut self, rate: f64) -> Result<(), StretchError> {
        self.rate = check_ratio("rate", rate)?;
        Ok(())
    }

    /// Sets rate as a percentage change.
    pub fn set_rate_change_percent(&mut self, percent: f64) -> Result<(), StretchError> {
        self.rate = check_ratio("rate", percent_to_ratio(percent))?;
        Ok(())
    }

    /// Sets the pitch ratio. Fails unless positive and finite.
    pub fn set_pitch(&mut self, pitch: f64) -> Result<(), StretchError> {
        self.pitch = check_ratio("pitch", pitch)?;
        Ok(())
    }

    /// Sets pitch in octaves relative to the original, `1.0` doubles the frequency.
    pub fn set_pitch_octaves(&mut self, octaves: f64) -> Result<(), StretchError> {
        self.pitch = check_ratio("pitch", octaves.exp2())?;
        Ok(())
    }

    /// Sets pitch in semitones relative to the original.
    pub fn set_pitch_semitones(&mut self, semitones: f64) -> Result<(), StretchError> {
        self.set_pitch_octaves(semitones / 12.0)
    }

    /// Tempo as a percentage change from the original.
    pub fn tempo_change_percent(&self) -> f64 {
        ratio_to_percent(self.tempo)
    }

    /// Rate as a percentage change from the original.
    pub fn rate_change_percent(&self) -> f64 {
        ratio_to_percent(self.rate)
    }

    /// Pitch change in octaves.
    pub fn pitch_octaves(&self) -> f64 {
        self.pitch.log2()
    }

    /// Pitch change in semitones.
    pub fn pitch_semitones(&self) -> f64 {
        12.0 * self.pitch.log2()
    }

    /// Tempo handed to the WSOLA stretcher.
    #[inline]
    pub fn effective_tempo(&self) -> f64 {
        clamp_ratio(self.tempo / self.pitch)
    }

    /// Rate handed to the rate transposer.
    #[inline]
    pub fn effective_rate(&self) -> f64 {
        clamp_ratio(self.rate * self.pitch)
    }

    /// Output frames expected per input frame.
    pub fn duration_factor(&self) -> f64 {
        let tempo = self.effective_tempo();
        let rate = self.effective_rate();
        if tempo == self.tempo / self.pitch && rate == self.rate * self.pitch {
            1.0 / (self.tempo * self.rate)
        } else {
            1.0 / (tempo * rate)
        }
    }
}

#[inline]
fn clamp_ratio(ratio: f64) -> f64 {
    ratio.clamp(MIN_EFFECTIVE_RATIO, MAX_EFFECTIVE_RATIO)
}
