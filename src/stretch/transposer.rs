//! Streaming rate transposer: resampling with an optional anti-alias filter.

use tracing::debug;

use crate::core::fifo::SampleFifo;
use crate::core::filter::AaFilter;
use crate::core::resample::Interpolator;
use crate::stretch::params::Settings;

/// Rates closer to 1.0 than this pass through untouched.
const BYPASS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Bypass,
    /// Interpolation only.
    Plain,
    /// Interpolate, then low-pass at the lower output band.
    Upsample,
    /// Low-pass at the lower output band, then interpolate.
    Downsample,
}

/// Changes playback rate (duration and pitch together) by resampling.
///
/// `rate` is the number of input frames consumed per output frame, so a
/// rate of 2.0 halves the duration and raises pitch by an octave. The
/// anti-alias filter always runs on the lower-rate side of the interpolator.
#[derive(Debug, Clone)]
pub struct RateTransposer {
    rate: f64,
    use_aa_filter: bool,
    mode: Mode,
    interpolator: Interpolator,
    filter: AaFilter,
    input: SampleFifo,
    mid: SampleFifo,
    output: SampleFifo,
}

impl RateTransposer {
    /// Creates a transposer at rate 1.0.
    pub fn new(channels: usize, settings: &Settings) -> Self {
        Self {
            rate: 1.0,
            use_aa_filter: settings.use_aa_filter,
            mode: Mode::Bypass,
            interpolator: Interpolator::new(settings.interpolation),
            filter: AaFilter::new(settings.aa_filter_length as usize, 0.5),
            input: SampleFifo::new(channels),
            mid: SampleFifo::new(channels),
            output: SampleFifo::new(channels),
        }
    }

    /// Returns the current rate.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Sets the rate used from the next processed block on.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        let cutoff = if rate > 1.0 { 0.5 / rate } else { 0.5 * rate };
        self.filter.set_cutoff(cutoff);
    }

    /// Applies filter and interpolation settings.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.use_aa_filter = settings.use_aa_filter;
        self.filter.set_length(settings.aa_filter_length as usize);
        self.interpolator.set_kind(settings.interpolation);
    }

    /// True when the rate is 1.0 and frames pass straight through.
    #[inline]
    pub fn is_bypassed(&self) -> bool {
        (self.rate - 1.0).abs() < BYPASS_EPSILON
    }

    /// Input FIFO; callers append frames here before calling [`RateTransposer::process`].
    #[inline]
    pub fn input_mut(&mut self) -> &mut SampleFifo {
        &mut self.input
    }

    /// Output FIFO holding transposed frames.
    #[inline]
    pub fn output_mut(&mut self) -> &mut SampleFifo {
        &mut self.output
    }

    /// Frames accepted but not yet represented in the output.
    pub fn pending(&self) -> usize {
        let (mid_skip, input_skip) = self.history_lengths();
        self.mid.len().saturating_sub(mid_skip) + self.input.len().saturating_sub(input_skip)
    }

    /// Removes every pending frame in stream order and resets the
    /// interpolation and filter state.
    pub fn take_pending(&mut self) -> Vec<f32> {
        let (mid_skip, input_skip) = self.history_lengths();
        self.mid.discard(mid_skip);
        self.input.discard(input_skip);

        let mut pending = self.mid.take_all();
        pending.extend(self.input.take_all());
        self.interpolator.reset();
        self.filter.reset();
        pending
    }

    /// Drops all buffered audio and interpolation state.
    pub fn reset(&mut self) {
        self.input.clear();
        self.mid.clear();
        self.output.clear();
        self.interpolator.reset();
        self.filter.reset();
    }

    /// Transposes as much buffered input as possible.
    ///
    /// Returns the number of frames appended to the output FIFO.
    pub fn process(&mut self) -> usize {
        let mode = self.current_mode();
        if mode != self.mode {
            debug!(from = ?self.mode, to = ?mode, rate = self.rate, "rate transposer mode change");
            let pending = self.take_pending();
            self.input.push(&pending);
            self.mode = mode;
        }

        let before = self.output.len();
        match mode {
            Mode::Bypass => self.output.append(&mut self.input),
            Mode::Plain => {
                self.interpolator
                    .transpose(self.rate, &mut self.input, &mut self.output);
            }
            Mode::Upsample => {
                self.interpolator
                    .transpose(self.rate, &mut self.input, &mut self.mid);
                self.filter.evaluate(&mut self.mid, &mut self.output);
            }
            Mode::Downsample => {
                self.filter.evaluate(&mut self.input, &mut self.mid);
                self.interpolator
                    .transpose(self.rate, &mut self.mid, &mut self.output);
            }
        }
        self.output.len() - before
    }

    fn current_mode(&self) -> Mode {
        if self.is_bypassed() {
            Mode::Bypass
        } else if !self.use_aa_filter {
            Mode::Plain
        } else if self.rate < 1.0 {
            Mode::Upsample
        } else {
            Mode::Downsample
        }
    }

    /// Frames at the head of `mid` and `input` that are history only.
    fn history_lengths(&self) -> (usize, usize) {
        match self.mode {
            Mode::Bypass => (0, 0),
            Mode::Plain => (0, self.interpolator.consumed_history()),
            Mode::Upsample => (
                self.filter.consumed_history(),
                self.interpolator.consumed_history(),
            ),
            Mode::Downsample => (
                self.interpolator.consumed_history(),
                self.filter.consumed_history(),
            ),
        }
    }
}
