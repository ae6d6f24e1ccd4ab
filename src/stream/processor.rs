use tracing::{debug, trace, warn};

use crate::core::fifo::SampleFifo;
use crate::core::types::{i16_to_sample, sample_to_i16, StreamConfig};
use crate::error::StretchError;
use crate::stream::control::ControlState;
use crate::stretch::params::{Setting, Settings};
use crate::stretch::transposer::RateTransposer;
use crate::stretch::wsola::Wsola;

/// Smallest block of silence fed per flush round.
const MIN_FLUSH_CHUNK_FRAMES: usize = 1024;
/// Upper bound on flush rounds before giving up on the expected length.
const MAX_FLUSH_ROUNDS: usize = 32;

/// Streaming tempo, rate and pitch processor.
///
/// Interleaved frames are pushed with [`put_samples`](Self::put_samples) and
/// processed synchronously through a WSOLA stretcher and a rate transposer.
/// Finished frames wait in an output FIFO until pulled with
/// [`receive_samples`](Self::receive_samples). Ratio and settings changes
/// apply from the next processed block; frames already in the output are
/// never rewritten.
///
/// ```
/// use tempopitch::StreamProcessor;
///
/// let mut proc = StreamProcessor::new();
/// proc.set_channels(1).unwrap();
/// proc.set_sample_rate(44100).unwrap();
/// proc.set_tempo(1.25).unwrap();
///
/// proc.put_samples(&vec![0.0; 4096]).unwrap();
/// proc.flush().unwrap();
///
/// let mut out = vec![0.0; 8192];
/// let frames = proc.receive_samples(&mut out);
/// assert_eq!(frames, 3277);
/// ```
pub struct StreamProcessor {
    channels: u16,
    sample_rate: u32,
    control: ControlState,
    settings: Settings,
    stretcher: Wsola,
    transposer: RateTransposer,
    output: SampleFifo,
    /// Stretcher feeds the transposer (effective rate <= 1) rather than the reverse.
    stretch_first: bool,
    /// Samples were pushed since the last clear.
    fed: bool,
    /// Output length owed for everything pushed since the last flush or clear.
    expected_output: f64,
    /// Frames added to the output since the last flush or clear.
    produced: usize,
    /// Reused for i16 conversion and flush padding.
    scratch: Vec<f32>,
}

impl Default for StreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamProcessor {
    /// Creates an unconfigured processor with all ratios at 1.0.
    ///
    /// Channel count and sample rate must be set before samples are pushed.
    pub fn new() -> Self {
        let settings = Settings::default();
        Self {
            channels: 0,
            sample_rate: 0,
            control: ControlState::default(),
            stretcher: Wsola::new(1, 44100, &settings),
            transposer: RateTransposer::new(1, &settings),
            output: SampleFifo::new(1),
            settings,
            stretch_first: true,
            fed: false,
            expected_output: 0.0,
            produced: 0,
            scratch: Vec::new(),
        }
    }

    // --- stream configuration ---

    /// Sets the number of interleaved channels.
    ///
    /// Fails with `InvalidParameter` for zero, or for a different value once
    /// samples have been pushed without an intervening [`clear`](Self::clear).
    pub fn set_channels(&mut self, channels: u16) -> Result<(), StretchError> {
        if channels == 0 {
            return Err(StretchError::invalid("channel count must be at least 1"));
        }
        if channels == self.channels {
            return Ok(());
        }
        if self.fed {
            return Err(StretchError::invalid(
                "channel count cannot change while samples are buffered",
            ));
        }
        self.channels = channels;
        self.rebuild_stages();
        Ok(())
    }

    /// Sets the sample rate in Hz. Same restrictions as [`set_channels`](Self::set_channels).
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), StretchError> {
        if sample_rate == 0 {
            return Err(StretchError::invalid("sample rate must be positive"));
        }
        if sample_rate == self.sample_rate {
            return Ok(());
        }
        if self.fed {
            return Err(StretchError::invalid(
                "sample rate cannot change while samples are buffered",
            ));
        }
        self.sample_rate = sample_rate;
        self.rebuild_stages();
        Ok(())
    }

    /// Channel count, 0 while unset.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample rate in Hz, 0 while unset.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn config(&self) -> Result<StreamConfig, StretchError> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(StretchError::NotConfigured);
        }
        StreamConfig::new(self.channels, self.sample_rate)
    }

    fn rebuild_stages(&mut self) {
        let channels = self.channels.max(1) as usize;
        let sample_rate = if self.sample_rate == 0 {
            44100
        } else {
            self.sample_rate
        };
        debug!(channels, sample_rate, "configuring stream processor");

        self.stretcher = Wsola::new(channels, sample_rate, &self.settings);
        self.transposer = RateTransposer::new(channels, &self.settings);
        self.output.set_channels(channels);
        self.apply_ratios();
    }

    // --- ratios ---

    /// Sets the tempo ratio; 1.0 is the original speed.
    pub fn set_tempo(&mut self, tempo: f64) -> Result<(), StretchError> {
        self.control.set_tempo(tempo)?;
        self.apply_ratios();
        Ok(())
    }

    /// Sets tempo as a percentage change (-50.0 to +100.0 is the usual range).
    pub fn set_tempo_change_percent(&mut self, percent: f64) -> Result<(), StretchError> {
        self.control.set_tempo_change_percent(percent)?;
        self.apply_ratios();
        Ok(())
    }

    /// Sets the playback rate, changing tempo and pitch together.
    pub fn set_rate(&mut self, rate: f64) -> Result<(), StretchError> {
        self.control.set_rate(rate)?;
        self.apply_ratios();
        Ok(())
    }

    /// Sets the playback rate as a percentage change.
    pub fn set_rate_change_percent(&mut self, percent: f64) -> Result<(), StretchError> {
        self.control.set_rate_change_percent(percent)?;
        self.apply_ratios();
        Ok(())
    }

    /// Sets the pitch ratio while keeping the tempo.
    pub fn set_pitch(&mut self, pitch: f64) -> Result<(), StretchError> {
        self.control.set_pitch(pitch)?;
        self.apply_ratios();
        Ok(())
    }

    /// Sets the pitch change in octaves.
    pub fn set_pitch_octaves(&mut self, octaves: f64) -> Result<(), StretchError> {
        self.control.set_pitch_octaves(octaves)?;
        self.apply_ratios();
        Ok(())
    }

    /// Sets the pitch change in semitones.
    pub fn set_pitch_semitones(&mut self, semitones: f64) -> Result<(), StretchError> {
        self.control.set_pitch_semitones(semitones)?;
        self.apply_ratios();
        Ok(())
    }

    /// Tempo ratio as set.
    pub fn tempo(&self) -> f64 {
        self.control.tempo()
    }

    /// Tempo as a percentage change.
    pub fn tempo_change_percent(&self) -> f64 {
        self.control.tempo_change_percent()
    }

    /// Playback rate ratio as set.
    pub fn rate(&self) -> f64 {
        self.control.rate()
    }

    /// Playback rate as a percentage change.
    pub fn rate_change_percent(&self) -> f64 {
        self.control.rate_change_percent()
    }

    /// Pitch ratio as set.
    pub fn pitch(&self) -> f64 {
        self.control.pitch()
    }

    /// Pitch change in octaves.
    pub fn pitch_octaves(&self) -> f64 {
        self.control.pitch_octaves()
    }

    /// Pitch change in semitones.
    pub fn pitch_semitones(&self) -> f64 {
        self.control.pitch_semitones()
    }

    /// Current ratios and their derived views.
    pub fn control(&self) -> &ControlState {
        &self.control
    }

    fn apply_ratios(&mut self) {
        let tempo = self.control.effective_tempo();
        let rate = self.control.effective_rate();
        debug!(tempo, rate, "effective ratios updated");
        self.stretcher.set_tempo(tempo);
        self.transposer.set_rate(rate);
    }

    // --- settings ---

    /// Current tuning settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces all tuning settings after validating them.
    pub fn apply_settings(&mut self, settings: Settings) -> Result<(), StretchError> {
        settings.validate()?;
        self.settings = settings;
        self.push_settings();
        Ok(())
    }

    /// Changes one setting, reporting why a value was rejected.
    pub fn set(&mut self, setting: Setting, value: i32) -> Result<(), StretchError> {
        self.settings.set(setting, value)?;
        self.push_settings();
        Ok(())
    }

    /// Changes one setting by numeric id.
    ///
    /// Returns `false` for unknown ids, read-only keys and out-of-range values.
    pub fn set_setting(&mut self, id: i32, value: i32) -> bool {
        match Setting::try_from(id).and_then(|setting| self.set(setting, value)) {
            Ok(()) => true,
            Err(err) => {
                debug!(id, value, %err, "setting rejected");
                false
            }
        }
    }

    /// Reads one setting by numeric id. Read-only keys report values derived
    /// from the current ratios and sample rate.
    pub fn get_setting(&self, id: i32) -> Result<i32, StretchError> {
        let setting = Setting::try_from(id)?;
        if let Some(value) = self.settings.get(setting) {
            return Ok(value);
        }
        let value = match setting {
            Setting::NominalInputSequence => self.nominal_input_sequence(),
            Setting::NominalOutputSequence => self.nominal_output_sequence(),
            _ => self.initial_latency(),
        };
        Ok(value.min(i32::MAX as usize) as i32)
    }

    fn push_settings(&mut self) {
        debug!(settings = ?self.settings, "settings applied");
        self.stretcher.apply_settings(&self.settings);
        self.transposer.apply_settings(&self.settings);
    }

    /// Input frames consumed per stretcher sequence, measured at the engine input.
    fn nominal_input_sequence(&self) -> usize {
        let skip = self.stretcher.nominal_skip();
        let rate = self.control.effective_rate();
        let frames = if rate > 1.0 { skip * rate } else { skip };
        frames.round() as usize
    }

    /// Output frames per stretcher sequence, measured at the engine output.
    fn nominal_output_sequence(&self) -> usize {
        let out = self.stretcher.params().output_per_sequence() as f64;
        let rate = self.control.effective_rate();
        let frames = if rate > 1.0 { out } else { out / rate };
        frames.round() as usize
    }

    /// Input frames buffered before the first output frame appears.
    fn initial_latency(&self) -> usize {
        let p = self.stretcher.params();
        let stretch = (p.sequence + p.seek - p.seek / 2) as f64;
        let rate = self.control.effective_rate();
        let mut frames = if rate > 1.0 { stretch * rate } else { stretch };
        if self.settings.use_aa_filter && (rate - 1.0).abs() > f64::EPSILON {
            frames += self.settings.aa_filter_length as f64;
        }
        frames.round() as usize
    }

    // --- input ---

    /// Pushes interleaved float frames and processes them.
    pub fn put_samples(&mut self, samples: &[f32]) -> Result<(), StretchError> {
        let channels = self.config()?.channel_count();
        if samples.len() % channels != 0 {
            return Err(StretchError::invalid(format!(
                "sample count {} is not a multiple of {} channels",
                samples.len(),
                channels
            )));
        }
        let frames = samples.len() / channels;
        if frames == 0 {
            return Ok(());
        }

        self.fed = true;
        self.expected_output += frames as f64 * self.control.duration_factor();
        self.feed(samples);
        Ok(())
    }

    /// Pushes interleaved 16-bit frames and processes them.
    pub fn put_samples_i16(&mut self, samples: &[i16]) -> Result<(), StretchError> {
        let mut converted = std::mem::take(&mut self.scratch);
        converted.clear();
        converted.extend(samples.iter().map(|&s| i16_to_sample(s)));
        let result = self.put_samples(&converted);
        self.scratch = converted;
        result
    }

    /// Pushes `input`, then drains every finished frame.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, StretchError> {
        self.put_samples(input)?;
        Ok(self.output.take_all())
    }

    fn feed(&mut self, samples: &[f32]) {
        self.update_route();

        let before = self.output.len();
        if self.stretch_first {
            self.stretcher.input_mut().push(samples);
            self.stretcher.process();
            self.transposer
                .input_mut()
                .append(self.stretcher.output_mut());
            self.transposer.process();
            self.output.append(self.transposer.output_mut());
        } else {
            self.transposer.input_mut().push(samples);
            self.transposer.process();
            self.stretcher
                .input_mut()
                .append(self.transposer.output_mut());
            self.stretcher.process();
            self.output.append(self.stretcher.output_mut());
        }
        let added = self.output.len() - before;
        self.produced += added;
        trace!(
            input = samples.len() / self.output.channels(),
            output = added,
            buffered = self.output.len(),
            "processed block"
        );
    }

    /// Switches stage order when the effective rate crosses 1.0, keeping
    /// frames held inside the transposer in stream order.
    fn update_route(&mut self) {
        let stretch_first = self.control.effective_rate() <= 1.0;
        if stretch_first == self.stretch_first {
            return;
        }
        let pending = self.transposer.take_pending();
        let frames = pending.len() / self.output.channels();
        if stretch_first {
            // Raw input waiting in the transposer precedes anything pushed next
            self.stretcher.input_mut().push(&pending);
        } else {
            // Already stretched, only the resampling is skipped
            self.output.push(&pending);
            self.produced += frames;
        }
        debug!(stretch_first, rerouted = frames, "stage order changed");
        self.stretch_first = stretch_first;
    }

    // --- output ---

    /// Frames ready to be received.
    pub fn num_samples(&self) -> usize {
        self.output.len()
    }

    /// Pushed frames that have not produced output yet, in input frames.
    ///
    /// Frames held between the two stages are scaled back by the ratio of
    /// the stage that produced them, so the count is exact for tempo-only
    /// processing and approximate within the resampling kernel otherwise.
    pub fn num_unprocessed_samples(&self) -> usize {
        let stretcher = self.stretcher.unprocessed() as f64;
        let transposer = self.transposer.pending() as f64;
        let frames = if self.stretch_first {
            stretcher + transposer * self.control.effective_tempo()
        } else {
            transposer + stretcher * self.control.effective_rate()
        };
        frames.round() as usize
    }

    /// True when no output frames are waiting.
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Moves up to `out.len() / channels` frames into `out`; returns the frame count.
    pub fn receive_samples(&mut self, out: &mut [f32]) -> usize {
        self.output.pop_into(out)
    }

    /// 16-bit variant of [`receive_samples`](Self::receive_samples), clamping at full scale.
    pub fn receive_samples_i16(&mut self, out: &mut [i16]) -> usize {
        let channels = self.output.channels();
        let frames = (out.len() / channels).min(self.output.len());
        let buffered = &self.output.as_slice()[..frames * channels];
        for (dst, &src) in out.iter_mut().zip(buffered) {
            *dst = sample_to_i16(src);
        }
        self.output.discard(frames)
    }

    /// Discards up to `max_frames` output frames; returns how many were dropped.
    pub fn skip_samples(&mut self, max_frames: usize) -> usize {
        self.output.discard(max_frames)
    }

    // --- lifecycle ---

    /// Pushes silence until everything pushed so far is represented in the
    /// output at the expected length, then resets the processing stages.
    ///
    /// Output already produced is kept.
    pub fn flush(&mut self) -> Result<(), StretchError> {
        let channels = self.config()?.channel_count();
        let target = self.expected_output.round() as usize;
        let chunk = self
            .initial_latency()
            .max(self.nominal_input_sequence())
            .max(MIN_FLUSH_CHUNK_FRAMES);
        let mut silence = std::mem::take(&mut self.scratch);
        silence.clear();
        silence.resize(chunk * channels, 0.0);

        let mut rounds = 0;
        while self.produced < target && rounds < MAX_FLUSH_ROUNDS {
            self.feed(&silence);
            rounds += 1;
        }
        self.scratch = silence;

        if self.produced < target {
            warn!(
                produced = self.produced,
                expected = target,
                "flush could not reach the expected output length"
            );
        } else {
            let removed = self.output.truncate_back(self.produced - target);
            trace!(rounds, removed, "flush trimmed padding");
        }
        debug!(output = self.output.len(), "flushed");

        self.stretcher.reset();
        self.transposer.reset();
        self.expected_output = 0.0;
        self.produced = 0;
        Ok(())
    }

    /// Drops all buffered audio. Configuration, ratios and settings are kept.
    pub fn clear(&mut self) {
        self.stretcher.reset();
        self.transposer.reset();
        self.output.clear();
        self.fed = false;
        self.expected_output = 0.0;
        self.produced = 0;
        debug!("cleared");
    }
}

impl Drop for StreamProcessor {
    fn drop(&mut self) {
        trace!(
            discarded = self.output.len() + self.num_unprocessed_samples(),
            "stream processor dropped"
        );
    }
}
