//! Streaming WSOLA (Waveform Similarity Overlap-Add) time stretching.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::{debug, trace};

use crate::core::fft::{COMPLEX_ZERO, ENERGY_EPSILON};
use crate::core::fifo::SampleFifo;
use crate::stretch::params::{SequenceParams, Settings};

/// Minimum number of candidates to justify FFT-based correlation over direct computation.
const FFT_CANDIDATE_THRESHOLD: usize = 64;
/// Minimum overlap length for FFT-based correlation to be worthwhile.
const FFT_OVERLAP_THRESHOLD: usize = 32;
/// Coarse scan stride in frames for quick seek.
const QUICK_SEEK_STRIDE: usize = 8;
/// Offset added to the correlation before the centre weighting is applied.
const CENTRE_BIAS_OFFSET: f64 = 0.1;
/// Weight lost at the outer edge of the seek window.
const CENTRE_BIAS_DEPTH: f64 = 0.25;

/// Forward/inverse FFT pair planned for one correlation size.
struct CorrelationFft {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

/// Streaming WSOLA time stretcher over interleaved frames.
///
/// Input is consumed in sequences. Each sequence after the first is placed
/// at the offset within a seek window, centred on the nominal input
/// position, whose start best matches the tail of the previous sequence,
/// then cross-faded in linearly. The nominal position advances by
/// `tempo * (sequence - overlap)` frames per sequence.
pub struct Wsola {
    channels: usize,
    sample_rate: u32,
    tempo: f64,
    settings: Settings,
    params: SequenceParams,
    input: SampleFifo,
    output: SampleFifo,
    /// Tail of the previous sequence, waiting to be cross-faded.
    mid: Vec<f32>,
    /// Frames retained in `input` before the nominal read position.
    history: usize,
    skip_fract: f64,
    beginning: bool,
    fft: Option<CorrelationFft>,
}

impl Wsola {
    /// Creates a stretcher at tempo 1.0.
    pub fn new(channels: usize, sample_rate: u32, settings: &Settings) -> Self {
        let channels = channels.max(1);
        let params = SequenceParams::derive(settings, 1.0, sample_rate);
        Self {
            channels,
            sample_rate,
            tempo: 1.0,
            settings: settings.clone(),
            params,
            input: SampleFifo::new(channels),
            output: SampleFifo::new(channels),
            mid: vec![0.0; params.overlap * channels],
            history: 0,
            skip_fract: 0.0,
            beginning: true,
            fft: None,
        }
    }

    /// Returns the current tempo.
    #[inline]
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Returns the frame lengths currently in effect.
    #[inline]
    pub fn params(&self) -> SequenceParams {
        self.params
    }

    /// Sets the tempo used from the next sequence on.
    pub fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo;
        self.update_params();
    }

    /// Applies new settings from the next sequence on.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.settings = settings.clone();
        self.update_params();
    }

    fn update_params(&mut self) {
        let params = SequenceParams::derive(&self.settings, self.tempo, self.sample_rate);
        if params != self.params {
            debug!(
                tempo = self.tempo,
                sequence = params.sequence,
                seek = params.seek,
                overlap = params.overlap,
                "wsola parameters changed"
            );
            self.params = params;
        }
    }

    /// Input FIFO; callers append frames here before calling [`Wsola::process`].
    #[inline]
    pub fn input_mut(&mut self) -> &mut SampleFifo {
        &mut self.input
    }

    /// Output FIFO holding stretched frames.
    #[inline]
    pub fn output_mut(&mut self) -> &mut SampleFifo {
        &mut self.output
    }

    /// Input frames not yet passed by the nominal read position.
    #[inline]
    pub fn unprocessed(&self) -> usize {
        self.input.len().saturating_sub(self.history)
    }

    /// Nominal input frames consumed per sequence.
    #[inline]
    pub fn nominal_skip(&self) -> f64 {
        self.tempo * self.params.output_per_sequence() as f64
    }

    /// Frames that must be buffered before the next sequence can be emitted.
    pub fn input_requirement(&self) -> usize {
        let skip = (self.nominal_skip() + self.skip_fract).floor() as usize;
        let right = self.params.seek - self.params.seek / 2;
        self.history
            .saturating_add((right + self.params.sequence).max(skip))
    }

    /// Drops all buffered audio and correlation history.
    pub fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
        self.mid.clear();
        self.mid.resize(self.params.overlap * self.channels, 0.0);
        self.history = 0;
        self.skip_fract = 0.0;
        self.beginning = true;
    }

    /// Emits as many sequences as the buffered input allows.
    ///
    /// Returns the number of frames appended to the output FIFO.
    pub fn process(&mut self) -> usize {
        let mut produced = 0;

        loop {
            self.fit_mid();
            if self.input.len() < self.input_requirement() {
                break;
            }

            let p = self.params;
            let half = p.seek / 2;
            let left = self.history.min(half);
            let right = p.seek - half;
            let nominal = self.history;

            let offset = if self.beginning {
                self.beginning = false;
                self.emit_first(nominal);
                nominal
            } else {
                let best = self.seek_best_offset(nominal, left, right);
                self.emit_sequence(best);
                best
            };
            produced += p.output_per_sequence();
            trace!(offset, nominal, "wsola sequence");

            let skip_total = self.nominal_skip() + self.skip_fract;
            let skip = skip_total.floor() as usize;
            self.skip_fract = skip_total - skip as f64;

            let next_nominal = nominal.saturating_add(skip);
            let keep = half.min(next_nominal);
            self.input.discard(next_nominal - keep);
            self.history = keep;
        }

        produced
    }

    /// Resizes the cross-fade tail after an overlap change, keeping its latest frames.
    fn fit_mid(&mut self) {
        let want = self.params.overlap * self.channels;
        let have = self.mid.len();
        if have > want {
            self.mid.drain(..have - want);
        } else if have < want {
            let mut padded = vec![0.0; want - have];
            padded.extend_from_slice(&self.mid);
            self.mid = padded;
        }
    }

    /// First sequence of a stream: copied straight through, no cross-fade partner.
    fn emit_first(&mut self, pos: usize) {
        let ch = self.channels;
        let p = self.params;
        let data = self.input.as_slice();
        let body_end = (pos + p.sequence - p.overlap) * ch;
        self.output.push(&data[pos * ch..body_end]);
        self.mid.copy_from_slice(&data[body_end..body_end + p.overlap * ch]);
    }

    /// Cross-fades the stored tail into the sequence starting at `pos`.
    fn emit_sequence(&mut self, pos: usize) {
        let ch = self.channels;
        let p = self.params;
        let data = self.input.as_slice();
        let start = pos * ch;

        let mut out = Vec::with_capacity(p.output_per_sequence() * ch);
        for i in 0..p.overlap {
            let fade_in = i as f32 / p.overlap as f32;
            let fade_out = 1.0 - fade_in;
            for c in 0..ch {
                let idx = i * ch + c;
                out.push(self.mid[idx] * fade_out + data[start + idx] * fade_in);
            }
        }
        let body_end = (pos + p.sequence - p.overlap) * ch;
        out.extend_from_slice(&data[start + p.overlap * ch..body_end]);
        self.output.push(&out);
        self.mid.copy_from_slice(&data[body_end..body_end + p.overlap * ch]);
    }

    /// Finds the candidate start in `[nominal - left, nominal + right]` whose
    /// first `overlap` frames best match the stored tail.
    fn seek_best_offset(&mut self, nominal: usize, left: usize, right: usize) -> usize {
        let num_candidates = left + right + 1;
        let overlap = self.params.overlap;

        let best_delta = if self.settings.use_quick_seek {
            self.quick_seek(nominal, left, right)
        } else if num_candidates > FFT_CANDIDATE_THRESHOLD && overlap >= FFT_OVERLAP_THRESHOLD {
            self.full_seek_fft(nominal, left, right)
        } else {
            self.full_seek_direct(nominal, left, right)
        };
        (nominal as isize + best_delta) as usize
    }

    /// Weighted score of a candidate `delta` frames from the nominal position.
    #[inline]
    fn score(&self, nominal: usize, delta: isize) -> f64 {
        let ch = self.channels;
        let start = (nominal as isize + delta) as usize * ch;
        let len = self.params.overlap * ch;
        let candidate = &self.input.as_slice()[start..start + len];
        centre_weighted(
            normalized_cross_correlation(&self.mid, candidate),
            delta,
            self.params.seek / 2,
        )
    }

    /// Direct time-domain search over every candidate.
    fn full_seek_direct(&self, nominal: usize, left: usize, right: usize) -> isize {
        let mut best_delta = 0isize;
        let mut best_score = f64::NEG_INFINITY;
        for delta in -(left as isize)..=(right as isize) {
            let score = self.score(nominal, delta);
            if score > best_score {
                best_score = score;
                best_delta = delta;
            }
        }
        best_delta
    }

    /// Coarse scan on a stride that includes the nominal position, then a
    /// fine scan around the coarse winner.
    fn quick_seek(&self, nominal: usize, left: usize, right: usize) -> isize {
        let left = left as isize;
        let right = right as isize;
        let stride = QUICK_SEEK_STRIDE as isize;

        let mut best_delta = 0isize;
        let mut best_score = f64::NEG_INFINITY;
        let mut delta = -(left / stride) * stride;
        while delta <= right {
            let score = self.score(nominal, delta);
            if score > best_score {
                best_score = score;
                best_delta = delta;
            }
            delta += stride;
        }

        let coarse = best_delta;
        for delta in (coarse - stride + 1).max(-left)..=(coarse + stride - 1).min(right) {
            if delta == coarse {
                continue;
            }
            let score = self.score(nominal, delta);
            if score > best_score {
                best_score = score;
                best_delta = delta;
            }
        }
        best_delta
    }

    /// FFT-accelerated search over every candidate.
    ///
    /// Interleaved frames are correlated directly; lags that are multiples
    /// of the channel count sum the per-channel correlations.
    fn full_seek_fft(&mut self, nominal: usize, left: usize, right: usize) -> isize {
        let ch = self.channels;
        let overlap_len = self.params.overlap * ch;
        let half = self.params.seek / 2;
        let search_start = (nominal - left) * ch;
        let search_end = (nominal + right) * ch + overlap_len;

        let ref_energy: f64 = self.mid.iter().map(|&s| (s as f64) * (s as f64)).sum();
        if ref_energy < ENERGY_EPSILON {
            // Silent tail: every candidate scores the same before weighting
            return 0;
        }

        let search_signal = self.input.as_slice()[search_start..search_end].to_vec();
        let corr_buf = self.fft_cross_correlate(&search_signal);
        let norm = 1.0 / corr_buf.len() as f64;

        // Running energy of search windows via prefix sums
        let mut prefix_sq = vec![0.0f64; search_signal.len() + 1];
        for (i, &s) in search_signal.iter().enumerate() {
            prefix_sq[i + 1] = prefix_sq[i] + (s as f64) * (s as f64);
        }

        let mut best_delta = 0isize;
        let mut best_score = f64::NEG_INFINITY;
        for k in 0..=(left + right) {
            let lag = k * ch;
            let raw_corr = corr_buf[lag].re as f64 * norm;
            let window_energy = prefix_sq[lag + overlap_len] - prefix_sq[lag];
            let denom = (ref_energy * window_energy).sqrt();
            let ncorr = if denom > ENERGY_EPSILON {
                raw_corr / denom
            } else {
                0.0
            };

            let delta = k as isize - left as isize;
            let score = centre_weighted(ncorr, delta, half);
            if score > best_score {
                best_score = score;
                best_delta = delta;
            }
        }
        best_delta
    }

    /// Cross-correlates the stored tail against `search_signal` via FFT.
    ///
    /// Returns the unnormalised inverse transform; lag `k` lives at index `k`.
    fn fft_cross_correlate(&mut self, search_signal: &[f32]) -> Vec<Complex<f32>> {
        let conv_len = search_signal.len() + self.mid.len() - 1;
        let fft_size = conv_len.next_power_of_two();

        if self.fft.as_ref().map(|f| f.size) != Some(fft_size) {
            self.fft = None;
        }
        let fft = self.fft.get_or_insert_with(|| {
            let mut planner = FftPlanner::new();
            CorrelationFft {
                size: fft_size,
                forward: planner.plan_fft_forward(fft_size),
                inverse: planner.plan_fft_inverse(fft_size),
            }
        });

        // Zero-pad signals into FFT buffers
        let mut ref_buf = vec![COMPLEX_ZERO; fft_size];
        for (slot, &s) in ref_buf.iter_mut().zip(self.mid.iter()) {
            *slot = Complex::new(s, 0.0);
        }
        let mut search_buf = vec![COMPLEX_ZERO; fft_size];
        for (slot, &s) in search_buf.iter_mut().zip(search_signal.iter()) {
            *slot = Complex::new(s, 0.0);
        }

        // Forward FFT, multiply conj(Ref) * Search, inverse FFT
        fft.forward.process(&mut ref_buf);
        fft.forward.process(&mut search_buf);
        for (r, s) in ref_buf.iter_mut().zip(search_buf.iter()) {
            *r = r.conj() * s;
        }
        fft.inverse.process(&mut ref_buf);
        ref_buf
    }
}

/// Applies the parabolic preference for candidates near the nominal position.
#[inline]
fn centre_weighted(corr: f64, delta: isize, half: usize) -> f64 {
    let t = delta as f64 / half.max(1) as f64;
    (corr + CENTRE_BIAS_OFFSET) * (1.0 - CENTRE_BIAS_DEPTH * t * t)
}

/// Normalized cross-correlation between two signals.
#[inline]
fn normalized_cross_correlation(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }

    let mut sum_ab = 0.0f64;
    let mut sum_a2 = 0.0f64;
    let mut sum_b2 = 0.0f64;

    for i in 0..len {
        let va = a[i] as f64;
        let vb = b[i] as f64;
        sum_ab += va * vb;
        sum_a2 += va * va;
        sum_b2 += vb * vb;
    }

    let denom = (sum_a2 * sum_b2).sqrt();
    if denom < ENERGY_EPSILON {
        return 0.0;
    }

    sum_ab / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn run(wsola: &mut Wsola, input: &[f32], chunk: usize) -> Vec<f32> {
        let mut out = Vec::new();
        for part in input.chunks(chunk) {
            wsola.input_mut().push(part);
            wsola.process();
            out.extend(wsola.output_mut().take_all());
        }
        out
    }

    #[test]
    fn test_wsola_identity() {
        let input = sine(440.0, 44100, 44100);
        let mut wsola = Wsola::new(1, 44100, &Settings::default());
        let output = run(&mut wsola, &input, 1024);

        assert!(output.len() > 40000);
        for (i, (a, b)) in output.iter().zip(input.iter()).enumerate() {
            assert!((a - b).abs() < 1e-5, "frame {}: {} vs {}", i, a, b);
        }
    }

    #[test]
    fn test_wsola_identity_quick_seek() {
        let input = sine(330.0, 44100, 30000);
        let settings = Settings {
            use_quick_seek: true,
            ..Settings::default()
        };
        let mut wsola = Wsola::new(1, 44100, &settings);
        let output = run(&mut wsola, &input, 700);
        for (a, b) in output.iter().zip(input.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_wsola_length_ratio() {
        let input = sine(440.0, 44100, 44100 * 2);
        for &tempo in &[0.5, 0.8, 1.25, 2.0] {
            let mut wsola = Wsola::new(1, 44100, &Settings::default());
            wsola.set_tempo(tempo);
            let output = run(&mut wsola, &input, 4096);
            // Everything except the tail still buffered has been emitted
            let consumed = input.len() - wsola.unprocessed();
            let expected = consumed as f64 / tempo;
            let tolerance = wsola.params().sequence as f64;
            assert!(
                (output.len() as f64 - expected).abs() < tolerance,
                "tempo {}: {} frames, expected ~{}",
                tempo,
                output.len(),
                expected
            );
        }
    }

    #[test]
    fn test_stereo_channels_preserved() {
        let frames = 20000;
        let left = sine(440.0, 44100, frames);
        let right: Vec<f32> = left.iter().map(|s| -0.5 * s).collect();
        let interleaved: Vec<f32> = left.iter().zip(right.iter()).flat_map(|(&l, &r)| [l, r]).collect();

        let mut wsola = Wsola::new(2, 44100, &Settings::default());
        wsola.set_tempo(1.3);
        let output = run(&mut wsola, &interleaved, 2048);
        assert!(!output.is_empty());
        assert_eq!(output.len() % 2, 0);
        for frame in output.chunks(2) {
            assert!((frame[1] + 0.5 * frame[0]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_direct_and_fft_search_agree() {
        let input: Vec<f32> = sine(220.0, 44100, 8000)
            .iter()
            .zip(sine(1375.0, 44100, 8000))
            .map(|(a, b)| 0.6 * a + 0.3 * b)
            .collect();
        let mut wsola = Wsola::new(1, 44100, &Settings::default());
        wsola.set_tempo(1.1);
        wsola.input_mut().push(&input);
        // Tail taken 37 frames after the nominal position
        let overlap = wsola.params().overlap;
        wsola.mid.copy_from_slice(&input[1437..1437 + overlap]);

        let direct = wsola.full_seek_direct(1400, 300, 300);
        let fft = wsola.full_seek_fft(1400, 300, 300);
        assert_eq!(direct, 37);
        assert_eq!(fft, 37);
    }

    #[test]
    fn test_reset_restarts_stream() {
        let input = sine(440.0, 44100, 10000);
        let mut wsola = Wsola::new(1, 44100, &Settings::default());
        run(&mut wsola, &input, 10000);
        wsola.reset();
        assert_eq!(wsola.unprocessed(), 0);
        assert!(wsola.output_mut().is_empty());
        let again = run(&mut wsola, &input, 10000);
        assert!((again[0] - input[0]).abs() < 1e-6);
    }

    #[test]
    fn test_input_requirement_grows_with_tempo() {
        let mut wsola = Wsola::new(1, 44100, &Settings::default());
        let normal = wsola.input_requirement();
        wsola.set_tempo(20.0);
        assert!(wsola.input_requirement() > normal);
    }

    #[test]
    fn test_normalized_cross_correlation() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let c = normalized_cross_correlation(&a, &a);
        assert!((c - 1.0).abs() < 1e-6, "Self-correlation should be 1.0, got {}", c);

        let neg: Vec<f32> = a.iter().map(|x| -x).collect();
        let c_neg = normalized_cross_correlation(&a, &neg);
        assert!((c_neg + 1.0).abs() < 1e-6, "Negated correlation should be -1.0, got {}", c_neg);

        assert_eq!(normalized_cross_correlation(&[0.0; 4], &a), 0.0);
    }

    #[test]
    fn test_centre_weighting_prefers_nominal() {
        assert!(centre_weighted(1.0, 0, 100) > centre_weighted(1.0, 1, 100));
        assert!(centre_weighted(0.0, 0, 100) > centre_weighted(0.0, -100, 100));
    }
}
