//! Anti-alias FIR low-pass filter for the rate transposer.

use crate::core::fifo::SampleFifo;
use crate::core::window::{hamming, sinc};

/// Shortest supported filter kernel.
pub const MIN_FILTER_LENGTH: usize = 8;
/// Longest supported filter kernel.
pub const MAX_FILTER_LENGTH: usize = 128;

/// Streaming windowed-sinc low-pass filter over interleaved frames.
///
/// The filter consumes from a source FIFO and always leaves `length - 1`
/// frames behind as history for the next call.
#[derive(Debug, Clone)]
pub struct AaFilter {
    length: usize,
    cutoff: f64,
    coeffs: Vec<f32>,
    /// Frames at the head of the source that already produced output as a kernel centre.
    centred: usize,
}

impl AaFilter {
    /// Creates a filter with `length` taps and a cutoff expressed as a
    /// fraction of the sample rate (0.0 to 0.5).
    pub fn new(length: usize, cutoff: f64) -> Self {
        let mut filter = Self {
            length: length.clamp(MIN_FILTER_LENGTH, MAX_FILTER_LENGTH),
            cutoff: cutoff.clamp(0.0, 0.5),
            coeffs: Vec::new(),
            centred: 0,
        };
        filter.design();
        filter
    }

    /// Number of taps.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Changes the cutoff frequency, redesigning the kernel if needed.
    pub fn set_cutoff(&mut self, cutoff: f64) {
        let cutoff = cutoff.clamp(0.0, 0.5);
        if (cutoff - self.cutoff).abs() > f64::EPSILON {
            self.cutoff = cutoff;
            self.design();
        }
    }

    /// Changes the number of taps, redesigning the kernel if needed.
    pub fn set_length(&mut self, length: usize) {
        let length = length.clamp(MIN_FILTER_LENGTH, MAX_FILTER_LENGTH);
        if length != self.length {
            self.length = length;
            self.design();
        }
    }

    /// Forgets how much of the source history was already filtered.
    pub fn reset(&mut self) {
        self.centred = 0;
    }

    /// Frames at the head of the source that are history only.
    #[inline]
    pub fn consumed_history(&self) -> usize {
        self.centred
    }

    /// Filters as many frames as the kernel allows from `src` into `dst`.
    ///
    /// Returns the number of frames written.
    pub fn evaluate(&mut self, src: &mut SampleFifo, dst: &mut SampleFifo) -> usize {
        let available = src.len();
        if available < self.length {
            return 0;
        }
        let out_frames = available - (self.length - 1);
        let ch = src.channels();
        let data = src.as_slice();

        let mut out = vec![0.0f32; out_frames * ch];
        for n in 0..out_frames {
            for c in 0..ch {
                let mut acc = 0.0f32;
                for (k, &h) in self.coeffs.iter().enumerate() {
                    acc += h * data[(n + k) * ch + c];
                }
                out[n * ch + c] = acc;
            }
        }

        dst.push(&out);
        src.discard(out_frames);
        self.centred = (self.length - 1) / 2;
        out_frames
    }

    fn design(&mut self) {
        let window = hamming(self.length);
        let mid = (self.length - 1) as f64 / 2.0;
        let two_fc = 2.0 * self.cutoff;

        let mut coeffs: Vec<f64> = window
            .iter()
            .enumerate()
            .map(|(k, &w)| two_fc * sinc(two_fc * (k as f64 - mid)) * w)
            .collect();

        // Unity gain at DC
        let sum: f64 = coeffs.iter().sum();
        if sum.abs() > 1e-12 {
            for c in coeffs.iter_mut() {
                *c /= sum;
            }
        }
        self.coeffs = coeffs.into_iter().map(|c| c as f32).collect();
    }
}
