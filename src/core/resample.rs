//! Streaming sample-rate conversion via linear, cubic, and windowed-sinc interpolation.

use serde::{Deserialize, Serialize};

use crate::core::fifo::SampleFifo;
use crate::core::window::{kaiser, sinc};

/// Number of sinc lobes on each side of the interpolation point.
const SINC_LOBES: usize = 8;
/// Kaiser beta for the sinc kernel (~60 dB stopband attenuation).
const SINC_KAISER_BETA: f64 = 6.0;

/// Interpolation kernel used by the rate transposer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Two-point linear interpolation. Cheapest, audible HF loss.
    Linear,
    /// Four-point Hermite interpolation.
    #[default]
    Cubic,
    /// Kaiser-windowed sinc with 8 lobes. Best quality, slowest.
    Sinc,
}

impl Interpolation {
    /// Frames of context needed before and after the integer read position.
    #[inline]
    fn margins(self) -> (usize, usize) {
        match self {
            Interpolation::Linear => (0, 1),
            Interpolation::Cubic => (1, 2),
            Interpolation::Sinc => (SINC_LOBES - 1, SINC_LOBES),
        }
    }
}

/// Streaming interpolator over interleaved frames.
///
/// Keeps a fractional read position relative to the head of its source
/// FIFO and only discards frames that fall behind the kernel's left margin.
#[derive(Debug, Clone)]
pub struct Interpolator {
    kind: Interpolation,
    pos: f64,
}

impl Interpolator {
    /// Creates an interpolator positioned at the start of the stream.
    pub fn new(kind: Interpolation) -> Self {
        Self {
            kind,
            pos: 0.0,
        }
    }

    /// Switches the interpolation kernel. The read position is kept.
    pub fn set_kind(&mut self, kind: Interpolation) {
        self.kind = kind;
    }

    /// Resets the read position to the head of the source.
    pub fn reset(&mut self) {
        self.pos = 0.0;
    }

    /// Frames at the head of the source that lie before the read position.
    #[inline]
    pub fn consumed_history(&self) -> usize {
        self.pos.floor().max(0.0) as usize
    }

    /// Produces output frames from `src` advancing `rate` input frames per
    /// output frame. Consumed input is discarded from `src`.
    ///
    /// Returns the number of frames written to `dst`.
    pub fn transpose(&mut self, rate: f64, src: &mut SampleFifo, dst: &mut SampleFifo) -> usize {
        let len = src.len();
        let ch = src.channels();
        let (left, right) = self.kind.margins();
        let data = src.as_slice();

        let mut out = Vec::new();
        while (self.pos.floor() as usize).saturating_add(right) < len {
            let idx = self.pos.floor() as usize;
            let frac = self.pos - idx as f64;
            for c in 0..ch {
                out.push(self.interpolate(data, ch, c, idx, frac));
            }
            self.pos += rate;
        }

        let keep_from = (self.pos.floor() as usize).saturating_sub(left).min(len);
        src.discard(keep_from);
        self.pos -= keep_from as f64;

        dst.push(&out);
        out.len() / ch
    }

    fn interpolate(&self, data: &[f32], ch: usize, c: usize, idx: usize, frac: f64) -> f32 {
        let frames = data.len() / ch;
        let at = |i: isize| -> f32 {
            let i = i.clamp(0, frames as isize - 1) as usize;
            data[i * ch + c]
        };
        let i = idx as isize;

        match self.kind {
            Interpolation::Linear => {
                let f = frac as f32;
                at(i) * (1.0 - f) + at(i + 1) * f
            }
            Interpolation::Cubic => {
                let f = frac as f32;
                let s0 = at(i - 1);
                let s1 = at(i);
                let s2 = at(i + 1);
                let s3 = at(i + 2);

                // Hermite interpolation
                let c0 = s1;
                let c1 = 0.5 * (s2 - s0);
                let c2 = s0 - 2.5 * s1 + 2.0 * s2 - 0.5 * s3;
                let c3 = 0.5 * (s3 - s0) + 1.5 * (s1 - s2);
                ((c3 * f + c2) * f + c1) * f + c0
            }
            Interpolation::Sinc => {
                let lobes = SINC_LOBES as isize;
                let mut sample = 0.0f64;
                let mut weight_sum = 0.0f64;
                for j in (-lobes + 1)..=lobes {
                    let x = frac - j as f64;
                    let w = sinc(x) * kaiser(SINC_KAISER_BETA, x / SINC_LOBES as f64);
                    sample += at(i + j) as f64 * w;
                    weight_sum += w;
                }
                // Preserve DC gain
                if weight_sum.abs() > 1e-10 {
                    sample /= weight_sum;
                }
                sample as f32
            }
        }
    }
}
