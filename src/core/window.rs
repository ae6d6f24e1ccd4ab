//! Window functions used for filter design and sinc interpolation.

use std::f64::consts::PI;

/// Hamming window coefficients.
const HAMMING_A0: f64 = 0.54;
const HAMMING_A1: f64 = 0.46;

/// Hamming window of `size` points.
pub fn hamming(size: usize) -> Vec<f64> {
    match size {
        0 => return vec![],
        1 => return vec![1.0],
        _ => {}
    }
    let n = (size - 1) as f64;
    (0..size)
        .map(|i| HAMMING_A0 - HAMMING_A1 * (2.0 * PI * i as f64 / n).cos())
        .collect()
}

/// Kaiser window evaluated at `t` in [-1, 1], peak 1.0 at the centre and
/// zero outside the support.
#[inline]
pub fn kaiser(beta: f64, t: f64) -> f64 {
    if t.abs() > 1.0 {
        return 0.0;
    }
    bessel_i0(beta * (1.0 - t * t).max(0.0).sqrt()) / bessel_i0(beta)
}

/// Maximum number of series terms for Bessel I0 convergence.
const BESSEL_MAX_TERMS: usize = 30;
/// Relative convergence threshold for Bessel I0 series.
const BESSEL_CONVERGENCE: f64 = 1e-15;

/// Zeroth-order modified Bessel function of the first kind.
/// Computed via series expansion.
#[inline]
pub(crate) fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let x_half = x / 2.0;
    for k in 1..BESSEL_MAX_TERMS {
        term *= (x_half / k as f64) * (x_half / k as f64);
        sum += term;
        if term < BESSEL_CONVERGENCE * sum {
            break;
        }
    }
    sum
}

/// Normalised sinc: sin(pi x) / (pi x).
#[inline]
pub(crate) fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-10 {
        1.0
    } else {
        let pi_x = PI * x;
        pi_x.sin() / pi_x
    }
}
