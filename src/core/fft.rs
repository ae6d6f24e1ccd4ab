//! FFT-related constants shared by the correlation search.

use rustfft::num_complex::Complex;

/// Zero-valued complex number, used for FFT buffer initialization.
pub const COMPLEX_ZERO: Complex<f32> = Complex::new(0.0, 0.0);

/// Minimum energy threshold to avoid division by near-zero in correlation normalization.
pub const ENERGY_EPSILON: f64 = 1e-12;
