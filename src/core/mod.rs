//! Core types, sample FIFOs, filters and resampling utilities.

pub mod fft;
pub mod fifo;
pub mod filter;
pub mod resample;
pub mod types;
pub mod window;

pub use fifo::SampleFifo;
pub use resample::Interpolation;
pub use types::*;
