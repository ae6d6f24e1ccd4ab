#![allow(dead_code)]

use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempopitch::StreamProcessor;

pub fn gen_sine<F>(freq_hz: f32, sr: u32, n: usize, amp_fn: F) -> Vec<f32>
where
    F: Fn(usize) -> f32,
{
    (0..n)
        .map(|i| {
            let phase = 2.0 * PI * freq_hz * i as f32 / sr as f32;
            amp_fn(i) * phase.sin()
        })
        .collect()
}

pub fn gen_two_tone(
    freq_a: f32,
    amp_a: f32,
    freq_b: f32,
    amp_b: f32,
    sr: u32,
    n: usize,
) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let t = i as f32 / sr as f32;
            amp_a * (2.0 * PI * freq_a * t).sin() + amp_b * (2.0 * PI * freq_b * t).sin()
        })
        .collect()
}

pub fn gen_noise(seed: u64, n: usize, amp: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(-amp..amp)).collect()
}

pub fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    (0..frames)
        .flat_map(|i| channels.iter().map(move |c| c[i]))
        .collect()
}

pub fn channel(interleaved: &[f32], num_channels: usize, ch: usize) -> Vec<f32> {
    interleaved
        .iter()
        .skip(ch)
        .step_by(num_channels)
        .copied()
        .collect()
}

pub fn windowed_rms(signal: &[f32], start: usize, len: usize) -> f64 {
    let start = start.min(signal.len());
    let end = (start + len).min(signal.len());
    if end <= start {
        return 0.0;
    }
    let sum_sq: f64 = signal[start..end]
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();
    (sum_sq / (end - start) as f64).sqrt()
}

pub fn count_positive_zero_crossings(signal: &[f32], start: usize, end: usize) -> usize {
    let end = end.min(signal.len());
    if end <= start + 1 {
        return 0;
    }
    signal[start..end]
        .windows(2)
        .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
        .count()
}

pub fn estimate_freq_zero_crossings(signal: &[f32], sr: u32, start: usize, end: usize) -> f64 {
    let end = end.min(signal.len());
    if end <= start + 1 {
        return 0.0;
    }
    let crossings = count_positive_zero_crossings(signal, start, end) as f64;
    crossings / ((end - start) as f64 / sr as f64)
}

pub fn energy_at_freq(signal: &[f32], sr: u32, freq_hz: f32) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let mut re = 0.0f64;
    let mut im = 0.0f64;
    for (i, &s) in signal.iter().enumerate() {
        let angle = 2.0 * std::f64::consts::PI * freq_hz as f64 * i as f64 / sr as f64;
        re += s as f64 * angle.cos();
        im -= s as f64 * angle.sin();
    }
    (re * re + im * im).sqrt() / signal.len() as f64
}

pub fn configured(channels: u16, sample_rate: u32) -> StreamProcessor {
    let mut proc = StreamProcessor::new();
    proc.set_channels(channels).expect("valid channel count");
    proc.set_sample_rate(sample_rate).expect("valid sample rate");
    proc
}

/// Drains every ready frame from the processor.
pub fn drain(proc: &mut StreamProcessor) -> Vec<f32> {
    let channels = proc.channels() as usize;
    let mut out = Vec::new();
    let mut buf = vec![0.0f32; 1000 * channels];
    loop {
        let frames = proc.receive_samples(&mut buf);
        if frames == 0 {
            break;
        }
        out.extend_from_slice(&buf[..frames * channels]);
    }
    out
}

/// Pushes `input` in chunks of `chunk_frames`, draining as a player would,
/// then flushes.
pub fn run_stream(proc: &mut StreamProcessor, input: &[f32], chunk_frames: usize) -> Vec<f32> {
    let channels = proc.channels() as usize;
    let mut out = Vec::new();
    for chunk in input.chunks(chunk_frames * channels) {
        proc.put_samples(chunk).expect("put_samples should succeed");
        out.extend(drain(proc));
    }
    proc.flush().expect("flush should succeed");
    out.extend(drain(proc));
    out
}
