mod common;

use approx::assert_relative_eq;
use common::{configured, drain, gen_noise, gen_sine, run_stream};
use tempopitch::{StreamProcessor, StretchError};

#[test]
fn test_unconfigured_processor_refuses_input() {
    let mut proc = StreamProcessor::new();
    assert_eq!(proc.put_samples(&[0.0; 8]), Err(StretchError::NotConfigured));
    assert_eq!(proc.put_samples_i16(&[0; 8]), Err(StretchError::NotConfigured));
    assert_eq!(proc.num_samples(), 0);

    let mut out = [0.0f32; 8];
    assert_eq!(proc.receive_samples(&mut out), 0);
}

#[test]
fn test_invalid_configuration_values() {
    let mut proc = StreamProcessor::new();
    assert!(matches!(proc.set_channels(0), Err(StretchError::InvalidParameter(_))));
    assert!(matches!(proc.set_sample_rate(0), Err(StretchError::InvalidParameter(_))));
    assert_eq!(proc.channels(), 0);
    assert_eq!(proc.sample_rate(), 0);
}

#[test]
fn test_invalid_ratios_leave_state_unchanged() {
    let mut proc = configured(1, 44100);
    proc.set_tempo(1.5).unwrap();

    assert!(proc.set_tempo(0.0).is_err());
    assert!(proc.set_tempo(-2.0).is_err());
    assert!(proc.set_rate(f64::NAN).is_err());
    assert!(proc.set_pitch(f64::INFINITY).is_err());
    assert!(proc.set_tempo_change_percent(-100.0).is_err());
    assert!(proc.set_pitch_octaves(2000.0).is_err());

    assert_eq!(proc.tempo(), 1.5);
    assert_eq!(proc.rate(), 1.0);
    assert_eq!(proc.pitch(), 1.0);
}

#[test]
fn test_ratio_views() {
    let mut proc = StreamProcessor::new();
    proc.set_tempo_change_percent(-20.0).unwrap();
    proc.set_rate_change_percent(10.0).unwrap();
    proc.set_pitch_semitones(-12.0).unwrap();

    assert_relative_eq!(proc.tempo(), 0.8);
    assert_relative_eq!(proc.tempo_change_percent(), -20.0, epsilon = 1e-9);
    assert_relative_eq!(proc.rate(), 1.1);
    assert_relative_eq!(proc.rate_change_percent(), 10.0, epsilon = 1e-9);
    assert_relative_eq!(proc.pitch(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(proc.pitch_octaves(), -1.0, epsilon = 1e-12);
    assert_relative_eq!(proc.control().effective_tempo(), 1.6, epsilon = 1e-12);
    assert_relative_eq!(proc.control().effective_rate(), 0.55, epsilon = 1e-12);
}

#[test]
fn test_partial_frames_rejected() {
    let mut proc = configured(3, 44100);
    assert!(matches!(
        proc.put_samples(&[0.0; 7]),
        Err(StretchError::InvalidParameter(_))
    ));
    assert!(proc.put_samples(&[]).is_ok());
    assert_eq!(proc.num_unprocessed_samples(), 0);
}

#[test]
fn test_i16_output_clamps_at_full_scale() {
    let input = gen_noise(3, 5000, 2.0);
    let mut proc = configured(1, 44100);
    proc.put_samples(&input).unwrap();
    proc.flush().unwrap();

    let mut out = vec![0i16; 5000];
    assert_eq!(proc.receive_samples_i16(&mut out), 5000);
    for (i, (&s, &x)) in out.iter().zip(&input).enumerate() {
        if x >= 1.0 {
            assert_eq!(s, i16::MAX, "frame {}", i);
        } else if x <= -1.0 {
            assert_eq!(s, i16::MIN, "frame {}", i);
        } else {
            let expected = (x * 32768.0).round() as i32;
            assert!((s as i32 - expected).abs() <= 1, "frame {}: {} vs {}", i, s, expected);
        }
    }
}

#[test]
fn test_i16_input_scaling() {
    let mut proc = configured(2, 44100);
    let frame = [i16::MIN, 16384];
    let input: Vec<i16> = frame.iter().copied().cycle().take(2 * 3000).collect();
    proc.put_samples_i16(&input).unwrap();
    proc.flush().unwrap();

    let out = drain(&mut proc);
    assert_eq!(out.len(), input.len());
    assert_relative_eq!(out[0], -1.0, epsilon = 1e-6);
    assert_relative_eq!(out[1], 0.5, epsilon = 1e-6);
}

#[test]
fn test_receive_buffer_shorter_than_a_frame() {
    let mut proc = configured(2, 44100);
    proc.put_samples(&vec![0.1; 2 * 3000]).unwrap();
    proc.flush().unwrap();

    let mut tiny = [0.0f32; 1];
    assert_eq!(proc.receive_samples(&mut tiny), 0);
    let mut tiny_i16 = [0i16; 1];
    assert_eq!(proc.receive_samples_i16(&mut tiny_i16), 0);
    assert_eq!(proc.num_samples(), 3000);
}

#[test]
fn test_clear_keeps_configuration_and_ratios() {
    let mut proc = configured(2, 48000);
    proc.set_tempo(1.25).unwrap();
    assert!(proc.set_setting(2, 1));
    proc.put_samples(&vec![0.2; 2 * 20000]).unwrap();
    assert!(proc.num_samples() > 0);

    proc.clear();
    assert_eq!(proc.num_samples(), 0);
    assert_eq!(proc.num_unprocessed_samples(), 0);
    assert_eq!(proc.channels(), 2);
    assert_eq!(proc.sample_rate(), 48000);
    assert_eq!(proc.tempo(), 1.25);
    assert_eq!(proc.get_setting(2), Ok(1));

    // A fresh stream after clear is sized from scratch
    proc.put_samples(&vec![0.0; 2 * 4096]).unwrap();
    proc.flush().unwrap();
    assert_eq!(proc.num_samples(), 3277);
}

#[test]
fn test_flush_without_input_is_a_no_op() {
    let mut proc = configured(1, 44100);
    proc.flush().unwrap();
    assert!(proc.is_empty());
    proc.flush().unwrap();
    assert!(proc.is_empty());
}

#[test]
fn test_tiny_input_flushes_to_exact_length() {
    for frames in [1usize, 2, 17, 100] {
        let mut proc = configured(1, 44100);
        proc.set_tempo(0.5).unwrap();
        let output = run_stream(&mut proc, &vec![0.3; frames], 1);
        assert_eq!(output.len(), 2 * frames, "{} input frames", frames);
    }
}

#[test]
fn test_many_channels() {
    let mono = gen_sine(440.0, 44100, 10000, |_| 0.5);
    let input: Vec<f32> = mono.iter().flat_map(|&s| [s; 6]).collect();

    let mut proc = configured(6, 44100);
    proc.set_tempo(0.9).unwrap();
    proc.set_pitch(1.2).unwrap();
    let output = run_stream(&mut proc, &input, 512);

    assert_eq!(output.len(), 6 * (10000.0f64 / 0.9).round() as usize);
    for frame in output.chunks(6) {
        assert!(frame.iter().all(|&s| s == frame[0]));
    }
}

#[test]
fn test_extreme_ratios_stay_finite() {
    let input = gen_sine(1000.0, 44100, 44100, |_| 0.8);
    for (tempo, rate) in [(0.1, 1.0), (10.0, 1.0), (1.0, 0.25), (1.0, 4.0)] {
        let mut proc = configured(1, 44100);
        proc.set_tempo(tempo).unwrap();
        proc.set_rate(rate).unwrap();
        let output = run_stream(&mut proc, &input, 4096);
        assert_eq!(
            output.len(),
            (input.len() as f64 / (tempo * rate)).round() as usize,
            "tempo {} rate {}",
            tempo,
            rate
        );
        assert!(output.iter().all(|s| s.is_finite()));
    }
}

#[test]
fn test_huge_ratios_are_clamped_without_overflow() {
    let input = gen_noise(5, 10000, 0.3);
    for (tempo, rate) in [(1e20, 1.0), (1.0, 1e20)] {
        let mut proc = configured(1, 44100);
        proc.set_tempo(tempo).unwrap();
        proc.set_rate(rate).unwrap();
        proc.put_samples(&input).unwrap();
        proc.flush().unwrap();
        // Effective ratios stop at 100, so 10000 frames shrink to 100
        assert_eq!(proc.num_samples(), 100, "tempo {} rate {}", tempo, rate);
        assert_eq!(proc.tempo(), tempo);
        assert_eq!(proc.rate(), rate);
    }
}

#[test]
fn test_tiny_tempo_returns_with_bounded_output() {
    let mut proc = configured(1, 44100);
    proc.set_tempo(1e-20).unwrap();
    proc.put_samples(&gen_noise(6, 2000, 0.3)).unwrap();
    proc.flush().unwrap();
    // Effective tempo stops at 0.01
    assert_eq!(proc.num_samples(), 200_000);
    assert!(drain(&mut proc).iter().all(|s| s.is_finite()));
}

#[test]
fn test_huge_tempo_mid_stream() {
    let input = gen_sine(440.0, 44100, 40000, |_| 0.5);
    let mut proc = configured(1, 44100);
    proc.put_samples(&input[..20000]).unwrap();
    proc.set_tempo(1e20).unwrap();
    proc.put_samples(&input[20000..]).unwrap();
    proc.flush().unwrap();
    assert_eq!(proc.num_samples(), 20000 + 200);
}
