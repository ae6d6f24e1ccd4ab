use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tempopitch::io::wav::{read_wav_file, write_wav_file, OutputFormat, WavAudio};
use tempopitch::{Interpolation, Settings, StreamProcessor};

/// Interpolation choices accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InterpolationArg {
    Linear,
    Cubic,
    Sinc,
}

impl From<InterpolationArg> for Interpolation {
    fn from(arg: InterpolationArg) -> Self {
        match arg {
            InterpolationArg::Linear => Interpolation::Linear,
            InterpolationArg::Cubic => Interpolation::Cubic,
            InterpolationArg::Sinc => Interpolation::Sinc,
        }
    }
}

/// Change the tempo, playback rate or pitch of a WAV file.
#[derive(Parser, Debug)]
#[command(name = "tempopitch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input WAV file (8/16/24/32-bit integer or 32-bit float PCM)
    input: PathBuf,

    /// Output WAV file
    output: PathBuf,

    /// Tempo change in percent, e.g. 25 plays 1.25x as fast
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    tempo: f64,

    /// Playback rate change in percent (tempo and pitch together)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    rate: f64,

    /// Pitch change in semitones
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pitch: f64,

    /// Use the faster, slightly lower quality seek
    #[arg(long)]
    quick: bool,

    /// Disable the anti-alias filter in the rate transposer
    #[arg(long)]
    no_aa_filter: bool,

    /// Resampling interpolation
    #[arg(long, value_enum)]
    interpolation: Option<InterpolationArg>,

    /// JSON file with tuning settings; flags above override it
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Frames pushed per call, as an embedding player would
    #[arg(long, default_value_t = 4096, value_parser = clap::value_parser!(u32).range(1..))]
    chunk_frames: u32,

    /// Write 32-bit float output instead of 16-bit PCM
    #[arg(long)]
    float: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading settings {}", path.display()))?;
                Settings::from_json(&json)
                    .with_context(|| format!("parsing settings {}", path.display()))?
            }
            None => Settings::default(),
        };
        if self.quick {
            settings.use_quick_seek = true;
        }
        if self.no_aa_filter {
            settings.use_aa_filter = false;
        }
        if let Some(kind) = self.interpolation {
            settings.interpolation = kind.into();
        }
        Ok(settings)
    }
}

fn run(args: &Args) -> Result<()> {
    let input = read_wav_file(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    info!(
        frames = input.num_frames(),
        sample_rate = input.config.sample_rate,
        channels = input.config.channels,
        "input: {:.2}s",
        input.duration_secs()
    );

    let mut proc = StreamProcessor::new();
    proc.set_channels(input.config.channels)?;
    proc.set_sample_rate(input.config.sample_rate)?;
    proc.apply_settings(args.settings()?)
        .context("applying settings")?;
    proc.set_tempo_change_percent(args.tempo)
        .context("invalid --tempo")?;
    proc.set_rate_change_percent(args.rate)
        .context("invalid --rate")?;
    proc.set_pitch_semitones(args.pitch)
        .context("invalid --pitch")?;
    debug!(settings = ?proc.settings(), "processor configured");

    let start = Instant::now();
    let channels = input.config.channel_count();
    let chunk_samples = args.chunk_frames as usize * channels;
    let mut buffer = vec![0.0f32; chunk_samples];
    let mut samples = Vec::with_capacity(input.samples.len());

    let mut drain = |proc: &mut StreamProcessor, samples: &mut Vec<f32>| loop {
        let frames = proc.receive_samples(&mut buffer);
        if frames == 0 {
            break;
        }
        samples.extend_from_slice(&buffer[..frames * channels]);
    };

    for chunk in input.samples.chunks(chunk_samples) {
        proc.put_samples(chunk)?;
        drain(&mut proc, &mut samples);
    }
    proc.flush()?;
    drain(&mut proc, &mut samples);

    let output = WavAudio {
        samples,
        config: input.config,
    };
    let elapsed = start.elapsed().as_secs_f64();
    info!(
        frames = output.num_frames(),
        ratio = output.num_frames() as f64 / input.num_frames().max(1) as f64,
        "output: {:.2}s, processed in {:.3}s",
        output.duration_secs(),
        elapsed
    );

    let format = if args.float {
        OutputFormat::Float32
    } else {
        OutputFormat::Pcm16
    };
    write_wav_file(&args.output, &output, format)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("written to {}", args.output.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        if args.verbose {
            EnvFilter::try_new("debug")
        } else {
            EnvFilter::try_new("info")
        }
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("tempopitch v{}", tempopitch::version_string());
    run(&args)
}
