//! `vad-cli`: reads raw 16-bit PCM from a file and prints a speech/non-speech
//! decision per frame. A thin harness around `vadcore::Vad` — all of the
//! decision logic lives in the library; this binary only owns file I/O, CLI
//! parsing, and a trailing-silence counter for its own summary line.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use vadcore::Vad;

const TRAILING_SILENCE_WINDOW: u32 = 80;

/// Command-line voice activity detector.
#[derive(Debug, Parser, Clone)]
#[command(about = "Fixed-point voice activity detector", author, version)]
struct Cli {
    /// Raw little-endian i16 PCM file to scan (no WAV header)
    #[arg(long)]
    input: PathBuf,

    /// Sample rate of the input file in Hz
    #[arg(long, default_value_t = 8000)]
    rate: u32,

    /// Frame duration in milliseconds (10, 20 or 30)
    #[arg(long = "frame-ms", default_value_t = 10)]
    frame_ms: u32,

    /// Aggressiveness mode (0 = quality .. 3 = very aggressive)
    #[arg(long, default_value_t = 0)]
    mode: i32,
}

impl Cli {
    fn parse_args() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.frame_ms, 10 | 20 | 30) {
            bail!("--frame-ms must be 10, 20 or 30, got {}", self.frame_ms);
        }
        if !(0..=3).contains(&self.mode) {
            bail!("--mode must be between 0 and 3, got {}", self.mode);
        }
        Ok(())
    }

    fn frame_length(&self) -> usize {
        (self.rate as usize / 1000) * (self.frame_ms as usize)
    }
}

fn read_samples(path: &PathBuf) -> Result<Vec<i16>> {
    let mut bytes = Vec::new();
    File::open(path)
        .with_context(|| format!("opening input file {}", path.display()))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("reading input file {}", path.display()))?;

    if bytes.len() % 2 != 0 {
        tracing::warn!(
            trailing_byte_count = bytes.len() % 2,
            "input file length is odd, dropping trailing byte"
        );
        bytes.pop();
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse_args().context("parsing command-line arguments")?;
    let samples = read_samples(&cli.input)?;
    let frame_length = cli.frame_length();

    let mut vad = Vad::new();
    vad.set_mode(cli.mode)
        .with_context(|| format!("setting aggressiveness mode {}", cli.mode))?;

    let mut frame_index = 0usize;
    let mut trailing_silence = 0u32;
    let mut longest_silence_run = 0u32;

    for chunk in samples.chunks(frame_length) {
        let frame = if chunk.len() == frame_length {
            chunk.to_vec()
        } else {
            tracing::debug!(
                frame_index,
                got = chunk.len(),
                want = frame_length,
                "zero-padding final partial frame"
            );
            let mut padded = chunk.to_vec();
            padded.resize(frame_length, 0);
            padded
        };

        let is_speech = vad
            .process(cli.rate, &frame)
            .with_context(|| format!("processing frame {frame_index}"))?;

        println!("{}\t{}", frame_index, is_speech as u8);

        if is_speech {
            trailing_silence = 0;
        } else {
            trailing_silence += 1;
            longest_silence_run = longest_silence_run.max(trailing_silence);
            if trailing_silence == TRAILING_SILENCE_WINDOW {
                tracing::debug!(frame_index, "reached trailing-silence window");
            }
        }

        frame_index += 1;
    }

    eprintln!(
        "frames={frame_index} longest_trailing_silence_run={longest_silence_run} (window={TRAILING_SILENCE_WINDOW})"
    );

    Ok(())
}
