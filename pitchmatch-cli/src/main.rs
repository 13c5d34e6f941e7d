//! # pitchmatch - Pitch-Matching Practice
//!
//! Command line front end for the practice core. It wires real audio into
//! the capture loop and prints what was heard.
//!
//! ## Commands
//! - `detect`: print the detected note of every frame of a WAV file
//! - `score`: replay a WAV file against a reference melody and report
//! - `listen`: live detection from the default microphone (feature
//!   `microphone`)
//!
//! ## Logging
//! Diagnostics go through `log`; `RUST_LOG` picks the level. The last 100
//! lines are kept in memory and written out with `--log-file`.

mod display;
mod wav;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pitchmatch_core::{
    Analyzer, AudioFrame, CaptureLoop, Detection, FrameScheduler, LogBuffer, NoteEvent,
    PracticeConfig, ReferenceMelody, ReplayDevice, RingLogger,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pitchmatch", version, about = "Pitch detection and note-matching practice")]
struct Cli {
    /// JSON configuration file; unspecified values use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the retained log lines to this file on exit
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the detected note of every frame of a WAV file
    Detect {
        wav: PathBuf,
        /// Samples between frame starts (defaults to the frame size)
        #[arg(long)]
        hop: Option<usize>,
    },
    /// Replay a WAV file against a reference melody and print the report
    Score {
        wav: PathBuf,
        /// Melody as a JSON file or compact text such as "C4@0.5 E4@1.0"
        #[arg(long)]
        melody: String,
        /// Save the session report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
        /// Samples between frame starts
        #[arg(long, default_value_t = 512)]
        hop: usize,
    },
    /// Detect notes from the default microphone
    #[cfg(feature = "microphone")]
    Listen {
        /// How long to listen
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        /// Score against this melody while listening
        #[arg(long)]
        melody: Option<String>,
        /// Save the session report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_buffer = init_logging();
    log::debug!("[MAIN] Starting pitchmatch...");

    let result = run(&cli);
    if let Err(e) = &result {
        log::error!("[MAIN] {:#}", e);
    }

    if let Some(path) = &cli.log_file {
        log_buffer
            .write_to(path)
            .with_context(|| format!("Could not write log to {}", path.display()))?;
    }
    result
}

/// Installs `env_logger` behind a ring buffer so recent lines can be saved.
fn init_logging() -> LogBuffer {
    let buffer = LogBuffer::default();
    let env_logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).build();
    let level = env_logger.filter();
    if RingLogger::new(buffer.clone(), level)
        .with_inner(Box::new(env_logger))
        .install()
        .is_err()
    {
        eprintln!("[MAIN] A logger was already installed");
    }
    buffer
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PracticeConfig::load(path)
            .with_context(|| format!("Could not load config {}", path.display()))?,
        None => PracticeConfig::default(),
    };

    match &cli.command {
        Command::Detect { wav, hop } => detect(wav, *hop, &config),
        Command::Score {
            wav,
            melody,
            report,
            hop,
        } => score(wav, melody, report.as_deref(), *hop, config),
        #[cfg(feature = "microphone")]
        Command::Listen {
            seconds,
            melody,
            report,
        } => listen(*seconds, melody.as_deref(), report.as_deref(), config),
    }
}

/// Runs the analyzer over consecutive frames of a WAV file.
fn detect(path: &Path, hop: Option<usize>, config: &PracticeConfig) -> Result<()> {
    let audio = wav::load_mono(path)?;
    let frame_size = config.capture.buffer_size.max(4);
    let hop = hop.unwrap_or(frame_size).max(1);
    log::info!(
        "[MAIN] Analyzing {:.2}s at {} Hz",
        audio.duration_secs(),
        audio.sample_rate
    );

    let analyzer = Analyzer::new(config.detector.clone());
    let mut start = 0;
    while start + frame_size <= audio.samples.len() {
        let frame = AudioFrame::new(audio.samples[start..start + frame_size].to_vec(), audio.sample_rate);
        let frequency = analyzer.frequency(&frame);
        let detection = Detection {
            timestamp_secs: start as f64 / audio.sample_rate as f64,
            frequency,
            note: frequency.map(NoteEvent::from_frequency),
        };
        println!("{}", display::detection_line(&detection));
        start += hop;
    }
    Ok(())
}

/// Replays a WAV file through the capture loop with a practice session.
fn score(
    path: &Path,
    melody: &str,
    report_path: Option<&Path>,
    hop: usize,
    config: PracticeConfig,
) -> Result<()> {
    let melody = load_melody(melody)?;
    let audio = wav::load_mono(path)?;
    let frame_size = config.capture.buffer_size.max(4);
    let hop = hop.max(1);
    let frames = audio.samples.len().saturating_sub(frame_size) / hop + 1;

    let scheduler = FrameScheduler::new();
    let device = ReplayDevice::new(audio.samples, audio.sample_rate, frame_size).with_hop(hop);
    let mut capture = CaptureLoop::new(device, scheduler.clone(), config);

    capture.begin_session(melody);
    capture.start()?;
    for _ in 0..frames {
        scheduler.run_frame();
        if capture.with_session(|s| s.is_complete()).unwrap_or(true) {
            break;
        }
    }
    let report = capture
        .stop()
        .context("Session ended without a report")?;

    println!("{}", display::report_text(&report));
    if let Some(path) = report_path {
        report
            .save(path)
            .with_context(|| format!("Could not save report to {}", path.display()))?;
        log::info!("[MAIN] Report saved to {}", path.display());
    }
    Ok(())
}

/// Live detection from the microphone, pumping the scheduler from a frame
/// clock on this thread.
#[cfg(feature = "microphone")]
fn listen(
    seconds: u64,
    melody: Option<&str>,
    report_path: Option<&Path>,
    config: PracticeConfig,
) -> Result<()> {
    use pitchmatch_core::MicrophoneDevice;
    use std::time::Duration;

    let scheduler = FrameScheduler::new();
    let device = MicrophoneDevice::new(config.capture.clone());
    let interval = Duration::from_millis(config.capture.frame_interval_ms.max(1));
    let mut capture = CaptureLoop::new(device, scheduler.clone(), config);

    if let Some(text) = melody {
        capture.begin_session(load_melody(text)?);
    }
    let detections = capture.subscribe();
    capture.start()?;
    log::info!("[MAIN] Listening for {}s...", seconds);

    let ticker = crossbeam_channel::tick(interval);
    let deadline = crossbeam_channel::after(Duration::from_secs(seconds));
    loop {
        crossbeam_channel::select! {
            recv(ticker) -> _ => {
                scheduler.run_frame();
                for detection in detections.try_iter() {
                    if detection.note.is_some() {
                        println!("{}", display::detection_line(&detection));
                    }
                }
            },
            recv(deadline) -> _ => break,
        }
    }

    if let Some(report) = capture.stop() {
        println!("{}", display::report_text(&report));
        if let Some(path) = report_path {
            report
                .save(path)
                .with_context(|| format!("Could not save report to {}", path.display()))?;
        }
    }
    Ok(())
}

/// Reads a melody from a JSON file, or parses it as compact text.
fn load_melody(arg: &str) -> Result<ReferenceMelody> {
    let path = Path::new(arg);
    let melody = if path.is_file() {
        ReferenceMelody::load(path)
            .with_context(|| format!("Could not load melody {}", path.display()))?
    } else {
        ReferenceMelody::parse_compact(arg).context("Could not parse melody")?
    };
    log::info!("[MAIN] Melody: {}", melody.to_compact());
    Ok(melody)
}
