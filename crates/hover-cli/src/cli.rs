//! Argument surface for the hover command line.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use hover_core::Axis;
use hover_sim::{DEFAULT_QUEUE_CAPACITY, DEFAULT_RATE_HZ};

#[derive(Parser, Debug)]
#[command(name = "hover-cli")]
#[command(about = "Drone takeoff/landing phase detector")]
#[command(version)]
pub struct Args {
    /// What to run
    #[arg(short, long, value_enum, default_value = "detect")]
    pub mode: Mode,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Output file format for events
    #[arg(short, long, value_enum, default_value = "csv")]
    pub format: OutputFormat,

    // ── Input ─────────────────────────────────────────────────
    /// Device or pipe with one sample per line ("-" for stdin)
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Recorded CSV table, used when the device cannot be opened
    #[arg(short, long)]
    pub table: Option<PathBuf>,

    /// Sample rate assumed for lines without a timestamp
    #[arg(long, default_value_t = DEFAULT_RATE_HZ)]
    pub rate_hz: f64,

    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    // ── Calibration ───────────────────────────────────────────
    /// TOML calibration file; missing keys keep their defaults
    #[arg(short, long)]
    pub calibration: Option<PathBuf>,

    #[arg(long, value_parser = parse_axis)]
    pub primary_axis: Option<Axis>,

    /// Subtracted from the primary axis (e.g. 1.0 for +1 g at rest)
    #[arg(long)]
    pub gravity_offset: Option<f32>,

    /// Steady-idle time before landing is confirmed (s)
    #[arg(long)]
    pub landing_confirm: Option<f64>,

    /// Timeout for FIRST_RISE, FIRST_FALL and SECOND_FALL (s)
    #[arg(long)]
    pub pattern_timeout: Option<f64>,

    // ── Synthetic flight ──────────────────────────────────────
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 1.0)]
    pub noise_scale: f64,

    /// Gravity offset baked into the generated primary axis
    #[arg(long, default_value_t = 0.0)]
    pub synth_gravity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Classify a stream and export transition events
    Detect,
    /// Print per-axis extremes of a recording
    Calibrate,
    /// Generate a synthetic flight table and classify it
    Synth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

fn parse_axis(s: &str) -> Result<Axis, String> {
    match s.to_ascii_lowercase().as_str() {
        "x" => Ok(Axis::X),
        "y" => Ok(Axis::Y),
        "z" => Ok(Axis::Z),
        other => Err(format!("unknown axis {other:?}, expected x, y or z")),
    }
}
