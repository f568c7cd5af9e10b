//! Hover CLI - detection, calibration and synthetic runs from the command line.

pub mod cli;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use hover_core::{CalibrationConfig, Sample, TakeoffDetector, TransitionEvent};
use hover_sim::{
    generate_flight, open_source, run_stream, save_events_csv, save_events_json,
    CalibrationSummary, EventSink, FlightProfile, SensorNoise, StreamReport,
};

pub use cli::{Args, Mode, OutputFormat};

/// Public function that can be called from the main binary
pub fn run_cli_main(args: &[&str]) -> Result<()> {
    let args = Args::parse_from(args);
    main_inner(args)
}

pub fn main_inner(args: Args) -> Result<()> {
    let config = load_calibration(&args)?;
    match args.mode {
        Mode::Detect => run_detect(&args, config, ctrl_c_flag()).map(|_| ()),
        Mode::Calibrate => run_calibrate(&args, &config).map(|_| ()),
        Mode::Synth => run_synth(&args, config, ctrl_c_flag()).map(|_| ()),
    }
}

/// Flag raised by the first Ctrl-C, so a live stream stops at a sample
/// boundary and its events are still written out.
pub fn ctrl_c_flag() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let watcher = thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::warn!(error = %e, "no signal runtime, Ctrl-C will kill the run");
                    return;
                }
            };
            match rt.block_on(tokio::signal::ctrl_c()) {
                Ok(()) => {
                    tracing::info!("Ctrl-C received, stopping stream");
                    flag.store(true, Ordering::Relaxed);
                }
                Err(e) => tracing::warn!(error = %e, "listening for Ctrl-C failed"),
            }
        });
    if let Err(e) = watcher {
        tracing::warn!(error = %e, "could not start Ctrl-C watcher");
    }
    cancel
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Calibration file (if any), then command-line overrides, then validation.
pub fn load_calibration(args: &Args) -> Result<CalibrationConfig> {
    let mut config = match &args.calibration {
        Some(path) => read_calibration(path)?,
        None => CalibrationConfig::default(),
    };

    if let Some(axis) = args.primary_axis {
        config.primary_axis = axis;
    }
    if let Some(offset) = args.gravity_offset {
        config.gravity_offset = offset;
    }
    if let Some(s) = args.landing_confirm {
        config.landing_confirm_s = s;
    }
    if let Some(s) = args.pattern_timeout {
        config.rise_timeout_s = s;
        config.first_fall_timeout_s = s;
        config.second_fall_timeout_s = s;
    }

    config.validate().context("invalid calibration")?;
    tracing::debug!(?config, "calibration loaded");
    Ok(config)
}

pub fn read_calibration(path: &Path) -> Result<CalibrationConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading calibration {}", path.display()))?;
    let config: CalibrationConfig =
        toml::from_str(&text).with_context(|| format!("parsing calibration {}", path.display()))?;
    tracing::info!(path = %path.display(), "calibration file applied");
    Ok(config)
}

// ---------------------------------------------------------------------------
// Detect
// ---------------------------------------------------------------------------
pub fn run_detect(
    args: &Args,
    config: CalibrationConfig,
    cancel: Arc<AtomicBool>,
) -> Result<StreamReport> {
    let source = open_source(args.device.as_deref(), args.table.as_deref(), args.rate_hz)
        .context("opening sample source")?;
    println!("Reading samples from {}", source.kind());

    let report = detect_stream(source, args, config, cancel);
    print_report(&report);
    write_events(args, &report.events)?;
    Ok(report)
}

fn detect_stream<I>(
    source: I,
    args: &Args,
    config: CalibrationConfig,
    cancel: Arc<AtomicBool>,
) -> StreamReport
where
    I: IntoIterator<Item = Sample>,
    I::IntoIter: Send + 'static,
{
    let mut detector = TakeoffDetector::new(config);
    let (mut sink, rx) = EventSink::channel(64);

    let printer = thread::spawn(move || {
        for ev in rx {
            println!(
                "{:>10.3} s  {:<11} -> {:<11} ({})",
                ev.timestamp, ev.from, ev.to, ev.cause
            );
        }
    });

    let report = run_stream(source, &mut detector, &mut sink, cancel, args.queue_capacity);
    // Closing the sink ends the printer
    drop(sink);
    if printer.join().is_err() {
        tracing::warn!("event printer panicked");
    }
    report
}

fn print_report(report: &StreamReport) {
    println!("\nDetection Stats:");
    println!("  Samples:      {}", report.samples);
    println!("  Filtered:     {}", report.filtered);
    println!("  Transitions:  {}", report.events.len());
    println!("  Dropped:      {}", report.dropped_events);
    if report.cancelled {
        println!("  Stopped early (cancelled)");
    }
    println!(
        "  Final state:  {} ({})",
        report.final_state,
        report.final_status.as_str()
    );
    println!("-----------------------------");
}

fn write_events(args: &Args, events: &[TransitionEvent]) -> Result<PathBuf> {
    let path = match args.format {
        OutputFormat::Csv => {
            let path = args.output_dir.join("events.csv");
            save_events_csv(&path, events)?;
            path
        }
        OutputFormat::Json => {
            let path = args.output_dir.join("events.json");
            save_events_json(&path, events)?;
            path
        }
    };
    println!("Events written to {:?}", path);
    Ok(path)
}

// ---------------------------------------------------------------------------
// Calibrate
// ---------------------------------------------------------------------------
pub fn run_calibrate(args: &Args, config: &CalibrationConfig) -> Result<CalibrationSummary> {
    let source = open_source(args.device.as_deref(), args.table.as_deref(), args.rate_hz)
        .context("opening sample source")?;
    let samples: Vec<Sample> = source.collect();
    let summary = CalibrationSummary::from_samples(&samples);

    println!("{summary}");
    println!(
        "Suggested gravity_offset: {:.4}",
        summary.suggested_gravity_offset(config.primary_axis)
    );

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let path = args.output_dir.join("calibration_summary.json");
    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("Summary written to {:?}", path);
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Synth
// ---------------------------------------------------------------------------
pub fn run_synth(
    args: &Args,
    config: CalibrationConfig,
    cancel: Arc<AtomicBool>,
) -> Result<StreamReport> {
    let profile = FlightProfile {
        gravity_offset: args.synth_gravity,
        ..Default::default()
    };
    let noise = SensorNoise {
        noise_scale: args.noise_scale,
        seed: args.seed,
        ..Default::default()
    };
    let samples = generate_flight(&profile, &noise).context("building noise model")?;
    println!(
        "Generated {} samples ({:.1} s, seed {})",
        samples.len(),
        profile.duration(),
        noise.seed
    );

    let table = args.output_dir.join("flight.csv");
    write_table(&table, &samples)?;
    println!("Flight table written to {:?}", table);

    let report = detect_stream(samples, args, config, cancel);
    print_report(&report);
    write_events(args, &report.events)?;
    Ok(report)
}

/// Write samples in the recorded-table layout read back by `--table`.
fn write_table(path: &Path, samples: &[Sample]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record([
        "timestamp", "acc_x", "acc_y", "acc_z", "gyro_x", "gyro_y", "gyro_z",
    ])?;
    for s in samples {
        // accel-only samples leave the gyro columns empty
        let g = s
            .gyro
            .map(|g| [g.x.to_string(), g.y.to_string(), g.z.to_string()])
            .unwrap_or_default();
        wtr.write_record(&[
            format!("{:.4}", s.timestamp),
            s.accel.x.to_string(),
            s.accel.y.to_string(),
            s.accel.z.to_string(),
            g[0].clone(),
            g[1].clone(),
            g[2].clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
