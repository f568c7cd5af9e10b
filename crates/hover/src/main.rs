//! Hover - drone flight-phase detector

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "hover")]
#[command(about = "Drone takeoff/landing phase detection from IMU streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a device stream or recorded table
    Detect {
        /// Arguments for hover-cli (e.g. --device /dev/ttyUSB0 --table flight.csv)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Summarise a recording for threshold tuning
    Calibrate {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Generate a synthetic flight and classify it
    Synth {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Pass remaining arguments straight to hover-cli
    Cli {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Detect { args }) => run_cli(Some("detect"), &args),
        Some(Commands::Calibrate { args }) => run_cli(Some("calibrate"), &args),
        Some(Commands::Synth { args }) => run_cli(Some("synth"), &args),
        Some(Commands::Cli { args }) => run_cli(None, &args),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn run_cli(mode: Option<&str>, args: &[String]) -> anyhow::Result<()> {
    let mut full_args = vec!["hover-cli"];
    if let Some(mode) = mode {
        full_args.extend(["--mode", mode]);
    }
    full_args.extend(args.iter().map(String::as_str));

    match hover_cli::run_cli_main(&full_args) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("CLI error: {e:#}");
            std::process::exit(1);
        }
    }
}
