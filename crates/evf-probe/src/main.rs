//! EVF Probe: exercise EDSDK live view against a real camera.
//!
//! This is the command-line entry point for checking an EDSDK install and
//! a connected body without the bridge's host application.

mod config;
mod output;
mod probe;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lib_edsdk_ffi::{default_library_path, EdsdkLibrary};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "evf-probe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the first camera, stream live-view frames and tear down
    Probe {
        /// Path to a probe configuration file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path to the EDSDK library (overrides the config)
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// Number of frames to grab (overrides the config)
        #[arg(short = 'n', long)]
        frames: Option<u32>,

        /// Half-press the shutter first to wake the camera
        #[arg(long)]
        wake: bool,
    },

    /// Report which EDSDK entry points a library exports
    Symbols {
        /// Path to the EDSDK library
        library: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Probe { config, library, frames, wake } => {
            run_probe(config, library, frames, wake, cli.format)?;
        }
        Commands::Symbols { library } => {
            inspect_symbols(library, cli.format)?;
        }
    }

    Ok(())
}

fn run_probe(
    config_path: Option<PathBuf>,
    library: Option<PathBuf>,
    frames: Option<u32>,
    wake: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => {
            tracing::info!("Loading configuration from {:?}", path);
            config::load_config(path)?
        }
        None => config::ProbeConfig::default(),
    };
    if let Some(library) = library {
        config.library = library;
    }
    if let Some(frames) = frames {
        config.liveview.frames = frames;
    }
    config.liveview.wake |= wake;
    config::validate_config(&config)?;

    tracing::info!("Loading EDSDK from {:?}", config.library);
    let sdk = EdsdkLibrary::load(&config.library)
        .with_context(|| format!("Failed to load EDSDK from {:?}", config.library))?;

    let report = probe::Probe::new(config).run(sdk)?;
    output::print_probe_report(&report, format)?;

    if report.succeeded() == 0 {
        anyhow::bail!("No live-view frame could be downloaded");
    }
    Ok(())
}

fn inspect_symbols(library: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let library = library.unwrap_or_else(default_library_path);
    tracing::info!("Inspecting {:?}", library);

    let info = EdsdkLibrary::inspect(&library)
        .with_context(|| format!("Failed to open {:?}", library))?;
    output::print_library_info(&info, format)?;

    if !info.is_loadable() {
        anyhow::bail!("Library is missing required EDSDK entry points");
    }
    Ok(())
}
