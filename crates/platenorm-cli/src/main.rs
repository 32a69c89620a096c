//! platenorm CLI - per-plate normalization of screening features.

mod commands;
mod config;
mod dataset;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "platenorm")]
#[command(author, version, about = "platenorm - per-plate robust normalization of screening features", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platenorm.toml in the current or a parent directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default platenorm.toml
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Compute per-plate parameters and the column mask
    Precompute {
        /// Control-selection predicate (default: from config)
        #[arg(short, long)]
        predicate: Option<String>,

        /// Keep parameters that already exist
        #[arg(short, long)]
        resume: bool,

        /// Recompute even if the cache already holds parameters
        #[arg(short, long, conflicts_with = "resume")]
        force: bool,

        /// Compute plates in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Normalize the images of one plate
    Normalize {
        /// Plate to normalize
        #[arg(long)]
        plate: String,

        /// Images of the plate to include (default: all)
        #[arg(short, long, default_value = "*")]
        predicate: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the state of the parameter cache
    Inspect,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let load_config = || Config::load(cli.config.as_deref());

    match cli.command {
        Commands::Init { path } => commands::init::run(path),
        Commands::Precompute {
            predicate,
            resume,
            force,
            parallel,
        } => commands::precompute::run(
            &load_config()?,
            predicate.as_deref(),
            commands::precompute::Mode::from_flags(resume, force),
            parallel,
        ),
        Commands::Normalize {
            plate,
            predicate,
            output,
        } => commands::normalize::run(&load_config()?, &plate, &predicate, output.as_deref()),
        Commands::Inspect => commands::inspect::run(&load_config()?),
    }
}
