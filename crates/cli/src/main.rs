//! RPS calibration CLI
//!
//! A command-line tool for summarising calibration results and comparing
//! the throughput cost of each instrumentation variant.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{results, scenarios};
use std::path::PathBuf;

/// RPS calibration CLI
#[derive(Parser)]
#[command(name = "calib")]
#[command(author, version, about = "CLI for inspecting RPS calibration results", long_about = None)]
pub struct Cli {
    /// Results CSV to read (can also be set via CALIB_RESULTS env var)
    #[arg(
        long,
        env = "CALIB_RESULTS",
        default_value = "results/rps_calibration_results.csv",
        global = true
    )]
    pub results: PathBuf,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Target load statistics per language, configuration and endpoint
    Stats {
        /// Filter by language
        #[arg(long, short)]
        language: Option<String>,
    },

    /// Compare target loads of the standard, otel and elastic variants
    Overhead {
        /// Filter by language
        #[arg(long, short)]
        language: Option<String>,
    },

    /// List configured scenarios and the hostnames they are discovered by
    Scenarios {
        /// Filter by language
        #[arg(long, short)]
        language: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { language } => {
            results::show_stats(&cli.results, language.as_deref(), cli.format)?;
        }
        Commands::Overhead { language } => {
            results::show_overhead(&cli.results, language.as_deref(), cli.format)?;
        }
        Commands::Scenarios { language } => {
            scenarios::list_scenarios(language.as_deref(), cli.format)?;
        }
    }

    Ok(())
}
