//! Allocation benchmark CLI
//!
//! A command-line tool for tracking workload telemetry under the
//! adaptive allocator or the vertical pod autoscaler, comparing the
//! persisted runs, and inspecting artifact directories.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use harness_lib::sampler::TrackerKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::compare::FieldArg;

/// Allocation benchmark CLI
#[derive(Parser)]
#[command(name = "allocbench")]
#[command(author, version, about = "Measurement harness for adaptive resource allocation", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a timed tracking session against a test workload
    #[command(subcommand)]
    Track(TrackCommands),

    /// Compare two persisted runs side by side
    Compare {
        /// Allocator-tracked run file
        alloc_file: PathBuf,

        /// Autoscaler-tracked run file
        vpa_file: PathBuf,

        /// Allocation series to compare
        #[arg(long, value_enum, default_value = "limit")]
        field: FieldArg,

        /// Where to write the comparison JSON
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print statistics without writing a file
        #[arg(long)]
        stats_only: bool,
    },

    /// Summarize every run artifact in a directory
    Inspect {
        /// Directory holding run files
        #[arg(default_value = "artifacts")]
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum TrackCommands {
    /// Track an idle pod managed by the adaptive allocator
    Idle(TrackArgs),

    /// Track an idle deployment managed by the vertical pod autoscaler
    Vpa(TrackArgs),
}

#[derive(Args)]
pub struct TrackArgs {
    /// Namespace for the test fixture
    #[arg(long, short, env = "ALLOCBENCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Workload name
    #[arg(long)]
    pub name: Option<String>,

    /// Session duration in seconds
    #[arg(long, short, default_value_t = 300)]
    pub duration: u64,

    /// Sampling interval in seconds
    #[arg(long, short, default_value_t = 5)]
    pub interval: u64,

    /// Initial CPU request
    #[arg(long, default_value = "500m")]
    pub request: String,

    /// Initial CPU limit
    #[arg(long, default_value = "1000m")]
    pub limit: String,

    /// Autoscaler update mode (vpa sessions only)
    #[arg(long, default_value = "InPlaceOrRecreate")]
    pub mode: String,

    /// Leave the fixtures in place after the session
    #[arg(long)]
    pub no_cleanup: bool,

    /// Output file (defaults to a timestamped name in the working directory)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_target(false))
        .init();

    match cli.command {
        Commands::Track(track_cmd) => match track_cmd {
            TrackCommands::Idle(args) => commands::track::run(TrackerKind::Idle, args).await?,
            TrackCommands::Vpa(args) => commands::track::run(TrackerKind::Vpa, args).await?,
        },
        Commands::Compare {
            alloc_file,
            vpa_file,
            field,
            output,
            stats_only,
        } => {
            commands::compare::run(&alloc_file, &vpa_file, field, output, stats_only)?;
        }
        Commands::Inspect { dir } => {
            commands::inspect::run(&dir)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
