//! Command-line argument parsing for PMC Harvester
//!
//! This module defines the CLI structure using clap derive macros: a full
//! harvest, a standalone cleaning pass, and a local index snapshot.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// PMC Harvester - mirror and normalize the PMC open-access package tree
#[derive(Parser, Debug)]
#[command(
    name = "pmc_harvester",
    version,
    about = "Mirror PMC article packages and normalize them into PDF + NXML pairs",
    long_about = "Lists the remote <hh>/<hh> package tree, downloads every archive missing from the local mirror,
and reduces each one to a directory holding <identifier>.pdf and <identifier>.nxml."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - only errors are logged
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Local mirror root (overrides `[mirror].root`)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List, download, and normalize every archive missing locally
    Harvest,

    /// Normalize archives already on disk and remove listing artifacts
    Clean,

    /// Build the local index and write it to a file
    Index(IndexArgs),
}

/// Arguments for the index command
#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Snapshot file, one `<hh>/<hh>/<key>` line per canonical directory
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    ///
    /// Without a verbosity flag the configured level is used.
    pub fn log_level(&self, configured: tracing::Level) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            configured
        }
    }
}
