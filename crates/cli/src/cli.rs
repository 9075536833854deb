//! Command line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "demoset.toml";

#[derive(Debug, Parser)]
#[command(
    name = "demoset",
    version,
    about = "Index esports match recordings into a SQLite catalog"
)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "DEMOSET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index every event directory under a dataset root
    Index(IndexArgs),
    /// List the distinct lineup team names of a manifest
    Teams(TeamsArgs),
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Dataset root (defaults to dataset.root from the configuration)
    pub root: Option<PathBuf>,

    /// Catalog database (defaults to database.path, then <root>/index.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write Prometheus metrics in text format to this file after the run
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TeamsArgs {
    /// Path to a manifest file
    pub manifest: PathBuf,

    /// Only list teams missing from the configured registry
    #[arg(long)]
    pub missing: bool,
}
