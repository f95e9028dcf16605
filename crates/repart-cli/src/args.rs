//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text; plans print as a SQL script
    Text,
    /// JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Online table re-partitioning
#[derive(Parser, Debug)]
#[command(name = "repart")]
#[command(version, about = "Online table re-partitioning", long_about = None)]
pub struct Args {
    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    /// Engine configuration file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a request's partition specification and boundary definitions
    Validate {
        /// Conversion request file (JSON)
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Print the layout definition a request produces
    Generate {
        /// Conversion request file (JSON)
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Decide whether a table can be converted online
    Capability {
        /// Conversion request file (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Catalog snapshot file (JSON)
        #[arg(short, long)]
        catalog: PathBuf,
    },

    /// Dry-run a conversion against a catalog snapshot
    Plan(PlanArgs),
}

/// Arguments of the `plan` subcommand.
#[derive(clap::Args, Debug)]
pub struct PlanArgs {
    /// Conversion request file (JSON)
    #[arg(short, long)]
    pub request: PathBuf,

    /// Catalog snapshot file (JSON)
    #[arg(short, long)]
    pub catalog: PathBuf,

    /// Run name cleanup after a successful conversion
    #[arg(long)]
    pub cleanup: bool,

    /// Merge statement issued once per re-sync pass of an online run
    #[arg(long)]
    pub sync_sql: Option<String>,

    /// Write the resulting catalog snapshot to this file
    #[arg(long)]
    pub output_catalog: Option<PathBuf>,
}
