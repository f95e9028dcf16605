//! repart command-line surface.
//!
//! Validates conversion requests, renders layout definitions, evaluates
//! online capability and dry-runs whole conversions against a catalog
//! snapshot loaded into the in-memory database.

pub mod args;
pub mod commands;
pub mod error;
pub mod request;

pub use args::{Args, Command, OutputFormat, PlanArgs};
pub use commands::{run, Outcome, PlanReport};
pub use error::CliError;
pub use request::ConversionRequest;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "repart_cli=info,repart_core=info,repart::audit=info";
