//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the command-line surface.
#[derive(Debug, Error)]
pub enum CliError {
    /// An input file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An input file is not valid JSON for its expected shape.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// An output file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// File path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Output could not be rendered as JSON.
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}
