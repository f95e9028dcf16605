//! Conversion request files.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use repart_core::{BoundaryDefinition, ConversionOptions, PartitionSpec, QualifiedName};

use crate::error::CliError;

/// One table conversion, as read from a request file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Table to convert.
    pub table: QualifiedName,
    /// Target partitioning scheme.
    pub spec: PartitionSpec,
    /// Ordered boundary definitions.
    #[serde(default)]
    pub boundaries: Vec<BoundaryDefinition>,
    /// Per-conversion options.
    #[serde(default)]
    pub options: ConversionOptions,
}

impl ConversionRequest {
    /// Read a request from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        read_json(path)
    }
}

/// Read and decode a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
