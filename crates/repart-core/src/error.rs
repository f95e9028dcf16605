//! Conversion error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::executor::ExecutionFailure;
use crate::run::ConversionState;

/// Severity attached to audit events and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Statement-level detail.
    Debug,
    /// Progress.
    Info,
    /// Recoverable problem; the run continues.
    Warning,
    /// The run failed.
    Error,
    /// The table set is in an ambiguous state and needs an operator.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Classification of a failure, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Caller supplied an unusable specification.
    InvalidSpecification,
    /// Boundary ordering or content could not be rendered.
    GenerationFailure,
    /// A constraint, index or trigger could not be replicated.
    DependentObjectCopyFailure,
    /// A replicated constraint or trigger could not be enabled.
    ValidationFailure,
    /// Shadow creation or bulk copy failed.
    LoadFailure,
    /// Incremental re-sync did not converge.
    ConvergenceIncomplete,
    /// The rename pair failed.
    CutoverFailure,
    /// A post-cutover rename failed.
    CleanupFailure,
    /// A pre-condition of the run did not hold.
    PreflightFailure,
    /// The run was cancelled between steps.
    Cancelled,
    /// An unclassified fault.
    Unexpected,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Errors raised while converting a table.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    /// The partition specification is unusable.
    #[error("invalid partition specification: {reason}")]
    InvalidSpecification {
        /// What is wrong with the specification.
        reason: String,
    },

    /// The layout definition could not be generated.
    #[error("layout generation failed: {reason}")]
    GenerationFailure {
        /// What is wrong with the boundaries.
        reason: String,
    },

    /// A dependent object could not be replicated onto the shadow table.
    #[error("failed to copy {object} onto {table}: {source}")]
    DependentObjectCopy {
        /// Shadow table.
        table: String,
        /// Object being copied.
        object: String,
        /// Database failure.
        #[source]
        source: ExecutionFailure,
    },

    /// A replicated constraint or trigger could not be enabled.
    #[error("failed to enable {object} on {table}: {source}")]
    ConstraintValidation {
        /// Shadow table.
        table: String,
        /// Object being enabled.
        object: String,
        /// Database failure.
        #[source]
        source: ExecutionFailure,
    },

    /// Shadow creation or bulk copy failed.
    #[error("{stage} failed for {table}: {source}")]
    LoadFailure {
        /// Original table.
        table: String,
        /// Failed stage.
        stage: &'static str,
        /// Database failure.
        #[source]
        source: ExecutionFailure,
    },

    /// Incremental re-sync did not converge within the iteration bound.
    #[error("convergence incomplete for {table} after {iterations} pass(es): {detail}")]
    ConvergenceIncomplete {
        /// Original table.
        table: String,
        /// Passes run.
        iterations: u32,
        /// Why convergence stopped.
        detail: String,
    },

    /// One of the cutover renames failed.
    #[error(
        "cutover failed for {table} at `{statement}`: {source}; \
         manual intervention required, the rename pair may be half applied"
    )]
    CutoverFailure {
        /// Original table.
        table: String,
        /// Statement that failed.
        statement: String,
        /// Database failure.
        #[source]
        source: ExecutionFailure,
    },

    /// A post-cutover rename failed.
    #[error("failed to rename {object} on {table}: {source}")]
    CleanupFailure {
        /// Table owning the object.
        table: String,
        /// Object being renamed.
        object: String,
        /// Database failure.
        #[source]
        source: ExecutionFailure,
    },

    /// A pre-condition of the run did not hold.
    #[error("pre-flight check failed for {table}: {reason}")]
    Preflight {
        /// Original table.
        table: String,
        /// Which check failed.
        reason: String,
    },

    /// The run was cancelled between steps.
    #[error("conversion of {table} cancelled before {state}")]
    Cancelled {
        /// Original table.
        table: String,
        /// State that was not entered.
        state: ConversionState,
    },

    /// Catalog access failed where the run cannot proceed without it.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl ConversionError {
    /// Audit classification.
    pub fn kind(&self) -> FailureKind {
        match self {
            ConversionError::InvalidSpecification { .. } => FailureKind::InvalidSpecification,
            ConversionError::GenerationFailure { .. } => FailureKind::GenerationFailure,
            ConversionError::DependentObjectCopy { .. } => FailureKind::DependentObjectCopyFailure,
            ConversionError::ConstraintValidation { .. } => FailureKind::ValidationFailure,
            ConversionError::LoadFailure { .. } => FailureKind::LoadFailure,
            ConversionError::ConvergenceIncomplete { .. } => FailureKind::ConvergenceIncomplete,
            ConversionError::CutoverFailure { .. } => FailureKind::CutoverFailure,
            ConversionError::CleanupFailure { .. } => FailureKind::CleanupFailure,
            ConversionError::Preflight { .. } => FailureKind::PreflightFailure,
            ConversionError::Cancelled { .. } => FailureKind::Cancelled,
            ConversionError::Catalog(_) => FailureKind::Unexpected,
        }
    }

    /// Severity recorded in the audit trail.
    pub fn severity(&self) -> Severity {
        match self {
            ConversionError::DependentObjectCopy { .. }
            | ConversionError::ConstraintValidation { .. }
            | ConversionError::ConvergenceIncomplete { .. }
            | ConversionError::CleanupFailure { .. }
            | ConversionError::Cancelled { .. } => Severity::Warning,
            ConversionError::CutoverFailure { .. } => Severity::Critical,
            _ => Severity::Error,
        }
    }

    /// Whether the failure ends the run.
    pub fn is_fatal(&self) -> bool {
        self.severity() >= Severity::Error
    }

    /// Whether the failure is re-raised to the caller instead of becoming `false`.
    pub fn escalates(&self) -> bool {
        matches!(
            self,
            ConversionError::CutoverFailure { .. } | ConversionError::Catalog(_)
        )
    }

    /// Object named by the failure, if any.
    pub fn object(&self) -> Option<&str> {
        match self {
            ConversionError::DependentObjectCopy { object, .. }
            | ConversionError::ConstraintValidation { object, .. }
            | ConversionError::CleanupFailure { object, .. } => Some(object),
            _ => None,
        }
    }
}
