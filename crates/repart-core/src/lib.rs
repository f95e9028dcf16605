//! repart core - online table re-partitioning.
//!
//! Converts a table from its current storage layout into a new partitioning
//! scheme while it stays available to application traffic, swapping the new
//! layout in with a brief two-rename cutover.
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | Partition specification and boundary definitions |
//! | [`ddl`] | Layout-definition generator and statement builders |
//! | [`capability`] | Decides whether the online strategy is legal |
//! | [`orchestrator`] | Drives shadow creation, copy, convergence and cutover |
//! | [`audit`] | Structured audit events and sinks |
//! | [`memory`] | In-memory database used for dry runs and tests |
//!
//! # Example
//!
//! ```ignore
//! use repart_core::{Repartitioner, PartitionSpec, PartitionMethod, BoundaryDefinition};
//!
//! let spec = PartitionSpec::single(PartitionMethod::Range, ["SALE_DATE"]);
//! let boundaries = vec![
//!     BoundaryDefinition::partition("P_2024_Q1").with_value("DATE '2024-04-01'"),
//!     BoundaryDefinition::partition("P_2024_Q2").with_value("DATE '2024-07-01'"),
//! ];
//! let converted = repartitioner.convert_to_single_level(&table, &spec, &boundaries, &options)?;
//! ```

pub mod audit;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod ddl;
pub mod error;
pub mod executor;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod repartitioner;
pub mod run;

pub use audit::{
    AuditError, AuditEvent, AuditLogger, MemoryAuditLogger, NullAuditLogger, TracingAuditLogger,
};
pub use capability::{CapabilityEvaluator, CapabilityReport, CapabilityRule};
pub use catalog::{
    CatalogError, CatalogReader, ColumnDef, ConstraintDef, ConstraintKind, CurrentLayout,
    IndexDef, TableDefinition, TriggerDef,
};
pub use config::{ConversionOptions, EngineConfig};
pub use ddl::{generate, LayoutDefinition, PartitionGroup, Statement, StatementKind};
pub use error::{ConversionError, FailureKind, Severity};
pub use executor::{
    ChangeTracker, ExecOutcome, ExecutionFailure, StatementChangeTracker, StatementExecutor,
    SyncPass,
};
pub use memory::{CatalogSnapshot, MemoryDatabase, PartitionSnapshot, TableSnapshot};
pub use model::{BoundaryDefinition, BoundaryLevel, PartitionMethod, PartitionSpec, QualifiedName, Strategy};
pub use orchestrator::ConversionOrchestrator;
pub use repartitioner::Repartitioner;
pub use run::{
    CleanupReport, ConversionRun, ConversionState, ConversionStep, ConvergenceOutcome,
    DependentKind, ObjectOutcome, StepProgress, StepStatus,
};
