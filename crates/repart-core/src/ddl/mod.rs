//! DDL generation.
//!
//! [`layout`] renders the partitioning clause of the shadow table;
//! [`statement`] builds every other statement the orchestrator issues;
//! [`naming`] derives shadow, retired and replicated object names.

pub mod layout;
pub mod naming;
pub mod statement;

pub use layout::{generate, BoundaryClause, LayoutDefinition, PartitionGroup};
pub use statement::{Statement, StatementKind};
