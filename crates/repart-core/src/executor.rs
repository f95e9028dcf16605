//! Statement execution and change-tracking interfaces.

use thiserror::Error;

use crate::ddl::Statement;
use crate::run::ConversionRun;

/// Result of a successfully executed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    /// Rows inserted, updated or deleted. Zero for DDL.
    pub rows_affected: u64,
}

impl ExecOutcome {
    /// Outcome of a statement that touched no rows.
    pub fn ddl() -> Self {
        Self::default()
    }

    /// Outcome of a DML statement.
    pub fn rows(rows_affected: u64) -> Self {
        Self { rows_affected }
    }
}

/// Structured failure reported by the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("database error {code}: {message}")]
pub struct ExecutionFailure {
    /// Database error code.
    pub code: i32,
    /// Database error message.
    pub message: String,
}

impl ExecutionFailure {
    /// Create a failure.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether the failure is a lock-wait timeout under the given code set.
    pub fn is_lock_timeout(&self, codes: &[i32]) -> bool {
        codes.contains(&self.code)
    }
}

/// Executes one statement against the target database.
///
/// Implementations neither retry nor log; both are the orchestrator's job.
pub trait StatementExecutor: Send + Sync {
    /// Execute the statement and commit it.
    fn execute(&self, statement: &Statement) -> Result<ExecOutcome, ExecutionFailure>;
}

/// Result of one incremental re-sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncPass {
    /// Rows copied or corrected by the pass.
    pub rows_changed: u64,
}

/// Copies rows changed on the original table since the bulk load.
///
/// Change tracking is table-specific, so the caller supplies it.
pub trait ChangeTracker: Send + Sync {
    /// Run one re-sync pass from `run.table` into `run.shadow_name`.
    fn sync(
        &self,
        executor: &dyn StatementExecutor,
        run: &ConversionRun,
    ) -> Result<SyncPass, ExecutionFailure>;
}

/// Change tracker that runs a caller-written merge statement each pass and
/// reports its affected-row count as the drift.
#[derive(Debug, Clone)]
pub struct StatementChangeTracker {
    sql: String,
}

impl StatementChangeTracker {
    /// Create a tracker from the merge statement text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }
}

impl ChangeTracker for StatementChangeTracker {
    fn sync(
        &self,
        executor: &dyn StatementExecutor,
        _run: &ConversionRun,
    ) -> Result<SyncPass, ExecutionFailure> {
        let outcome = executor.execute(&Statement::raw(self.sql.clone()))?;
        Ok(SyncPass {
            rows_changed: outcome.rows_affected,
        })
    }
}
