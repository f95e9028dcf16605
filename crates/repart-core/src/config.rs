//! Engine configuration and per-conversion options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::Strategy;

/// Default module label attached to audit events.
pub const DEFAULT_MODULE: &str = "repart";

/// Default identifier length limit of the target database.
pub const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 30;

/// Default DDL lock wait in seconds.
pub const DEFAULT_DDL_LOCK_TIMEOUT_SECS: u32 = 30;

/// Default number of retries after a lock-wait timeout.
pub const DEFAULT_LOCK_RETRY_LIMIT: u32 = 3;

/// Default pause between lock-wait retries in milliseconds.
pub const DEFAULT_LOCK_RETRY_BACKOFF_MS: u64 = 500;

/// Error codes reported by the database when a lock could not be acquired in time.
pub const DEFAULT_LOCK_TIMEOUT_CODES: [i32; 3] = [54, 4021, 30006];

/// Engine configuration, fixed for the lifetime of an orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Module label attached to every audit event.
    pub module: String,
    /// Longest identifier the target database accepts.
    pub max_identifier_length: usize,
    /// Session DDL lock wait, set once per run. `None` keeps the session default.
    pub ddl_lock_timeout_secs: Option<u32>,
    /// Retries after a lock-wait timeout for shadow creation, dependent copy and bulk load.
    pub lock_retry_limit: u32,
    /// Pause between lock-wait retries in milliseconds.
    pub lock_retry_backoff_ms: u64,
    /// Error codes classified as lock-wait timeouts.
    pub lock_timeout_codes: Vec<i32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            module: DEFAULT_MODULE.to_string(),
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
            ddl_lock_timeout_secs: Some(DEFAULT_DDL_LOCK_TIMEOUT_SECS),
            lock_retry_limit: DEFAULT_LOCK_RETRY_LIMIT,
            lock_retry_backoff_ms: DEFAULT_LOCK_RETRY_BACKOFF_MS,
            lock_timeout_codes: DEFAULT_LOCK_TIMEOUT_CODES.to_vec(),
        }
    }
}

impl EngineConfig {
    /// Set the audit module label.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Set the identifier length limit.
    pub fn with_max_identifier_length(mut self, length: usize) -> Self {
        self.max_identifier_length = length;
        self
    }

    /// Set the session DDL lock wait.
    pub fn with_ddl_lock_timeout(mut self, seconds: Option<u32>) -> Self {
        self.ddl_lock_timeout_secs = seconds;
        self
    }

    /// Set the lock-wait retry policy.
    pub fn with_lock_retry(mut self, limit: u32, backoff: Duration) -> Self {
        self.lock_retry_limit = limit;
        self.lock_retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Pause between lock-wait retries.
    pub fn lock_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.lock_retry_backoff_ms)
    }
}

/// Options for a single conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Strategy; chosen by the capability evaluator when unset.
    pub strategy: Option<Strategy>,
    /// Suffix of the shadow table and of replicated objects.
    pub shadow_suffix: String,
    /// Suffix of the original table after cutover.
    pub retired_suffix: String,
    /// Replicate check, unique and primary-key constraints.
    pub copy_constraints: bool,
    /// Recreate non-constraint indexes.
    pub copy_indexes: bool,
    /// Recreate triggers.
    pub copy_triggers: bool,
    /// Enable and validate replicated constraints before cutover.
    pub validate_constraints: bool,
    /// Upper bound on incremental re-sync passes.
    pub max_sync_iterations: u32,
    /// Drift (rows) at or below which a re-sync pass counts as converged.
    pub convergence_threshold: u64,
    /// Request parallel execution for the bulk copy and index builds.
    pub parallel: bool,
    /// Requested parallel degree.
    pub parallel_degree: u32,
    /// Recreate indexes as local partitioned indexes.
    pub local_indexes: bool,
    /// During name cleanup, move a retired-table object out of the way of its replacement.
    pub retire_conflicting_names: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            strategy: None,
            shadow_suffix: "_NEW".to_string(),
            retired_suffix: "_OLD".to_string(),
            copy_constraints: true,
            copy_indexes: true,
            copy_triggers: true,
            validate_constraints: true,
            max_sync_iterations: 3,
            convergence_threshold: 0,
            parallel: false,
            parallel_degree: 4,
            local_indexes: false,
            retire_conflicting_names: true,
        }
    }
}

impl ConversionOptions {
    /// Force a strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the shadow and retired suffixes.
    pub fn with_suffixes(mut self, shadow: impl Into<String>, retired: impl Into<String>) -> Self {
        self.shadow_suffix = shadow.into();
        self.retired_suffix = retired.into();
        self
    }

    /// Request parallel execution with the given degree.
    pub fn with_parallel(mut self, degree: u32) -> Self {
        self.parallel = true;
        self.parallel_degree = degree.max(1);
        self
    }

    /// Set the re-sync bound and convergence threshold.
    pub fn with_convergence(mut self, max_iterations: u32, threshold: u64) -> Self {
        self.max_sync_iterations = max_iterations;
        self.convergence_threshold = threshold;
        self
    }

    /// Skip dependent-object replication entirely.
    pub fn without_dependents(mut self) -> Self {
        self.copy_constraints = false;
        self.copy_indexes = false;
        self.copy_triggers = false;
        self
    }

    /// Parallel degree to request, if parallel execution is enabled.
    pub fn requested_degree(&self) -> Option<u32> {
        self.parallel.then_some(self.parallel_degree.max(1))
    }
}
