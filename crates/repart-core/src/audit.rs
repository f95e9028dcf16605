//! Audit logging infrastructure.
//!
//! Every conversion step emits structured [`AuditEvent`]s to an
//! [`AuditLogger`]. Logging never fails a run; only `flush` reports errors.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::error::{ConversionError, FailureKind, Severity};

/// Counter for generating unique event IDs.
static EVENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique event ID using timestamp and counter.
fn generate_event_id(timestamp: &DateTime<Utc>) -> [u8; 16] {
    let counter = EVENT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut id = [0u8; 16];
    id[0..8].copy_from_slice(&timestamp.timestamp_micros().to_be_bytes());
    id[8..16].copy_from_slice(&counter.to_be_bytes());
    id
}

/// A structured audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub id: [u8; 16],
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: Severity,
    /// Module label from the engine configuration.
    pub module: String,
    /// Step or primitive that emitted the event, e.g. `bulk_load`.
    pub action: String,
    /// Table being converted.
    pub table: String,
    /// Object the event concerns, if narrower than the table.
    pub object: Option<String>,
    /// Failure classification for failure events.
    pub failure: Option<FailureKind>,
    /// Human-readable detail.
    pub message: String,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(
        level: Severity,
        module: impl Into<String>,
        action: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: generate_event_id(&timestamp),
            timestamp,
            level,
            module: module.into(),
            action: action.into(),
            table: table.into(),
            object: None,
            failure: None,
            message: message.into(),
        }
    }

    /// Create an info-level progress event.
    pub fn info(
        module: impl Into<String>,
        action: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Info, module, action, table, message)
    }

    /// Create an event describing a failure, at the failure's own severity.
    pub fn from_error(
        module: impl Into<String>,
        action: impl Into<String>,
        table: impl Into<String>,
        error: &ConversionError,
    ) -> Self {
        let mut event = Self::new(error.severity(), module, action, table, error.to_string());
        event.failure = Some(error.kind());
        event.object = error.object().map(str::to_string);
        event
    }

    /// Attach the object the event concerns.
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Event ID as lowercase hex.
    pub fn id_hex(&self) -> String {
        self.id.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Format the event as a log line.
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "{} id={} level={} module={} action={} table={}",
            self.timestamp.to_rfc3339(),
            self.id_hex(),
            self.level,
            self.module,
            self.action,
            self.table
        );
        if let Some(object) = &self.object {
            line.push_str(&format!(" object={object:?}"));
        }
        if let Some(failure) = self.failure {
            line.push_str(&format!(" failure={failure}"));
        }
        line.push_str(&format!(" message={:?}", self.message));
        line
    }
}

/// Trait for audit log backends.
pub trait AuditLogger: Send + Sync {
    /// Log an audit event.
    fn log(&self, event: AuditEvent);

    /// Flush any buffered events.
    fn flush(&self) -> Result<(), AuditError>;
}

/// Audit logging error.
#[derive(Debug, Error)]
#[error("audit error: {0}")]
pub struct AuditError(pub String);

/// In-memory audit logger, used by tests and the CLI dry run.
#[derive(Debug, Default)]
pub struct MemoryAuditLogger {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLogger {
    /// Create a new memory logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all logged events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Events classified with the given failure kind.
    pub fn failures(&self, kind: FailureKind) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.failure == Some(kind))
            .cloned()
            .collect()
    }

    /// Events at or above the given severity.
    pub fn at_least(&self, level: Severity) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.level >= level)
            .cloned()
            .collect()
    }

    /// Clear all events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AuditLogger for MemoryAuditLogger {
    fn log(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// No-op audit logger that discards all events.
#[derive(Debug, Default)]
pub struct NullAuditLogger;

impl AuditLogger for NullAuditLogger {
    fn log(&self, _event: AuditEvent) {
        // Discard
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Audit logger that forwards events to `tracing` under the `repart::audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log(&self, event: AuditEvent) {
        let line = event.to_log_line();
        match event.level {
            Severity::Debug => tracing::debug!(target: "repart::audit", "{line}"),
            Severity::Info => tracing::info!(target: "repart::audit", "{line}"),
            Severity::Warning => tracing::warn!(target: "repart::audit", "{line}"),
            Severity::Error | Severity::Critical => {
                tracing::error!(target: "repart::audit", "{line}")
            }
        }
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}
