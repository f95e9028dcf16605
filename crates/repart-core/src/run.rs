//! Conversion run state.
//!
//! A [`ConversionRun`] lives for one call: it tracks the state machine, the
//! per-step progress and every per-object outcome, and is handed back to the
//! caller as the run's report.

use chrono::{DateTime, Utc};

use crate::error::ConversionError;
use crate::model::{QualifiedName, Strategy};

/// State of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConversionState {
    /// Options, strategy and names resolved.
    Init,
    /// Shadow table exists with the new layout.
    ShadowCreated,
    /// Constraints, indexes and triggers replicated (best effort).
    DependentsCopied,
    /// Rows copied into the shadow table.
    BulkLoaded,
    /// Incremental re-sync finished (online only).
    Converged,
    /// Rename pair executed.
    Cutover,
    /// Conversion complete.
    Done,
    /// Suffixed object names cleaned up.
    NamesCleaned,
    /// Conversion failed.
    Failed,
}

impl std::fmt::Display for ConversionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionState::Init => write!(f, "init"),
            ConversionState::ShadowCreated => write!(f, "shadow_created"),
            ConversionState::DependentsCopied => write!(f, "dependents_copied"),
            ConversionState::BulkLoaded => write!(f, "bulk_loaded"),
            ConversionState::Converged => write!(f, "converged"),
            ConversionState::Cutover => write!(f, "cutover"),
            ConversionState::Done => write!(f, "done"),
            ConversionState::NamesCleaned => write!(f, "names_cleaned"),
            ConversionState::Failed => write!(f, "failed"),
        }
    }
}

/// Steps of the workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionStep {
    /// Pre-flight checks and session setup.
    Prepare,
    /// Create the shadow table.
    CreateShadow,
    /// Replicate dependent objects.
    CopyDependents,
    /// Copy all rows.
    BulkLoad,
    /// Re-sync changed rows.
    Converge,
    /// Enable replicated constraints and triggers.
    Validate,
    /// Swap names.
    Cutover,
}

impl std::fmt::Display for ConversionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionStep::Prepare => write!(f, "prepare"),
            ConversionStep::CreateShadow => write!(f, "create_shadow"),
            ConversionStep::CopyDependents => write!(f, "copy_dependents"),
            ConversionStep::BulkLoad => write!(f, "bulk_load"),
            ConversionStep::Converge => write!(f, "converge"),
            ConversionStep::Validate => write!(f, "validate"),
            ConversionStep::Cutover => write!(f, "cutover"),
        }
    }
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Step in progress.
    InProgress,
    /// Step completed successfully.
    Complete,
    /// Step completed with recoverable failures.
    Degraded,
    /// Step failed.
    Failed,
    /// Step was skipped.
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::InProgress => write!(f, "in_progress"),
            StepStatus::Complete => write!(f, "complete"),
            StepStatus::Degraded => write!(f, "degraded"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Progress of a single step.
#[derive(Debug, Clone)]
pub struct StepProgress {
    /// The step.
    pub step: ConversionStep,
    /// Current status.
    pub status: StepStatus,
    /// When the step started.
    pub started_at: DateTime<Utc>,
    /// When the step finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message if the step failed.
    pub error: Option<String>,
}

impl StepProgress {
    fn started(step: ConversionStep) -> Self {
        Self {
            step,
            status: StepStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    fn finish(&mut self, status: StepStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

/// Kind of a dependent object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependentKind {
    /// Table constraint.
    Constraint,
    /// Index.
    Index,
    /// Trigger.
    Trigger,
}

impl std::fmt::Display for DependentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependentKind::Constraint => write!(f, "constraint"),
            DependentKind::Index => write!(f, "index"),
            DependentKind::Trigger => write!(f, "trigger"),
        }
    }
}

/// Outcome of one best-effort per-object operation.
#[derive(Debug, Clone)]
pub struct ObjectOutcome {
    /// Object kind.
    pub kind: DependentKind,
    /// Name the operation produced (or tried to produce).
    pub name: String,
    /// Failure, if the operation failed.
    pub error: Option<ConversionError>,
}

impl ObjectOutcome {
    /// A successful outcome.
    pub fn ok(kind: DependentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            error: None,
        }
    }

    /// A failed outcome.
    pub fn failed(kind: DependentKind, name: impl Into<String>, error: ConversionError) -> Self {
        Self {
            kind,
            name: name.into(),
            error: Some(error),
        }
    }

    /// Whether the operation succeeded.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of the incremental re-sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvergenceOutcome {
    /// Passes run.
    pub iterations: u32,
    /// Whether a pass reached the convergence threshold.
    pub converged: bool,
    /// Drift reported by the last successful pass.
    pub last_drift: Option<u64>,
}

/// One conversion call, from entry to return.
#[derive(Debug, Clone)]
pub struct ConversionRun {
    /// Original table.
    pub table: QualifiedName,
    /// Shadow table name.
    pub shadow_name: QualifiedName,
    /// Name the original takes at cutover.
    pub retired_name: QualifiedName,
    /// Resolved strategy, once known.
    pub strategy: Option<Strategy>,
    /// Current state.
    pub state: ConversionState,
    /// Last state reached before a failure.
    pub last_good_state: ConversionState,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Rows copied by the bulk load.
    pub rows_copied: Option<u64>,
    /// Re-sync passes run.
    pub sync_iterations: u32,
    /// Whether the original was put into read-only mode and not yet released.
    pub original_locked: bool,
    /// Step progress, in execution order.
    pub steps: Vec<StepProgress>,
    /// Dependent-object replication outcomes.
    pub dependents: Vec<ObjectOutcome>,
    /// Constraint and trigger enable outcomes.
    pub validations: Vec<ObjectOutcome>,
    /// Re-sync result, online runs only.
    pub convergence: Option<ConvergenceOutcome>,
    /// Recoverable failures recorded during the run.
    pub warnings: Vec<ConversionError>,
    /// Terminal failure.
    pub error: Option<ConversionError>,
}

impl ConversionRun {
    /// Create a run in the `Init` state.
    pub fn new(table: QualifiedName, shadow_name: QualifiedName, retired_name: QualifiedName) -> Self {
        Self {
            table,
            shadow_name,
            retired_name,
            strategy: None,
            state: ConversionState::Init,
            last_good_state: ConversionState::Init,
            started_at: Utc::now(),
            completed_at: None,
            rows_copied: None,
            sync_iterations: 0,
            original_locked: false,
            steps: Vec::new(),
            dependents: Vec::new(),
            validations: Vec::new(),
            convergence: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Move to the next state.
    pub fn advance(&mut self, state: ConversionState) {
        self.state = state;
        self.last_good_state = state;
    }

    /// Record the start of a step.
    pub fn start_step(&mut self, step: ConversionStep) {
        self.steps.push(StepProgress::started(step));
    }

    /// Record the end of the current step.
    pub fn finish_step(&mut self, step: ConversionStep, status: StepStatus) {
        if let Some(progress) = self.step_mut(step) {
            progress.finish(status);
        }
    }

    /// Record a skipped step.
    pub fn skip_step(&mut self, step: ConversionStep) {
        let mut progress = StepProgress::started(step);
        progress.finish(StepStatus::Skipped);
        self.steps.push(progress);
    }

    /// Progress of a step, if it was started.
    pub fn step(&self, step: ConversionStep) -> Option<&StepProgress> {
        self.steps.iter().rev().find(|p| p.step == step)
    }

    fn step_mut(&mut self, step: ConversionStep) -> Option<&mut StepProgress> {
        self.steps.iter_mut().rev().find(|p| p.step == step)
    }

    /// Mark the run complete.
    pub fn complete(&mut self) {
        self.advance(ConversionState::Done);
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run failed.
    pub fn fail(&mut self, error: ConversionError) {
        let message = error.to_string();
        if let Some(progress) = self
            .steps
            .iter_mut()
            .rev()
            .find(|p| p.status == StepStatus::InProgress)
        {
            progress.finish(StepStatus::Failed);
            progress.error = Some(message);
        }
        self.state = ConversionState::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Whether the run ended in `Done`.
    pub fn succeeded(&self) -> bool {
        self.state == ConversionState::Done
    }

    /// Whether the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ConversionState::Done | ConversionState::Failed)
    }

    /// Failed dependent-object copies.
    pub fn failed_dependents(&self) -> impl Iterator<Item = &ObjectOutcome> {
        self.dependents.iter().filter(|o| !o.succeeded())
    }
}

/// Report of a name cleanup pass.
#[derive(Debug, Clone)]
pub struct CleanupReport {
    /// Canonical table.
    pub table: QualifiedName,
    /// One outcome per rename attempted, retired-side renames included.
    pub outcomes: Vec<ObjectOutcome>,
}

impl CleanupReport {
    /// Create an empty report.
    pub fn new(table: QualifiedName) -> Self {
        Self {
            table,
            outcomes: Vec::new(),
        }
    }

    /// Number of successful renames.
    pub fn renamed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    /// Failed renames.
    pub fn failures(&self) -> impl Iterator<Item = &ObjectOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    /// Whether nothing needed renaming.
    pub fn is_noop(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// State reached by the table after the pass.
    pub fn state(&self) -> ConversionState {
        ConversionState::NamesCleaned
    }
}
