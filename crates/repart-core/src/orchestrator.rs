//! Conversion orchestrator.
//!
//! Drives one table through shadow creation, dependent-object replication,
//! bulk load, incremental re-sync, validation and the two-rename cutover.
//!
//! Failure handling differs per step:
//!
//! | Step | On failure |
//! |------|------------|
//! | pre-flight, shadow creation, bulk load | run fails, shadow table retained |
//! | dependent copy, validation, name cleanup | warning per object, run continues |
//! | convergence | warning, cutover proceeds |
//! | cutover | critical, returned to the caller as an error |

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::audit::{AuditEvent, AuditLogger};
use crate::capability::CapabilityEvaluator;
use crate::catalog::{CatalogReader, ConstraintDef, ConstraintKind, TableDefinition};
use crate::config::{ConversionOptions, EngineConfig};
use crate::ddl::naming::{strip_suffix, suffixed};
use crate::ddl::{generate, LayoutDefinition, Statement};
use crate::error::ConversionError;
use crate::executor::{ChangeTracker, ExecOutcome, ExecutionFailure, StatementExecutor};
use crate::model::{BoundaryDefinition, PartitionMethod, PartitionSpec, QualifiedName, Strategy};
use crate::run::{
    CleanupReport, ConversionRun, ConversionState, ConversionStep, ConvergenceOutcome,
    DependentKind, ObjectOutcome, StepStatus,
};

/// Facts resolved before any statement that changes the database runs.
struct Prepared {
    definition: TableDefinition,
    layout: LayoutDefinition,
    embedded: Option<ConstraintDef>,
}

/// Drives table conversions against a database.
pub struct ConversionOrchestrator {
    executor: Arc<dyn StatementExecutor>,
    catalog: Arc<dyn CatalogReader>,
    audit: Arc<dyn AuditLogger>,
    config: EngineConfig,
    tracker: Option<Arc<dyn ChangeTracker>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ConversionOrchestrator {
    /// Create an orchestrator over its collaborators.
    pub fn new(
        executor: Arc<dyn StatementExecutor>,
        catalog: Arc<dyn CatalogReader>,
        audit: Arc<dyn AuditLogger>,
        config: EngineConfig,
    ) -> Self {
        Self {
            executor,
            catalog,
            audit,
            config,
            tracker: None,
            cancel: None,
        }
    }

    /// Use `tracker` for incremental re-sync of online conversions.
    pub fn with_change_tracker(mut self, tracker: Arc<dyn ChangeTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Cancel runs between steps once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Catalog reader.
    pub fn catalog(&self) -> &dyn CatalogReader {
        self.catalog.as_ref()
    }

    /// Shadow table name for `table`.
    pub fn shadow_name(&self, table: &QualifiedName, options: &ConversionOptions) -> QualifiedName {
        table.sibling(suffixed(
            &table.name,
            &options.shadow_suffix,
            self.config.max_identifier_length,
        ))
    }

    /// Name `table` takes at cutover.
    pub fn retired_name(&self, table: &QualifiedName, options: &ConversionOptions) -> QualifiedName {
        table.sibling(suffixed(
            &table.name,
            &options.retired_suffix,
            self.config.max_identifier_length,
        ))
    }

    /// Convert `table` into the layout described by `spec` and `boundaries`.
    ///
    /// Expected failures end the run in `Failed` and come back inside the
    /// returned run. Cutover failures and catalog faults are returned as
    /// errors.
    #[instrument(skip_all, fields(table = %table))]
    pub fn run_conversion(
        &self,
        table: &QualifiedName,
        spec: &PartitionSpec,
        boundaries: &[BoundaryDefinition],
        options: &ConversionOptions,
    ) -> Result<ConversionRun, ConversionError> {
        let mut run = ConversionRun::new(
            table.clone(),
            self.shadow_name(table, options),
            self.retired_name(table, options),
        );
        info!(shadow = %run.shadow_name, retired = %run.retired_name, "Conversion started");

        match self.drive(&mut run, spec, boundaries, options) {
            Ok(()) => {
                run.complete();
                info!(
                    rows_copied = run.rows_copied.unwrap_or(0),
                    warnings = run.warnings.len(),
                    "Conversion completed"
                );
                self.audit_info(&run, ConversionStep::Cutover, "conversion completed");
                self.flush_audit();
                Ok(run)
            }
            Err(e) => {
                // Cancellation happens between steps, so fall back to the last one run.
                let step = run
                    .steps
                    .iter()
                    .rev()
                    .find(|p| p.status == StepStatus::InProgress)
                    .or_else(|| run.steps.last())
                    .map(|p| p.step)
                    .unwrap_or(ConversionStep::Prepare);
                if run.original_locked && !matches!(e, ConversionError::CutoverFailure { .. }) {
                    self.release_original(&mut run);
                }
                if e.escalates() {
                    error!(step = %step, error = %e, "Conversion failed, escalating");
                } else {
                    warn!(step = %step, error = %e, "Conversion failed");
                }
                self.audit.log(AuditEvent::from_error(
                    &self.config.module,
                    step.to_string(),
                    run.table.to_string(),
                    &e,
                ));
                self.flush_audit();
                let escalate = e.escalates();
                run.fail(e.clone());
                if escalate {
                    Err(e)
                } else {
                    Ok(run)
                }
            }
        }
    }

    fn drive(
        &self,
        run: &mut ConversionRun,
        spec: &PartitionSpec,
        boundaries: &[BoundaryDefinition],
        options: &ConversionOptions,
    ) -> Result<(), ConversionError> {
        let prepared = self.prepare(run, spec, boundaries, options)?;

        self.checkpoint(run, ConversionState::ShadowCreated)?;
        self.create_shadow(run, &prepared)?;

        self.checkpoint(run, ConversionState::DependentsCopied)?;
        self.copy_dependents(run, options)?;

        self.checkpoint(run, ConversionState::BulkLoaded)?;
        self.bulk_load(run, options)?;

        if run.strategy == Some(Strategy::Online) {
            self.checkpoint(run, ConversionState::Converged)?;
            self.converge(run, options);
        } else {
            run.skip_step(ConversionStep::Converge);
        }

        self.validate(run, options);

        self.checkpoint(run, ConversionState::Cutover)?;
        self.cutover(run)
    }

    fn checkpoint(&self, run: &ConversionRun, next: ConversionState) -> Result<(), ConversionError> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return Err(ConversionError::Cancelled {
                table: run.table.to_string(),
                state: next,
            });
        }
        Ok(())
    }

    /// Resolve strategy, validate the request and check that the run can start.
    fn prepare(
        &self,
        run: &mut ConversionRun,
        spec: &PartitionSpec,
        boundaries: &[BoundaryDefinition],
        options: &ConversionOptions,
    ) -> Result<Prepared, ConversionError> {
        run.start_step(ConversionStep::Prepare);
        spec.validate()?;

        let table = run.table.clone();
        let preflight = |reason: String| ConversionError::Preflight {
            table: table.to_string(),
            reason,
        };
        if options.shadow_suffix.is_empty() || options.retired_suffix.is_empty() {
            return Err(preflight("shadow and retired suffixes must not be empty".to_string()));
        }
        if run.shadow_name.name.eq_ignore_ascii_case(&run.retired_name.name) {
            return Err(preflight(format!(
                "shadow and retired tables would share the name {}",
                run.shadow_name.name
            )));
        }
        if !self.catalog.object_exists(&table)? {
            return Err(preflight("table does not exist".to_string()));
        }
        for taken in [&run.shadow_name, &run.retired_name] {
            if self.catalog.object_exists(taken)? {
                return Err(preflight(format!("{taken} already exists")));
            }
        }

        let strategy = match options.strategy {
            Some(strategy) => strategy,
            None if CapabilityEvaluator::new(self.catalog.as_ref()).can_convert_online(&table, spec) => {
                Strategy::Online
            }
            None => Strategy::Offline,
        };
        run.strategy = Some(strategy);

        let definition = self.catalog.table_definition(&table)?;

        // A REFERENCE layout names its parent constraint, which has to exist
        // on the shadow table at creation time under a shadow-suffixed name.
        let (spec, embedded) = match spec.partition_method {
            Some(PartitionMethod::Reference) => {
                let constraint_name = spec.partition_key.first().cloned().unwrap_or_default();
                let parent = self
                    .catalog
                    .constraints(&table)?
                    .into_iter()
                    .find(|c| {
                        c.name.eq_ignore_ascii_case(&constraint_name)
                            && matches!(c.kind, ConstraintKind::ForeignKey { .. })
                    })
                    .ok_or_else(|| {
                        preflight(format!("referential constraint {constraint_name} not found"))
                    })?;
                let embedded = parent.renamed(self.shadow_object_name(&parent.name, options));
                let mut spec = spec.clone();
                spec.partition_key = vec![embedded.name.clone()];
                (Cow::Owned(spec), Some(embedded))
            }
            _ => (Cow::Borrowed(spec), None),
        };
        let layout = generate(&spec, boundaries)?;
        debug!(
            partitions = layout.partition_count(),
            subpartitions = layout.subpartition_count(),
            "Layout generated"
        );

        if let Some(seconds) = self.config.ddl_lock_timeout_secs {
            if let Err(e) = self.execute(&Statement::set_ddl_lock_timeout(seconds)) {
                warn!(error = %e, "Could not set DDL lock timeout, keeping session default");
            }
        }

        run.finish_step(ConversionStep::Prepare, StepStatus::Complete);
        self.audit_info(
            run,
            ConversionStep::Prepare,
            format!("strategy {strategy}, shadow {}", run.shadow_name),
        );
        Ok(Prepared {
            definition,
            layout,
            embedded,
        })
    }

    #[instrument(skip_all, fields(shadow = %run.shadow_name))]
    fn create_shadow(&self, run: &mut ConversionRun, prepared: &Prepared) -> Result<(), ConversionError> {
        run.start_step(ConversionStep::CreateShadow);
        let statement = Statement::create_table(
            &run.shadow_name,
            &prepared.definition,
            &prepared.layout,
            prepared.embedded.as_ref(),
        );
        self.execute_with_retry(&statement)
            .map_err(|source| ConversionError::LoadFailure {
                table: run.table.to_string(),
                stage: "shadow creation",
                source,
            })?;

        run.finish_step(ConversionStep::CreateShadow, StepStatus::Complete);
        run.advance(ConversionState::ShadowCreated);
        self.audit_info(
            run,
            ConversionStep::CreateShadow,
            format!("created {} with {} partition(s)", run.shadow_name, prepared.layout.partition_count()),
        );
        Ok(())
    }

    /// Replicate constraints, indexes and triggers onto the shadow table.
    #[instrument(skip_all, fields(shadow = %run.shadow_name))]
    fn copy_dependents(
        &self,
        run: &mut ConversionRun,
        options: &ConversionOptions,
    ) -> Result<(), ConversionError> {
        run.start_step(ConversionStep::CopyDependents);
        let shadow = run.shadow_name.clone();
        let mut work: Vec<(DependentKind, String, String, Statement)> = Vec::new();

        if options.copy_constraints {
            for constraint in self.catalog.constraints(&run.table)? {
                if !constraint.is_replicated() {
                    debug!(constraint = %constraint.name, "Referential constraint stays on the original");
                    continue;
                }
                let copy = constraint.renamed(self.shadow_object_name(&constraint.name, options));
                work.push((
                    DependentKind::Constraint,
                    copy.label(),
                    copy.name.clone(),
                    Statement::add_constraint(&shadow, &copy),
                ));
            }
        }

        let degree = options.requested_degree();
        let mut parallel_indexes = Vec::new();
        if options.copy_indexes {
            for index in self.catalog.indexes(&run.table)? {
                // Backing indexes come back when the constraint is enabled.
                if index.constraint_backed {
                    continue;
                }
                let copy = index.renamed(self.shadow_object_name(&index.name, options));
                if degree.is_some() {
                    parallel_indexes.push(shadow.sibling(copy.name.as_str()));
                }
                work.push((
                    DependentKind::Index,
                    format!("index {}", copy.name),
                    copy.name.clone(),
                    Statement::create_index(&shadow, &copy, options.local_indexes, degree),
                ));
            }
        }

        if options.copy_triggers {
            for trigger in self.catalog.triggers(&run.table)? {
                let copy = trigger.renamed(self.shadow_object_name(&trigger.name, options));
                work.push((
                    DependentKind::Trigger,
                    format!("trigger {}", copy.name),
                    copy.name.clone(),
                    Statement::create_trigger(&shadow, &copy),
                ));
            }
        }

        let outcomes: Vec<ObjectOutcome> = work
            .into_iter()
            .map(|(kind, label, name, statement)| {
                match self.execute_with_retry(&statement) {
                    Ok(_) => ObjectOutcome::ok(kind, name),
                    Err(source) => ObjectOutcome::failed(
                        kind,
                        name,
                        ConversionError::DependentObjectCopy {
                            table: shadow.to_string(),
                            object: label,
                            source,
                        },
                    ),
                }
            })
            .collect();

        for index in parallel_indexes {
            let built = outcomes
                .iter()
                .any(|o| o.kind == DependentKind::Index && o.succeeded() && o.name == index.name);
            if built {
                if let Err(e) = self.execute(&Statement::reset_index_parallel(&index)) {
                    warn!(index = %index, error = %e, "Could not reset index to NOPARALLEL");
                }
            }
        }

        let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
        for outcome in &outcomes {
            if let Some(e) = &outcome.error {
                self.audit_warning(run, ConversionStep::CopyDependents, e.clone());
            }
        }
        let copied = outcomes.len() - failed;
        run.dependents = outcomes;

        run.finish_step(
            ConversionStep::CopyDependents,
            if failed == 0 { StepStatus::Complete } else { StepStatus::Degraded },
        );
        run.advance(ConversionState::DependentsCopied);
        info!(copied, failed, "Dependent objects replicated");
        self.audit_info(
            run,
            ConversionStep::CopyDependents,
            format!("{copied} dependent object(s) copied, {failed} failed"),
        );
        Ok(())
    }

    #[instrument(skip_all, fields(shadow = %run.shadow_name))]
    fn bulk_load(&self, run: &mut ConversionRun, options: &ConversionOptions) -> Result<(), ConversionError> {
        run.start_step(ConversionStep::BulkLoad);
        let table = run.table.to_string();
        let load_failure = |stage: &'static str, source: ExecutionFailure| ConversionError::LoadFailure {
            table: table.clone(),
            stage,
            source,
        };

        if run.strategy == Some(Strategy::Offline) {
            self.execute_with_retry(&Statement::set_read_only(&run.table, true))
                .map_err(|source| load_failure("read-only switch", source))?;
            run.original_locked = true;
            debug!("Original table switched to read-only");
        }

        let degree = options.requested_degree();
        if degree.is_some() {
            if let Err(e) = self.execute(&Statement::enable_parallel_dml()) {
                warn!(error = %e, "Could not enable parallel DML, copy may run serially");
            }
        }

        let outcome = self
            .execute_with_retry(&Statement::copy_rows(&run.table, &run.shadow_name, degree))
            .map_err(|source| load_failure("bulk copy", source))?;
        run.rows_copied = Some(outcome.rows_affected);

        run.finish_step(ConversionStep::BulkLoad, StepStatus::Complete);
        run.advance(ConversionState::BulkLoaded);
        info!(rows = outcome.rows_affected, "Bulk load completed");
        self.audit_info(
            run,
            ConversionStep::BulkLoad,
            format!("copied {} row(s)", outcome.rows_affected),
        );
        Ok(())
    }

    /// Re-sync rows changed since the bulk load until drift falls to the threshold.
    #[instrument(skip_all, fields(shadow = %run.shadow_name))]
    fn converge(&self, run: &mut ConversionRun, options: &ConversionOptions) {
        run.start_step(ConversionStep::Converge);
        let mut outcome = ConvergenceOutcome::default();
        let mut detail = None;

        match &self.tracker {
            None => detail = Some("no change tracker supplied".to_string()),
            Some(tracker) => {
                while outcome.iterations < options.max_sync_iterations {
                    outcome.iterations += 1;
                    match tracker.sync(self.executor.as_ref(), run) {
                        Ok(pass) => {
                            debug!(pass = outcome.iterations, rows = pass.rows_changed, "Re-sync pass");
                            outcome.last_drift = Some(pass.rows_changed);
                            if pass.rows_changed <= options.convergence_threshold {
                                outcome.converged = true;
                                break;
                            }
                        }
                        Err(e) => {
                            detail = Some(format!("re-sync pass {} failed: {e}", outcome.iterations));
                            break;
                        }
                    }
                }
            }
        }
        run.sync_iterations = outcome.iterations;
        run.convergence = Some(outcome);

        if outcome.converged {
            run.finish_step(ConversionStep::Converge, StepStatus::Complete);
            self.audit_info(
                run,
                ConversionStep::Converge,
                format!("converged after {} pass(es)", outcome.iterations),
            );
        } else {
            let detail = detail.unwrap_or_else(|| match outcome.last_drift {
                Some(drift) => format!("drift of {drift} row(s) remains"),
                None => "no re-sync passes allowed".to_string(),
            });
            run.finish_step(ConversionStep::Converge, StepStatus::Degraded);
            let warning = ConversionError::ConvergenceIncomplete {
                table: run.table.to_string(),
                iterations: outcome.iterations,
                detail,
            };
            self.audit_warning(run, ConversionStep::Converge, warning);
        }
        run.advance(ConversionState::Converged);
    }

    /// Enable replicated constraints and triggers on the shadow table.
    #[instrument(skip_all, fields(shadow = %run.shadow_name))]
    fn validate(&self, run: &mut ConversionRun, options: &ConversionOptions) {
        run.start_step(ConversionStep::Validate);
        let shadow = run.shadow_name.clone();
        let created = |kind: DependentKind| -> Vec<String> {
            run.dependents
                .iter()
                .filter(|o| o.kind == kind && o.succeeded())
                .map(|o| o.name.clone())
                .collect()
        };

        let mut work: Vec<(DependentKind, String, Statement)> = Vec::new();
        if options.validate_constraints {
            for name in created(DependentKind::Constraint) {
                let statement = Statement::enable_constraint(&shadow, &name);
                work.push((DependentKind::Constraint, name, statement));
            }
        } else {
            debug!("Constraint validation disabled, replicated constraints stay DISABLE NOVALIDATE");
        }
        for name in created(DependentKind::Trigger) {
            let statement = Statement::enable_trigger(&shadow.sibling(name.as_str()));
            work.push((DependentKind::Trigger, name, statement));
        }

        let outcomes: Vec<ObjectOutcome> = work
            .into_iter()
            .map(|(kind, name, statement)| match self.execute(&statement) {
                Ok(_) => ObjectOutcome::ok(kind, name),
                Err(source) => {
                    let error = ConversionError::ConstraintValidation {
                        table: shadow.to_string(),
                        object: format!("{kind} {name}"),
                        source,
                    };
                    ObjectOutcome::failed(kind, name, error)
                }
            })
            .collect();

        let mut failed = 0;
        for outcome in &outcomes {
            if let Some(e) = &outcome.error {
                failed += 1;
                self.audit_warning(run, ConversionStep::Validate, e.clone());
            }
        }
        let enabled = outcomes.len() - failed;
        run.validations = outcomes;
        run.finish_step(
            ConversionStep::Validate,
            if failed == 0 { StepStatus::Complete } else { StepStatus::Degraded },
        );
        self.audit_info(
            run,
            ConversionStep::Validate,
            format!("{enabled} object(s) enabled, {failed} failed"),
        );
    }

    /// Swap names: original to retired, shadow to original. Never retried.
    #[instrument(skip_all, fields(shadow = %run.shadow_name))]
    fn cutover(&self, run: &mut ConversionRun) -> Result<(), ConversionError> {
        run.start_step(ConversionStep::Cutover);
        let renames = [
            Statement::rename_table(&run.table, &run.retired_name.name),
            Statement::rename_table(&run.shadow_name, &run.table.name),
        ];
        for statement in &renames {
            self.execute(statement)
                .map_err(|source| ConversionError::CutoverFailure {
                    table: run.table.to_string(),
                    statement: statement.sql().to_string(),
                    source,
                })?;
        }
        run.finish_step(ConversionStep::Cutover, StepStatus::Complete);
        run.advance(ConversionState::Cutover);
        info!(retired = %run.retired_name, "Cutover completed");
        Ok(())
    }

    /// Put the original back into read-write mode after a failed offline run.
    fn release_original(&self, run: &mut ConversionRun) {
        match self.execute(&Statement::set_read_only(&run.table, false)) {
            Ok(_) => {
                run.original_locked = false;
                info!("Original table restored to read-write");
            }
            Err(e) => error!(error = %e, "Could not restore original table to read-write"),
        }
    }

    /// Strip the shadow suffix from every constraint, index and trigger of `table`.
    ///
    /// When `retire_conflicting_names` is set, an object on the retired table
    /// that already holds the stripped name is first renamed with the retired
    /// suffix. Running the pass again on a cleaned table does nothing.
    #[instrument(skip_all, fields(table = %table))]
    pub fn cleanup_names(
        &self,
        table: &QualifiedName,
        options: &ConversionOptions,
    ) -> Result<CleanupReport, ConversionError> {
        let retired = self.retired_name(table, options);
        let has_retired = self.catalog.object_exists(&retired)?;

        let mut groups = Vec::with_capacity(3);
        for kind in [DependentKind::Constraint, DependentKind::Index, DependentKind::Trigger] {
            let canonical = self.object_names(table, kind)?;
            let retired_names = if has_retired {
                self.object_names(&retired, kind)?
            } else {
                Vec::new()
            };
            groups.push((kind, canonical, retired_names));
        }

        let mut report = CleanupReport::new(table.clone());
        for (kind, canonical, retired_names) in groups {
            for name in canonical {
                let Some(original) = self.original_name(&name, &retired_names, options) else {
                    continue;
                };
                if options.retire_conflicting_names && retired_names.iter().any(|r| r == original) {
                    let moved = suffixed(original, &options.retired_suffix, self.config.max_identifier_length);
                    report
                        .outcomes
                        .push(self.rename_object(&retired, kind, original, &moved));
                }
                report.outcomes.push(self.rename_object(table, kind, &name, original));
            }
        }

        for outcome in &report.outcomes {
            if let Some(e) = &outcome.error {
                warn!(error = %e, "Name cleanup skipped an object");
                self.audit.log(AuditEvent::from_error(
                    &self.config.module,
                    "cleanup_names",
                    table.to_string(),
                    e,
                ));
            }
        }
        let renamed = report.renamed();
        let failed = report.failures().count();
        info!(renamed, failed, "Name cleanup completed");
        self.audit.log(AuditEvent::info(
            &self.config.module,
            "cleanup_names",
            table.to_string(),
            format!("{renamed} object(s) renamed, {failed} failed"),
        ));
        self.flush_audit();
        Ok(report)
    }

    /// Drop the retired table left behind by a conversion.
    ///
    /// Returns `false` when there is no retired table or the drop fails.
    #[instrument(skip_all, fields(table = %table))]
    pub fn drop_retired(
        &self,
        table: &QualifiedName,
        options: &ConversionOptions,
    ) -> Result<bool, ConversionError> {
        let retired = self.retired_name(table, options);
        if !self.catalog.object_exists(&retired)? {
            info!(retired = %retired, "No retired table to drop");
            return Ok(false);
        }
        let dropped = match self.execute(&Statement::drop_table(&retired)) {
            Ok(_) => {
                info!(retired = %retired, "Retired table dropped");
                self.audit.log(
                    AuditEvent::info(
                        &self.config.module,
                        "drop_retired",
                        table.to_string(),
                        "retired table dropped",
                    )
                    .with_object(retired.to_string()),
                );
                true
            }
            Err(source) => {
                let e = ConversionError::CleanupFailure {
                    table: table.to_string(),
                    object: format!("table {retired}"),
                    source,
                };
                warn!(error = %e, "Could not drop retired table");
                self.audit.log(AuditEvent::from_error(
                    &self.config.module,
                    "drop_retired",
                    table.to_string(),
                    &e,
                ));
                false
            }
        };
        self.flush_audit();
        Ok(dropped)
    }

    /// Record a request rejected before the workflow started.
    pub(crate) fn reject(&self, table: &QualifiedName, error: ConversionError) -> bool {
        warn!(table = %table, error = %error, "Conversion request rejected");
        self.audit.log(AuditEvent::from_error(
            &self.config.module,
            ConversionStep::Prepare.to_string(),
            table.to_string(),
            &error,
        ));
        self.flush_audit();
        false
    }

    /// Record a fault raised before the workflow started and hand it back.
    pub(crate) fn escalate(&self, table: &QualifiedName, error: ConversionError) -> ConversionError {
        error!(table = %table, error = %error, "Conversion request failed, escalating");
        self.audit.log(AuditEvent::from_error(
            &self.config.module,
            ConversionStep::Prepare.to_string(),
            table.to_string(),
            &error,
        ));
        self.flush_audit();
        error
    }

    fn object_names(&self, table: &QualifiedName, kind: DependentKind) -> Result<Vec<String>, ConversionError> {
        let names = match kind {
            DependentKind::Constraint => self
                .catalog
                .constraints(table)?
                .into_iter()
                .map(|c| c.name)
                .collect(),
            DependentKind::Index => self
                .catalog
                .indexes(table)?
                .into_iter()
                .map(|i| i.name)
                .collect(),
            DependentKind::Trigger => self
                .catalog
                .triggers(table)?
                .into_iter()
                .map(|t| t.name)
                .collect(),
        };
        Ok(names)
    }

    fn rename_object(&self, table: &QualifiedName, kind: DependentKind, from: &str, to: &str) -> ObjectOutcome {
        let statement = match kind {
            DependentKind::Constraint => Statement::rename_constraint(table, from, to),
            DependentKind::Index => Statement::rename_index(&table.sibling(from), to),
            DependentKind::Trigger => Statement::rename_trigger(&table.sibling(from), to),
        };
        match self.execute(&statement) {
            Ok(_) => {
                debug!(kind = %kind, from, to, "Renamed");
                ObjectOutcome::ok(kind, to)
            }
            Err(source) => ObjectOutcome::failed(
                kind,
                to,
                ConversionError::CleanupFailure {
                    table: table.to_string(),
                    object: format!("{kind} {from}"),
                    source,
                },
            ),
        }
    }

    /// Name a shadow-suffixed object had before replication.
    ///
    /// Truncation can shorten the base of a suffixed name, so an object on the
    /// retired table whose suffixed name matches wins over plain stripping.
    fn original_name<'a>(
        &self,
        name: &'a str,
        retired_names: &'a [String],
        options: &ConversionOptions,
    ) -> Option<&'a str> {
        let stripped = strip_suffix(name, &options.shadow_suffix)?;
        let original = retired_names
            .iter()
            .find(|r| self.shadow_object_name(r, options).eq_ignore_ascii_case(name))
            .map_or(stripped, String::as_str);
        Some(original)
    }

    fn shadow_object_name(&self, name: &str, options: &ConversionOptions) -> String {
        suffixed(name, &options.shadow_suffix, self.config.max_identifier_length)
    }

    fn execute(&self, statement: &Statement) -> Result<ExecOutcome, ExecutionFailure> {
        debug!(sql = %statement, "Executing");
        self.executor.execute(statement)
    }

    /// Execute, retrying lock-wait timeouts under the configured policy.
    fn execute_with_retry(&self, statement: &Statement) -> Result<ExecOutcome, ExecutionFailure> {
        let mut attempt = 0;
        loop {
            match self.execute(statement) {
                Err(failure)
                    if attempt < self.config.lock_retry_limit
                        && failure.is_lock_timeout(&self.config.lock_timeout_codes) =>
                {
                    attempt += 1;
                    warn!(attempt, code = failure.code, "Lock wait timed out, retrying");
                    std::thread::sleep(self.config.lock_retry_backoff());
                }
                result => return result,
            }
        }
    }

    fn audit_info(&self, run: &ConversionRun, step: ConversionStep, message: impl Into<String>) {
        self.audit.log(AuditEvent::info(
            &self.config.module,
            step.to_string(),
            run.table.to_string(),
            message,
        ));
    }

    fn audit_warning(&self, run: &mut ConversionRun, step: ConversionStep, error: ConversionError) {
        warn!(step = %step, error = %error, "Recoverable failure");
        self.audit.log(AuditEvent::from_error(
            &self.config.module,
            step.to_string(),
            run.table.to_string(),
            &error,
        ));
        run.warnings.push(error);
    }

    fn flush_audit(&self) {
        if let Err(e) = self.audit.flush() {
            warn!(error = %e, "Audit flush failed");
        }
    }
}
