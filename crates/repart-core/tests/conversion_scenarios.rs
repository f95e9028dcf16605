//! End-to-end conversion scenarios against the in-memory database.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use repart_core::{
    generate, BoundaryDefinition, ChangeTracker, ColumnDef, ConstraintDef, ConversionError,
    ConversionOptions, ConversionOrchestrator, ConversionRun, ConversionState, ConversionStep,
    CurrentLayout, EngineConfig, ExecutionFailure, FailureKind, IndexDef, MemoryAuditLogger,
    MemoryDatabase, PartitionMethod, PartitionSpec, QualifiedName, Repartitioner, Severity,
    StatementChangeTracker, StatementExecutor, StepStatus, Strategy, SyncPass, TableDefinition,
    TriggerDef,
};

struct TestContext {
    db: Arc<MemoryDatabase>,
    audit: Arc<MemoryAuditLogger>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            db: Arc::new(MemoryDatabase::new()),
            audit: Arc::new(MemoryAuditLogger::new()),
        }
    }

    fn orchestrator(&self) -> ConversionOrchestrator {
        ConversionOrchestrator::new(
            self.db.clone(),
            self.db.clone(),
            self.audit.clone(),
            EngineConfig::default().with_lock_retry(1, Duration::ZERO),
        )
    }

    fn repartitioner(&self) -> Repartitioner {
        Repartitioner::new(self.orchestrator())
    }

    fn statements_containing(&self, needle: &str) -> usize {
        self.db
            .statements()
            .iter()
            .filter(|s| s.contains(needle))
            .count()
    }
}

fn sales() -> QualifiedName {
    QualifiedName::with_owner("APP", "SALES")
}

fn retired() -> QualifiedName {
    sales().sibling("SALES_OLD")
}

fn shadow() -> QualifiedName {
    sales().sibling("SALES_NEW")
}

fn setup_sales(ctx: &TestContext, with_pk: bool) {
    ctx.db.add_table(
        &sales(),
        TableDefinition::new([
            ColumnDef::required("ID", "NUMBER(10)"),
            ColumnDef::required("SALE_DATE", "DATE"),
            ColumnDef::new("REGION", "VARCHAR2(20)"),
            ColumnDef::new("AMOUNT", "NUMBER(12,2)").with_default("0"),
        ])
        .with_storage("TABLESPACE USERS"),
    );
    if with_pk {
        ctx.db
            .add_constraint(&sales(), ConstraintDef::primary_key("PK_SALES", ["ID"]));
    }
    ctx.db.set_row_count(&sales(), 1000);
}

fn quarterly_spec() -> (PartitionSpec, Vec<BoundaryDefinition>) {
    (
        PartitionSpec::single(PartitionMethod::Range, ["SALE_DATE"]),
        vec![
            BoundaryDefinition::partition("P_2024_Q1").with_value("DATE '2024-04-01'"),
            BoundaryDefinition::partition("P_2024_Q2").with_value("DATE '2024-07-01'"),
        ],
    )
}

fn composite_spec() -> (PartitionSpec, Vec<BoundaryDefinition>) {
    (
        PartitionSpec::composite(
            PartitionMethod::Range,
            ["SALE_DATE"],
            PartitionMethod::Hash,
            ["ID"],
        ),
        vec![
            BoundaryDefinition::partition("P_2024").with_value("DATE '2025-01-01'"),
            BoundaryDefinition::subpartition("P_2024_S1"),
            BoundaryDefinition::subpartition("P_2024_S2"),
            BoundaryDefinition::partition("P_MAX").with_value("MAXVALUE"),
        ],
    )
}

#[test]
fn test_range_conversion_of_unpartitioned_table() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    let (spec, boundaries) = quarterly_spec();

    let converted = ctx
        .repartitioner()
        .convert_to_single_level(&sales(), &spec, &boundaries, &ConversionOptions::default())
        .unwrap();

    assert!(converted);
    let canonical = ctx.db.table(&sales()).unwrap();
    assert_eq!(
        canonical.definition.current_layout,
        CurrentLayout::SingleLevel(PartitionMethod::Range)
    );
    let partitions: Vec<(&str, Option<&str>)> = canonical
        .partitions
        .iter()
        .map(|p| (p.name.as_str(), p.boundary_value.as_deref()))
        .collect();
    assert_eq!(
        partitions,
        vec![
            ("P_2024_Q1", Some("DATE '2024-04-01'")),
            ("P_2024_Q2", Some("DATE '2024-07-01'")),
        ]
    );
    assert_eq!(canonical.rows, 1000);

    let retired = ctx.db.table(&retired()).unwrap();
    assert_eq!(retired.rows, 1000);
    assert_eq!(retired.definition.current_layout, CurrentLayout::Unpartitioned);
}

#[test]
fn test_table_without_primary_key_falls_back_to_offline() {
    let ctx = TestContext::new();
    setup_sales(&ctx, false);
    let (spec, boundaries) = quarterly_spec();
    let repartitioner = ctx.repartitioner();

    assert!(!repartitioner.is_online_capable(&sales(), &spec));

    let run = repartitioner
        .run_conversion(&sales(), &spec, &boundaries, &ConversionOptions::default())
        .unwrap();

    assert!(run.succeeded());
    assert_eq!(run.strategy, Some(Strategy::Offline));
    assert!(run.convergence.is_none());
    assert_eq!(
        run.step(ConversionStep::Converge).map(|p| p.status),
        Some(StepStatus::Skipped)
    );
    assert_eq!(ctx.statements_containing("APP.SALES READ ONLY"), 1);
    assert!(ctx.db.table(&retired()).unwrap().read_only);
    assert!(!ctx.db.table(&sales()).unwrap().read_only);
}

#[test]
fn test_subpartition_before_partition_is_rejected() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    let (spec, _) = composite_spec();
    let boundaries = vec![
        BoundaryDefinition::subpartition("S0"),
        BoundaryDefinition::partition("P_MAX").with_value("MAXVALUE"),
    ];

    assert!(matches!(
        generate(&spec, &boundaries),
        Err(ConversionError::GenerationFailure { .. })
    ));

    let converted = ctx
        .repartitioner()
        .convert_to_composite(&sales(), &spec, &boundaries, &ConversionOptions::default())
        .unwrap();

    assert!(!converted);
    assert_eq!(ctx.audit.failures(FailureKind::GenerationFailure).len(), 1);
    assert_eq!(ctx.statements_containing("CREATE TABLE"), 0);
    assert!(ctx.db.table(&shadow()).is_none());
}

#[test]
fn test_one_failed_index_copy_does_not_abort() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    for (name, column) in [
        ("SALES_REGION_IX", "REGION"),
        ("SALES_DATE_IX", "SALE_DATE"),
        ("SALES_AMOUNT_IX", "AMOUNT"),
    ] {
        ctx.db.add_index(&sales(), IndexDef::new(name, [column]));
    }
    // Another table already holds the name the second copy needs.
    let other = sales().sibling("RETURNS");
    ctx.db
        .add_table(&other, TableDefinition::new([ColumnDef::new("ID", "NUMBER")]));
    ctx.db.add_index(&other, IndexDef::new("SALES_DATE_IX_NEW", ["ID"]));
    let (spec, boundaries) = quarterly_spec();

    let run = ctx
        .repartitioner()
        .run_conversion(&sales(), &spec, &boundaries, &ConversionOptions::default())
        .unwrap();

    assert_eq!(run.state, ConversionState::Done);
    let copy_failures = ctx.audit.failures(FailureKind::DependentObjectCopyFailure);
    assert_eq!(copy_failures.len(), 1);
    assert_eq!(copy_failures[0].level, Severity::Warning);
    assert_eq!(
        copy_failures[0].object.as_deref(),
        Some("index SALES_DATE_IX_NEW")
    );
    assert_eq!(
        run.step(ConversionStep::CopyDependents).map(|p| p.status),
        Some(StepStatus::Degraded)
    );

    let canonical = ctx.db.table(&sales()).unwrap();
    assert!(canonical.index("SALES_REGION_IX_NEW").is_some());
    assert!(canonical.index("SALES_AMOUNT_IX_NEW").is_some());
    assert!(canonical.index("SALES_DATE_IX_NEW").is_none());
}

#[test]
fn test_cleanup_names_is_idempotent() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db
        .add_constraint(&sales(), ConstraintDef::check("CK_SALES_AMOUNT", "AMOUNT >= 0"));
    ctx.db
        .add_index(&sales(), IndexDef::new("SALES_DATE_IX", ["SALE_DATE"]));
    ctx.db.add_trigger(
        &sales(),
        TriggerDef::row("SALES_BI_TRG", "BEFORE INSERT", "BEGIN NULL; END;"),
    );
    let (spec, boundaries) = quarterly_spec();
    let options = ConversionOptions::default();
    let repartitioner = ctx.repartitioner();
    assert!(repartitioner
        .convert_to_single_level(&sales(), &spec, &boundaries, &options)
        .unwrap());

    let first = repartitioner.cleanup_names(&sales(), &options).unwrap();

    assert_eq!(first.failures().count(), 0);
    assert_eq!(first.renamed(), 10);
    let canonical = ctx.db.table(&sales()).unwrap();
    assert_eq!(canonical.constraint_names(), vec!["CK_SALES_AMOUNT", "PK_SALES"]);
    assert_eq!(canonical.index_names(), vec!["PK_SALES", "SALES_DATE_IX"]);
    assert_eq!(canonical.trigger_names(), vec!["SALES_BI_TRG"]);
    assert!(canonical.constraint_enabled("PK_SALES"));
    assert!(canonical.trigger_enabled("SALES_BI_TRG"));
    let old = ctx.db.table(&retired()).unwrap();
    assert_eq!(old.constraint_names(), vec!["CK_SALES_AMOUNT_OLD", "PK_SALES_OLD"]);
    assert_eq!(old.trigger_names(), vec!["SALES_BI_TRG_OLD"]);

    let statements_before = ctx.db.statements().len();
    let second = repartitioner.cleanup_names(&sales(), &options).unwrap();

    assert!(second.is_noop());
    assert_eq!(ctx.db.statements().len(), statements_before);
}

#[test]
fn test_cleanup_without_retiring_reports_conflicts() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    let (spec, boundaries) = quarterly_spec();
    let options = ConversionOptions {
        retire_conflicting_names: false,
        ..ConversionOptions::default()
    };
    let repartitioner = ctx.repartitioner();
    assert!(repartitioner
        .convert_to_single_level(&sales(), &spec, &boundaries, &options)
        .unwrap());

    let report = repartitioner.cleanup_names(&sales(), &options).unwrap();

    // PK_SALES is still held by the retired table, for both the constraint and its index.
    assert_eq!(report.failures().count(), 2);
    assert_eq!(ctx.audit.failures(FailureKind::CleanupFailure).len(), 2);
    let canonical = ctx.db.table(&sales()).unwrap();
    assert_eq!(canonical.constraint_names(), vec!["PK_SALES_NEW"]);
}

#[test]
fn test_cutover_failure_escalates_without_retry() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db.inject_failure(
        "ALTER TABLE APP.SALES_NEW RENAME TO SALES",
        ExecutionFailure::new(54, "resource busy and acquire with NOWAIT specified"),
    );
    let (spec, boundaries) = quarterly_spec();

    let result = ctx.repartitioner().convert_to_single_level(
        &sales(),
        &spec,
        &boundaries,
        &ConversionOptions::default(),
    );

    let err = result.unwrap_err();
    assert!(matches!(err, ConversionError::CutoverFailure { .. }));
    assert!(err.to_string().contains("manual intervention"));
    assert_eq!(ctx.statements_containing("ALTER TABLE APP.SALES_NEW RENAME TO SALES"), 1);

    let critical = ctx.audit.at_least(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].failure, Some(FailureKind::CutoverFailure));

    // Half applied: the original is retired, the shadow was never renamed.
    assert!(ctx.db.table(&sales()).is_none());
    assert!(ctx.db.table(&retired()).is_some());
    assert!(ctx.db.table(&shadow()).is_some());
}

#[test]
fn test_load_failure_retains_shadow_and_restores_original() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db.inject_failure(
        "INSERT /*+ APPEND",
        ExecutionFailure::new(1653, "unable to extend table"),
    );
    let (spec, boundaries) = quarterly_spec();
    let options = ConversionOptions::default().with_strategy(Strategy::Offline);

    let converted = ctx
        .repartitioner()
        .convert_to_single_level(&sales(), &spec, &boundaries, &options)
        .unwrap();

    assert!(!converted);
    assert_eq!(ctx.audit.failures(FailureKind::LoadFailure).len(), 1);
    assert!(ctx.db.table(&shadow()).is_some());
    assert!(!ctx.db.table(&sales()).unwrap().read_only);
    assert_eq!(ctx.statements_containing("APP.SALES READ WRITE"), 1);
    assert_eq!(ctx.statements_containing("RENAME TO"), 0);
}

#[test]
fn test_preflight_rejects_existing_shadow() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db
        .add_table(&shadow(), TableDefinition::new([ColumnDef::new("ID", "NUMBER")]));
    let (spec, boundaries) = quarterly_spec();

    let run = ctx
        .repartitioner()
        .run_conversion(&sales(), &spec, &boundaries, &ConversionOptions::default())
        .unwrap();

    assert!(matches!(run.error, Some(ConversionError::Preflight { .. })));
    assert_eq!(ctx.statements_containing("CREATE TABLE"), 0);
}

#[test]
fn test_catalog_fault_is_escalated() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db.fail_catalog(repart_core::CatalogError::Access(
        "dictionary unavailable".into(),
    ));
    let (spec, boundaries) = quarterly_spec();

    let result = ctx.repartitioner().convert_to_single_level(
        &sales(),
        &spec,
        &boundaries,
        &ConversionOptions::default(),
    );

    assert!(matches!(result, Err(ConversionError::Catalog(_))));
    assert_eq!(ctx.audit.failures(FailureKind::Unexpected).len(), 1);
}

#[test]
fn test_convergence_with_statement_tracker() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db.queue_sync_rows([40, 3, 0]);
    let orchestrator = ctx
        .orchestrator()
        .with_change_tracker(Arc::new(StatementChangeTracker::new(
            "MERGE INTO APP.SALES_NEW n USING APP.SALES o ON (n.ID = o.ID) ...",
        )));
    let (spec, boundaries) = quarterly_spec();
    let options = ConversionOptions::default().with_convergence(5, 0);

    let run = orchestrator
        .run_conversion(&sales(), &spec, &boundaries, &options)
        .unwrap();

    assert!(run.succeeded());
    assert_eq!(run.strategy, Some(Strategy::Online));
    let convergence = run.convergence.unwrap();
    assert!(convergence.converged);
    assert_eq!(convergence.iterations, 3);
    assert_eq!(convergence.last_drift, Some(0));
    assert!(ctx
        .audit
        .failures(FailureKind::ConvergenceIncomplete)
        .is_empty());
}

#[test]
fn test_convergence_incomplete_still_cuts_over() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db.queue_sync_rows([40, 30, 20]);
    let orchestrator = ctx
        .orchestrator()
        .with_change_tracker(Arc::new(StatementChangeTracker::new("MERGE INTO APP.SALES_NEW ...")));
    let (spec, boundaries) = quarterly_spec();
    let options = ConversionOptions::default().with_convergence(2, 5);

    let run = orchestrator
        .run_conversion(&sales(), &spec, &boundaries, &options)
        .unwrap();

    assert!(run.succeeded());
    assert_eq!(run.sync_iterations, 2);
    let convergence = run.convergence.unwrap();
    assert!(!convergence.converged);
    assert_eq!(convergence.last_drift, Some(30));
    let warnings = ctx.audit.failures(FailureKind::ConvergenceIncomplete);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, Severity::Warning);
    assert!(ctx.db.table(&retired()).is_some());
}

struct CancellingTracker {
    flag: Arc<AtomicBool>,
}

impl ChangeTracker for CancellingTracker {
    fn sync(
        &self,
        _executor: &dyn StatementExecutor,
        _run: &ConversionRun,
    ) -> Result<SyncPass, ExecutionFailure> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(SyncPass { rows_changed: 0 })
    }
}

#[test]
fn test_cancellation_before_cutover() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    let flag = Arc::new(AtomicBool::new(false));
    let orchestrator = ctx
        .orchestrator()
        .with_cancel_flag(flag.clone())
        .with_change_tracker(Arc::new(CancellingTracker { flag }));
    let (spec, boundaries) = quarterly_spec();

    let run = orchestrator
        .run_conversion(&sales(), &spec, &boundaries, &ConversionOptions::default())
        .unwrap();

    assert_eq!(run.state, ConversionState::Failed);
    assert_eq!(run.last_good_state, ConversionState::Converged);
    assert!(matches!(
        run.error,
        Some(ConversionError::Cancelled {
            state: ConversionState::Cutover,
            ..
        })
    ));
    assert_eq!(ctx.statements_containing("RENAME TO"), 0);
    assert!(ctx.db.table(&sales()).is_some());
    assert!(ctx.db.table(&shadow()).is_some());
}

#[test]
fn test_failed_constraint_validation_is_recoverable() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db
        .add_constraint(&sales(), ConstraintDef::check("CK_SALES_AMOUNT", "AMOUNT >= 0"));
    ctx.db.inject_failure(
        "ENABLE VALIDATE CONSTRAINT CK_SALES_AMOUNT_NEW",
        ExecutionFailure::new(2293, "cannot validate - check constraint violated"),
    );
    let (spec, boundaries) = quarterly_spec();

    let run = ctx
        .repartitioner()
        .run_conversion(&sales(), &spec, &boundaries, &ConversionOptions::default())
        .unwrap();

    assert!(run.succeeded());
    assert_eq!(run.validations.iter().filter(|o| !o.succeeded()).count(), 1);
    assert_eq!(ctx.audit.failures(FailureKind::ValidationFailure).len(), 1);
    let canonical = ctx.db.table(&sales()).unwrap();
    assert!(canonical.constraint_enabled("PK_SALES_NEW"));
    assert!(!canonical.constraint_enabled("CK_SALES_AMOUNT_NEW"));
}

#[test]
fn test_reference_partitioning_embeds_parent_constraint() {
    let ctx = TestContext::new();
    let orders = QualifiedName::with_owner("APP", "ORDERS");
    let lines = QualifiedName::with_owner("APP", "ORDER_LINES");
    ctx.db
        .add_table(&orders, TableDefinition::new([ColumnDef::required("ID", "NUMBER")]));
    ctx.db
        .add_constraint(&orders, ConstraintDef::primary_key("PK_ORDERS", ["ID"]));
    ctx.db.add_table(
        &lines,
        TableDefinition::new([
            ColumnDef::required("LINE_ID", "NUMBER"),
            ColumnDef::required("ORDER_ID", "NUMBER"),
        ]),
    );
    ctx.db
        .add_constraint(&lines, ConstraintDef::primary_key("PK_ORDER_LINES", ["LINE_ID"]));
    ctx.db.add_constraint(
        &lines,
        ConstraintDef::foreign_key("FK_LINES_ORDER", ["ORDER_ID"], orders.clone(), ["ID"]),
    );
    let spec = PartitionSpec::single(PartitionMethod::Reference, ["FK_LINES_ORDER"]);
    let boundaries = vec![
        BoundaryDefinition::partition("P_OPEN"),
        BoundaryDefinition::partition("P_CLOSED"),
    ];
    let options = ConversionOptions::default();
    let repartitioner = ctx.repartitioner();

    assert!(repartitioner
        .convert_to_single_level(&lines, &spec, &boundaries, &options)
        .unwrap());

    assert_eq!(
        ctx.statements_containing(
            "CONSTRAINT FK_LINES_ORDER_NEW FOREIGN KEY (ORDER_ID) REFERENCES APP.ORDERS (ID)"
        ),
        1
    );
    assert_eq!(
        ctx.statements_containing("PARTITION BY REFERENCE (FK_LINES_ORDER_NEW)"),
        1
    );
    // The referential constraint is embedded, never added separately.
    assert_eq!(ctx.statements_containing("ADD CONSTRAINT FK_"), 0);

    repartitioner.cleanup_names(&lines, &options).unwrap();
    let canonical = ctx.db.table(&lines).unwrap();
    assert_eq!(
        canonical.constraint_names(),
        vec!["FK_LINES_ORDER", "PK_ORDER_LINES"]
    );
}

#[test]
fn test_single_to_composite_requires_partitioned_source() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    let (spec, boundaries) = composite_spec();
    let repartitioner = ctx.repartitioner();

    assert!(!repartitioner
        .convert_single_to_composite(&sales(), &spec, &boundaries, &ConversionOptions::default())
        .unwrap());
    assert_eq!(ctx.audit.failures(FailureKind::PreflightFailure).len(), 1);

    let partitioned = sales().sibling("SALES_HIST");
    ctx.db.add_table(
        &partitioned,
        TableDefinition::new([
            ColumnDef::required("ID", "NUMBER(10)"),
            ColumnDef::required("SALE_DATE", "DATE"),
        ])
        .with_layout(CurrentLayout::SingleLevel(PartitionMethod::Range)),
    );
    ctx.db
        .add_constraint(&partitioned, ConstraintDef::primary_key("PK_SALES_HIST", ["ID"]));

    assert!(repartitioner
        .convert_single_to_composite(&partitioned, &spec, &boundaries, &ConversionOptions::default())
        .unwrap());
    let canonical = ctx.db.table(&partitioned).unwrap();
    assert_eq!(
        canonical.definition.current_layout,
        CurrentLayout::Composite(PartitionMethod::Range, PartitionMethod::Hash)
    );
    assert_eq!(canonical.partitions[0].subpartitions, vec!["P_2024_S1", "P_2024_S2"]);
    assert!(canonical.partitions[1].subpartitions.is_empty());
}

#[test]
fn test_entry_points_reject_mismatched_shapes() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    let repartitioner = ctx.repartitioner();
    let options = ConversionOptions::default();

    let (composite, composite_boundaries) = composite_spec();
    assert!(!repartitioner
        .convert_to_single_level(&sales(), &composite, &composite_boundaries, &options)
        .unwrap());

    let (single, single_boundaries) = quarterly_spec();
    assert!(!repartitioner
        .convert_to_composite(&sales(), &single, &single_boundaries, &options)
        .unwrap());

    assert_eq!(
        ctx.audit.failures(FailureKind::InvalidSpecification).len(),
        2
    );
    assert!(ctx.db.statements().is_empty());
}

#[test]
fn test_drop_retired_is_explicit() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    let (spec, boundaries) = quarterly_spec();
    let options = ConversionOptions::default();
    let repartitioner = ctx.repartitioner();

    assert!(!repartitioner.drop_retired(&sales(), &options).unwrap());
    assert!(repartitioner
        .convert_to_single_level(&sales(), &spec, &boundaries, &options)
        .unwrap());
    assert!(ctx.db.table(&retired()).is_some());

    assert!(repartitioner.drop_retired(&sales(), &options).unwrap());
    assert!(ctx.db.table(&retired()).is_none());
    assert!(ctx.db.table(&sales()).is_some());
}

#[test]
fn test_colliding_or_empty_suffixes_fail_preflight() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    let (spec, boundaries) = quarterly_spec();
    let repartitioner = ctx.repartitioner();

    for (shadow_suffix, retired_suffix) in [("_X", "_X"), ("_new", "_NEW"), ("", "_OLD"), ("_NEW", "")] {
        let options = ConversionOptions::default().with_suffixes(shadow_suffix, retired_suffix);
        assert!(!repartitioner
            .convert_to_single_level(&sales(), &spec, &boundaries, &options)
            .unwrap());
    }

    assert_eq!(ctx.audit.failures(FailureKind::PreflightFailure).len(), 4);
    assert!(ctx.audit.failures(FailureKind::CutoverFailure).is_empty());
    assert!(ctx.db.statements().is_empty());
    assert!(ctx.db.table(&sales()).is_some());
}

#[test]
fn test_cleanup_restores_names_truncated_by_suffix() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db.add_index(
        &sales(),
        IndexDef::new("SALES_REGION_AMOUNT_DATE_IX", ["REGION", "AMOUNT", "SALE_DATE"]),
    );
    let (spec, boundaries) = quarterly_spec();
    let options = ConversionOptions::default();
    let repartitioner = ctx.repartitioner();
    assert!(repartitioner
        .convert_to_single_level(&sales(), &spec, &boundaries, &options)
        .unwrap());
    let canonical = ctx.db.table(&sales()).unwrap();
    assert!(canonical.index("SALES_REGION_AMOUNT_DATE_I_NEW").is_some());

    let report = repartitioner.cleanup_names(&sales(), &options).unwrap();

    assert_eq!(report.failures().count(), 0);
    let canonical = ctx.db.table(&sales()).unwrap();
    assert_eq!(
        canonical.index_names(),
        vec!["PK_SALES", "SALES_REGION_AMOUNT_DATE_IX"]
    );
    let old = ctx.db.table(&retired()).unwrap();
    assert_eq!(
        old.index_names(),
        vec!["PK_SALES_OLD", "SALES_REGION_AMOUNT_DATE_I_OLD"]
    );
}

#[test]
fn test_catalog_fault_in_single_to_composite_check_is_audited() {
    let ctx = TestContext::new();
    setup_sales(&ctx, true);
    ctx.db.fail_catalog(repart_core::CatalogError::Access(
        "dictionary unavailable".into(),
    ));
    let (spec, boundaries) = composite_spec();

    let result = ctx.repartitioner().convert_single_to_composite(
        &sales(),
        &spec,
        &boundaries,
        &ConversionOptions::default(),
    );

    assert!(matches!(result, Err(ConversionError::Catalog(_))));
    let faults = ctx.audit.failures(FailureKind::Unexpected);
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].level, Severity::Error);
    assert!(ctx.db.statements().is_empty());
}
