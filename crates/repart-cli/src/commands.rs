//! Command implementations.
//!
//! Every command renders its result as a string so the binary only prints
//! and picks an exit code.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use repart_core::{
    generate, AuditEvent, CapabilityEvaluator, CatalogSnapshot, ConversionError,
    ConversionOrchestrator, ConversionRun, EngineConfig, MemoryAuditLogger, MemoryDatabase,
    Repartitioner, StatementChangeTracker, Strategy,
};

use crate::args::{Args, Command, OutputFormat, PlanArgs};
use crate::error::CliError;
use crate::request::{read_json, ConversionRequest};

/// Rendered result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Text to print on stdout.
    pub output: String,
    /// Whether the command achieved what was asked.
    pub success: bool,
}

impl Outcome {
    fn new(output: String, success: bool) -> Self {
        Self { output, success }
    }
}

/// Result of a dry-run conversion.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    /// Table being converted.
    pub table: String,
    /// Shadow table built with the new layout.
    pub shadow: String,
    /// Name the original table takes at cutover.
    pub retired: String,
    /// Strategy chosen in pre-flight, if the run got that far.
    pub strategy: Option<Strategy>,
    /// Final state of the run.
    pub state: String,
    /// Whether the conversion reached cutover.
    pub succeeded: bool,
    /// Rows moved by the bulk load.
    pub rows_copied: Option<u64>,
    /// Re-sync passes made before cutover.
    pub sync_iterations: u32,
    /// Statements in submission order, including failed ones.
    pub statements: Vec<String>,
    /// Recoverable failures, one line each.
    pub warnings: Vec<String>,
    /// Failure that ended the run.
    pub error: Option<String>,
    /// Name cleanup result, when requested.
    pub cleanup: Option<CleanupSummary>,
    /// Audit events recorded during the plan.
    pub audit: Vec<AuditEvent>,
}

/// Outcome of the name-cleanup pass of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupSummary {
    /// Objects renamed.
    pub renamed: usize,
    /// Failures, one line per object.
    pub failed: Vec<String>,
}

/// Run the command selected by `args`.
pub fn run(args: &Args) -> Result<Outcome, CliError> {
    let config: EngineConfig = match &args.config {
        Some(path) => read_json(path)?,
        None => EngineConfig::default(),
    };

    match &args.command {
        Command::Validate { request } => validate(&ConversionRequest::load(request)?, args.format),
        Command::Generate { request } => {
            generate_layout(&ConversionRequest::load(request)?, args.format)
        }
        Command::Capability { request, catalog } => capability(
            &ConversionRequest::load(request)?,
            read_json(catalog)?,
            args.format,
        ),
        Command::Plan(plan_args) => plan(plan_args, config, args.format),
    }
}

/// Check the specification and boundaries of a request.
pub fn validate(request: &ConversionRequest, format: OutputFormat) -> Result<Outcome, CliError> {
    let checked = request
        .spec
        .validate()
        .and_then(|()| generate(&request.spec, &request.boundaries));

    let (success, detail) = match &checked {
        Ok(layout) => (
            true,
            format!(
                "{} partition(s), {} subpartition(s)",
                layout.partition_count(),
                layout.subpartition_count()
            ),
        ),
        Err(e) => (false, e.to_string()),
    };

    let output = match format {
        OutputFormat::Text if success => format!("valid: {detail}"),
        OutputFormat::Text => format!("invalid: {detail}"),
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "table": request.table.to_string(),
            "valid": success,
            "detail": detail,
        }))?,
    };
    Ok(Outcome::new(output, success))
}

/// Render the layout definition of a request.
pub fn generate_layout(
    request: &ConversionRequest,
    format: OutputFormat,
) -> Result<Outcome, CliError> {
    let generated = request
        .spec
        .validate()
        .and_then(|()| generate(&request.spec, &request.boundaries));
    let layout = match generated {
        Ok(layout) => layout,
        Err(e) => return Ok(Outcome::new(format!("error: {e}"), false)),
    };

    let output = match format {
        OutputFormat::Text => layout.text().to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "method": layout.method().to_string(),
            "subpartition_method": layout.subpartition_method().map(|m| m.to_string()),
            "partitions": layout.partition_count(),
            "subpartitions": layout.subpartition_count(),
            "text": layout.text(),
        }))?,
    };
    Ok(Outcome::new(output, true))
}

/// Evaluate online capability against a catalog snapshot.
pub fn capability(
    request: &ConversionRequest,
    snapshot: CatalogSnapshot,
    format: OutputFormat,
) -> Result<Outcome, CliError> {
    let db = MemoryDatabase::from_snapshot(snapshot);
    let report = CapabilityEvaluator::new(&db).evaluate(&request.table, &request.spec);

    let output = match format {
        OutputFormat::Text => {
            let mut text = format!(
                "{}: {} (rule {})",
                request.table,
                if report.online { "online" } else { "offline only" },
                report.rule
            );
            if let Some(has_primary_key) = report.has_primary_key {
                let _ = write!(text, ", primary key: {}", yes_no(has_primary_key));
            }
            if let Some(has_large_objects) = report.has_large_objects {
                let _ = write!(text, ", large objects: {}", yes_no(has_large_objects));
            }
            text
        }
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "table": request.table.to_string(),
            "online": report.online,
            "rule": report.rule.to_string(),
            "has_primary_key": report.has_primary_key,
            "has_large_objects": report.has_large_objects,
        }))?,
    };
    Ok(Outcome::new(output, true))
}

/// Dry-run a conversion against a catalog snapshot.
pub fn plan(args: &PlanArgs, config: EngineConfig, format: OutputFormat) -> Result<Outcome, CliError> {
    let request = ConversionRequest::load(&args.request)?;
    let snapshot: CatalogSnapshot = read_json(&args.catalog)?;
    let report = plan_conversion(&request, snapshot, config, args)?;
    let success = report.succeeded
        && report
            .cleanup
            .as_ref()
            .map_or(true, |cleanup| cleanup.failed.is_empty());

    let output = match format {
        OutputFormat::Text => render_script(&report),
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
    };
    Ok(Outcome::new(output, success))
}

fn plan_conversion(
    request: &ConversionRequest,
    snapshot: CatalogSnapshot,
    config: EngineConfig,
    args: &PlanArgs,
) -> Result<PlanReport, CliError> {
    let db = Arc::new(MemoryDatabase::from_snapshot(snapshot));
    let audit = Arc::new(MemoryAuditLogger::new());
    let mut orchestrator = ConversionOrchestrator::new(db.clone(), db.clone(), audit.clone(), config);
    if let Some(sql) = &args.sync_sql {
        orchestrator = orchestrator.with_change_tracker(Arc::new(StatementChangeTracker::new(sql.as_str())));
    }
    let shadow = orchestrator.shadow_name(&request.table, &request.options);
    let retired = orchestrator.retired_name(&request.table, &request.options);
    let repartitioner = Repartitioner::new(orchestrator);

    info!(table = %request.table, "Planning conversion");
    let run = repartitioner.run_conversion(
        &request.table,
        &request.spec,
        &request.boundaries,
        &request.options,
    );

    let mut report = PlanReport {
        table: request.table.to_string(),
        shadow: shadow.to_string(),
        retired: retired.to_string(),
        strategy: None,
        state: "failed".to_string(),
        succeeded: false,
        rows_copied: None,
        sync_iterations: 0,
        statements: Vec::new(),
        warnings: Vec::new(),
        error: None,
        cleanup: None,
        audit: Vec::new(),
    };
    match run {
        Ok(run) => apply_run(&mut report, &run),
        Err(e) => {
            warn!(error = %e, "Conversion escalated");
            report.error = Some(e.to_string());
        }
    }

    if report.succeeded && args.cleanup {
        match repartitioner.cleanup_names(&request.table, &request.options) {
            Ok(cleanup) => {
                report.state = cleanup.state().to_string();
                report.cleanup = Some(CleanupSummary {
                    renamed: cleanup.renamed(),
                    failed: cleanup
                        .failures()
                        .filter_map(|o| o.error.as_ref().map(ConversionError::to_string))
                        .collect(),
                });
            }
            Err(e) => report.error = Some(e.to_string()),
        }
    }

    if let Some(path) = &args.output_catalog {
        let content = serde_json::to_string_pretty(&db.snapshot())?;
        std::fs::write(path, content).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        })?;
    }

    report.statements = db.statements();
    report.audit = audit.events();
    Ok(report)
}

fn apply_run(report: &mut PlanReport, run: &ConversionRun) {
    report.strategy = run.strategy;
    report.state = run.state.to_string();
    report.succeeded = run.succeeded();
    report.rows_copied = run.rows_copied;
    report.sync_iterations = run.sync_iterations;
    report.warnings = run.warnings.iter().map(ConversionError::to_string).collect();
    report.error = run.error.as_ref().map(ConversionError::to_string);
}

/// Render a plan as a SQL script with the outcome in comments.
fn render_script(report: &PlanReport) -> String {
    let mut script = String::new();
    let strategy = report
        .strategy
        .map_or_else(|| "unresolved".to_string(), |s| s.to_string());
    let _ = writeln!(
        script,
        "-- conversion of {} via {} (strategy {strategy})",
        report.table, report.shadow
    );
    for statement in &report.statements {
        let _ = writeln!(script, "{statement};");
    }
    for warning in &report.warnings {
        let _ = writeln!(script, "-- warning: {warning}");
    }
    if let Some(cleanup) = &report.cleanup {
        let _ = writeln!(
            script,
            "-- cleanup: {} renamed, {} failed",
            cleanup.renamed,
            cleanup.failed.len()
        );
        for failure in &cleanup.failed {
            let _ = writeln!(script, "-- cleanup failure: {failure}");
        }
    }
    if let Some(error) = &report.error {
        let _ = writeln!(script, "-- error: {error}");
    }
    let _ = write!(script, "-- state: {}", report.state);
    script
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repart_core::{BoundaryDefinition, ConversionOptions, PartitionMethod, PartitionSpec, QualifiedName};

    fn request(boundaries: Vec<BoundaryDefinition>) -> ConversionRequest {
        ConversionRequest {
            table: QualifiedName::with_owner("APP", "SALES"),
            spec: PartitionSpec::single(PartitionMethod::Range, ["SALE_DATE"]),
            boundaries,
            options: ConversionOptions::default(),
        }
    }

    #[test]
    fn test_validate_reports_counts() {
        let outcome = validate(
            &request(vec![BoundaryDefinition::partition("P1").with_value("MAXVALUE")]),
            OutputFormat::Text,
        )
        .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, "valid: 1 partition(s), 0 subpartition(s)");
    }

    #[test]
    fn test_validate_rejects_missing_bound() {
        let outcome = validate(
            &request(vec![BoundaryDefinition::partition("P1")]),
            OutputFormat::Json,
        )
        .unwrap();
        assert!(!outcome.success);
        let value: serde_json::Value = serde_json::from_str(&outcome.output).unwrap();
        assert_eq!(value["valid"], false);
        assert!(value["detail"].as_str().unwrap().contains("no boundary value"));
    }

    #[test]
    fn test_generate_text_is_the_layout() {
        let outcome = generate_layout(
            &request(vec![BoundaryDefinition::partition("P1").with_value("MAXVALUE")]),
            OutputFormat::Text,
        )
        .unwrap();
        assert!(outcome.success);
        assert!(outcome.output.starts_with("PARTITION BY RANGE (SALE_DATE)"));
    }

    #[test]
    fn test_generate_refuses_invalid_specification() {
        let mut request = request(vec![
            BoundaryDefinition::partition("P1").with_value("MAXVALUE"),
            BoundaryDefinition::subpartition("P1_EAST").with_value("'EAST'"),
        ]);
        request.spec = PartitionSpec::composite(
            PartitionMethod::Range,
            ["SALE_DATE"],
            PartitionMethod::AutoList,
            ["REGION"],
        );

        let outcome = generate_layout(&request, OutputFormat::Text).unwrap();

        assert!(!outcome.success);
        assert!(outcome.output.contains("AUTO_LIST cannot be used as a subpartition method"));
        assert!(!outcome.output.contains("SUBPARTITION BY"));
    }

    #[test]
    fn test_capability_on_empty_catalog() {
        let outcome = capability(
            &request(Vec::new()),
            CatalogSnapshot::default(),
            OutputFormat::Text,
        )
        .unwrap();
        assert!(outcome.output.starts_with("APP.SALES: offline only"));
    }

    #[test]
    fn test_render_script_comments() {
        let report = PlanReport {
            table: "APP.SALES".to_string(),
            shadow: "APP.SALES_NEW".to_string(),
            retired: "APP.SALES_OLD".to_string(),
            strategy: Some(Strategy::Offline),
            state: "done".to_string(),
            succeeded: true,
            rows_copied: Some(3),
            sync_iterations: 0,
            statements: vec!["DROP TABLE APP.X".to_string()],
            warnings: vec!["index copy failed".to_string()],
            error: None,
            cleanup: None,
            audit: Vec::new(),
        };

        let script = render_script(&report);

        assert_eq!(
            script,
            "-- conversion of APP.SALES via APP.SALES_NEW (strategy offline)\n\
             DROP TABLE APP.X;\n\
             -- warning: index copy failed\n\
             -- state: done"
        );
    }
}
