//! Invocation surface.
//!
//! [`Repartitioner`] exposes the conversion entry points. Each returns
//! `Ok(true)` on success and `Ok(false)` on an expected failure, with the
//! details in the audit trail; only cutover failures and catalog faults come
//! back as errors.

use crate::capability::CapabilityEvaluator;
use crate::catalog::{CatalogError, CurrentLayout};
use crate::config::ConversionOptions;
use crate::error::ConversionError;
use crate::model::{BoundaryDefinition, PartitionSpec, QualifiedName};
use crate::orchestrator::ConversionOrchestrator;
use crate::run::{CleanupReport, ConversionRun};

/// Entry points for converting tables.
pub struct Repartitioner {
    orchestrator: ConversionOrchestrator,
}

impl Repartitioner {
    /// Create a facade over an orchestrator.
    pub fn new(orchestrator: ConversionOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// The underlying orchestrator.
    pub fn orchestrator(&self) -> &ConversionOrchestrator {
        &self.orchestrator
    }

    /// Convert `table` into a single-level layout.
    pub fn convert_to_single_level(
        &self,
        table: &QualifiedName,
        spec: &PartitionSpec,
        boundaries: &[BoundaryDefinition],
        options: &ConversionOptions,
    ) -> Result<bool, ConversionError> {
        if spec.composite {
            return Ok(self.orchestrator.reject(
                table,
                ConversionError::InvalidSpecification {
                    reason: "single-level conversion given a composite specification".to_string(),
                },
            ));
        }
        self.convert(table, spec, boundaries, options)
    }

    /// Convert `table` into a composite layout.
    pub fn convert_to_composite(
        &self,
        table: &QualifiedName,
        spec: &PartitionSpec,
        boundaries: &[BoundaryDefinition],
        options: &ConversionOptions,
    ) -> Result<bool, ConversionError> {
        if !spec.composite {
            return Ok(self.orchestrator.reject(
                table,
                ConversionError::InvalidSpecification {
                    reason: "composite conversion given a single-level specification".to_string(),
                },
            ));
        }
        self.convert(table, spec, boundaries, options)
    }

    /// Convert a single-level partitioned `table` into a composite layout.
    pub fn convert_single_to_composite(
        &self,
        table: &QualifiedName,
        spec: &PartitionSpec,
        boundaries: &[BoundaryDefinition],
        options: &ConversionOptions,
    ) -> Result<bool, ConversionError> {
        let current = self
            .current_layout(table)
            .map_err(|e| self.orchestrator.escalate(table, e.into()))?;
        if let Some(current) = current {
            if !matches!(current, CurrentLayout::SingleLevel(_)) {
                return Ok(self.orchestrator.reject(
                    table,
                    ConversionError::Preflight {
                        table: table.to_string(),
                        reason: format!("table is not single-level partitioned ({current:?})"),
                    },
                ));
            }
        }
        self.convert_to_composite(table, spec, boundaries, options)
    }

    /// Whether `table` can be converted online into `spec`.
    pub fn is_online_capable(&self, table: &QualifiedName, spec: &PartitionSpec) -> bool {
        CapabilityEvaluator::new(self.orchestrator.catalog()).can_convert_online(table, spec)
    }

    /// Run the full workflow and return the run report.
    pub fn run_conversion(
        &self,
        table: &QualifiedName,
        spec: &PartitionSpec,
        boundaries: &[BoundaryDefinition],
        options: &ConversionOptions,
    ) -> Result<ConversionRun, ConversionError> {
        self.orchestrator
            .run_conversion(table, spec, boundaries, options)
    }

    /// Strip shadow suffixes from the objects of a converted table.
    pub fn cleanup_names(
        &self,
        table: &QualifiedName,
        options: &ConversionOptions,
    ) -> Result<CleanupReport, ConversionError> {
        self.orchestrator.cleanup_names(table, options)
    }

    /// Drop the retired table of a converted table. Never called by the workflow.
    pub fn drop_retired(
        &self,
        table: &QualifiedName,
        options: &ConversionOptions,
    ) -> Result<bool, ConversionError> {
        self.orchestrator.drop_retired(table, options)
    }

    /// Layout of `table`, or `None` when it does not exist; pre-flight reports that case.
    fn current_layout(&self, table: &QualifiedName) -> Result<Option<CurrentLayout>, CatalogError> {
        let catalog = self.orchestrator.catalog();
        if !catalog.object_exists(table)? {
            return Ok(None);
        }
        Ok(Some(catalog.table_definition(table)?.current_layout))
    }

    fn convert(
        &self,
        table: &QualifiedName,
        spec: &PartitionSpec,
        boundaries: &[BoundaryDefinition],
        options: &ConversionOptions,
    ) -> Result<bool, ConversionError> {
        let run = self
            .orchestrator
            .run_conversion(table, spec, boundaries, options)?;
        Ok(run.succeeded())
    }
}
