//! Online-capability evaluation.
//!
//! Decides whether a table can be converted with the low-downtime strategy.
//! Row identity during incremental re-sync is carried by the primary key, so
//! most layouts need one; automatic-list and hash-composite targets may opt
//! out through `requires_primary_key`.

use tracing::{debug, warn};

use crate::catalog::{CatalogError, CatalogReader};
use crate::model::{PartitionMethod, PartitionSpec, QualifiedName};

/// Rule that produced a capability decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityRule {
    /// Automatic-list target: primary key, or none required.
    AutoList,
    /// Composite target over hash partitions: primary key, or none required.
    HashComposite,
    /// Every other target: primary key required.
    PrimaryKeyRequired,
    /// The catalog could not be read.
    CatalogUnavailable,
}

impl std::fmt::Display for CapabilityRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityRule::AutoList => write!(f, "auto_list"),
            CapabilityRule::HashComposite => write!(f, "hash_composite"),
            CapabilityRule::PrimaryKeyRequired => write!(f, "primary_key_required"),
            CapabilityRule::CatalogUnavailable => write!(f, "catalog_unavailable"),
        }
    }
}

/// Outcome of a capability evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityReport {
    /// Whether the online strategy is legal.
    pub online: bool,
    /// Rule that decided.
    pub rule: CapabilityRule,
    /// Primary-key presence, when it was looked up.
    pub has_primary_key: Option<bool>,
    /// Large-object column presence, when it was looked up.
    pub has_large_objects: Option<bool>,
}

/// Evaluates whether a table can be converted online.
pub struct CapabilityEvaluator<'a> {
    catalog: &'a dyn CatalogReader,
}

impl<'a> CapabilityEvaluator<'a> {
    /// Create an evaluator over a catalog reader.
    pub fn new(catalog: &'a dyn CatalogReader) -> Self {
        Self { catalog }
    }

    /// Whether `table` can be converted online into `spec`.
    pub fn can_convert_online(&self, table: &QualifiedName, spec: &PartitionSpec) -> bool {
        self.evaluate(table, spec).online
    }

    /// Evaluate the rules and report the facts behind the decision.
    pub fn evaluate(&self, table: &QualifiedName, spec: &PartitionSpec) -> CapabilityReport {
        let rule = Self::rule_for(spec);

        let has_large_objects = match self.catalog.has_large_object_columns(table) {
            Ok(found) => {
                if found {
                    debug!(table = %table, "table has large-object columns");
                }
                Some(found)
            }
            Err(e) => {
                debug!(table = %table, error = %e, "large-object lookup failed");
                None
            }
        };

        let relaxed = matches!(rule, CapabilityRule::AutoList | CapabilityRule::HashComposite)
            && !spec.requires_primary_key;
        if relaxed {
            return CapabilityReport {
                online: true,
                rule,
                has_primary_key: None,
                has_large_objects,
            };
        }

        match self.catalog.has_primary_key(table) {
            Ok(has_primary_key) => CapabilityReport {
                online: has_primary_key,
                rule,
                has_primary_key: Some(has_primary_key),
                has_large_objects,
            },
            Err(e) => Self::unavailable(table, e, has_large_objects),
        }
    }

    fn rule_for(spec: &PartitionSpec) -> CapabilityRule {
        match spec.partition_method {
            Some(PartitionMethod::AutoList) => CapabilityRule::AutoList,
            Some(PartitionMethod::Hash) if spec.composite => CapabilityRule::HashComposite,
            _ => CapabilityRule::PrimaryKeyRequired,
        }
    }

    fn unavailable(
        table: &QualifiedName,
        error: CatalogError,
        has_large_objects: Option<bool>,
    ) -> CapabilityReport {
        warn!(table = %table, error = %error, "primary-key lookup failed, online conversion unavailable");
        CapabilityReport {
            online: false,
            rule: CapabilityRule::CatalogUnavailable,
            has_primary_key: None,
            has_large_objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, ConstraintDef, TableDefinition};
    use crate::memory::MemoryDatabase;

    fn sales() -> QualifiedName {
        QualifiedName::with_owner("APP", "SALES")
    }

    fn database(with_pk: bool) -> MemoryDatabase {
        let db = MemoryDatabase::new();
        db.add_table(
            &sales(),
            TableDefinition::new([
                ColumnDef::required("ID", "NUMBER(10)"),
                ColumnDef::new("NOTES", "CLOB"),
            ]),
        );
        if with_pk {
            db.add_constraint(&sales(), ConstraintDef::primary_key("PK_SALES", ["ID"]));
        }
        db
    }

    #[test]
    fn test_range_requires_primary_key() {
        let spec = PartitionSpec::single(PartitionMethod::Range, ["ID"]);

        let without = database(false);
        let report = CapabilityEvaluator::new(&without).evaluate(&sales(), &spec);
        assert!(!report.online);
        assert_eq!(report.rule, CapabilityRule::PrimaryKeyRequired);
        assert_eq!(report.has_large_objects, Some(true));

        let with = database(true);
        assert!(CapabilityEvaluator::new(&with).can_convert_online(&sales(), &spec));
    }

    #[test]
    fn test_auto_list_without_pk_requirement() {
        let db = database(false);
        let evaluator = CapabilityEvaluator::new(&db);

        let strict = PartitionSpec::single(PartitionMethod::AutoList, ["REGION"]);
        assert!(!evaluator.can_convert_online(&sales(), &strict));

        let relaxed = strict.with_requires_primary_key(false);
        let report = evaluator.evaluate(&sales(), &relaxed);
        assert!(report.online);
        assert_eq!(report.rule, CapabilityRule::AutoList);
        assert_eq!(report.has_primary_key, None);
    }

    #[test]
    fn test_hash_composite_rule() {
        let db = database(false);
        let spec = PartitionSpec::composite(PartitionMethod::Hash, ["ID"], PartitionMethod::List, ["REGION"])
            .with_requires_primary_key(false);
        let report = CapabilityEvaluator::new(&db).evaluate(&sales(), &spec);
        assert!(report.online);
        assert_eq!(report.rule, CapabilityRule::HashComposite);

        // Single-level hash falls under the general rule.
        let single = PartitionSpec::single(PartitionMethod::Hash, ["ID"]).with_requires_primary_key(false);
        assert!(!CapabilityEvaluator::new(&db).can_convert_online(&sales(), &single));
    }

    #[test]
    fn test_primary_key_required_for_every_method() {
        let db = database(false);
        let evaluator = CapabilityEvaluator::new(&db);
        let cases = [
            (PartitionSpec::single(PartitionMethod::Range, ["ID"]), CapabilityRule::PrimaryKeyRequired),
            (PartitionSpec::single(PartitionMethod::List, ["ID"]), CapabilityRule::PrimaryKeyRequired),
            (PartitionSpec::single(PartitionMethod::Hash, ["ID"]), CapabilityRule::PrimaryKeyRequired),
            (PartitionSpec::single(PartitionMethod::Interval, ["ID"]), CapabilityRule::PrimaryKeyRequired),
            (PartitionSpec::single(PartitionMethod::Reference, ["FK_SALES"]), CapabilityRule::PrimaryKeyRequired),
            (PartitionSpec::single(PartitionMethod::AutoList, ["ID"]), CapabilityRule::AutoList),
            (
                PartitionSpec::composite(PartitionMethod::Hash, ["ID"], PartitionMethod::List, ["REGION"]),
                CapabilityRule::HashComposite,
            ),
        ];

        for (spec, rule) in cases {
            assert!(spec.requires_primary_key);
            let report = evaluator.evaluate(&sales(), &spec);
            assert!(!report.online, "{:?} without a primary key", spec.partition_method);
            assert_eq!(report.rule, rule);
            assert_eq!(report.has_primary_key, Some(false));
        }
    }

    #[test]
    fn test_catalog_failure_is_not_online() {
        let db = database(true);
        db.fail_catalog(CatalogError::Access("dictionary unavailable".into()));
        let spec = PartitionSpec::single(PartitionMethod::Range, ["ID"]);

        let report = CapabilityEvaluator::new(&db).evaluate(&sales(), &spec);

        assert!(!report.online);
        assert_eq!(report.rule, CapabilityRule::CatalogUnavailable);
    }

    #[test]
    fn test_missing_table_is_not_online() {
        let db = MemoryDatabase::new();
        let spec = PartitionSpec::single(PartitionMethod::Range, ["ID"]);
        assert!(!CapabilityEvaluator::new(&db).can_convert_online(&sales(), &spec));
    }
}
