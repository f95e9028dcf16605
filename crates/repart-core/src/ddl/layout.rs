//! Layout-definition generator.
//!
//! Renders the `PARTITION BY ...` fragment of the shadow table from a
//! specification and an ordered boundary list. Boundary order is taken as
//! given: the generator never sorts, so ascending bounds for RANGE layouts are
//! the caller's responsibility.

use std::collections::HashSet;

use crate::error::ConversionError;
use crate::model::{BoundStyle, BoundaryDefinition, BoundaryLevel, PartitionMethod, PartitionSpec};

/// One rendered partition or subpartition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryClause {
    /// Partition or subpartition name.
    pub name: String,
    /// Bound literal.
    pub value: Option<String>,
    /// Tablespace.
    pub container: Option<String>,
}

impl BoundaryClause {
    fn from_definition(definition: &BoundaryDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            value: definition.boundary_value.clone(),
            container: definition.target_container.clone(),
        }
    }

    fn render(&self, keyword: &str, style: BoundStyle) -> String {
        let mut clause = format!("{keyword} {}", self.name);
        match (style, &self.value) {
            (BoundStyle::LessThan, Some(value)) => {
                clause.push_str(&format!(" VALUES LESS THAN ({value})"))
            }
            (BoundStyle::ValueSet, Some(value)) => clause.push_str(&format!(" VALUES ({value})")),
            _ => {}
        }
        if let Some(container) = &self.container {
            clause.push_str(&format!(" TABLESPACE {container}"));
        }
        clause
    }
}

/// A partition and the subpartitions that followed it in the boundary list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionGroup {
    /// The partition entry.
    pub partition: BoundaryClause,
    /// Subpartition entries, in input order.
    pub subpartitions: Vec<BoundaryClause>,
}

/// Generated layout definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDefinition {
    method: PartitionMethod,
    subpartition_method: Option<PartitionMethod>,
    groups: Vec<PartitionGroup>,
    text: String,
}

impl LayoutDefinition {
    /// Rendered fragment, appended to a `CREATE TABLE` statement.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Top-level method.
    pub fn method(&self) -> PartitionMethod {
        self.method
    }

    /// Subpartition method of a composite layout.
    pub fn subpartition_method(&self) -> Option<PartitionMethod> {
        self.subpartition_method
    }

    /// Partition groups in input order.
    pub fn partitions(&self) -> &[PartitionGroup] {
        &self.groups
    }

    /// Number of explicit partitions.
    pub fn partition_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of explicit subpartitions across all groups.
    pub fn subpartition_count(&self) -> usize {
        self.groups.iter().map(|g| g.subpartitions.len()).sum()
    }
}

impl std::fmt::Display for LayoutDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Generate the layout definition for `spec` from `boundaries`.
pub fn generate(
    spec: &PartitionSpec,
    boundaries: &[BoundaryDefinition],
) -> Result<LayoutDefinition, ConversionError> {
    let method = spec
        .partition_method
        .ok_or_else(|| failure("partition method is not set"))?;
    if spec.partition_key.is_empty() {
        return Err(failure("partition key is empty"));
    }
    let subpartition_method = match (spec.composite, spec.subpartition_method) {
        (true, Some(sub)) => Some(sub),
        (true, None) => return Err(failure("composite layout has no subpartition method")),
        (false, _) => None,
    };

    let groups = group_boundaries(boundaries, subpartition_method.is_some())?;
    if groups.is_empty() && !method.allows_empty_boundaries() {
        return Err(failure(format!(
            "{method} partitioning requires at least one partition"
        )));
    }
    check_names(&groups)?;
    check_values(&groups, method, subpartition_method)?;

    let mut fragments = vec![partition_by_clause(spec, method)?];
    if let Some(sub) = subpartition_method {
        fragments.push(format!(
            "SUBPARTITION BY {} ({})",
            sub.keyword(),
            spec.subpartition_key.join(", ")
        ));
    }
    if groups.is_empty() {
        if let (PartitionMethod::Hash, Some(count)) = (method, spec.hash_partition_count) {
            fragments.push(format!("PARTITIONS {count}"));
        }
    } else {
        fragments.push(render_groups(&groups, method, subpartition_method));
    }

    Ok(LayoutDefinition {
        method,
        subpartition_method,
        groups,
        text: fragments.join("\n"),
    })
}

fn failure(reason: impl Into<String>) -> ConversionError {
    ConversionError::GenerationFailure {
        reason: reason.into(),
    }
}

fn partition_by_clause(
    spec: &PartitionSpec,
    method: PartitionMethod,
) -> Result<String, ConversionError> {
    let key = spec.partition_key.join(", ");
    let clause = match method {
        PartitionMethod::Interval => {
            let interval = spec
                .interval
                .as_deref()
                .filter(|i| !i.trim().is_empty())
                .ok_or_else(|| failure("INTERVAL partitioning requires an interval expression"))?;
            format!("PARTITION BY RANGE ({key}) INTERVAL ({interval})")
        }
        PartitionMethod::AutoList => format!("PARTITION BY LIST ({key}) AUTOMATIC"),
        other => format!("PARTITION BY {} ({key})", other.keyword()),
    };
    Ok(clause)
}

/// Fold the flat boundary list into partition groups.
///
/// Each partition entry closes the open group and opens a new one; each
/// subpartition entry joins the open group.
fn group_boundaries(
    boundaries: &[BoundaryDefinition],
    composite: bool,
) -> Result<Vec<PartitionGroup>, ConversionError> {
    let mut groups: Vec<PartitionGroup> = Vec::new();
    for (position, boundary) in boundaries.iter().enumerate() {
        match boundary.level {
            BoundaryLevel::Partition => groups.push(PartitionGroup {
                partition: BoundaryClause::from_definition(boundary),
                subpartitions: Vec::new(),
            }),
            BoundaryLevel::Subpartition => {
                if !composite {
                    return Err(failure(format!(
                        "subpartition `{}` at position {position} in a single-level layout",
                        boundary.name
                    )));
                }
                let group = groups.last_mut().ok_or_else(|| {
                    failure(format!(
                        "subpartition `{}` at position {position} precedes any partition",
                        boundary.name
                    ))
                })?;
                group
                    .subpartitions
                    .push(BoundaryClause::from_definition(boundary));
            }
        }
    }
    Ok(groups)
}

fn check_names(groups: &[PartitionGroup]) -> Result<(), ConversionError> {
    let mut seen = HashSet::new();
    let clauses = groups
        .iter()
        .flat_map(|g| std::iter::once(&g.partition).chain(g.subpartitions.iter()));
    for clause in clauses {
        if clause.name.trim().is_empty() {
            return Err(failure("boundary with an empty name"));
        }
        if !seen.insert(clause.name.to_ascii_uppercase()) {
            return Err(failure(format!("duplicate partition name `{}`", clause.name)));
        }
    }
    Ok(())
}

fn check_values(
    groups: &[PartitionGroup],
    method: PartitionMethod,
    subpartition_method: Option<PartitionMethod>,
) -> Result<(), ConversionError> {
    for group in groups {
        check_value(&group.partition, method, "partition")?;
        if let Some(sub) = subpartition_method {
            for clause in &group.subpartitions {
                check_value(clause, sub, "subpartition")?;
            }
        }
    }
    Ok(())
}

fn check_value(
    clause: &BoundaryClause,
    method: PartitionMethod,
    level: &str,
) -> Result<(), ConversionError> {
    let has_value = clause
        .value
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty());
    match (method.bound_style(), has_value) {
        (BoundStyle::LessThan | BoundStyle::ValueSet, false) => Err(failure(format!(
            "{method} {level} `{}` has no boundary value",
            clause.name
        ))),
        (BoundStyle::Bare, true) => Err(failure(format!(
            "{method} {level} `{}` does not take a boundary value",
            clause.name
        ))),
        _ => Ok(()),
    }
}

fn render_groups(
    groups: &[PartitionGroup],
    method: PartitionMethod,
    subpartition_method: Option<PartitionMethod>,
) -> String {
    let entries: Vec<String> = groups
        .iter()
        .map(|group| {
            let mut entry = format!("  {}", group.partition.render("PARTITION", method.bound_style()));
            if let Some(sub) = subpartition_method.filter(|_| !group.subpartitions.is_empty()) {
                let subpartitions: Vec<String> = group
                    .subpartitions
                    .iter()
                    .map(|s| format!("    {}", s.render("SUBPARTITION", sub.bound_style())))
                    .collect();
                entry.push_str("\n  (\n");
                entry.push_str(&subpartitions.join(",\n"));
                entry.push_str("\n  )");
            }
            entry
        })
        .collect();
    format!("(\n{}\n)", entries.join(",\n"))
}
