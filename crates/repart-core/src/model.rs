//! Partition specification model.
//!
//! Describes the target partitioning scheme of a conversion request and the
//! ordered boundary definitions that populate it.

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// Schema-qualified name of a table or of an object that lives next to it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Owning schema. `None` resolves to the session's current schema.
    #[serde(default)]
    pub owner: Option<String>,
    /// Object name.
    pub name: String,
}

impl QualifiedName {
    /// Create a name in the session's current schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
        }
    }

    /// Create a name in an explicit schema.
    pub fn with_owner(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            name: name.into(),
        }
    }

    /// A sibling object in the same schema.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self {
            owner: self.owner.clone(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}.{}", owner, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Partitioning method for a partition or subpartition level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionMethod {
    /// Ranges with strictly increasing upper bounds.
    Range,
    /// Explicit value sets.
    List,
    /// Hash distribution over the key.
    Hash,
    /// Range partitioning that creates partitions automatically past the last bound.
    Interval,
    /// Partitioning inherited from a parent table through a referential constraint.
    Reference,
    /// List partitioning that creates a partition per new key value.
    AutoList,
}

/// How a boundary value is rendered for a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundStyle {
    /// `VALUES LESS THAN (v)`.
    LessThan,
    /// `VALUES (v)`.
    ValueSet,
    /// No value clause.
    Bare,
}

impl PartitionMethod {
    /// Keyword used in `PARTITION BY` / `SUBPARTITION BY` clauses.
    pub fn keyword(&self) -> &'static str {
        match self {
            PartitionMethod::Range | PartitionMethod::Interval => "RANGE",
            PartitionMethod::List | PartitionMethod::AutoList => "LIST",
            PartitionMethod::Hash => "HASH",
            PartitionMethod::Reference => "REFERENCE",
        }
    }

    /// How boundary values are rendered for this method.
    pub fn bound_style(&self) -> BoundStyle {
        match self {
            PartitionMethod::Range | PartitionMethod::Interval => BoundStyle::LessThan,
            PartitionMethod::List | PartitionMethod::AutoList => BoundStyle::ValueSet,
            PartitionMethod::Hash | PartitionMethod::Reference => BoundStyle::Bare,
        }
    }

    /// Whether a layout with this method may start with no explicit partitions.
    pub fn allows_empty_boundaries(&self) -> bool {
        matches!(self, PartitionMethod::Hash | PartitionMethod::AutoList)
    }

    /// Whether the method may be used at the subpartition level.
    pub fn is_subpartition_method(&self) -> bool {
        matches!(
            self,
            PartitionMethod::Range | PartitionMethod::List | PartitionMethod::Hash
        )
    }
}

impl std::fmt::Display for PartitionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionMethod::Range => write!(f, "RANGE"),
            PartitionMethod::List => write!(f, "LIST"),
            PartitionMethod::Hash => write!(f, "HASH"),
            PartitionMethod::Interval => write!(f, "INTERVAL"),
            PartitionMethod::Reference => write!(f, "REFERENCE"),
            PartitionMethod::AutoList => write!(f, "AUTO_LIST"),
        }
    }
}

/// Desired partitioning scheme for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Top-level method. `None` when the source record carried no method.
    #[serde(default)]
    pub partition_method: Option<PartitionMethod>,
    /// Subpartition method; set iff `composite`.
    #[serde(default)]
    pub subpartition_method: Option<PartitionMethod>,
    /// Ordered partition key columns. For REFERENCE, the referential constraint name.
    #[serde(default)]
    pub partition_key: Vec<String>,
    /// Ordered subpartition key columns.
    #[serde(default)]
    pub subpartition_key: Vec<String>,
    /// Whether this is a two-level scheme.
    #[serde(default)]
    pub composite: bool,
    /// Whether the online strategy needs a primary key on the source table.
    #[serde(default = "default_requires_primary_key")]
    pub requires_primary_key: bool,
    /// Interval expression for INTERVAL partitioning.
    #[serde(default)]
    pub interval: Option<String>,
    /// Partition count for a HASH layout given without explicit partitions.
    #[serde(default)]
    pub hash_partition_count: Option<u32>,
}

fn default_requires_primary_key() -> bool {
    true
}

impl PartitionSpec {
    /// A single-level specification.
    pub fn single(
        method: PartitionMethod,
        key: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            partition_method: Some(method),
            subpartition_method: None,
            partition_key: key.into_iter().map(Into::into).collect(),
            subpartition_key: Vec::new(),
            composite: false,
            requires_primary_key: true,
            interval: None,
            hash_partition_count: None,
        }
    }

    /// A two-level specification.
    pub fn composite(
        method: PartitionMethod,
        key: impl IntoIterator<Item = impl Into<String>>,
        subpartition_method: PartitionMethod,
        subpartition_key: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            subpartition_method: Some(subpartition_method),
            subpartition_key: subpartition_key.into_iter().map(Into::into).collect(),
            composite: true,
            ..Self::single(method, key)
        }
    }

    /// Set whether the online strategy requires a primary key.
    pub fn with_requires_primary_key(mut self, required: bool) -> Self {
        self.requires_primary_key = required;
        self
    }

    /// Set the interval expression.
    pub fn with_interval(mut self, expression: impl Into<String>) -> Self {
        self.interval = Some(expression.into());
        self
    }

    /// Set the hash partition count used when no partitions are listed.
    pub fn with_hash_partition_count(mut self, count: u32) -> Self {
        self.hash_partition_count = Some(count);
        self
    }

    /// Check the specification before any definition is generated.
    pub fn validate(&self) -> Result<(), ConversionError> {
        let method = self
            .partition_method
            .ok_or_else(|| invalid("partition method is empty"))?;

        if self.partition_key.is_empty() {
            return Err(invalid("partition key is empty"));
        }
        if self.partition_key.iter().any(|c| c.trim().is_empty()) {
            return Err(invalid("partition key contains a blank column"));
        }

        if self.composite {
            let sub = self
                .subpartition_method
                .ok_or_else(|| invalid("composite specification has no subpartition method"))?;
            if self.subpartition_key.is_empty() {
                return Err(invalid("composite specification has an empty subpartition key"));
            }
            if self.subpartition_key.iter().any(|c| c.trim().is_empty()) {
                return Err(invalid("subpartition key contains a blank column"));
            }
            if !sub.is_subpartition_method() {
                return Err(invalid(format!("{sub} cannot be used as a subpartition method")));
            }
            if method == PartitionMethod::Reference {
                return Err(invalid(
                    "REFERENCE partitioning inherits its layout and cannot declare subpartitions",
                ));
            }
        } else if self.subpartition_method.is_some() {
            return Err(invalid(
                "subpartition method is set on a single-level specification",
            ));
        }

        match method {
            PartitionMethod::Interval
                if self.interval.as_deref().map_or(true, |i| i.trim().is_empty()) =>
            {
                Err(invalid("INTERVAL partitioning requires an interval expression"))
            }
            PartitionMethod::Reference if self.partition_key.len() != 1 => Err(invalid(
                "REFERENCE partitioning takes exactly one referential constraint name",
            )),
            _ => Ok(()),
        }
    }
}

fn invalid(reason: impl Into<String>) -> ConversionError {
    ConversionError::InvalidSpecification {
        reason: reason.into(),
    }
}

/// Level of a boundary definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundaryLevel {
    /// A top-level partition.
    Partition,
    /// A subpartition of the most recent partition entry.
    Subpartition,
}

/// One partition or subpartition of the target layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryDefinition {
    /// Partition or subpartition name.
    pub name: String,
    /// Bound literal, rendered verbatim. Absent for HASH.
    #[serde(default)]
    pub boundary_value: Option<String>,
    /// Target tablespace.
    #[serde(default)]
    pub target_container: Option<String>,
    /// Level of this entry.
    pub level: BoundaryLevel,
}

impl BoundaryDefinition {
    /// A partition entry.
    pub fn partition(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boundary_value: None,
            target_container: None,
            level: BoundaryLevel::Partition,
        }
    }

    /// A subpartition entry.
    pub fn subpartition(name: impl Into<String>) -> Self {
        Self {
            level: BoundaryLevel::Subpartition,
            ..Self::partition(name)
        }
    }

    /// Set the bound literal.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.boundary_value = Some(value.into());
        self
    }

    /// Set the target tablespace.
    pub fn in_container(mut self, container: impl Into<String>) -> Self {
        self.target_container = Some(container.into());
        self
    }
}

/// Conversion strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Original stays writable until cutover; drift is re-synced before the swap.
    Online,
    /// Original is made read-only for the whole copy.
    Offline,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Online => write!(f, "online"),
            Strategy::Offline => write!(f, "offline"),
        }
    }
}
