//! Catalog facts and the read-only catalog interface.
//!
//! The engine never queries the data dictionary itself; it asks a
//! [`CatalogReader`] for the structure of the table being converted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{PartitionMethod, QualifiedName};

/// Catalog lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The object is not in the catalog.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The catalog could not be read.
    #[error("catalog access failed: {0}")]
    Access(String),
}

/// Read-only, side-effect-free access to the database catalog.
pub trait CatalogReader: Send + Sync {
    /// Whether the table has a primary key.
    fn has_primary_key(&self, table: &QualifiedName) -> Result<bool, CatalogError>;

    /// Whether the table has large-object columns.
    fn has_large_object_columns(&self, table: &QualifiedName) -> Result<bool, CatalogError>;

    /// Whether a table with this name exists.
    fn object_exists(&self, name: &QualifiedName) -> Result<bool, CatalogError>;

    /// Column list, storage attributes and current layout.
    fn table_definition(&self, table: &QualifiedName) -> Result<TableDefinition, CatalogError>;

    /// Constraints declared on the table.
    fn constraints(&self, table: &QualifiedName) -> Result<Vec<ConstraintDef>, CatalogError>;

    /// Indexes on the table, including constraint-backing ones.
    fn indexes(&self, table: &QualifiedName) -> Result<Vec<IndexDef>, CatalogError>;

    /// Triggers on the table.
    fn triggers(&self, table: &QualifiedName) -> Result<Vec<TriggerDef>, CatalogError>;
}

/// Current storage layout of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentLayout {
    /// Heap table without partitions.
    #[default]
    Unpartitioned,
    /// One partitioning level.
    SingleLevel(PartitionMethod),
    /// Partitions with subpartitions.
    Composite(PartitionMethod, PartitionMethod),
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared type, e.g. `NUMBER(10)`.
    pub data_type: String,
    /// Whether NULL is allowed.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Default expression.
    #[serde(default)]
    pub default: Option<String>,
}

fn default_nullable() -> bool {
    true
}

const LARGE_OBJECT_TYPES: [&str; 6] = ["CLOB", "NCLOB", "BLOB", "BFILE", "LONG", "XMLTYPE"];

impl ColumnDef {
    /// A nullable column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
        }
    }

    /// A NOT NULL column.
    pub fn required(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            nullable: false,
            ..Self::new(name, data_type)
        }
    }

    /// Set the default expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether the column holds a large object.
    pub fn is_large_object(&self) -> bool {
        let base = self
            .data_type
            .split(['(', ' '])
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        LARGE_OBJECT_TYPES.contains(&base.as_str())
    }
}

/// Structural definition of a table, without its named constraints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Physical attributes rendered after the column list, e.g. `TABLESPACE USERS PCTFREE 10`.
    #[serde(default)]
    pub storage_clause: Option<String>,
    /// Current partitioning.
    #[serde(default)]
    pub current_layout: CurrentLayout,
}

impl TableDefinition {
    /// Create a definition from its columns.
    pub fn new(columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            storage_clause: None,
            current_layout: CurrentLayout::Unpartitioned,
        }
    }

    /// Set the storage clause.
    pub fn with_storage(mut self, clause: impl Into<String>) -> Self {
        self.storage_clause = Some(clause.into());
        self
    }

    /// Set the current layout.
    pub fn with_layout(mut self, layout: CurrentLayout) -> Self {
        self.current_layout = layout;
        self
    }
}

/// Kind of a table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Primary key.
    PrimaryKey {
        /// Key columns.
        columns: Vec<String>,
    },
    /// Uniqueness constraint.
    Unique {
        /// Unique columns.
        columns: Vec<String>,
    },
    /// Check constraint.
    Check {
        /// Boolean condition.
        condition: String,
    },
    /// Referential constraint.
    ForeignKey {
        /// Referencing columns.
        columns: Vec<String>,
        /// Parent table.
        references: QualifiedName,
        /// Parent columns.
        referenced_columns: Vec<String>,
    },
}

/// A named table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDef {
    /// Constraint name.
    pub name: String,
    /// Constraint body.
    pub kind: ConstraintKind,
}

impl ConstraintDef {
    /// Create a primary key.
    pub fn primary_key(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::PrimaryKey {
                columns: columns.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Create a unique constraint.
    pub fn unique(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Unique {
                columns: columns.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Create a check constraint.
    pub fn check(name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::Check {
                condition: condition.into(),
            },
        }
    }

    /// Create a referential constraint.
    pub fn foreign_key(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        references: QualifiedName,
        referenced_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::ForeignKey {
                columns: columns.into_iter().map(Into::into).collect(),
                references,
                referenced_columns: referenced_columns.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// The same constraint under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: self.kind.clone(),
        }
    }

    /// Whether the constraint is replicated onto the shadow table.
    ///
    /// Referential constraints stay on the original; a REFERENCE layout embeds
    /// the one it needs at creation time.
    pub fn is_replicated(&self) -> bool {
        !matches!(self.kind, ConstraintKind::ForeignKey { .. })
    }

    /// Whether enabling the constraint builds a backing index.
    pub fn is_index_backed(&self) -> bool {
        matches!(
            self.kind,
            ConstraintKind::PrimaryKey { .. } | ConstraintKind::Unique { .. }
        )
    }

    /// Short label used in audit events.
    pub fn label(&self) -> String {
        let kind = match self.kind {
            ConstraintKind::PrimaryKey { .. } => "primary key",
            ConstraintKind::Unique { .. } => "unique constraint",
            ConstraintKind::Check { .. } => "check constraint",
            ConstraintKind::ForeignKey { .. } => "foreign key",
        };
        format!("{kind} {}", self.name)
    }
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed columns or expressions.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    #[serde(default)]
    pub unique: bool,
    /// Tablespace.
    #[serde(default)]
    pub tablespace: Option<String>,
    /// Whether the index enforces a primary key or unique constraint.
    #[serde(default)]
    pub constraint_backed: bool,
}

impl IndexDef {
    /// A non-unique index.
    pub fn new(name: impl Into<String>, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            tablespace: None,
            constraint_backed: false,
        }
    }

    /// Mark the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the tablespace.
    pub fn in_tablespace(mut self, tablespace: impl Into<String>) -> Self {
        self.tablespace = Some(tablespace.into());
        self
    }

    /// The same index under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// A table trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDef {
    /// Trigger name.
    pub name: String,
    /// Timing and events, e.g. `BEFORE INSERT OR UPDATE`.
    pub timing: String,
    /// Row-level trigger.
    #[serde(default)]
    pub for_each_row: bool,
    /// `WHEN` condition.
    #[serde(default)]
    pub when: Option<String>,
    /// PL/SQL body.
    pub body: String,
}

impl TriggerDef {
    /// Create a row-level trigger.
    pub fn row(name: impl Into<String>, timing: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timing: timing.into(),
            for_each_row: true,
            when: None,
            body: body.into(),
        }
    }

    /// The same trigger under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}
