//! Typed statements issued by the orchestrator.
//!
//! Each [`Statement`] carries its rendered text, which is what a database
//! executor runs, together with a structured [`StatementKind`] describing the
//! same operation.

use crate::catalog::{ConstraintDef, ConstraintKind, IndexDef, TableDefinition, TriggerDef};
use crate::ddl::layout::LayoutDefinition;
use crate::model::QualifiedName;

/// Structured form of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// Bound the wait for DDL locks in the current session.
    SetDdlLockTimeout {
        /// Seconds to wait.
        seconds: u32,
    },
    /// Allow parallel DML in the current session.
    EnableParallelDml,
    /// Create the shadow table with its new layout.
    CreateTable {
        /// Table to create.
        table: QualifiedName,
        /// Columns and storage attributes.
        definition: TableDefinition,
        /// Partitioning clause.
        layout: LayoutDefinition,
        /// Constraint declared inline, required by REFERENCE layouts.
        embedded: Option<ConstraintDef>,
    },
    /// Add a constraint in a disabled, unvalidated state.
    AddConstraint {
        /// Target table.
        table: QualifiedName,
        /// Constraint to add.
        constraint: ConstraintDef,
    },
    /// Enable and validate a constraint.
    EnableConstraint {
        /// Target table.
        table: QualifiedName,
        /// Constraint name.
        name: String,
    },
    /// Create an index.
    CreateIndex {
        /// Indexed table.
        table: QualifiedName,
        /// Index definition.
        index: IndexDef,
        /// Create as a local partitioned index.
        local: bool,
        /// Requested parallel degree for the build.
        parallel: Option<u32>,
    },
    /// Reset an index to serial access after a parallel build.
    ResetIndexParallel {
        /// Index name.
        index: QualifiedName,
    },
    /// Create a trigger in a disabled state.
    CreateTrigger {
        /// Target table.
        table: QualifiedName,
        /// Trigger definition.
        trigger: TriggerDef,
    },
    /// Enable a trigger.
    EnableTrigger {
        /// Trigger name.
        trigger: QualifiedName,
    },
    /// Toggle read-only mode of a table.
    SetReadOnly {
        /// Target table.
        table: QualifiedName,
        /// New mode.
        read_only: bool,
    },
    /// Copy every row of `source` into `target`.
    CopyRows {
        /// Source table.
        source: QualifiedName,
        /// Target table.
        target: QualifiedName,
        /// Requested parallel degree.
        parallel: Option<u32>,
    },
    /// Rename a table within its schema.
    RenameTable {
        /// Table to rename.
        table: QualifiedName,
        /// New name.
        to: String,
    },
    /// Rename a constraint.
    RenameConstraint {
        /// Owning table.
        table: QualifiedName,
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Rename an index.
    RenameIndex {
        /// Index to rename.
        index: QualifiedName,
        /// New name.
        to: String,
    },
    /// Rename a trigger.
    RenameTrigger {
        /// Trigger to rename.
        trigger: QualifiedName,
        /// New name.
        to: String,
    },
    /// Drop a table.
    DropTable {
        /// Table to drop.
        table: QualifiedName,
    },
    /// Caller-written statement, opaque to the engine.
    Raw,
}

/// A statement ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    kind: StatementKind,
    sql: String,
}

impl Statement {
    /// Structured form.
    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// Statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// A caller-written statement.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            kind: StatementKind::Raw,
            sql: sql.into(),
        }
    }

    /// `ALTER SESSION SET DDL_LOCK_TIMEOUT = n`.
    pub fn set_ddl_lock_timeout(seconds: u32) -> Self {
        Self {
            sql: format!("ALTER SESSION SET DDL_LOCK_TIMEOUT = {seconds}"),
            kind: StatementKind::SetDdlLockTimeout { seconds },
        }
    }

    /// `ALTER SESSION ENABLE PARALLEL DML`.
    pub fn enable_parallel_dml() -> Self {
        Self {
            sql: "ALTER SESSION ENABLE PARALLEL DML".to_string(),
            kind: StatementKind::EnableParallelDml,
        }
    }

    /// Create `table` from `definition`'s columns and storage with `layout` appended.
    pub fn create_table(
        table: &QualifiedName,
        definition: &TableDefinition,
        layout: &LayoutDefinition,
        embedded: Option<&ConstraintDef>,
    ) -> Self {
        let mut elements: Vec<String> = definition
            .columns
            .iter()
            .map(|column| {
                let mut element = format!("  {} {}", column.name, column.data_type);
                if let Some(default) = &column.default {
                    element.push_str(&format!(" DEFAULT {default}"));
                }
                if !column.nullable {
                    element.push_str(" NOT NULL");
                }
                element
            })
            .collect();
        if let Some(constraint) = embedded {
            elements.push(format!(
                "  CONSTRAINT {} {}",
                constraint.name,
                constraint_body(&constraint.kind)
            ));
        }

        let mut sql = format!("CREATE TABLE {table} (\n{}\n)", elements.join(",\n"));
        if let Some(storage) = &definition.storage_clause {
            sql.push('\n');
            sql.push_str(storage);
        }
        sql.push('\n');
        sql.push_str(layout.text());

        Self {
            sql,
            kind: StatementKind::CreateTable {
                table: table.clone(),
                definition: definition.clone(),
                layout: layout.clone(),
                embedded: embedded.cloned(),
            },
        }
    }

    /// Add `constraint` to `table` without enforcing or validating it.
    pub fn add_constraint(table: &QualifiedName, constraint: &ConstraintDef) -> Self {
        Self {
            sql: format!(
                "ALTER TABLE {table} ADD CONSTRAINT {} {} DISABLE NOVALIDATE",
                constraint.name,
                constraint_body(&constraint.kind)
            ),
            kind: StatementKind::AddConstraint {
                table: table.clone(),
                constraint: constraint.clone(),
            },
        }
    }

    /// Enable and validate a constraint.
    pub fn enable_constraint(table: &QualifiedName, name: &str) -> Self {
        Self {
            sql: format!("ALTER TABLE {table} ENABLE VALIDATE CONSTRAINT {name}"),
            kind: StatementKind::EnableConstraint {
                table: table.clone(),
                name: name.to_string(),
            },
        }
    }

    /// Create `index` on `table`.
    pub fn create_index(
        table: &QualifiedName,
        index: &IndexDef,
        local: bool,
        parallel: Option<u32>,
    ) -> Self {
        let name = table.sibling(index.name.as_str());
        let mut sql = format!(
            "CREATE {}INDEX {name} ON {table} ({})",
            if index.unique { "UNIQUE " } else { "" },
            index.columns.join(", ")
        );
        if local {
            sql.push_str(" LOCAL");
        }
        if let Some(tablespace) = &index.tablespace {
            sql.push_str(&format!(" TABLESPACE {tablespace}"));
        }
        if let Some(degree) = parallel {
            sql.push_str(&format!(" PARALLEL {degree}"));
        }
        Self {
            sql,
            kind: StatementKind::CreateIndex {
                table: table.clone(),
                index: index.clone(),
                local,
                parallel,
            },
        }
    }

    /// `ALTER INDEX ... NOPARALLEL`.
    pub fn reset_index_parallel(index: &QualifiedName) -> Self {
        Self {
            sql: format!("ALTER INDEX {index} NOPARALLEL"),
            kind: StatementKind::ResetIndexParallel {
                index: index.clone(),
            },
        }
    }

    /// Create `trigger` on `table` in a disabled state.
    pub fn create_trigger(table: &QualifiedName, trigger: &TriggerDef) -> Self {
        let mut sql = format!(
            "CREATE OR REPLACE TRIGGER {}\n{} ON {table}",
            table.sibling(trigger.name.as_str()),
            trigger.timing
        );
        if trigger.for_each_row {
            sql.push_str("\nFOR EACH ROW");
        }
        sql.push_str("\nDISABLE");
        if let Some(condition) = &trigger.when {
            sql.push_str(&format!("\nWHEN ({condition})"));
        }
        sql.push('\n');
        sql.push_str(&trigger.body);
        Self {
            sql,
            kind: StatementKind::CreateTrigger {
                table: table.clone(),
                trigger: trigger.clone(),
            },
        }
    }

    /// `ALTER TRIGGER ... ENABLE`.
    pub fn enable_trigger(trigger: &QualifiedName) -> Self {
        Self {
            sql: format!("ALTER TRIGGER {trigger} ENABLE"),
            kind: StatementKind::EnableTrigger {
                trigger: trigger.clone(),
            },
        }
    }

    /// `ALTER TABLE ... READ ONLY` / `READ WRITE`.
    pub fn set_read_only(table: &QualifiedName, read_only: bool) -> Self {
        Self {
            sql: format!(
                "ALTER TABLE {table} {}",
                if read_only { "READ ONLY" } else { "READ WRITE" }
            ),
            kind: StatementKind::SetReadOnly {
                table: table.clone(),
                read_only,
            },
        }
    }

    /// Direct-path copy of every row of `source` into `target`.
    pub fn copy_rows(source: &QualifiedName, target: &QualifiedName, parallel: Option<u32>) -> Self {
        let sql = match parallel {
            Some(degree) => format!(
                "INSERT /*+ APPEND PARALLEL({}, {degree}) */ INTO {target} \
                 SELECT /*+ PARALLEL({}, {degree}) */ * FROM {source}",
                target.name, source.name
            ),
            None => format!("INSERT /*+ APPEND */ INTO {target} SELECT * FROM {source}"),
        };
        Self {
            sql,
            kind: StatementKind::CopyRows {
                source: source.clone(),
                target: target.clone(),
                parallel,
            },
        }
    }

    /// `ALTER TABLE ... RENAME TO ...`.
    pub fn rename_table(table: &QualifiedName, to: &str) -> Self {
        Self {
            sql: format!("ALTER TABLE {table} RENAME TO {to}"),
            kind: StatementKind::RenameTable {
                table: table.clone(),
                to: to.to_string(),
            },
        }
    }

    /// `ALTER TABLE ... RENAME CONSTRAINT ... TO ...`.
    pub fn rename_constraint(table: &QualifiedName, from: &str, to: &str) -> Self {
        Self {
            sql: format!("ALTER TABLE {table} RENAME CONSTRAINT {from} TO {to}"),
            kind: StatementKind::RenameConstraint {
                table: table.clone(),
                from: from.to_string(),
                to: to.to_string(),
            },
        }
    }

    /// `ALTER INDEX ... RENAME TO ...`.
    pub fn rename_index(index: &QualifiedName, to: &str) -> Self {
        Self {
            sql: format!("ALTER INDEX {index} RENAME TO {to}"),
            kind: StatementKind::RenameIndex {
                index: index.clone(),
                to: to.to_string(),
            },
        }
    }

    /// `ALTER TRIGGER ... RENAME TO ...`.
    pub fn rename_trigger(trigger: &QualifiedName, to: &str) -> Self {
        Self {
            sql: format!("ALTER TRIGGER {trigger} RENAME TO {to}"),
            kind: StatementKind::RenameTrigger {
                trigger: trigger.clone(),
                to: to.to_string(),
            },
        }
    }

    /// `DROP TABLE ...`.
    pub fn drop_table(table: &QualifiedName) -> Self {
        Self {
            sql: format!("DROP TABLE {table}"),
            kind: StatementKind::DropTable {
                table: table.clone(),
            },
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

fn constraint_body(kind: &ConstraintKind) -> String {
    match kind {
        ConstraintKind::PrimaryKey { columns } => format!("PRIMARY KEY ({})", columns.join(", ")),
        ConstraintKind::Unique { columns } => format!("UNIQUE ({})", columns.join(", ")),
        ConstraintKind::Check { condition } => format!("CHECK ({condition})"),
        ConstraintKind::ForeignKey {
            columns,
            references,
            referenced_columns,
        } => format!(
            "FOREIGN KEY ({}) REFERENCES {references} ({})",
            columns.join(", "),
            referenced_columns.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;
    use crate::ddl::layout::generate;
    use crate::model::{BoundaryDefinition, PartitionMethod, PartitionSpec};

    fn sales() -> QualifiedName {
        QualifiedName::with_owner("APP", "SALES")
    }

    #[test]
    fn test_create_table_with_layout() {
        let definition = TableDefinition::new([
            ColumnDef::required("ID", "NUMBER(10)"),
            ColumnDef::new("SALE_DATE", "DATE").with_default("SYSDATE"),
        ])
        .with_storage("TABLESPACE USERS");
        let spec = PartitionSpec::single(PartitionMethod::Hash, ["ID"]).with_hash_partition_count(4);
        let layout = generate(&spec, &[]).unwrap();

        let statement =
            Statement::create_table(&sales().sibling("SALES_NEW"), &definition, &layout, None);

        assert_eq!(
            statement.sql(),
            "CREATE TABLE APP.SALES_NEW (\n  ID NUMBER(10) NOT NULL,\n  SALE_DATE DATE DEFAULT SYSDATE\n)\n\
             TABLESPACE USERS\nPARTITION BY HASH (ID)\nPARTITIONS 4"
        );
    }

    #[test]
    fn test_create_table_embeds_reference_constraint() {
        let definition = TableDefinition::new([ColumnDef::required("ORDER_ID", "NUMBER")]);
        let spec = PartitionSpec::single(PartitionMethod::Reference, ["FK_LINE_ORDER"]);
        let layout = generate(&spec, &[BoundaryDefinition::partition("P1")]).unwrap();
        let fk = ConstraintDef::foreign_key(
            "FK_LINE_ORDER",
            ["ORDER_ID"],
            QualifiedName::with_owner("APP", "ORDERS"),
            ["ID"],
        );

        let statement =
            Statement::create_table(&QualifiedName::new("LINES_NEW"), &definition, &layout, Some(&fk));

        assert!(statement.sql().contains(
            "  CONSTRAINT FK_LINE_ORDER FOREIGN KEY (ORDER_ID) REFERENCES APP.ORDERS (ID)\n)"
        ));
    }

    #[test]
    fn test_add_constraint_is_disabled() {
        let pk = ConstraintDef::primary_key("PK_SALES_NEW", ["ID"]);
        let statement = Statement::add_constraint(&sales(), &pk);
        assert_eq!(
            statement.sql(),
            "ALTER TABLE APP.SALES ADD CONSTRAINT PK_SALES_NEW PRIMARY KEY (ID) DISABLE NOVALIDATE"
        );
    }

    #[test]
    fn test_create_index_options() {
        let index = IndexDef::new("SALES_REGION_IX_NEW", ["REGION", "SALE_DATE"])
            .unique()
            .in_tablespace("IDX");
        let statement = Statement::create_index(&sales(), &index, true, Some(8));
        assert_eq!(
            statement.sql(),
            "CREATE UNIQUE INDEX APP.SALES_REGION_IX_NEW ON APP.SALES (REGION, SALE_DATE) \
             LOCAL TABLESPACE IDX PARALLEL 8"
        );
    }

    #[test]
    fn test_create_trigger_disabled() {
        let mut trigger = TriggerDef::row(
            "SALES_AUDIT_TRG_NEW",
            "BEFORE UPDATE",
            "BEGIN :NEW.UPDATED_AT := SYSDATE; END;",
        );
        trigger.when = Some("NEW.AMOUNT > 0".into());

        let statement = Statement::create_trigger(&sales(), &trigger);

        assert_eq!(
            statement.sql(),
            "CREATE OR REPLACE TRIGGER APP.SALES_AUDIT_TRG_NEW\nBEFORE UPDATE ON APP.SALES\n\
             FOR EACH ROW\nDISABLE\nWHEN (NEW.AMOUNT > 0)\nBEGIN :NEW.UPDATED_AT := SYSDATE; END;"
        );
    }

    #[test]
    fn test_copy_rows_hints() {
        let shadow = sales().sibling("SALES_NEW");
        assert_eq!(
            Statement::copy_rows(&sales(), &shadow, None).sql(),
            "INSERT /*+ APPEND */ INTO APP.SALES_NEW SELECT * FROM APP.SALES"
        );
        assert_eq!(
            Statement::copy_rows(&sales(), &shadow, Some(4)).sql(),
            "INSERT /*+ APPEND PARALLEL(SALES_NEW, 4) */ INTO APP.SALES_NEW \
             SELECT /*+ PARALLEL(SALES, 4) */ * FROM APP.SALES"
        );
    }

    #[test]
    fn test_renames() {
        assert_eq!(
            Statement::rename_table(&sales(), "SALES_OLD").sql(),
            "ALTER TABLE APP.SALES RENAME TO SALES_OLD"
        );
        assert_eq!(
            Statement::rename_constraint(&sales(), "PK_SALES_NEW", "PK_SALES").sql(),
            "ALTER TABLE APP.SALES RENAME CONSTRAINT PK_SALES_NEW TO PK_SALES"
        );
        assert_eq!(
            Statement::rename_index(&sales().sibling("IX_NEW"), "IX").sql(),
            "ALTER INDEX APP.IX_NEW RENAME TO IX"
        );
    }
}
