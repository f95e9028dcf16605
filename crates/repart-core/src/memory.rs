//! In-memory database.
//!
//! [`MemoryDatabase`] implements both [`StatementExecutor`] and
//! [`CatalogReader`] by interpreting the structured form of each statement
//! against an in-memory catalog. It enforces the name rules a real database
//! enforces during a conversion (per-schema uniqueness of tables, indexes,
//! constraints and triggers) and reports violations with the same error codes,
//! so the workflow behaves the same against it as against a live target.
//! Failures can be injected per statement text.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::catalog::{
    CatalogError, CatalogReader, ConstraintDef, ConstraintKind, CurrentLayout, IndexDef,
    TableDefinition, TriggerDef,
};
use crate::ddl::{Statement, StatementKind};
use crate::executor::{ExecOutcome, ExecutionFailure, StatementExecutor};
use crate::model::QualifiedName;

const NAME_IN_USE: i32 = 955;
const CONSTRAINT_NAME_IN_USE: i32 = 2264;
const NO_SUCH_CONSTRAINT: i32 = 2430;
const TABLE_NOT_FOUND: i32 = 942;
const INDEX_NOT_FOUND: i32 = 1418;
const TRIGGER_NOT_FOUND: i32 = 4080;
const TRIGGER_NAME_IN_USE: i32 = 4081;
const TABLE_READ_ONLY: i32 = 12081;

/// One partition of a table in the in-memory catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    /// Partition name.
    pub name: String,
    /// Bound literal.
    #[serde(default)]
    pub boundary_value: Option<String>,
    /// Subpartition names.
    #[serde(default)]
    pub subpartitions: Vec<String>,
}

/// State of one table in the in-memory catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Table name.
    pub name: QualifiedName,
    /// Columns, storage and layout.
    pub definition: TableDefinition,
    /// Explicit partitions, in layout order.
    #[serde(default)]
    pub partitions: Vec<PartitionSnapshot>,
    /// Declared constraints.
    #[serde(default)]
    pub constraints: Vec<ConstraintDef>,
    /// Names of constraints that are disabled.
    #[serde(default)]
    pub disabled_constraints: BTreeSet<String>,
    /// Indexes, including constraint-backing ones.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
    /// Triggers.
    #[serde(default)]
    pub triggers: Vec<TriggerDef>,
    /// Names of triggers that are disabled.
    #[serde(default)]
    pub disabled_triggers: BTreeSet<String>,
    /// Row count.
    #[serde(default)]
    pub rows: u64,
    /// Whether the table is in read-only mode.
    #[serde(default)]
    pub read_only: bool,
}

impl TableSnapshot {
    /// An empty table.
    pub fn new(name: QualifiedName, definition: TableDefinition) -> Self {
        Self {
            name,
            definition,
            partitions: Vec::new(),
            constraints: Vec::new(),
            disabled_constraints: BTreeSet::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
            disabled_triggers: BTreeSet::new(),
            rows: 0,
            read_only: false,
        }
    }

    /// Constraint by name.
    pub fn constraint(&self, name: &str) -> Option<&ConstraintDef> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Whether the constraint exists and is enabled.
    pub fn constraint_enabled(&self, name: &str) -> bool {
        self.constraint(name).is_some() && !self.disabled_constraints.contains(name)
    }

    /// Index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Trigger by name.
    pub fn trigger(&self, name: &str) -> Option<&TriggerDef> {
        self.triggers.iter().find(|t| t.name == name)
    }

    /// Whether the trigger exists and is enabled.
    pub fn trigger_enabled(&self, name: &str) -> bool {
        self.trigger(name).is_some() && !self.disabled_triggers.contains(name)
    }

    /// Constraint names, sorted.
    pub fn constraint_names(&self) -> Vec<String> {
        sorted(self.constraints.iter().map(|c| c.name.clone()))
    }

    /// Index names, sorted.
    pub fn index_names(&self) -> Vec<String> {
        sorted(self.indexes.iter().map(|i| i.name.clone()))
    }

    /// Trigger names, sorted.
    pub fn trigger_names(&self) -> Vec<String> {
        sorted(self.triggers.iter().map(|t| t.name.clone()))
    }
}

fn sorted(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut names: Vec<String> = names.collect();
    names.sort();
    names
}

/// Serializable contents of an in-memory catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Tables.
    #[serde(default)]
    pub tables: Vec<TableSnapshot>,
}

#[derive(Debug)]
struct Fault {
    matcher: String,
    failure: ExecutionFailure,
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<QualifiedName, TableSnapshot>,
    statements: Vec<String>,
    faults: Vec<Fault>,
    sync_rows: VecDeque<u64>,
    catalog_failure: Option<CatalogError>,
}

/// In-memory database for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

impl MemoryDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a database from a catalog snapshot.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let db = Self::new();
        {
            let mut state = db.state.lock();
            for table in snapshot.tables {
                state.tables.insert(table.name.clone(), table);
            }
        }
        db
    }

    /// Current catalog contents.
    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            tables: self.state.lock().tables.values().cloned().collect(),
        }
    }

    /// Add a table, replacing any table of the same name.
    pub fn add_table(&self, table: &QualifiedName, definition: TableDefinition) {
        self.state
            .lock()
            .tables
            .insert(table.clone(), TableSnapshot::new(table.clone(), definition));
    }

    /// Add an enabled constraint. Primary keys and unique constraints get a
    /// backing index of the same name. Ignored when the table does not exist.
    pub fn add_constraint(&self, table: &QualifiedName, constraint: ConstraintDef) {
        let mut state = self.state.lock();
        if let Some(snapshot) = state.tables.get_mut(table) {
            if let Some(index) = backing_index(&constraint) {
                if snapshot.index(&index.name).is_none() {
                    snapshot.indexes.push(index);
                }
            }
            snapshot.constraints.push(constraint);
        }
    }

    /// Add an index. Ignored when the table does not exist.
    pub fn add_index(&self, table: &QualifiedName, index: IndexDef) {
        if let Some(snapshot) = self.state.lock().tables.get_mut(table) {
            snapshot.indexes.push(index);
        }
    }

    /// Add an enabled trigger. Ignored when the table does not exist.
    pub fn add_trigger(&self, table: &QualifiedName, trigger: TriggerDef) {
        if let Some(snapshot) = self.state.lock().tables.get_mut(table) {
            snapshot.triggers.push(trigger);
        }
    }

    /// Set a table's row count. Ignored when the table does not exist.
    pub fn set_row_count(&self, table: &QualifiedName, rows: u64) {
        if let Some(snapshot) = self.state.lock().tables.get_mut(table) {
            snapshot.rows = rows;
        }
    }

    /// Fail every statement whose text contains `matcher`.
    pub fn inject_failure(&self, matcher: impl Into<String>, failure: ExecutionFailure) {
        self.state.lock().faults.push(Fault {
            matcher: matcher.into(),
            failure,
            remaining: None,
        });
    }

    /// Fail the next `times` statements whose text contains `matcher`.
    pub fn inject_failure_times(
        &self,
        matcher: impl Into<String>,
        failure: ExecutionFailure,
        times: u32,
    ) {
        self.state.lock().faults.push(Fault {
            matcher: matcher.into(),
            failure,
            remaining: Some(times),
        });
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.state.lock().faults.clear();
    }

    /// Affected-row counts returned by successive caller-written statements.
    pub fn queue_sync_rows(&self, counts: impl IntoIterator<Item = u64>) {
        self.state.lock().sync_rows.extend(counts);
    }

    /// Fail every catalog read with `error`.
    pub fn fail_catalog(&self, error: CatalogError) {
        self.state.lock().catalog_failure = Some(error);
    }

    /// Restore catalog reads.
    pub fn restore_catalog(&self) {
        self.state.lock().catalog_failure = None;
    }

    /// Text of every statement submitted, in order, including failed ones.
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Forget recorded statements.
    pub fn clear_statements(&self) {
        self.state.lock().statements.clear();
    }

    /// Snapshot of one table.
    pub fn table(&self, table: &QualifiedName) -> Option<TableSnapshot> {
        self.state.lock().tables.get(table).cloned()
    }

    /// Names of all tables.
    pub fn table_names(&self) -> Vec<QualifiedName> {
        self.state.lock().tables.keys().cloned().collect()
    }
}

impl StatementExecutor for MemoryDatabase {
    fn execute(&self, statement: &Statement) -> Result<ExecOutcome, ExecutionFailure> {
        let mut state = self.state.lock();
        state.statements.push(statement.sql().to_string());
        if let Some(failure) = state.injected_failure(statement.sql()) {
            return Err(failure);
        }
        state.apply(statement.kind())
    }
}

impl CatalogReader for MemoryDatabase {
    fn has_primary_key(&self, table: &QualifiedName) -> Result<bool, CatalogError> {
        let state = self.state.lock();
        let snapshot = state.catalog_table(table)?;
        Ok(snapshot
            .constraints
            .iter()
            .any(|c| matches!(c.kind, ConstraintKind::PrimaryKey { .. })))
    }

    fn has_large_object_columns(&self, table: &QualifiedName) -> Result<bool, CatalogError> {
        let state = self.state.lock();
        let snapshot = state.catalog_table(table)?;
        Ok(snapshot.definition.columns.iter().any(|c| c.is_large_object()))
    }

    fn object_exists(&self, name: &QualifiedName) -> Result<bool, CatalogError> {
        let state = self.state.lock();
        state.check_catalog()?;
        Ok(state.tables.contains_key(name))
    }

    fn table_definition(&self, table: &QualifiedName) -> Result<TableDefinition, CatalogError> {
        let state = self.state.lock();
        Ok(state.catalog_table(table)?.definition.clone())
    }

    fn constraints(&self, table: &QualifiedName) -> Result<Vec<ConstraintDef>, CatalogError> {
        let state = self.state.lock();
        Ok(state.catalog_table(table)?.constraints.clone())
    }

    fn indexes(&self, table: &QualifiedName) -> Result<Vec<IndexDef>, CatalogError> {
        let state = self.state.lock();
        let snapshot = state.catalog_table(table)?;
        Ok(snapshot
            .indexes
            .iter()
            .map(|index| IndexDef {
                constraint_backed: index.constraint_backed
                    || snapshot
                        .constraint(&index.name)
                        .is_some_and(ConstraintDef::is_index_backed),
                ..index.clone()
            })
            .collect())
    }

    fn triggers(&self, table: &QualifiedName) -> Result<Vec<TriggerDef>, CatalogError> {
        let state = self.state.lock();
        Ok(state.catalog_table(table)?.triggers.clone())
    }
}

fn backing_index(constraint: &ConstraintDef) -> Option<IndexDef> {
    match &constraint.kind {
        ConstraintKind::PrimaryKey { columns } | ConstraintKind::Unique { columns } => {
            Some(IndexDef {
                name: constraint.name.clone(),
                columns: columns.clone(),
                unique: true,
                tablespace: None,
                constraint_backed: true,
            })
        }
        _ => None,
    }
}

fn table_not_found(table: &QualifiedName) -> ExecutionFailure {
    ExecutionFailure::new(TABLE_NOT_FOUND, format!("table or view {table} does not exist"))
}

fn name_in_use(name: &str) -> ExecutionFailure {
    ExecutionFailure::new(
        NAME_IN_USE,
        format!("name {name} is already used by an existing object"),
    )
}

impl State {
    fn check_catalog(&self) -> Result<(), CatalogError> {
        match &self.catalog_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn catalog_table(&self, table: &QualifiedName) -> Result<&TableSnapshot, CatalogError> {
        self.check_catalog()?;
        self.tables
            .get(table)
            .ok_or_else(|| CatalogError::NotFound(table.to_string()))
    }

    fn injected_failure(&mut self, sql: &str) -> Option<ExecutionFailure> {
        let position = self.faults.iter().position(|fault| {
            sql.contains(&fault.matcher) && fault.remaining.map_or(true, |n| n > 0)
        })?;
        let fault = &mut self.faults[position];
        if let Some(remaining) = fault.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(fault.failure.clone())
    }

    fn table(&self, table: &QualifiedName) -> Result<&TableSnapshot, ExecutionFailure> {
        self.tables.get(table).ok_or_else(|| table_not_found(table))
    }

    fn table_mut(&mut self, table: &QualifiedName) -> Result<&mut TableSnapshot, ExecutionFailure> {
        self.tables.get_mut(table).ok_or_else(|| table_not_found(table))
    }

    fn schema(&self, owner: &Option<String>) -> impl Iterator<Item = &TableSnapshot> + '_ {
        let owner = owner.clone();
        self.tables.values().filter(move |t| t.name.owner == owner)
    }

    fn constraint_in_use(&self, owner: &Option<String>, name: &str) -> bool {
        self.schema(owner).any(|t| t.constraint(name).is_some())
    }

    fn index_in_use(&self, owner: &Option<String>, name: &str) -> bool {
        self.schema(owner).any(|t| t.index(name).is_some())
    }

    fn index_table(&self, index: &QualifiedName) -> Option<QualifiedName> {
        self.schema(&index.owner)
            .find(|t| t.index(&index.name).is_some())
            .map(|t| t.name.clone())
    }

    fn trigger_table(&self, trigger: &QualifiedName) -> Option<QualifiedName> {
        self.schema(&trigger.owner)
            .find(|t| t.trigger(&trigger.name).is_some())
            .map(|t| t.name.clone())
    }

    fn apply(&mut self, kind: &StatementKind) -> Result<ExecOutcome, ExecutionFailure> {
        match kind {
            StatementKind::SetDdlLockTimeout { .. } | StatementKind::EnableParallelDml => {
                Ok(ExecOutcome::ddl())
            }

            StatementKind::CreateTable {
                table,
                definition,
                layout,
                embedded,
            } => {
                if self.tables.contains_key(table) {
                    return Err(name_in_use(&table.name));
                }
                let mut definition = definition.clone();
                definition.current_layout = match layout.subpartition_method() {
                    Some(sub) => CurrentLayout::Composite(layout.method(), sub),
                    None => CurrentLayout::SingleLevel(layout.method()),
                };
                let mut snapshot = TableSnapshot::new(table.clone(), definition);
                snapshot.partitions = layout
                    .partitions()
                    .iter()
                    .map(|group| PartitionSnapshot {
                        name: group.partition.name.clone(),
                        boundary_value: group.partition.value.clone(),
                        subpartitions: group.subpartitions.iter().map(|s| s.name.clone()).collect(),
                    })
                    .collect();
                if let Some(constraint) = embedded {
                    if self.constraint_in_use(&table.owner, &constraint.name) {
                        return Err(ExecutionFailure::new(
                            CONSTRAINT_NAME_IN_USE,
                            format!("name {} already used by an existing constraint", constraint.name),
                        ));
                    }
                    snapshot.constraints.push(constraint.clone());
                }
                self.tables.insert(table.clone(), snapshot);
                Ok(ExecOutcome::ddl())
            }

            StatementKind::AddConstraint { table, constraint } => {
                self.table(table)?;
                if self.constraint_in_use(&table.owner, &constraint.name) {
                    return Err(ExecutionFailure::new(
                        CONSTRAINT_NAME_IN_USE,
                        format!("name {} already used by an existing constraint", constraint.name),
                    ));
                }
                let snapshot = self.table_mut(table)?;
                snapshot.constraints.push(constraint.clone());
                snapshot.disabled_constraints.insert(constraint.name.clone());
                Ok(ExecOutcome::ddl())
            }

            StatementKind::EnableConstraint { table, name } => {
                let snapshot = self.table(table)?;
                let constraint = snapshot.constraint(name).cloned().ok_or_else(|| {
                    ExecutionFailure::new(
                        NO_SUCH_CONSTRAINT,
                        format!("cannot enable constraint ({name}) - no such constraint"),
                    )
                })?;
                let index = backing_index(&constraint).filter(|_| snapshot.index(name).is_none());
                if index.is_some() && self.index_in_use(&table.owner, name) {
                    return Err(name_in_use(name));
                }
                let snapshot = self.table_mut(table)?;
                snapshot.disabled_constraints.remove(name);
                snapshot.indexes.extend(index);
                Ok(ExecOutcome::ddl())
            }

            StatementKind::CreateIndex { table, index, .. } => {
                self.table(table)?;
                if self.index_in_use(&table.owner, &index.name) {
                    return Err(name_in_use(&index.name));
                }
                self.table_mut(table)?.indexes.push(index.clone());
                Ok(ExecOutcome::ddl())
            }

            StatementKind::ResetIndexParallel { index } => match self.index_table(index) {
                Some(_) => Ok(ExecOutcome::ddl()),
                None => Err(index_not_found(index)),
            },

            StatementKind::CreateTrigger { table, trigger } => {
                self.table(table)?;
                let qualified = table.sibling(trigger.name.as_str());
                if let Some(existing) = self.trigger_table(&qualified) {
                    let previous = self.table_mut(&existing)?;
                    previous.triggers.retain(|t| t.name != trigger.name);
                    previous.disabled_triggers.remove(&trigger.name);
                }
                let snapshot = self.table_mut(table)?;
                snapshot.triggers.push(trigger.clone());
                snapshot.disabled_triggers.insert(trigger.name.clone());
                Ok(ExecOutcome::ddl())
            }

            StatementKind::EnableTrigger { trigger } => {
                let table = self
                    .trigger_table(trigger)
                    .ok_or_else(|| trigger_not_found(trigger))?;
                self.table_mut(&table)?.disabled_triggers.remove(&trigger.name);
                Ok(ExecOutcome::ddl())
            }

            StatementKind::SetReadOnly { table, read_only } => {
                self.table_mut(table)?.read_only = *read_only;
                Ok(ExecOutcome::ddl())
            }

            StatementKind::CopyRows { source, target, .. } => {
                let rows = self.table(source)?.rows;
                let snapshot = self.table_mut(target)?;
                if snapshot.read_only {
                    return Err(ExecutionFailure::new(
                        TABLE_READ_ONLY,
                        format!("update operation not allowed on table {target}"),
                    ));
                }
                snapshot.rows += rows;
                Ok(ExecOutcome::rows(rows))
            }

            StatementKind::RenameTable { table, to } => {
                let renamed = table.sibling(to.as_str());
                if self.tables.contains_key(&renamed) {
                    return Err(name_in_use(to));
                }
                let mut snapshot = self
                    .tables
                    .remove(table)
                    .ok_or_else(|| table_not_found(table))?;
                snapshot.name = renamed.clone();
                self.tables.insert(renamed, snapshot);
                Ok(ExecOutcome::ddl())
            }

            StatementKind::RenameConstraint { table, from, to } => {
                if self.table(table)?.constraint(from).is_none() {
                    return Err(ExecutionFailure::new(
                        NO_SUCH_CONSTRAINT,
                        format!("constraint {from} does not exist"),
                    ));
                }
                if self.constraint_in_use(&table.owner, to) {
                    return Err(ExecutionFailure::new(
                        CONSTRAINT_NAME_IN_USE,
                        format!("name {to} already used by an existing constraint"),
                    ));
                }
                let snapshot = self.table_mut(table)?;
                for constraint in snapshot.constraints.iter_mut().filter(|c| c.name == *from) {
                    constraint.name = to.clone();
                }
                if snapshot.disabled_constraints.remove(from) {
                    snapshot.disabled_constraints.insert(to.clone());
                }
                Ok(ExecOutcome::ddl())
            }

            StatementKind::RenameIndex { index, to } => {
                let table = self.index_table(index).ok_or_else(|| index_not_found(index))?;
                if self.index_in_use(&index.owner, to) {
                    return Err(name_in_use(to));
                }
                let snapshot = self.table_mut(&table)?;
                for existing in snapshot.indexes.iter_mut().filter(|i| i.name == index.name) {
                    existing.name = to.clone();
                }
                Ok(ExecOutcome::ddl())
            }

            StatementKind::RenameTrigger { trigger, to } => {
                let table = self
                    .trigger_table(trigger)
                    .ok_or_else(|| trigger_not_found(trigger))?;
                if self.trigger_table(&trigger.sibling(to.as_str())).is_some() {
                    return Err(ExecutionFailure::new(
                        TRIGGER_NAME_IN_USE,
                        format!("trigger {to} already exists"),
                    ));
                }
                let snapshot = self.table_mut(&table)?;
                for existing in snapshot.triggers.iter_mut().filter(|t| t.name == trigger.name) {
                    existing.name = to.clone();
                }
                if snapshot.disabled_triggers.remove(&trigger.name) {
                    snapshot.disabled_triggers.insert(to.clone());
                }
                Ok(ExecOutcome::ddl())
            }

            StatementKind::DropTable { table } => {
                self.tables
                    .remove(table)
                    .map(|_| ExecOutcome::ddl())
                    .ok_or_else(|| table_not_found(table))
            }

            StatementKind::Raw => Ok(ExecOutcome::rows(self.sync_rows.pop_front().unwrap_or(0))),
        }
    }
}

fn index_not_found(index: &QualifiedName) -> ExecutionFailure {
    ExecutionFailure::new(INDEX_NOT_FOUND, format!("index {index} does not exist"))
}

fn trigger_not_found(trigger: &QualifiedName) -> ExecutionFailure {
    ExecutionFailure::new(TRIGGER_NOT_FOUND, format!("trigger {trigger} does not exist"))
}
