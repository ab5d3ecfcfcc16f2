//! Schema differ.
//!
//! Compares a source schema with a target schema column by column and
//! reports what changed, in name order, plus the statements that would turn
//! the source into the target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::resolver::{resolve, Resolution, TableDeps};
use crate::schema::{quote_identifier, ColumnDef, KeyDefinition, KeyKind, Schema, TableInfo};

/// Detail string reported for a column definition that cannot be compared.
pub const UNPARSABLE: &str = "<unparsable>";

/// Options for the differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Report unchanged columns as [`ColumnChange::Same`].
    pub include_same: bool,
}

impl DiffOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes unchanged columns in reports.
    #[must_use]
    pub const fn with_same(mut self) -> Self {
        self.include_same = true;
        self
    }
}

/// How a column differs between source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnChange {
    /// Only in the target.
    #[serde(rename = "new")]
    New,
    /// In both, with different definitions.
    #[serde(rename = "mod")]
    Modified,
    /// Only in the source.
    #[serde(rename = "nomore")]
    Removed,
    /// In both, identical.
    #[serde(rename = "same")]
    Same,
    /// At least one side is malformed.
    #[serde(rename = "unparsable")]
    Unparsable,
}

/// One column's entry in a [`DiffReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDiff {
    /// Kind of change.
    pub change: ColumnChange,
    /// Source definition, absent for new columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Target definition, absent for removed columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Per-table column changes, keyed by column name.
pub type TableDiff = BTreeMap<String, ColumnDiff>;

/// Column changes of every table, keyed by table name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffReport {
    /// Tables with at least one reported column.
    pub tables: BTreeMap<String, TableDiff>,
}

impl DiffReport {
    /// Returns true when no table is reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Returns true when any column is anything other than `Same`.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.tables
            .values()
            .flat_map(BTreeMap::values)
            .any(|c| c.change != ColumnChange::Same)
    }

    /// Returns the entries of one table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDiff> {
        self.tables.get(name)
    }
}

/// A column name with its rendered definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColCompDetail {
    /// Column name.
    pub name: String,
    /// Column definition, e.g. `int NOT NULL`.
    pub detail: String,
}

/// Table-level comparison summary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableCompare {
    /// Columns only in the target, with the target definition.
    pub new: Vec<ColCompDetail>,
    /// Unchanged columns.
    pub same: Vec<ColCompDetail>,
    /// Changed columns, with the target definition.
    #[serde(rename = "mod")]
    pub modified: Vec<ColCompDetail>,
    /// Columns only in the source.
    pub nomore: Vec<String>,
}

fn detail(column: &ColumnDef) -> String {
    if column.is_well_formed() {
        column.to_string()
    } else {
        UNPARSABLE.to_string()
    }
}

/// Compares schemas.
#[derive(Debug, Default)]
pub struct SchemaDiffer {
    options: DiffOptions,
}

impl SchemaDiffer {
    /// Creates a differ with default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: DiffOptions::default(),
        }
    }

    /// Creates a differ with custom options.
    #[must_use]
    pub const fn with_options(options: DiffOptions) -> Self {
        Self { options }
    }

    /// Compares one column.
    #[must_use]
    pub fn diff_column(&self, source: Option<&ColumnDef>, target: Option<&ColumnDef>) -> Option<ColumnDiff> {
        let (change, source, target) = match (source, target) {
            (None, None) => return None,
            (None, Some(t)) => (ColumnChange::New, None, Some(detail(t))),
            (Some(s), None) => (ColumnChange::Removed, Some(detail(s)), None),
            (Some(s), Some(t)) if !s.is_well_formed() || !t.is_well_formed() => {
                (ColumnChange::Unparsable, Some(detail(s)), Some(detail(t)))
            }
            (Some(s), Some(t)) if s == t => {
                if !self.options.include_same {
                    return None;
                }
                (ColumnChange::Same, Some(detail(s)), Some(detail(t)))
            }
            (Some(s), Some(t)) => (ColumnChange::Modified, Some(detail(s)), Some(detail(t))),
        };
        Some(ColumnDiff {
            change,
            source,
            target,
        })
    }

    /// Compares one table. Either side may be absent.
    #[must_use]
    pub fn diff_table(&self, source: Option<&TableInfo>, target: Option<&TableInfo>) -> TableDiff {
        let mut report = TableDiff::new();
        let names = source
            .into_iter()
            .chain(target)
            .flat_map(|t| t.columns.keys());
        for name in names {
            if report.contains_key(name) {
                continue;
            }
            let entry = self.diff_column(
                source.and_then(|t| t.column(name)),
                target.and_then(|t| t.column(name)),
            );
            if let Some(entry) = entry {
                if entry.change == ColumnChange::Unparsable {
                    warn!(column = %name, "column definition is malformed");
                }
                report.insert(name.clone(), entry);
            }
        }
        report
    }

    /// Compares two schemas. Tables present in only one side report every
    /// column as new or removed.
    #[must_use]
    pub fn diff(&self, source: &Schema, target: &Schema) -> DiffReport {
        let mut report = DiffReport::default();
        for name in source.keys().chain(target.keys()) {
            if report.tables.contains_key(name) {
                continue;
            }
            let table = self.diff_table(source.get(name), target.get(name));
            if !table.is_empty() {
                report.tables.insert(name.clone(), table);
            }
        }
        debug!(tables = report.tables.len(), "schema diff complete");
        report
    }

    /// Summarises one table's comparison.
    #[must_use]
    pub fn compare_table(&self, source: Option<&TableInfo>, target: Option<&TableInfo>) -> TableCompare {
        let mut compare = TableCompare::default();
        for (name, entry) in self.diff_table(source, target) {
            let target_detail = || ColCompDetail {
                name: name.clone(),
                detail: entry.target.clone().unwrap_or_default(),
            };
            match entry.change {
                ColumnChange::New => compare.new.push(target_detail()),
                ColumnChange::Modified | ColumnChange::Unparsable => {
                    compare.modified.push(target_detail());
                }
                ColumnChange::Same => compare.same.push(target_detail()),
                ColumnChange::Removed => compare.nomore.push(name.clone()),
            }
        }
        compare
    }

    /// Renders the statements that turn `source` into `target`.
    ///
    /// New tables are created in foreign-key order; keys between new tables
    /// that form a cycle are added by ALTER once every new table exists.
    /// Removed tables are dropped. Columns are added, modified or dropped,
    /// and keys whose definition changed are dropped and re-added. Columns
    /// whose target definition is malformed are skipped.
    #[must_use]
    pub fn migration_sql(&self, source: &Schema, target: &Schema) -> Vec<String> {
        let created: Vec<&TableInfo> = target
            .iter()
            .filter(|(name, _)| !source.contains_key(*name))
            .map(|(_, table)| table)
            .collect();
        let mut statements = create_tables(&created);

        for (name, table) in target {
            if let Some(existing) = source.get(name) {
                statements.extend(alter_table(existing, table));
            }
        }
        for name in source.keys().filter(|n| !target.contains_key(*n)) {
            statements.push(format!("DROP TABLE {}", quote_identifier(name)));
        }
        statements
    }
}

/// CREATE statements for `tables`, referenced tables first, followed by the
/// ALTER statements of the foreign keys that had to be deferred.
fn create_tables(tables: &[&TableInfo]) -> Vec<String> {
    let dependencies: Vec<TableDeps> = tables.iter().map(|t| t.dependencies()).collect();
    let resolution = resolve(&dependencies).unwrap_or_else(|e| {
        warn!(error = %e, "cannot order new tables, keeping name order");
        Resolution {
            order: tables.iter().map(|t| t.name.clone()).collect(),
            deferred: Vec::new(),
        }
    });

    let mut statements = Vec::new();
    let mut deferred = Vec::new();
    for name in &resolution.order {
        let Some(table) = tables.iter().find(|t| t.name == *name) else {
            continue;
        };
        let late = resolution.deferred_for(name);
        if late.is_empty() {
            statements.push(table.to_create_sql());
            continue;
        }
        let (early, keys) = table.without_foreign_keys_to(&late);
        debug!(table = %name, keys = keys.len(), "deferring foreign keys of new table");
        statements.push(early.to_create_sql());
        let quoted = quote_identifier(name);
        deferred.extend(keys.iter().map(|k| format!("ALTER TABLE {quoted} ADD {}", k.to_sql())));
    }
    statements.extend(deferred);
    statements
}

/// Primary key first, then unique, index and foreign keys.
fn table_keys(table: &TableInfo) -> Vec<KeyDefinition> {
    let primary = table.primary_key();
    let mut keys = Vec::new();
    if !primary.is_empty() {
        keys.push(KeyDefinition {
            kind: KeyKind::Primary,
            name: Some("PRIMARY".to_string()),
            columns: primary.iter().map(|c| (*c).to_string()).collect(),
            reference: None,
        });
    }
    keys.extend(table.keys());
    keys
}

fn drop_key(key: &KeyDefinition) -> String {
    let name = quote_identifier(key.name.as_deref().unwrap_or_default());
    match key.kind {
        KeyKind::Primary => "DROP PRIMARY KEY".to_string(),
        KeyKind::Foreign => format!("DROP FOREIGN KEY {name}"),
        KeyKind::Unique | KeyKind::Index => format!("DROP INDEX {name}"),
    }
}

fn alter_table(source: &TableInfo, target: &TableInfo) -> Vec<String> {
    let table = quote_identifier(&target.name);
    let source_keys = table_keys(source);
    let target_keys = table_keys(target);

    // Foreign keys go first, so the indexes they use can be dropped.
    let mut statements: Vec<String> = source_keys
        .iter()
        .rev()
        .filter(|k| !target_keys.contains(k))
        .map(|k| format!("ALTER TABLE {table} {}", drop_key(k)))
        .collect();

    let mut previous: Option<&str> = None;
    for (name, column) in &target.columns {
        let position = match previous {
            Some(previous) => format!(" AFTER {}", quote_identifier(previous)),
            None => " FIRST".to_string(),
        };
        previous = Some(name);

        if !column.is_well_formed() {
            warn!(table = %target.name, column = %name, "skipping malformed column");
            continue;
        }
        let definition = column.modify_definition();
        match source.column(name) {
            None => statements.push(format!(
                "ALTER TABLE {table} ADD COLUMN {} {definition}{position}",
                quote_identifier(name),
            )),
            Some(existing) if existing.modify_definition() != definition => statements.push(format!(
                "ALTER TABLE {table} MODIFY COLUMN {} {definition}",
                quote_identifier(name),
            )),
            Some(_) => {}
        }
    }

    for name in source.columns.keys().filter(|n| target.column(n).is_none()) {
        statements.push(format!(
            "ALTER TABLE {table} DROP COLUMN {}",
            quote_identifier(name)
        ));
    }

    statements.extend(
        target_keys
            .iter()
            .filter(|k| !source_keys.contains(k))
            .map(|k| format!("ALTER TABLE {table} ADD {}", k.to_sql())),
    );
    statements
}

/// Compares two schemas with default options.
#[must_use]
pub fn diff(source: &Schema, target: &Schema) -> DiffReport {
    SchemaDiffer::new().diff(source, target)
}
