//! CREATE TABLE parsing and table-level schema operations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::column::{parse_column_line, ColumnDef};
use super::keys::{
    parse_constraint_prefix, parse_key_definition, ForeignKey, KeyDefinition, KeyInfo, KeyKind,
};
use super::quote_identifier;
use crate::alter::{AlterParsed, AlterType};
use crate::error::{ParseError, Result};
use crate::lexer::{split_top_level, Cursor, Span, TokenKind};
use crate::resolver::TableDeps;

/// One table's schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name, unquoted and without schema qualifier.
    pub name: String,
    /// Columns in declaration order.
    pub columns: IndexMap<String, ColumnDef>,
    /// Source table of a `CREATE TABLE … LIKE` statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like: Option<String>,
}

impl TableInfo {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
            like: None,
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, column: ColumnDef) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    /// Returns a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    /// Primary key columns, in declaration order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.is_primary)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Tables this table must be created after.
    #[must_use]
    pub fn dependencies(&self) -> TableDeps {
        let mut dependencies: Vec<String> = Vec::new();
        let referenced = self
            .columns
            .values()
            .flat_map(|c| &c.foreign)
            .filter_map(|k| k.reference.as_ref())
            .map(|r| r.table.as_str())
            .chain(self.like.as_deref());
        for table in referenced {
            if !dependencies.iter().any(|d| d == table) {
                dependencies.push(table.to_string());
            }
        }
        TableDeps::new(&self.name, dependencies)
    }

    /// Returns the unique, index and foreign keys of the table, one entry
    /// per key name, grouped in that order.
    #[must_use]
    pub fn keys(&self) -> Vec<KeyDefinition> {
        let mut keys: Vec<KeyDefinition> = Vec::new();
        for kind in [KeyKind::Unique, KeyKind::Index, KeyKind::Foreign] {
            for key in self.columns.values().flat_map(|c| keys_of(c, kind)) {
                if keys.iter().any(|k| k.kind == kind && k.name.as_deref() == Some(key.name.as_str())) {
                    continue;
                }
                keys.push(KeyDefinition {
                    kind,
                    name: Some(key.name.clone()),
                    columns: key.columns.clone(),
                    reference: key.reference.clone().map(|mut r| {
                        if let Some(first) = r.columns.first() {
                            r.column = first.clone();
                        }
                        r
                    }),
                });
            }
        }
        keys
    }

    /// Splits off the foreign keys that reference any of `tables`. Returns
    /// the table without them and the removed key definitions.
    #[must_use]
    pub fn without_foreign_keys_to(&self, tables: &[String]) -> (Self, Vec<KeyDefinition>) {
        let points_into = |reference: Option<&ForeignKey>| {
            reference.is_some_and(|r| tables.iter().any(|t| *t == r.table))
        };
        let removed = self
            .keys()
            .into_iter()
            .filter(|k| k.kind == KeyKind::Foreign && points_into(k.reference.as_ref()))
            .collect();
        let mut table = self.clone();
        for column in table.columns.values_mut() {
            column.foreign.retain(|k| !points_into(k.reference.as_ref()));
        }
        (table, removed)
    }

    /// Returns a copy of the table with one ALTER clause applied.
    ///
    /// Keys naming columns the table does not have are skipped.
    #[must_use]
    pub fn apply_alter(&self, alter: &AlterParsed) -> Self {
        let mut table = self.clone();
        if alter.kind == AlterType::Modify {
            let (Some(name), Some(definition)) = (&alter.column, &alter.definition) else {
                return table;
            };
            let definition = definition.clone().named(name);
            let merged = match self.columns.get(name) {
                Some(previous) => definition.keeping_keys_of(previous),
                None => {
                    warn!(table = %self.name, column = %name, "MODIFY of unknown column");
                    definition
                }
            };
            table.columns.insert(name.clone(), merged);
            return table;
        }

        if let Some(key) = alter.key_definition() {
            let missing = table.attach_key(key);
            if !missing.is_empty() {
                warn!(table = %self.name, columns = ?missing, "key names unknown columns");
            }
        }
        table
    }

    /// Attaches a key to its member columns and returns the names of
    /// members the table does not have.
    pub(crate) fn attach_key(&mut self, key: KeyDefinition) -> Vec<String> {
        let missing: Vec<String> = key
            .columns
            .iter()
            .filter(|c| !self.columns.contains_key(*c))
            .cloned()
            .collect();

        let name = match (&key.name, key.kind) {
            (Some(name), _) => name.clone(),
            (None, KeyKind::Primary) => "PRIMARY".to_string(),
            (None, KeyKind::Foreign) => self.next_foreign_key_name(),
            (None, _) => self.free_index_name(key.columns.first().map_or("", String::as_str)),
        };

        for (i, column_name) in key.columns.iter().enumerate() {
            let Some(column) = self.columns.get_mut(column_name) else {
                continue;
            };
            let reference = key.reference.as_ref().map(|r| ForeignKey {
                column: r.columns.get(i).cloned().unwrap_or_else(|| r.column.clone()),
                ..r.clone()
            });
            let info = KeyInfo {
                name: name.clone(),
                column: column_name.clone(),
                columns: key.columns.clone(),
                reference,
            };
            let target = match key.kind {
                KeyKind::Primary => {
                    column.is_primary = true;
                    column.is_nullable = false;
                    continue;
                }
                KeyKind::Unique => &mut column.unique,
                KeyKind::Index => &mut column.index,
                KeyKind::Foreign => &mut column.foreign,
            };
            match target.iter_mut().find(|k| k.name == info.name) {
                Some(existing) => *existing = info,
                None => target.push(info),
            }
        }
        missing
    }

    fn key_names(&self) -> impl Iterator<Item = &str> {
        self.columns
            .values()
            .flat_map(|c| c.unique.iter().chain(&c.index).chain(&c.foreign))
            .map(|k| k.name.as_str())
    }

    /// MySQL names unnamed foreign keys `<table>_ibfk_<n>`.
    fn next_foreign_key_name(&self) -> String {
        let prefix = format!("{}_ibfk_", self.name);
        let highest = self
            .key_names()
            .filter_map(|n| n.strip_prefix(&prefix)?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{prefix}{}", highest + 1)
    }

    /// MySQL names unnamed indexes after their first column, adding `_2`,
    /// `_3`, … on collision.
    fn free_index_name(&self, column: &str) -> String {
        let taken: Vec<&str> = self.key_names().collect();
        if !taken.contains(&column) {
            return column.to_string();
        }
        (2..)
            .map(|n| format!("{column}_{n}"))
            .find(|candidate| !taken.contains(&candidate.as_str()))
            .unwrap_or_else(|| column.to_string())
    }

    /// Renders a CREATE TABLE statement for this schema.
    #[must_use]
    pub fn to_create_sql(&self) -> String {
        let name = quote_identifier(&self.name);
        if let Some(like) = &self.like {
            if self.columns.is_empty() {
                return format!("CREATE TABLE {name} LIKE {}", quote_identifier(like));
            }
        }

        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|(n, c)| format!("  {} {}", quote_identifier(n), c.modify_definition()))
            .collect();
        let primary = self.primary_key();
        if !primary.is_empty() {
            let columns: Vec<String> = primary.iter().map(|c| quote_identifier(c)).collect();
            lines.push(format!("  PRIMARY KEY ({})", columns.join(", ")));
        }
        lines.extend(self.keys().iter().map(|k| format!("  {}", k.to_sql())));

        format!("CREATE TABLE {name} (\n{}\n)", lines.join(",\n"))
    }
}

fn keys_of(column: &ColumnDef, kind: KeyKind) -> &[KeyInfo] {
    match kind {
        KeyKind::Primary => &[],
        KeyKind::Unique => &column.unique,
        KeyKind::Index => &column.index,
        KeyKind::Foreign => &column.foreign,
    }
}

/// Reads `CREATE [OR REPLACE] [TEMPORARY] TABLE [IF NOT EXISTS] name`.
fn table_header(cursor: &mut Cursor<'_>) -> Result<String> {
    cursor.expect_word("CREATE", "CREATE TABLE")?;
    cursor.eat_words(&["OR", "REPLACE"]);
    cursor.eat_word("TEMPORARY");
    cursor.expect_word("TABLE", "CREATE TABLE")?;
    cursor.eat_words(&["IF", "NOT", "EXISTS"]);
    cursor.ident("CREATE TABLE")
}

/// Locates the parenthesised body of a CREATE TABLE statement.
fn table_body(statement: &str) -> Result<(String, Option<Span>, Option<String>)> {
    let mut cursor = Cursor::new(statement);
    let name = table_header(&mut cursor)?;
    if cursor.eat_word("LIKE") {
        let like = cursor.ident("LIKE")?;
        return Ok((name, None, Some(like)));
    }
    if cursor.peek().kind != TokenKind::LeftParen {
        return Ok((name, None, None));
    }
    let group = cursor.skip_group("CREATE TABLE")?;
    let inner = Span::new(group.start + 1, group.end - 1);

    let mut head = Cursor::new(inner.slice(statement));
    if head.eat_word("LIKE") {
        let like = head.ident("LIKE")?;
        return Ok((name, None, Some(like)));
    }
    Ok((name, Some(inner), None))
}

enum TableItem {
    Column(String, ColumnDef),
    Key(KeyDefinition),
    Ignored,
}

fn parse_table_item(item: &str) -> Result<TableItem> {
    let mut cursor = Cursor::new(item);
    let had_constraint = cursor.peek().is_word("CONSTRAINT");
    let constraint = parse_constraint_prefix(&mut cursor, "table constraint")?;
    if let Some(key) = parse_key_definition(&mut cursor, constraint, "table key")? {
        return Ok(TableItem::Key(key));
    }
    // CHECK constraints and system-versioning periods carry no column data.
    if had_constraint || cursor.peek().is_word("CHECK") || cursor.peek().is_word("PERIOD") {
        return Ok(TableItem::Ignored);
    }
    let (name, column) = parse_column_line(item)?;
    Ok(TableItem::Column(name, column))
}

/// Parses a CREATE TABLE statement into a [`TableInfo`].
///
/// `CREATE TABLE … LIKE other` and `CREATE TABLE … AS SELECT` yield a table
/// without columns; the former records `other` as a dependency.
///
/// # Errors
///
/// Returns [`ParseError`](crate::ParseError) when the header or a column
/// or key line cannot be parsed.
pub fn parse_create_table(statement: &str) -> Result<TableInfo> {
    let (name, body, like) = table_body(statement)?;
    let mut table = TableInfo::new(&name);
    table.like = like;
    let Some(body) = body else {
        return Ok(table);
    };

    let mut keys = Vec::new();
    for item in split_top_level(body.slice(statement), "CREATE TABLE")? {
        match parse_table_item(item)? {
            TableItem::Column(column_name, column) => {
                table.columns.insert(column_name, column);
            }
            TableItem::Key(key) => keys.push(key),
            TableItem::Ignored => {}
        }
    }
    for key in keys {
        if let Some(column) = table.attach_key(key).first() {
            return Err(ParseError::expected(
                format!("column `{column}`"),
                format!("keys of table `{name}`"),
            ));
        }
    }
    debug!(table = %name, columns = table.columns.len(), "parsed table");
    Ok(table)
}

/// Removes the foreign-key lines that reference any of `referenced` from a
/// CREATE TABLE statement.
///
/// Returns the rewritten statement and one `ALTER TABLE … ADD …` statement
/// per removed key. The statement is returned unchanged when nothing
/// matches.
///
/// # Errors
///
/// Returns [`ParseError`](crate::ParseError) when the statement has no
/// balanced column list.
pub fn strip_foreign_keys(statement: &str, referenced: &[String]) -> Result<(String, Vec<String>)> {
    let (name, body, _) = table_body(statement)?;
    let Some(body) = body else {
        return Ok((statement.to_string(), Vec::new()));
    };

    let mut kept = Vec::new();
    let mut moved = Vec::new();
    for item in split_top_level(body.slice(statement), "CREATE TABLE")? {
        let mut cursor = Cursor::new(item);
        let constraint = parse_constraint_prefix(&mut cursor, "table constraint")?;
        let defers = match parse_key_definition(&mut cursor, constraint, "table key")? {
            Some(key) => key
                .reference
                .is_some_and(|r| referenced.iter().any(|t| *t == r.table)),
            None => false,
        };
        if defers {
            moved.push(format!("ALTER TABLE {} ADD {item}", quote_identifier(&name)));
        } else {
            kept.push(item);
        }
    }

    if moved.is_empty() {
        return Ok((statement.to_string(), moved));
    }
    let head = statement.get(..body.start).unwrap_or_default();
    let tail = statement.get(body.end..).unwrap_or_default();
    let rewritten = format!("{}\n  {}\n{}", head.trim_end(), kept.join(",\n  "), tail.trim_start());
    Ok((rewritten, moved))
}
