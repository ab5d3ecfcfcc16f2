//! Statement classification.
//!
//! A dump is split into statements, and each statement is matched against an
//! ordered list of kind patterns. Statements matching no pattern land in
//! `misc`. Statements whose kind needs structural parsing (CREATE TABLE,
//! ALTER TABLE, INSERT) are parsed here as well; parse failures are reported
//! as [`FailedQuery`] values rather than aborting the dump.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::alter::{parse_alter_clause, split_alter};
use crate::error::{ParseError, ResolutionError};
use crate::insert::insert_target;
use crate::lexer::split_statements;
use crate::resolver::{resolve, DeferredKey, TableDeps};
use crate::schema::{parse_create_table, Schema, TableInfo};

/// The kind of a dump statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// CREATE TABLE
    Table,
    /// CREATE VIEW
    View,
    /// CREATE FUNCTION
    Function,
    /// CREATE PROCEDURE
    Procedure,
    /// CREATE TRIGGER
    Trigger,
    /// ALTER TABLE
    Alter,
    /// INSERT
    Insert,
    /// DROP TABLE
    Drop,
    /// Anything else.
    Misc,
}

const DEFINER: &str = r"(?:DEFINER\s*=\s*\S+\s+)?";

fn pattern(body: &str) -> Regex {
    let source = format!(r"(?is)^\s*{body}");
    Regex::new(&source).expect("statement pattern is valid")
}

/// Kind patterns, tried in order.
static MATCHERS: Lazy<Vec<(StatementKind, Regex)>> = Lazy::new(|| {
    vec![
        (
            StatementKind::Table,
            pattern(r"CREATE\s+(?:OR\s+REPLACE\s+)?(?:TEMPORARY\s+)?TABLE\b"),
        ),
        (
            StatementKind::View,
            pattern(&format!(
                r"CREATE\s+(?:OR\s+REPLACE\s+)?(?:ALGORITHM\s*=\s*\w+\s+)?{DEFINER}(?:SQL\s+SECURITY\s+\w+\s+)?VIEW\b"
            )),
        ),
        (
            StatementKind::Function,
            pattern(&format!(
                r"CREATE\s+(?:OR\s+REPLACE\s+)?{DEFINER}(?:AGGREGATE\s+)?FUNCTION\b"
            )),
        ),
        (
            StatementKind::Procedure,
            pattern(&format!(r"CREATE\s+(?:OR\s+REPLACE\s+)?{DEFINER}PROCEDURE\b")),
        ),
        (
            StatementKind::Trigger,
            pattern(&format!(r"CREATE\s+(?:OR\s+REPLACE\s+)?{DEFINER}TRIGGER\b")),
        ),
        (
            StatementKind::Alter,
            pattern(r"ALTER\s+(?:ONLINE\s+)?(?:IGNORE\s+)?TABLE\b"),
        ),
        (
            StatementKind::Insert,
            pattern(r"INSERT\s+(?:(?:LOW_PRIORITY|DELAYED|HIGH_PRIORITY)\s+)?(?:IGNORE\s+)?(?:INTO\s+)?[`\w]"),
        ),
        (
            StatementKind::Drop,
            pattern(r"DROP\s+(?:TEMPORARY\s+)?TABLE\b"),
        ),
    ]
});

/// `/*!50003` openers and `*/` closers of conditional comments.
static CONDITIONAL_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\*!\d*\s?|\s?\*/").expect("conditional comment pattern is valid"));

/// Returns the kind of a single statement.
///
/// mysqldump wraps view, routine and trigger headers in `/*!NNNNN … */`
/// conditional comments; those markers are ignored for matching.
#[must_use]
pub fn classify_statement(statement: &str) -> StatementKind {
    let normalized = CONDITIONAL_MARKERS.replace_all(statement, " ");
    MATCHERS
        .iter()
        .find(|(_, re)| re.is_match(&normalized))
        .map_or(StatementKind::Misc, |(kind, _)| *kind)
}

/// A statement (or ALTER clause) that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedQuery {
    /// Error number.
    pub code: u32,
    /// Error message.
    pub msg: String,
    /// The failed statement or clause.
    pub query: String,
}

impl FailedQuery {
    /// Creates a failure record.
    #[must_use]
    pub fn new(code: u32, msg: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            query: query.into(),
        }
    }

    /// Records a parse error against `query`.
    #[must_use]
    pub fn from_parse_error(error: &ParseError, query: impl Into<String>) -> Self {
        Self::new(error.code(), error.to_string(), query)
    }
}

/// CREATE statements that do not create tables.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NonTableCreate {
    /// CREATE FUNCTION statements.
    pub functions: Vec<String>,
    /// CREATE PROCEDURE statements.
    pub procedures: Vec<String>,
    /// CREATE TRIGGER statements.
    pub triggers: Vec<String>,
}

/// Where a `misc` statement stood relative to the other statements.
///
/// Session settings at the top of a dump must run before anything else,
/// and the `DROP VIEW` and `SET` lines mysqldump writes in front of a view,
/// routine or trigger must run right before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiscPosition {
    /// Before the first statement of any other kind.
    Leading,
    /// Right before statement `index` of the view, function, procedure or
    /// trigger bucket.
    Before { kind: StatementKind, index: usize },
    /// Anywhere else.
    Trailing,
}

/// A classified dump.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// CREATE FUNCTION statements.
    pub functions: Vec<String>,
    /// CREATE PROCEDURE statements.
    pub procedures: Vec<String>,
    /// CREATE TRIGGER statements.
    pub triggers: Vec<String>,
    /// CREATE TABLE statements.
    pub table: Vec<String>,
    /// ALTER TABLE statements.
    pub alter: Vec<String>,
    /// CREATE VIEW statements.
    pub view: Vec<String>,
    /// INSERT statements grouped by target table.
    pub insert: BTreeMap<String, Vec<String>>,
    /// DROP TABLE statements.
    pub drop: Vec<String>,
    /// Table names in creation order.
    pub sort: Vec<String>,
    /// Foreign keys that must be added after creation to break cycles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<DeferredKey>,
    /// Statements of any other kind.
    pub misc: Vec<String>,
    /// Position of each `misc` statement, by index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misc_positions: Vec<MiscPosition>,
    /// Parsed CREATE TABLE statements, in input order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableInfo>,
}

impl ParsedQuery {
    /// Number of statements held in the buckets.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.functions.len()
            + self.procedures.len()
            + self.triggers.len()
            + self.table.len()
            + self.alter.len()
            + self.view.len()
            + self.insert.values().map(Vec::len).sum::<usize>()
            + self.drop.len()
            + self.misc.len()
    }

    /// The `misc` statements with their positions. Statements without a
    /// recorded position are trailing.
    pub fn misc_with_positions(&self) -> impl Iterator<Item = (&str, MiscPosition)> {
        self.misc.iter().enumerate().map(|(i, sql)| {
            let position = self
                .misc_positions
                .get(i)
                .copied()
                .unwrap_or(MiscPosition::Trailing);
            (sql.as_str(), position)
        })
    }

    /// The function, procedure and trigger buckets.
    #[must_use]
    pub fn non_table_creates(&self) -> NonTableCreate {
        NonTableCreate {
            functions: self.functions.clone(),
            procedures: self.procedures.clone(),
            triggers: self.triggers.clone(),
        }
    }

    /// Returns the CREATE TABLE statement of `table`, if any.
    #[must_use]
    pub fn create_statement(&self, table: &str) -> Option<&str> {
        self.tables
            .iter()
            .position(|t| t.name == table)
            .and_then(|i| self.table.get(i))
            .map(String::as_str)
    }

    /// The schema the dump creates: every parsed table with the key,
    /// foreign-key and MODIFY clauses of the ALTER statements applied.
    #[must_use]
    pub fn schema(&self) -> Schema {
        let mut schema: Schema = self
            .tables
            .iter()
            .map(|t| (t.name.clone(), t.clone()))
            .collect();

        for statement in &self.alter {
            let Ok(split) = split_alter(statement) else {
                continue;
            };
            let Some(mut table) = schema.get(&split.table).cloned() else {
                debug!(table = %split.table, "ALTER of a table the dump does not create");
                continue;
            };
            for clause in split.key.iter().chain(&split.foreign) {
                if let Ok(parsed) = parse_alter_clause(clause) {
                    table = table.apply_alter(&parsed);
                }
            }
            schema.insert(split.table, table);
        }
        schema
    }
}

/// Classifies every statement of `dump`.
///
/// Statement-level parse failures are returned alongside the result and the
/// statement is left out of the buckets. Failures of single ALTER clauses
/// are reported with the clause as query; the statement stays in `alter`.
///
/// # Errors
///
/// Returns [`ResolutionError`] when the tables cannot be ordered.
pub fn classify(dump: &str) -> Result<(ParsedQuery, Vec<FailedQuery>), ResolutionError> {
    let mut parsed = ParsedQuery::default();
    let mut failed = Vec::new();
    let mut pending_misc = Vec::new();
    let mut seen_other = false;

    for statement in split_statements(dump) {
        let text = statement.text;
        let kind = classify_statement(&text);
        debug!(kind = ?kind, at = statement.span.start, "classified statement");

        let outcome: Result<&mut Vec<String>, ParseError> = match kind {
            StatementKind::Table => match parse_create_table(&text) {
                Ok(table) => {
                    parsed.tables.push(table);
                    Ok(&mut parsed.table)
                }
                Err(err) => Err(err),
            },
            StatementKind::Alter => match split_alter(&text) {
                Ok(split) => {
                    for clause in split.key.iter().chain(&split.foreign) {
                        if let Err(err) = parse_alter_clause(clause) {
                            warn!(table = %split.table, error = %err, "failed ALTER clause");
                            failed.push(FailedQuery::from_parse_error(&err, clause.as_str()));
                        }
                    }
                    Ok(&mut parsed.alter)
                }
                Err(err) => Err(err),
            },
            StatementKind::Insert => match insert_target(&text) {
                Ok(table) => Ok(parsed.insert.entry(table).or_default()),
                Err(err) => Err(err),
            },
            StatementKind::View => Ok(&mut parsed.view),
            StatementKind::Function => Ok(&mut parsed.functions),
            StatementKind::Procedure => Ok(&mut parsed.procedures),
            StatementKind::Trigger => Ok(&mut parsed.triggers),
            StatementKind::Drop => Ok(&mut parsed.drop),
            StatementKind::Misc => Ok(&mut parsed.misc),
        };

        match outcome {
            Ok(bucket) => {
                bucket.push(text);
                let index = bucket.len() - 1;
                if kind == StatementKind::Misc {
                    pending_misc.push(index);
                    parsed.misc_positions.push(MiscPosition::Trailing);
                    continue;
                }
                let position = match kind {
                    _ if !seen_other => MiscPosition::Leading,
                    StatementKind::View
                    | StatementKind::Function
                    | StatementKind::Procedure
                    | StatementKind::Trigger => MiscPosition::Before { kind, index },
                    _ => MiscPosition::Trailing,
                };
                for i in pending_misc.drain(..) {
                    parsed.misc_positions[i] = position;
                }
                seen_other = true;
            }
            Err(err) => {
                warn!(kind = ?kind, error = %err, "failed to parse statement");
                failed.push(FailedQuery::from_parse_error(&err, text));
            }
        }
    }

    // Foreign keys added by ALTER statements order the tables too.
    let schema = parsed.schema();
    let dependencies: Vec<TableDeps> = parsed
        .tables
        .iter()
        .map(|t| schema.get(&t.name).unwrap_or(t).dependencies())
        .collect();
    let resolution = resolve(&dependencies)?;
    parsed.sort = resolution.order;
    parsed.deferred = resolution.deferred;

    debug!(
        statements = parsed.statement_count(),
        failed = failed.len(),
        tables = parsed.sort.len(),
        "classified dump"
    );
    Ok((parsed, failed))
}
