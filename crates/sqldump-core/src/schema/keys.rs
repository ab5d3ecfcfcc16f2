//! Key metadata and the shared key-definition parser.
//!
//! The same grammar appears inside `CREATE TABLE` bodies and in
//! `ALTER TABLE … ADD …` clauses, so both parsers delegate here.

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};
use crate::lexer::{Cursor, TokenKind};

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as `NoAction` in MySQL).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    fn parse(cursor: &mut Cursor<'_>, context: &str) -> Result<Self> {
        if cursor.eat_word("RESTRICT") {
            Ok(Self::Restrict)
        } else if cursor.eat_word("CASCADE") {
            Ok(Self::Cascade)
        } else if cursor.eat_words(&["SET", "NULL"]) {
            Ok(Self::SetNull)
        } else if cursor.eat_words(&["SET", "DEFAULT"]) {
            Ok(Self::SetDefault)
        } else if cursor.eat_words(&["NO", "ACTION"]) {
            Ok(Self::NoAction)
        } else {
            Err(ParseError::expected("referential action", context))
        }
    }
}

/// A reference to another table's column.
///
/// This is a name-level reference only: the referenced table may not have
/// been seen yet when the key is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Name of the referenced table.
    pub table: String,
    /// The referenced column matching the owning column.
    pub column: String,
    /// All referenced columns of the constraint.
    pub columns: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

/// A key a column takes part in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Name of the key.
    pub name: String,
    /// The column this entry is attached to.
    pub column: String,
    /// All columns of the key, in key order.
    pub columns: Vec<String>,
    /// Referenced column, for foreign keys only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ForeignKey>,
}

/// Which kind of key a definition declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// `PRIMARY KEY`
    Primary,
    /// `UNIQUE [KEY]`
    Unique,
    /// `KEY` / `INDEX` / `FULLTEXT` / `SPATIAL`
    Index,
    /// `FOREIGN KEY … REFERENCES`
    Foreign,
}

/// A parsed key definition, before it is attached to columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    /// Key kind.
    pub kind: KeyKind,
    /// Declared name, if any.
    pub name: Option<String>,
    /// Key columns.
    pub columns: Vec<String>,
    /// Referenced table and columns, for foreign keys.
    pub reference: Option<ForeignKey>,
}

const CONSTRAINT_KINDS: &[&str] = &["PRIMARY", "UNIQUE", "FOREIGN", "CHECK"];

/// Reads an optional `CONSTRAINT [symbol]` prefix and returns the symbol.
pub(crate) fn parse_constraint_prefix(cursor: &mut Cursor<'_>, context: &str) -> Result<Option<String>> {
    if !cursor.eat_word("CONSTRAINT") {
        return Ok(None);
    }
    let is_kind = CONSTRAINT_KINDS.iter().any(|k| cursor.peek().is_word(k));
    if is_kind || cursor.peek().ident().is_none() {
        return Ok(None);
    }
    cursor.ident(context).map(Some)
}

fn skip_index_type(cursor: &mut Cursor<'_>) {
    if cursor.eat_word("USING") {
        cursor.next_token();
    }
}

/// Reads an optional index name that precedes the column list.
fn optional_key_name(cursor: &mut Cursor<'_>, context: &str) -> Result<Option<String>> {
    if cursor.peek().kind == TokenKind::LeftParen || cursor.peek().is_word("USING") {
        return Ok(None);
    }
    if cursor.peek().ident().is_none() {
        return Ok(None);
    }
    cursor.ident(context).map(Some)
}

/// Parses a key definition at the cursor. Returns `Ok(None)` when the cursor
/// is not positioned on one, leaving it untouched.
pub(crate) fn parse_key_definition(
    cursor: &mut Cursor<'_>,
    constraint: Option<String>,
    context: &str,
) -> Result<Option<KeyDefinition>> {
    let (kind, name) = if cursor.eat_words(&["PRIMARY", "KEY"]) {
        skip_index_type(cursor);
        (KeyKind::Primary, Some("PRIMARY".to_string()))
    } else if cursor.eat_word("UNIQUE") {
        if !cursor.eat_word("KEY") {
            cursor.eat_word("INDEX");
        }
        let name = optional_key_name(cursor, context)?.or(constraint);
        skip_index_type(cursor);
        (KeyKind::Unique, name)
    } else if cursor.eat_word("FULLTEXT") || cursor.eat_word("SPATIAL") {
        if !cursor.eat_word("KEY") {
            cursor.eat_word("INDEX");
        }
        let name = optional_key_name(cursor, context)?;
        (KeyKind::Index, name)
    } else if cursor.eat_word("KEY") || cursor.eat_word("INDEX") {
        let name = optional_key_name(cursor, context)?;
        skip_index_type(cursor);
        (KeyKind::Index, name)
    } else if cursor.eat_words(&["FOREIGN", "KEY"]) {
        let index_name = optional_key_name(cursor, context)?;
        (KeyKind::Foreign, constraint.or(index_name))
    } else {
        return Ok(None);
    };

    let columns = cursor.ident_list(context)?;
    skip_index_type(cursor);

    let reference = if kind == KeyKind::Foreign {
        Some(parse_reference(cursor, &columns)?)
    } else {
        None
    };

    Ok(Some(KeyDefinition {
        kind,
        name,
        columns,
        reference,
    }))
}

/// Parses `REFERENCES tbl (cols) [ON DELETE …] [ON UPDATE …]`.
fn parse_reference(cursor: &mut Cursor<'_>, local: &[String]) -> Result<ForeignKey> {
    let text = cursor.rest().to_string();
    let malformed = || ParseError::MalformedReference(text.clone());

    if !cursor.eat_word("REFERENCES") {
        return Err(malformed());
    }
    let table = cursor.ident("REFERENCES").map_err(|_| malformed())?;
    let columns = cursor.ident_list("REFERENCES").map_err(|_| malformed())?;
    if columns.len() != local.len() {
        return Err(malformed());
    }

    let mut reference = ForeignKey {
        table,
        column: columns[0].clone(),
        columns,
        on_delete: ForeignKeyAction::default(),
        on_update: ForeignKeyAction::default(),
    };

    loop {
        if cursor.eat_word("MATCH") {
            cursor.next_token();
        } else if cursor.eat_words(&["ON", "DELETE"]) {
            reference.on_delete = ForeignKeyAction::parse(cursor, "ON DELETE")?;
        } else if cursor.eat_words(&["ON", "UPDATE"]) {
            reference.on_update = ForeignKeyAction::parse(cursor, "ON UPDATE")?;
        } else {
            return Ok(reference);
        }
    }
}

impl KeyDefinition {
    /// Renders the definition as it appears in a CREATE TABLE body or after
    /// `ALTER TABLE … ADD`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let columns = quote_list(&self.columns);
        let name = self.name.as_deref().map(super::quote_identifier);
        match self.kind {
            KeyKind::Primary => format!("PRIMARY KEY ({columns})"),
            KeyKind::Unique => match name {
                Some(name) => format!("UNIQUE KEY {name} ({columns})"),
                None => format!("UNIQUE KEY ({columns})"),
            },
            KeyKind::Index => match name {
                Some(name) => format!("KEY {name} ({columns})"),
                None => format!("KEY ({columns})"),
            },
            KeyKind::Foreign => {
                let mut sql = match name {
                    Some(name) => format!("CONSTRAINT {name} FOREIGN KEY ({columns})"),
                    None => format!("FOREIGN KEY ({columns})"),
                };
                if let Some(reference) = &self.reference {
                    sql.push_str(&format!(
                        " REFERENCES {} ({})",
                        super::quote_identifier(&reference.table),
                        quote_list(&reference.columns)
                    ));
                    if reference.on_delete != ForeignKeyAction::NoAction {
                        sql.push_str(" ON DELETE ");
                        sql.push_str(reference.on_delete.to_sql());
                    }
                    if reference.on_update != ForeignKeyAction::NoAction {
                        sql.push_str(" ON UPDATE ");
                        sql.push_str(reference.on_update.to_sql());
                    }
                }
                sql
            }
        }
    }
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| super::quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}
