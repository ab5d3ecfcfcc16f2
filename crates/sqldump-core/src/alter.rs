//! ALTER TABLE decomposition.
//!
//! mysqldump and phpMyAdmin exports add keys in trailing `ALTER TABLE`
//! statements. Foreign-key clauses are kept apart from the other key
//! clauses because they can only run once every referenced table exists.

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result};
use crate::lexer::{split_top_level, Cursor};
use crate::schema::{
    parse_column, parse_constraint_prefix, parse_key_definition, ColumnDef, ForeignKey,
    KeyDefinition, KeyKind,
};

/// The kind of a decomposed ALTER clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlterType {
    /// `ADD PRIMARY KEY`
    Primary,
    /// `MODIFY [COLUMN]`
    Modify,
    /// `ADD FOREIGN KEY … REFERENCES`
    Foreign,
    /// `ADD UNIQUE`
    Unique,
    /// `ADD INDEX` / `ADD KEY`
    Index,
}

/// The clauses of one ALTER TABLE statement, partitioned by kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlterSplit {
    /// Altered table.
    pub table: String,
    /// PRIMARY / UNIQUE / INDEX / MODIFY clauses.
    pub key: Vec<String>,
    /// ADD FOREIGN KEY clauses.
    pub foreign: Vec<String>,
    /// Everything else (ADD COLUMN, DROP …, table options).
    pub other: Vec<String>,
}

/// One decomposed ALTER clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterParsed {
    /// Clause kind.
    #[serde(rename = "type")]
    pub kind: AlterType,
    /// Key or constraint name, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The single column of a MODIFY or FOREIGN clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// All columns the clause names.
    pub columns: Vec<String>,
    /// Referenced column, for FOREIGN only.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ForeignKey>,
    /// New column definition, for MODIFY only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<ColumnDef>,
}

impl AlterParsed {
    /// Returns the key this clause adds, or `None` for MODIFY.
    #[must_use]
    pub fn key_definition(&self) -> Option<KeyDefinition> {
        let kind = match self.kind {
            AlterType::Modify => return None,
            AlterType::Primary => KeyKind::Primary,
            AlterType::Unique => KeyKind::Unique,
            AlterType::Index => KeyKind::Index,
            AlterType::Foreign => KeyKind::Foreign,
        };
        Some(KeyDefinition {
            kind,
            name: self.name.clone(),
            columns: self.columns.clone(),
            reference: self.reference.clone(),
        })
    }
}

impl From<KeyDefinition> for AlterParsed {
    fn from(key: KeyDefinition) -> Self {
        let kind = match key.kind {
            KeyKind::Primary => AlterType::Primary,
            KeyKind::Unique => AlterType::Unique,
            KeyKind::Index => AlterType::Index,
            KeyKind::Foreign => AlterType::Foreign,
        };
        let column = match kind {
            AlterType::Foreign => key.columns.first().cloned(),
            _ => None,
        };
        Self {
            kind,
            name: key.name,
            column,
            columns: key.columns,
            reference: key.reference,
            definition: None,
        }
    }
}

/// Reads `ALTER [ONLINE] [IGNORE] TABLE [IF EXISTS] name` and returns the
/// table name.
fn alter_header(cursor: &mut Cursor<'_>) -> Result<String> {
    cursor.expect_word("ALTER", "ALTER TABLE")?;
    cursor.eat_word("ONLINE");
    cursor.eat_word("IGNORE");
    cursor.expect_word("TABLE", "ALTER TABLE")?;
    cursor.eat_words(&["IF", "EXISTS"]);
    cursor.ident("ALTER TABLE")
}

/// Returns the table an ALTER TABLE statement alters.
///
/// # Errors
///
/// Returns [`ParseError`] when the statement does not start with
/// `ALTER TABLE name`.
pub fn alter_table_name(statement: &str) -> Result<String> {
    alter_header(&mut Cursor::new(statement))
}

enum ClauseClass {
    Key,
    Foreign,
    Other,
}

fn classify_clause(clause: &str) -> ClauseClass {
    let mut cursor = Cursor::new(clause);
    if cursor.eat_word("MODIFY") {
        return ClauseClass::Key;
    }
    if !cursor.eat_word("ADD") {
        return ClauseClass::Other;
    }
    if cursor.eat_word("CONSTRAINT") {
        let named = !["PRIMARY", "UNIQUE", "FOREIGN", "CHECK"]
            .iter()
            .any(|k| cursor.peek().is_word(k));
        if named {
            cursor.next_token();
        }
    }
    let token = cursor.peek();
    if token.is_word("FOREIGN") {
        ClauseClass::Foreign
    } else if ["PRIMARY", "UNIQUE", "INDEX", "KEY", "FULLTEXT", "SPATIAL"]
        .iter()
        .any(|k| token.is_word(k))
    {
        ClauseClass::Key
    } else {
        ClauseClass::Other
    }
}

/// Partitions the clauses of an ALTER TABLE statement.
///
/// # Errors
///
/// Returns [`ParseError`] when the table name or the clause list cannot be
/// read.
pub fn split_alter(statement: &str) -> Result<AlterSplit> {
    let mut cursor = Cursor::new(statement);
    let table = alter_header(&mut cursor)?;
    let mut split = AlterSplit {
        table,
        ..AlterSplit::default()
    };
    for clause in split_top_level(cursor.rest(), "ALTER TABLE")? {
        let bucket = match classify_clause(clause) {
            ClauseClass::Key => &mut split.key,
            ClauseClass::Foreign => &mut split.foreign,
            ClauseClass::Other => &mut split.other,
        };
        bucket.push(clause.to_string());
    }
    Ok(split)
}

/// Parses one key, foreign-key or MODIFY clause.
///
/// # Errors
///
/// Returns [`ParseError`] when the clause is malformed or of another kind.
pub fn parse_alter_clause(clause: &str) -> Result<AlterParsed> {
    let mut cursor = Cursor::new(clause);
    if cursor.eat_word("MODIFY") {
        cursor.eat_word("COLUMN");
        cursor.eat_words(&["IF", "EXISTS"]);
        let column = cursor.ident("MODIFY")?;
        let definition = parse_column(cursor.rest())?.named(&column);
        return Ok(AlterParsed {
            kind: AlterType::Modify,
            name: None,
            column: Some(column.clone()),
            columns: vec![column],
            reference: None,
            definition: Some(definition),
        });
    }

    if cursor.eat_word("ADD") {
        let constraint = parse_constraint_prefix(&mut cursor, "ALTER clause")?;
        if let Some(key) = parse_key_definition(&mut cursor, constraint, "ALTER clause")? {
            return Ok(key.into());
        }
    }
    Err(ParseError::UnsupportedClause(clause.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_alter() {
        let split =
            split_alter("ALTER TABLE t ADD PRIMARY KEY (id), ADD FOREIGN KEY (x) REFERENCES y(z)")
                .unwrap();
        assert_eq!(split.table, "t");
        assert_eq!(split.key, vec!["ADD PRIMARY KEY (id)"]);
        assert_eq!(split.foreign, vec!["ADD FOREIGN KEY (x) REFERENCES y(z)"]);
        assert!(split.other.is_empty());
    }

    #[test]
    fn test_split_alter_phpmyadmin_style() {
        let statement = "ALTER TABLE `users`
  ADD PRIMARY KEY (`id`),
  ADD UNIQUE KEY `email` (`email`),
  ADD KEY `role_id` (`role_id`),
  MODIFY `id` int(11) NOT NULL AUTO_INCREMENT,
  ADD CONSTRAINT `users_role` FOREIGN KEY (`role_id`) REFERENCES `roles` (`id`),
  AUTO_INCREMENT=5";
        let split = split_alter(statement).unwrap();
        assert_eq!(split.table, "users");
        assert_eq!(split.key.len(), 4);
        assert_eq!(split.foreign.len(), 1);
        assert_eq!(split.other, vec!["AUTO_INCREMENT=5"]);
    }

    #[test]
    fn test_add_column_goes_to_other() {
        let split = split_alter("ALTER TABLE t ADD COLUMN c int, DROP INDEX k").unwrap();
        assert_eq!(split.other, vec!["ADD COLUMN c int", "DROP INDEX k"]);
    }

    #[test]
    fn test_parse_foreign_clause() {
        let parsed = parse_alter_clause("ADD FOREIGN KEY (x) REFERENCES y(z)").unwrap();
        assert_eq!(parsed.kind, AlterType::Foreign);
        assert_eq!(parsed.column.as_deref(), Some("x"));
        let reference = parsed.reference.unwrap();
        assert_eq!(reference.table, "y");
        assert_eq!(reference.column, "z");
    }

    #[test]
    fn test_parse_key_clauses() {
        let primary = parse_alter_clause("ADD PRIMARY KEY (`id`)").unwrap();
        assert_eq!(primary.kind, AlterType::Primary);
        assert_eq!(primary.columns, vec!["id"]);
        assert!(primary.reference.is_none());

        let unique = parse_alter_clause("ADD UNIQUE KEY `email` (`email`)").unwrap();
        assert_eq!(unique.kind, AlterType::Unique);
        assert_eq!(unique.name.as_deref(), Some("email"));

        let index = parse_alter_clause("ADD INDEX (a, b)").unwrap();
        assert_eq!(index.kind, AlterType::Index);
        assert_eq!(index.name, None);

        let fulltext = parse_alter_clause("ADD FULLTEXT KEY `ft` (`body`)").unwrap();
        assert_eq!(fulltext.kind, AlterType::Index);
    }

    #[test]
    fn test_parse_modify_clause() {
        let parsed = parse_alter_clause("MODIFY COLUMN `id` int(11) NOT NULL AUTO_INCREMENT").unwrap();
        assert_eq!(parsed.kind, AlterType::Modify);
        assert_eq!(parsed.column.as_deref(), Some("id"));
        let definition = parsed.definition.unwrap();
        assert!(definition.is_auto_increment);
        assert_eq!(definition.typesize, 11);
    }

    #[test]
    fn test_malformed_reference_fails_the_clause() {
        let err = parse_alter_clause("ADD FOREIGN KEY (x) y(z)").unwrap_err();
        assert!(matches!(err, ParseError::MalformedReference(_)));
    }

    #[test]
    fn test_unsupported_clause() {
        let err = parse_alter_clause("DROP COLUMN c").unwrap_err();
        assert_eq!(err, ParseError::UnsupportedClause("DROP COLUMN c".to_string()));
    }

    #[test]
    fn test_alter_table_name() {
        assert_eq!(alter_table_name("ALTER TABLE `db`.`t` ENGINE=InnoDB").unwrap(), "t");
        assert!(alter_table_name("ALTER VIEW v AS SELECT 1").is_err());
    }

    #[test]
    fn test_alter_parsed_serializes_with_type_and_ref() {
        let parsed = parse_alter_clause("ADD FOREIGN KEY (x) REFERENCES y(z)").unwrap();
        let json = serde_json::to_value(&parsed).unwrap();
        assert_eq!(json["type"], "FOREIGN");
        assert_eq!(json["ref"]["table"], "y");
    }
}
