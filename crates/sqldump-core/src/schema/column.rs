//! Column definition parsing.
//!
//! A column fragment is everything after the column name in a CREATE TABLE
//! body line or a `MODIFY` clause, e.g. `int(11) unsigned NOT NULL DEFAULT '0'`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::keys::KeyInfo;
use crate::error::{ParseError, Result};
use crate::lexer::{Cursor, Span, TokenKind};

/// Type names the column parser accepts as the first token of a fragment.
const KNOWN_TYPES: &[&str] = &[
    // integers
    "tinyint", "smallint", "mediumint", "int", "integer", "bigint", "int1", "int2", "int3",
    "int4", "int8", "middleint",
    // fixed and floating point
    "decimal", "dec", "numeric", "fixed", "float", "double", "real", "float4", "float8",
    // bit and aliases
    "bit", "bool", "boolean", "serial",
    // temporal
    "date", "datetime", "timestamp", "time", "year",
    // strings and binaries
    "char", "varchar", "nchar", "nvarchar", "binary", "varbinary", "tinyblob", "blob",
    "mediumblob", "longblob", "tinytext", "text", "mediumtext", "longtext", "long",
    "enum", "set", "json",
    // spatial
    "geometry", "point", "linestring", "polygon", "multipoint", "multilinestring",
    "multipolygon", "geometrycollection",
    // MariaDB
    "uuid", "inet4", "inet6", "vector",
];

const CHARACTER_TYPES: &[&str] = &["char", "varchar", "nchar", "nvarchar"];

/// One column's declared type and constraint membership.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ColumnDef {
    /// Canonical type: lowercase datatype, verbatim arguments, then
    /// `unsigned` / `zerofill`.
    #[serde(rename = "type")]
    pub column_type: String,
    /// `UNSIGNED` was given.
    pub is_unsigned: bool,
    /// Lowercase base datatype (`varchar`, `int`, …).
    pub datatype: String,
    /// First numeric type argument, 0 when absent.
    pub typesize: u32,
    /// Character length for `char`/`varchar`, else 0.
    pub length: u32,
    /// Whether NULL is allowed.
    pub is_nullable: bool,
    /// Default value as written. `DEFAULT NULL` is `Some("NULL")`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// `AUTO_INCREMENT` was given.
    pub is_auto_increment: bool,
    /// `ON UPDATE` expression as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    /// Member of the primary key.
    pub is_primary: bool,
    /// Unique keys this column takes part in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique: Vec<KeyInfo>,
    /// Plain indexes this column takes part in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index: Vec<KeyInfo>,
    /// Foreign keys declared on this column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign: Vec<KeyInfo>,
}

impl ColumnDef {
    /// Returns false for a definition without a datatype, which the parser
    /// never produces but hand-built snapshots can.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.datatype.is_empty() && !self.column_type.is_empty()
    }

    /// Renders the fragment used after `MODIFY COLUMN name` or
    /// `ADD COLUMN name`: type and attributes, no key markers.
    #[must_use]
    pub fn modify_definition(&self) -> String {
        let mut sql = self.column_type.clone();
        if !self.is_nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if let Some(on_update) = &self.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(on_update);
        }
        if self.is_auto_increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        sql
    }

    /// Returns true if the column has a single-column unique key.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique.iter().any(|k| k.columns.len() <= 1)
    }

    /// Fills in the column name on inline key markers.
    #[must_use]
    pub(crate) fn named(mut self, name: &str) -> Self {
        for key in &mut self.unique {
            if key.column.is_empty() {
                key.name = name.to_string();
                key.column = name.to_string();
                key.columns = vec![name.to_string()];
            }
        }
        self
    }

    /// Merges the key memberships of `previous` into a redefinition of the
    /// same column, as `MODIFY` keeps existing indexes.
    #[must_use]
    pub(crate) fn keeping_keys_of(mut self, previous: &Self) -> Self {
        self.is_primary |= previous.is_primary;
        if self.is_primary {
            self.is_nullable = false;
        }
        for (mine, theirs) in [
            (&mut self.unique, &previous.unique),
            (&mut self.index, &previous.index),
            (&mut self.foreign, &previous.foreign),
        ] {
            for key in theirs {
                if !mine.iter().any(|k| k.name == key.name) {
                    mine.push(key.clone());
                }
            }
        }
        self
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.modify_definition())?;
        if self.is_primary {
            f.write_str(" PRIMARY KEY")?;
        }
        if self.is_unique() {
            f.write_str(" UNIQUE")?;
        }
        Ok(())
    }
}

impl FromStr for ColumnDef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        parse_column(s)
    }
}

/// Parses a column fragment (the text after the column name).
///
/// Fails only when the fragment is empty or does not start with a known
/// type, or when quoting / parentheses are broken.
///
/// # Errors
///
/// Returns [`ParseError`] when the fragment cannot be parsed.
pub fn parse_column(fragment: &str) -> Result<ColumnDef> {
    let mut cursor = Cursor::new(fragment);
    if cursor.is_eof() {
        return Err(ParseError::EmptyColumn);
    }
    let mut column = parse_type(&mut cursor)?;
    parse_attributes(&mut cursor, &mut column)?;
    Ok(column)
}

/// Parses a full column line, `name fragment`, returning the unquoted name.
///
/// # Errors
///
/// Returns [`ParseError`] when the name or the fragment cannot be parsed.
pub fn parse_column_line(line: &str) -> Result<(String, ColumnDef)> {
    let mut cursor = Cursor::new(line);
    let name = cursor.ident("column definition")?;
    let column = parse_column(cursor.rest())?;
    Ok((name.clone(), column.named(&name)))
}

fn parse_type(cursor: &mut Cursor<'_>) -> Result<ColumnDef> {
    let token = cursor.next_token();
    let datatype = match &token.kind {
        TokenKind::Word(w) => w.to_lowercase(),
        TokenKind::Error(_) => {
            return Err(ParseError::Unterminated {
                context: "column type".to_string(),
            })
        }
        _ => return Err(ParseError::UnknownType(token.span.slice(cursor.source()).to_string())),
    };
    if !KNOWN_TYPES.contains(&datatype.as_str()) {
        return Err(ParseError::UnknownType(datatype));
    }
    // `double precision` is plain `double`; the other two-word spellings
    // name distinct types and keep their second word.
    let second = match datatype.as_str() {
        "double" => {
            cursor.eat_word("precision");
            None
        }
        "long" => ["varchar", "varbinary"].into_iter().find(|w| cursor.eat_word(w)),
        "char" => cursor.eat_word("byte").then_some("byte"),
        _ => None,
    };
    let datatype = match second {
        Some(second) => format!("{datatype} {second}"),
        None => datatype,
    };

    let mut column_type = datatype.clone();
    let mut typesize = 0;
    if cursor.peek().kind == TokenKind::LeftParen {
        let group = cursor.skip_group("column type")?;
        let arguments = type_arguments(group.slice(cursor.source()));
        column_type.push_str(&arguments);
        typesize = first_number(&arguments);
    }

    let mut column = ColumnDef {
        datatype,
        typesize,
        is_nullable: true,
        ..ColumnDef::default()
    };

    let mut zerofill = false;
    loop {
        if cursor.eat_word("UNSIGNED") {
            column.is_unsigned = true;
        } else if cursor.eat_word("ZEROFILL") {
            zerofill = true;
        } else if !cursor.eat_word("SIGNED") {
            break;
        }
    }
    if zerofill {
        column.is_unsigned = true;
    }
    if column.is_unsigned {
        column_type.push_str(" unsigned");
    }
    if zerofill {
        column_type.push_str(" zerofill");
    }
    if CHARACTER_TYPES.contains(&column.datatype.as_str()) {
        column.length = column.typesize;
    }
    column.column_type = column_type;
    Ok(column)
}

/// Re-renders a parenthesised type argument group with the whitespace
/// between tokens removed, so `decimal(10, 2)` and `decimal(10,2)` compare
/// equal.
fn type_arguments(group: &str) -> String {
    let inner = group
        .strip_prefix('(')
        .and_then(|g| g.strip_suffix(')'))
        .unwrap_or(group);

    let mut rendered = String::from("(");
    let mut tokens = Cursor::new(inner);
    while !tokens.is_eof() {
        let token = tokens.next_token();
        rendered.push_str(token.span.slice(inner));
    }
    rendered.push(')');
    rendered
}

fn first_number(arguments: &str) -> u32 {
    arguments
        .trim_start_matches('(')
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

fn parse_attributes(cursor: &mut Cursor<'_>, column: &mut ColumnDef) -> Result<()> {
    while !cursor.is_eof() {
        if cursor.eat_words(&["NOT", "NULL"]) {
            column.is_nullable = false;
        } else if cursor.eat_word("NULL") {
            column.is_nullable = true;
        } else if cursor.eat_word("DEFAULT") {
            column.default = Some(value_expression(cursor, "DEFAULT")?);
        } else if cursor.eat_words(&["ON", "UPDATE"]) {
            column.on_update = Some(value_expression(cursor, "ON UPDATE")?);
        } else if cursor.eat_word("AUTO_INCREMENT") {
            column.is_auto_increment = true;
        } else if cursor.eat_words(&["PRIMARY", "KEY"]) || cursor.eat_word("KEY") {
            column.is_primary = true;
            column.is_nullable = false;
        } else if cursor.eat_word("UNIQUE") {
            cursor.eat_word("KEY");
            if column.unique.is_empty() {
                column.unique.push(KeyInfo {
                    name: String::new(),
                    column: String::new(),
                    columns: Vec::new(),
                    reference: None,
                });
            }
        } else if cursor.eat_words(&["CHARACTER", "SET"])
            || cursor.eat_word("CHARSET")
            || cursor.eat_word("COLLATE")
            || cursor.eat_word("COMMENT")
            || cursor.eat_word("COLUMN_FORMAT")
            || cursor.eat_word("STORAGE")
            || cursor.eat_word("SRID")
        {
            cursor.eat(&TokenKind::Eq);
            skip_value(cursor, "column attribute")?;
        } else if cursor.eat_words(&["GENERATED", "ALWAYS"]) || cursor.peek().is_word("AS") {
            cursor.eat_word("AS");
            cursor.skip_group("generated column")?;
        } else if cursor.eat_word("CHECK") {
            cursor.skip_group("CHECK")?;
        } else if cursor.eat_word("REFERENCES") {
            // Inline references are accepted and ignored by MySQL.
            cursor.ident("REFERENCES")?;
            if cursor.peek().kind == TokenKind::LeftParen {
                cursor.skip_group("REFERENCES")?;
            }
        } else {
            skip_value(cursor, "column attribute")?;
        }
    }
    Ok(())
}

fn skip_value(cursor: &mut Cursor<'_>, context: &str) -> Result<()> {
    match cursor.peek().kind {
        TokenKind::Error(_) => Err(ParseError::Unterminated {
            context: context.to_string(),
        }),
        TokenKind::LeftParen => cursor.skip_group(context).map(|_| ()),
        TokenKind::RightParen => Err(ParseError::UnbalancedParens {
            context: context.to_string(),
        }),
        _ => {
            cursor.next_token();
            Ok(())
        }
    }
}

/// Reads a DEFAULT / ON UPDATE value and returns its source text.
fn value_expression(cursor: &mut Cursor<'_>, context: &str) -> Result<String> {
    let source = cursor.source();
    let start = cursor.peek().span;
    let end = match cursor.peek().kind.clone() {
        TokenKind::LeftParen => cursor.skip_group(context)?,
        TokenKind::Symbol('-' | '+') => {
            cursor.next_token();
            cursor.next_token().span
        }
        TokenKind::Quoted { .. } | TokenKind::Number(_) => {
            let token = cursor.next_token();
            string_continuation(cursor, token.span)
        }
        TokenKind::Word(word) => {
            let token = cursor.next_token();
            let next = cursor.peek();
            if matches!(next.kind, TokenKind::Quoted { quote: '\'', .. })
                && next.span.start == token.span.end
            {
                // b'0101', x'ff', _utf8mb4'text'
                cursor.next_token().span
            } else if next.kind == TokenKind::LeftParen {
                cursor.skip_group(context)?
            } else if word.eq_ignore_ascii_case("NULL") {
                return Ok("NULL".to_string());
            } else {
                token.span
            }
        }
        TokenKind::Error(_) => {
            return Err(ParseError::Unterminated {
                context: context.to_string(),
            })
        }
        _ => return Err(ParseError::expected("value", context)),
    };
    Ok(start.to(end).slice(source).to_string())
}

/// Adjacent string literals concatenate in MySQL: `'a' 'b'`.
fn string_continuation(cursor: &mut Cursor<'_>, mut span: Span) -> Span {
    while matches!(cursor.peek().kind, TokenKind::Quoted { quote: '\'', .. }) {
        span = cursor.next_token().span;
    }
    span
}
