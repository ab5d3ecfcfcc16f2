//! INSERT statement helpers.

use crate::error::Result;
use crate::lexer::{Cursor, TokenKind};

/// Reads `INSERT [LOW_PRIORITY|DELAYED|HIGH_PRIORITY] [IGNORE] [INTO] name`.
fn insert_header(cursor: &mut Cursor<'_>) -> Result<String> {
    cursor.expect_word("INSERT", "INSERT")?;
    if !cursor.eat_word("LOW_PRIORITY") && !cursor.eat_word("DELAYED") {
        cursor.eat_word("HIGH_PRIORITY");
    }
    cursor.eat_word("IGNORE");
    cursor.eat_word("INTO");
    cursor.ident("INSERT")
}

/// Returns the table an INSERT statement writes to.
///
/// # Errors
///
/// Returns [`ParseError`](crate::ParseError) when the statement has no target table.
pub fn insert_target(statement: &str) -> Result<String> {
    insert_header(&mut Cursor::new(statement))
}

/// Splits a multi-row `INSERT … VALUES (…), (…)` into one statement per
/// row. The column list and any trailing `ON DUPLICATE KEY UPDATE` clause
/// are repeated on every row. `INSERT … SELECT` and `INSERT … SET` are
/// returned unchanged.
///
/// # Errors
///
/// Returns [`ParseError`](crate::ParseError) when a row is unterminated.
pub fn split_insert_rows(statement: &str) -> Result<Vec<String>> {
    let mut cursor = Cursor::new(statement);
    insert_header(&mut cursor)?;
    if cursor.eat_word("PARTITION") {
        cursor.skip_group("PARTITION")?;
    }
    if cursor.peek().kind == TokenKind::LeftParen {
        cursor.skip_group("INSERT column list")?;
    }

    let keyword = cursor.peek().span;
    if !cursor.eat_word("VALUES") && !cursor.eat_word("VALUE") {
        return Ok(vec![statement.to_string()]);
    }
    let prefix = statement.get(..keyword.end).unwrap_or_default();

    let mut rows = Vec::new();
    loop {
        let start = cursor.peek().span;
        cursor.eat_word("ROW");
        let group = cursor.skip_group("VALUES row")?;
        rows.push(start.to(group).slice(statement));
        if !cursor.eat(&TokenKind::Comma) {
            break;
        }
    }
    if rows.len() < 2 {
        return Ok(vec![statement.to_string()]);
    }

    let suffix = cursor.rest();
    Ok(rows
        .into_iter()
        .map(|row| {
            if suffix.is_empty() {
                format!("{prefix} {row}")
            } else {
                format!("{prefix} {row} {suffix}")
            }
        })
        .collect())
}
