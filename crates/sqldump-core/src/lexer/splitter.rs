//! Splits a dump into individual statements.

use super::Span;

/// One statement cut out of a dump, without its terminating delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// Statement text with leading comments and surrounding whitespace removed.
    pub text: String,
    /// Location of the statement (delimiter excluded) in the dump.
    pub span: Span,
}

/// Splits dump text on the active statement delimiter.
///
/// Delimiters inside quoted strings, quoted identifiers and comments are not
/// split points. `/*! … */` conditional comments are executable in MySQL
/// and are kept as statement text. A line of the form `DELIMITER <tok>`
/// switches the delimiter, as the `mysql` client does.
pub struct Splitter<'a> {
    input: &'a str,
    pos: usize,
    start: usize,
    line_start: bool,
    delimiter: String,
}

impl<'a> Splitter<'a> {
    /// Creates a splitter using `;` as the initial delimiter.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
            line_start: true,
            delimiter: ";".to_string(),
        }
    }

    /// Returns the currently active delimiter.
    #[must_use]
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line_start = true;
        } else if !c.is_whitespace() {
            self.line_start = false;
        }
        Some(c)
    }

    /// If a `DELIMITER` directive starts at the current position, consumes
    /// the line and returns the new delimiter. Directives are only honoured
    /// at the start of a line and between statements.
    fn delimiter_directive(&mut self) -> Option<String> {
        if !self.line_start || !self.rest().get(..9)?.eq_ignore_ascii_case("delimiter") {
            return None;
        }
        if !strip_leading_comments(&self.input[self.start..self.pos]).is_empty() {
            return None;
        }
        let line = self.rest().split('\n').next().unwrap_or_default();
        let mut words = line.split_whitespace();
        words.next()?;
        let delimiter = words.next()?.to_string();
        self.pos += line.len();
        self.line_start = false;
        Some(delimiter)
    }

    fn skip_quoted(&mut self, quote: char) {
        self.advance();
        while let Some(c) = self.advance() {
            if c == '\\' && quote != '`' {
                self.advance();
            } else if c == quote {
                if self.peek() == Some(quote) {
                    self.advance();
                } else {
                    return;
                }
            }
        }
    }

    fn skip_line(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance();
        self.advance();
        while let Some(c) = self.advance() {
            if c == '*' && self.peek() == Some('/') {
                self.advance();
                return;
            }
        }
    }

    fn is_line_comment(&self) -> bool {
        let rest = self.rest();
        rest.starts_with('#')
            || (rest.starts_with("--") && rest[2..].chars().next().map_or(true, char::is_whitespace))
    }

    /// Builds a statement from `start..end`, or `None` when it only holds
    /// whitespace and comments.
    fn make_statement(&self, end: usize) -> Option<RawStatement> {
        let raw = &self.input[self.start..end];
        let text = strip_leading_comments(raw);
        let text = text.trim_end();
        if text.is_empty() {
            return None;
        }
        let offset = self.start + (raw.len() - strip_leading_comments(raw).len());
        Some(RawStatement {
            text: text.to_string(),
            span: Span::new(offset, offset + text.len()),
        })
    }

    /// Returns the next statement, or `None` once the input is exhausted.
    pub fn next_statement(&mut self) -> Option<RawStatement> {
        loop {
            if self.pos >= self.input.len() {
                let statement = self.make_statement(self.input.len());
                self.start = self.input.len();
                return statement;
            }

            let directive_start = self.pos;
            if let Some(delimiter) = self.delimiter_directive() {
                let pending = self.make_statement(directive_start);
                self.delimiter = delimiter;
                self.start = self.pos;
                if pending.is_some() {
                    return pending;
                }
                continue;
            }

            if self.rest().starts_with(self.delimiter.as_str()) {
                let statement = self.make_statement(self.pos);
                self.pos += self.delimiter.len();
                self.start = self.pos;
                if statement.is_some() {
                    return statement;
                }
                continue;
            }

            match self.peek() {
                Some(q @ ('\'' | '"' | '`')) => self.skip_quoted(q),
                Some('/') if self.rest().starts_with("/*") => self.skip_block_comment(),
                Some(_) if self.is_line_comment() => self.skip_line(),
                _ => {
                    self.advance();
                }
            }
        }
    }
}

impl Iterator for Splitter<'_> {
    type Item = RawStatement;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_statement()
    }
}

/// Splits a dump into statements using the default `;` delimiter.
#[must_use]
pub fn split_statements(dump: &str) -> Vec<RawStatement> {
    Splitter::new(dump).collect()
}

/// Strips leading whitespace and comments from `sql`.
///
/// `/*! … */` conditional comments are statement text and are kept.
#[must_use]
pub fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if rest.starts_with('#')
            || (rest.starts_with("--")
                && rest[2..].chars().next().map_or(true, char::is_whitespace))
        {
            rest = rest.find('\n').map_or("", |i| &rest[i + 1..]).trim_start();
        } else if rest.starts_with("/*") && !rest.starts_with("/*!") {
            rest = rest.find("*/").map_or("", |i| &rest[i + 2..]).trim_start();
        } else {
            return rest;
        }
    }
}
