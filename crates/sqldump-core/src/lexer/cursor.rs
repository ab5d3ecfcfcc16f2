//! A token cursor shared by the statement parsers.

use super::{Lexer, Span, Token, TokenKind};
use crate::error::{ParseError, Result};

/// A forward-only cursor over the tokens of one statement or fragment.
pub struct Cursor<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Tokenizes `source` and positions the cursor on the first token.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Lexer::new(source).tokenize(),
            pos: 0,
        }
    }

    /// Returns the text the cursor walks over.
    #[must_use]
    pub const fn source(&self) -> &'a str {
        self.source
    }

    /// Returns the current token.
    #[must_use]
    pub fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    /// Returns the token `n` positions ahead (the final EOF if past the end).
    #[must_use]
    pub fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    /// Returns the current token and advances past it.
    pub fn next_token(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    /// Returns true once all tokens are consumed.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.peek().is_eof()
    }

    /// Consumes the word `word` if it is next.
    pub fn eat_word(&mut self, word: &str) -> bool {
        if self.peek().is_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes `words` if they all follow in sequence; otherwise consumes nothing.
    pub fn eat_words(&mut self, words: &[&str]) -> bool {
        let matches = words
            .iter()
            .enumerate()
            .all(|(i, w)| self.peek_nth(i).is_word(w));
        if matches {
            self.pos += words.len();
        }
        matches
    }

    /// Consumes the given token kind if it is next.
    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.next_token();
            true
        } else {
            false
        }
    }

    /// Consumes the word `word` or fails.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the next token is another word or symbol.
    pub fn expect_word(&mut self, word: &str, context: &str) -> Result<()> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(ParseError::expected(word.to_uppercase(), context))
        }
    }

    /// Fails with [`ParseError::Unterminated`] if the next token is a lexer error.
    fn check_error(&self, context: &str) -> Result<()> {
        if matches!(self.peek().kind, TokenKind::Error(_)) {
            return Err(ParseError::Unterminated {
                context: context.to_string(),
            });
        }
        Ok(())
    }

    /// Reads an identifier, dropping any `schema.` qualifier.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when no identifier follows.
    pub fn ident(&mut self, context: &str) -> Result<String> {
        self.check_error(context)?;
        let mut name = self
            .peek()
            .ident()
            .map(str::to_string)
            .ok_or_else(|| ParseError::expected("identifier", context))?;
        self.pos += 1;
        while self.peek().kind == TokenKind::Dot {
            let Some(part) = self.peek_nth(1).ident().map(str::to_string) else {
                break;
            };
            name = part;
            self.pos += 2;
        }
        Ok(name)
    }

    /// Reads a parenthesized, comma-separated identifier list such as
    /// `(a, b(10) DESC)`. Prefix lengths and sort directions are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the list is not parenthesized or not
    /// comma-separated.
    pub fn ident_list(&mut self, context: &str) -> Result<Vec<String>> {
        if !self.eat(&TokenKind::LeftParen) {
            return Err(ParseError::expected("'('", context));
        }
        let mut names = Vec::new();
        loop {
            names.push(self.ident(context)?);
            if self.peek().kind == TokenKind::LeftParen {
                self.skip_group(context)?;
            }
            if !self.eat_word("ASC") {
                self.eat_word("DESC");
            }
            match self.next_token().kind {
                TokenKind::Comma => {}
                TokenKind::RightParen => return Ok(names),
                TokenKind::Eof => {
                    return Err(ParseError::UnbalancedParens {
                        context: context.to_string(),
                    })
                }
                _ => return Err(ParseError::expected("',' or ')'", context)),
            }
        }
    }

    /// Skips a balanced parenthesized group starting at the current `(`
    /// and returns its span, parentheses included.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when no `(` follows or the group is never closed.
    pub fn skip_group(&mut self, context: &str) -> Result<Span> {
        let open = self.peek().span;
        if !self.eat(&TokenKind::LeftParen) {
            return Err(ParseError::expected("'('", context));
        }
        let mut depth = 1usize;
        loop {
            self.check_error(context)?;
            let token = self.next_token();
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(open.to(token.span));
                    }
                }
                TokenKind::Eof => {
                    return Err(ParseError::UnbalancedParens {
                        context: context.to_string(),
                    })
                }
                _ => {}
            }
        }
    }

    /// Returns the source text from the current token to the end, trimmed.
    #[must_use]
    pub fn rest(&self) -> &'a str {
        self.source
            .get(self.peek().span.start..)
            .unwrap_or_default()
            .trim()
    }
}

/// Splits `text` on commas that are not nested inside parentheses or
/// quotes. Each piece is trimmed; comments between pieces are ignored.
///
/// # Errors
///
/// Returns [`ParseError`] on unterminated quotes or unbalanced
/// parentheses.
pub fn split_top_level<'a>(text: &'a str, context: &str) -> Result<Vec<&'a str>> {
    let mut lexer = Lexer::new(text);
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut piece_start: Option<usize> = None;
    let mut piece_end = 0usize;

    loop {
        let token = lexer.next_token();
        match token.kind {
            TokenKind::Eof => break,
            TokenKind::Error(_) => {
                return Err(ParseError::Unterminated {
                    context: context.to_string(),
                })
            }
            TokenKind::Comma if depth == 0 => {
                if let Some(start) = piece_start.take() {
                    pieces.push(text[start..piece_end].trim());
                }
                continue;
            }
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => {
                depth = depth.checked_sub(1).ok_or_else(|| ParseError::UnbalancedParens {
                    context: context.to_string(),
                })?;
            }
            _ => {}
        }
        piece_start.get_or_insert(token.span.start);
        piece_end = token.span.end;
    }

    if depth != 0 {
        return Err(ParseError::UnbalancedParens {
            context: context.to_string(),
        });
    }
    if let Some(start) = piece_start {
        pieces.push(text[start..piece_end].trim());
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level() {
        let pieces = split_top_level("a int(11), b enum('x,y'), KEY k (a, b)", "test").unwrap();
        assert_eq!(pieces, vec!["a int(11)", "b enum('x,y')", "KEY k (a, b)"]);
    }

    #[test]
    fn test_split_top_level_unbalanced() {
        assert!(matches!(
            split_top_level("a int(11", "test"),
            Err(ParseError::UnbalancedParens { .. })
        ));
        assert!(matches!(
            split_top_level("a int)", "test"),
            Err(ParseError::UnbalancedParens { .. })
        ));
    }

    #[test]
    fn test_ident_drops_qualifier() {
        let mut cursor = Cursor::new("`shop`.`orders` rest");
        assert_eq!(cursor.ident("t").unwrap(), "orders");
        assert_eq!(cursor.rest(), "rest");
    }

    #[test]
    fn test_ident_list() {
        let mut cursor = Cursor::new("(`a`, b(10) DESC) tail");
        assert_eq!(cursor.ident_list("t").unwrap(), vec!["a", "b"]);
        assert!(cursor.eat_word("tail"));
        assert!(cursor.is_eof());
    }

    #[test]
    fn test_eat_words_is_all_or_nothing() {
        let mut cursor = Cursor::new("PRIMARY INDEX");
        assert!(!cursor.eat_words(&["PRIMARY", "KEY"]));
        assert!(cursor.eat_word("primary"));
    }

    #[test]
    fn test_skip_group_returns_span() {
        let sql = "(a, (b)) c";
        let mut cursor = Cursor::new(sql);
        let span = cursor.skip_group("t").unwrap();
        assert_eq!(span.slice(sql), "(a, (b))");
    }
}
