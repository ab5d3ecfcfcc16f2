//! Token types produced by the [`Lexer`](super::Lexer).

use super::Span;

/// The kind of a lexed token.
///
/// Keywords are not distinguished from identifiers: dump parsing only ever
/// needs to ask "is this the word `KEY`?", so bare words are kept as text
/// and compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A bare word: keyword, identifier or type name.
    Word(String),
    /// Quoted text with the quote removed and escapes resolved.
    /// `'…'` and `"…"` are string literals in MySQL, `` `…` `` is an identifier.
    Quoted {
        /// The quote character that opened the token.
        quote: char,
        /// The unescaped content.
        value: String,
    },
    /// Numeric literal, kept as written.
    Number(String),
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `;`
    Semicolon,
    /// `=`
    Eq,
    /// Any other single character.
    Symbol(char),
    /// Unterminated string or identifier.
    Error(String),
    /// End of input.
    Eof,
}

/// A token together with its location in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// Location in the lexed text.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true for the end-of-input token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns true if this is the bare word `word` (case-insensitive).
    #[must_use]
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(word))
    }

    /// Returns the bare word, if this token is one.
    #[must_use]
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }

    /// Returns the identifier this token names: a bare word or a
    /// back-tick / double-quoted identifier.
    #[must_use]
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            TokenKind::Quoted { quote: '`' | '"', value } => Some(value),
            _ => None,
        }
    }
}
