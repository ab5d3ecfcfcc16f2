//! SQL lexing for dump text.
//!
//! Two layers live here: a [`Splitter`] that cuts a whole dump into raw
//! statements (respecting strings, comments and `DELIMITER` directives),
//! and a token-level [`Lexer`] used by the statement parsers to walk a
//! single statement or fragment.

mod cursor;
mod span;
mod splitter;
mod token;
mod tokenizer;

pub use cursor::{split_top_level, Cursor};
pub use span::Span;
pub use splitter::{split_statements, strip_leading_comments, RawStatement, Splitter};
pub use token::{Token, TokenKind};
pub use tokenizer::Lexer;
