//! Error types for dump parsing and dependency resolution.

/// MySQL's `ER_PARSE_ERROR` number. Structural failures found by this crate
/// are reported under it so they share one code space with server errors.
pub const PARSE_ERROR_CODE: u32 = 1064;

/// A statement, clause or column fragment that matched a known shape but
/// could not be structurally parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Parentheses do not balance.
    #[error("Unbalanced parentheses in {context}")]
    UnbalancedParens {
        /// What was being parsed.
        context: String,
    },

    /// A quoted string or identifier was never closed.
    #[error("Unterminated quoted text in {context}")]
    Unterminated {
        /// What was being parsed.
        context: String,
    },

    /// A column fragment does not start with a known SQL type.
    #[error("Unknown column type '{0}'")]
    UnknownType(String),

    /// A column fragment was empty.
    #[error("Empty column definition")]
    EmptyColumn,

    /// An expected element is missing.
    #[error("Expected {expected} in {context}")]
    Expected {
        /// What was expected.
        expected: String,
        /// What was being parsed.
        context: String,
    },

    /// An ALTER clause matched none of the supported shapes.
    #[error("Unsupported ALTER clause: {0}")]
    UnsupportedClause(String),

    /// A FOREIGN KEY clause has a missing or malformed REFERENCES part.
    #[error("Malformed REFERENCES in foreign key: {0}")]
    MalformedReference(String),
}

impl ParseError {
    /// Shorthand for [`ParseError::Expected`].
    #[must_use]
    pub fn expected(expected: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Expected {
            expected: expected.into(),
            context: context.into(),
        }
    }

    /// Numeric code reported in [`FailedQuery::code`](crate::FailedQuery).
    #[must_use]
    pub const fn code(&self) -> u32 {
        PARSE_ERROR_CODE
    }
}

/// The dependency resolver reached a state that legitimate SQL cannot
/// produce. This indicates a logic fault, not a dependency cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The traversal did more work than the table count allows.
    #[error("Dependency traversal exceeded {limit} steps for {tables} tables")]
    TraversalOverflow {
        /// Step limit.
        limit: usize,
        /// Number of tables being resolved.
        tables: usize,
    },

    /// Some tables were never emitted.
    #[error("Tables left unordered after resolution: {}", .0.join(", "))]
    Unordered(Vec<String>),
}

/// Result type for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;
