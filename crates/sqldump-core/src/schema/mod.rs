//! Table and column schema types and their parsers.

mod column;
mod keys;
mod table;

use std::collections::BTreeMap;

pub use column::{parse_column, parse_column_line, ColumnDef};
pub use keys::{ForeignKey, ForeignKeyAction, KeyDefinition, KeyInfo, KeyKind};
pub(crate) use keys::{parse_constraint_prefix, parse_key_definition};
pub use table::{parse_create_table, strip_foreign_keys, TableInfo};

/// A database schema: tables by name.
pub type Schema = BTreeMap<String, TableInfo>;

/// Quotes an identifier with back-ticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("orders"), "`orders`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
