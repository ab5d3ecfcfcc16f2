//! # sqldump-core
//!
//! Statement classification, schema parsing and schema diffing for
//! MySQL / MariaDB dump files.
//!
//! This crate provides:
//! - A statement splitter that respects quotes, comments and `DELIMITER`
//! - A classifier that buckets statements by kind and orders tables so that
//!   referenced tables are created first
//! - Column, CREATE TABLE and ALTER TABLE parsers producing [`TableInfo`]
//! - A schema differ producing structured [`DiffReport`]s and corrective SQL
//!
//! Everything here is pure: no I/O, no shared state.
//!
//! ## Classifying a dump
//!
//! ```rust
//! use sqldump_core::classify;
//!
//! let dump = "
//!     CREATE TABLE orders (id INT PRIMARY KEY, cust_id INT,
//!         FOREIGN KEY (cust_id) REFERENCES customers(id));
//!     CREATE TABLE customers (id INT PRIMARY KEY);
//!     INSERT INTO customers VALUES (1);
//! ";
//! let (parsed, failed) = classify(dump).unwrap();
//! assert!(failed.is_empty());
//! assert_eq!(parsed.sort, vec!["customers", "orders"]);
//! assert_eq!(parsed.insert["customers"].len(), 1);
//! ```
//!
//! ## Diffing schemas
//!
//! ```rust
//! use sqldump_core::{diff, parse_create_table, ColumnChange, Schema};
//!
//! let old = parse_create_table("CREATE TABLE t (name VARCHAR(50) NOT NULL)").unwrap();
//! let new = parse_create_table("CREATE TABLE t (name VARCHAR(100) NOT NULL)").unwrap();
//! let source = Schema::from([("t".to_string(), old)]);
//! let target = Schema::from([("t".to_string(), new)]);
//!
//! let report = diff(&source, &target);
//! assert_eq!(report.tables["t"]["name"].change, ColumnChange::Modified);
//! ```

pub mod alter;
pub mod classify;
pub mod diff;
pub mod error;
pub mod insert;
pub mod lexer;
pub mod resolver;
pub mod schema;

pub use alter::{alter_table_name, parse_alter_clause, split_alter, AlterParsed, AlterSplit, AlterType};
pub use classify::{
    classify, classify_statement, FailedQuery, MiscPosition, NonTableCreate, ParsedQuery, StatementKind,
};
pub use diff::{
    diff, ColCompDetail, ColumnChange, ColumnDiff, DiffOptions, DiffReport, SchemaDiffer,
    TableCompare, TableDiff, UNPARSABLE,
};
pub use error::{ParseError, ResolutionError, PARSE_ERROR_CODE};
pub use insert::{insert_target, split_insert_rows};
pub use lexer::{split_statements, RawStatement};
pub use resolver::{resolve, resolve_order, DeferredKey, Resolution, TableDeps};
pub use schema::{
    parse_column, parse_column_line, parse_create_table, quote_identifier, strip_foreign_keys,
    ColumnDef, ForeignKey, ForeignKeyAction, KeyInfo, Schema, TableInfo,
};
