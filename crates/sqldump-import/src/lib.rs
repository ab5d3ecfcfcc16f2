//! Replaying and comparing MySQL / MariaDB dumps against a live server.
//!
//! `sqldump-import` builds on `sqldump-core`:
//! - The classified dump is turned into an [`ImportPlan`](plan::ImportPlan)
//!   where tables are created before the tables that reference them
//! - An [`Importer`](importer::Importer) executes the plan statement by
//!   statement and reports failures instead of stopping
//! - [`compare_with_live`](compare::compare_with_live) reads the live schema
//!   and diffs it against a dump
//!
//! # Architecture
//!
//! - **Config** - Connection settings and import options, loadable from JSON
//! - **Connection** - The `execute`/`close` contract and its `sqlx` backend
//! - **Plan** - Execution phases of an import
//! - **Importer** - Runs plans and collects failed queries
//! - **Compare** - Live schema snapshots and diffs
//!
//! # Example
//!
//! ```rust,ignore
//! use sqldump_import::prelude::*;
//!
//! let config = SqlConfig::new().with_database("shop");
//! let conn = MySqlConnection::connect(&config).await?;
//! let options = ImportOptions::new().with_data(WithData::Single);
//!
//! let mut importer = Importer::new(conn, options);
//! let summary = importer.import(&std::fs::read_to_string("shop.sql")?).await?;
//! for failure in &summary.failed {
//!     eprintln!("{}: {}", failure.code, failure.msg);
//! }
//! ```

pub mod compare;
pub mod config;
pub mod connection;
pub mod error;
pub mod importer;
pub mod plan;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::compare::{compare_with_live, snapshot_schema, LiveComparison};
    pub use crate::config::{ImportOptions, SqlConfig, WithData};
    pub use crate::connection::{ConnError, ConnResponse, Connection, MySqlConnection, Row};
    pub use crate::error::{ImportError, Result};
    pub use crate::importer::{ImportSummary, Importer};
    pub use crate::plan::{ImportPlan, Phase, PlannedStatement};
}
