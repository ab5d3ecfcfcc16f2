//! Comparing dumps with a live database.

use sqldump_core::{
    parse_create_table, quote_identifier, DiffOptions, DiffReport, FailedQuery, ParsedQuery,
    Schema, SchemaDiffer,
};
use tracing::{debug, warn};

use crate::connection::{Connection, Row};
use crate::error::{ImportError, Result};

/// Lists base tables of the current database, views excluded.
const LIST_TABLES: &str = "SHOW FULL TABLES WHERE Table_type = 'BASE TABLE'";

async fn query<C: Connection>(conn: &mut C, sql: &str) -> Result<Vec<Row>> {
    debug!(sql = %sql, "Executing SQL");
    conn.execute(sql)
        .await
        .into_result()
        .map_err(|e| ImportError::Query {
            code: e.code,
            msg: e.msg,
        })
}

/// Reads the schema of the connected database.
///
/// Tables whose `SHOW CREATE TABLE` output cannot be parsed are left out of
/// the schema and returned as failures.
///
/// # Errors
///
/// Returns an error if the tables cannot be listed or a `SHOW CREATE TABLE`
/// fails.
pub async fn snapshot_schema<C: Connection>(conn: &mut C) -> Result<(Schema, Vec<FailedQuery>)> {
    let names: Vec<String> = query(conn, LIST_TABLES)
        .await?
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect();

    let mut schema = Schema::new();
    let mut failed = Vec::new();
    for name in names {
        let sql = format!("SHOW CREATE TABLE {}", quote_identifier(&name));
        let rows = query(conn, &sql).await?;
        let Some(create) = rows.into_iter().next().and_then(|row| row.into_iter().nth(1).flatten())
        else {
            warn!(table = %name, "SHOW CREATE TABLE returned nothing");
            continue;
        };
        match parse_create_table(&create) {
            Ok(table) => {
                schema.insert(table.name.clone(), table);
            }
            Err(e) => {
                warn!(table = %name, error = %e, "Failed to parse live table");
                failed.push(FailedQuery::from_parse_error(&e, create));
            }
        }
    }
    debug!(tables = schema.len(), "Snapshot taken");
    Ok((schema, failed))
}

/// A dump compared with the live database.
#[derive(Debug, Clone)]
pub struct LiveComparison {
    /// Schema read from the database.
    pub live: Schema,
    /// Schema the dump creates.
    pub target: Schema,
    /// Differences from `live` to `target`.
    pub report: DiffReport,
    /// Live tables left out because their definition could not be parsed.
    pub failed: Vec<FailedQuery>,
    options: DiffOptions,
}

impl LiveComparison {
    /// Statements that turn the live schema into the dump's schema.
    #[must_use]
    pub fn migration_sql(&self) -> Vec<String> {
        SchemaDiffer::with_options(self.options).migration_sql(&self.live, &self.target)
    }
}

/// Diffs the live database (source) against the schema a dump creates
/// (target).
///
/// # Errors
///
/// Returns an error if the tables cannot be listed or a `SHOW CREATE TABLE`
/// fails.
pub async fn compare_with_live<C: Connection>(
    conn: &mut C,
    parsed: &ParsedQuery,
    options: DiffOptions,
) -> Result<LiveComparison> {
    let (live, failed) = snapshot_schema(conn).await?;
    let target = parsed.schema();
    let report = SchemaDiffer::with_options(options).diff(&live, &target);
    Ok(LiveComparison {
        live,
        target,
        report,
        failed,
        options,
    })
}
