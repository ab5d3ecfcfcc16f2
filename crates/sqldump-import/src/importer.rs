//! Executes import plans against a [`Connection`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqldump_core::{classify, FailedQuery};
use tracing::{debug, info, warn};

use crate::config::ImportOptions;
use crate::connection::Connection;
use crate::error::Result;
use crate::plan::ImportPlan;

/// Outcome of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Statements that executed successfully.
    pub executed: usize,
    /// Statements that failed to parse or execute.
    pub failed: Vec<FailedQuery>,
    /// When the import started.
    pub started_at: DateTime<Utc>,
    /// When the last statement finished.
    pub finished_at: DateTime<Utc>,
}

impl ImportSummary {
    /// Whether every statement parsed and executed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Wall-clock time of the import.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Replays dumps over a connection.
///
/// A failing statement never stops the import; it is recorded in the
/// returned [`ImportSummary`] and execution continues with the next one.
pub struct Importer<C: Connection> {
    connection: C,
    options: ImportOptions,
    dry_run: bool,
}

impl<C: Connection> Importer<C> {
    /// Creates an importer that executes over `connection`.
    #[must_use]
    pub const fn new(connection: C, options: ImportOptions) -> Self {
        Self {
            connection,
            options,
            dry_run: false,
        }
    }

    /// Print statements instead of executing them.
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// The options this importer runs with.
    #[must_use]
    pub const fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Classifies `dump`, plans it and runs the plan. Statements that fail
    /// to parse are reported in the summary next to execution failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the tables of the dump cannot be ordered or a
    /// CREATE TABLE cannot be rewritten for deferred foreign keys.
    pub async fn import(&mut self, dump: &str) -> Result<ImportSummary> {
        let started_at = Utc::now();
        let (parsed, parse_failures) = classify(dump)?;
        let plan = ImportPlan::build(&parsed, &self.options)?;
        info!(
            tables = parsed.sort.len(),
            statements = plan.len(),
            "Importing dump"
        );

        let mut summary = self.run(&plan).await;
        summary.started_at = started_at;
        let mut failed = parse_failures;
        failed.append(&mut summary.failed);
        summary.failed = failed;
        Ok(summary)
    }

    /// Executes every statement of `plan` in order.
    pub async fn run(&mut self, plan: &ImportPlan) -> ImportSummary {
        let started_at = Utc::now();
        let mut executed = 0;
        let mut failed = Vec::new();

        for statement in plan.iter() {
            if self.dry_run {
                println!("{};", statement.sql);
                continue;
            }

            debug!(phase = ?statement.phase, sql = %statement.sql, "Executing SQL");
            match self.connection.execute(&statement.sql).await.into_result() {
                Ok(_) => executed += 1,
                Err(e) => {
                    warn!(
                        phase = ?statement.phase,
                        code = e.code,
                        error = %e.msg,
                        "Statement failed"
                    );
                    failed.push(FailedQuery::new(e.code, e.msg, statement.sql.as_str()));
                }
            }
        }

        if self.options.close_connection {
            self.connection.close().await;
        }

        let summary = ImportSummary {
            executed,
            failed,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            executed = summary.executed,
            failed = summary.failed.len(),
            "Import finished"
        );
        summary
    }

    /// Returns the underlying connection.
    #[must_use]
    pub fn into_connection(self) -> C {
        self.connection
    }
}
