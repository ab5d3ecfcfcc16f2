//! sqldump CLI
//!
//! Command-line tool for importing, inspecting and comparing SQL dumps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sqldump_core::{classify, DeferredKey, DiffOptions, FailedQuery, ParsedQuery, SchemaDiffer};
use sqldump_import::prelude::*;

/// Import and compare MySQL / MariaDB dumps.
#[derive(Parser)]
#[command(name = "sqldump")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with connection settings.
    #[arg(short, long, env = "SQLDUMP_CONFIG")]
    config: Option<PathBuf>,

    /// Server host.
    #[arg(long, env = "SQLDUMP_HOST")]
    host: Option<String>,

    /// Server port.
    #[arg(short = 'P', long, env = "SQLDUMP_PORT")]
    port: Option<u16>,

    /// User name.
    #[arg(short, long, env = "SQLDUMP_USER")]
    user: Option<String>,

    /// Password.
    #[arg(short, long, env = "SQLDUMP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Database to import into or compare against.
    #[arg(short, long, env = "SQLDUMP_DATABASE")]
    database: Option<String>,

    /// Connection character set.
    #[arg(long)]
    charset: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a dump into the database.
    Import {
        /// Dump file.
        dump: PathBuf,

        /// Data policy: true/1 as is, single/2 one row per INSERT, anything else skips data.
        #[arg(long)]
        with_data: Option<WithData>,

        /// Keep existing tables instead of dropping them first.
        #[arg(long)]
        no_drop: bool,

        /// JSON file with import options.
        #[arg(long)]
        options: Option<PathBuf>,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify the statements of a dump and print a JSON summary.
    Classify {
        /// Dump file.
        dump: PathBuf,
    },

    /// Compare the schemas created by two dumps.
    Diff {
        /// Dump describing the current schema.
        source: PathBuf,

        /// Dump describing the wanted schema.
        target: PathBuf,

        /// Include unchanged columns.
        #[arg(long)]
        all: bool,

        /// Print corrective SQL instead of the report.
        #[arg(long)]
        sql: bool,
    },

    /// Compare the schema created by a dump with the database.
    Compare {
        /// Dump file.
        dump: PathBuf,

        /// Include unchanged columns.
        #[arg(long)]
        all: bool,

        /// Print corrective SQL instead of the report.
        #[arg(long)]
        sql: bool,
    },
}

#[derive(Serialize)]
struct ClassifySummary<'a> {
    statements: BTreeMap<&'static str, usize>,
    sort: &'a [String],
    deferred: &'a [DeferredKey],
    failed: &'a [FailedQuery],
}

impl<'a> ClassifySummary<'a> {
    fn new(parsed: &'a ParsedQuery, failed: &'a [FailedQuery]) -> Self {
        let statements = BTreeMap::from([
            ("table", parsed.table.len()),
            ("alter", parsed.alter.len()),
            ("insert", parsed.insert.values().map(Vec::len).sum()),
            ("drop", parsed.drop.len()),
            ("view", parsed.view.len()),
            ("functions", parsed.functions.len()),
            ("procedures", parsed.procedures.len()),
            ("triggers", parsed.triggers.len()),
            ("misc", parsed.misc.len()),
        ]);
        Self {
            statements,
            sort: &parsed.sort,
            deferred: &parsed.deferred,
            failed,
        }
    }
}

impl Cli {
    fn sql_config(&self) -> anyhow::Result<SqlConfig> {
        let mut config = match &self.config {
            Some(path) => SqlConfig::from_file(path)?,
            None => SqlConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(user) = &self.user {
            config.user.clone_from(user);
        }
        if let Some(password) = &self.password {
            config.password.clone_from(password);
        }
        if let Some(database) = &self.database {
            config.database = Some(database.clone());
        }
        if let Some(charset) = &self.charset {
            config.charset.clone_from(charset);
        }
        Ok(config)
    }
}

fn read_dump(path: &Path) -> anyhow::Result<(ParsedQuery, Vec<FailedQuery>)> {
    let dump = std::fs::read_to_string(path)?;
    let (parsed, failed) = classify(&dump)?;
    for failure in &failed {
        warn!(file = %path.display(), code = failure.code, error = %failure.msg, "Unparsed statement");
    }
    Ok((parsed, failed))
}

fn diff_options(all: bool) -> DiffOptions {
    if all {
        DiffOptions::new().with_same()
    } else {
        DiffOptions::new()
    }
}

fn print_statements(statements: &[String]) {
    for sql in statements {
        println!("{sql};");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.sql_config()?;

    // Setup logging
    let log_level = if cli.verbose || config.verbose > 0 {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Import {
            dump,
            with_data,
            no_drop,
            options,
            dry_run,
        } => {
            let mut import_options = match options {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => ImportOptions::default(),
            };
            if let Some(with_data) = with_data {
                import_options.with_data = with_data;
            }
            if no_drop {
                import_options.drop_first = false;
            }

            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                let (parsed, _) = read_dump(&dump)?;
                let plan = ImportPlan::build(&parsed, &import_options)?;
                print!("{}", plan.to_script());
                return Ok(());
            }

            let sql = std::fs::read_to_string(&dump)?;
            let conn = MySqlConnection::connect(&config).await?;
            let mut importer = Importer::new(conn, import_options.close_connection(true));
            let summary = importer.import(&sql).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.is_success() {
                anyhow::bail!("{} statement(s) failed", summary.failed.len());
            }
        }

        Commands::Classify { dump } => {
            let (parsed, failed) = read_dump(&dump)?;
            let summary = ClassifySummary::new(&parsed, &failed);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Diff {
            source,
            target,
            all,
            sql,
        } => {
            let (source, _) = read_dump(&source)?;
            let (target, _) = read_dump(&target)?;
            let differ = SchemaDiffer::with_options(diff_options(all));
            let (source, target) = (source.schema(), target.schema());
            if sql {
                print_statements(&differ.migration_sql(&source, &target));
            } else {
                println!("{}", serde_json::to_string_pretty(&differ.diff(&source, &target))?);
            }
        }

        Commands::Compare { dump, all, sql } => {
            let (parsed, _) = read_dump(&dump)?;
            let mut conn = MySqlConnection::connect(&config).await?;
            let comparison = compare_with_live(&mut conn, &parsed, diff_options(all)).await;
            conn.close().await;
            let comparison = comparison?;
            for failure in &comparison.failed {
                warn!(code = failure.code, error = %failure.msg, "Live table left out of the comparison");
            }

            if sql {
                print_statements(&comparison.migration_sql());
            } else {
                println!("{}", serde_json::to_string_pretty(&comparison.report)?);
            }
        }
    }

    Ok(())
}
