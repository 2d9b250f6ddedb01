//! Load orchestration against a database target.
//!
//! Each file becomes one [`LoadJob`] handed to a [`Target`]. Targets apply a
//! job atomically, so a failed file leaves nothing behind and the remaining
//! files still load.

use anyhow::{Context, Result, anyhow, bail};
use log::info;

use crate::{
    batch::{self, BatchSummary},
    bigquery::BigQueryTarget,
    config::{Config, Settings},
    ddl,
    error::FileError,
    pg::PostgresTarget,
    schema::{self, ColumnSchema},
    source::SourceFile,
};

/// One file's worth of work for a target.
#[derive(Debug)]
pub struct LoadJob<'a> {
    pub source_name: &'a str,
    pub table: &'a str,
    /// SQL names of the CSV columns, in file order.
    pub column_names: &'a [String],
    /// Inferred schema, present when tables are being created.
    pub columns: Option<&'a [ColumnSchema]>,
    /// PostgreSQL DDL to run before the copy.
    pub ddl: Option<&'a str>,
    pub content: &'a str,
}

/// A load destination. `load` must apply the job atomically and return the
/// number of rows written.
pub trait Target {
    fn describe(&self) -> String;

    fn load(&mut self, job: &LoadJob<'_>) -> Result<u64>;
}

/// Opens the target named by `uri` (`postgres://`, `postgresql://` or
/// `bigquery://project/dataset`).
pub fn open_target(uri: &str, config: &Config) -> Result<Box<dyn Target>> {
    let (scheme, _) = uri
        .split_once("://")
        .ok_or_else(|| anyhow!("Target URI '{uri}' has no scheme"))?;
    match scheme.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(Box::new(PostgresTarget::connect(uri)?)),
        "bigquery" => Ok(Box::new(BigQueryTarget::from_uri(uri, &config.bigquery)?)),
        other => bail!("Unsupported target scheme '{other}' (expected postgres, postgresql or bigquery)"),
    }
}

/// Infers (or reads) the columns of `source` and hands it to `target`.
pub fn load_source(
    target: &mut dyn Target,
    source: &SourceFile,
    settings: &Settings,
    create_tables: bool,
) -> Result<u64, FileError> {
    let table = settings.table_name(&source.name);
    let (columns, column_names) = if create_tables {
        let columns = schema::infer_schema(&source.content, &settings.infer)
            .map_err(|err| source.parse_error(err))?;
        if columns.is_empty() {
            return Err(source.parse_error(anyhow!("CSV has no header")));
        }
        let names = columns.iter().map(|c| c.sql_name.clone()).collect::<Vec<_>>();
        (Some(columns), names)
    } else {
        let names =
            schema::read_header_names(&source.content).map_err(|err| source.parse_error(err))?;
        (None, names)
    };
    let ddl = columns
        .as_deref()
        .map(|columns| ddl::create_table_ddl(columns, &table, &settings.ddl_options(&table)));

    let job = LoadJob {
        source_name: &source.name,
        table: &table,
        column_names: &column_names,
        columns: columns.as_deref(),
        ddl: ddl.as_deref(),
        content: &source.content,
    };
    let rows = target
        .load(&job)
        .with_context(|| format!("Loading into {}", target.describe()))
        .map_err(|err| FileError::Database {
            name: source.name.clone(),
            table: table.clone(),
            source: err,
        })?;
    info!("Loaded {rows} row(s) from {} into {table}", source.name);
    Ok(rows)
}

/// Loads every source into `target`, continuing past per-file failures.
pub fn run_load<I>(
    target: &mut dyn Target,
    sources: I,
    settings: &Settings,
    create_tables: bool,
) -> BatchSummary
where
    I: IntoIterator<Item = Result<SourceFile, FileError>>,
{
    batch::run_batch(sources, |source| {
        load_source(target, source, settings, create_tables).map(|_| ())
    })
}
