use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer SQL schemas from study CSV extracts and load them into PostgreSQL or BigQuery",
    long_about = None
)]
pub struct Cli {
    /// Path to a YAML configuration file
    #[arg(short = 'C', long = "config-file", global = true)]
    pub config_file: Option<PathBuf>,
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the inferred schema table and CREATE TABLE DDL for each file
    GenerateSchema(SourceArgs),
    /// Print a psql COPY script for each file
    GenerateCopy(SourceArgs),
    /// Load each file into a PostgreSQL or BigQuery target
    Load(LoadArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// CSV files to process
    #[arg(required_unless_present = "zip")]
    pub paths: Vec<PathBuf>,
    /// Zip archive whose .csv members are processed after the listed files
    #[arg(long)]
    pub zip: Option<PathBuf>,
    /// Character encoding of the input files (defaults to windows-1252)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Keep ISO dates and times as text instead of typed columns
    #[arg(long = "no-parse-dates")]
    pub no_parse_dates: bool,
    /// Infer NUMERIC(p, s) for fixed-point columns instead of DOUBLE PRECISION
    #[arg(long = "infer-decimals")]
    pub infer_decimals: bool,
    /// Keep the trailing _YYYYMMDD release date in table names
    #[arg(long = "keep-date-suffix")]
    pub keep_date_suffix: bool,
}

impl SourceArgs {
    pub fn overrides(&self) -> Overrides<'_> {
        Overrides {
            input_encoding: self.input_encoding.as_deref(),
            no_parse_dates: self.no_parse_dates,
            infer_decimals: self.infer_decimals,
            keep_date_suffix: self.keep_date_suffix,
        }
    }
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Target URI: postgres://..., postgresql://... or bigquery://<project>/<dataset>
    #[arg(long)]
    pub uri: Option<String>,
    /// Create each table from the inferred schema before loading
    #[arg(long = "create-tables")]
    pub create_tables: bool,
}
