//! YAML configuration shared by every subcommand.
//!
//! Every key is optional; command-line flags take precedence over the file.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::{ddl::DdlOptions, io_utils, naming, schema::InferOptions};

pub const DEFAULT_INPUT_ENCODING: &str = "windows-1252";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Encoding label of the CSV extracts.
    pub input_encoding: String,
    /// SQL column names that receive a `CREATE INDEX` when present.
    pub indexed_columns: Vec<String>,
    /// Drop the `_YYYYMMDD` release suffix from table names.
    pub strip_date_suffix: bool,
    pub parse_dates: bool,
    pub infer_decimals: bool,
    /// Primary key column per table name.
    pub primary_keys: BTreeMap<String, String>,
    /// Default load target.
    pub uri: Option<String>,
    pub bigquery: BigQueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BigQueryConfig {
    pub access_token: Option<String>,
    pub location: Option<String>,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_encoding: DEFAULT_INPUT_ENCODING.to_string(),
            indexed_columns: vec!["patno".to_string()],
            strip_date_suffix: true,
            parse_dates: true,
            infer_decimals: false,
            primary_keys: BTreeMap::new(),
            uri: None,
            bigquery: BigQueryConfig::default(),
        }
    }
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            location: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: Config = serde_yaml::from_reader(reader)
            .with_context(|| format!("Parsing config file {path:?}"))?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Command-line overrides applied on top of a [`Config`].
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub input_encoding: Option<&'a str>,
    pub no_parse_dates: bool,
    pub infer_decimals: bool,
    pub keep_date_suffix: bool,
}

/// Effective per-run settings shared by every file of a batch.
#[derive(Debug, Clone)]
pub struct Settings {
    pub encoding: &'static Encoding,
    pub infer: InferOptions,
    pub strip_date_suffix: bool,
    pub indexed_columns: Vec<String>,
    pub primary_keys: BTreeMap<String, String>,
}

impl Settings {
    pub fn resolve(config: &Config, overrides: &Overrides<'_>) -> Result<Self> {
        let label = overrides
            .input_encoding
            .unwrap_or(config.input_encoding.as_str());
        Ok(Self {
            encoding: io_utils::resolve_encoding(Some(label))?,
            infer: InferOptions {
                parse_dates: config.parse_dates && !overrides.no_parse_dates,
                infer_decimals: config.infer_decimals || overrides.infer_decimals,
            },
            strip_date_suffix: config.strip_date_suffix && !overrides.keep_date_suffix,
            indexed_columns: config.indexed_columns.clone(),
            primary_keys: config.primary_keys.clone(),
        })
    }

    pub fn table_name(&self, source_name: &str) -> String {
        naming::table_name_for(source_name, self.strip_date_suffix)
    }

    pub fn ddl_options<'a>(&'a self, table: &str) -> DdlOptions<'a> {
        DdlOptions {
            primary_key: self.primary_keys.get(table).map(String::as_str),
            indexed_columns: &self.indexed_columns,
        }
    }
}
