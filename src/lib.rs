pub mod batch;
pub mod bigquery;
pub mod cli;
pub mod config;
pub mod ddl;
pub mod error;
pub mod io_utils;
pub mod load;
pub mod naming;
pub mod pg;
pub mod schema;
pub mod source;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    batch::BatchSummary,
    cli::{Cli, Commands, LoadArgs, SourceArgs},
    config::{Config, Settings},
    source::SourceReader,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("ppmidb", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load_or_default(cli.config_file.as_deref())?;
    if let Some(path) = &cli.config_file {
        debug!("Using configuration from {path:?}");
    }
    let summary = match &cli.command {
        Commands::GenerateSchema(args) => handle_generate_schema(args, &config)?,
        Commands::GenerateCopy(args) => handle_generate_copy(args, &config)?,
        Commands::Load(args) => handle_load(args, &config)?,
    };
    summary.ensure_success()
}

fn open_sources(args: &SourceArgs, settings: &Settings) -> SourceReader {
    if let Some(zip) = &args.zip {
        info!("Reading .csv members of {zip:?}");
    }
    SourceReader::new(&args.paths, args.zip.as_deref(), settings.encoding)
}

fn handle_generate_schema(args: &SourceArgs, config: &Config) -> Result<BatchSummary> {
    let settings = Settings::resolve(config, &args.overrides())?;
    let sources = open_sources(args, &settings);
    Ok(batch::run_batch(sources, |source| {
        let table = settings.table_name(&source.name);
        let columns = schema::infer_schema(&source.content, &settings.infer)
            .map_err(|err| source.parse_error(err))?;
        println!(
            "{}",
            ddl::schema_report(&source.name, &table, &columns, &settings.ddl_options(&table))
        );
        Ok(())
    }))
}

fn handle_generate_copy(args: &SourceArgs, config: &Config) -> Result<BatchSummary> {
    let settings = Settings::resolve(config, &args.overrides())?;
    let sources = open_sources(args, &settings);
    Ok(batch::run_batch(sources, |source| {
        let table = settings.table_name(&source.name);
        let columns =
            schema::read_header_names(&source.content).map_err(|err| source.parse_error(err))?;
        print!("{}", ddl::copy_script(&table, columns.as_slice(), &source.content));
        Ok(())
    }))
}

fn handle_load(args: &LoadArgs, config: &Config) -> Result<BatchSummary> {
    let settings = Settings::resolve(config, &args.source.overrides())?;
    let uri = args
        .uri
        .as_deref()
        .or(config.uri.as_deref())
        .ok_or_else(|| anyhow!("No target given; pass --uri or set uri in the config file"))?;
    let mut target = load::open_target(uri, config).context("Opening load target")?;
    info!(
        "Loading into {}{}",
        target.describe(),
        if args.create_tables {
            " (creating tables)"
        } else {
            ""
        }
    );
    let sources = open_sources(&args.source, &settings);
    Ok(load::run_load(
        target.as_mut(),
        sources,
        &settings,
        args.create_tables,
    ))
}
