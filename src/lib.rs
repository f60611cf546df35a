pub mod cache;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fallback;
pub mod io_utils;
pub mod lookup;
pub mod record;
pub mod schema;
pub mod source;
pub mod table;

use std::{
    env,
    io::{self, BufRead, Write},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    cache::{CacheManager, CachedLookup, SourceKind},
    cli::{Cli, Commands, SourceArgs},
    config::LookupConfig,
    dataset::Dataset,
    lookup::MatchStage,
    record::Record,
    source::DataSource,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("center_lookup", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Lookup(args) => handle_lookup(&args),
        Commands::Probe(args) => handle_probe(&args),
        Commands::Shell(args) => handle_shell(&args),
    }
}

/// Loads the config file (if any) and layers command-line overrides on top.
pub fn resolve_config(args: &SourceArgs) -> Result<LookupConfig> {
    let mut config = match &args.config {
        Some(path) => LookupConfig::load(path)
            .with_context(|| format!("Loading configuration from {path:?}"))?,
        None => LookupConfig::default(),
    };
    if let Some(location) = &args.source {
        config.source.location = Some(location.clone());
    }
    if let Some(sheet_id) = &args.sheet_id {
        config.source.location = None;
        config.source.sheet_id = Some(sheet_id.clone());
    }
    if let Some(gid) = &args.gid {
        config.source.gid = Some(gid.clone());
    }
    if let Some(delimiter) = &args.delimiter {
        config.source.delimiter = Some(delimiter.clone());
    }
    if let Some(encoding) = &args.input_encoding {
        config.source.encoding = Some(encoding.clone());
    }
    if let Some(ttl) = args.ttl_secs {
        config.ttl_secs = ttl;
    }
    if let Some(timeout) = args.timeout_secs {
        config.fetch_timeout_secs = timeout;
    }
    debug!("Resolved configuration: {config:?}");
    Ok(config)
}

fn build_manager(config: &LookupConfig) -> Result<CacheManager<Box<dyn DataSource>>> {
    let manager = config
        .build_manager()
        .context("Configuring data source")?;
    info!(
        "Using source {} (ttl {}s, {} fallback record(s))",
        manager.source().describe(),
        manager.ttl().as_secs(),
        config.fallback.len()
    );
    Ok(manager)
}

#[derive(Debug, Serialize)]
struct LookupReport<'a> {
    query: &'a str,
    stage: Option<MatchStage>,
    source_kind: SourceKind,
    records: &'a [std::sync::Arc<Record>],
}

fn handle_lookup(args: &cli::LookupArgs) -> Result<()> {
    let mut config = resolve_config(&args.source)?;
    if args.no_word_overlap {
        config.word_overlap = false;
    }
    let manager = build_manager(&config)?;

    let answers: Vec<(&str, CachedLookup)> = args
        .queries
        .iter()
        .map(|query| (query.as_str(), manager.lookup(query)))
        .collect();

    if args.json {
        let reports: Vec<LookupReport<'_>> = answers
            .iter()
            .map(|(query, answer)| LookupReport {
                query,
                stage: answer.result.stage,
                source_kind: answer.snapshot.source_kind,
                records: &answer.result.records,
            })
            .collect();
        let stdout = io::stdout();
        serde_json::to_writer_pretty(stdout.lock(), &reports).context("Writing JSON output")?;
        println!();
        return Ok(());
    }

    let mut stdout = io::stdout().lock();
    for (query, answer) in &answers {
        write_answer(&mut stdout, query, answer, args.suggest)?;
    }
    Ok(())
}

fn write_answer<W: Write>(
    out: &mut W,
    query: &str,
    answer: &CachedLookup,
    suggest: usize,
) -> Result<()> {
    let snapshot = &answer.snapshot;
    if snapshot.source_kind == SourceKind::StaticFallback {
        writeln!(out, "(live source unavailable; showing reference data)")?;
    }
    match answer.result.stage {
        Some(stage) => {
            writeln!(
                out,
                "{query}: {} match(es) by {stage}",
                answer.result.records.len()
            )?;
            write!(out, "{}", table::render_records(&answer.result.records))?;
        }
        None if snapshot.dataset.is_empty() => {
            writeln!(out, "{query}: no data available")?;
        }
        None => {
            writeln!(out, "{query}: not found")?;
            let keys = snapshot.dataset.sample_keys(suggest);
            if !keys.is_empty() {
                writeln!(out, "known codes include: {}", keys.iter().join(", "))?;
            }
        }
    }
    Ok(())
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let config = resolve_config(&args.source)?;
    let source = config.build_source().context("Configuring data source")?;
    info!("Probing {}", source.describe());
    let table = source
        .fetch_raw_table()
        .with_context(|| format!("Fetching {}", source.describe()))?;
    let dataset = Dataset::from_table(&table, &config.keyword_table())
        .with_context(|| format!("Building dataset from {}", source.describe()))?;

    if let Some(map) = dataset.column_map() {
        print!("{}", table::render_column_map(map, &table.headers));
    }
    println!(
        "rows read: {}, records: {}, skipped: {}, superseded duplicates: {}",
        dataset.rows_read(),
        dataset.len(),
        dataset.rows_skipped(),
        dataset.rows_superseded()
    );
    let keys = dataset.sample_keys(args.sample);
    if !keys.is_empty() {
        println!("sample keys: {}", keys.iter().join(", "));
    }
    Ok(())
}

fn handle_shell(args: &cli::ShellArgs) -> Result<()> {
    let mut config = resolve_config(&args.source)?;
    if args.no_word_overlap {
        config.word_overlap = false;
    }
    let manager = build_manager(&config)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("Reading query from stdin")?;
        let query = line.trim();
        match query {
            "" => continue,
            ":quit" | ":q" => break,
            ":state" => writeln!(stdout, "cache: {}", manager.state())?,
            ":refresh" => {
                let snapshot = manager.get_dataset(true);
                writeln!(
                    stdout,
                    "cache: {} ({} record(s), {})",
                    snapshot.state,
                    snapshot.dataset.len(),
                    match snapshot.source_kind {
                        SourceKind::Live => "live",
                        SourceKind::StaticFallback => "fallback",
                    }
                )?;
            }
            _ => {
                let answer = manager.lookup(query);
                write_answer(&mut stdout, query, &answer, args.suggest)?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}
