use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Look up service-center records in a spreadsheet export",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve one or more codes or locality names
    Lookup(LookupArgs),
    /// Fetch the source once and report the inferred column layout
    Probe(ProbeArgs),
    /// Answer queries read line by line from stdin against a shared cache
    Shell(ShellArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// CSV file path or http(s) URL of a CSV export
    #[arg(short = 's', long = "source")]
    pub source: Option<String>,
    /// Google Sheets document id (used when --source is not given)
    #[arg(long = "sheet-id")]
    pub sheet_id: Option<String>,
    /// Google Sheets tab id
    #[arg(long)]
    pub gid: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long)]
    pub delimiter: Option<String>,
    /// Character encoding of the source (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Seconds before a live dataset is considered stale
    #[arg(long = "ttl-secs")]
    pub ttl_secs: Option<u64>,
    /// Seconds to wait for a remote source before giving up
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Codes or locality names to resolve
    #[arg(required = true)]
    pub queries: Vec<String>,
    /// Emit results as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// Disable the word-overlap matching stage
    #[arg(long = "no-word-overlap")]
    pub no_word_overlap: bool,
    /// Number of valid keys to suggest when nothing matches
    #[arg(long = "suggest", default_value_t = 5)]
    pub suggest: usize,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Number of sample keys to list
    #[arg(long, default_value_t = 10)]
    pub sample: usize,
}

#[derive(Debug, Args)]
pub struct ShellArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Disable the word-overlap matching stage
    #[arg(long = "no-word-overlap")]
    pub no_word_overlap: bool,
    /// Number of valid keys to suggest when nothing matches
    #[arg(long = "suggest", default_value_t = 5)]
    pub suggest: usize,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
