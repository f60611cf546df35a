//! YAML configuration for the lookup core.
//!
//! Every field is optional; command-line flags override file values. A
//! minimal file only names the source:
//!
//! ```yaml
//! source:
//!   sheet_id: 1AbCdEf
//! ```

use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    cache::{CacheManager, DEFAULT_TTL},
    cli::parse_delimiter,
    error::ConfigError,
    fallback::StaticFallback,
    io_utils,
    lookup::LookupOptions,
    schema::{FieldRole, KeywordTable},
    source::{CsvFileSource, DataSource, HttpCsvSource},
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Local CSV path or an http(s) URL of a CSV export.
    pub location: Option<String>,
    /// Google Sheets document id, used when `location` is unset.
    pub sheet_id: Option<String>,
    pub gid: Option<String>,
    pub delimiter: Option<String>,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LookupConfig {
    pub ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub word_overlap: bool,
    pub source: SourceConfig,
    /// Per-role keyword replacements for header inference.
    pub keywords: BTreeMap<FieldRole, Vec<String>>,
    pub fallback: StaticFallback,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            word_overlap: true,
            source: SourceConfig::default(),
            keywords: BTreeMap::new(),
            fallback: StaticFallback::default(),
        }
    }
}

impl LookupConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn keyword_table(&self) -> KeywordTable {
        KeywordTable::default().with_overrides(&self.keywords)
    }

    pub fn lookup_options(&self) -> LookupOptions {
        LookupOptions {
            word_overlap: self.word_overlap,
        }
    }

    pub fn build_source(&self) -> Result<Box<dyn DataSource>, ConfigError> {
        let encoding = io_utils::resolve_encoding(self.source.encoding.as_deref())?;
        let delimiter = self
            .source
            .delimiter
            .as_deref()
            .map(|value| {
                parse_delimiter(value).map_err(|reason| ConfigError::InvalidDelimiter {
                    value: value.to_string(),
                    reason,
                })
            })
            .transpose()?;

        if let Some(location) = self.source.location.as_deref().map(str::trim)
            && !location.is_empty()
        {
            if location.starts_with("http://") || location.starts_with("https://") {
                let source = HttpCsvSource::new(location, self.fetch_timeout())?
                    .with_delimiter(delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER))
                    .with_encoding(encoding);
                return Ok(Box::new(source));
            }
            let path = Path::new(location);
            let source = CsvFileSource::new(path)
                .with_delimiter(io_utils::resolve_input_delimiter(path, delimiter))
                .with_encoding(encoding);
            return Ok(Box::new(source));
        }

        if let Some(sheet_id) = self.source.sheet_id.as_deref() {
            let source =
                HttpCsvSource::google_sheet(sheet_id, self.source.gid.as_deref(), self.fetch_timeout())?
                    .with_delimiter(delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER))
                    .with_encoding(encoding);
            return Ok(Box::new(source));
        }

        Err(ConfigError::MissingSource)
    }

    pub fn build_manager(&self) -> Result<CacheManager<Box<dyn DataSource>>, ConfigError> {
        Ok(CacheManager::new(self.build_source()?)
            .with_ttl(self.ttl())
            .with_keywords(self.keyword_table())
            .with_lookup_options(self.lookup_options())
            .with_fallback(&self.fallback))
    }
}
