//! Data source adapters producing a raw header row plus data rows.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use encoding_rs::{Encoding, UTF_8};
use log::debug;
use url::Url;

use crate::{error::SourceError, io_utils};

const GOOGLE_SHEETS_BASE: &str = "https://docs.google.com/spreadsheets/d/";

/// Header row and data rows exactly as fetched, before any normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Data rows dropped because a cell could not be decoded.
    pub undecodable_rows: usize,
}

pub trait DataSource: Send + Sync {
    fn fetch_raw_table(&self) -> Result<RawTable, SourceError>;

    /// Short human-readable location for log lines.
    fn describe(&self) -> String;
}

impl<T: DataSource + ?Sized> DataSource for Box<T> {
    fn fetch_raw_table(&self) -> Result<RawTable, SourceError> {
        (**self).fetch_raw_table()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
    delimiter: u8,
    encoding: &'static Encoding,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let delimiter = io_utils::resolve_input_delimiter(&path, None);
        Self {
            path,
            delimiter,
            encoding: UTF_8,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for CsvFileSource {
    fn fetch_raw_table(&self) -> Result<RawTable, SourceError> {
        let file = File::open(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        io_utils::read_raw_table(BufReader::new(file), self.delimiter, self.encoding)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// CSV export fetched over HTTP(S), bounded by a fixed request timeout.
#[derive(Debug, Clone)]
pub struct HttpCsvSource {
    url: Url,
    timeout: Duration,
    delimiter: u8,
    encoding: &'static Encoding,
}

impl HttpCsvSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let url = Url::parse(url).map_err(|_| SourceError::InvalidUrl(url.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SourceError::InvalidUrl(url.to_string()));
        }
        Ok(Self {
            url,
            timeout,
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        })
    }

    /// CSV export URL of a shared Google Sheet; `gid` selects a tab other
    /// than the first.
    pub fn google_sheet(
        sheet_id: &str,
        gid: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let id = sheet_id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(SourceError::InvalidUrl(format!("{GOOGLE_SHEETS_BASE}{id}")));
        }
        let mut url = Url::parse(GOOGLE_SHEETS_BASE)
            .and_then(|base| base.join(&format!("{id}/export")))
            .map_err(|_| SourceError::InvalidUrl(format!("{GOOGLE_SHEETS_BASE}{id}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("format", "csv");
            if let Some(gid) = gid.map(str::trim).filter(|g| !g.is_empty()) {
                query.append_pair("gid", gid);
            }
        }
        Ok(Self {
            url,
            timeout,
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        })
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn http_error(&self, source: reqwest::Error) -> SourceError {
        if source.is_timeout() {
            SourceError::Timeout {
                url: self.url.to_string(),
            }
        } else {
            SourceError::Http {
                url: self.url.to_string(),
                source,
            }
        }
    }
}

impl DataSource for HttpCsvSource {
    fn fetch_raw_table(&self) -> Result<RawTable, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| self.http_error(err))?;
        debug!("GET {} (timeout {:?})", self.url, self.timeout);
        let body = client
            .get(self.url.clone())
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .map_err(|err| self.http_error(err))?;
        io_utils::read_raw_table(body.as_ref(), self.delimiter, self.encoding)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// Fixed table held in memory; useful for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    table: RawTable,
}

impl InMemorySource {
    pub fn new(table: RawTable) -> Self {
        Self { table }
    }
}

impl DataSource for InMemorySource {
    fn fetch_raw_table(&self) -> Result<RawTable, SourceError> {
        Ok(self.table.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory table ({} row(s))", self.table.rows.len())
    }
}
