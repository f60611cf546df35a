use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    error::RefreshError,
    record::{Record, normalize_row},
    schema::{ColumnMap, KeywordTable, infer_column_map},
    source::RawTable,
};

/// One refresh worth of records with its identifier and locality views.
///
/// Never mutated after construction; the cache swaps whole datasets.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Arc<Record>>,
    by_identifier: HashMap<String, usize>,
    by_locality: HashMap<String, Vec<usize>>,
    column_map: Option<ColumnMap>,
    rows_read: usize,
    rows_skipped: usize,
    rows_superseded: usize,
}

impl Dataset {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Infers the column layout from the table headers and normalizes every
    /// row. Rows without an identifier or locality are skipped and counted,
    /// together with rows the reader could not decode.
    pub fn from_table(table: &RawTable, keywords: &KeywordTable) -> Result<Self, RefreshError> {
        if table.rows.is_empty() && table.undecodable_rows == 0 {
            return Err(RefreshError::EmptyResponse);
        }
        let map = infer_column_map(&table.headers, keywords)?;
        info!("Column layout: {}", map.describe(&table.headers));
        if let Some(widest) = map.max_index() {
            let short_rows = table.rows.iter().filter(|row| row.len() <= widest).count();
            if short_rows > 0 {
                debug!("{short_rows} row(s) shorter than column {widest}; missing cells read as empty");
            }
        }

        let mut records = Vec::with_capacity(table.rows.len());
        let mut skipped = table.undecodable_rows;
        for (idx, row) in table.rows.iter().enumerate() {
            match normalize_row(row, &map) {
                Some(record) => records.push(record),
                None => {
                    // +2: one for the header row, one for 1-based sheet numbering
                    debug!("Skipping row {} without identifier or locality: {row:?}", idx + 2);
                    skipped += 1;
                }
            }
        }
        let rows_read = table.rows.len() + table.undecodable_rows;
        if skipped > 0 {
            warn!("Skipped {skipped} of {rows_read} row(s) as undecodable or without identifier or locality");
        }

        let mut dataset = Self::from_records(records);
        dataset.column_map = Some(map);
        dataset.rows_read = rows_read;
        dataset.rows_skipped = skipped;
        Ok(dataset)
    }

    /// Indexes records in order. When several records share an identifier
    /// key the last one wins and the earlier ones are dropped from every view.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let records: Vec<Record> = records.into_iter().collect();
        let rows_read = records.len();

        let mut last_seen: HashMap<&str, usize> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            if let Some(key) = record.identifier_key() {
                last_seen.insert(key, idx);
            }
        }
        let superseded: HashSet<usize> = records
            .iter()
            .enumerate()
            .filter(|(idx, record)| {
                record
                    .identifier_key()
                    .is_some_and(|key| last_seen.get(key) != Some(idx))
            })
            .map(|(idx, _)| idx)
            .collect();
        for idx in &superseded {
            debug!(
                "Identifier {:?} appears again later; keeping the later row",
                records[*idx].identifier()
            );
        }

        let mut dataset = Dataset {
            rows_read,
            rows_superseded: superseded.len(),
            ..Dataset::default()
        };
        for (idx, record) in records.into_iter().enumerate() {
            if superseded.contains(&idx) {
                continue;
            }
            let position = dataset.records.len();
            if let Some(key) = record.identifier_key() {
                dataset.by_identifier.insert(key.to_string(), position);
            }
            if let Some(key) = record.locality_key() {
                dataset
                    .by_locality
                    .entry(key.to_string())
                    .or_default()
                    .push(position);
            }
            dataset.records.push(Arc::new(record));
        }
        dataset
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    pub fn by_identifier(&self, key: &str) -> Option<&Arc<Record>> {
        self.by_identifier
            .get(key)
            .map(|position| &self.records[*position])
    }

    pub fn by_locality(&self, key: &str) -> Vec<&Arc<Record>> {
        self.by_locality
            .get(key)
            .map(|positions| positions.iter().map(|p| &self.records[*p]).collect())
            .unwrap_or_default()
    }

    pub fn column_map(&self) -> Option<&ColumnMap> {
        self.column_map.as_ref()
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    pub fn rows_superseded(&self) -> usize {
        self.rows_superseded
    }

    /// Up to `limit` display keys (identifier, else locality) for "did you
    /// mean" hints.
    pub fn sample_keys(&self, limit: usize) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|record| record.identifier().or_else(|| record.locality_name()))
            .unique()
            .take(limit)
            .map(str::to_string)
            .collect()
    }
}
