//! Staged resolution of free-text queries against a [`Dataset`].
//!
//! Stages run from strictest to loosest and stop at the first one that
//! yields anything:
//!
//! 1. exact identifier key
//! 2. exact locality key (all records sharing it)
//! 3. substring containment in either direction, in insertion order
//! 4. shared word between the query and a record's keys
//!
//! Queries go through the same key functions as stored values
//! ([`normalize_key`] and [`identifier_key`]); any drift between the two
//! makes lookups fail silently.

use std::{collections::HashSet, fmt, sync::Arc};

use log::debug;
use serde::Serialize;

use crate::{
    dataset::Dataset,
    record::{Record, identifier_key, normalize_key},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    ExactIdentifier,
    ExactLocality,
    Substring,
    WordOverlap,
}

impl MatchStage {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStage::ExactIdentifier => "exact identifier",
            MatchStage::ExactLocality => "exact locality",
            MatchStage::Substring => "substring",
            MatchStage::WordOverlap => "word overlap",
        }
    }
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOptions {
    pub word_overlap: bool,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self { word_overlap: true }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LookupResult {
    /// Stage that produced `records`; `None` when nothing matched.
    pub stage: Option<MatchStage>,
    pub records: Vec<Arc<Record>>,
    /// Every stage tried, in order.
    #[serde(skip)]
    pub attempted: Vec<MatchStage>,
}

impl LookupResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

pub fn lookup(query: &str, dataset: &Dataset) -> LookupResult {
    lookup_with(query, dataset, LookupOptions::default())
}

pub fn lookup_with(query: &str, dataset: &Dataset, options: LookupOptions) -> LookupResult {
    let key = normalize_key(query);
    if key.is_empty() {
        debug!("Ignoring empty query {query:?}");
        return LookupResult::default();
    }
    let compact = identifier_key(query);

    let mut result = LookupResult::default();
    let mut stages = vec![
        MatchStage::ExactIdentifier,
        MatchStage::ExactLocality,
        MatchStage::Substring,
    ];
    if options.word_overlap {
        stages.push(MatchStage::WordOverlap);
    }

    for stage in stages {
        result.attempted.push(stage);
        let records: Vec<Arc<Record>> = match stage {
            MatchStage::ExactIdentifier => dataset
                .by_identifier(&compact)
                .into_iter()
                .cloned()
                .collect(),
            MatchStage::ExactLocality => dataset.by_locality(&key).into_iter().cloned().collect(),
            MatchStage::Substring => substring_matches(dataset, &key, &compact),
            MatchStage::WordOverlap => word_overlap_matches(dataset, &key),
        };
        if !records.is_empty() {
            debug!(
                "Query {query:?} (key {key:?}) resolved by {stage} to {} record(s)",
                records.len()
            );
            result.stage = Some(stage);
            result.records = records;
            return result;
        }
    }
    debug!("Query {query:?} (key {key:?}) matched nothing");
    result
}

fn contains_either(stored: &str, probe: &str) -> bool {
    stored.contains(probe) || probe.contains(stored)
}

fn substring_matches(dataset: &Dataset, key: &str, compact: &str) -> Vec<Arc<Record>> {
    dataset
        .records()
        .iter()
        .filter(|record| {
            record
                .identifier_key()
                .is_some_and(|stored| contains_either(stored, compact))
                || record
                    .locality_key()
                    .is_some_and(|stored| contains_either(stored, key))
        })
        .cloned()
        .collect()
}

fn word_overlap_matches(dataset: &Dataset, key: &str) -> Vec<Arc<Record>> {
    let query_words: HashSet<&str> = key.split_whitespace().collect();
    dataset
        .records()
        .iter()
        .filter(|record| {
            record
                .locality_key()
                .into_iter()
                .flat_map(str::split_whitespace)
                .chain(record.identifier_key())
                .any(|word| query_words.contains(word))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordFields;

    fn dataset(entries: &[(&str, &str)]) -> Dataset {
        Dataset::from_records(entries.iter().filter_map(|(identifier, locality)| {
            Record::from_fields(RecordFields {
                identifier: Some(identifier.to_string()).filter(|v| !v.is_empty()),
                locality_name: Some(locality.to_string()).filter(|v| !v.is_empty()),
                ..RecordFields::default()
            })
        }))
    }

    fn identifiers(result: &LookupResult) -> Vec<&str> {
        result
            .records
            .iter()
            .filter_map(|record| record.identifier())
            .collect()
    }

    #[test]
    fn exact_identifier_short_circuits_later_stages() {
        let data = dataset(&[("KIC001", "Aksarka"), ("KIC0011", "Aksarka-2")]);
        let result = lookup("kic 001", &data);
        assert_eq!(result.stage, Some(MatchStage::ExactIdentifier));
        assert_eq!(identifiers(&result), vec!["KIC001"]);
        assert_eq!(result.attempted, vec![MatchStage::ExactIdentifier]);
    }

    #[test]
    fn exact_locality_returns_all_sharing_records() {
        let data = dataset(&[("N1", "Ноябрьск"), ("G1", "Губкинский"), ("N2", "Ноябрьск")]);
        let result = lookup("  ноябрьск ", &data);
        assert_eq!(result.stage, Some(MatchStage::ExactLocality));
        assert_eq!(identifiers(&result), vec!["N1", "N2"]);
        assert_eq!(
            result.attempted,
            vec![MatchStage::ExactIdentifier, MatchStage::ExactLocality]
        );
    }

    #[test]
    fn substring_matches_in_both_directions() {
        let data = dataset(&[("KIC001", "Aksarka"), ("KIC002", "Salekhard")]);
        let prefix = lookup("aks", &data);
        assert_eq!(prefix.stage, Some(MatchStage::Substring));
        assert_eq!(identifiers(&prefix), vec!["KIC001"]);

        let superset = lookup("Salekhard city office", &data);
        assert_eq!(superset.stage, Some(MatchStage::Substring));
        assert_eq!(identifiers(&superset), vec!["KIC002"]);
    }

    #[test]
    fn word_overlap_is_the_last_resort() {
        let data = dataset(&[("A1", "Новый Уренгой"), ("B1", "Новый Порт"), ("C1", "Надым")]);
        let result = lookup("уренгой новый район", &data);
        assert_eq!(result.stage, Some(MatchStage::WordOverlap));
        assert_eq!(identifiers(&result), vec!["A1", "B1"]);
        assert_eq!(result.attempted.len(), 4);

        let strict = lookup_with(
            "уренгой новый район",
            &data,
            LookupOptions {
                word_overlap: false,
            },
        );
        assert!(strict.is_empty());
        assert_eq!(strict.stage, None);
    }

    #[test]
    fn blank_queries_skip_every_stage() {
        let data = dataset(&[("KIC001", "Aksarka")]);
        for query in ["", "   ", "--/.."] {
            let result = lookup(query, &data);
            assert!(result.is_empty());
            assert!(result.attempted.is_empty());
        }
    }

    #[test]
    fn unknown_query_returns_empty() {
        let data = dataset(&[("KIC001", "Aksarka")]);
        let result = lookup("Лабытнанги", &data);
        assert!(result.is_empty());
        assert_eq!(result.attempted.len(), 4);
    }
}
