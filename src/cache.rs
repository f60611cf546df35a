//! Process-lifetime cache of the normalized dataset.
//!
//! The cache is a small state machine over the current [`CacheEntry`]:
//!
//! - **Empty**: nothing cached yet; every call attempts a fetch.
//! - **Fresh**: a live entry younger than the TTL, or the static fallback.
//! - **Stale**: a live entry older than the TTL; the next call refreshes,
//!   and keeps serving the old entry if that refresh fails.
//!
//! What happens after a fetch attempt is decided by [`transition`], a pure
//! function of the current entry and the fetch outcome. Readers hold an
//! `Arc` to the entry they were given, so swapping in a new dataset never
//! invalidates a lookup in progress.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    dataset::Dataset,
    error::RefreshError,
    fallback::StaticFallback,
    lookup::{LookupOptions, LookupResult, lookup_with},
    schema::KeywordTable,
    source::DataSource,
};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Live,
    StaticFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CacheState::Empty => "empty",
            CacheState::Fresh => "fresh",
            CacheState::Stale => "stale",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct CacheEntry {
    pub dataset: Arc<Dataset>,
    pub fetched_at: DateTime<Utc>,
    pub source_kind: SourceKind,
}

impl CacheEntry {
    pub fn state_at(&self, now: DateTime<Utc>, ttl: Duration) -> CacheState {
        if self.source_kind == SourceKind::StaticFallback {
            return CacheState::Fresh;
        }
        let age = (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO);
        if age > ttl {
            CacheState::Stale
        } else {
            CacheState::Fresh
        }
    }
}

pub fn state_of(entry: Option<&CacheEntry>, now: DateTime<Utc>, ttl: Duration) -> CacheState {
    entry.map_or(CacheState::Empty, |entry| entry.state_at(now, ttl))
}

/// Outcome of one refresh attempt.
#[derive(Debug)]
pub enum Transition {
    /// Install a newly fetched live dataset.
    Replace(Dataset),
    /// Keep serving the current entry, however old.
    Keep(Arc<CacheEntry>),
    /// Nothing cached and the live source failed: install the fallback.
    InstallFallback,
    /// Nothing cached and no fallback: answer with an empty live dataset
    /// without caching it, so the next call tries again.
    ServeEmpty,
}

pub fn transition(
    current: Option<Arc<CacheEntry>>,
    outcome: Result<Dataset, RefreshError>,
    has_fallback: bool,
) -> Transition {
    match (outcome, current) {
        (Ok(dataset), Some(entry)) if dataset.is_empty() && !entry.dataset.is_empty() => {
            Transition::Keep(entry)
        }
        (Ok(dataset), _) => Transition::Replace(dataset),
        (Err(_), Some(entry)) => Transition::Keep(entry),
        (Err(_), None) if has_fallback => Transition::InstallFallback,
        (Err(_), None) => Transition::ServeEmpty,
    }
}

/// Dataset handed to a caller together with where it came from.
#[derive(Debug, Clone)]
pub struct CachedDataset {
    pub dataset: Arc<Dataset>,
    pub source_kind: SourceKind,
    pub fetched_at: Option<DateTime<Utc>>,
    pub state: CacheState,
}

impl CachedDataset {
    fn from_entry(entry: &CacheEntry, state: CacheState) -> Self {
        Self {
            dataset: Arc::clone(&entry.dataset),
            source_kind: entry.source_kind,
            fetched_at: Some(entry.fetched_at),
            state,
        }
    }

    fn empty() -> Self {
        Self {
            dataset: Arc::new(Dataset::empty()),
            source_kind: SourceKind::Live,
            fetched_at: None,
            state: CacheState::Empty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedLookup {
    pub result: LookupResult,
    pub snapshot: CachedDataset,
}

pub struct CacheManager<S> {
    source: S,
    ttl: Duration,
    keywords: KeywordTable,
    options: LookupOptions,
    fallback: Option<Arc<Dataset>>,
    clock: Arc<dyn Clock>,
    entry: RwLock<Option<Arc<CacheEntry>>>,
}

impl<S: DataSource> CacheManager<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            ttl: DEFAULT_TTL,
            keywords: KeywordTable::default(),
            options: LookupOptions::default(),
            fallback: None,
            clock: Arc::new(SystemClock),
            entry: RwLock::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordTable) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_lookup_options(mut self, options: LookupOptions) -> Self {
        self.options = options;
        self
    }

    /// An empty fallback counts as no fallback.
    pub fn with_fallback(mut self, fallback: &StaticFallback) -> Self {
        let dataset = fallback.to_dataset();
        self.fallback = (!dataset.is_empty()).then(|| Arc::new(dataset));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn state(&self) -> CacheState {
        state_of(self.current().as_deref(), self.clock.now(), self.ttl)
    }

    /// Returns the cached dataset when fresh, otherwise makes exactly one
    /// fetch attempt and applies [`transition`] to its outcome.
    pub fn get_dataset(&self, force_refresh: bool) -> CachedDataset {
        let now = self.clock.now();
        let current = self.current();
        let state = state_of(current.as_deref(), now, self.ttl);
        if state == CacheState::Fresh
            && !force_refresh
            && let Some(entry) = current.as_deref()
        {
            return CachedDataset::from_entry(entry, state);
        }

        if force_refresh {
            info!("Forced refresh from {}", self.source.describe());
        } else {
            debug!("Cache is {state}; refreshing from {}", self.source.describe());
        }
        let outcome = self.fetch();
        match &outcome {
            Ok(dataset) => info!(
                "Loaded {} record(s) from {} ({} row(s) read, {} skipped)",
                dataset.len(),
                self.source.describe(),
                dataset.rows_read(),
                dataset.rows_skipped()
            ),
            Err(err) => warn!("Refresh from {} failed: {err}", self.source.describe()),
        }

        match transition(current, outcome, self.fallback.is_some()) {
            Transition::Replace(dataset) => {
                let entry = Arc::new(CacheEntry {
                    dataset: Arc::new(dataset),
                    fetched_at: now,
                    source_kind: SourceKind::Live,
                });
                self.store(Arc::clone(&entry));
                CachedDataset::from_entry(&entry, CacheState::Fresh)
            }
            Transition::Keep(entry) => {
                let state = entry.state_at(now, self.ttl);
                warn!(
                    "Serving {state} {} dataset from {} with {} record(s)",
                    match entry.source_kind {
                        SourceKind::Live => "live",
                        SourceKind::StaticFallback => "fallback",
                    },
                    entry.fetched_at.to_rfc3339(),
                    entry.dataset.len()
                );
                CachedDataset::from_entry(&entry, state)
            }
            Transition::InstallFallback => {
                let Some(dataset) = self.fallback.as_ref() else {
                    return CachedDataset::empty();
                };
                warn!(
                    "Live source unavailable; using static fallback with {} record(s)",
                    dataset.len()
                );
                let entry = Arc::new(CacheEntry {
                    dataset: Arc::clone(dataset),
                    fetched_at: now,
                    source_kind: SourceKind::StaticFallback,
                });
                self.store(Arc::clone(&entry));
                CachedDataset::from_entry(&entry, CacheState::Fresh)
            }
            Transition::ServeEmpty => {
                warn!("Live source unavailable and no fallback configured; no records to serve");
                CachedDataset::empty()
            }
        }
    }

    pub fn lookup(&self, query: &str) -> CachedLookup {
        let snapshot = self.get_dataset(false);
        let result = lookup_with(query, &snapshot.dataset, self.options);
        CachedLookup { result, snapshot }
    }

    fn fetch(&self) -> Result<Dataset, RefreshError> {
        let table = self.source.fetch_raw_table()?;
        Dataset::from_table(&table, &self.keywords)
    }

    fn current(&self) -> Option<Arc<CacheEntry>> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, entry: Arc<CacheEntry>) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);
    }
}
