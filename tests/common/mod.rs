#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use center_lookup::cache::Clock;
use center_lookup::error::SourceError;
use center_lookup::source::{DataSource, RawTable};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().expect("clock lock");
        *now += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// Source that replays queued outcomes and fails once the queue is drained.
pub struct ScriptedSource {
    outcomes: Mutex<VecDeque<Result<RawTable, SourceError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then_table(self, table: RawTable) -> Self {
        self.outcomes.lock().expect("queue lock").push_back(Ok(table));
        self
    }

    pub fn then_fail(self) -> Self {
        self.outcomes
            .lock()
            .expect("queue lock")
            .push_back(Err(unreachable_source()));
        self
    }

    pub fn push_table(&self, table: RawTable) {
        self.outcomes.lock().expect("queue lock").push_back(Ok(table));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataSource for ScriptedSource {
    fn fetch_raw_table(&self) -> Result<RawTable, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .expect("queue lock")
            .pop_front()
            .unwrap_or_else(|| Err(unreachable_source()))
    }

    fn describe(&self) -> String {
        "scripted source".to_string()
    }
}

fn unreachable_source() -> SourceError {
    SourceError::Timeout {
        url: "https://sheets.invalid/export".to_string(),
    }
}

pub fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect(),
        undecodable_rows: 0,
    }
}

pub fn centers_table() -> RawTable {
    table(
        &["Code", "City", "Address", "Name", "Phone", "Email"],
        &[
            &["KIC001", " Aksarka ", "Main St 1", "A. Ivanov", "555-0100", "a@x.com"],
            &["KIC002", "Ноябрьск", "ул. Ленина 5", "Б. Петров", "555-0101", "b@x.com"],
            &["KIC003", "Ноябрьск", "ул. Мира 7", "В. Сидоров", "555-0102", "c@x.com"],
        ],
    )
}
