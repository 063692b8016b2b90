//! Durable result store: a JSON array of successful outcomes on disk.
//!
//! The store only ever grows by merge: each save re-reads the current file,
//! appends the new successes, and atomically replaces the file (temp file +
//! rename). A single process-wide mutex serializes read-merge-write cycles,
//! so concurrent workers cannot drop each other's additions. Failed
//! outcomes are never written; a permanently failing document is retried on
//! every future run.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{CoreError, SummaryOutcome};

pub struct ResultStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the successful outcomes currently on disk.
    ///
    /// A missing file is an empty store. An unparsable file logs a warning
    /// and is treated as empty, favoring forward progress over strict consistency.
    /// Entries that are not success-shaped (legacy error entries, empty
    /// summaries) are skipped, as are duplicate file names.
    pub fn load_existing(&self) -> (HashSet<String>, Vec<SummaryOutcome>) {
        read_successful(&self.path)
    }

    /// Merge new outcomes into the store, returning how many were appended.
    ///
    /// Only successful outcomes not already present (by file name) are
    /// written. `file_index` is assigned at persistence time from the count
    /// of known successes, so it reflects completion order. When nothing
    /// qualifies the file is left untouched.
    pub fn merge_and_save(&self, new_outcomes: &[SummaryOutcome]) -> Result<usize, CoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let (mut names, mut merged) = read_successful(&self.path);
        let mut appended = 0;
        for outcome in new_outcomes {
            if !outcome.is_success() || names.contains(&outcome.file_name) {
                continue;
            }
            let mut entry = outcome.clone();
            entry.file_index = Some(merged.len() + 1);
            names.insert(entry.file_name.clone());
            merged.push(entry);
            appended += 1;
        }

        if appended > 0 {
            self.write_atomic(&merged)?;
            tracing::debug!(
                path = %self.path.display(),
                appended,
                total = merged.len(),
                "merged outcomes into result store"
            );
        }
        Ok(appended)
    }

    /// Persist a single outcome immediately, returning its assigned
    /// `file_index` (or `None` if it was a failure or already present).
    ///
    /// Workers call this per completion so a crash loses at most one
    /// in-flight item.
    pub fn append(&self, outcome: &SummaryOutcome) -> Result<Option<usize>, CoreError> {
        if !outcome.is_success() {
            return Ok(None);
        }
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let (names, mut merged) = read_successful(&self.path);
        if names.contains(&outcome.file_name) {
            return Ok(None);
        }
        let index = merged.len() + 1;
        let mut entry = outcome.clone();
        entry.file_index = Some(index);
        merged.push(entry);
        self.write_atomic(&merged)?;
        Ok(Some(index))
    }

    /// Replace the store file atomically via a temp file in the same
    /// directory, so readers never observe a half-written document.
    fn write_atomic(&self, outcomes: &[SummaryOutcome]) -> Result<(), CoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => {
                std::fs::create_dir_all(p)?;
                p.to_path_buf()
            }
            _ => PathBuf::from("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(serde_json::to_string_pretty(outcomes)?.as_bytes())?;
        tmp.persist(&self.path)
            .map_err(|e| CoreError::Io(e.error))?;
        Ok(())
    }
}

fn read_successful(path: &Path) -> (HashSet<String>, Vec<SummaryOutcome>) {
    let mut names = HashSet::new();
    let mut outcomes = Vec::new();

    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return (names, outcomes),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "result store unreadable, treating as empty");
            return (names, outcomes);
        }
    };

    let entries: Vec<SummaryOutcome> = match serde_json::from_str(&data) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "result store malformed, treating as empty");
            return (names, outcomes);
        }
    };

    for entry in entries {
        if entry.is_success() && names.insert(entry.file_name.clone()) {
            outcomes.push(entry);
        }
    }
    (names, outcomes)
}
