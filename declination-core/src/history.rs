use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::model::DeclinationOutcome;

/// Newest-first list of past outcomes, persisted as a JSON array.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self { path: path.into(), limit }
    }

    /// Store at the platform data directory.
    pub fn open_default(limit: usize) -> Result<Self> {
        Ok(Self::new(crate::Config::history_file_path()?, limit))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, newest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<DeclinationOutcome>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file: {}", self.path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse history file: {}", self.path.display()))
    }

    /// Prepend `outcomes` (keeping their relative order) and drop the oldest
    /// entries beyond the retention limit.
    pub fn append(&self, outcomes: &[DeclinationOutcome]) -> Result<()> {
        if outcomes.is_empty() {
            return Ok(());
        }

        let mut entries = outcomes.to_vec();
        entries.extend(self.load()?);
        entries.truncate(self.limit);

        debug!(added = outcomes.len(), kept = entries.len(), "Updating history");
        self.write(&entries)
    }

    pub fn clear(&self) -> Result<()> {
        self.write(&[])
    }

    fn write(&self, entries: &[DeclinationOutcome]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(entries).context("Failed to serialize history")?;

        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write history file: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn failed(lat: f64) -> DeclinationOutcome {
        DeclinationOutcome::Failure {
            name: None,
            latitude: lat,
            longitude: 0.0,
            elevation: 0.0,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            error_message: "offline".into(),
        }
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("history.json"), 5);
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn append_prepends_newest_batch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("data").join("history.json"), 10);

        store.append(&[failed(1.0), failed(2.0)]).expect("append");
        store.append(&[failed(3.0)]).expect("append");

        let lats: Vec<f64> = store.load().expect("load").iter().map(|o| o.latitude()).collect();
        assert_eq!(lats, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn append_respects_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("history.json"), 3);

        store.append(&[failed(1.0), failed(2.0)]).expect("append");
        store.append(&[failed(3.0), failed(4.0)]).expect("append");

        let lats: Vec<f64> = store.load().expect("load").iter().map(|o| o.latitude()).collect();
        assert_eq!(lats, vec![3.0, 4.0, 1.0]);
    }

    #[test]
    fn clear_empties_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("history.json"), 3);

        store.append(&[failed(1.0)]).expect("append");
        store.clear().expect("clear");
        assert!(store.load().expect("load").is_empty());
    }
}
