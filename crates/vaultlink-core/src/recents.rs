//! Recent-use tracking.
//!
//! A small local journal of the entries the user picked most recently,
//! stored as JSON under the platform cache dir. Only (entry, source)
//! references and timestamps are kept here; resolving them back to live
//! entry records goes through the desktop's specific-entries lookup.

use crate::error::{DesktopError, Result};
use crate::models::EntryRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CAP: usize = 10;

/// One recent-use record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentUse {
    #[serde(rename = "entryID")]
    pub entry_id: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    #[serde(rename = "lastUsed")]
    pub last_used: DateTime<Utc>,
}

/// File-backed journal, most recent first, capped.
#[derive(Debug)]
pub struct RecentsStore {
    path: Option<PathBuf>,
    cap: usize,
    records: Vec<RecentUse>,
}

impl RecentsStore {
    /// Load the journal from the given path, or the default cache location.
    /// An unreadable or corrupt file starts the journal over rather than
    /// failing: recents are a convenience, not data.
    pub fn load(custom_path: Option<PathBuf>, cap: usize) -> Result<Self> {
        let path = match custom_path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        let records = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!("Discarding unreadable recents journal: {err}");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Ok(Self {
            path: Some(path),
            cap,
            records,
        })
    }

    /// An unsaved, empty journal.
    pub fn ephemeral(cap: usize) -> Self {
        Self {
            path: None,
            cap,
            records: Vec::new(),
        }
    }

    /// Record a use of the given entry, moving it to the front.
    pub fn track(&mut self, entry_id: &str, source_id: &str) -> Result<()> {
        self.records
            .retain(|r| !(r.entry_id == entry_id && r.source_id == source_id));
        self.records.insert(
            0,
            RecentUse {
                entry_id: entry_id.to_string(),
                source_id: source_id.to_string(),
                last_used: Utc::now(),
            },
        );
        self.records.truncate(self.cap);
        self.save()
    }

    /// References to the recent entries, most recent first.
    pub fn refs(&self) -> Vec<EntryRef> {
        self.records
            .iter()
            .map(|r| EntryRef {
                entry_id: r.entry_id.clone(),
                source_id: r.source_id.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn save(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(&self.records)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn default_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| DesktopError::Keystore("Could not determine cache directory".into()))?;
        Ok(cache_dir.join("vaultlink").join("recents.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_moves_entry_to_front() {
        let mut store = RecentsStore::ephemeral(DEFAULT_CAP);
        store.track("e1", "s1").unwrap();
        store.track("e2", "s1").unwrap();
        store.track("e1", "s1").unwrap();

        let refs = store.refs();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].entry_id, "e1");
        assert_eq!(refs[1].entry_id, "e2");
    }

    #[test]
    fn journal_is_capped() {
        let mut store = RecentsStore::ephemeral(3);
        for i in 0..5 {
            store.track(&format!("e{i}"), "s1").unwrap();
        }
        let refs = store.refs();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].entry_id, "e4");
    }

    #[test]
    fn same_entry_in_two_sources_is_two_records() {
        let mut store = RecentsStore::ephemeral(DEFAULT_CAP);
        store.track("e1", "s1").unwrap();
        store.track("e1", "s2").unwrap();
        assert_eq!(store.refs().len(), 2);
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recents.json");

        let mut store = RecentsStore::load(Some(path.clone()), DEFAULT_CAP).unwrap();
        store.track("e1", "s1").unwrap();

        let reloaded = RecentsStore::load(Some(path), DEFAULT_CAP).unwrap();
        assert_eq!(reloaded.refs().len(), 1);
        assert_eq!(reloaded.refs()[0].source_id, "s1");
    }

    #[test]
    fn corrupt_journal_starts_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recents.json");
        std::fs::write(&path, "not json").unwrap();

        let store = RecentsStore::load(Some(path), DEFAULT_CAP).unwrap();
        assert!(store.is_empty());
    }
}
