// src/knowledge/store.rs
//! Flat-file persistence: the knowledge base JSON array and the
//! `{"last_update": ...}` marker next to it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::knowledge::types::KnowledgeEntry;

#[derive(Debug, Serialize, Deserialize)]
struct LastUpdateMarker {
    last_update: String,
}

#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    data_path: PathBuf,
    last_update_path: PathBuf,
}

impl KnowledgeStore {
    pub fn new(data_path: impl Into<PathBuf>, last_update_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            last_update_path: last_update_path.into(),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// All stored entries. A missing, unreadable or corrupt file reads as empty.
    pub fn load(&self) -> Vec<KnowledgeEntry> {
        if !self.data_path.exists() {
            warn!(path = %self.data_path.display(), "knowledge base file not found");
            return Vec::new();
        }
        let raw = match fs::read_to_string(&self.data_path) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, path = %self.data_path.display(), "reading knowledge base");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, path = %self.data_path.display(), "parsing knowledge base");
                Vec::new()
            }
        }
    }

    /// Overwrite the knowledge base, creating parent directories as needed.
    pub fn save(&self, entries: &[KnowledgeEntry]) -> io::Result<()> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(&self.data_path, json.as_bytes())
    }

    /// Time of the last completed refresh; `DateTime::<Utc>::MIN_UTC` when the
    /// marker is absent or unreadable.
    pub fn last_update(&self) -> DateTime<Utc> {
        if !self.last_update_path.exists() {
            return DateTime::<Utc>::MIN_UTC;
        }
        let parsed = fs::read_to_string(&self.last_update_path)
            .map_err(|e| e.to_string())
            .and_then(|s| {
                serde_json::from_str::<LastUpdateMarker>(&s).map_err(|e| e.to_string())
            })
            .and_then(|m| {
                parse_timestamp(&m.last_update)
                    .ok_or_else(|| format!("unrecognised timestamp {:?}", m.last_update))
            });
        match parsed {
            Ok(ts) => ts,
            Err(e) => {
                error!(error = %e, path = %self.last_update_path.display(), "reading last update marker");
                DateTime::<Utc>::MIN_UTC
            }
        }
    }

    pub fn mark_updated(&self) -> io::Result<()> {
        self.mark_updated_at(Utc::now())
    }

    pub fn mark_updated_at(&self, ts: DateTime<Utc>) -> io::Result<()> {
        let marker = LastUpdateMarker {
            last_update: ts.to_rfc3339(),
        };
        let json = serde_json::to_string(&marker)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_atomic(&self.last_update_path, json.as_bytes())
    }
}

/// RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_store() -> (tempfile::TempDir, KnowledgeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::new(
            dir.path().join("nested/data/knowledge_base.json"),
            dir.path().join("nested/data/last_update.json"),
        );
        (dir, store)
    }

    #[test]
    fn missing_and_corrupt_files_read_as_empty() {
        let (_dir, store) = temp_store();
        assert!(store.load().is_empty());

        fs::create_dir_all(store.data_path().parent().unwrap()).unwrap();
        fs::write(store.data_path(), "{ not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_creates_parents_and_round_trips_unicode() {
        let (_dir, store) = temp_store();
        let entries = vec![KnowledgeEntry::new(
            "Cập nhật thuật toán",
            "Nội dung",
            "Facebook Newsroom",
            "news",
            "2024-05-01",
        )];
        store.save(&entries).unwrap();
        assert_eq!(store.load(), entries);
        let raw = fs::read_to_string(store.data_path()).unwrap();
        assert!(raw.contains("Cập nhật thuật toán"));
    }

    #[test]
    fn last_update_defaults_to_min_and_round_trips() {
        let (_dir, store) = temp_store();
        assert_eq!(store.last_update(), DateTime::<Utc>::MIN_UTC);

        let ts = Utc::now() - Duration::hours(3);
        store.mark_updated_at(ts).unwrap();
        let read = store.last_update();
        assert!((read - ts).num_milliseconds().abs() < 1);
    }

    #[test]
    fn naive_iso_marker_is_accepted() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.data_path().parent().unwrap()).unwrap();
        fs::write(
            &store.last_update_path,
            r#"{"last_update": "2024-03-01T10:20:30.123456"}"#,
        )
        .unwrap();
        assert_eq!(store.last_update().to_rfc3339(), "2024-03-01T10:20:30.123456+00:00");
    }

    #[test]
    fn garbage_marker_reads_as_min() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.data_path().parent().unwrap()).unwrap();
        fs::write(&store.last_update_path, r#"{"last_update": "yesterday"}"#).unwrap();
        assert_eq!(store.last_update(), DateTime::<Utc>::MIN_UTC);
    }
}
