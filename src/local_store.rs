//! Local copies of submitted sessions: a bounded oldest-first-evicting cache
//! persisted as JSON, plus standalone CSV export files.

use crate::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Sessions kept before the oldest is evicted
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: String,
    pub letter: String,
    /// RFC 3339
    pub timestamp: String,
    pub csv_data: String,
}

impl StoredSession {
    pub fn new(id: &str, letter: &str, csv_data: &str, at: DateTime<Local>) -> Self {
        Self {
            id: id.to_string(),
            letter: letter.to_string(),
            timestamp: at.to_rfc3339(),
            csv_data: csv_data.to_string(),
        }
    }

    pub fn saved_at(&self) -> Option<DateTime<Local>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Local))
    }
}

/// Fixed-capacity FIFO of stored sessions
#[derive(Debug, Clone)]
pub struct LocalSessionCache {
    capacity: usize,
    sessions: VecDeque<StoredSession>,
    path: Option<PathBuf>,
}

impl LocalSessionCache {
    /// In-memory cache with no backing file
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: VecDeque::new(),
            path: None,
        }
    }

    /// Cache backed by `path`. A missing or unreadable file starts empty; an
    /// oversize file keeps only its newest `capacity` entries.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut cache = Self::new(capacity);

        if let Ok(bytes) = fs::read(&path) {
            match serde_json::from_slice::<Vec<StoredSession>>(&bytes) {
                Ok(stored) => {
                    for s in stored {
                        cache.push_entry(s);
                    }
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "discarding unreadable local cache");
                }
            }
        }

        cache.path = Some(path);
        cache
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Oldest first
    pub fn sessions(&self) -> impl Iterator<Item = &StoredSession> {
        self.sessions.iter()
    }

    pub fn sessions_for_letter<'a>(
        &'a self,
        letter: &'a str,
    ) -> impl Iterator<Item = &'a StoredSession> + 'a {
        self.sessions.iter().filter(move |s| s.letter == letter)
    }

    /// Insert and persist. Re-saving an id replaces its entry and moves it to
    /// the newest slot. Returns the evicted entries.
    pub fn push(&mut self, session: StoredSession) -> Result<Vec<StoredSession>> {
        let evicted = self.push_entry(session);
        if !evicted.is_empty() {
            info!(evicted = evicted.len(), "local session cache full, evicted oldest");
        }
        self.persist()?;
        Ok(evicted)
    }

    fn push_entry(&mut self, session: StoredSession) -> Vec<StoredSession> {
        self.sessions.retain(|s| s.id != session.id);
        self.sessions.push_back(session);

        let mut evicted = Vec::new();
        while self.sessions.len() > self.capacity {
            if let Some(oldest) = self.sessions.pop_front() {
                evicted.push(oldest);
            }
        }
        evicted
    }

    pub fn clear(&mut self) -> Result<()> {
        self.sessions.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored: Vec<&StoredSession> = self.sessions.iter().collect();
        fs::write(path, serde_json::to_vec_pretty(&stored)?)?;
        Ok(())
    }

    /// Combined table of every cached session, each embedded CSV as one quoted field.
    pub fn export_all(&self) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(["session_id", "letter", "timestamp", "csv_data"])?;
        for s in &self.sessions {
            wtr.write_record([&s.id, &s.letter, &s.timestamp, &s.csv_data])?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| crate::Error::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// File name of the downloadable artifact for one session
pub fn export_file_name(letter: &str, session_id: &str) -> String {
    format!("alphabet_{letter}_{session_id}.csv")
}

/// Write the downloadable CSV artifact into `dir`, returning its path.
pub fn write_export_file(dir: &Path, letter: &str, session_id: &str, csv: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(letter, session_id));
    fs::write(&path, csv)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stored(id: &str, letter: &str) -> StoredSession {
        StoredSession::new(id, letter, "session_id,letter\nx,A\n", Local::now())
    }

    #[test]
    fn test_evicts_oldest_beyond_capacity() {
        let mut cache = LocalSessionCache::new(3);
        for i in 0..3 {
            assert!(cache.push(stored(&format!("s{i}"), "A")).unwrap().is_empty());
        }

        let evicted = cache.push(stored("s3", "B")).unwrap();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, "s0");

        let ids: Vec<&str> = cache.sessions().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_resaving_an_id_replaces_it() {
        let mut cache = LocalSessionCache::new(3);
        cache.push(stored("s0", "A")).unwrap();
        cache.push(stored("s1", "A")).unwrap();
        cache.push(stored("s0", "A")).unwrap();

        let ids: Vec<&str> = cache.sessions().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s0"]);
    }

    #[test]
    fn test_filter_by_letter() {
        let mut cache = LocalSessionCache::new(10);
        cache.push(stored("a1", "A")).unwrap();
        cache.push(stored("b1", "B")).unwrap();
        cache.push(stored("a2", "A")).unwrap();

        assert_eq!(cache.sessions_for_letter("A").count(), 2);
        assert_eq!(cache.sessions_for_letter("C").count(), 0);
    }

    #[test]
    fn test_persists_and_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("local_sessions.json");

        let mut cache = LocalSessionCache::open(&path, 5);
        cache.push(stored("s0", "A")).unwrap();
        cache.push(stored("s1", "C")).unwrap();

        let reopened = LocalSessionCache::open(&path, 5);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.sessions().last().unwrap().letter, "C");

        // shrinking capacity keeps the newest
        let small = LocalSessionCache::open(&path, 1);
        assert_eq!(small.sessions().next().unwrap().id, "s1");

        let mut cache = reopened;
        cache.clear().unwrap();
        assert!(LocalSessionCache::open(&path, 5).is_empty());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("local_sessions.json");
        fs::write(&path, "[{ broken").unwrap();
        assert!(LocalSessionCache::open(&path, 5).is_empty());
    }

    #[test]
    fn test_export_all_quotes_embedded_csv() {
        let mut cache = LocalSessionCache::new(5);
        cache
            .push(StoredSession {
                id: "s0".into(),
                letter: "A".into(),
                timestamp: "2024-01-01T00:00:00+00:00".into(),
                csv_data: "a,b\n\"q\",2".into(),
            })
            .unwrap();

        let out = cache.export_all().unwrap();
        assert!(out.starts_with("session_id,letter,timestamp,csv_data\n"));
        assert!(out.contains("s0,A,2024-01-01T00:00:00+00:00,\"a,b\n\"\"q\"\",2\""));

        let mut rdr = csv::Reader::from_reader(out.as_bytes());
        let rec = rdr.records().next().unwrap().unwrap();
        assert_eq!(&rec[3], "a,b\n\"q\",2");
    }

    #[test]
    fn test_write_export_file() {
        let dir = tempdir().unwrap();
        let path = write_export_file(&dir.path().join("exports"), "B", "session_9", "h\n1\n").unwrap();
        assert_eq!(path.file_name().unwrap(), "alphabet_B_session_9.csv");
        assert_eq!(fs::read_to_string(path).unwrap(), "h\n1\n");
    }

    #[test]
    fn test_saved_at_parses() {
        assert!(stored("s", "A").saved_at().is_some());
    }
}
