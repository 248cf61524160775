use crate::record::ScoreSummary;
use crate::{Error, Result};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::{Cell, RefCell};
use std::path::Path;

/// Storage locator for a session CSV
pub fn csv_locator(user_id: &str, letter: &str, session_id: &str) -> String {
    format!("users/{user_id}/letters/{letter}/{session_id}.csv")
}

/// Remote side of a submission. Called only after the local copy is written.
pub trait SessionSink {
    /// Store the session table, returning its locator
    fn upload_session_csv(
        &self,
        user_id: &str,
        letter: &str,
        session_id: &str,
        csv: &str,
    ) -> Result<String>;

    fn write_score_summary(&self, summary: &ScoreSummary) -> Result<()>;
}

/// Stored score row
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub summary: ScoreSummary,
    pub created_at: DateTime<Local>,
}

/// SQLite-backed sink holding both the uploaded tables and the summaries
#[derive(Debug)]
pub struct SqliteSessionSink {
    conn: Connection,
}

impl SqliteSessionSink {
    /// Open (or create) the database file, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_uploads (
                locator TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                letter TEXT NOT NULL,
                session_id TEXT NOT NULL,
                csv TEXT NOT NULL,
                uploaded_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_scores (
                session_id TEXT PRIMARY KEY,
                uid TEXT NOT NULL,
                letter TEXT NOT NULL,
                alignment_score REAL NOT NULL,
                direction_score REAL NOT NULL,
                coverage_score REAL NOT NULL,
                total_accuracy REAL NOT NULL,
                total_time REAL NOT NULL,
                csv_locator TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_session_scores_letter ON session_scores(letter)",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Uploaded table by locator
    pub fn uploaded_csv(&self, locator: &str) -> Result<Option<String>> {
        let csv = self
            .conn
            .query_row(
                "SELECT csv FROM session_uploads WHERE locator = ?1",
                [locator],
                |row| row.get(0),
            )
            .optional()?;
        Ok(csv)
    }

    /// Summaries for a letter, newest first
    pub fn scores_for_letter(&self, letter: &str) -> Result<Vec<ScoreRecord>> {
        self.query_scores(Some(letter))
    }

    /// All summaries, newest first
    pub fn all_scores(&self) -> Result<Vec<ScoreRecord>> {
        self.query_scores(None)
    }

    fn query_scores(&self, letter: Option<&str>) -> Result<Vec<ScoreRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT uid, letter, session_id, alignment_score, direction_score, coverage_score,
                   total_accuracy, total_time, csv_locator, created_at
            FROM session_scores
            WHERE ?1 IS NULL OR letter = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([letter], |row| {
            let created: String = row.get(9)?;
            let created_at = DateTime::parse_from_rfc3339(&created)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        9,
                        "created_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            Ok(ScoreRecord {
                summary: ScoreSummary {
                    uid: row.get(0)?,
                    letter: row.get(1)?,
                    session_id: row.get(2)?,
                    alignment_score: row.get(3)?,
                    direction_score: row.get(4)?,
                    coverage_score: row.get(5)?,
                    total_accuracy: row.get(6)?,
                    total_time: row.get(7)?,
                    csv_locator: row.get(8)?,
                },
                created_at,
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn best_accuracy(&self, letter: &str) -> Result<Option<f64>> {
        let best: Option<f64> = self.conn.query_row(
            "SELECT MAX(total_accuracy) FROM session_scores WHERE letter = ?1",
            [letter],
            |row| row.get(0),
        )?;
        Ok(best)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM session_uploads", [])?;
        self.conn.execute("DELETE FROM session_scores", [])?;
        Ok(())
    }
}

impl SessionSink for SqliteSessionSink {
    fn upload_session_csv(
        &self,
        user_id: &str,
        letter: &str,
        session_id: &str,
        csv: &str,
    ) -> Result<String> {
        let locator = csv_locator(user_id, letter, session_id);
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO session_uploads
            (locator, user_id, letter, session_id, csv, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                locator,
                user_id,
                letter,
                session_id,
                csv,
                Local::now().to_rfc3339()
            ],
        )?;
        Ok(locator)
    }

    fn write_score_summary(&self, s: &ScoreSummary) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO session_scores
            (session_id, uid, letter, alignment_score, direction_score, coverage_score,
             total_accuracy, total_time, csv_locator, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                s.session_id,
                s.uid,
                s.letter,
                s.alignment_score,
                s.direction_score,
                s.coverage_score,
                s.total_accuracy,
                s.total_time,
                s.csv_locator,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

/// In-process sink for tests and dry runs; can be told to fail
#[derive(Debug, Default)]
pub struct MemorySessionSink {
    fail: Cell<bool>,
    uploads: RefCell<Vec<(String, String)>>,
    summaries: RefCell<Vec<ScoreSummary>>,
}

impl MemorySessionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }

    /// `(locator, csv)` pairs in upload order
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.borrow().clone()
    }

    pub fn summaries(&self) -> Vec<ScoreSummary> {
        self.summaries.borrow().clone()
    }
}

impl SessionSink for MemorySessionSink {
    fn upload_session_csv(
        &self,
        user_id: &str,
        letter: &str,
        session_id: &str,
        csv: &str,
    ) -> Result<String> {
        if self.fail.get() {
            return Err(Error::Persistence("upload rejected".into()));
        }
        let locator = csv_locator(user_id, letter, session_id);
        self.uploads
            .borrow_mut()
            .push((locator.clone(), csv.to_string()));
        Ok(locator)
    }

    fn write_score_summary(&self, summary: &ScoreSummary) -> Result<()> {
        if self.fail.get() {
            return Err(Error::Persistence("summary write rejected".into()));
        }
        self.summaries.borrow_mut().push(summary.clone());
        Ok(())
    }
}
