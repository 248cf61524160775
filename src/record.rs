use crate::kinematics::annotate;
use crate::mapper::Point;
use crate::scoring::Metrics;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Column order of the exported table
pub const CSV_HEADER: [&str; 10] = [
    "session_id",
    "user_id",
    "letter",
    "timestamp",
    "x",
    "y",
    "grid_x",
    "grid_y",
    "velocity",
    "acceleration",
];

/// Identity of one practice attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKey {
    pub session_id: String,
    pub user_id: String,
    pub letter: String,
}

impl SessionKey {
    /// Key with a freshly generated session id
    pub fn generate(user_id: &str, letter: &str) -> Self {
        Self {
            session_id: format!("session_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            letter: letter.to_string(),
        }
    }
}

/// One exported point. Field order matches [`CSV_HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub session_id: String,
    pub user_id: String,
    pub letter: String,
    pub timestamp: u64,
    pub x: f64,
    pub y: f64,
    pub grid_x: i32,
    pub grid_y: i32,
    pub velocity: f64,
    pub acceleration: f64,
}

/// Flatten one completed stroke into rows, kinematics attached.
pub fn rows_for_stroke(key: &SessionKey, points: &[Point]) -> Vec<SessionRow> {
    points
        .iter()
        .zip(annotate(points))
        .map(|(p, k)| SessionRow {
            session_id: key.session_id.clone(),
            user_id: key.user_id.clone(),
            letter: key.letter.clone(),
            timestamp: p.time,
            x: p.x,
            y: p.y,
            grid_x: p.grid_x,
            grid_y: p.grid_y,
            velocity: k.velocity,
            acceleration: k.acceleration,
        })
        .collect()
}

/// Serialize rows as CSV with a header line, even when there are no rows.
pub fn rows_to_csv(rows: &[SessionRow]) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    wtr.write_record(CSV_HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| crate::Error::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse a table produced by [`rows_to_csv`]
pub fn rows_from_csv(data: &str) -> Result<Vec<SessionRow>> {
    let mut rdr = csv::Reader::from_reader(data.as_bytes());
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Growable list of finalized rows for one session
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    key: SessionKey,
    rows: Vec<SessionRow>,
}

impl RecordBuilder {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            rows: Vec::new(),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn push_stroke(&mut self, points: &[Point]) {
        self.rows.extend(rows_for_stroke(&self.key, points));
    }

    pub fn rows(&self) -> &[SessionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv(&self) -> Result<String> {
        rows_to_csv(&self.rows)
    }
}

/// Score-summary record handed to the persistence boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub uid: String,
    pub letter: String,
    pub session_id: String,
    pub alignment_score: f64,
    pub direction_score: f64,
    pub coverage_score: f64,
    pub total_accuracy: f64,
    pub total_time: f64,
    pub csv_locator: String,
}

impl ScoreSummary {
    pub fn new(key: &SessionKey, metrics: &Metrics, csv_locator: String) -> Self {
        Self {
            uid: key.user_id.clone(),
            letter: key.letter.clone(),
            session_id: key.session_id.clone(),
            alignment_score: metrics.alignment_score,
            direction_score: metrics.direction_score,
            coverage_score: metrics.coverage_score,
            total_accuracy: metrics.total_accuracy,
            total_time: metrics.total_time,
            csv_locator,
        }
    }
}
