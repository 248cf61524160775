// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod adaptation;
pub mod app_dirs;
pub mod config;
pub mod direction;
pub mod feedback;
pub mod kinematics;
pub mod local_store;
pub mod mapper;
pub mod persistence;
pub mod proximity;
pub mod record;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod template;

pub use mapper::{GridCell, GridSpec, LayoutSnapshot, Point};
pub use scoring::Metrics;
pub use session::{SessionConfig, TracingSession};
pub use template::{Template, TemplateState, TemplateStore};

/// Result type alias for tracepad
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tracepad
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("template for '{symbol}' unavailable: {reason}")]
    TemplateUnavailable { symbol: String, reason: String },

    #[error("accuracy {accuracy:.3} is below the submission threshold {threshold:.2}")]
    SubmissionBelowThreshold { accuracy: f64, threshold: f64 },

    #[error("nothing to submit: no completed strokes")]
    NoStrokes,

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
