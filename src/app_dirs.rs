use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/tracepad`, or the platform data-local dir without `$HOME`
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("tracepad"),
            )
        } else {
            ProjectDirs::from("", "", "tracepad").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("sessions.db"))
    }

    pub fn local_cache_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("local_sessions.json"))
    }

    pub fn exports_dir() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("exports"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("tracepad.log"))
    }
}
