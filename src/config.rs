use crate::feedback::DEFAULT_EXPIRY_MS;
use crate::local_store::DEFAULT_CAPACITY;
use crate::mapper::GridSpec;
use crate::proximity::DEFAULT_TOLERANCE;
use crate::scoring::SUBMIT_THRESHOLD;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub grid_size: i32,
    pub cell_size: u32,
    pub tolerance: i32,
    pub submit_threshold: f64,
    pub feedback_expiry_ms: u64,
    pub local_cache_capacity: usize,
    /// Directory of `<symbol>.json` template assets; bundled templates when unset
    pub template_dir: Option<PathBuf>,
    pub user_id: String,
    pub letters: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let grid = GridSpec::default();
        Self {
            grid_size: grid.grid_size,
            cell_size: grid.cell_size,
            tolerance: DEFAULT_TOLERANCE,
            submit_threshold: SUBMIT_THRESHOLD,
            feedback_expiry_ms: DEFAULT_EXPIRY_MS,
            local_cache_capacity: DEFAULT_CAPACITY,
            template_dir: None,
            user_id: "anonymous".to_string(),
            letters: vec!["A".into(), "B".into(), "C".into()],
        }
    }
}

impl Config {
    pub fn grid(&self) -> GridSpec {
        GridSpec::new(self.grid_size, self.cell_size)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.grid_size <= 0 || self.cell_size == 0 {
            return Err(crate::Error::Config(format!(
                "grid must be non-empty (grid_size={}, cell_size={})",
                self.grid_size, self.cell_size
            )));
        }
        if self.tolerance < 0 {
            return Err(crate::Error::Config("tolerance must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&self.submit_threshold) {
            return Err(crate::Error::Config(
                "submit_threshold must lie in [0, 1]".into(),
            ));
        }
        if self.local_cache_capacity == 0 {
            return Err(crate::Error::Config(
                "local_cache_capacity must be at least 1".into(),
            ));
        }
        if self.letters.is_empty() {
            return Err(crate::Error::Config("letters must not be empty".into()));
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "tracepad") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("tracepad_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing, corrupt or invalid files fall back to defaults
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => cfg,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "ignoring invalid config");
                    Config::default()
                }
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
