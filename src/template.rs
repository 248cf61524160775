use crate::mapper::GridCell;
use crate::{Error, Result};
use include_dir::{include_dir, Dir};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

static TEMPLATE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/assets/template_paths");

/// One canonical pen trajectory, in grid units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePath {
    pub points: Vec<GridCell>,
}

/// Reference path set for one symbol. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub paths: Vec<TemplatePath>,
}

impl Template {
    /// Parse a template asset. A template without any cell is rejected.
    pub fn from_json(symbol: &str, data: &str) -> Result<Self> {
        let template: Template =
            serde_json::from_str(data).map_err(|e| Error::TemplateUnavailable {
                symbol: symbol.to_string(),
                reason: format!("malformed asset: {e}"),
            })?;

        if template.cells().next().is_none() {
            return Err(Error::TemplateUnavailable {
                symbol: symbol.to_string(),
                reason: "asset has no points".to_string(),
            });
        }

        Ok(template)
    }

    /// Every cell of every path, in template order (duplicates included).
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        self.paths.iter().flat_map(|p| p.points.iter().copied())
    }

    /// Distinct cells across all paths, in first-appearance order.
    pub fn distinct_cells(&self) -> Vec<GridCell> {
        let mut seen = HashSet::new();
        self.cells().filter(|c| seen.insert(*c)).collect()
    }

    /// Consecutive `(anchor, next)` pairs of each path, in template order.
    pub fn segments(&self) -> impl Iterator<Item = (GridCell, GridCell)> + '_ {
        self.paths
            .iter()
            .flat_map(|p| p.points.iter().copied().tuple_windows())
    }
}

/// Where template assets come from, keyed by symbol
pub trait TemplateSource {
    fn fetch(&self, symbol: &str) -> Result<String>;
}

/// Templates compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledTemplates;

impl BundledTemplates {
    /// Symbols with a bundled asset, sorted
    pub fn symbols() -> Vec<String> {
        TEMPLATE_DIR
            .files()
            .filter_map(|f| {
                let path = f.path();
                match path.extension().and_then(|e| e.to_str()) {
                    Some("json") => path.file_stem().and_then(|s| s.to_str()).map(String::from),
                    _ => None,
                }
            })
            .sorted()
            .collect()
    }
}

impl TemplateSource for BundledTemplates {
    fn fetch(&self, symbol: &str) -> Result<String> {
        let name = asset_name(symbol)?;
        let file = TEMPLATE_DIR
            .get_file(&name)
            .ok_or_else(|| Error::TemplateUnavailable {
                symbol: symbol.to_string(),
                reason: "no bundled asset".to_string(),
            })?;

        file.contents_utf8()
            .map(String::from)
            .ok_or_else(|| Error::TemplateUnavailable {
                symbol: symbol.to_string(),
                reason: "bundled asset is not UTF-8".to_string(),
            })
    }
}

/// Templates read from `<root>/<symbol>.json`
#[derive(Debug, Clone)]
pub struct DirTemplateSource {
    root: PathBuf,
}

impl DirTemplateSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl TemplateSource for DirTemplateSource {
    fn fetch(&self, symbol: &str) -> Result<String> {
        let path = self.root.join(asset_name(symbol)?);
        fs::read_to_string(&path).map_err(|e| Error::TemplateUnavailable {
            symbol: symbol.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

fn asset_name(symbol: &str) -> Result<String> {
    if symbol.is_empty() || symbol.contains(['/', '\\', '.']) {
        return Err(Error::TemplateUnavailable {
            symbol: symbol.to_string(),
            reason: "invalid symbol".to_string(),
        });
    }
    Ok(format!("{symbol}.json"))
}

/// Outcome of a template load: either a usable template or the "no template"
/// sentinel, under which guided scoring is disabled.
#[derive(Debug, Clone, Default)]
pub enum TemplateState {
    Ready(Arc<Template>),
    #[default]
    Unavailable,
}

impl TemplateState {
    pub fn template(&self) -> Option<&Template> {
        match self {
            TemplateState::Ready(t) => Some(t.as_ref()),
            TemplateState::Unavailable => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, TemplateState::Ready(_))
    }
}

/// Loads templates on demand and keeps them for the lifetime of the store
pub struct TemplateStore {
    source: Box<dyn TemplateSource>,
    cache: HashMap<String, Arc<Template>>,
}

impl TemplateStore {
    pub fn new<S: TemplateSource + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
            cache: HashMap::new(),
        }
    }

    /// Store over the bundled assets, or over `dir` when given
    pub fn from_dir_or_bundled(dir: Option<&Path>) -> Self {
        match dir {
            Some(d) => Self::new(DirTemplateSource::new(d)),
            None => Self::new(BundledTemplates),
        }
    }

    /// Fetch and parse without touching the cache
    pub fn try_load(&self, symbol: &str) -> Result<Template> {
        let data = self.source.fetch(symbol)?;
        Template::from_json(symbol, &data)
    }

    /// Load `symbol`, degrading to [`TemplateState::Unavailable`] on any failure.
    /// Failures are not cached so a later call can retry.
    pub fn load(&mut self, symbol: &str) -> TemplateState {
        if let Some(t) = self.cache.get(symbol) {
            return TemplateState::Ready(Arc::clone(t));
        }

        match self.try_load(symbol) {
            Ok(template) => {
                let template = Arc::new(template);
                debug!(
                    symbol,
                    paths = template.paths.len(),
                    "template loaded"
                );
                self.cache.insert(symbol.to_string(), Arc::clone(&template));
                TemplateState::Ready(template)
            }
            Err(e) => {
                warn!(symbol, error = %e, "template unavailable, guidance disabled");
                TemplateState::Unavailable
            }
        }
    }

    pub fn is_cached(&self, symbol: &str) -> bool {
        self.cache.contains_key(symbol)
    }
}
