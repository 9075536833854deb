use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default name of the per-event manifest document.
pub const DEFAULT_MANIFEST_FILE: &str = "manifest.json";

/// Default catalog file name, created inside the dataset root.
pub const DEFAULT_DB_FILE: &str = "index.db";

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Dataset layout configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    /// Dataset root; the command line argument takes precedence.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// File name of the manifest inside each event directory.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: None,
            manifest_file: default_manifest_file(),
        }
    }
}

fn default_manifest_file() -> String {
    DEFAULT_MANIFEST_FILE.to_string()
}

/// Database configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Catalog location for a dataset: the configured path, or `index.db`
    /// inside the dataset root.
    pub fn path_for(&self, dataset_root: &Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| dataset_root.join(DEFAULT_DB_FILE))
    }
}

/// Team registry source. Exactly one of `teams` and `file` must be set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Inline, ordered list of team names.
    #[serde(default)]
    pub teams: Option<Vec<String>>,
    /// Text file with one team name per line.
    #[serde(default)]
    pub file: Option<PathBuf>,
}
