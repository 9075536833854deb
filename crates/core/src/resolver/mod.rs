//! Map artifact resolution.
//!
//! Exporters do not always name a map's directory exactly after the map
//! (`map1-de_dust2`, `2_de_mirage`, ...). The resolver scans a match
//! directory (non-recursively) for entries whose name ends with the declared
//! map name and picks one deterministically.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// Reasons a map could not be resolved. Callers treat all of them as a
/// per-map warning.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No entry ending with {map_name:?} in {}", match_dir.display())]
    NotFound { match_dir: PathBuf, map_name: String },

    #[error("Match directory does not exist: {}", .0.display())]
    MatchDirMissing(PathBuf),

    #[error("Failed to list {}", match_dir.display())]
    Io {
        match_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Locates map artifacts inside match directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver;

impl PathResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `map_name` inside `match_dir`.
    ///
    /// When several entries match, the lexicographically smallest name wins
    /// and a warning is logged.
    pub fn resolve_map(&self, match_dir: &Path, map_name: &str) -> Result<PathBuf, ResolveError> {
        let mut candidates = self.candidates(match_dir, map_name)?;

        match candidates.len() {
            0 => Err(ResolveError::NotFound {
                match_dir: match_dir.to_path_buf(),
                map_name: map_name.to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            n => {
                warn!(
                    map = map_name,
                    match_dir = %match_dir.display(),
                    candidates = n,
                    chosen = %candidates[0].display(),
                    "Ambiguous map artifact, using first by name"
                );
                Ok(candidates.remove(0))
            }
        }
    }

    /// All entries of `match_dir` whose name ends with `map_name`, sorted by name.
    pub fn candidates(
        &self,
        match_dir: &Path,
        map_name: &str,
    ) -> Result<Vec<PathBuf>, ResolveError> {
        let entries = std::fs::read_dir(match_dir).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ResolveError::MatchDirMissing(match_dir.to_path_buf()),
            _ => ResolveError::Io {
                match_dir: match_dir.to_path_buf(),
                source,
            },
        })?;

        // An empty suffix would match every entry
        if map_name.is_empty() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ResolveError::Io {
                match_dir: match_dir.to_path_buf(),
                source,
            })?;
            // Non-UTF-8 names cannot match a manifest string
            if let Ok(name) = entry.file_name().into_string() {
                if name.ends_with(map_name) {
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names.into_iter().map(|name| match_dir.join(name)).collect())
    }
}
