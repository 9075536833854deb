//! Manifest loading - reads and validates one event's `manifest.json`.
//!
//! A missing manifest and a broken one are reported differently: the first
//! means "nothing to index here", the second is a data error for that event.

mod types;

pub use types::*;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors for manifest loading.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The event directory has no manifest.
    #[error("Manifest not found: {}", path.display())]
    Missing { path: PathBuf },

    /// The manifest exists but cannot be used.
    #[error("Malformed manifest {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// The manifest exists but could not be read.
    #[error("Failed to read manifest {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ManifestError {
    /// Whether the event should be skipped rather than reported as failed.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Load the manifest `file_name` from `event_dir`.
pub fn load_manifest(event_dir: &Path, file_name: &str) -> Result<EventManifest, ManifestError> {
    let path = event_dir.join(file_name);

    if !path.is_file() {
        return Err(ManifestError::Missing { path });
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ManifestError::Missing { path: path.clone() },
        ErrorKind::InvalidData => ManifestError::Malformed {
            path: path.clone(),
            reason: "not valid UTF-8".to_string(),
        },
        _ => ManifestError::Io {
            path: path.clone(),
            source,
        },
    })?;

    parse_manifest(&contents).map_err(|reason| ManifestError::Malformed { path, reason })
}

/// Parse and validate manifest text.
pub fn parse_manifest(contents: &str) -> Result<EventManifest, String> {
    let manifest: EventManifest = serde_json::from_str(contents).map_err(|e| e.to_string())?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

fn validate_manifest(manifest: &EventManifest) -> Result<(), String> {
    for m in &manifest.matches {
        if m.match_title().is_none() {
            return Err(format!(
                "match {} has no usable directory name in url {:?}",
                m.match_id, m.match_url
            ));
        }
    }
    Ok(())
}
