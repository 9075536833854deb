//! Dataset indexer - reconciles event manifests with the on-disk layout and
//! writes the result to the catalog.
//!
//! Each event directory is indexed in its own catalog transaction: an event
//! either lands completely or not at all, and a broken event never stops
//! the run.

mod report;
mod runner;

pub use report::*;
pub use runner::Indexer;

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::{DatasetConfig, DEFAULT_MANIFEST_FILE};
use crate::manifest::ManifestError;

/// Indexer settings.
#[derive(Debug, Clone)]
pub struct IndexerOptions {
    /// File name of the manifest inside each event directory.
    pub manifest_file: String,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
        }
    }
}

impl From<&DatasetConfig> for IndexerOptions {
    fn from(config: &DatasetConfig) -> Self {
        Self {
            manifest_file: config.manifest_file.clone(),
        }
    }
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Cannot read dataset root {}", path.display())]
    DatasetRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load team registry into the catalog")]
    Registry(#[source] CatalogError),
}

/// Errors that fail a single event. The event's transaction is rolled back.
#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Match {match_id} has no usable directory name in url {url:?}")]
    InvalidMatchUrl { match_id: i64, url: String },

    #[error("Match {match_id} lists team {team:?}, which is not in the team registry")]
    UnknownTeam { match_id: i64, team: String },

    #[error("Storage failure: {0}")]
    Storage(#[from] CatalogError),
}

impl EventError {
    /// Report classification of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Manifest(_) | Self::InvalidMatchUrl { .. } => FailureKind::MalformedManifest,
            Self::UnknownTeam { .. } => FailureKind::UnknownTeam,
            Self::Storage(_) => FailureKind::StorageFailure,
        }
    }
}
