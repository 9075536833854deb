//! Run report types.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::RegistrySync;

/// Summary of one indexing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub dataset_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Outcome of loading the team registry.
    pub registry: RegistrySync,
    pub indexed: Vec<IndexedEvent>,
    pub skipped: Vec<SkippedEvent>,
    pub failed: Vec<FailedEvent>,
    /// The run was cancelled before every event was visited.
    pub interrupted: bool,
}

impl RunReport {
    pub(crate) fn new(
        dataset_root: &Path,
        started_at: DateTime<Utc>,
        registry: RegistrySync,
    ) -> Self {
        Self {
            dataset_root: dataset_root.to_path_buf(),
            started_at,
            finished_at: started_at,
            registry,
            indexed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            interrupted: false,
        }
    }

    pub(crate) fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Indexed(event) => self.indexed.push(event),
            EventOutcome::Skipped(event) => self.skipped.push(event),
            EventOutcome::Failed(event) => self.failed.push(event),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Number of declared maps that could not be resolved across all
    /// indexed events.
    pub fn unresolved_map_count(&self) -> usize {
        self.indexed.iter().map(|e| e.unresolved_maps.len()).sum()
    }

    /// One-line summary, e.g. `3 indexed, 1 skipped, 0 failed`.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} indexed, {} skipped, {} failed",
            self.indexed.len(),
            self.skipped.len(),
            self.failed.len()
        );
        let unresolved = self.unresolved_map_count();
        if unresolved > 0 {
            line.push_str(&format!(", {} unresolved maps", unresolved));
        }
        if self.interrupted {
            line.push_str(" (interrupted)");
        }
        line
    }
}

/// Result of processing one event directory.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Indexed(IndexedEvent),
    Skipped(SkippedEvent),
    Failed(FailedEvent),
}

impl EventOutcome {
    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Indexed(_) => "indexed",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// An event whose rows were committed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexedEvent {
    pub event_id: i64,
    pub dir: PathBuf,
    pub matches: usize,
    pub team_links: usize,
    /// Declared maps that resolved to an artifact on disk.
    pub maps_resolved: usize,
    pub unresolved_maps: Vec<UnresolvedMap>,
    /// Rows actually inserted; zero everywhere on an unchanged re-run.
    pub rows_inserted: RowsInserted,
}

/// Newly inserted rows per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsInserted {
    pub events: usize,
    pub matches: usize,
    pub match_teams: usize,
    pub maps: usize,
}

impl RowsInserted {
    pub fn total(&self) -> usize {
        self.events + self.matches + self.match_teams + self.maps
    }
}

/// A declared map with no artifact on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedMap {
    pub match_id: i64,
    pub map_name: String,
    pub reason: String,
}

/// An event directory that was not indexed and is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedEvent {
    pub dir: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingManifest,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingManifest => f.write_str("missing manifest"),
        }
    }
}

/// An event whose transaction was rolled back (or never opened).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEvent {
    pub dir: PathBuf,
    /// Known once the manifest parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    pub kind: FailureKind,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedManifest,
    UnknownTeam,
    StorageFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::MalformedManifest => "malformed manifest",
            Self::UnknownTeam => "unknown team",
            Self::StorageFailure => "storage failure",
        })
    }
}
