//! Row and error types for the relational catalog.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::TeamId;

/// A row of `events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub date: String,
    pub teams_amount: u32,
    pub path_on_fs: String,
}

/// A row of `teams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRow {
    pub id: TeamId,
    pub name: String,
}

/// A row of `matches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRow {
    pub id: i64,
    pub event_id: i64,
    pub url: String,
    pub demo_url: String,
    pub date: String,
    pub path_on_fs: String,
}

/// A row of `match_teams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTeamRow {
    pub match_id: i64,
    pub team_id: TeamId,
}

/// A row of `maps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRow {
    pub match_id: i64,
    pub map_name: String,
    pub path_on_fs: String,
}

/// Row counts per relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub events: u64,
    pub teams: u64,
    pub matches: u64,
    pub match_teams: u64,
    pub maps: u64,
}

/// A stored team whose name differs from the registry at the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamConflict {
    pub id: TeamId,
    pub stored: String,
    pub registry: String,
}

/// Outcome of loading the team registry into the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySync {
    /// Teams inserted by this load.
    pub inserted: usize,
    /// Teams already present with the same name.
    pub unchanged: usize,
    /// Teams already present under a different name (left untouched).
    pub conflicts: Vec<TeamConflict>,
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Database(e.to_string())
    }
}
