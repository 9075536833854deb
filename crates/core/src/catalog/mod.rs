//! Relational catalog of events, teams, matches and maps.
//!
//! All writes are insert-if-absent: re-indexing fills gaps but never
//! overwrites rows written by an earlier run.

mod sqlite;
mod types;

pub use sqlite::{CatalogTransaction, SqliteCatalog};
pub use types::*;

/// Idempotent row writes. Each method returns `true` when a row was
/// inserted and `false` when its key already existed.
pub trait CatalogWriter {
    fn upsert_event(&self, event: &EventRow) -> Result<bool, CatalogError>;

    fn upsert_team(&self, team: &TeamRow) -> Result<bool, CatalogError>;

    fn upsert_match(&self, m: &MatchRow) -> Result<bool, CatalogError>;

    /// Both the match and the team must already exist.
    fn upsert_match_team(&self, link: &MatchTeamRow) -> Result<bool, CatalogError>;

    /// The match must already exist.
    fn upsert_map(&self, map: &MapRow) -> Result<bool, CatalogError>;
}
