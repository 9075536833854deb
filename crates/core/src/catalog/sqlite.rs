//! SQLite-backed catalog implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::warn;

use super::{
    CatalogError, CatalogStats, CatalogWriter, EventRow, MapRow, MatchRow, MatchTeamRow,
    RegistrySync, TeamConflict, TeamRow,
};
use crate::registry::{TeamId, TeamRegistry};

/// How long a write waits for an external reader to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed catalog.
///
/// The connection sits behind a mutex: one transaction runs at a time, so
/// concurrent callers cannot interleave writes.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) the catalog at `path`, creating tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL,
                name TEXT NOT NULL,
                date TEXT NOT NULL,
                teams_amount INTEGER NOT NULL,
                path_on_fs TEXT NOT NULL
            );

            -- Ids are registry positions, never autoincremented
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY,
                event_id INTEGER NOT NULL REFERENCES events(id),
                url TEXT NOT NULL,
                demo_url TEXT NOT NULL,
                date TEXT NOT NULL,
                path_on_fs TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_matches_event ON matches(event_id);

            CREATE TABLE IF NOT EXISTS match_teams (
                match_id INTEGER NOT NULL REFERENCES matches(id),
                team_id INTEGER NOT NULL REFERENCES teams(id),
                PRIMARY KEY (match_id, team_id)
            );

            CREATE INDEX IF NOT EXISTS idx_match_teams_team ON match_teams(team_id);

            CREATE TABLE IF NOT EXISTS maps (
                match_id INTEGER NOT NULL REFERENCES matches(id),
                map_name TEXT NOT NULL,
                path_on_fs TEXT NOT NULL,
                PRIMARY KEY (match_id, map_name)
            );
            "#,
        )?;

        Ok(())
    }

    /// Lock the connection. A panic inside [`Self::transaction`] poisons the
    /// mutex after its transaction was already rolled back on unwind, so the
    /// connection is still consistent and the guard is recovered.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("Catalog connection lock was poisoned by a panic, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` inside a single transaction.
    ///
    /// Commits when `f` returns `Ok`. When `f` returns `Err` every write made
    /// through the transaction is rolled back and the error is returned
    /// unchanged. A panic inside `f` also rolls back, as the transaction is
    /// dropped without being committed; later calls keep working.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&CatalogTransaction<'_>) -> Result<T, E>,
        E: From<CatalogError>,
    {
        let mut conn = self.lock();
        let tx = CatalogTransaction {
            tx: conn.transaction().map_err(CatalogError::from)?,
        };

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Failed to roll back catalog transaction: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Insert every registry team that is not stored yet, in one transaction.
    ///
    /// Ids already present keep their stored name; when it differs from the
    /// registry the mismatch is logged and returned as a conflict.
    pub fn load_registry(&self, registry: &TeamRegistry) -> Result<RegistrySync, CatalogError> {
        self.transaction(|tx| -> Result<RegistrySync, CatalogError> {
            let mut sync = RegistrySync::default();

            for (id, name) in registry.iter() {
                let row = TeamRow {
                    id,
                    name: name.to_string(),
                };
                if tx.upsert_team(&row)? {
                    sync.inserted += 1;
                    continue;
                }

                match tx.team_name(id)? {
                    Some(stored) if stored == name => sync.unchanged += 1,
                    Some(stored) => {
                        warn!(
                            team_id = id,
                            stored = %stored,
                            registry = name,
                            "Team id already stored under a different name; registry order changed?"
                        );
                        sync.conflicts.push(TeamConflict {
                            id,
                            stored,
                            registry: name.to_string(),
                        });
                    }
                    None => {
                        return Err(CatalogError::Internal(format!(
                            "team {} neither inserted nor present",
                            id
                        )))
                    }
                }
            }

            Ok(sync)
        })
    }

    /// Row counts per relation.
    pub fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let conn = self.lock();

        let count = |sql: &str| -> Result<u64, CatalogError> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(CatalogStats {
            events: count("SELECT COUNT(*) FROM events")?,
            teams: count("SELECT COUNT(*) FROM teams")?,
            matches: count("SELECT COUNT(*) FROM matches")?,
            match_teams: count("SELECT COUNT(*) FROM match_teams")?,
            maps: count("SELECT COUNT(*) FROM maps")?,
        })
    }
}

/// An open catalog transaction. Writes become visible on commit.
pub struct CatalogTransaction<'c> {
    tx: Transaction<'c>,
}

impl CatalogTransaction<'_> {
    fn commit(self) -> Result<(), CatalogError> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<(), CatalogError> {
        self.tx.rollback()?;
        Ok(())
    }

    /// Stored name of a team id, if any.
    pub fn team_name(&self, id: TeamId) -> Result<Option<String>, CatalogError> {
        let name = self
            .tx
            .query_row("SELECT name FROM teams WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(name)
    }

    fn insert(&self, sql: &str, params: impl rusqlite::Params) -> Result<bool, CatalogError> {
        let changed = self.tx.prepare_cached(sql)?.execute(params)?;
        Ok(changed > 0)
    }
}

impl CatalogWriter for CatalogTransaction<'_> {
    fn upsert_event(&self, event: &EventRow) -> Result<bool, CatalogError> {
        self.insert(
            "INSERT INTO events (id, url, name, date, teams_amount, path_on_fs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT DO NOTHING",
            params![
                event.id,
                &event.url,
                &event.name,
                &event.date,
                event.teams_amount,
                &event.path_on_fs,
            ],
        )
    }

    fn upsert_team(&self, team: &TeamRow) -> Result<bool, CatalogError> {
        self.insert(
            "INSERT INTO teams (id, name) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![team.id, &team.name],
        )
    }

    fn upsert_match(&self, m: &MatchRow) -> Result<bool, CatalogError> {
        self.insert(
            "INSERT INTO matches (id, event_id, url, demo_url, date, path_on_fs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT DO NOTHING",
            params![
                m.id,
                m.event_id,
                &m.url,
                &m.demo_url,
                &m.date,
                &m.path_on_fs,
            ],
        )
    }

    fn upsert_match_team(&self, link: &MatchTeamRow) -> Result<bool, CatalogError> {
        self.insert(
            "INSERT INTO match_teams (match_id, team_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![link.match_id, link.team_id],
        )
    }

    fn upsert_map(&self, map: &MapRow) -> Result<bool, CatalogError> {
        self.insert(
            "INSERT INTO maps (match_id, map_name, path_on_fs)
             VALUES (?1, ?2, ?3)
             ON CONFLICT DO NOTHING",
            params![map.match_id, &map.map_name, &map.path_on_fs],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_catalog() -> SqliteCatalog {
        SqliteCatalog::in_memory().unwrap()
    }

    fn event(id: i64) -> EventRow {
        EventRow {
            id,
            url: format!("https://www.hltv.org/events/{}/test", id),
            name: "Test Event".to_string(),
            date: "2024-03-17".to_string(),
            teams_amount: 8,
            path_on_fs: format!("/data/{}", id),
        }
    }

    fn match_row(id: i64, event_id: i64) -> MatchRow {
        MatchRow {
            id,
            event_id,
            url: format!("https://www.hltv.org/matches/{}/a-vs-b", id),
            demo_url: format!("https://www.hltv.org/download/demo/{}", id),
            date: "2024-03-18".to_string(),
            path_on_fs: format!("/data/{}/a-vs-b", event_id),
        }
    }

    fn registry() -> TeamRegistry {
        TeamRegistry::new(["Natus Vincere", "FaZe Clan"]).unwrap()
    }

    #[test]
    fn test_schema_is_created_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");

        let catalog = SqliteCatalog::new(&path).unwrap();
        catalog.load_registry(&registry()).unwrap();
        drop(catalog);

        // Reopening keeps the data
        let catalog = SqliteCatalog::new(&path).unwrap();
        assert_eq!(catalog.stats().unwrap().teams, 2);
    }

    #[test]
    fn test_upserts_insert_once() {
        let catalog = create_test_catalog();
        catalog.load_registry(&registry()).unwrap();

        let first = catalog
            .transaction(|tx| -> Result<_, CatalogError> {
                Ok((
                    tx.upsert_event(&event(1))?,
                    tx.upsert_match(&match_row(10, 1))?,
                    tx.upsert_match_team(&MatchTeamRow {
                        match_id: 10,
                        team_id: 1,
                    })?,
                    tx.upsert_map(&MapRow {
                        match_id: 10,
                        map_name: "de_dust2".to_string(),
                        path_on_fs: "/data/1/a-vs-b/de_dust2".to_string(),
                    })?,
                ))
            })
            .unwrap();
        assert_eq!(first, (true, true, true, true));

        let second = catalog
            .transaction(|tx| -> Result<_, CatalogError> {
                Ok((
                    tx.upsert_event(&event(1))?,
                    tx.upsert_match(&match_row(10, 1))?,
                    tx.upsert_match_team(&MatchTeamRow {
                        match_id: 10,
                        team_id: 1,
                    })?,
                    tx.upsert_map(&MapRow {
                        match_id: 10,
                        map_name: "de_dust2".to_string(),
                        path_on_fs: "/somewhere/else".to_string(),
                    })?,
                ))
            })
            .unwrap();
        assert_eq!(second, (false, false, false, false));

        let stats = catalog.stats().unwrap();
        assert_eq!(stats.events, 1);
        assert_eq!(stats.matches, 1);
        assert_eq!(stats.match_teams, 1);
        assert_eq!(stats.maps, 1);
    }

    #[test]
    fn test_existing_rows_are_not_overwritten() {
        let catalog = create_test_catalog();

        catalog
            .transaction(|tx| tx.upsert_event(&event(1)))
            .unwrap();

        let mut renamed = event(1);
        renamed.name = "Renamed Event".to_string();
        catalog.transaction(|tx| tx.upsert_event(&renamed)).unwrap();

        let conn = catalog.lock();
        let name: String = conn
            .query_row("SELECT name FROM events WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Test Event");
    }

    #[test]
    fn test_error_rolls_back_transaction() {
        let catalog = create_test_catalog();

        let result: Result<(), CatalogError> = catalog.transaction(|tx| {
            tx.upsert_event(&event(1))?;
            tx.upsert_match(&match_row(10, 1))?;
            Err(CatalogError::Internal("abort".to_string()))
        });
        assert!(result.is_err());

        let stats = catalog.stats().unwrap();
        assert_eq!(stats.events, 0);
        assert_eq!(stats.matches, 0);
    }

    #[test]
    fn test_panic_in_transaction_rolls_back_and_catalog_stays_usable() {
        let catalog = create_test_catalog();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), CatalogError> = catalog.transaction(|tx| {
                tx.upsert_event(&event(1))?;
                panic!("writer panicked mid-event");
            });
        }));
        assert!(result.is_err());

        assert_eq!(catalog.stats().unwrap().events, 0);
        let inserted = catalog.transaction(|tx| tx.upsert_event(&event(2))).unwrap();
        assert!(inserted);
        assert_eq!(catalog.stats().unwrap().events, 1);
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let catalog = create_test_catalog();
        catalog.load_registry(&registry()).unwrap();

        // Match for an event that does not exist
        let result = catalog.transaction(|tx| tx.upsert_match(&match_row(10, 99)));
        assert!(matches!(result, Err(CatalogError::Database(_))));

        // Link to a team outside the registry
        let result = catalog.transaction(|tx| -> Result<bool, CatalogError> {
            tx.upsert_event(&event(1))?;
            tx.upsert_match(&match_row(10, 1))?;
            tx.upsert_match_team(&MatchTeamRow {
                match_id: 10,
                team_id: 42,
            })
        });
        assert!(result.is_err());
        assert_eq!(catalog.stats().unwrap().events, 0);
    }

    #[test]
    fn test_values_with_quotes_are_bound() {
        let catalog = create_test_catalog();
        let registry =
            TeamRegistry::new(["Team 'Liquid'", "Robert'); DROP TABLE teams;--"]).unwrap();
        catalog.load_registry(&registry).unwrap();

        let mut quoted = event(1);
        quoted.name = "IEM 'Cologne' \"2024\"".to_string();
        catalog.transaction(|tx| tx.upsert_event(&quoted)).unwrap();

        let stats = catalog.stats().unwrap();
        assert_eq!(stats.teams, 2);
        assert_eq!(stats.events, 1);

        let conn = catalog.lock();
        let name: String = conn
            .query_row("SELECT name FROM teams WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Robert'); DROP TABLE teams;--");
    }

    #[test]
    fn test_load_registry_is_idempotent() {
        let catalog = create_test_catalog();

        let sync = catalog.load_registry(&registry()).unwrap();
        assert_eq!(sync.inserted, 2);
        assert_eq!(sync.unchanged, 0);

        let sync = catalog.load_registry(&registry()).unwrap();
        assert_eq!(sync.inserted, 0);
        assert_eq!(sync.unchanged, 2);
        assert!(sync.conflicts.is_empty());
    }

    #[test]
    fn test_load_registry_reports_reordering() {
        let catalog = create_test_catalog();
        catalog.load_registry(&registry()).unwrap();

        let reordered = TeamRegistry::new(["FaZe Clan", "Natus Vincere", "Vitality"]).unwrap();
        let sync = catalog.load_registry(&reordered).unwrap();

        assert_eq!(sync.inserted, 1);
        assert_eq!(sync.conflicts.len(), 2);
        assert_eq!(
            sync.conflicts[0],
            TeamConflict {
                id: 0,
                stored: "Natus Vincere".to_string(),
                registry: "FaZe Clan".to_string(),
            }
        );

        // Stored names are left untouched
        assert_eq!(
            catalog.transaction(|tx| tx.team_name(0)).unwrap(),
            Some("Natus Vincere".to_string())
        );
    }

    #[test]
    fn test_stats_empty() {
        let catalog = create_test_catalog();
        assert_eq!(catalog.stats().unwrap(), CatalogStats::default());
    }
}
