//! The indexing pass over a dataset root.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{
    EventError, EventOutcome, FailedEvent, FailureKind, IndexError, IndexedEvent, IndexerOptions,
    RunReport, SkipReason, SkippedEvent, UnresolvedMap,
};
use crate::catalog::{CatalogWriter, EventRow, MapRow, MatchRow, MatchTeamRow, SqliteCatalog};
use crate::manifest::{load_manifest, EventManifest, ManifestError};
use crate::metrics;
use crate::registry::TeamRegistry;
use crate::resolver::PathResolver;

/// Walks a dataset root and indexes every event directory into the catalog.
pub struct Indexer<'a> {
    catalog: &'a SqliteCatalog,
    registry: &'a TeamRegistry,
    resolver: PathResolver,
    options: IndexerOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Indexer<'a> {
    pub fn new(
        catalog: &'a SqliteCatalog,
        registry: &'a TeamRegistry,
        options: IndexerOptions,
    ) -> Self {
        Self {
            catalog,
            registry,
            resolver: PathResolver::new(),
            options,
            cancel: None,
        }
    }

    /// Stop between events once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Index every event directory under `dataset_root`.
    ///
    /// Only a failure to load the team registry or to list the root aborts
    /// the run; everything else is recorded per event in the report.
    pub fn run(&self, dataset_root: &Path) -> Result<RunReport, IndexError> {
        let started_at = Utc::now();
        let root = std::fs::canonicalize(dataset_root).map_err(|source| IndexError::DatasetRoot {
            path: dataset_root.to_path_buf(),
            source,
        })?;

        let sync = self
            .catalog
            .load_registry(self.registry)
            .map_err(IndexError::Registry)?;
        info!(
            teams = self.registry.len(),
            inserted = sync.inserted,
            conflicts = sync.conflicts.len(),
            "Team registry loaded"
        );

        let event_dirs = list_event_dirs(&root)?;
        info!("Indexing {} event directories under {}", event_dirs.len(), root.display());

        let mut report = RunReport::new(&root, started_at, sync);
        for event_dir in event_dirs {
            if self.is_cancelled() {
                warn!("Indexing interrupted before {}", event_dir.display());
                report.interrupted = true;
                break;
            }

            let timer = Instant::now();
            let outcome = self.index_event(&event_dir);
            record_metrics(&outcome, timer.elapsed().as_secs_f64());
            report.record(outcome);
        }

        report.finished_at = Utc::now();
        info!("Indexing finished: {}", report.summary_line());
        Ok(report)
    }

    /// Index a single event directory in its own transaction.
    pub fn index_event(&self, event_dir: &Path) -> EventOutcome {
        info!("Indexing event {}", event_dir.display());

        let manifest = match load_manifest(event_dir, &self.options.manifest_file) {
            Ok(manifest) => manifest,
            Err(ManifestError::Missing { .. }) => {
                info!("Missing manifest in {}, skipping", event_dir.display());
                return EventOutcome::Skipped(SkippedEvent {
                    dir: event_dir.to_path_buf(),
                    reason: SkipReason::MissingManifest,
                });
            }
            Err(e) => {
                warn!("{}", e);
                return EventOutcome::Failed(FailedEvent {
                    dir: event_dir.to_path_buf(),
                    event_id: None,
                    kind: FailureKind::MalformedManifest,
                    reason: e.to_string(),
                });
            }
        };

        check_event_id(event_dir, manifest.event_id);

        match self
            .catalog
            .transaction(|tx| self.write_event(tx, event_dir, &manifest))
        {
            Ok(indexed) => {
                info!(
                    event_id = indexed.event_id,
                    matches = indexed.matches,
                    maps = indexed.maps_resolved,
                    unresolved = indexed.unresolved_maps.len(),
                    inserted = indexed.rows_inserted.total(),
                    "Event indexed"
                );
                EventOutcome::Indexed(indexed)
            }
            Err(e) => {
                warn!(event_id = manifest.event_id, "Event rolled back: {}", e);
                EventOutcome::Failed(FailedEvent {
                    dir: event_dir.to_path_buf(),
                    event_id: Some(manifest.event_id),
                    kind: e.kind(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Write every row of one event through `writer`.
    ///
    /// Stops at the first error; the caller owns the transaction and rolls
    /// it back.
    fn write_event<W: CatalogWriter>(
        &self,
        writer: &W,
        event_dir: &Path,
        manifest: &EventManifest,
    ) -> Result<IndexedEvent, EventError> {
        let mut indexed = IndexedEvent {
            event_id: manifest.event_id,
            dir: event_dir.to_path_buf(),
            ..Default::default()
        };

        let event = EventRow {
            id: manifest.event_id,
            url: manifest.event_url.clone(),
            name: manifest.event_name.clone(),
            date: manifest.date.clone(),
            teams_amount: manifest.teams_amount,
            path_on_fs: path_string(event_dir),
        };
        if writer.upsert_event(&event)? {
            indexed.rows_inserted.events += 1;
        }

        for m in &manifest.matches {
            let title = m.match_title().ok_or_else(|| EventError::InvalidMatchUrl {
                match_id: m.match_id,
                url: m.match_url.clone(),
            })?;
            let match_dir = event_dir.join(title);

            let row = MatchRow {
                id: m.match_id,
                event_id: manifest.event_id,
                url: m.match_url.clone(),
                demo_url: m.gotv_demo_url.clone(),
                date: m.match_date.clone(),
                path_on_fs: path_string(&match_dir),
            };
            if writer.upsert_match(&row)? {
                indexed.rows_inserted.matches += 1;
            }

            for team in m.team_names() {
                let team_id = self
                    .registry
                    .id_of(team)
                    .ok_or_else(|| EventError::UnknownTeam {
                        match_id: m.match_id,
                        team: team.to_string(),
                    })?;
                let link = MatchTeamRow {
                    match_id: m.match_id,
                    team_id,
                };
                if writer.upsert_match_team(&link)? {
                    indexed.rows_inserted.match_teams += 1;
                }
                indexed.team_links += 1;
            }

            for map_name in m.map_names() {
                match self.resolver.resolve_map(&match_dir, map_name) {
                    Ok(path) => {
                        let map = MapRow {
                            match_id: m.match_id,
                            map_name: map_name.to_string(),
                            path_on_fs: path_string(&path),
                        };
                        if writer.upsert_map(&map)? {
                            indexed.rows_inserted.maps += 1;
                        }
                        indexed.maps_resolved += 1;
                    }
                    Err(e) => {
                        warn!(match_id = m.match_id, map = map_name, "Missing map: {}", e);
                        indexed.unresolved_maps.push(UnresolvedMap {
                            match_id: m.match_id,
                            map_name: map_name.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            indexed.matches += 1;
        }

        Ok(indexed)
    }
}

/// Immediate subdirectories of `root`, sorted by name.
fn list_event_dirs(root: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let entries = std::fs::read_dir(root).map_err(|source| IndexError::DatasetRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read an entry of {}: {}", root.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            debug!("Skipping non-directory {}", path.display());
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// The manifest id is authoritative; a differing directory name is only
/// worth a warning.
fn check_event_id(event_dir: &Path, event_id: i64) {
    let dir_name = event_dir
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    if dir_name.parse::<i64>().ok() != Some(event_id) {
        warn!(
            event_id,
            dir = %dir_name,
            "Manifest event id does not match its directory name"
        );
    }
}

fn record_metrics(outcome: &EventOutcome, elapsed_secs: f64) {
    let label = outcome.label();
    metrics::EVENTS_TOTAL.with_label_values(&[label]).inc();
    metrics::EVENT_DURATION
        .with_label_values(&[label])
        .observe(elapsed_secs);

    if let EventOutcome::Indexed(event) = outcome {
        metrics::MAPS_TOTAL
            .with_label_values(&["resolved"])
            .inc_by(event.maps_resolved as u64);
        metrics::MAPS_TOTAL
            .with_label_values(&["unresolved"])
            .inc_by(event.unresolved_maps.len() as u64);

        let rows = event.rows_inserted;
        for (table, count) in [
            ("events", rows.events),
            ("matches", rows.matches),
            ("match_teams", rows.match_teams),
            ("maps", rows.maps),
        ] {
            metrics::ROWS_INSERTED
                .with_label_values(&[table])
                .inc_by(count as u64);
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> TeamRegistry {
        TeamRegistry::new(["Natus Vincere", "FaZe Clan", "Vitality"]).unwrap()
    }

    fn manifest_json(event_id: i64, lineup: &[&str], maps: &[&str]) -> String {
        let lineups: serde_json::Map<String, serde_json::Value> = lineup
            .iter()
            .map(|team| (team.to_string(), serde_json::json!({"players": []})))
            .collect();
        let maps: Vec<_> = maps.iter().map(|m| serde_json::json!({ "map": m })).collect();

        serde_json::json!({
            "event_id": event_id,
            "event_url": format!("https://www.hltv.org/events/{}/test", event_id),
            "event_name": "Test Event",
            "date": "2024-03-17",
            "teams_amount": 2,
            "matches": [{
                "match_id": event_id * 10,
                "match_url": format!("https://www.hltv.org/matches/{}/navi-vs-faze", event_id * 10),
                "gotv_demo_url": "https://www.hltv.org/download/demo/1",
                "match_date": "2024-03-18",
                "lineups": lineups,
                "maps": maps,
            }]
        })
        .to_string()
    }

    fn write_event(root: &Path, event_id: i64, manifest: &str, map_dirs: &[&str]) -> PathBuf {
        let event_dir = root.join(event_id.to_string());
        let match_dir = event_dir.join("navi-vs-faze");
        fs::create_dir_all(&match_dir).unwrap();
        fs::write(event_dir.join("manifest.json"), manifest).unwrap();
        for dir in map_dirs {
            fs::create_dir(match_dir.join(dir)).unwrap();
        }
        event_dir
    }

    #[test]
    fn test_index_event_writes_rows() {
        let root = TempDir::new().unwrap();
        let event_dir = write_event(
            root.path(),
            1,
            &manifest_json(1, &["Natus Vincere", "FaZe Clan"], &["de_nuke", "de_mirage"]),
            &["1-de_nuke", "2-de_mirage"],
        );

        let catalog = SqliteCatalog::in_memory().unwrap();
        let registry = registry();
        catalog.load_registry(&registry).unwrap();
        let indexer = Indexer::new(&catalog, &registry, IndexerOptions::default());

        match indexer.index_event(&event_dir) {
            EventOutcome::Indexed(event) => {
                assert_eq!(event.event_id, 1);
                assert_eq!(event.matches, 1);
                assert_eq!(event.team_links, 2);
                assert_eq!(event.maps_resolved, 2);
                assert!(event.unresolved_maps.is_empty());
                assert_eq!(event.rows_inserted.total(), 1 + 1 + 2 + 2);
            }
            other => panic!("expected Indexed, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_map_is_a_warning() {
        let root = TempDir::new().unwrap();
        let event_dir = write_event(
            root.path(),
            1,
            &manifest_json(1, &["Vitality"], &["de_nuke", "de_vertigo"]),
            &["de_nuke"],
        );

        let catalog = SqliteCatalog::in_memory().unwrap();
        let registry = registry();
        catalog.load_registry(&registry).unwrap();
        let indexer = Indexer::new(&catalog, &registry, IndexerOptions::default());

        match indexer.index_event(&event_dir) {
            EventOutcome::Indexed(event) => {
                assert_eq!(event.maps_resolved, 1);
                assert_eq!(event.unresolved_maps.len(), 1);
                assert_eq!(event.unresolved_maps[0].map_name, "de_vertigo");
            }
            other => panic!("expected Indexed, got {:?}", other),
        }
        assert_eq!(catalog.stats().unwrap().maps, 1);
    }

    #[test]
    fn test_unknown_team_fails_event() {
        let root = TempDir::new().unwrap();
        let event_dir = write_event(
            root.path(),
            1,
            &manifest_json(1, &["Natus Vincere", "UnknownFooTeam"], &["de_nuke"]),
            &["de_nuke"],
        );

        let catalog = SqliteCatalog::in_memory().unwrap();
        let registry = registry();
        catalog.load_registry(&registry).unwrap();
        let indexer = Indexer::new(&catalog, &registry, IndexerOptions::default());

        match indexer.index_event(&event_dir) {
            EventOutcome::Failed(failed) => {
                assert_eq!(failed.kind, FailureKind::UnknownTeam);
                assert_eq!(failed.event_id, Some(1));
                assert!(failed.reason.contains("UnknownFooTeam"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }

        let stats = catalog.stats().unwrap();
        assert_eq!(stats.events, 0);
        assert_eq!(stats.matches, 0);
        assert_eq!(stats.match_teams, 0);
    }

    #[test]
    fn test_malformed_manifest_fails_event() {
        let root = TempDir::new().unwrap();
        let event_dir = write_event(root.path(), 1, "{\"event_id\": 1", &[]);

        let catalog = SqliteCatalog::in_memory().unwrap();
        let registry = registry();
        let indexer = Indexer::new(&catalog, &registry, IndexerOptions::default());

        match indexer.index_event(&event_dir) {
            EventOutcome::Failed(failed) => {
                assert_eq!(failed.kind, FailureKind::MalformedManifest);
                assert_eq!(failed.event_id, None);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_manifest_file_name() {
        let root = TempDir::new().unwrap();
        let event_dir = root.path().join("5");
        fs::create_dir_all(event_dir.join("navi-vs-faze")).unwrap();
        fs::write(
            event_dir.join("event.json"),
            manifest_json(5, &["Vitality"], &[]),
        )
        .unwrap();

        let catalog = SqliteCatalog::in_memory().unwrap();
        let registry = registry();
        catalog.load_registry(&registry).unwrap();
        let options = IndexerOptions {
            manifest_file: "event.json".to_string(),
        };
        let indexer = Indexer::new(&catalog, &registry, options);

        assert_eq!(indexer.index_event(&event_dir).label(), "indexed");
    }

    #[test]
    fn test_list_event_dirs_sorted_directories_only() {
        let root = TempDir::new().unwrap();
        for name in ["300", "1200", "45"] {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        fs::write(root.path().join("index.db"), b"").unwrap();

        let dirs = list_event_dirs(root.path()).unwrap();
        let names: Vec<_> = dirs
            .iter()
            .map(|d| d.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["1200", "300", "45"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let registry = registry();
        let indexer = Indexer::new(&catalog, &registry, IndexerOptions::default());

        let result = indexer.run(Path::new("/nonexistent/dataset/root"));
        assert!(matches!(result, Err(IndexError::DatasetRoot { .. })));
    }

    #[test]
    fn test_cancel_flag_stops_before_next_event() {
        let root = TempDir::new().unwrap();
        write_event(root.path(), 1, &manifest_json(1, &["Vitality"], &[]), &[]);

        let catalog = SqliteCatalog::in_memory().unwrap();
        let registry = registry();
        let flag = Arc::new(AtomicBool::new(true));
        let indexer =
            Indexer::new(&catalog, &registry, IndexerOptions::default()).with_cancel_flag(flag);

        let report = indexer.run(root.path()).unwrap();
        assert!(report.interrupted);
        assert!(report.indexed.is_empty());
        assert_eq!(catalog.stats().unwrap().events, 0);
        // The registry is still loaded before the first event
        assert_eq!(catalog.stats().unwrap().teams, 3);
    }
}
