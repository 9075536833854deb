//! Types for the per-event manifest document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// One event's manifest. Fields not listed here are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventManifest {
    pub event_id: i64,
    pub event_url: String,
    pub event_name: String,
    pub date: String,
    /// Number of teams the event declares (not checked against lineups).
    pub teams_amount: u32,
    pub matches: Vec<MatchManifest>,
}

/// A match entry inside a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchManifest {
    pub match_id: i64,
    pub match_url: String,
    pub gotv_demo_url: String,
    pub match_date: String,
    /// Team name → lineup details. Only the keys are used for indexing.
    pub lineups: BTreeMap<String, serde_json::Value>,
    /// Maps in declared order; duplicates are kept as given.
    pub maps: Vec<MapEntry>,
}

/// A played map as declared by the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEntry {
    pub map: String,
}

impl MatchManifest {
    /// Directory name of the match: the last segment of its url.
    ///
    /// Trailing slashes are ignored. Returns `None` when no usable segment
    /// remains (`""`, `"."` or `".."`).
    pub fn match_title(&self) -> Option<&str> {
        let title = self
            .match_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();

        match title {
            "" | "." | ".." => None,
            title => Some(title),
        }
    }

    /// Team names of the lineups, sorted.
    pub fn team_names(&self) -> impl Iterator<Item = &str> {
        self.lineups.keys().map(String::as_str)
    }

    /// Declared map names in order.
    pub fn map_names(&self) -> impl Iterator<Item = &str> {
        self.maps.iter().map(|entry| entry.map.as_str())
    }
}

/// Sorted, de-duplicated lineup team names across all matches of a manifest.
pub fn distinct_teams(manifest: &EventManifest) -> Vec<String> {
    manifest
        .matches
        .iter()
        .flat_map(|m| m.team_names())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
