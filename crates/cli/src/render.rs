//! Human-readable run report.

use std::fmt::Write;

use demoset_core::{CatalogStats, RunReport};

/// Render a run report for the terminal.
pub fn render_report(report: &RunReport, stats: &CatalogStats) -> String {
    let mut out = String::new();
    let elapsed = report.finished_at - report.started_at;

    let _ = writeln!(out, "Dataset: {}", report.dataset_root.display());
    let _ = writeln!(
        out,
        "Result:  {} in {:.2}s",
        report.summary_line(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );

    for conflict in &report.registry.conflicts {
        let _ = writeln!(
            out,
            "  registry: team id {} is stored as {:?}, registry now says {:?}",
            conflict.id, conflict.stored, conflict.registry
        );
    }

    if !report.failed.is_empty() {
        let _ = writeln!(out, "Failed:");
        for failed in &report.failed {
            let _ = writeln!(
                out,
                "  {} [{}] {}",
                failed.dir.display(),
                failed.kind,
                failed.reason
            );
        }
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(out, "Skipped:");
        for skipped in &report.skipped {
            let _ = writeln!(out, "  {} ({})", skipped.dir.display(), skipped.reason);
        }
    }

    let unresolved: Vec<_> = report
        .indexed
        .iter()
        .flat_map(|event| event.unresolved_maps.iter().map(move |m| (event.event_id, m)))
        .collect();
    if !unresolved.is_empty() {
        let _ = writeln!(out, "Unresolved maps:");
        for (event_id, map) in unresolved {
            let _ = writeln!(
                out,
                "  event {} match {} {}: {}",
                event_id, map.match_id, map.map_name, map.reason
            );
        }
    }

    let _ = writeln!(
        out,
        "Catalog: {} events, {} matches, {} teams, {} team links, {} maps",
        stats.events, stats.matches, stats.teams, stats.match_teams, stats.maps
    );

    out
}
