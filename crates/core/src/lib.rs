pub mod catalog;
pub mod config;
pub mod indexer;
pub mod manifest;
pub mod metrics;
pub mod registry;
pub mod resolver;

pub use catalog::{
    CatalogError, CatalogStats, CatalogTransaction, CatalogWriter, EventRow, MapRow, MatchRow,
    MatchTeamRow, RegistrySync, SqliteCatalog, TeamConflict, TeamRow,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    DatasetConfig, RegistryConfig,
};
pub use indexer::{
    EventError, EventOutcome, FailedEvent, FailureKind, IndexError, IndexedEvent, Indexer,
    IndexerOptions, RunReport, SkipReason, SkippedEvent, UnresolvedMap,
};
pub use manifest::{
    distinct_teams, load_manifest, parse_manifest, EventManifest, ManifestError, MapEntry,
    MatchManifest,
};
pub use registry::{RegistryError, TeamId, TeamRegistry};
pub use resolver::{PathResolver, ResolveError};
