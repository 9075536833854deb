//! Team registry - the fixed, ordered catalog of recognised team names.
//!
//! A team's id is its zero-based position in the registry, so the same list
//! always yields the same ids no matter which events were indexed, or in
//! which order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::RegistryConfig;

/// Stable team identifier (registry position).
pub type TeamId = i64;

/// Errors raised while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Team name at position {position} is empty")]
    EmptyName { position: usize },

    #[error("Team {name:?} is listed twice (positions {first} and {second})")]
    DuplicateTeam {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("Failed to read team registry {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No team registry configured")]
    NotConfigured,
}

/// Ordered, immutable list of known teams.
#[derive(Debug, Clone)]
pub struct TeamRegistry {
    names: Vec<String>,
    ids: HashMap<String, TeamId>,
}

impl TeamRegistry {
    /// Build a registry from an ordered list of names.
    pub fn new<I, S>(names: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut ids = HashMap::with_capacity(names.len());

        for (position, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(RegistryError::EmptyName { position });
            }
            if let Some(first) = ids.insert(name.clone(), position as TeamId) {
                return Err(RegistryError::DuplicateTeam {
                    name: name.clone(),
                    first: first as usize,
                    second: position,
                });
            }
        }

        Ok(Self { names, ids })
    }

    /// Build the registry from configuration (inline list or file).
    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        match (&config.teams, &config.file) {
            (Some(teams), _) => Self::new(teams.iter().cloned()),
            (None, Some(path)) => Self::from_file(path),
            (None, None) => Err(RegistryError::NotConfigured),
        }
    }

    /// Read a registry file: one team per line, blank lines and `#` comments
    /// are ignored. Surrounding whitespace is trimmed.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse the registry file format.
    pub fn parse(contents: &str) -> Result<Self, RegistryError> {
        Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Id of a team by exact name.
    pub fn id_of(&self, name: &str) -> Option<TeamId> {
        self.ids.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    /// `(id, name)` pairs in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (TeamId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx as TeamId, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
