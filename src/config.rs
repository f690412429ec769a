//! Project configuration.
//!
//! A config file is a JSON array of project records:
//!
//! ```json
//! [
//!   {
//!     "name": "camlistore",
//!     "languages": ["go"],
//!     "locations": ["/home/me/src/camlistore.org"],
//!     "exts": ["\\.go"],
//!     "excluded": ["/third_party/"]
//!   }
//! ]
//! ```
//!
//! Capitalized keys (`Name`, `Locations`, ...) are accepted too.
//!
//! A loaded [`ProjectSet`] is never mutated. [`ConfigStore`] hands out
//! `Arc` snapshots and swaps in a whole new set on reload, so a search
//! running during a reload keeps the configuration it started with.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// A named collection of search roots with its file filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(alias = "Name")]
    pub name: String,
    /// Languages the project is browsed in
    #[serde(default, alias = "Languages")]
    pub languages: Vec<Language>,
    /// Root directories to search
    #[serde(default, alias = "Locations")]
    pub locations: Vec<String>,
    /// Extension patterns, matched at the end of a path
    #[serde(default, alias = "Exts")]
    pub exts: Vec<String>,
    /// Exclusion patterns, matched anywhere in a path
    #[serde(default, alias = "Excluded")]
    pub excluded: Vec<String>,
}

impl Project {
    /// Whether `location` is one of the configured roots.
    ///
    /// A trailing separator on either side is ignored.
    #[must_use]
    pub fn contains_location(&self, location: &str) -> bool {
        let wanted = trim_separator(location);
        self.locations.iter().any(|l| trim_separator(l) == wanted)
    }

    /// Whether the project is browsed in `language`, either by name or
    /// because one of the language's extensions is configured.
    #[must_use]
    pub fn supports(&self, language: Language) -> bool {
        self.languages.contains(&language)
            || language
                .exts()
                .iter()
                .any(|ext| self.exts.iter().any(|e| e == ext))
    }

    fn validate(&self) -> ConfigResult<()> {
        for pattern in self.exts.iter().chain(&self.excluded) {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::InvalidPattern {
                    project: self.name.clone(),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn trim_separator(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// All projects of one configuration file, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ProjectSet {
    by_name: HashMap<String, usize>,
    projects: Vec<Project>,
}

impl ProjectSet {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed, if two
    /// projects share a name, or if a pattern does not compile.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let projects: Vec<Project> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let set = Self::from_projects(projects)?;
        tracing::info!("Loaded {} projects from {}", set.len(), path.display());
        Ok(set)
    }

    /// Builds a set from already parsed projects, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` on duplicate names or invalid patterns.
    pub fn from_projects(projects: Vec<Project>) -> ConfigResult<Self> {
        let mut by_name = HashMap::with_capacity(projects.len());
        for (i, project) in projects.iter().enumerate() {
            project.validate()?;
            if by_name.insert(project.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateProject(project.name.clone()));
            }
        }
        Ok(Self { by_name, projects })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Project> {
        self.by_name.get(name).map(|&i| &self.projects[i])
    }

    /// Projects in the order they appear in the configuration file.
    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Project> {
        self.projects.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Project> {
        self.projects.clone()
    }
}

/// Owner of the current configuration snapshot.
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<ProjectSet>>,
}

impl ConfigStore {
    /// Loads `path` and keeps it for later reloads.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the initial load fails.
    pub fn open(path: PathBuf) -> ConfigResult<Self> {
        let set = ProjectSet::load(&path)?;
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(set)),
        })
    }

    /// A store with a fixed project set and nothing to reload from.
    #[must_use]
    pub fn fixed(set: ProjectSet) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// The current configuration.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ProjectSet> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Re-reads the configuration file and swaps the new set in.
    ///
    /// On failure the previous snapshot stays in place. A store without a
    /// file returns its current snapshot unchanged.
    ///
    /// # Errors
    ///
    /// Returns the `ConfigError` of the failed load.
    pub fn reload(&self) -> ConfigResult<Arc<ProjectSet>> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot());
        };
        let fresh = Arc::new(ProjectSet::load(path)?);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Arc::clone(&fresh);
        drop(guard);
        Ok(fresh)
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Default location of the projects file:
/// `<config dir>/chordfind/projects.json`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chordfind")
        .join("projects.json")
}
