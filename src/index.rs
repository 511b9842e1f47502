//! Project files under a root, keyed by file name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Error;
use crate::scanner;

/// Every project file under a root, keyed by file name. File names are assumed
/// unique within a working tree; lookups fail loudly when they are not.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    /// File name to every absolute path carrying it, in scan order.
    by_name: BTreeMap<String, Vec<PathBuf>>,
}

impl ProjectIndex {
    /// Build an index from already-discovered absolute paths.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut by_name: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for path in paths {
            let Some(name) = path.file_name() else {
                continue;
            };
            by_name.entry(name.to_string_lossy().into_owned()).or_default().push(path);
        }
        return Self { by_name };
    }

    /// Whether no project files were found.
    pub fn is_empty(&self) -> bool {
        return self.by_name.is_empty();
    }

    /// Number of indexed project files.
    pub fn len(&self) -> usize {
        return self.by_name.values().map(Vec::len).sum();
    }

    /// All indexed paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self.by_name.values().flatten().cloned().collect();
        all.sort();
        return all;
    }

    /// Record that the project file at `from` now lives at `to`.
    pub fn relocate(&mut self, from: &Path, to: &Path) {
        for paths in self.by_name.values_mut() {
            for path in paths.iter_mut().filter(|p| return p.as_path() == from) {
                *path = to.to_path_buf();
            }
        }
    }

    /// Drop a deleted project file from the index.
    pub fn remove(&mut self, path: &Path) {
        for paths in self.by_name.values_mut() {
            paths.retain(|p| return p != path);
        }
        self.by_name.retain(|_, paths| return !paths.is_empty());
    }

    /// Resolve a bare project file name to its one current location.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProjectNotFound` if no project has that file name, or
    /// `Error::AmbiguousProject` if more than one does.
    pub fn resolve(&self, file_name: &str) -> Result<&Path, Error> {
        let candidates = self.by_name.get(file_name).map_or(&[][..], Vec::as_slice);
        return match candidates {
            [] => Err(Error::ProjectNotFound {
                name: file_name.to_string(),
            }),
            [only] => Ok(only.as_path()),
            many => Err(Error::AmbiguousProject {
                candidates: many.to_vec(),
                name: file_name.to_string(),
            }),
        };
    }

    /// Resolve a project by file stem (the name a package would carry).
    ///
    /// # Errors
    ///
    /// Same as [`ProjectIndex::resolve`].
    pub fn resolve_stem(&self, stem: &str) -> Result<&Path, Error> {
        return self.resolve(&format!("{stem}.{}", scanner::PROJECT_EXTENSION));
    }

    /// Recursively find all project files under `root`, excluding configured
    /// dependency-cache directories.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if `root` cannot be made absolute.
    pub fn scan(root: &Path, config: &Config) -> Result<Self, Error> {
        let root = crate::paths::absolute(root)?;
        let index = Self::from_paths(scanner::find_projects(&root, config));
        tracing::debug!(root = %root.display(), projects = index.len(), "indexed project files");
        return Ok(index);
    }
}
