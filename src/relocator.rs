//! Move project files on disk to where a solution or solution filter says
//! they should be.
//!
//! For a solution, every member is moved to the path its entry names, then
//! each moved project's own references are followed so the whole closure ends
//! up where its referencing projects expect it. A filter is taken as the
//! complete list: its projects are moved without following references, and
//! references leading outside the list are reported afterwards.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Error;
use crate::extractor::{ReferenceExtractor, reference_file_name};
use crate::index::ProjectIndex;
use crate::paths;
use crate::report::{Outcome, Report};
use crate::scanner;
use crate::solution::SolutionFilter;

/// The file describing the desired layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    /// A `.slnf` file.
    Filter(PathBuf),
    /// A `.sln` file.
    Solution(PathBuf),
}

impl Topology {
    /// Classify an entry point by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        if scanner::has_extension(path, scanner::SOLUTION_EXTENSION) {
            return Some(Self::Solution(path.to_path_buf()));
        }
        if scanner::has_extension(path, scanner::SOLUTION_FILTER_EXTENSION) {
            return Some(Self::Filter(path.to_path_buf()));
        }
        return None;
    }
}

/// A project waiting to be moved: the directory its reference is relative to
/// and the reference text.
struct Pending {
    /// Directory the reference path is relative to.
    base: PathBuf,
    /// Reference path as written.
    raw: String,
}

/// Relocates the projects of one working tree.
pub struct TopologyRelocator {
    /// Reference patterns.
    extractor: ReferenceExtractor,
    /// Where every project currently is.
    index: ProjectIndex,
    /// File names already placed (or given up on).
    processed: BTreeSet<String>,
    /// Delete projects the topology never named.
    remove_extras: bool,
    /// Outcomes so far.
    report: Report,
}

impl TopologyRelocator {
    /// Index the projects under `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be made absolute.
    pub fn new(working_dir: &Path, config: &Config, remove_extras: bool) -> Result<Self, Error> {
        return Ok(Self {
            extractor: ReferenceExtractor::new(),
            index: ProjectIndex::scan(working_dir, config)?,
            processed: BTreeSet::new(),
            remove_extras,
            report: Report::default(),
        });
    }

    /// Relocate according to `topology` and hand back the report.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the entry point cannot be read, or `Error::Json`
    /// if a filter is not valid. Failures moving single projects are recorded
    /// in the report instead.
    pub fn run(mut self, topology: &Topology) -> Result<Report, Error> {
        match topology {
            Topology::Filter(path) => {
                let filter = SolutionFilter::read(path)?;
                let root = filter.project_root(path);
                tracing::info!(filter = %path.display(), root = %root.display(), "relocating from solution filter");
                for raw in &filter.solution.projects {
                    self.place(&root, raw);
                }
                self.check_filter_closure();
            },
            Topology::Solution(path) => {
                let content = std::fs::read_to_string(path)?;
                let base = path.parent().unwrap_or_else(|| return Path::new("")).to_path_buf();
                tracing::info!(solution = %path.display(), "relocating from solution");
                let members = self.extractor.solution_projects(&content);
                let mut stack: Vec<Pending> = members
                    .into_iter()
                    .rev()
                    .map(|r| {
                        return Pending {
                            base: base.clone(),
                            raw: r.raw,
                        };
                    })
                    .collect();
                while let Some(next) = stack.pop() {
                    if let Some(placed) = self.place(&next.base, &next.raw) {
                        self.push_references(&placed, &mut stack);
                    }
                }
            },
        }

        if self.remove_extras {
            self.remove_unprocessed();
        }
        return Ok(self.report);
    }

    /// Warn about every reference from a placed project to one the filter did not list.
    fn check_filter_closure(&mut self) {
        for name in &self.processed {
            let Ok(path) = self.index.resolve(name).map(Path::to_path_buf) else {
                continue;
            };
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            for reference in self.extractor.project_references(&content) {
                if !self.processed.contains(&reference.file_name) {
                    self.report.warn(format!(
                        "{name} references {}, which the solution filter does not list; it was not moved",
                        reference.file_name
                    ));
                }
            }
        }
    }

    /// Move one project to `destination`, copying then deleting the original.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProjectNotFound`/`Error::AmbiguousProject` if the
    /// project cannot be located, `Error::DestinationOccupied` if another file
    /// is in the way, or `Error::Io` if copying or deleting fails.
    fn move_project(&mut self, file_name: &str, destination: &Path) -> Result<Outcome, Error> {
        let current = self.index.resolve(file_name)?.to_path_buf();
        if current == destination {
            return Ok(Outcome::Unchanged);
        }
        if destination.exists() {
            return Err(Error::DestinationOccupied {
                from: current,
                to: destination.to_path_buf(),
            });
        }
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&current, destination)?;
        std::fs::remove_file(&current)?;
        self.index.relocate(&current, destination);
        tracing::info!(from = %current.display(), to = %destination.display(), "moved project");
        return Ok(Outcome::Moved { from: current });
    }

    /// Place the project a reference names, unless it was already handled.
    /// Returns its location when it is now where the reference says.
    fn place(&mut self, base: &Path, raw: &str) -> Option<PathBuf> {
        let file_name = reference_file_name(raw);
        if !self.processed.insert(file_name.clone()) {
            tracing::debug!(project = %file_name, "already processed");
            return None;
        }
        let destination = paths::resolve_reference(base, raw);
        match self.move_project(&file_name, &destination) {
            Err(e) => {
                self.report.fail(&destination, &e);
                return None;
            },
            Ok(outcome) => {
                self.report.record(&destination, outcome);
                return Some(destination);
            },
        }
    }

    /// Queue the references of a placed project so they are handled before
    /// anything queued earlier, in the order they are declared.
    fn push_references(&mut self, project: &Path, stack: &mut Vec<Pending>) {
        let content = match std::fs::read_to_string(project) {
            Err(e) => {
                self.report.warn(format!("could not read {} to follow its references: {e}", project.display()));
                return;
            },
            Ok(c) => c,
        };
        let base = project.parent().unwrap_or_else(|| return Path::new("")).to_path_buf();
        for reference in self.extractor.project_references(&content).into_iter().rev() {
            stack.push(Pending {
                base: base.clone(),
                raw: reference.raw,
            });
        }
    }

    /// Delete every indexed project whose file name was never processed.
    fn remove_unprocessed(&mut self) {
        for path in self.index.paths() {
            let processed = path
                .file_name()
                .is_some_and(|n| return self.processed.contains(n.to_string_lossy().as_ref()));
            if processed {
                continue;
            }
            match std::fs::remove_file(&path) {
                Err(e) => self.report.fail(&path, &Error::Io(e)),
                Ok(()) => {
                    tracing::info!(file = %path.display(), "deleted unreferenced project");
                    self.index.remove(&path);
                    self.report.record(&path, Outcome::Deleted);
                },
            }
        }
    }
}
