//! Point every project reference in a tree at its target's current location.
//!
//! The fixer is a small state machine: it scans the tree once, then rewrites
//! solution files, then project files. Each file is handled on its own; a
//! reference that cannot be resolved fails only the file it appears in.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::edits::{self, Edit};
use crate::error::Error;
use crate::extractor::ReferenceExtractor;
use crate::index::ProjectIndex;
use crate::paths;
use crate::report::{Outcome, Report};
use crate::scanner;
use crate::types::ProjectRef;

/// Where the fixer is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixPhase {
    /// Nothing left to do.
    Done,
    /// Rewriting project-to-project references.
    FixProjects,
    /// Rewriting solution member paths.
    FixSolutions,
    /// Discovering project and solution files.
    Scan,
}

/// Which reference syntax a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `Include="..csproj"` attributes.
    Project,
    /// `Project(..) = "Name", "..csproj", ".."` member lines.
    Solution,
}

/// Fixes references under one root.
pub struct ReferenceFixer<'a> {
    /// Scan settings.
    config: &'a Config,
    /// Reference patterns.
    extractor: ReferenceExtractor,
    /// Project files found by the scan.
    index: ProjectIndex,
    /// Current state.
    phase: FixPhase,
    /// Outcomes so far.
    report: Report,
    /// Absolute root of the tree.
    root: PathBuf,
    /// Solution files found by the scan.
    solutions: Vec<PathBuf>,
}

impl<'a> ReferenceFixer<'a> {
    /// Prepare a run over `root`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if `root` cannot be made absolute.
    pub fn new(root: &Path, config: &'a Config) -> Result<Self, Error> {
        return Ok(Self {
            config,
            extractor: ReferenceExtractor::new(),
            index: ProjectIndex::default(),
            phase: FixPhase::Scan,
            report: Report::default(),
            root: paths::absolute(root)?,
            solutions: Vec::new(),
        });
    }

    /// Current state.
    pub const fn phase(&self) -> FixPhase {
        return self.phase;
    }

    /// Step until done and hand back the report.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the tree cannot be scanned. Per-file failures
    /// are recorded in the report instead.
    pub fn run(mut self) -> Result<Report, Error> {
        while self.phase != FixPhase::Done {
            self.step()?;
        }
        return Ok(self.report);
    }

    /// Perform the work of the current phase and move to the next one.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the tree cannot be scanned.
    pub fn step(&mut self) -> Result<(), Error> {
        match self.phase {
            FixPhase::Scan => {
                self.index = ProjectIndex::scan(&self.root, self.config)?;
                self.solutions = scanner::find_solutions(&self.root, self.config);
                tracing::info!(
                    projects = self.index.len(),
                    solutions = self.solutions.len(),
                    "scanned {}",
                    self.root.display()
                );
                if self.index.is_empty() {
                    self.report.warn(format!("no project files found under {}", self.root.display()));
                }
                self.phase = FixPhase::FixSolutions;
            },
            FixPhase::FixSolutions => {
                for solution in std::mem::take(&mut self.solutions) {
                    self.fix(&solution, FileKind::Solution);
                }
                self.phase = FixPhase::FixProjects;
            },
            FixPhase::FixProjects => {
                for project in self.index.paths() {
                    self.fix(&project, FileKind::Project);
                }
                self.phase = FixPhase::Done;
            },
            FixPhase::Done => {},
        }
        return Ok(());
    }

    /// Fix one file and record the outcome.
    fn fix(&mut self, path: &Path, kind: FileKind) {
        match fix_file(path, kind, &self.extractor, &self.index) {
            Err(e) => self.report.fail(path, &e),
            Ok(false) => self.report.record(path, Outcome::Unchanged),
            Ok(true) => {
                tracing::info!(file = %path.display(), "fixed references");
                self.report.record(path, Outcome::Fixed);
            },
        }
    }
}

/// Rewrite every project reference in `path` to the relative path of its
/// target's current location. Returns whether the file was written.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read or written, and the
/// resolution error of the first reference that cannot be resolved, in which
/// case nothing is written.
pub fn fix_file(path: &Path, kind: FileKind, extractor: &ReferenceExtractor, index: &ProjectIndex) -> Result<bool, Error> {
    let content = std::fs::read_to_string(path)?;
    let references = match kind {
        FileKind::Project => extractor.project_references(&content),
        FileKind::Solution => extractor.solution_projects(&content),
    };
    let edits = reference_edits(path, &references, index)?;
    if edits.is_empty() {
        return Ok(false);
    }
    return edits::persist(path, &edits::apply(&content, edits));
}

/// Replacement for every reference that does not lead to its project's
/// current location. References that already do are kept as written.
///
/// # Errors
///
/// Returns `Error::ProjectNotFound` or `Error::AmbiguousProject` for the
/// first reference that cannot be resolved.
fn reference_edits(path: &Path, references: &[ProjectRef], index: &ProjectIndex) -> Result<Vec<Edit>, Error> {
    let base = path.parent().unwrap_or_else(|| return Path::new(""));
    let mut edits = Vec::new();
    for reference in references {
        let target = index.resolve(&reference.file_name)?;
        if paths::resolve_reference(base, &reference.raw) == target {
            continue;
        }
        let relative = paths::relative_path_from_file(path, target);
        tracing::debug!(file = %path.display(), from = %reference.raw, to = %relative, "rewriting reference");
        edits.push(Edit::replace(reference.span.clone(), relative));
    }
    return Ok(edits);
}
