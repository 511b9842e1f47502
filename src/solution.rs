//! Solution files and solution filters.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::edits::{Edit, line_ending};
use crate::error::Error;
use crate::paths;

/// Project type GUID of C# projects in solution member entries.
pub const CSHARP_PROJECT_TYPE: &str = "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}";

/// Start of the solution's global configuration section.
const GLOBAL_SECTION_PATTERN: &str = r"(?m)^Global\r?$";

/// Compiled `GLOBAL_SECTION_PATTERN`.
static GLOBAL_SECTION: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(GLOBAL_SECTION_PATTERN).expect("valid regex"));

/// A `.slnf` file: a solution plus the subset of its projects to load.
#[derive(Debug, Clone, Deserialize)]
pub struct SolutionFilter {
    /// The `solution` object.
    pub solution: FilteredSolution,
}

/// Body of a solution filter.
#[derive(Debug, Clone, Deserialize)]
pub struct FilteredSolution {
    /// Solution path, relative to the filter file.
    pub path: String,
    /// Project paths, relative to the solution's directory.
    #[serde(default)]
    pub projects: Vec<String>,
}

impl SolutionFilter {
    /// Parse filter JSON. A leading byte-order mark is tolerated.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the text is not a solution filter.
    pub fn parse(content: &str) -> Result<Self, Error> {
        return Ok(serde_json::from_str(content.trim_start_matches('\u{feff}'))?);
    }

    /// Read and parse a filter file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, or `Error::Json` if it
    /// is not a solution filter.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        return Self::parse(&content);
    }

    /// Directory the filter's project paths are relative to: that of the
    /// solution it points at.
    pub fn project_root(&self, filter_path: &Path) -> PathBuf {
        let filter_dir = filter_path.parent().unwrap_or_else(|| return Path::new(""));
        let solution = paths::resolve_reference(filter_dir, &self.solution.path);
        return solution.parent().map_or_else(|| return filter_dir.to_path_buf(), Path::to_path_buf);
    }
}

/// A project to add to a solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    /// Display name, the project file stem.
    pub name: String,
    /// Path relative to the solution's directory.
    pub relative_path: String,
}

/// Edit that adds member entries to solution text, right before the `Global`
/// section (or at the end when there is none). Line endings follow the file.
///
/// # Panics
///
/// Panics if the hardcoded pattern is invalid (compile-time invariant).
pub fn add_members(content: &str, members: &[NewMember]) -> Edit {
    let eol = line_ending(content);
    let mut block = String::new();
    for member in members {
        let guid = uuid::Uuid::new_v4().as_hyphenated().to_string().to_uppercase();
        let _ = write!(
            block,
            "Project(\"{CSHARP_PROJECT_TYPE}\") = \"{}\", \"{}\", \"{{{guid}}}\"{eol}EndProject{eol}",
            member.name, member.relative_path,
        );
    }

    if let Some(found) = GLOBAL_SECTION.find(content) {
        return Edit::insert(found.start(), block);
    }
    if !content.is_empty() && !content.ends_with('\n') {
        block.insert_str(0, eol);
    }
    return Edit::insert(content.len(), block);
}
