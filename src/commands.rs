//! Mode dispatch for dotnet-refs: fix-references, relocate-topology,
//! internalize-packages, centralize-versions.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::centralizer;
use crate::config::Config;
use crate::error::Error;
use crate::fixer::ReferenceFixer;
use crate::internalizer;
use crate::paths;
use crate::relocator::{Topology, TopologyRelocator};
use crate::report::Report;
use crate::scanner;

/// What a run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Move package versions into a central manifest.
    CentralizeVersions,
    /// Legacy mode: fix references for a directory, relocate for a solution.
    Fix,
    /// Rewrite project references to match where projects are.
    FixReferences,
    /// Replace package references to in-tree projects with project references.
    InternalizePackages,
    /// Move projects to where a solution or filter says they are.
    RelocateTopology,
}

impl Mode {
    /// Canonical spelling.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::CentralizeVersions => "centralize-versions",
            Self::Fix => "fix",
            Self::FixReferences => "fix-references",
            Self::InternalizePackages => "internalize-packages",
            Self::RelocateTopology => "relocate-topology",
        };
    }
}

impl FromStr for Mode {
    type Err = Error;

    /// Case-insensitive, accepting both British and American spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s.trim().to_ascii_lowercase().as_str() {
            "centralise" | "centralize" | "centralise-versions" | "centralize-versions" => Ok(Self::CentralizeVersions),
            "fix" => Ok(Self::Fix),
            "fix-references" => Ok(Self::FixReferences),
            "internalise" | "internalize" | "internalise-packages" | "internalize-packages" => {
                Ok(Self::InternalizePackages)
            },
            "relocate-topology" => Ok(Self::RelocateTopology),
            _ => Err(Error::InvalidMode { mode: s.to_string() }),
        };
    }
}

/// Command-line options shared by every mode.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Directory, `.sln` or `.slnf` the mode starts from; relative to the working directory.
    pub entry_point: Option<PathBuf>,
    /// Drop attribute-less `ItemGroup` elements left empty by internalizing.
    pub remove_empty_item_groups: bool,
    /// Delete project files a relocation topology does not name.
    pub remove_unreferenced_project_files: bool,
    /// Root of the working tree; defaults to the current directory.
    pub working_directory: Option<PathBuf>,
}

/// Entry point as given, made absolute against the working directory.
fn entry_path(options: &Options, working_dir: &Path) -> Option<PathBuf> {
    return options
        .entry_point
        .as_ref()
        .map(|p| return paths::normalize_path(&working_dir.join(p)));
}

/// Entry point for fixing references: a directory, the working directory by default.
///
/// # Errors
///
/// Returns `Error::InvalidEntryPoint` if the path is not a directory.
fn directory_entry(options: &Options, working_dir: &Path) -> Result<PathBuf, Error> {
    let path = entry_path(options, working_dir).unwrap_or_else(|| return working_dir.to_path_buf());
    if !path.is_dir() {
        return Err(Error::InvalidEntryPoint {
            path,
            reason: "expected an existing directory".to_string(),
        });
    }
    return Ok(path);
}

/// Run `mode` with `options` and print the report.
///
/// # Errors
///
/// Returns `Error::InvalidMode`, `Error::InvalidWorkingDirectory` or
/// `Error::InvalidEntryPoint` for bad arguments (checked in that order,
/// before any tree is touched), and run-wide failures of the mode itself.
pub fn run(mode: &str, options: &Options) -> Result<(), Error> {
    let mode = Mode::from_str(mode)?;
    let working_dir = working_directory(options)?;
    tracing::info!(
        mode = mode.as_str(),
        working_directory = %working_dir.display(),
        entry_point = ?options.entry_point,
        remove_unreferenced_project_files = options.remove_unreferenced_project_files,
        remove_empty_item_groups = options.remove_empty_item_groups,
        "starting"
    );

    let report = match mode {
        Mode::CentralizeVersions => {
            let solution = solution_entry(options, &working_dir)?;
            let config = Config::load(&working_dir)?;
            centralizer::centralize(&solution, &working_dir, &config)?
        },
        Mode::Fix => {
            let path = entry_path(options, &working_dir).unwrap_or_else(|| return working_dir.clone());
            if path.is_dir() {
                fix_references(&path, &working_dir)?
            } else {
                relocate(&topology_entry(options, &working_dir)?, options, &working_dir)?
            }
        },
        Mode::FixReferences => {
            let root = directory_entry(options, &working_dir)?;
            fix_references(&root, &working_dir)?
        },
        Mode::InternalizePackages => {
            let config = Config::load(&working_dir)?;
            internalizer::internalize(&working_dir, &config, options.remove_empty_item_groups)?
        },
        Mode::RelocateTopology => {
            let topology = topology_entry(options, &working_dir)?;
            relocate(&topology, options, &working_dir)?
        },
    };

    report.print(&working_dir);
    return Ok(());
}

/// Run the reference fixer over `root`.
///
/// # Errors
///
/// Returns config and scan errors.
fn fix_references(root: &Path, working_dir: &Path) -> Result<Report, Error> {
    let config = Config::load(working_dir)?;
    return ReferenceFixer::new(root, &config)?.run();
}

/// Run the relocator for `topology` over the working tree.
///
/// # Errors
///
/// Returns config, scan and entry-point read errors.
fn relocate(topology: &Topology, options: &Options, working_dir: &Path) -> Result<Report, Error> {
    let config = Config::load(working_dir)?;
    let relocator = TopologyRelocator::new(working_dir, &config, options.remove_unreferenced_project_files)?;
    return relocator.run(topology);
}

/// Entry point for centralizing: an existing solution file.
///
/// # Errors
///
/// Returns `Error::InvalidEntryPoint` if it is missing or not a `.sln` file.
fn solution_entry(options: &Options, working_dir: &Path) -> Result<PathBuf, Error> {
    let Some(path) = entry_path(options, working_dir) else {
        return Err(Error::InvalidEntryPoint {
            path: working_dir.to_path_buf(),
            reason: "a solution file is required".to_string(),
        });
    };
    if !path.is_file() || !scanner::has_extension(&path, scanner::SOLUTION_EXTENSION) {
        return Err(Error::InvalidEntryPoint {
            path,
            reason: "expected an existing .sln file".to_string(),
        });
    }
    return Ok(path);
}

/// Entry point for relocating: an existing solution or solution filter.
///
/// # Errors
///
/// Returns `Error::InvalidEntryPoint` if it is missing or of another kind.
fn topology_entry(options: &Options, working_dir: &Path) -> Result<Topology, Error> {
    let Some(path) = entry_path(options, working_dir) else {
        return Err(Error::InvalidEntryPoint {
            path: working_dir.to_path_buf(),
            reason: "a .sln or .slnf file is required".to_string(),
        });
    };
    let topology = path.is_file().then(|| return Topology::from_path(&path)).flatten();
    return topology.ok_or_else(|| {
        return Error::InvalidEntryPoint {
            path,
            reason: "expected an existing .sln or .slnf file".to_string(),
        };
    });
}

/// The working directory from the options (or the current directory), made absolute.
///
/// # Errors
///
/// Returns `Error::InvalidWorkingDirectory` if it is not an existing directory.
fn working_directory(options: &Options) -> Result<PathBuf, Error> {
    let given = options.working_directory.clone().unwrap_or_else(|| return PathBuf::from("."));
    let invalid = || {
        return Error::InvalidWorkingDirectory {
            path: given.clone(),
        };
    };
    let absolute = paths::absolute(&given).map_err(|_err| return invalid())?;
    if !absolute.is_dir() {
        return Err(invalid());
    }
    return Ok(absolute);
}
