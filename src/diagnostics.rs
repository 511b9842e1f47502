use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// ANSI bold on.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Argument errors name the offending value and show the accepted forms;
/// everything else falls through to a one-paragraph block.
pub fn render_error(e: &Error) -> String {
    match e {
        Error::AmbiguousProject { candidates, name } => render_ambiguous_project(name, candidates),
        Error::DestinationOccupied { from, to } => render_destination_occupied(from, to),
        Error::InvalidEntryPoint { path, reason } => render_invalid_entry_point(path, reason),
        Error::InvalidMode { mode } => render_invalid_mode(mode),
        Error::InvalidWorkingDirectory { path } => render_invalid_working_directory(path),
        _ => render_generic(e),
    }
}

/// One-block rendering for variants without a dedicated layout.
fn render_generic(e: &Error) -> String {
    match e {
        Error::MalformedInput { file, reason } => format!("\
# Error: Malformed Input

Could not read `{}`: {reason}
", file.display()),

        Error::ProjectNotFound { name } => format!("\
# Error: Project Not Found

No `{name}` exists under the working directory.
"),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        Error::Json(e) => format!("\
# Error: Invalid Solution Filter

{e}
"),
        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

{e}

## Fix

Check `.dotnet-refs.toml` in the working directory.
"),
        Error::XmlDe(e) => format!("\
# Error: Invalid Package Manifest

{e}

## Fix

Repair or remove the existing central package manifest, then re-run:

    dotnet-refs centralize-versions --entry-point <solution>.sln
"),
        _ => format!("\
# Error

{e}
"),
    }
}

/// Candidates list plus how to disambiguate.
fn render_ambiguous_project(name: &str, candidates: &[PathBuf]) -> String {
    let mut out = format!("\
# Error: Ambiguous Project

`{name}` matches more than one project file.

## Candidates

");
    for c in candidates {
        let _ = writeln!(out, "- `{}`", c.display());
    }
    out.push_str("\
\n## Fix

Rename or remove all but one, or exclude the extra copies in `.dotnet-refs.toml`:

    exclude = [\"packages\", \"bin\", \"obj\"]
");
    out
}

/// A relocation blocked by an existing path.
fn render_destination_occupied(from: &Path, to: &Path) -> String {
    format!("\
# Error: Destination Occupied

Cannot move `{}` to `{}`: something else is already there.
", from.display(), to.display())
}

/// The rejected entry point and what each mode expects.
fn render_invalid_entry_point(path: &Path, reason: &str) -> String {
    format!("\
# Error: Invalid Entry Point

`{}`: {reason}.

## Expected

- `fix-references`: a directory (defaults to the working directory)
- `relocate-topology`: a `.sln` or `.slnf` file
- `centralize-versions`: a `.sln` file
", path.display())
}

/// The rejected mode and the known ones.
fn render_invalid_mode(mode: &str) -> String {
    format!("\
# Error: Invalid Mode

`{mode}` is not a known mode.

## Modes

- `fix-references`
- `relocate-topology`
- `internalize-packages` (or `internalise`)
- `centralize-versions` (or `centralise`)
- `fix` (legacy: a directory fixes references, a solution relocates)
")
}

/// The rejected working directory.
fn render_invalid_working_directory(path: &Path) -> String {
    format!("\
# Error: Invalid Working Directory

`{}` is not an existing directory.

## Fix

Pass an existing directory:

    dotnet-refs fix-references --working-directory path/to/repo
", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_mode_lists_known_modes() {
        let md = render_error(&Error::InvalidMode { mode: "tidy".to_string() });
        assert!(md.starts_with("# Error: Invalid Mode"));
        assert!(md.contains("`tidy`"));
        assert!(md.contains("- `centralize-versions`"));
    }

    #[test]
    fn ambiguous_project_lists_candidates_and_fix() {
        let md = render_error(&Error::AmbiguousProject {
            candidates: vec![PathBuf::from("a/X.csproj"), PathBuf::from("b/X.csproj")],
            name: "X.csproj".to_string(),
        });
        assert!(md.contains("- `a/X.csproj`\n- `b/X.csproj`\n"));
        assert!(md.contains("## Fix"));
    }

    #[test]
    fn unhandled_variants_fall_back_to_message() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let md = render_error(&Error::Io(io));
        assert_eq!(md, "# Error: I/O\n\ndenied\n");
    }
}
