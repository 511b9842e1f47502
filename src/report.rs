//! Per-file outcomes of a run and the summary printed at the end.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Removed from disk.
    Deleted,
    /// Left untouched because processing it failed.
    Failed(String),
    /// References rewritten and saved.
    Fixed,
    /// Copied here from `from`, which was then deleted.
    Moved {
        /// Previous location.
        from: PathBuf,
    },
    /// Already correct; not written.
    Unchanged,
    /// Generated and saved.
    Written,
}

impl Outcome {
    /// Column label used in the printed report.
    const fn label(&self) -> &'static str {
        return match self {
            Self::Deleted => "DELETED",
            Self::Failed(_) => "FAILED",
            Self::Fixed => "FIXED",
            Self::Moved { .. } => "MOVED",
            Self::Unchanged => "UNCHANGED",
            Self::Written => "WROTE",
        };
    }
}

/// One reported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// What happened.
    pub outcome: Outcome,
    /// The file (its new location, for moves).
    pub path: PathBuf,
}

/// Everything a run did, in the order it happened.
#[derive(Debug, Default)]
pub struct Report {
    /// One entry per processed file.
    pub entries: Vec<Entry>,
    /// Informational lines printed after the entries.
    pub notes: Vec<String>,
    /// Degraded results the user should look at.
    pub warnings: Vec<String>,
}

impl Report {
    /// Number of files that were written, moved or deleted.
    pub fn changed(&self) -> usize {
        return self
            .entries
            .iter()
            .filter(|e| return !matches!(e.outcome, Outcome::Failed(_) | Outcome::Unchanged))
            .count();
    }

    /// Record a failure for `path` and keep going.
    pub fn fail(&mut self, path: &Path, error: &Error) {
        tracing::error!(file = %path.display(), %error, "skipping file");
        self.record(path, Outcome::Failed(error.to_string()));
    }

    /// Number of files that could not be processed.
    pub fn failed(&self) -> usize {
        return self.entries.iter().filter(|e| return matches!(e.outcome, Outcome::Failed(_))).count();
    }

    /// Add an informational line.
    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.notes.push(message);
    }

    /// Print entries and notes to stdout, warnings to stderr, then the summary.
    pub fn print(&self, base: &Path) {
        print!("{}", self.render(base));
        for warning in &self.warnings {
            eprintln!("warning: {warning}");
        }
        println!("{}", self.summary());
    }

    /// Record what happened to `path`.
    pub fn record(&mut self, path: &Path, outcome: Outcome) {
        tracing::debug!(file = %path.display(), outcome = outcome.label(), "processed");
        self.entries.push(Entry {
            outcome,
            path: path.to_path_buf(),
        });
    }

    /// Entry and note lines, paths shown relative to `base` where possible.
    pub fn render(&self, base: &Path) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let path = display_path(base, &entry.path);
            let _ = match &entry.outcome {
                Outcome::Failed(reason) => writeln!(out, "{:<9} {path} ({reason})", entry.outcome.label()),
                Outcome::Moved { from } => {
                    writeln!(out, "{:<9} {} -> {path}", entry.outcome.label(), display_path(base, from))
                },
                other => writeln!(out, "{:<9} {path}", other.label()),
            };
        }
        for note in &self.notes {
            let _ = writeln!(out, "{note}");
        }
        return out;
    }

    /// Final line of every run.
    pub fn summary(&self) -> String {
        return format!(
            "Done. {} changed, {} unchanged, {} failed.",
            self.changed(),
            self.unchanged(),
            self.failed()
        );
    }

    /// Number of files left as they were.
    pub fn unchanged(&self) -> usize {
        return self.entries.iter().filter(|e| return e.outcome == Outcome::Unchanged).count();
    }

    /// Add a warning about a degraded result.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("warning recorded: {message}");
        self.warnings.push(message);
    }
}

/// `path` relative to `base` when it lies beneath it.
fn display_path(base: &Path, path: &Path) -> String {
    return path.strip_prefix(base).unwrap_or(path).display().to_string();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_class() {
        let mut report = Report::default();
        report.record(Path::new("/w/A.csproj"), Outcome::Fixed);
        report.record(Path::new("/w/B.csproj"), Outcome::Unchanged);
        report.record(Path::new("/w/C.csproj"), Outcome::Deleted);
        report.fail(Path::new("/w/D.csproj"), &Error::ProjectNotFound { name: "E.csproj".to_string() });
        assert_eq!(report.summary(), "Done. 2 changed, 1 unchanged, 1 failed.");
    }

    #[test]
    fn renders_paths_relative_to_base() {
        let mut report = Report::default();
        report.record(
            Path::new("/w/src/A/A.csproj"),
            Outcome::Moved {
                from: PathBuf::from("/w/old/A.csproj"),
            },
        );
        report.record(Path::new("/elsewhere/B.csproj"), Outcome::Unchanged);
        report.note("Solution All.sln is missing 1 project");

        let text = report.render(Path::new("/w"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "MOVED     old/A.csproj -> src/A/A.csproj");
        assert_eq!(lines[1], "UNCHANGED /elsewhere/B.csproj");
        assert_eq!(lines[2], "Solution All.sln is missing 1 project");
    }

    #[test]
    fn failures_carry_the_reason() {
        let mut report = Report::default();
        report.fail(Path::new("/w/A.csproj"), &Error::ProjectNotFound { name: "B.csproj".to_string() });
        assert_eq!(
            report.render(Path::new("/w")),
            "FAILED    A.csproj (project not found: `B.csproj`)\n"
        );
    }
}
