//! Turn package references to in-tree projects into project references.
//!
//! A `PackageReference` whose name is the file stem of a project in the
//! working tree becomes a `ProjectReference` to that project. Solutions are
//! then completed: every project reachable from a solution's members that the
//! solution does not list yet is added to it.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::edits::{self, Edit};
use crate::error::Error;
use crate::extractor::{self, ReferenceExtractor};
use crate::index::ProjectIndex;
use crate::markup::{Document, Element};
use crate::paths;
use crate::report::{Outcome, Report};
use crate::scanner;
use crate::solution::{self, NewMember};
use crate::types::PackageRef;

/// A package reference that will become a project reference.
struct Conversion {
    /// The package element being replaced.
    package: PackageRef,
    /// Relative path from the converting project to the target project.
    relative_path: String,
}

/// Internalizes packages across one working tree.
pub struct PackageInternalizer<'a> {
    /// Scan settings.
    config: &'a Config,
    /// Reference patterns.
    extractor: ReferenceExtractor,
    /// Every project under the working directory.
    index: ProjectIndex,
    /// Drop item groups left empty.
    remove_empty_item_groups: bool,
    /// Outcomes so far.
    report: Report,
    /// Absolute working directory.
    root: PathBuf,
}

impl<'a> PackageInternalizer<'a> {
    /// Index the projects under `working_dir`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be made absolute.
    pub fn new(working_dir: &Path, config: &'a Config, remove_empty_item_groups: bool) -> Result<Self, Error> {
        let root = paths::absolute(working_dir)?;
        return Ok(Self {
            config,
            extractor: ReferenceExtractor::new(),
            index: ProjectIndex::scan(&root, config)?,
            remove_empty_item_groups,
            report: Report::default(),
            root,
        });
    }

    /// Convert packages in every project, then complete every solution.
    pub fn run(mut self) -> Report {
        for project in self.index.paths() {
            match internalize_project(&project, &self.index, self.remove_empty_item_groups) {
                Err(e) => self.report.fail(&project, &e),
                Ok(false) => self.report.record(&project, Outcome::Unchanged),
                Ok(true) => {
                    tracing::info!(file = %project.display(), "converted packages to project references");
                    self.report.record(&project, Outcome::Fixed);
                },
            }
        }

        for sln in scanner::find_solutions(&self.root, self.config) {
            match self.complete_solution(&sln) {
                Err(e) => self.report.fail(&sln, &e),
                Ok(0) => self.report.record(&sln, Outcome::Unchanged),
                Ok(added) => {
                    self.report.note(format!("Added {added} missing project reference/s to {}", sln.display()));
                    self.report.record(&sln, Outcome::Fixed);
                },
            }
        }
        return self.report;
    }

    /// Add the projects a solution's members depend on but it does not list.
    /// Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a file cannot be read or written, or the lookup
    /// error of the first project that cannot be resolved.
    fn complete_solution(&self, sln: &Path) -> Result<usize, Error> {
        let content = std::fs::read_to_string(sln)?;
        let mut listed: HashSet<PathBuf> = HashSet::new();
        let mut members: Vec<PathBuf> = Vec::new();
        for member in self.extractor.solution_projects(&content) {
            let path = self.index.resolve(&member.file_name)?.to_path_buf();
            if listed.insert(path.clone()) {
                members.push(path);
            }
        }

        let mut seen: HashSet<PathBuf> = listed.clone();
        let mut missing: Vec<PathBuf> = Vec::new();
        let mut stack: Vec<PathBuf> = members.into_iter().rev().collect();
        while let Some(project) = stack.pop() {
            let project_content = std::fs::read_to_string(&project)?;
            let references = self.extractor.project_references(&project_content);
            for reference in references.iter().rev() {
                let target = self.index.resolve(&reference.file_name)?.to_path_buf();
                if seen.insert(target.clone()) {
                    missing.push(target.clone());
                    stack.push(target);
                }
            }
        }
        if missing.is_empty() {
            return Ok(0);
        }

        let new_members: Vec<NewMember> = missing
            .iter()
            .map(|path| {
                return NewMember {
                    name: path.file_stem().map(|s| return s.to_string_lossy().into_owned()).unwrap_or_default(),
                    relative_path: paths::relative_path_from_file(sln, path),
                };
            })
            .collect();
        tracing::info!(solution = %sln.display(), missing = new_members.len(), "adding missing projects");
        let updated = edits::apply(&content, vec![solution::add_members(&content, &new_members)]);
        edits::persist(sln, &updated)?;
        return Ok(new_members.len());
    }
}

/// Convert the package references of one project that name in-tree
/// projects. Returns whether the file was written.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read or written,
/// `Error::MalformedInput` if it is not well-formed, or
/// `Error::AmbiguousProject` if a package name matches several projects.
pub fn internalize_project(path: &Path, index: &ProjectIndex, remove_empty_item_groups: bool) -> Result<bool, Error> {
    let content = std::fs::read_to_string(path)?;
    let doc = Document::parse(path, &content)?;

    let mut conversions: Vec<Conversion> = Vec::new();
    for found in extractor::package_references(path, &content, &doc) {
        let package = match found {
            Err(e) => {
                tracing::warn!(file = %path.display(), %e, "skipping package reference");
                continue;
            },
            Ok(p) => p,
        };
        let target = match index.resolve_stem(&package.name) {
            Err(Error::ProjectNotFound { .. }) => continue,
            Err(e) => return Err(e),
            Ok(t) => t,
        };
        if target == path {
            continue;
        }
        tracing::debug!(file = %path.display(), package = %package.name, "package is an in-tree project");
        conversions.push(Conversion {
            relative_path: paths::relative_path_from_file(path, target),
            package,
        });
    }

    let mut changes: Vec<Edit> = if remove_empty_item_groups {
        empty_item_group_removals(&content, &doc, &conversions)
    } else {
        Vec::new()
    };
    if let Some(insertion) = project_reference_insertion(path, &content, &doc, &conversions, &changes)? {
        changes.push(insertion);
    }
    changes.extend(
        conversions
            .iter()
            .map(|c| return Edit::remove(edits::expand_to_lines(&content, c.package.element.clone()))),
    );
    if changes.is_empty() {
        return Ok(false);
    }
    return edits::persist(path, &edits::apply(&content, changes));
}

/// Edit adding the new `ProjectReference` elements: appended to the group
/// holding the first existing project reference, or in a new group right
/// after the one holding the first converted package. `None` when there is
/// nothing to convert.
///
/// # Errors
///
/// Returns `Error::MalformedInput` if the first converted package has no
/// enclosing element.
fn project_reference_insertion(
    path: &Path,
    content: &str,
    doc: &Document,
    conversions: &[Conversion],
    removals: &[Edit],
) -> Result<Option<Edit>, Error> {
    let Some(first) = conversions.first() else {
        return Ok(None);
    };
    let eol = edits::line_ending(content);
    let line = |indent: &str, c: &Conversion| {
        return format!(
            "{indent}<ProjectReference Include=\"{}\" />",
            quick_xml::escape::escape(c.relative_path.as_str())
        );
    };

    let existing = doc
        .named("ProjectReference")
        .find_map(|(_, e)| return Some((e, enclosing(doc, e)?)));
    if let Some((reference, group)) = existing {
        let indent = edits::indentation_at(content, reference.start_tag.start);
        let end = group.end_tag.as_ref().map_or(group.start_tag.end, |t| return t.start);
        let end_line = edits::line_start(content, end);
        if content.get(end_line..end).is_some_and(|before| return before.trim().is_empty()) {
            let mut text = String::new();
            for c in conversions {
                let _ = write!(text, "{}{eol}", line(indent, c));
            }
            return Ok(Some(Edit::insert(end_line, text)));
        }
        let text: String = conversions.iter().map(|c| return line("", c)).collect();
        return Ok(Some(Edit::insert(end, text)));
    }

    let group = doc
        .elements
        .iter()
        .find(|e| return e.start_tag.start == first.package.element.start)
        .and_then(|e| return enclosing(doc, e))
        .ok_or_else(|| return Error::malformed(path, format!("package {} is not inside an element", first.package.name)))?;
    let group_indent = edits::indentation_at(content, group.start_tag.start);
    let item_indent = edits::indentation_at(content, first.package.element.start);
    let mut block = format!("{group_indent}<ItemGroup>{eol}");
    for c in conversions {
        let _ = write!(block, "{}{eol}", line(item_indent, c));
    }
    let _ = write!(block, "{group_indent}</ItemGroup>");

    let after = group.outer().end;
    let next_line = edits::next_line_start(content, after);
    let rest_of_line = content.get(after..next_line).unwrap_or("");
    if !rest_of_line.trim().is_empty() || !rest_of_line.ends_with('\n') {
        return Ok(Some(Edit::insert(after, block)));
    }
    let group_removed = removals
        .iter()
        .any(|r| return r.span.start <= group.start_tag.start && after <= r.span.end);
    let separator = if group_removed { "" } else { eol };
    return Ok(Some(Edit::insert(next_line, format!("{separator}{block}{eol}"))));
}

/// Removals for attribute-less item groups that hold nothing once the
/// converted packages are gone.
fn empty_item_group_removals(content: &str, doc: &Document, conversions: &[Conversion]) -> Vec<Edit> {
    let removed: Vec<std::ops::Range<usize>> = conversions.iter().map(|c| return c.package.element.clone()).collect();
    return doc
        .named("ItemGroup")
        .filter(|(_, group)| return group.attributes.is_empty())
        .filter(|(index, group)| {
            let inner = group.inner();
            let mut cursor = inner.start;
            let mut rest = String::new();
            let mut children: Vec<&Element> = doc.children(*index).map(|(_, e)| return e).collect();
            children.sort_by_key(|e| return e.start_tag.start);
            for child in children {
                if !removed.contains(&child.outer()) {
                    continue;
                }
                rest.push_str(content.get(cursor..child.outer().start).unwrap_or(""));
                cursor = child.outer().end;
            }
            rest.push_str(content.get(cursor..inner.end).unwrap_or(""));
            return rest.trim().is_empty();
        })
        .map(|(_, group)| return Edit::remove(edits::expand_to_lines(content, group.outer())))
        .collect();
}

/// The parent element of `element`.
fn enclosing<'d>(doc: &'d Document, element: &Element) -> Option<&'d Element> {
    return doc.elements.get(element.parent?);
}

/// Internalize packages across `working_dir`.
///
/// # Errors
///
/// See [`PackageInternalizer::new`].
pub fn internalize(working_dir: &Path, config: &Config, remove_empty_item_groups: bool) -> Result<Report, Error> {
    return Ok(PackageInternalizer::new(working_dir, config, remove_empty_item_groups)?.run());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a file, creating parent directories.
    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        return path;
    }

    const EMPTY_PROJECT: &str = "<Project Sdk=\"Microsoft.NET.Sdk\">\n</Project>\n";

    #[test]
    fn package_joins_existing_project_reference_group() {
        let dir = tempfile::tempdir().unwrap();
        let root = paths::absolute(dir.path()).unwrap();
        let core = write(&root, "Core/Core.csproj", EMPTY_PROJECT);
        write(&root, "Util/Util.csproj", EMPTY_PROJECT);
        let app = write(
            &root,
            "App/App.csproj",
            "<Project>\n  <ItemGroup>\n    <PackageReference Include=\"Core\" Version=\"1.0.0\" />\n    <PackageReference Include=\"Serilog\" Version=\"2.0.0\" />\n  </ItemGroup>\n  <ItemGroup>\n    <ProjectReference Include=\"../Util/Util.csproj\" />\n  </ItemGroup>\n</Project>\n",
        );
        let index = ProjectIndex::scan(&root, &Config::default()).unwrap();

        assert!(internalize_project(&app, &index, false).unwrap());
        let text = std::fs::read_to_string(&app).unwrap();
        let relative = paths::relative_path_from_file(&app, &core);
        assert_eq!(
            text,
            format!(
                "<Project>\n  <ItemGroup>\n    <PackageReference Include=\"Serilog\" Version=\"2.0.0\" />\n  </ItemGroup>\n  <ItemGroup>\n    <ProjectReference Include=\"../Util/Util.csproj\" />\n    <ProjectReference Include=\"{relative}\" />\n  </ItemGroup>\n</Project>\n"
            )
        );
        assert!(!internalize_project(&app, &index, false).unwrap());
    }

    #[test]
    fn new_group_follows_the_package_group_and_empty_groups_go() {
        let dir = tempfile::tempdir().unwrap();
        let root = paths::absolute(dir.path()).unwrap();
        let core = write(&root, "Core/Core.csproj", EMPTY_PROJECT);
        let app = write(
            &root,
            "App/App.csproj",
            "<Project>\n\n  <ItemGroup>\n    <PackageReference Include=\"Core\" Version=\"1.0.0\" />\n  </ItemGroup>\n\n</Project>\n",
        );
        let index = ProjectIndex::scan(&root, &Config::default()).unwrap();

        assert!(internalize_project(&app, &index, true).unwrap());
        let text = std::fs::read_to_string(&app).unwrap();
        let relative = paths::relative_path_from_file(&app, &core);
        assert_eq!(
            text,
            format!("<Project>\n\n  <ItemGroup>\n    <ProjectReference Include=\"{relative}\" />\n  </ItemGroup>\n\n</Project>\n")
        );
    }

    #[test]
    fn solutions_gain_transitive_projects() {
        let dir = tempfile::tempdir().unwrap();
        let root = paths::absolute(dir.path()).unwrap();
        write(&root, "Core/Core.csproj", EMPTY_PROJECT);
        write(
            &root,
            "Lib/Lib.csproj",
            "<Project>\n  <ItemGroup>\n    <PackageReference Include=\"Core\" Version=\"1.0.0\" />\n  </ItemGroup>\n</Project>\n",
        );
        write(
            &root,
            "App/App.csproj",
            "<Project>\n  <ItemGroup>\n    <ProjectReference Include=\"../Lib/Lib.csproj\" />\n  </ItemGroup>\n</Project>\n",
        );
        let sln = write(
            &root,
            "All.sln",
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", \"App/App.csproj\", \"{1}\"\nEndProject\nGlobal\nEndGlobal\n",
        );

        let report = internalize(&root, &Config::default(), false).unwrap();
        assert_eq!(report.failed(), 0);

        let text = std::fs::read_to_string(&sln).unwrap();
        let names: Vec<String> = ReferenceExtractor::new()
            .solution_projects(&text)
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names, vec!["App.csproj", "Lib.csproj", "Core.csproj"]);

        let again = internalize(&root, &Config::default(), false).unwrap();
        assert_eq!(again.changed(), 0);
    }

    #[test]
    fn ambiguous_package_name_fails_the_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = paths::absolute(dir.path()).unwrap();
        write(&root, "a/Core/Core.csproj", EMPTY_PROJECT);
        write(&root, "b/Core/Core.csproj", EMPTY_PROJECT);
        let app = write(
            &root,
            "App/App.csproj",
            "<Project>\n  <ItemGroup>\n    <PackageReference Include=\"Core\" Version=\"1.0.0\" />\n  </ItemGroup>\n</Project>\n",
        );
        let index = ProjectIndex::scan(&root, &Config::default()).unwrap();
        assert!(matches!(
            internalize_project(&app, &index, false),
            Err(Error::AmbiguousProject { .. })
        ));
    }
}
