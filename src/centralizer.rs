//! Move package versions out of project files into one central manifest.
//!
//! Every project reachable from a solution (plus, optionally, the shared
//! properties files) is read, package references are grouped by name, one
//! canonical version is chosen per package, and each occurrence is rewritten:
//! the inline version goes away, and where the occurrence used a different
//! version a `VersionOverride` keeps it.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::edits::{self, Edit};
use crate::error::Error;
use crate::extractor::{self, ReferenceExtractor};
use crate::index::ProjectIndex;
use crate::manifest::{self, PackageVersions};
use crate::markup::Document;
use crate::paths;
use crate::report::{Outcome, Report};
use crate::scanner;
use crate::types::{PackageRef, ProjectRef, VersionForm};
use crate::variables::VersionVariables;
use crate::versions::{self, Canonical};

/// One package reference with the version it is in effect at.
#[derive(Debug, Clone)]
struct Occurrence {
    /// Where it is declared.
    package: PackageRef,
    /// Resolved version: inline value, override, or the manifest's.
    version: String,
}

/// A file in scope, read once.
#[derive(Debug)]
struct ScopedFile {
    /// Original text.
    content: String,
    /// Package references found in it.
    occurrences: Vec<Occurrence>,
    /// Absolute path.
    path: PathBuf,
}

/// Entry of the inconsistency report: a package used at several versions.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct InconsistentPackage {
    /// Package name.
    pub package: String,
    /// Distinct versions in the order they were first seen.
    pub versions: Vec<String>,
}

/// Centralizes package versions for one solution.
pub struct DependencyCentralizer<'a> {
    /// Scan and output settings.
    config: &'a Config,
    /// Reference patterns.
    extractor: ReferenceExtractor,
    /// Every project under the working directory.
    index: ProjectIndex,
    /// Shared properties files found under the working directory.
    properties: Vec<PathBuf>,
    /// Outcomes so far.
    report: Report,
    /// The solution entry point.
    solution: PathBuf,
    /// Version variables defined by the properties files.
    variables: VersionVariables,
}

impl<'a> DependencyCentralizer<'a> {
    /// Index the working directory and load version variables.
    /// Properties files that cannot be read are reported and left out.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the working directory cannot be made absolute.
    pub fn new(solution: &Path, working_dir: &Path, config: &'a Config) -> Result<Self, Error> {
        let root = paths::absolute(working_dir)?;
        let mut report = Report::default();
        let mut variables = VersionVariables::default();
        let mut properties = Vec::new();
        for file in scanner::find_named(&root, config, &config.properties) {
            let loaded = std::fs::read_to_string(&file)
                .map_err(Error::from)
                .and_then(|content| return variables.add_file(&file, &content));
            match loaded {
                Err(e) => report.fail(&file, &e),
                Ok(()) => properties.push(file),
            }
        }

        return Ok(Self {
            config,
            extractor: ReferenceExtractor::new(),
            index: ProjectIndex::scan(&root, config)?,
            properties,
            report,
            solution: paths::absolute(solution)?,
            variables,
        });
    }

    /// Centralize and hand back the report.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the solution cannot be read or the manifest
    /// cannot be written, and `Error::XmlDe` if an existing manifest is
    /// unreadable. Problems with single files or references are recorded in
    /// the report instead.
    pub fn run(mut self) -> Result<Report, Error> {
        let solution_content = std::fs::read_to_string(&self.solution)?;
        let solution_dir = self.solution.parent().unwrap_or_else(|| return Path::new("")).to_path_buf();
        let manifest_path = solution_dir.join(&self.config.manifest);
        let existing = manifest::read(&manifest_path)?.unwrap_or_default();

        let mut scope = self.project_closure(&solution_content);
        if self.config.include_properties {
            scope.extend(self.properties.iter().cloned());
        }
        let files: Vec<ScopedFile> = scope
            .into_iter()
            .filter_map(|path| return self.read_scoped(path, &existing))
            .collect();

        let groups = group_versions(&files);
        let mut chosen: BTreeMap<String, Canonical> = BTreeMap::new();
        for (name, seen) in &groups {
            let Some(canonical) = versions::canonical(seen) else {
                continue;
            };
            self.note_choice(name, seen, &canonical);
            chosen.insert(name.clone(), canonical);
        }

        for file in &files {
            self.rewrite(file, &chosen);
        }

        let pinned: PackageVersions = chosen
            .iter()
            .map(|(name, canonical)| return (name.clone(), canonical.version().to_string()))
            .collect();
        let mut text = manifest::render(&pinned, edits::line_ending(&solution_content));
        if self.config.blank_lines {
            text = edits::normalize_blank_lines(&text);
        }
        let outcome = if edits::persist(&manifest_path, &text)? { Outcome::Written } else { Outcome::Unchanged };
        self.report.record(&manifest_path, outcome);

        let inconsistent = inconsistent_packages(&groups);
        self.report.note(format!("{} packages have a non-consistent version.", inconsistent.len()));
        if !inconsistent.is_empty() {
            self.report.note(serde_json::to_string_pretty(&inconsistent)?);
        }
        return Ok(self.report);
    }

    /// Report the version chosen for one package.
    fn note_choice(&mut self, name: &str, seen: &[String], canonical: &Canonical) {
        let version = canonical.version();
        if seen.len() == 1 {
            self.report.note(format!("Centralised {name} @ {version}."));
        } else {
            let others: Vec<&str> = seen.iter().map(String::as_str).filter(|v| return *v != version).collect();
            self.report.note(format!(
                "Centralised {name} @ {version}, however multiple versions were used for this package so version \
                 overrides were put in place for the following other versions: {}.",
                others.join(", ")
            ));
        }
        if canonical.needs_manual_fix() {
            self.report.warn(format!(
                "All versions for {name} were variable/wildcard, so {version} was chosen as the central version. \
                 Variable/wildcard versions aren't allowed in central package management; fix it by hand in {} \
                 before restoring.",
                self.config.manifest
            ));
        }
    }

    /// Projects reachable from the solution's members, members first, each
    /// once. References that cannot be resolved are reported and skipped.
    fn project_closure(&mut self, solution_content: &str) -> Vec<PathBuf> {
        let mut scope: Vec<PathBuf> = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let members = self.extractor.solution_projects(solution_content);
        let solution = self.solution.clone();
        self.enqueue(&solution, &members, &mut scope, &mut seen);

        let mut next = 0;
        while let Some(project) = scope.get(next).cloned() {
            next = next.saturating_add(1);
            let Ok(content) = std::fs::read_to_string(&project) else {
                continue;
            };
            let references = self.extractor.project_references(&content);
            self.enqueue(&project, &references, &mut scope, &mut seen);
        }
        return scope;
    }

    /// Resolve references from `from` and append the unseen targets.
    fn enqueue(
        &mut self,
        from: &Path,
        references: &[ProjectRef],
        scope: &mut Vec<PathBuf>,
        seen: &mut HashSet<PathBuf>,
    ) {
        for reference in references {
            match self.index.resolve(&reference.file_name) {
                Err(e) => self.report.warn(format!("{}: {e}", from.display())),
                Ok(target) => {
                    if seen.insert(target.to_path_buf()) {
                        scope.push(target.to_path_buf());
                    }
                },
            }
        }
    }

    /// Read and parse one file in scope, collecting its package references.
    /// Returns `None` (after reporting) if the file is unusable.
    fn read_scoped(&mut self, path: PathBuf, existing: &PackageVersions) -> Option<ScopedFile> {
        let parsed = std::fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|content| return Document::parse(&path, &content).map(|doc| return (content, doc)));
        let (content, doc) = match parsed {
            Err(e) => {
                self.report.fail(&path, &e);
                return None;
            },
            Ok(pair) => pair,
        };

        let mut occurrences = Vec::new();
        for found in extractor::package_references(&path, &content, &doc) {
            let occurrence = found.and_then(|package| return self.occurrence(&path, package, existing));
            match occurrence {
                Err(e) => self.report.warn(format!("skipped package reference: {e}")),
                Ok(o) => occurrences.push(o),
            }
        }
        return Some(ScopedFile {
            content,
            occurrences,
            path,
        });
    }

    /// Determine the version a reference is in effect at.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedInput` if neither the reference nor the
    /// existing manifest gives a version.
    fn occurrence(&self, path: &Path, package: PackageRef, existing: &PackageVersions) -> Result<Occurrence, Error> {
        let raw = match &package.version {
            Some(site) => site.value.clone(),
            None => existing.get(&package.name).cloned().ok_or_else(|| {
                return Error::malformed(path, format!("no version found for package {}", package.name));
            })?,
        };
        let version = self.variables.resolve(&raw, path);
        tracing::debug!(file = %path.display(), package = %package.name, %raw, %version, "package reference");
        return Ok(Occurrence { package, version });
    }

    /// Apply the version edits to one file and record the outcome.
    fn rewrite(&mut self, file: &ScopedFile, chosen: &BTreeMap<String, Canonical>) {
        let edits: Vec<Edit> = file
            .occurrences
            .iter()
            .filter_map(|o| {
                let canonical = chosen.get(&o.package.name)?;
                return occurrence_edit(&file.content, o, canonical.version());
            })
            .collect();
        if edits.is_empty() {
            self.report.record(&file.path, Outcome::Unchanged);
            return;
        }

        let mut updated = edits::apply(&file.content, edits);
        if self.config.blank_lines {
            updated = edits::normalize_blank_lines(&updated);
        }
        match edits::persist(&file.path, &updated) {
            Err(e) => self.report.fail(&file.path, &e),
            Ok(false) => self.report.record(&file.path, Outcome::Unchanged),
            Ok(true) => {
                tracing::info!(file = %file.path.display(), "centralized package versions");
                self.report.record(&file.path, Outcome::Fixed);
            },
        }
    }
}

/// Distinct versions per package, in first-seen order.
fn group_versions(files: &[ScopedFile]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for occurrence in files.iter().flat_map(|f| return &f.occurrences) {
        let seen = groups.entry(occurrence.package.name.clone()).or_default();
        if !seen.contains(&occurrence.version) {
            seen.push(occurrence.version.clone());
        }
    }
    return groups;
}

/// Packages used at more than one version, sorted by name.
fn inconsistent_packages(groups: &BTreeMap<String, Vec<String>>) -> Vec<InconsistentPackage> {
    return groups
        .iter()
        .filter(|(_, seen)| return seen.len() > 1)
        .map(|(name, seen)| {
            return InconsistentPackage {
                package: name.clone(),
                versions: seen.clone(),
            };
        })
        .collect();
}

/// The edit that leaves an occurrence relying on the manifest, or overriding
/// it when its version differs from the canonical one. `None` when the text
/// is already in that shape.
fn occurrence_edit(content: &str, occurrence: &Occurrence, canonical: &str) -> Option<Edit> {
    let needs_override = occurrence.version != canonical;
    let edit = match (&occurrence.package.version, needs_override) {
        (None, false) => return None,
        (None, true) => Edit::insert(
            occurrence.package.attributes_end,
            format!(" VersionOverride=\"{}\"", quick_xml::escape::escape(occurrence.version.as_str())),
        ),
        (Some(site), true) => Edit::replace(site.span.clone(), site.override_text(&occurrence.version)),
        (Some(site), false) => match site.form {
            VersionForm::Attribute => Edit::remove(site.span.clone()),
            VersionForm::Element => Edit::remove(edits::expand_to_lines(content, site.span.clone())),
        },
    };
    if content.get(edit.span.clone()) == Some(edit.replacement.as_str()) {
        return None;
    }
    return Some(edit);
}

/// Centralize the packages of `solution`, scanning `working_dir`.
///
/// # Errors
///
/// See [`DependencyCentralizer::new`] and [`DependencyCentralizer::run`].
pub fn centralize(solution: &Path, working_dir: &Path, config: &Config) -> Result<Report, Error> {
    return DependencyCentralizer::new(solution, working_dir, config)?.run();
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

    const SOLUTION: &str = "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"A\", \"A\\A.csproj\", \"{1}\"\n\
EndProject\n\
Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"B\", \"B\\B.csproj\", \"{2}\"\n\
EndProject\n\
Global\n\
EndGlobal\n";

    const PROJECT_A: &str = r#"<Project Sdk="Microsoft.NET.Sdk">

  <ItemGroup>
    <PackageReference Include="Serilog" Version="1.2.3" />
    <PackageReference Include="Polly">
      <Version>$(PollyVersion)</Version>
    </PackageReference>
    <ProjectReference Include="..\C\C.csproj" />
  </ItemGroup>

</Project>
"#;

    const PROJECT_B: &str = r#"<Project Sdk="Microsoft.NET.Sdk">

  <ItemGroup>
    <PackageReference Include="Serilog" Version="1.2.10" />
  </ItemGroup>

</Project>
"#;

    const PROJECT_C: &str = r#"<Project Sdk="Microsoft.NET.Sdk">

  <ItemGroup>
    <PackageReference Include="Dapper" Version="*" />
  </ItemGroup>

</Project>
"#;

    const PROPS: &str = r#"<Project>

  <PropertyGroup>
    <PollyVersion>7.2.3</PollyVersion>
  </PropertyGroup>

</Project>
"#;

    /// A solution with two members, one transitive project and a properties file.
    fn tree() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = paths::absolute(dir.path()).unwrap();
        write(&root, "All.sln", SOLUTION);
        write(&root, "A/A.csproj", PROJECT_A);
        write(&root, "B/B.csproj", PROJECT_B);
        write(&root, "C/C.csproj", PROJECT_C);
        write(&root, "Directory.Build.props", PROPS);
        return (dir, root);
    }

    #[test]
    fn highest_version_goes_to_manifest_and_others_get_overrides() {
        let (_dir, root) = tree();
        let config = Config::default();
        let report = centralize(&root.join("All.sln"), &root, &config).unwrap();
        assert_eq!(report.failed(), 0);

        let pinned = manifest::read(&root.join("Directory.Packages.props")).unwrap().unwrap();
        assert_eq!(pinned.get("Serilog").map(String::as_str), Some("1.2.10"));
        assert_eq!(pinned.get("Polly").map(String::as_str), Some("7.2.3"));
        assert_eq!(pinned.get("Dapper").map(String::as_str), Some("*"));

        let a = std::fs::read_to_string(root.join("A/A.csproj")).unwrap();
        assert!(a.contains(r#"<PackageReference Include="Serilog" VersionOverride="1.2.3" />"#));
        assert!(!a.contains("<Version>"));
        let b = std::fs::read_to_string(root.join("B/B.csproj")).unwrap();
        assert!(b.contains(r#"<PackageReference Include="Serilog" />"#));

        assert!(report.warnings.iter().any(|w| w.contains("Dapper")));
        assert!(report.notes.iter().any(|n| n.contains("\"package\": \"Serilog\"")));
    }

    #[test]
    fn second_run_changes_nothing() {
        let (_dir, root) = tree();
        let config = Config::default();
        centralize(&root.join("All.sln"), &root, &config).unwrap();
        let again = centralize(&root.join("All.sln"), &root, &config).unwrap();
        assert_eq!(again.changed(), 0);
        assert_eq!(again.failed(), 0);

        for project in ["A/A.csproj", "B/B.csproj", "C/C.csproj"] {
            let path = root.join(project);
            let content = std::fs::read_to_string(&path).unwrap();
            let doc = Document::parse(&path, &content).unwrap();
            for package in extractor::package_references(&path, &content, &doc) {
                let package = package.unwrap();
                if let Some(site) = package.version {
                    assert_eq!(site.key, "VersionOverride");
                }
            }
        }
    }

    #[test]
    fn reference_without_any_version_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = paths::absolute(dir.path()).unwrap();
        write(&root, "All.sln", SOLUTION);
        write(&root, "A/A.csproj", "<Project>\n  <ItemGroup>\n    <PackageReference Include=\"Moq\" />\n  </ItemGroup>\n</Project>\n");
        write(&root, "B/B.csproj", PROJECT_B);

        let report = centralize(&root.join("All.sln"), &root, &Config::default()).unwrap();
        assert!(report.warnings.iter().any(|w| w.contains("Moq")));
        let pinned = manifest::read(&root.join("Directory.Packages.props")).unwrap().unwrap();
        assert!(!pinned.contains_key("Moq"));
    }

    #[test]
    fn element_form_override_keeps_its_form() {
        let content = "<Project>\n  <ItemGroup>\n    <PackageReference Include=\"Polly\">\n      <Version>6.0.0</Version>\n    </PackageReference>\n  </ItemGroup>\n</Project>\n";
        let path = Path::new("A.csproj");
        let doc = Document::parse(path, content).unwrap();
        let package = extractor::package_references(path, content, &doc).remove(0).unwrap();
        let occurrence = Occurrence {
            package,
            version: "6.0.0".to_string(),
        };

        let edit = occurrence_edit(content, &occurrence, "7.0.0").unwrap();
        let updated = edits::apply(content, vec![edit]);
        assert!(updated.contains("      <VersionOverride>6.0.0</VersionOverride>\n"));

        let removed = edits::apply(content, vec![occurrence_edit(content, &occurrence, "6.0.0").unwrap()]);
        assert_eq!(
            removed,
            "<Project>\n  <ItemGroup>\n    <PackageReference Include=\"Polly\">\n    </PackageReference>\n  </ItemGroup>\n</Project>\n"
        );
    }

    #[test]
    fn inconsistent_report_lists_only_multi_version_packages() {
        let mut groups = BTreeMap::new();
        groups.insert("A".to_string(), vec!["1.0.0".to_string()]);
        groups.insert("B".to_string(), vec!["1.0.0".to_string(), "2.0.0".to_string()]);
        assert_eq!(
            inconsistent_packages(&groups),
            vec![InconsistentPackage {
                package: "B".to_string(),
                versions: vec!["1.0.0".to_string(), "2.0.0".to_string()],
            }]
        );
    }
}
