//! Reference extraction from solution and project files.
//!
//! Extraction never mutates the source: it returns records, in first-occurrence
//! order, that carry the byte span needed to rewrite them later.

use std::path::Path;

use regex::Regex;

use crate::error::Error;
use crate::markup::{Document, Element};
use crate::types::{PackageRef, ProjectRef, VersionForm, VersionSite};

/// Project path inside a solution's `Project(...) = "Name", "<path>", "{guid}"` line.
const SOLUTION_PROJECT_PATTERN: &str = r#", "([^"\r\n]*\.csproj)""#;

/// Project path inside an `Include="<path>.csproj"` attribute.
const PROJECT_INCLUDE_PATTERN: &str = r#"Include="([^"\r\n]*\.csproj)""#;

/// Compiled patterns for locating project references in solution and project text.
pub struct ReferenceExtractor {
    /// Matches the `Include` attribute of project-to-project references.
    project_include: Regex,
    /// Matches the path segment of solution member lines.
    solution_project: Regex,
}

impl ReferenceExtractor {
    /// Compile the reference patterns.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded patterns are invalid (compile-time invariant).
    pub fn new() -> Self {
        return Self {
            project_include: Regex::new(PROJECT_INCLUDE_PATTERN).expect("valid regex"),
            solution_project: Regex::new(SOLUTION_PROJECT_PATTERN).expect("valid regex"),
        };
    }

    /// Project-to-project references declared in a project file.
    pub fn project_references(&self, content: &str) -> Vec<ProjectRef> {
        return collect_project_refs(&self.project_include, content);
    }

    /// Member projects listed by a solution file.
    pub fn solution_projects(&self, content: &str) -> Vec<ProjectRef> {
        return collect_project_refs(&self.solution_project, content);
    }
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        return Self::new();
    }
}

/// Run a pattern whose first group is the project path.
fn collect_project_refs(pattern: &Regex, content: &str) -> Vec<ProjectRef> {
    return pattern
        .captures_iter(content)
        .filter_map(|cap| {
            let path = cap.get(1)?;
            return Some(ProjectRef {
                file_name: reference_file_name(path.as_str()),
                raw: path.as_str().to_string(),
                span: path.range(),
            });
        })
        .collect();
}

/// Every `PackageReference` in a parsed project or properties file, in document order.
/// Each entry is either a package record or the reason that element is unusable.
pub fn package_references(file: &Path, content: &str, doc: &Document) -> Vec<Result<PackageRef, Error>> {
    return doc
        .named("PackageReference")
        .map(|(index, element)| return package_reference(file, content, doc, index, element))
        .collect();
}

/// Build one package record from its element.
///
/// # Errors
///
/// Returns `Error::MalformedInput` if the package name is missing.
fn package_reference(
    file: &Path,
    content: &str,
    doc: &Document,
    index: usize,
    element: &Element,
) -> Result<PackageRef, Error> {
    let name = element
        .attribute("Include")
        .map(|a| return a.value.trim().to_string())
        .or_else(|| return child_text(content, doc, index, "Include"))
        .filter(|n| return !n.is_empty())
        .ok_or_else(|| {
            return Error::malformed(file, format!("PackageReference at byte {} has no Include", element.start_tag.start));
        })?;

    let version = ["Version", "VersionOverride"]
        .into_iter()
        .find_map(|key| return version_site(content, doc, index, element, key));

    return Ok(PackageRef {
        attributes_end: element.attributes_end,
        element: element.outer(),
        name,
        version,
    });
}

/// Text of the first direct child element with the given local name.
fn child_text(content: &str, doc: &Document, index: usize, name: &str) -> Option<String> {
    let (child, _) = doc.children(index).find(|(_, c)| return c.local_name() == name)?;
    return doc.text(content, child);
}

/// Locate an inline version declared as attribute `key` or child element `key`.
fn version_site(content: &str, doc: &Document, index: usize, element: &Element, key: &str) -> Option<VersionSite> {
    if let Some(attribute) = element.attribute(key) {
        return Some(VersionSite {
            form: VersionForm::Attribute,
            key: key.to_string(),
            span: attribute.span.clone(),
            value: attribute.value.trim().to_string(),
        });
    }
    let (child, child_element) = doc.children(index).find(|(_, c)| return c.local_name() == key)?;
    return Some(VersionSite {
        form: VersionForm::Element,
        key: key.to_string(),
        span: child_element.outer(),
        value: doc.text(content, child)?,
    });
}

/// Bare file name of a reference path: escapes decoded, either separator
/// accepted, surrounding quotes stripped.
pub fn reference_file_name(raw: &str) -> String {
    let path = crate::paths::reference_to_path(raw.trim_matches('"'));
    return path
        .file_name()
        .map_or_else(|| return raw.to_string(), |n| return n.to_string_lossy().into_owned());
}

/// If `version` is a `$(Name)` reference, the variable name.
pub fn variable_name(version: &str) -> Option<&str> {
    return version.strip_prefix("$(")?.strip_suffix(')').map(str::trim);
}
