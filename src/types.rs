/// Core domain types: references located inside solution and project files.
use std::ops::Range;

/// A reference to another project, located in the text of a solution or
/// project file. Only `span` is ever rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    /// Bare file name of the target, the lookup key into the project index.
    pub file_name: String,
    /// Path text exactly as written between the quotes.
    pub raw: String,
    /// Byte range of `raw` in the containing file.
    pub span: Range<usize>,
}

/// A package dependency declared by a `PackageReference` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    /// Offset where a new attribute can be inserted into the start tag.
    pub attributes_end: usize,
    /// Byte range of the whole element.
    pub element: Range<usize>,
    /// Package name from the `Include` attribute or child element.
    pub name: String,
    /// Where the version is declared inline; `None` when centrally managed.
    pub version: Option<VersionSite>,
}

/// The inline declaration of a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSite {
    /// Attribute or child element.
    pub form: VersionForm,
    /// `Version` or `VersionOverride`.
    pub key: String,
    /// Byte range of the attribute (with its leading whitespace) or of the whole child element.
    pub span: Range<usize>,
    /// Version text as written; may be a `$(Variable)` reference.
    pub value: String,
}

/// How a version is written inside a `PackageReference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionForm {
    /// `Version="1.2.3"` on the element itself.
    Attribute,
    /// `<Version>1.2.3</Version>` nested inside the element.
    Element,
}

impl VersionSite {
    /// Text declaring `version` as an override in the same form as this site.
    pub fn override_text(&self, version: &str) -> String {
        let escaped = quick_xml::escape::escape(version);
        return match self.form {
            VersionForm::Attribute => format!(" VersionOverride=\"{escaped}\""),
            VersionForm::Element => format!("<VersionOverride>{escaped}</VersionOverride>"),
        };
    }
}
