//! Central package manifest: rendering and reading `Directory.Packages.props`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// Package name to canonical version, sorted by name.
pub type PackageVersions = BTreeMap<String, String>;

/// Root of an existing manifest. Only the parts read back are modelled.
#[derive(Debug, Deserialize)]
struct RawManifest {
    /// Item groups holding `PackageVersion` entries.
    #[serde(rename = "ItemGroup", default)]
    item_groups: Vec<RawItemGroup>,
}

/// One `<ItemGroup>` of the manifest.
#[derive(Debug, Deserialize)]
struct RawItemGroup {
    /// Declared package versions.
    #[serde(rename = "PackageVersion", default)]
    package_versions: Vec<RawPackageVersion>,
}

/// One `<PackageVersion Include=".." Version=".." />` entry.
#[derive(Debug, Deserialize)]
struct RawPackageVersion {
    /// Package name.
    #[serde(rename = "@Include")]
    include: String,
    /// Declared version; entries without one are ignored.
    #[serde(rename = "@Version", default)]
    version: Option<String>,
}

/// Parse the package versions declared by manifest text. A package listed
/// twice keeps its first version.
///
/// # Errors
///
/// Returns `Error::XmlDe` if the text is not a readable manifest.
pub fn parse(content: &str) -> Result<PackageVersions, Error> {
    let raw: RawManifest = quick_xml::de::from_str(content)?;
    let mut versions = PackageVersions::new();
    for entry in raw.item_groups.into_iter().flat_map(|g| return g.package_versions) {
        let Some(version) = entry.version else {
            continue;
        };
        versions.entry(entry.include.trim().to_string()).or_insert_with(|| return version.trim().to_string());
    }
    return Ok(versions);
}

/// Read the manifest at `path`, or `None` if there is none yet.
///
/// # Errors
///
/// Returns `Error::Io` for read failures other than not-found,
/// or `Error::XmlDe` if the existing file cannot be parsed.
pub fn read(path: &Path) -> Result<Option<PackageVersions>, Error> {
    let content = match std::fs::read_to_string(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
        Ok(c) => c,
    };
    return parse(&content).map(Some);
}

/// Render a manifest that turns on central package management and pins
/// every package to the given version.
pub fn render(versions: &PackageVersions, eol: &str) -> String {
    let mut out = String::new();
    let _ = write!(out, "<Project>{eol}");
    let _ = write!(out, "  <PropertyGroup>{eol}");
    let _ = write!(
        out,
        "    <ManagePackageVersionsCentrally>true</ManagePackageVersionsCentrally>{eol}"
    );
    let _ = write!(out, "  </PropertyGroup>{eol}");
    let _ = write!(out, "  <ItemGroup>{eol}");
    for (name, version) in versions {
        let _ = write!(
            out,
            "    <PackageVersion Include=\"{}\" Version=\"{}\" />{eol}",
            quick_xml::escape::escape(name.as_str()),
            quick_xml::escape::escape(version.as_str()),
        );
    }
    let _ = write!(out, "  </ItemGroup>{eol}");
    let _ = write!(out, "</Project>{eol}");
    return out;
}
