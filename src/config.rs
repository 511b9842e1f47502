use std::path::{Component, Path};

use crate::error::Error;

/// Name of the optional configuration file, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".dotnet-refs.toml";

/// Run configuration loaded from `.dotnet-refs.toml`.
/// Every field has a default so the file is optional.
#[derive(Debug, Clone)]
pub struct Config {
    /// Apply the blank-line convention to rewritten project files.
    pub blank_lines: bool,
    /// Path segments (directory names) skipped while scanning.
    pub exclude: Vec<String>,
    /// Centralize package references declared in shared properties files too.
    pub include_properties: bool,
    /// File name of the central package manifest.
    pub manifest: String,
    /// File name of the shared properties files that define version variables.
    pub properties: String,
}

/// Raw TOML structure for `.dotnet-refs.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    blank_lines: Option<bool>,
    exclude: Option<Vec<String>>,
    include_properties: Option<bool>,
    manifest: Option<String>,
    properties: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            blank_lines: true,
            exclude: vec!["packages".to_string()],
            include_properties: true,
            manifest: "Directory.Packages.props".to_string(),
            properties: "Directory.Build.props".to_string(),
        };
    }
}

impl Config {
    /// Whether any component of `path` is one of the excluded directory names.
    pub fn is_excluded(&self, path: &Path) -> bool {
        return path.components().any(|c| {
            let Component::Normal(segment) = c else {
                return false;
            };
            return self.exclude.iter().any(|e| return segment == e.as_str());
        });
    }

    /// Load config from `.dotnet-refs.toml` in the given directory.
    /// Returns defaults if the file doesn't exist. A file that exists but is
    /// malformed is an error, never a silent fallback.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        return Self::parse(&content);
    }

    /// Parse config TOML, filling unset keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: RawConfig = toml::from_str(content)?;
        let defaults = Self::default();
        return Ok(Self {
            blank_lines: raw.blank_lines.unwrap_or(defaults.blank_lines),
            exclude: raw.exclude.unwrap_or(defaults.exclude),
            include_properties: raw.include_properties.unwrap_or(defaults.include_properties),
            manifest: raw.manifest.unwrap_or(defaults.manifest),
            properties: raw.properties.unwrap_or(defaults.properties),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_package_cache_segments_only() {
        let config = Config::default();
        assert!(config.is_excluded(Path::new("/repo/packages/Foo/Foo.csproj")));
        assert!(!config.is_excluded(Path::new("/repo/src/packages.csproj")));
        assert!(!config.is_excluded(Path::new("/repo/mypackages/Foo.csproj")));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse("exclude = [\"node_modules\", \"packages\"]\n").unwrap();
        assert_eq!(config.exclude, vec!["node_modules", "packages"]);
        assert_eq!(config.manifest, "Directory.Packages.props");
        assert!(config.blank_lines);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(Config::parse("exclud = []\n"), Err(Error::TomlDe(_))));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.include_properties);
        assert_eq!(config.properties, "Directory.Build.props");
    }
}
