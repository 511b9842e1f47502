use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;

/// Extension of project files.
pub const PROJECT_EXTENSION: &str = "csproj";

/// Extension of solution files.
pub const SOLUTION_EXTENSION: &str = "sln";

/// Extension of solution filter files.
pub const SOLUTION_FILTER_EXTENSION: &str = "slnf";

/// Recursively find files under `root` accepted by `keep`, skipping any path
/// that crosses an excluded directory. Unreadable entries are skipped.
/// Returned paths are sorted for deterministic processing order.
fn find(root: &Path, config: &Config, keep: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            let relative = e.path().strip_prefix(root).unwrap_or_else(|_| return e.path());
            return !config.is_excluded(relative);
        })
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file() && keep(e.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();
    found.sort();
    return found;
}

/// Every file under `root` whose name is exactly `file_name`.
pub fn find_named(root: &Path, config: &Config, file_name: &str) -> Vec<PathBuf> {
    return find(root, config, |p| return p.file_name().is_some_and(|n| return n == file_name));
}

/// Every project file under `root`.
pub fn find_projects(root: &Path, config: &Config) -> Vec<PathBuf> {
    return find(root, config, |p| return has_extension(p, PROJECT_EXTENSION));
}

/// Every solution file under `root`.
pub fn find_solutions(root: &Path, config: &Config) -> Vec<PathBuf> {
    return find(root, config, |p| return has_extension(p, SOLUTION_EXTENSION));
}

/// Case-sensitive extension check.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    return path.extension().is_some_and(|ext| return ext == extension);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create an empty file, making parent directories as needed.
    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn finds_projects_sorted_and_skips_package_cache() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/B/B.csproj");
        touch(dir.path(), "src/A/A.csproj");
        touch(dir.path(), "packages/Vendor/Vendor.csproj");
        touch(dir.path(), "src/A/A.cs");

        let found = find_projects(dir.path(), &Config::default());
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("src/A/A.csproj"), PathBuf::from("src/B/B.csproj")]);
    }

    #[test]
    fn exclusion_is_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("packages");
        touch(&root, "App/App.csproj");

        let found = find_projects(&root, &Config::default());
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn finds_named_properties_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Directory.Build.props");
        touch(dir.path(), "src/Directory.Build.props");
        touch(dir.path(), "src/Other.props");

        let found = find_named(dir.path(), &Config::default(), "Directory.Build.props");
        assert_eq!(found.len(), 2);
    }
}
