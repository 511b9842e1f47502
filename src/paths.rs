//! Lexical path handling: normalization, reference decoding, relative paths.

use std::path::{Component, MAIN_SEPARATOR, MAIN_SEPARATOR_STR, Path, PathBuf};

use crate::error::Error;

/// Make a path absolute against the current directory and collapse `.`/`..`
/// without touching the filesystem (symlinks are left alone).
///
/// # Errors
///
/// Returns `Error::Io` if the current directory cannot be determined.
pub fn absolute(path: &Path) -> Result<PathBuf, Error> {
    return Ok(normalize_path(&std::path::absolute(path)?));
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    return components.iter().collect();
}

/// Handle a single path component during normalization.
/// Pops the last component for `..` when possible, preserves it otherwise.
/// `..` directly under a root stays at the root.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => match components.last() {
            Some(Component::Normal(_)) => {
                components.pop();
            },
            Some(Component::RootDir | Component::Prefix(_)) => {},
            _ => components.push(component),
        },
        other => components.push(other),
    }
}

/// Turn the path text of a reference, as written inside a solution or project
/// file, into a path: MSBuild `%XX` escapes are decoded and both separator
/// styles are accepted.
pub fn reference_to_path(raw: &str) -> PathBuf {
    let decoded = urlencoding::decode(raw).map_or_else(|_| return raw.to_string(), |d| return d.into_owned());
    return PathBuf::from(decoded.replace('\\', "/"));
}

/// Relative path from a directory to a target, rendered with the platform's
/// native separator. Literal `%` is written as `%25` so that reading the
/// reference back decodes to the same name. Both inputs are expected to be
/// absolute and normalized.
pub fn relative_path(from_dir: &Path, to: &Path) -> String {
    let relative = pathdiff::diff_paths(to, from_dir).unwrap_or_else(|| return to.to_path_buf());
    let rendered = relative.to_string_lossy().replace('%', "%25");
    if MAIN_SEPARATOR == '/' {
        return rendered;
    }
    return rendered.replace('/', MAIN_SEPARATOR_STR);
}

/// Relative path from the directory containing `from_file` to `to`.
pub fn relative_path_from_file(from_file: &Path, to: &Path) -> String {
    let from_dir = from_file.parent().unwrap_or_else(|| return Path::new(""));
    return relative_path(from_dir, to);
}

/// Location a reference points at, resolved against the directory it is relative to.
pub fn resolve_reference(base_dir: &Path, raw: &str) -> PathBuf {
    return normalize_path(&base_dir.join(reference_to_path(raw)));
}
