//! Picking one canonical version out of the versions a package is used at.

/// The version chosen for a package and how it was arrived at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    /// Every candidate was a wildcard or variable; the first one seen was kept.
    FirstSeen(String),
    /// The highest of several concrete versions.
    Highest(String),
    /// Only one distinct version was in use.
    Single(String),
}

impl Canonical {
    /// Whether the chosen value is floating and cannot go into a central manifest as-is.
    pub fn needs_manual_fix(&self) -> bool {
        return is_floating(self.version());
    }

    /// The chosen version string.
    pub fn version(&self) -> &str {
        return match self {
            Self::FirstSeen(v) | Self::Highest(v) | Self::Single(v) => v,
        };
    }
}

/// Choose the canonical version among distinct versions listed in first-seen order.
///
/// Concrete candidates are compared as semantic versions when any of them
/// parse as such; otherwise as dot-separated integers, only against
/// candidates with the same number of segments. Ties keep the earlier value.
/// Returns `None` for an empty list.
pub fn canonical(versions: &[String]) -> Option<Canonical> {
    let first = versions.first()?;
    if versions.len() == 1 {
        return Some(Canonical::Single(first.clone()));
    }

    let concrete: Vec<&String> = versions.iter().filter(|v| return !is_floating(v)).collect();
    if let Some(best) = highest_semver(&concrete).or_else(|| return highest_numeric(&concrete)) {
        return Some(Canonical::Highest(best.clone()));
    }
    return Some(Canonical::FirstSeen(first.clone()));
}

/// Highest candidate that parses as a strict semantic version.
fn highest_semver<'a>(candidates: &[&'a String]) -> Option<&'a String> {
    let mut best: Option<(&String, semver::Version)> = None;
    for candidate in candidates {
        let Some(parsed) = precedence_version(candidate) else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, current)| return parsed > *current) {
            best = Some((candidate, parsed));
        }
    }
    return best.map(|(v, _)| return v);
}

/// Highest candidate by integer segments; candidates whose segment count
/// differs from the current best are not compared.
fn highest_numeric<'a>(candidates: &[&'a String]) -> Option<&'a String> {
    let mut best: Option<(&String, Vec<u64>)> = None;
    for candidate in candidates {
        let Some(segments) = numeric_segments(candidate) else {
            continue;
        };
        let replace = match &best {
            None => true,
            Some((_, current)) => current.len() == segments.len() && segments > *current,
        };
        if replace {
            best = Some((candidate, segments));
        }
    }
    return best.map(|(v, _)| return v);
}

/// Whether a version is a wildcard, caret range, or unresolved variable.
pub fn is_floating(version: &str) -> bool {
    return version.contains('*') || version.starts_with('^') || version.starts_with('$');
}

/// Dot-separated integer segments, ignoring `+build` metadata.
fn numeric_segments(version: &str) -> Option<Vec<u64>> {
    let core = version.split_once('+').map_or(version, |(core, _)| return core);
    return core.split('.').map(|s| return s.trim().parse::<u64>().ok()).collect();
}

/// Parse a strict semantic version with build metadata cleared so ordering
/// follows precedence rules.
fn precedence_version(version: &str) -> Option<semver::Version> {
    let mut parsed = semver::Version::parse(version.trim()).ok()?;
    parsed.build = semver::BuildMetadata::EMPTY;
    return Some(parsed);
}
