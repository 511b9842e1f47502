//! Version variables defined in shared properties files.
//!
//! A variable is any `PropertyGroup` child whose name ends in `Version`. A
//! `$(Name)` reference resolves to the definition in the nearest enclosing
//! directory of the referencing file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::Error;
use crate::extractor::variable_name;

/// Upper bound on chained `$(A)` -> `$(B)` -> value lookups.
const MAX_INDIRECTIONS: usize = 50;

/// One definition of a version variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionVariable {
    /// Directory of the properties file that defines it.
    pub dir: PathBuf,
    /// Variable name, e.g. `SerilogVersion`.
    pub name: String,
    /// Defined value.
    pub value: String,
}

/// All known version variable definitions, keyed by name.
#[derive(Debug, Default)]
pub struct VersionVariables {
    /// Definitions per name, in the order files were added.
    by_name: HashMap<String, Vec<VersionVariable>>,
}

impl VersionVariables {
    /// Record every version variable defined in a properties file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Xml` if the file is not well-formed XML.
    pub fn add_file(&mut self, file: &Path, content: &str) -> Result<(), Error> {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);
        let mut stack: Vec<String> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::End(_) => {
                    stack.pop();
                },
                Event::Start(start) => {
                    stack.push(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
                },
                Event::Text(text) => {
                    let Some(name) = defining_element(&stack) else {
                        continue;
                    };
                    let value = text.unescape()?.trim().to_string();
                    tracing::debug!(variable = name, %value, file = %file.display(), "version variable");
                    self.by_name.entry(name.to_string()).or_default().push(VersionVariable {
                        dir: dir.clone(),
                        name: name.to_string(),
                        value,
                    });
                },
                _ => {},
            }
        }

        return Ok(());
    }

    /// The definition of `name` visible from `dir`: among definitions whose
    /// directory is an ancestor of (or equal to) `dir`, the deepest one.
    pub fn lookup(&self, name: &str, dir: &Path) -> Option<&VersionVariable> {
        return self
            .by_name
            .get(name)?
            .iter()
            .filter(|v| return dir.starts_with(&v.dir))
            .max_by_key(|v| return v.dir.components().count());
    }

    /// Resolve a raw version as seen from `file`, following chained variables.
    /// Unresolvable references are returned unchanged.
    pub fn resolve(&self, raw: &str, file: &Path) -> String {
        let dir = file.parent().unwrap_or_else(|| return Path::new(""));
        let mut version = raw.to_string();
        for _ in 0..MAX_INDIRECTIONS {
            let Some(name) = variable_name(&version) else {
                break;
            };
            let Some(definition) = self.lookup(name, dir) else {
                tracing::warn!(variable = name, file = %file.display(), "version variable is not defined");
                break;
            };
            version.clone_from(&definition.value);
        }
        return version;
    }
}

/// Name of the variable being defined, when the innermost open element is a
/// `*Version` child of a `PropertyGroup`.
fn defining_element(stack: &[String]) -> Option<&str> {
    let [.., parent, current] = stack else {
        return None;
    };
    if parent == "PropertyGroup" && current.ends_with("Version") {
        return Some(current.as_str());
    }
    return None;
}
