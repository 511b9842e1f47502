/// Crate-level error types for dotnet-refs diagnostics.
use std::path::PathBuf;

/// Exit code for anything not covered by a more specific code.
pub const EXIT_UNKNOWN: u8 = 1;

/// Exit code for an unrecognised mode argument.
pub const EXIT_INVALID_MODE: u8 = 10;

/// Exit code for a missing or unusable entry point.
pub const EXIT_INVALID_ENTRY_POINT: u8 = 20;

/// Exit code for a missing or unusable working directory.
pub const EXIT_INVALID_WORKING_DIRECTORY: u8 = 30;

/// All errors in dotnet-refs carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the file, project, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two or more project files share the requested file name.
    #[error(
        "ambiguous project: `{name}` matches {}",
        candidates.iter().map(|p| return p.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    AmbiguousProject {
        /// Every path whose file name matched.
        candidates: Vec<PathBuf>,
        /// Bare project file name that was looked up.
        name: String,
    },

    /// A relocation target is already taken by a different file.
    #[error("cannot move {} to {}: destination already exists", from.display(), to.display())]
    DestinationOccupied {
        /// Current location of the project file.
        from: PathBuf,
        /// Location the topology asks for.
        to: PathBuf,
    },

    /// The entry point argument is missing, does not exist, or has the wrong kind.
    #[error("invalid entry point {}: {reason}", path.display())]
    InvalidEntryPoint {
        /// Entry point as given (joined onto the working directory).
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// The mode argument is not one of the known modes.
    #[error("invalid mode: `{mode}`")]
    InvalidMode {
        /// Mode string as given on the command line.
        mode: String,
    },

    /// The working directory does not exist or is not a directory.
    #[error("invalid working directory: {}", path.display())]
    InvalidWorkingDirectory {
        /// Working directory as given.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON (solution filter) deserialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// A file is missing an expected attribute or element, or is not well-formed.
    #[error("malformed input: {}: {reason}", file.display())]
    MalformedInput {
        /// File containing the problem.
        file: PathBuf,
        /// Description of what was expected.
        reason: String,
    },

    /// No project file in the tree has the requested file name.
    #[error("project not found: `{name}`")]
    ProjectNotFound {
        /// Bare project file name that was looked up.
        name: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The XML reader rejected a properties file.
    #[error("xml: {0}")]
    Xml(
        /// The wrapped reader error.
        #[from]
        quick_xml::Error,
    ),

    /// An existing central manifest could not be deserialized.
    #[error("xml deserialize: {0}")]
    XmlDe(
        /// The wrapped deserialization error.
        #[from]
        quick_xml::DeError,
    ),
}

impl Error {
    /// Process exit code for a run that ends with this error.
    pub const fn exit_code(&self) -> u8 {
        return match self {
            Self::InvalidMode { .. } => EXIT_INVALID_MODE,
            Self::InvalidEntryPoint { .. } => EXIT_INVALID_ENTRY_POINT,
            Self::InvalidWorkingDirectory { .. } => EXIT_INVALID_WORKING_DIRECTORY,
            _ => EXIT_UNKNOWN,
        };
    }

    /// Shorthand for a `MalformedInput` error.
    pub fn malformed(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        return Self::MalformedInput {
            file: file.into(),
            reason: reason.into(),
        };
    }
}
