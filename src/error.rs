//! Error types for gococo
//!
//! All modules use `GococoResult<T>` as their return type. Every error is
//! fatal to the invocation; [`GococoError::kind`] groups them for reporting.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for gococo operations
pub type GococoResult<T> = Result<T, GococoError>;

/// All errors that can occur in gococo
#[derive(Error, Debug)]
pub enum GococoError {
    // Configuration errors
    #[error("Not a recognized module project: no go.work or go.mod found from {0}")]
    NotModuleProject(PathBuf),

    #[error("Working directory {work_dir} is outside the project root {root}")]
    OutsideProject { work_dir: PathBuf, root: PathBuf },

    #[error("Workspace member {member} lies outside the project root {root}")]
    MemberOutsideProject { member: PathBuf, root: PathBuf },

    #[error("File {0} is not in the project directory and cannot be mirrored")]
    FileOutsideProject(PathBuf),

    #[error("File {0:?} cannot be recorded in the cache digest: name is not UTF-8 or has a line break")]
    UnrecordablePath(PathBuf),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid build arguments: {0}")]
    InvalidArgs(String),

    #[error("Cache directory {0:?} must be a single directory name under the project root")]
    InvalidCacheDir(String),

    // Toolchain errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    #[error("Listing package {import_path} failed: {reason}")]
    PackageList { import_path: String, reason: String },

    #[error("Package {import_path} belongs to module {found}, expected {expected}")]
    ForeignPackage {
        import_path: String,
        found: String,
        expected: String,
    },

    #[error("Package {0} is listed more than once")]
    DuplicatePackage(String),

    #[error("Package {import_path} reached from {entry} is missing from the package map")]
    UnresolvedPackage { import_path: String, entry: String },

    #[error("Annotating {path} failed: {reason}")]
    Annotate { path: PathBuf, reason: String },

    #[error("go {verb} failed with {status}:\n{output}")]
    BuildFailed {
        verb: String,
        status: String,
        output: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed line in digest file {path}: {line}")]
    DigestFormat { path: PathBuf, line: String },

    // Lock errors
    #[error("Timed out after {timeout:?} waiting for the compile lock {path}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("Failed to acquire the compile lock {path}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors
    #[error("{path}:{line}: {reason}")]
    Manifest {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// Error taxonomy used when reporting a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Project layout or invocation is not usable
    Configuration,
    /// The Go toolchain or annotator failed or disagreed with itself
    Toolchain,
    /// Filesystem failure on the project, shadow cache or digest
    Io,
    /// The compile lock could not be acquired
    Lock,
    /// A go.mod or go.work file is malformed
    Parse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Toolchain => "toolchain",
            Self::Io => "io",
            Self::Lock => "lock",
            Self::Parse => "parse",
        };
        write!(f, "{}", name)
    }
}

impl GococoError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a manifest parse error
    pub fn manifest(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotModuleProject(_)
            | Self::OutsideProject { .. }
            | Self::MemberOutsideProject { .. }
            | Self::FileOutsideProject(_)
            | Self::UnrecordablePath(_)
            | Self::ConfigInvalid { .. }
            | Self::InvalidArgs(_)
            | Self::InvalidCacheDir(_) => ErrorKind::Configuration,
            Self::CommandFailed { .. }
            | Self::CommandExecution { .. }
            | Self::PackageList { .. }
            | Self::ForeignPackage { .. }
            | Self::DuplicatePackage(_)
            | Self::UnresolvedPackage { .. }
            | Self::Annotate { .. }
            | Self::BuildFailed { .. }
            | Self::Json(_) => ErrorKind::Toolchain,
            Self::Io { .. } | Self::DigestFormat { .. } => ErrorKind::Io,
            Self::LockTimeout { .. } | Self::Lock { .. } => ErrorKind::Lock,
            Self::Manifest { .. } => ErrorKind::Parse,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotModuleProject(_) => Some("Run gococo inside a Go module or workspace"),
            Self::OutsideProject { .. } => Some("Run gococo from inside the project directory"),
            Self::DigestFormat { .. } => Some("Run: gococo clean"),
            Self::InvalidCacheDir(_) => {
                Some("Use a plain name such as .gococo for cache.dir_name or GOCOCO_CACHE_DIR")
            }
            Self::LockTimeout { .. } => {
                Some("Another gococo process is building this project; retry when it finishes")
            }
            Self::CommandFailed { .. } => Some("Make sure the go toolchain is installed and on PATH"),
            _ => None,
        }
    }
}
