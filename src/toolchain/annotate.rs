//! Source annotation seam
//!
//! An [`Annotator`] rewrites a single Go file in place so that it increments
//! the named counter, and returns the declaration text of that counter.

use crate::error::{GococoError, GococoResult};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;
use tracing::debug;

/// One file to annotate
#[derive(Debug, Clone, Copy)]
pub struct AnnotateRequest<'a> {
    /// Absolute path of the file inside the shadow copy
    pub file: &'a Path,
    /// Counter identifier assigned to the file
    pub var: &'a str,
    /// Identifier of the global counter table
    pub table: &'a str,
}

/// Inserts coverage counters into one source file
#[async_trait]
pub trait Annotator: Send + Sync {
    /// Annotate `request.file` in place and return the counter declaration
    async fn annotate(&self, request: &AnnotateRequest<'_>) -> GococoResult<String>;
}

/// Counter mode passed to `go tool cover`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoverMode {
    Set,
    #[default]
    Count,
    Atomic,
}

impl fmt::Display for CoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Set => "set",
            Self::Count => "count",
            Self::Atomic => "atomic",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CoverMode {
    type Err = GococoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Self::Set),
            "count" => Ok(Self::Count),
            "atomic" => Ok(Self::Atomic),
            other => Err(GococoError::InvalidArgs(format!(
                "unknown cover mode '{}', expected set, count or atomic",
                other
            ))),
        }
    }
}

/// Annotator backed by `go tool cover`.
///
/// `go tool cover` declares each counter inside the annotated file itself,
/// so the counter table identifier is not needed to produce valid Go; the
/// returned text is the generated `var <name> = struct {...}` declaration.
#[derive(Debug, Clone)]
pub struct GoToolCover {
    go: PathBuf,
    mode: CoverMode,
}

impl GoToolCover {
    pub fn new(go: impl Into<PathBuf>, mode: CoverMode) -> Self {
        Self {
            go: go.into(),
            mode,
        }
    }
}

#[async_trait]
impl Annotator for GoToolCover {
    async fn annotate(&self, request: &AnnotateRequest<'_>) -> GococoResult<String> {
        let file = request.file;
        let mode = format!("-mode={}", self.mode);
        debug!("Annotating {} with {}", file.display(), request.var);

        let output = Command::new(&self.go)
            .args(["tool", "cover", mode.as_str(), "-var", request.var, "-o"])
            .arg(file)
            .arg(file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GococoError::command_failed("go tool cover", e))?;

        if !output.status.success() {
            return Err(GococoError::Annotate {
                path: file.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let annotated = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| GococoError::io(format!("reading {}", file.display()), e))?;

        extract_declaration(&annotated, request.var).ok_or_else(|| GococoError::Annotate {
            path: file.to_path_buf(),
            reason: format!("no declaration for {} in the annotated file", request.var),
        })
    }
}

/// Find the `var <name> = ...` declaration emitted by `go tool cover`.
///
/// The declaration runs to the end of the file.
fn extract_declaration(source: &str, var: &str) -> Option<String> {
    let needle = format!("var {} = ", var);
    let start = source
        .match_indices(&needle)
        .map(|(idx, _)| idx)
        .find(|&idx| idx == 0 || source.as_bytes()[idx - 1] == b'\n')?;
    Some(source[start..].trim_end().to_string() + "\n")
}
