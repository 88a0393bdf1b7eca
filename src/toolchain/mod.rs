//! Go toolchain abstraction
//!
//! Everything gococo asks of the outside world goes through two traits:
//! [`Toolchain`] (environment, package listing, the final build) and
//! [`Annotator`] (inserting counters into one source file). The go command
//! backs both in production; tests substitute in-memory fakes.

mod annotate;
mod go;

pub use annotate::{AnnotateRequest, Annotator, CoverMode, GoToolCover};
pub use go::GoToolchain;

use crate::error::GococoResult;
use crate::project::Package;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines to include in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Workspace and module manifests active for a directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoEnv {
    /// Active go.work file, if workspace mode is on
    pub gowork: Option<PathBuf>,
    /// Closest go.mod file, if any
    pub gomod: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RawGoEnv {
    #[serde(default)]
    gowork: String,
    #[serde(default)]
    gomod: String,
}

impl GoEnv {
    /// Decode `go env -json GOWORK GOMOD` output.
    ///
    /// `GOWORK=off`, an empty value and `GOMOD` pointing at the null device
    /// all mean "not present".
    pub fn from_json(output: &[u8]) -> GococoResult<Self> {
        let raw: RawGoEnv = serde_json::from_slice(output)?;

        let gowork = match raw.gowork.trim() {
            "" | "off" => None,
            p => Some(PathBuf::from(p)),
        };
        let gomod = match raw.gomod.trim() {
            "" | "/dev/null" | "NUL" => None,
            p => Some(PathBuf::from(p)),
        };

        Ok(Self { gowork, gomod })
    }
}

/// Which go subcommand the final build delegates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildVerb {
    Build,
    Install,
}

impl BuildVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Install => "install",
        }
    }
}

impl fmt::Display for BuildVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully assembled `go build`/`go install` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    pub verb: BuildVerb,
    /// Directory the command runs in (inside the shadow copy)
    pub dir: PathBuf,
    /// Flags followed by package arguments
    pub args: Vec<String>,
}

impl BuildInvocation {
    /// Command line for display, quoting arguments that contain spaces
    pub fn display_args(&self) -> String {
        let mut parts = vec!["go".to_string(), self.verb.to_string()];
        parts.extend(self.args.iter().map(|arg| {
            if arg.contains(' ') {
                format!("\"{}\"", arg)
            } else {
                arg.clone()
            }
        }));
        parts.join(" ")
    }
}

/// Abstract Go toolchain interface
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Locate the active go.work / go.mod for `work_dir`
    async fn env(&self, work_dir: &Path) -> GococoResult<GoEnv>;

    /// List every package below `module_dir` (`./...`)
    async fn list_packages(
        &self,
        module_dir: &Path,
        build_tags: Option<&str>,
    ) -> GococoResult<Vec<Package>>;

    /// Run the delegated build, streaming its output
    async fn build(&self, invocation: &BuildInvocation) -> GococoResult<()>;

    /// Human-readable toolchain name for display
    fn name(&self) -> &'static str;
}

/// Extract the useful tail of build output for error diagnostics.
pub(crate) fn build_error_output(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting. Pipes that were
/// not captured are treated as already closed.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut stderr_reader = child.stderr.take().map(|s| BufReader::new(s).lines());
    let mut stdout_reader = child.stdout.take().map(|s| BufReader::new(s).lines());

    let mut all_output = Vec::new();
    let mut stderr_done = stderr_reader.is_none();
    let mut stdout_done = stdout_reader.is_none();

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = async { stderr_reader.as_mut()?.next_line().await.ok().flatten() }, if !stderr_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stderr_done = true,
                }
            }
            line = async { stdout_reader.as_mut()?.next_line().await.ok().flatten() }, if !stdout_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stdout_done = true,
                }
            }
        }
    }

    all_output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_env_module_only() {
        let env = GoEnv::from_json(br#"{"GOMOD": "/p/go.mod", "GOWORK": ""}"#).unwrap();
        assert_eq!(env.gomod, Some(PathBuf::from("/p/go.mod")));
        assert_eq!(env.gowork, None);
    }

    #[test]
    fn go_env_outside_module() {
        let env = GoEnv::from_json(br#"{"GOMOD": "/dev/null", "GOWORK": "off"}"#).unwrap();
        assert_eq!(env, GoEnv::default());
    }

    #[test]
    fn go_env_workspace() {
        let env = GoEnv::from_json(br#"{"GOMOD": "/p/m/go.mod", "GOWORK": "/p/go.work"}"#).unwrap();
        assert_eq!(env.gowork, Some(PathBuf::from("/p/go.work")));
    }

    #[test]
    fn display_args_quotes_spaces() {
        let invocation = BuildInvocation {
            verb: BuildVerb::Build,
            dir: PathBuf::from("/p/.gococo/project"),
            args: vec![
                "-ldflags".to_string(),
                "-X main.Version=1.0.0 -s".to_string(),
                "-o".to_string(),
                "/p".to_string(),
                ".".to_string(),
            ],
        };
        assert_eq!(
            invocation.display_args(),
            "go build -ldflags \"-X main.Version=1.0.0 -s\" -o /p ."
        );
    }

    #[test]
    fn error_output_keeps_tail() {
        let lines: Vec<String> = (0..120).map(|i| format!("line {}", i)).collect();
        let tail = build_error_output(&lines);
        assert!(tail.starts_with("line 70"));
        assert!(tail.ends_with("line 119"));
    }
}
