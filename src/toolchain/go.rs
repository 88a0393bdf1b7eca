//! Toolchain backed by the go command

use super::{build_error_output, stream_child_output, BuildInvocation, GoEnv, Toolchain};
use crate::error::{GococoError, GococoResult};
use crate::project::{decode_package_stream, Package};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Toolchain that shells out to `go`
#[derive(Debug, Clone)]
pub struct GoToolchain {
    go: PathBuf,
}

impl GoToolchain {
    /// Create a toolchain using the given go binary
    pub fn new(go: impl Into<PathBuf>) -> Self {
        Self { go: go.into() }
    }

    /// Execute a go command in `dir` and return its output
    async fn exec(&self, dir: &Path, args: &[&str]) -> GococoResult<std::process::Output> {
        debug!("Executing: go {:?} in {}", args, dir.display());

        Command::new(&self.go)
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| GococoError::command_failed(format!("go {}", args.join(" ")), e))
    }

    /// Execute a go command and fail on a non-zero exit
    async fn exec_ok(&self, dir: &Path, args: &[&str]) -> GococoResult<Vec<u8>> {
        let output = self.exec(dir, args).await?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(GococoError::command_exec(
                format!("go {}", args.join(" ")),
                stderr.trim().to_string(),
            ))
        }
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new("go")
    }
}

#[async_trait]
impl Toolchain for GoToolchain {
    async fn env(&self, work_dir: &Path) -> GococoResult<GoEnv> {
        let stdout = self
            .exec_ok(work_dir, &["env", "-json", "GOWORK", "GOMOD"])
            .await?;
        GoEnv::from_json(&stdout)
    }

    async fn list_packages(
        &self,
        module_dir: &Path,
        build_tags: Option<&str>,
    ) -> GococoResult<Vec<Package>> {
        let mut args = vec!["list", "-json"];
        if let Some(tags) = build_tags {
            args.push("-tags");
            args.push(tags);
        }
        args.push("./...");

        let stdout = self.exec_ok(module_dir, &args).await?;
        let packages = decode_package_stream(&stdout)?;

        debug!(
            "Listed {} packages in {}",
            packages.len(),
            module_dir.display()
        );
        Ok(packages)
    }

    async fn build(&self, invocation: &BuildInvocation) -> GococoResult<()> {
        info!(
            "{} in {}",
            invocation.display_args(),
            invocation.dir.display()
        );

        let mut child = Command::new(&self.go)
            .arg(invocation.verb.as_str())
            .args(&invocation.args)
            .current_dir(&invocation.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GococoError::command_failed(invocation.display_args(), e))?;

        let lines = stream_child_output(&mut child, &|line: String| eprintln!("{}", line)).await;

        let status = child
            .wait()
            .await
            .map_err(|e| GococoError::command_failed(invocation.display_args(), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(GococoError::BuildFailed {
                verb: invocation.verb.to_string(),
                status: status.to_string(),
                output: build_error_output(&lines),
            })
        }
    }

    fn name(&self) -> &'static str {
        "go"
    }
}
