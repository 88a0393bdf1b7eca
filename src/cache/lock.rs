//! Cross-process compile lock
//!
//! An advisory exclusive lock on `<project-root>/.gococo.lock` keeps two
//! invocations from syncing, rewriting or instrumenting the same shadow
//! copy at the same time.

use crate::error::{GococoError, GococoResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lock file name under the project root
pub const LOCK_FILE: &str = ".gococo.lock";

/// Default time to wait for another invocation to finish
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(360);

/// Default delay between acquisition attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lock protecting one project's cache
#[derive(Debug, Clone)]
pub struct CompileLock {
    path: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl CompileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// The lock of the project rooted at `root`
    pub fn for_project(root: &Path) -> Self {
        Self::new(root.join(LOCK_FILE))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until the lock is ours or the timeout elapses
    pub async fn acquire(&self) -> GococoResult<CompileLockGuard> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|source| self.error(source))?;

        let started = Instant::now();
        let mut announced = false;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(
                        "Acquired {} after {:?}",
                        self.path.display(),
                        started.elapsed()
                    );
                    return Ok(CompileLockGuard {
                        path: self.path.clone(),
                        file: Some(file),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if started.elapsed() >= self.timeout {
                        return Err(GococoError::LockTimeout {
                            path: self.path.clone(),
                            timeout: self.timeout,
                        });
                    }
                    if !announced {
                        warn!("Waiting for another gococo process holding {}", self.path.display());
                        announced = true;
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(source) => return Err(self.error(source)),
            }
        }
    }

    fn error(&self, source: std::io::Error) -> GococoError {
        GococoError::Lock {
            path: self.path.clone(),
            source,
        }
    }
}

/// Held compile lock; released on drop
#[derive(Debug)]
pub struct CompileLockGuard {
    path: PathBuf,
    file: Option<File>,
}

impl CompileLockGuard {
    /// Release the lock before the guard goes out of scope
    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!("Failed to unlock {}: {}", self.path.display(), e);
            } else {
                debug!("Released {}", self.path.display());
            }
        }
    }
}

impl Drop for CompileLockGuard {
    fn drop(&mut self) {
        self.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quick(root: &Path) -> CompileLock {
        CompileLock::for_project(root)
            .with_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let temp = TempDir::new().unwrap();
        let guard = quick(temp.path()).acquire().await.unwrap();

        let err = quick(temp.path()).acquire().await.unwrap_err();
        assert!(matches!(err, GococoError::LockTimeout { .. }));

        guard.release();
        let again = quick(temp.path()).acquire().await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn drop_releases() {
        let temp = TempDir::new().unwrap();
        {
            let _guard = quick(temp.path()).acquire().await.unwrap();
        }
        assert!(quick(temp.path()).acquire().await.is_ok());
        assert!(temp.path().join(LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn missing_directory_is_a_lock_error() {
        let temp = TempDir::new().unwrap();
        let err = quick(&temp.path().join("nope")).acquire().await.unwrap_err();
        assert!(matches!(err, GococoError::Lock { .. }));
    }
}
