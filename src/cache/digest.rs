//! Modification-time digest of the tracked files
//!
//! Persisted as one `<absolute-path> <unix-nanos>` line per file. The
//! timestamp is always the last space-separated field, so paths may
//! contain spaces.

use crate::error::{GococoError, GococoResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Snapshot of file modification times, ordered by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDigest {
    entries: BTreeMap<PathBuf, i64>,
}

impl CacheDigest {
    /// Stat every file without following links.
    ///
    /// A symbolic link is recorded under its own path with the modification
    /// time of its target.
    pub fn compute<'a>(files: impl IntoIterator<Item = &'a Path>) -> GococoResult<Self> {
        let mut entries = BTreeMap::new();

        for file in files {
            let stat = |follow: bool| {
                let result = if follow {
                    fs::metadata(file)
                } else {
                    fs::symlink_metadata(file)
                };
                result.map_err(|e| {
                    GococoError::io(format!("reading metadata of {}", file.display()), e)
                })
            };

            let mut metadata = stat(false)?;
            if metadata.file_type().is_symlink() {
                metadata = stat(true)?;
            }

            let modified = metadata
                .modified()
                .map_err(|e| GococoError::io(format!("reading mtime of {}", file.display()), e))?;
            entries.insert(file.to_path_buf(), unix_nanos(modified));
        }

        Ok(Self { entries })
    }

    /// Load a persisted digest. A missing file yields `None`.
    pub fn load(path: &Path) -> GococoResult<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GococoError::io(format!("reading {}", path.display()), e)),
        };

        let mut entries = BTreeMap::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let parsed = line
                .rsplit_once(' ')
                .and_then(|(file, nanos)| Some((file, nanos.parse::<i64>().ok()?)))
                .filter(|(file, _)| !file.is_empty());

            let Some((file, nanos)) = parsed else {
                return Err(GococoError::DigestFormat {
                    path: path.to_path_buf(),
                    line: line.to_string(),
                });
            };
            entries.insert(PathBuf::from(file), nanos);
        }

        debug!("Loaded {} digest entries from {}", entries.len(), path.display());
        Ok(Some(Self { entries }))
    }

    /// Write the digest, replacing any previous file
    pub fn save(&self, path: &Path) -> GococoResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GococoError::io(format!("creating {}", parent.display()), e))?;
        }

        let mut content = String::new();
        for (file, nanos) in &self.entries {
            let name =
                record_name(file).ok_or_else(|| GococoError::UnrecordablePath(file.clone()))?;
            content.push_str(&format!("{} {}\n", name, nanos));
        }

        fs::write(path, content)
            .map_err(|e| GococoError::io(format!("writing {}", path.display()), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded modification time of one file
    pub fn get(&self, file: &Path) -> Option<i64> {
        self.entries.get(file).copied()
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }
}

/// The path as written to the digest file, if it survives a round trip
pub(crate) fn record_name(file: &Path) -> Option<&str> {
    file.to_str().filter(|name| !name.contains(['\n', '\r']))
}

fn unix_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i64,
        Err(before) => -(before.duration().as_nanos() as i64),
    }
}
