//! Shadow copy of the project
//!
//! The mirror lives at `<root>/<cache-dir>/project/` next to the digest
//! file. A sync compares a fresh digest of every tracked file with the
//! persisted one; any difference wipes the cache root and copies every
//! tracked file again.

use super::{digest, CacheDigest};
use crate::error::{GococoError, GococoResult};
use crate::paths;
use crate::project::Topology;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Default cache directory name under the project root
pub const DEFAULT_CACHE_DIR: &str = ".gococo";

/// Mirror subdirectory of the cache root
pub const MIRROR_DIR: &str = "project";

/// Digest file name inside the cache root
pub const DIGEST_FILE: &str = "digest.modtime";

/// Receives progress while the mirror is being copied
pub trait CopyObserver {
    fn start(&self, _total: usize) {}
    fn copied(&self, _file: &Path) {}
    fn finish(&self) {}
}

impl CopyObserver for () {}

/// Check that `dir_name` names exactly one directory below the project root.
///
/// The cache root is wiped on every refresh, so it must never resolve
/// outside the project.
pub fn check_dir_name(dir_name: &str) -> GococoResult<()> {
    let mut components = Path::new(dir_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(GococoError::InvalidCacheDir(dir_name.to_string())),
    }
}

/// Change-aware mirror of the tracked project files
#[derive(Debug)]
pub struct ShadowCache {
    project_root: PathBuf,
    cache_root: PathBuf,
    mirror_dir: PathBuf,
    digest_file: PathBuf,
    excluded: HashSet<PathBuf>,
    tracked: BTreeSet<PathBuf>,
    previous: Option<CacheDigest>,
    current: Option<CacheDigest>,
    refreshed: bool,
}

impl ShadowCache {
    /// Open the cache of `project_root`, loading the persisted digest if any
    pub fn new(project_root: &Path, dir_name: &str) -> GococoResult<Self> {
        let mut cache = Self::at(project_root, dir_name)?;
        cache.previous = CacheDigest::load(&cache.digest_file)?;
        Ok(cache)
    }

    /// Locate the cache of `project_root` without reading anything from it
    pub fn at(project_root: &Path, dir_name: &str) -> GococoResult<Self> {
        check_dir_name(dir_name)?;
        let project_root = paths::normalize(project_root);
        let cache_root = project_root.join(dir_name);

        let mut excluded = HashSet::new();
        excluded.insert(cache_root.clone());

        Ok(Self {
            mirror_dir: cache_root.join(MIRROR_DIR),
            digest_file: cache_root.join(DIGEST_FILE),
            project_root,
            cache_root,
            excluded,
            tracked: BTreeSet::new(),
            previous: None,
            current: None,
            refreshed: false,
        })
    }

    /// Exclude a path (and everything below it) from tracking.
    ///
    /// Relative paths are taken from the project root.
    pub fn exclude(&mut self, path: &Path) {
        self.excluded
            .insert(paths::absolutize(&self.project_root, path));
    }

    /// Track one file. Files outside the project root cannot be mirrored.
    pub fn track(&mut self, file: &Path) -> GococoResult<()> {
        let file = paths::absolutize(&self.project_root, file);
        if !paths::is_within(&self.project_root, &file) {
            return Err(GococoError::FileOutsideProject(file));
        }
        if digest::record_name(&file).is_none() {
            return Err(GococoError::UnrecordablePath(file));
        }
        self.tracked.insert(file);
        Ok(())
    }

    /// Track every file the build of `topology` can read
    pub fn track_topology(&mut self, topology: &Topology) -> GococoResult<()> {
        for package in topology.packages.values() {
            for file in package.tracked_files() {
                self.track(&file)?;
            }
        }

        for module in topology.modules.values().filter(|m| m.in_project) {
            self.track(&module.manifest)?;
            self.track_if_exists(&module.dir.join("go.sum"))?;

            if module.vendor {
                self.track_tree(&module.dir.join("vendor"))?;
            }
        }

        if let Some(ref workspace) = topology.workspace {
            self.track(&workspace.manifest)?;
            self.track_if_exists(&topology.root.join("go.work.sum"))?;
        }

        debug!("Tracking {} files", self.tracked.len());
        Ok(())
    }

    fn track_if_exists(&mut self, file: &Path) -> GococoResult<()> {
        if file.is_file() {
            self.track(file)?;
        }
        Ok(())
    }

    fn track_tree(&mut self, dir: &Path) -> GococoResult<()> {
        if !dir.is_dir() {
            return Ok(());
        }

        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(|e| {
                let context = format!("walking {}", dir.display());
                GococoError::io(context, e.into())
            })?;
            if !entry.file_type().is_dir() {
                self.track(entry.path())?;
            }
        }
        Ok(())
    }

    fn is_excluded(&self, file: &Path) -> bool {
        file.ancestors().any(|a| self.excluded.contains(a))
    }

    /// Tracked files that are not excluded, in path order
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.tracked
            .iter()
            .map(PathBuf::as_path)
            .filter(|f| !self.is_excluded(f))
    }

    /// Compare the tracked files with the persisted digest and refresh the
    /// mirror when they differ. Returns whether a refresh happened.
    pub fn sync(&mut self, observer: &dyn CopyObserver) -> GococoResult<bool> {
        let digest = CacheDigest::compute(self.files())?;

        let refresh = match self.previous {
            None => {
                debug!("No digest at {}, refresh forced", self.digest_file.display());
                true
            }
            Some(ref previous) => previous != &digest,
        };

        if refresh {
            self.refresh(&digest, observer)?;
            info!(
                "Mirrored {} files into {}",
                digest.len(),
                self.mirror_dir.display()
            );
        } else {
            info!("Shadow copy at {} is up to date", self.mirror_dir.display());
        }

        self.current = Some(digest);
        self.refreshed = refresh;
        Ok(refresh)
    }

    fn refresh(&self, digest: &CacheDigest, observer: &dyn CopyObserver) -> GococoResult<()> {
        self.clear()?;
        fs::create_dir_all(&self.mirror_dir)
            .map_err(|e| GococoError::io(format!("creating {}", self.mirror_dir.display()), e))?;

        observer.start(digest.len());
        for file in digest.files() {
            let dest = self.mirror_path(file)?;
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| GococoError::io(format!("creating {}", parent.display()), e))?;
            }
            fs::copy(file, &dest).map_err(|e| {
                GococoError::io(
                    format!("copying {} to {}", file.display(), dest.display()),
                    e,
                )
            })?;
            observer.copied(file);
        }
        observer.finish();
        Ok(())
    }

    /// Persist the digest computed by the last [`sync`](Self::sync)
    pub fn save_digest(&self) -> GococoResult<()> {
        match self.current {
            Some(ref digest) => digest.save(&self.digest_file),
            None => Ok(()),
        }
    }

    /// Remove the whole cache root. Returns whether anything was removed.
    pub fn clear(&self) -> GococoResult<bool> {
        if !self.cache_root.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&self.cache_root)
            .map_err(|e| GococoError::io(format!("removing {}", self.cache_root.display()), e))?;
        debug!("Removed {}", self.cache_root.display());
        Ok(true)
    }

    /// Location of a project path inside the mirror
    pub fn mirror_path(&self, path: &Path) -> GococoResult<PathBuf> {
        paths::rebase(path, &self.project_root, &self.mirror_dir)
            .ok_or_else(|| GococoError::FileOutsideProject(path.to_path_buf()))
    }

    /// Whether the last sync copied the project again
    pub fn refreshed(&self) -> bool {
        self.refreshed
    }

    /// Digest computed by the last sync
    pub fn digest(&self) -> Option<&CacheDigest> {
        self.current.as_ref()
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }

    pub fn digest_file(&self) -> &Path {
        &self.digest_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn project() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::write(root.join("go.mod"), "module example.com/m\n").unwrap();
        fs::write(root.join("main.go"), "package main\n").unwrap();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("lib/lib.go"), "package lib\n").unwrap();
        (temp, root)
    }

    fn open(root: &Path) -> ShadowCache {
        let mut cache = ShadowCache::new(root, DEFAULT_CACHE_DIR).unwrap();
        for file in ["go.mod", "main.go", "lib/lib.go"] {
            cache.track(Path::new(file)).unwrap();
        }
        cache
    }

    #[derive(Default)]
    struct Counter {
        total: Cell<usize>,
        copied: Cell<usize>,
    }

    impl CopyObserver for Counter {
        fn start(&self, total: usize) {
            self.total.set(total);
        }

        fn copied(&self, _file: &Path) {
            self.copied.set(self.copied.get() + 1);
        }
    }

    #[test]
    fn first_sync_mirrors_everything() {
        let (_temp, root) = project();
        let mut cache = open(&root);
        let counter = Counter::default();

        assert!(cache.sync(&counter).unwrap());
        assert!(cache.refreshed());
        assert_eq!(counter.total.get(), 3);
        assert_eq!(counter.copied.get(), 3);
        assert_eq!(
            fs::read_to_string(root.join(".gococo/project/lib/lib.go")).unwrap(),
            "package lib\n"
        );
        // Not persisted until asked
        assert!(!cache.digest_file().exists());
    }

    #[test]
    fn unchanged_second_sync_skips_copy() {
        let (_temp, root) = project();
        let mut cache = open(&root);
        cache.sync(&()).unwrap();
        cache.save_digest().unwrap();

        let marker = root.join(".gococo/project/marker");
        fs::write(&marker, "").unwrap();

        let mut cache = open(&root);
        assert!(!cache.sync(&()).unwrap());
        assert!(!cache.refreshed());
        assert!(marker.exists());
    }

    #[test]
    fn mtime_change_forces_refresh() {
        let (_temp, root) = project();
        let mut cache = open(&root);
        cache.sync(&()).unwrap();
        cache.save_digest().unwrap();

        let file = fs::File::options()
            .write(true)
            .open(root.join("main.go"))
            .unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(7)).unwrap();

        let mut cache = open(&root);
        assert!(cache.sync(&()).unwrap());
        // The refresh wiped the old digest
        assert!(!cache.digest_file().exists());
    }

    #[test]
    fn cache_root_is_never_tracked() {
        let (_temp, root) = project();
        fs::create_dir_all(root.join(".gococo/project")).unwrap();
        fs::write(root.join(".gococo/project/stale.go"), "").unwrap();

        let mut cache = open(&root);
        cache.track(&root.join(".gococo/project/stale.go")).unwrap();
        cache.exclude(Path::new("lib"));
        cache.exclude(Path::new("lib"));

        let files: Vec<_> = cache.files().map(Path::to_path_buf).collect();
        assert_eq!(files, vec![root.join("go.mod"), root.join("main.go")]);
    }

    #[test]
    fn file_outside_project_is_rejected() {
        let (_temp, root) = project();
        let mut cache = ShadowCache::new(&root, DEFAULT_CACHE_DIR).unwrap();
        let err = cache.track(Path::new("../elsewhere.go")).unwrap_err();
        assert!(matches!(err, GococoError::FileOutsideProject(_)));
    }

    #[test]
    fn line_breaks_in_names_are_rejected() {
        let (_temp, root) = project();
        let mut cache = ShadowCache::new(&root, DEFAULT_CACHE_DIR).unwrap();
        let err = cache.track(Path::new("odd\nname.go")).unwrap_err();
        assert!(matches!(err, GococoError::UnrecordablePath(_)));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_temp, root) = project();
        let mut cache = ShadowCache::new(&root, DEFAULT_CACHE_DIR).unwrap();
        let name = Path::new(OsStr::from_bytes(b"caf\xe9.go"));
        let err = cache.track(name).unwrap_err();
        assert!(matches!(err, GococoError::UnrecordablePath(_)));
        assert_eq!(cache.files().count(), 0);
    }

    #[test]
    fn malformed_digest_can_still_be_cleared() {
        let (_temp, root) = project();
        fs::create_dir_all(root.join(".gococo")).unwrap();
        fs::write(root.join(".gococo/digest.modtime"), "garbage\n").unwrap();

        let err = ShadowCache::new(&root, DEFAULT_CACHE_DIR).unwrap_err();
        assert!(matches!(err, GococoError::DigestFormat { .. }));

        assert!(ShadowCache::at(&root, DEFAULT_CACHE_DIR).unwrap().clear().unwrap());
        assert!(!root.join(".gococo").exists());
    }

    #[test]
    fn cache_root_outside_project_is_refused() {
        let (temp, root) = project();
        let victim = temp.path().join("victim");
        fs::create_dir_all(&victim).unwrap();
        fs::write(victim.join("precious"), "keep").unwrap();

        let absolute = victim.to_string_lossy().into_owned();
        for dir in [absolute.as_str(), "../victim", "nested/cache"] {
            let err = ShadowCache::new(&root, dir).unwrap_err();
            assert!(matches!(err, GococoError::InvalidCacheDir(_)), "{dir}");
        }
        assert!(victim.join("precious").exists());
    }

    #[test]
    fn clear_removes_cache_root() {
        let (_temp, root) = project();
        let mut cache = open(&root);
        cache.sync(&()).unwrap();

        assert!(cache.clear().unwrap());
        assert!(!root.join(".gococo").exists());
        assert!(!cache.clear().unwrap());
    }
}
