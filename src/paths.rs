//! Lexical path helpers
//!
//! Containment checks never touch the filesystem: both sides are normalized
//! lexically first, so `/a/b/../x` is treated as `/a/x`. Equal paths count
//! as contained in [`is_within`]; use [`is_strictly_within`] to exclude them.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. `..` directly below the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Resolve `path` against `base` when it is relative, then normalize.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Whether `candidate` is `parent` or lies below it.
pub fn is_within(parent: &Path, candidate: &Path) -> bool {
    normalize(candidate).starts_with(normalize(parent))
}

/// Whether `candidate` lies below `parent` and is not `parent` itself.
pub fn is_strictly_within(parent: &Path, candidate: &Path) -> bool {
    let parent = normalize(parent);
    let candidate = normalize(candidate);
    candidate != parent && candidate.starts_with(&parent)
}

/// Move `path` from under `from` to the same relative location under `to`.
///
/// Returns `None` when `path` is not within `from`.
pub fn rebase(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    let path = normalize(path);
    let rel = path.strip_prefix(normalize(from)).ok()?;
    if rel.as_os_str().is_empty() {
        Some(normalize(to))
    } else {
        Some(normalize(&to.join(rel)))
    }
}
