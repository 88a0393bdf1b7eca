//! Manifest rewriting for the shadow copy
//!
//! A local `replace` such as `example.com/dep => ../dep` still points into
//! the original tree once go.mod has been mirrored. Every such path that
//! resolves inside the project is re-anchored under the shadow root so the
//! mirrored build only ever reads mirrored files. Paths outside the project
//! are written back as absolute paths to their original location.

use crate::error::{GococoError, GococoResult};
use crate::paths;
use crate::project::{ModFile, Replace, Topology};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rewrite the mirrored go.work and every mirrored in-project go.mod.
///
/// Returns the shadow manifests that were written.
pub fn rewrite_manifests(topology: &Topology, shadow_root: &Path) -> GococoResult<Vec<PathBuf>> {
    let mut targets: Vec<(PathBuf, PathBuf)> = Vec::new();

    if let Some(ref workspace) = topology.workspace {
        targets.push((workspace.manifest.clone(), topology.root.clone()));
    }
    for module in topology.modules.values().filter(|m| m.in_project) {
        targets.push((module.manifest.clone(), module.dir.clone()));
    }

    let mut written = Vec::new();
    for (manifest, anchor) in targets {
        let shadow_manifest = topology
            .shadow_path(shadow_root, &manifest)
            .ok_or_else(|| GococoError::FileOutsideProject(manifest.clone()))?;

        if rewrite_manifest(&shadow_manifest, &anchor, &topology.root, shadow_root)? {
            written.push(shadow_manifest);
        }
    }

    info!("Rewrote {} manifests", written.len());
    Ok(written)
}

/// Rewrite the local replacements of one mirrored manifest in place.
///
/// `anchor` is the directory the original manifest lives in; relative
/// replacement paths are resolved against it. Returns whether the file was
/// written.
pub fn rewrite_manifest(
    shadow_manifest: &Path,
    anchor: &Path,
    project_root: &Path,
    shadow_root: &Path,
) -> GococoResult<bool> {
    let file = ModFile::read(shadow_manifest)?;

    let rewritten = file.rewrite_replacements(|replace| {
        rebase_replacement(replace, anchor, project_root, shadow_root)
    });

    let Some(content) = rewritten else {
        debug!("{} needs no rewrite", shadow_manifest.display());
        return Ok(false);
    };

    std::fs::write(shadow_manifest, content)
        .map_err(|e| GococoError::io(format!("writing {}", shadow_manifest.display()), e))?;
    debug!("Rewrote {}", shadow_manifest.display());
    Ok(true)
}

fn rebase_replacement(
    replace: &Replace,
    anchor: &Path,
    project_root: &Path,
    shadow_root: &Path,
) -> Option<String> {
    if !replace.is_local() {
        return None;
    }

    let target = paths::absolutize(anchor, Path::new(&replace.new_path));
    let rebased = if paths::is_within(shadow_root, &target) {
        target
    } else {
        // Outside the project the original location is kept, but absolute,
        // since the mirrored manifest sits at a different depth.
        paths::rebase(&target, project_root, shadow_root).unwrap_or(target)
    };

    debug!("replace {} => {}", replace.old_path, rebased.display());
    Some(rebased.to_string_lossy().into_owned())
}
