//! Walks entry points and annotates their local dependencies

use super::{counter_name, counter_suffix, CoverageVar, EntryCover, PackageCover, COUNTER_TABLE};
use crate::error::{GococoError, GococoResult};
use crate::project::{Package, Topology};
use crate::toolchain::{AnnotateRequest, Annotator};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Instrumented package, shared by every entry point reaching it
#[derive(Debug, Clone)]
struct Instrumented {
    cover: Arc<PackageCover>,
    declarations: Arc<str>,
}

/// Injects counters into the shadow copy of a resolved topology
pub struct Injector<'a> {
    topology: &'a Topology,
    annotator: &'a dyn Annotator,
    shadow_root: &'a Path,
    seen: HashMap<String, Instrumented>,
    annotated: usize,
}

impl<'a> Injector<'a> {
    pub fn new(topology: &'a Topology, annotator: &'a dyn Annotator, shadow_root: &'a Path) -> Self {
        Self {
            topology,
            annotator,
            shadow_root,
            seen: HashMap::new(),
            annotated: 0,
        }
    }

    /// Instrument every entry point of the topology
    pub async fn inject_all(&mut self) -> GococoResult<Vec<EntryCover>> {
        let topology = self.topology;
        let mut covers = Vec::new();

        for entry in topology.entry_points() {
            covers.push(self.inject_entry(entry).await?);
        }

        info!(
            "Instrumented {} entry points, {} files annotated",
            covers.len(),
            self.annotated
        );
        Ok(covers)
    }

    /// Instrument one entry point and the local packages it depends on
    pub async fn inject_entry(&mut self, entry: &Package) -> GococoResult<EntryCover> {
        let topology = self.topology;
        let mut packages = BTreeMap::new();
        let mut declarations = String::new();
        let mut visited = HashSet::new();

        let reachable = std::iter::once(&entry.import_path).chain(entry.deps.iter());
        for import_path in reachable {
            if !topology.is_local_import(import_path) || !visited.insert(import_path.as_str()) {
                continue;
            }

            let package = topology.packages.get(import_path).ok_or_else(|| {
                GococoError::UnresolvedPackage {
                    import_path: import_path.clone(),
                    entry: entry.import_path.clone(),
                }
            })?;

            let instrumented = self.instrument(package).await?;
            declarations.push_str(&instrumented.declarations);
            packages.insert(import_path.clone(), instrumented.cover);
        }

        debug!(
            "Entry {} reaches {} local packages",
            entry.import_path,
            packages.len()
        );
        Ok(EntryCover {
            entry: entry.import_path.clone(),
            packages,
            declarations,
        })
    }

    async fn instrument(&mut self, package: &Package) -> GococoResult<Instrumented> {
        if let Some(done) = self.seen.get(&package.import_path) {
            debug!("{} already instrumented", package.import_path);
            return Ok(done.clone());
        }

        let suffix = counter_suffix(&package.import_path);
        let mut vars = BTreeMap::new();
        let mut declarations = String::new();

        for (seq, name) in package.coverable_files().enumerate() {
            let source = package.file_path(name);
            let file = self
                .topology
                .shadow_path(self.shadow_root, &source)
                .ok_or(GococoError::FileOutsideProject(source))?;
            let var = counter_name(seq, &suffix);

            let request = AnnotateRequest {
                file: &file,
                var: &var,
                table: COUNTER_TABLE,
            };
            declarations.push_str(&self.annotator.annotate(&request).await?);
            self.annotated += 1;

            vars.insert(
                name.to_string(),
                CoverageVar {
                    file: format!("{}/{}", package.import_path, name),
                    var,
                },
            );
        }

        let instrumented = Instrumented {
            cover: Arc::new(PackageCover {
                import_path: package.import_path.clone(),
                dir: package.dir.clone(),
                vars,
            }),
            declarations: declarations.into(),
        };
        self.seen
            .insert(package.import_path.clone(), instrumented.clone());
        Ok(instrumented)
    }

    /// Number of files annotated so far
    pub fn annotated_files(&self) -> usize {
        self.annotated
    }
}
