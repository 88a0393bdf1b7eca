//! Project topology resolution
//!
//! Turns a working directory into the project root, its modules (and
//! workspace, when `go.work` is active) and the merged package map.

use crate::error::{GococoError, GococoResult};
use crate::paths;
use crate::project::modfile::{ModFile, Replace};
use crate::project::Package;
use crate::toolchain::Toolchain;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A Go module taking part in the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Absolute module directory
    pub dir: PathBuf,
    /// Absolute path of its go.mod
    pub manifest: PathBuf,
    /// Declared module path
    pub module_path: String,
    /// Whether the module directory lies under the project root
    pub in_project: bool,
    /// Whether the module builds from its vendor directory
    pub vendor: bool,
    /// Replace directives pointing at local directories
    pub local_replaces: Vec<Replace>,
}

/// An active go.work workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Absolute path of go.work
    pub manifest: PathBuf,
    /// Module paths of the `use`d members, in file order
    pub members: Vec<String>,
    /// Replace directives of go.work pointing at local directories
    pub local_replaces: Vec<Replace>,
}

/// Options that change what the package lister sees
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Value of `-tags`
    pub build_tags: Option<String>,
    /// Value of `-mod`
    pub build_mod: Option<String>,
}

/// The resolved project
#[derive(Debug, Clone)]
pub struct Topology {
    /// Directory gococo was invoked from
    pub work_dir: PathBuf,
    /// Directory of go.work, or of go.mod without a workspace
    pub root: PathBuf,
    pub workspace: Option<Workspace>,
    /// Modules keyed by module path
    pub modules: BTreeMap<String, Module>,
    /// Packages keyed by import path
    pub packages: BTreeMap<String, Package>,
}

impl Topology {
    /// Resolve the project containing `work_dir`
    pub async fn resolve(
        toolchain: &dyn Toolchain,
        work_dir: &Path,
        options: &ResolveOptions,
    ) -> GococoResult<Self> {
        let work_dir = paths::normalize(work_dir);
        let env = toolchain.env(&work_dir).await?;

        let manifest = env
            .gowork
            .as_ref()
            .or(env.gomod.as_ref())
            .ok_or_else(|| GococoError::NotModuleProject(work_dir.clone()))?;
        let root = manifest
            .parent()
            .map(paths::normalize)
            .ok_or_else(|| GococoError::NotModuleProject(work_dir.clone()))?;

        if !paths::is_within(&root, &work_dir) {
            return Err(GococoError::OutsideProject { work_dir, root });
        }

        let mut modules = BTreeMap::new();
        let workspace = match env.gowork {
            Some(ref gowork) => {
                let (workspace, members) = read_workspace(gowork, &root, options)?;
                for module in members {
                    modules.insert(module.module_path.clone(), module);
                }
                Some(workspace)
            }
            None => {
                // gomod is present, otherwise the root lookup above failed
                let gomod = env.gomod.as_deref().unwrap_or(manifest);
                let module = read_module(gomod, &root, options)?;
                modules.insert(module.module_path.clone(), module);
                None
            }
        };

        let mut packages = BTreeMap::new();
        for module in modules.values().filter(|m| m.in_project) {
            let listed = toolchain
                .list_packages(&module.dir, options.build_tags.as_deref())
                .await?;
            merge_packages(&mut packages, module, listed)?;
        }

        info!(
            "Resolved {} modules and {} packages under {}",
            modules.len(),
            packages.len(),
            root.display()
        );

        Ok(Self {
            work_dir,
            root,
            workspace,
            modules,
            packages,
        })
    }

    /// Packages that build into programs
    pub fn entry_points(&self) -> impl Iterator<Item = &Package> {
        self.packages.values().filter(|p| p.is_command())
    }

    /// Whether `import_path` belongs to one of the project's own modules
    pub fn is_local_import(&self, import_path: &str) -> bool {
        self.modules.values().filter(|m| m.in_project).any(|m| {
            import_path == m.module_path
                || import_path
                    .strip_prefix(m.module_path.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Location of a project path inside the shadow copy rooted at `shadow_root`
    pub fn shadow_path(&self, shadow_root: &Path, path: &Path) -> Option<PathBuf> {
        paths::rebase(path, &self.root, shadow_root)
    }
}

fn read_workspace(
    gowork: &Path,
    root: &Path,
    options: &ResolveOptions,
) -> GococoResult<(Workspace, Vec<Module>)> {
    let file = ModFile::read(gowork)?;
    let mut members = Vec::new();

    for use_path in file.uses() {
        let dir = paths::absolutize(root, Path::new(use_path));
        if !paths::is_within(root, &dir) {
            return Err(GococoError::MemberOutsideProject {
                member: dir,
                root: root.to_path_buf(),
            });
        }

        let module = read_module(&dir.join("go.mod"), root, options)?;
        debug!("Workspace member {} at {}", module.module_path, dir.display());
        members.push(module);
    }

    let workspace = Workspace {
        manifest: gowork.to_path_buf(),
        members: members.iter().map(|m| m.module_path.clone()).collect(),
        local_replaces: local_replaces(&file),
    };
    Ok((workspace, members))
}

fn read_module(gomod: &Path, root: &Path, options: &ResolveOptions) -> GococoResult<Module> {
    let file = ModFile::read(gomod)?;
    let module_path = file
        .module_path()
        .ok_or_else(|| GococoError::manifest(gomod, 1, "no module directive found"))?
        .to_string();

    let dir = gomod
        .parent()
        .map(paths::normalize)
        .unwrap_or_else(|| root.to_path_buf());
    let vendor = options.build_mod.as_deref() == Some("vendor") || dir.join("vendor").is_dir();

    Ok(Module {
        in_project: paths::is_within(root, &dir),
        manifest: paths::normalize(gomod),
        dir,
        module_path,
        vendor,
        local_replaces: local_replaces(&file),
    })
}

fn local_replaces(file: &ModFile) -> Vec<Replace> {
    file.replaces()
        .iter()
        .filter(|r| r.is_local())
        .cloned()
        .collect()
}

fn merge_packages(
    packages: &mut BTreeMap<String, Package>,
    module: &Module,
    listed: Vec<Package>,
) -> GococoResult<()> {
    for package in listed {
        match package.module_path() {
            Some(path) if path == module.module_path => {}
            found => {
                return Err(GococoError::ForeignPackage {
                    import_path: package.import_path.clone(),
                    found: found.unwrap_or("<none>").to_string(),
                    expected: module.module_path.clone(),
                })
            }
        }

        if packages.contains_key(&package.import_path) {
            return Err(GococoError::DuplicatePackage(package.import_path));
        }
        packages.insert(package.import_path.clone(), package);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::project::ModuleInfo;
    use crate::toolchain::{BuildInvocation, GoEnv};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory toolchain serving canned `go env` and `go list` answers
    #[derive(Default)]
    pub(crate) struct FakeToolchain {
        pub env: GoEnv,
        pub listings: HashMap<PathBuf, Vec<Package>>,
        pub listed_dirs: Mutex<Vec<PathBuf>>,
        pub builds: Mutex<Vec<BuildInvocation>>,
    }

    #[async_trait]
    impl Toolchain for FakeToolchain {
        async fn env(&self, _work_dir: &Path) -> GococoResult<GoEnv> {
            Ok(self.env.clone())
        }

        async fn list_packages(
            &self,
            module_dir: &Path,
            _build_tags: Option<&str>,
        ) -> GococoResult<Vec<Package>> {
            self.listed_dirs.lock().unwrap().push(module_dir.to_path_buf());
            Ok(self.listings.get(module_dir).cloned().unwrap_or_default())
        }

        async fn build(&self, invocation: &BuildInvocation) -> GococoResult<()> {
            self.builds.lock().unwrap().push(invocation.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    pub(crate) fn package(
        dir: &Path,
        import_path: &str,
        name: &str,
        module: &str,
        go_files: &[&str],
        deps: &[&str],
    ) -> Package {
        Package {
            dir: dir.to_path_buf(),
            import_path: import_path.to_string(),
            name: name.to_string(),
            module: Some(ModuleInfo {
                path: module.to_string(),
                main: true,
                ..Default::default()
            }),
            go_files: go_files.iter().map(|s| s.to_string()).collect(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn root(temp: &TempDir) -> PathBuf {
        temp.path().canonicalize().unwrap()
    }

    #[tokio::test]
    async fn single_module_project() {
        let temp = TempDir::new().unwrap();
        let root = root(&temp);
        write(&root.join("go.mod"), "module example.com/m\n\ngo 1.22\n");

        let toolchain = FakeToolchain {
            env: GoEnv {
                gowork: None,
                gomod: Some(root.join("go.mod")),
            },
            listings: HashMap::from([(
                root.clone(),
                vec![
                    package(&root.join("lib"), "example.com/m/lib", "lib", "example.com/m", &["lib.go"], &[]),
                    package(&root, "example.com/m", "main", "example.com/m", &["main.go"], &["example.com/m/lib"]),
                ],
            )]),
            ..Default::default()
        };

        let topology = Topology::resolve(&toolchain, &root.join("lib"), &ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(topology.root, root);
        assert!(topology.workspace.is_none());
        assert_eq!(topology.modules.len(), 1);
        let module = &topology.modules["example.com/m"];
        assert!(module.in_project);
        assert!(!module.vendor);
        assert_eq!(topology.packages.len(), 2);

        let entries: Vec<_> = topology.entry_points().map(|p| p.import_path.as_str()).collect();
        assert_eq!(entries, vec!["example.com/m"]);
        let lib = &topology.packages["example.com/m/lib"];
        assert!(topology.is_local_import(&lib.import_path));
        assert_eq!(
            topology.shadow_path(&root.join(".gococo/project"), &lib.dir),
            Some(root.join(".gococo/project/lib"))
        );
        assert!(topology.is_local_import("example.com/m/lib"));
        assert!(!topology.is_local_import("example.com/mother"));
        assert!(!topology.is_local_import("fmt"));
    }

    #[tokio::test]
    async fn not_a_module_project() {
        let temp = TempDir::new().unwrap();
        let toolchain = FakeToolchain::default();

        let err = Topology::resolve(&toolchain, temp.path(), &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GococoError::NotModuleProject(_)));
    }

    #[tokio::test]
    async fn work_dir_outside_root() {
        let temp = TempDir::new().unwrap();
        let root = root(&temp);
        write(&root.join("m/go.mod"), "module example.com/m\n");

        let toolchain = FakeToolchain {
            env: GoEnv {
                gowork: None,
                gomod: Some(root.join("m/go.mod")),
            },
            ..Default::default()
        };

        let err = Topology::resolve(&toolchain, &root, &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GococoError::OutsideProject { .. }));
    }

    #[tokio::test]
    async fn workspace_members_and_vendor() {
        let temp = TempDir::new().unwrap();
        let root = root(&temp);
        write(
            &root.join("go.work"),
            "go 1.22\n\nuse (\n\t./api\n\t./tools\n)\n\nreplace example.com/x => ./x\n",
        );
        write(
            &root.join("api/go.mod"),
            "module example.com/api\n\nreplace example.com/tools => ../tools\nreplace golang.org/x/mod => golang.org/x/mod v0.18.0\n",
        );
        write(&root.join("tools/go.mod"), "module example.com/tools\n");
        fs::create_dir_all(root.join("tools/vendor")).unwrap();

        let toolchain = FakeToolchain {
            env: GoEnv {
                gowork: Some(root.join("go.work")),
                gomod: Some(root.join("api/go.mod")),
            },
            listings: HashMap::from([
                (
                    root.join("api"),
                    vec![package(&root.join("api"), "example.com/api", "main", "example.com/api", &["main.go"], &[])],
                ),
                (
                    root.join("tools"),
                    vec![package(&root.join("tools"), "example.com/tools", "tools", "example.com/tools", &["t.go"], &[])],
                ),
            ]),
            ..Default::default()
        };

        let topology = Topology::resolve(&toolchain, &root, &ResolveOptions::default())
            .await
            .unwrap();

        let workspace = topology.workspace.as_ref().unwrap();
        assert_eq!(workspace.members, vec!["example.com/api", "example.com/tools"]);
        assert_eq!(workspace.local_replaces.len(), 1);

        let api = &topology.modules["example.com/api"];
        assert_eq!(api.local_replaces.len(), 1);
        assert_eq!(api.local_replaces[0].new_path, "../tools");
        assert!(!api.vendor);
        assert!(topology.modules["example.com/tools"].vendor);

        assert_eq!(topology.packages.len(), 2);
        assert_eq!(toolchain.listed_dirs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn workspace_member_outside_root() {
        let temp = TempDir::new().unwrap();
        let root = root(&temp).join("ws");
        write(&root.join("go.work"), "go 1.22\nuse ../elsewhere\n");

        let toolchain = FakeToolchain {
            env: GoEnv {
                gowork: Some(root.join("go.work")),
                gomod: None,
            },
            ..Default::default()
        };

        let err = Topology::resolve(&toolchain, &root, &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GococoError::MemberOutsideProject { .. }));
    }

    #[tokio::test]
    async fn vendor_forced_by_build_mode() {
        let temp = TempDir::new().unwrap();
        let root = root(&temp);
        write(&root.join("go.mod"), "module example.com/m\n");

        let toolchain = FakeToolchain {
            env: GoEnv {
                gowork: None,
                gomod: Some(root.join("go.mod")),
            },
            ..Default::default()
        };
        let options = ResolveOptions {
            build_tags: None,
            build_mod: Some("vendor".to_string()),
        };

        let topology = Topology::resolve(&toolchain, &root, &options).await.unwrap();
        assert!(topology.modules["example.com/m"].vendor);
    }

    #[tokio::test]
    async fn duplicate_and_foreign_packages_are_rejected() {
        let temp = TempDir::new().unwrap();
        let root = root(&temp);
        write(&root.join("go.mod"), "module example.com/m\n");
        let env = GoEnv {
            gowork: None,
            gomod: Some(root.join("go.mod")),
        };

        let lib = package(&root.join("lib"), "example.com/m/lib", "lib", "example.com/m", &["lib.go"], &[]);
        let toolchain = FakeToolchain {
            env: env.clone(),
            listings: HashMap::from([(root.clone(), vec![lib.clone(), lib])]),
            ..Default::default()
        };
        let err = Topology::resolve(&toolchain, &root, &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GococoError::DuplicatePackage(_)));

        let foreign = package(&root.join("x"), "example.com/x", "x", "example.com/x", &["x.go"], &[]);
        let toolchain = FakeToolchain {
            env,
            listings: HashMap::from([(root.clone(), vec![foreign])]),
            ..Default::default()
        };
        let err = Topology::resolve(&toolchain, &root, &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GococoError::ForeignPackage { .. }));
    }
}
