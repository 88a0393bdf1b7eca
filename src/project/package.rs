//! Package records reported by `go list -json`
//!
//! A subset of the package struct the go command prints. Field names follow
//! the go command's JSON output; missing fields default to empty.

use crate::error::{GococoError, GococoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One package as listed by the go command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Package {
    /// Directory containing the package sources
    pub dir: PathBuf,
    /// Import path, unique across the package map
    pub import_path: String,
    /// Package name (`main` for commands)
    pub name: String,
    /// Owning module
    pub module: Option<ModuleInfo>,

    /// .go source files (excluding cgo and test files)
    pub go_files: Vec<String>,
    /// .go source files that import "C"
    pub cgo_files: Vec<String>,
    /// .go output from running cgo
    pub compiled_go_files: Vec<String>,
    /// .go files excluded by build constraints
    pub ignored_go_files: Vec<String>,
    /// non-.go files excluded by build constraints
    pub ignored_other_files: Vec<String>,
    #[serde(rename = "CFiles")]
    pub c_files: Vec<String>,
    #[serde(rename = "CXXFiles")]
    pub cxx_files: Vec<String>,
    #[serde(rename = "MFiles")]
    pub m_files: Vec<String>,
    #[serde(rename = "HFiles")]
    pub h_files: Vec<String>,
    #[serde(rename = "FFiles")]
    pub f_files: Vec<String>,
    #[serde(rename = "SFiles")]
    pub s_files: Vec<String>,
    pub swig_files: Vec<String>,
    #[serde(rename = "SwigCXXFiles")]
    pub swig_cxx_files: Vec<String>,
    pub syso_files: Vec<String>,
    /// Files matched by //go:embed patterns
    pub embed_files: Vec<String>,

    /// Import paths used directly by this package
    pub imports: Vec<String>,
    /// All transitively imported packages
    pub deps: Vec<String>,

    /// Error loading the package, fatal when present
    pub error: Option<PackageError>,
}

/// Module information attached to a listed package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModuleInfo {
    pub path: String,
    pub version: String,
    pub main: bool,
    pub dir: Option<PathBuf>,
    pub go_mod: Option<PathBuf>,
}

/// Error attached to a listed package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PackageError {
    pub import_stack: Vec<String>,
    pub pos: String,
    pub err: String,
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pos.is_empty() {
            write!(f, "{}", self.err)
        } else {
            write!(f, "{}: {}", self.pos, self.err)
        }
    }
}

impl Package {
    /// Whether this package builds into a standalone program
    pub fn is_command(&self) -> bool {
        self.name == "main"
    }

    /// Module path of the owning module, if any
    pub fn module_path(&self) -> Option<&str> {
        self.module.as_ref().map(|m| m.path.as_str())
    }

    /// Every file the build may read, in a fixed category order
    pub fn tracked_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        [
            &self.go_files,
            &self.cgo_files,
            &self.compiled_go_files,
            &self.ignored_go_files,
            &self.c_files,
            &self.ignored_other_files,
            &self.cxx_files,
            &self.m_files,
            &self.h_files,
            &self.f_files,
            &self.s_files,
            &self.swig_files,
            &self.swig_cxx_files,
            &self.syso_files,
            &self.embed_files,
        ]
        .into_iter()
        .flatten()
        .map(|name| self.dir.join(name))
    }

    /// Go compilation units that can carry a coverage counter, in counter order
    pub fn coverable_files(&self) -> impl Iterator<Item = &str> + '_ {
        self.go_files
            .iter()
            .chain(self.cgo_files.iter())
            .map(String::as_str)
    }

    /// Absolute path of one of this package's files
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

/// Decode the concatenated JSON objects printed by `go list -json`.
///
/// Records are decoded one at a time; the first record carrying an error
/// aborts the whole listing.
pub fn decode_package_stream(output: &[u8]) -> GococoResult<Vec<Package>> {
    let mut packages = Vec::new();

    for record in serde_json::Deserializer::from_slice(output).into_iter::<Package>() {
        let package = record?;
        if let Some(ref err) = package.error {
            return Err(GococoError::PackageList {
                import_path: package.import_path.clone(),
                reason: err.to_string(),
            });
        }
        packages.push(package);
    }

    Ok(packages)
}
