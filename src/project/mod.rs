//! Go project model
//!
//! Package records from `go list`, go.mod/go.work parsing, topology
//! resolution and the manifest rewrite applied to the shadow copy.

mod modfile;
mod package;
mod rewrite;
mod topology;

pub use modfile::{format_path, ModFile, Replace};
pub use package::{decode_package_stream, ModuleInfo, Package, PackageError};
pub use rewrite::{rewrite_manifest, rewrite_manifests};
pub use topology::{Module, ResolveOptions, Topology, Workspace};

#[cfg(test)]
pub(crate) use topology::tests::{package as test_package, FakeToolchain};
