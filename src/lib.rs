//! gococo - Go coverage instrumentation builds
//!
//! Resolves the module/package topology of a Go project, keeps a
//! change-aware shadow copy of it under `.gococo/`, rewrites local replace
//! directives so the copy builds on its own, injects coverage counters
//! into every package reachable from a main package and hands the copy to
//! `go build` or `go install`.

pub mod cache;
pub mod cli;
pub mod compile;
pub mod config;
pub mod cover;
pub mod error;
pub mod paths;
pub mod project;
pub mod toolchain;
pub mod ui;

pub use error::{GococoError, GococoResult};
