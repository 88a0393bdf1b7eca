//! CLI command implementations

pub mod build;
pub mod clean;

pub use build::execute as build;
pub use clean::execute as clean;

use crate::error::{GococoError, GococoResult};
use std::path::PathBuf;

fn current_dir() -> GococoResult<PathBuf> {
    std::env::current_dir().map_err(|e| GococoError::io("getting current directory", e))
}
