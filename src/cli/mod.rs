//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{BuildArgs, CleanArgs, Cli, Commands};
