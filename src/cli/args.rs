//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// gococo - Go coverage instrumentation builds
///
/// Mirrors a Go module project into a private shadow copy, injects
/// coverage counters into every package reachable from a main package and
/// builds the instrumented copy with the go command.
#[derive(Parser, Debug)]
#[command(name = "gococo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "GOCOCO_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Instrument the project and run `go build` on the shadow copy
    Build(BuildArgs),

    /// Instrument the project and run `go install` on the shadow copy
    Install(BuildArgs),

    /// Remove the shadow cache of a project
    Clean(CleanArgs),
}

/// Arguments for the build and install commands
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// go build flags followed by packages
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 0..,
        value_name = "GO_ARGS"
    )]
    pub args: Vec<String>,
}

/// Arguments for the clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Project root (default: the module or workspace of the current directory)
    #[arg(short, long)]
    pub project: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_forwards_go_flags() {
        let cli = Cli::parse_from(["gococo", "-v", "build", "-v", "-o", "bin/app", "./cmd/app"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.args, vec!["-v", "-o", "bin/app", "./cmd/app"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn install_without_args() {
        let cli = Cli::parse_from(["gococo", "install"]);
        assert!(matches!(cli.command, Commands::Install(ref a) if a.args.is_empty()));
    }

    #[test]
    fn clean_with_project() {
        let cli = Cli::parse_from(["gococo", "clean", "--project", "/p"]);
        match cli.command {
            Commands::Clean(args) => assert_eq!(args.project, Some(PathBuf::from("/p"))),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
