//! gococo - Go coverage instrumentation builds
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use gococo::cli::{Cli, Commands};
use gococo::config::{Config, ConfigManager};
use gococo::error::GococoResult;
use gococo::toolchain::BuildVerb;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{} {} {}",
                style("Error:").red().bold(),
                style(format!("[{}]", e.kind())).dim(),
                e
            );
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GococoResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;
    config.apply_env()?;

    init_logging(&config, cli.verbose);
    debug!("Configuration loaded from {}", config_manager.path().display());

    gococo::ui::init_theme();

    match cli.command {
        Commands::Build(args) => gococo::cli::commands::build(args, BuildVerb::Build, &config).await,
        Commands::Install(args) => {
            gococo::cli::commands::build(args, BuildVerb::Install, &config).await
        }
        Commands::Clean(args) => gococo::cli::commands::clean(args, &config).await,
    }
}

/// 0 = warn (spinners only), 1 = info, 2+ or GOCOCO_DEBUG = debug.
/// `GOCOCO_LOG` takes a full filter directive and wins over both.
fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        _ if config.general.debug => "debug",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("GOCOCO_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("gococo={}", level)));

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
