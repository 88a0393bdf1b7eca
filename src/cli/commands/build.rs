//! Build and install commands - instrument, then delegate to go

use super::current_dir;
use crate::cli::args::BuildArgs;
use crate::compile::{Compile, CompileRequest};
use crate::config::Config;
use crate::error::GococoResult;
use crate::toolchain::{BuildVerb, GoToolCover, GoToolchain, Toolchain};
use crate::ui::{self, UiContext};
use std::sync::Arc;
use tracing::debug;

/// Execute `gococo build` or `gococo install`
pub async fn execute(args: BuildArgs, verb: BuildVerb, config: &Config) -> GococoResult<()> {
    let ctx = UiContext::detect();
    let work_dir = current_dir()?;
    let cover_mode = config.toolchain.cover_mode()?;

    let toolchain = Arc::new(GoToolchain::new(&config.toolchain.go));
    let annotator = Arc::new(GoToolCover::new(&config.toolchain.go, cover_mode));
    debug!(
        "Using {} at {}, cover mode {}",
        toolchain.name(),
        config.toolchain.go.display(),
        cover_mode
    );

    ui::intro(&ctx, &format!("gococo {}", verb));

    let mut compile = Compile::new(toolchain, annotator, config.clone(), ctx);
    let outcome = compile
        .run(&CompileRequest {
            verb,
            work_dir,
            args: args.args,
        })
        .await?;

    ui::key_value(&ctx, "Project", &outcome.project_root.display().to_string());
    ui::key_value(&ctx, "Shadow copy", &outcome.shadow_work_dir.display().to_string());
    for entry in &outcome.covers {
        ui::key_value(
            &ctx,
            &entry.entry,
            &format!("{} counters", entry.counter_count()),
        );
    }

    ui::outro_success(&ctx, &format!("go {} finished", verb));
    Ok(())
}
