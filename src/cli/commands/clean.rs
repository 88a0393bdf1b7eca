//! Clean command - remove a project's shadow cache

use super::current_dir;
use crate::cache::{CompileLock, ShadowCache};
use crate::cli::args::CleanArgs;
use crate::config::Config;
use crate::error::{GococoError, GococoResult};
use crate::paths;
use crate::toolchain::{GoToolchain, Toolchain};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Execute the clean command
pub async fn execute(args: CleanArgs, config: &Config) -> GococoResult<()> {
    let ctx = UiContext::detect();

    let root = match args.project {
        Some(project) => paths::absolutize(&current_dir()?, &project),
        None => project_root(config).await?,
    };

    let cache = ShadowCache::at(&root, &config.cache.dir_name)?;
    let guard = CompileLock::for_project(&root)
        .with_timeout(config.lock.timeout())
        .with_poll_interval(config.lock.poll_interval())
        .acquire()
        .await?;
    let removed = cache.clear()?;
    guard.release();

    if removed {
        ui::step_ok_detail(&ctx, "Removed shadow cache", &cache.cache_root().display().to_string());
    } else {
        ui::step_info(
            &ctx,
            &format!("No shadow cache at {}", cache.cache_root().display()),
        );
    }
    Ok(())
}

/// Directory of the active go.work or go.mod
async fn project_root(config: &Config) -> GococoResult<PathBuf> {
    let work_dir = current_dir()?;
    let env = GoToolchain::new(&config.toolchain.go).env(&work_dir).await?;

    env.gowork
        .or(env.gomod)
        .as_deref()
        .and_then(|manifest| manifest.parent())
        .map(paths::normalize)
        .ok_or(GococoError::NotModuleProject(work_dir))
}
