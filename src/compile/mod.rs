//! Compile orchestration
//!
//! Sequences one instrumented build:
//!
//! ```text
//! Init -> ArgsResolved -> TopologyResolved -> LockAcquired -> CacheSynced
//!      -> Unchanged | ManifestsRewritten -> Injected
//!      -> BuildDelegated -> Done
//! ```
//!
//! The compile lock covers everything that touches the shadow copy and is
//! released before the go command runs. An unchanged cache skips the
//! rewrite and injection (the persisted mirror is already instrumented) but
//! still delegates the build.

mod flags;

pub use flags::GoFlags;

use crate::cache::{CompileLock, ShadowCache};
use crate::config::Config;
use crate::cover::{write_summary, EntryCover, Injector, SUMMARY_FILE};
use crate::error::{GococoError, GococoResult};
use crate::project::{rewrite_manifests, Topology};
use crate::toolchain::{Annotator, BuildInvocation, BuildVerb, Toolchain};
use crate::ui::{self, CopyProgress, TaskSpinner, UiContext};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileState {
    Init,
    ArgsResolved,
    TopologyResolved,
    LockAcquired,
    CacheSynced,
    Unchanged,
    ManifestsRewritten,
    Injected,
    BuildDelegated,
    Done,
}

impl fmt::Display for CompileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::ArgsResolved => "args-resolved",
            Self::TopologyResolved => "topology-resolved",
            Self::LockAcquired => "lock-acquired",
            Self::CacheSynced => "cache-synced",
            Self::Unchanged => "unchanged",
            Self::ManifestsRewritten => "manifests-rewritten",
            Self::Injected => "injected",
            Self::BuildDelegated => "build-delegated",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// One `gococo build` / `gococo install` call
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub verb: BuildVerb,
    /// Directory the user ran gococo from
    pub work_dir: PathBuf,
    /// Arguments after the subcommand, go build style
    pub args: Vec<String>,
}

/// Result of a successful compile
#[derive(Debug)]
pub struct CompileOutcome {
    /// Whether the shadow copy was refreshed and instrumented again
    pub refreshed: bool,
    /// Project root (directory of go.work or go.mod)
    pub project_root: PathBuf,
    /// Working directory inside the shadow copy
    pub shadow_work_dir: PathBuf,
    /// Counters assigned by this run; empty when the cache was unchanged
    pub covers: Vec<EntryCover>,
    /// The delegated go command
    pub invocation: BuildInvocation,
}

/// Compile orchestrator
pub struct Compile {
    toolchain: Arc<dyn Toolchain>,
    annotator: Arc<dyn Annotator>,
    config: Config,
    ui: UiContext,
    state: CompileState,
}

impl Compile {
    pub fn new(
        toolchain: Arc<dyn Toolchain>,
        annotator: Arc<dyn Annotator>,
        config: Config,
        ui: UiContext,
    ) -> Self {
        Self {
            toolchain,
            annotator,
            config,
            ui,
            state: CompileState::Init,
        }
    }

    /// Current state
    pub fn state(&self) -> CompileState {
        self.state
    }

    fn advance(&mut self, next: CompileState) {
        debug!("compile: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run one instrumented build from `Init` to `Done`
    pub async fn run(&mut self, request: &CompileRequest) -> GococoResult<CompileOutcome> {
        self.state = CompileState::Init;

        let flags = GoFlags::parse(&request.args, &request.work_dir, request.verb)?;
        self.advance(CompileState::ArgsResolved);

        let mut spinner = TaskSpinner::new(&self.ui);
        spinner.start("Resolving project...");
        let topology = match Topology::resolve(
            self.toolchain.as_ref(),
            &request.work_dir,
            &flags.resolve_options(),
        )
        .await
        {
            Ok(topology) => topology,
            Err(e) => {
                spinner.stop_error("Project resolution failed");
                return Err(e);
            }
        };
        spinner.stop(&format!(
            "Resolved {} modules, {} packages",
            topology.modules.len(),
            topology.packages.len()
        ));
        self.advance(CompileState::TopologyResolved);

        let lock = CompileLock::for_project(&topology.root)
            .with_timeout(self.config.lock.timeout())
            .with_poll_interval(self.config.lock.poll_interval());
        let guard = lock.acquire().await?;
        self.advance(CompileState::LockAcquired);

        let mut cache = ShadowCache::new(&topology.root, &self.config.cache.dir_name)?;
        for path in &self.config.cache.exclude {
            cache.exclude(path);
        }
        cache.track_topology(&topology)?;

        let refreshed = cache.sync(&CopyProgress::new(&self.ui))?;
        self.advance(CompileState::CacheSynced);

        let shadow_root = cache.mirror_dir().to_path_buf();
        let covers = if refreshed {
            let rewritten = rewrite_manifests(&topology, &shadow_root)?;
            self.advance(CompileState::ManifestsRewritten);

            let annotator = Arc::clone(&self.annotator);
            let mut injector = Injector::new(&topology, annotator.as_ref(), &shadow_root);
            let covers = injector.inject_all().await?;
            let annotated = injector.annotated_files();
            write_summary(&cache.cache_root().join(SUMMARY_FILE), &covers)?;
            cache.save_digest()?;
            self.advance(CompileState::Injected);

            let files = cache.digest().map(|d| d.len()).unwrap_or_default();
            ui::step_ok_detail(&self.ui, "Shadow copy refreshed", &format!("{} files", files));
            if rewritten.is_empty() {
                debug!("No manifest needed rewriting");
            } else {
                ui::step_ok_detail(
                    &self.ui,
                    "Manifests rewritten",
                    &format!("{}", rewritten.len()),
                );
            }
            if covers.is_empty() {
                ui::step_warn(&self.ui, "No main packages found, nothing was instrumented");
            } else {
                ui::step_ok_detail(
                    &self.ui,
                    "Coverage counters injected",
                    &format!("{} files", annotated),
                );
            }
            covers
        } else {
            self.advance(CompileState::Unchanged);
            ui::step_info(&self.ui, "Shadow copy up to date, reusing instrumentation");
            Vec::new()
        };

        let shadow_work_dir = cache.mirror_path(&topology.work_dir)?;
        std::fs::create_dir_all(&shadow_work_dir).map_err(|e| {
            GococoError::io(format!("creating {}", shadow_work_dir.display()), e)
        })?;
        guard.release();

        let invocation = BuildInvocation {
            verb: request.verb,
            dir: shadow_work_dir.clone(),
            args: flags.build_args(),
        };
        ui::remark(&self.ui, &invocation.display_args());
        self.toolchain.build(&invocation).await?;
        self.advance(CompileState::BuildDelegated);

        self.advance(CompileState::Done);
        Ok(CompileOutcome {
            refreshed,
            project_root: topology.root,
            shadow_work_dir,
            covers,
            invocation,
        })
    }
}
