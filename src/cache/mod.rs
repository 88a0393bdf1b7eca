//! Shadow cache of the project
//!
//! The cache root (`.gococo` by default) holds the mirrored project, the
//! digest used to decide whether the mirror is stale, and the coverage
//! summary of the last instrumented build.
//!
//! # Layout
//!
//! | Path | Description |
//! |------|-------------|
//! | `<root>/.gococo/project/` | Mirror of every tracked file |
//! | `<root>/.gococo/digest.modtime` | Modification times of the mirrored files |
//! | `<root>/.gococo/cover.json` | Counters assigned per entry point |
//! | `<root>/.gococo.lock` | Cross-process compile lock |

pub mod digest;
pub mod lock;
pub mod shadow;

pub use digest::CacheDigest;
pub use lock::{CompileLock, CompileLockGuard, DEFAULT_LOCK_TIMEOUT, DEFAULT_POLL_INTERVAL, LOCK_FILE};
pub use shadow::{check_dir_name, CopyObserver, ShadowCache, DEFAULT_CACHE_DIR, DIGEST_FILE, MIRROR_DIR};
