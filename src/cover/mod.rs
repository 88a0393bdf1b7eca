//! Coverage counter injection
//!
//! Every Go file reachable from an entry point gets a counter named
//! `GoCover_<seq>_<suffix>`, where the suffix is derived from the package
//! import path and `seq` counts the files of that package. Packages shared
//! between entry points are instrumented once.

mod inject;

pub use inject::Injector;

#[cfg(test)]
pub(crate) use inject::tests::FakeAnnotator;

use crate::error::{GococoError, GococoResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifier of the global counter table handed to the annotator
pub const COUNTER_TABLE: &str = "GoCoverCounters";

/// Summary file name inside the cache root
pub const SUMMARY_FILE: &str = "cover.json";

/// Counter assigned to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageVar {
    /// `<import-path>/<file-name>`
    pub file: String,
    pub var: String,
}

/// Counters of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageCover {
    pub import_path: String,
    pub dir: PathBuf,
    /// Keyed by file name
    pub vars: BTreeMap<String, CoverageVar>,
}

/// Everything instrumented for one entry point
#[derive(Debug, Clone, Serialize)]
pub struct EntryCover {
    pub entry: String,
    pub packages: BTreeMap<String, Arc<PackageCover>>,
    /// Counter declarations of every reachable package, in reach order
    #[serde(skip)]
    pub declarations: String,
}

impl EntryCover {
    /// Total number of counters reachable from this entry point
    pub fn counter_count(&self) -> usize {
        self.packages.values().map(|p| p.vars.len()).sum()
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    generated_at: DateTime<Utc>,
    counter_table: &'static str,
    entries: &'a [EntryCover],
}

/// Hex of the first 6 bytes of SHA-256 over the import path
pub fn counter_suffix(import_path: &str) -> String {
    let digest = Sha256::digest(import_path.as_bytes());
    hex::encode(&digest[..6])
}

pub fn counter_name(seq: usize, suffix: &str) -> String {
    format!("GoCover_{}_{}", seq, suffix)
}

/// Write the per-entry counter assignment as pretty JSON
pub fn write_summary(path: &Path, entries: &[EntryCover]) -> GococoResult<()> {
    let summary = Summary {
        generated_at: Utc::now(),
        counter_table: COUNTER_TABLE,
        entries,
    };
    let json = serde_json::to_string_pretty(&summary)?;

    std::fs::write(path, json + "\n")
        .map_err(|e| GococoError::io(format!("writing {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn suffix_is_twelve_hex_chars() {
        let suffix = counter_suffix("example.com/m/lib");
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(suffix, counter_suffix("example.com/m/lib"));
        assert_ne!(suffix, counter_suffix("example.com/m"));
    }

    #[test]
    fn suffix_matches_sha256_prefix() {
        // sha256("") = e3b0c44298fc1c149afbf4c8996fb924...
        assert_eq!(counter_suffix(""), "e3b0c44298fc");
    }

    #[test]
    fn name_format() {
        assert_eq!(counter_name(3, "e3b0c44298fc"), "GoCover_3_e3b0c44298fc");
    }

    #[test]
    fn summary_is_pretty_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SUMMARY_FILE);

        let mut vars = BTreeMap::new();
        vars.insert(
            "main.go".to_string(),
            CoverageVar {
                file: "example.com/m/main.go".to_string(),
                var: "GoCover_0_abcdefabcdef".to_string(),
            },
        );
        let package = Arc::new(PackageCover {
            import_path: "example.com/m".to_string(),
            dir: PathBuf::from("/p"),
            vars,
        });
        let entry = EntryCover {
            entry: "example.com/m".to_string(),
            packages: BTreeMap::from([("example.com/m".to_string(), package)]),
            declarations: "var GoCover_0_abcdefabcdef = struct{}{}\n".to_string(),
        };

        write_summary(&path, &[entry]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();

        assert!(written.contains("\n  \"counter_table\""));
        assert_eq!(value["counter_table"], "GoCoverCounters");
        assert_eq!(
            value["entries"][0]["packages"]["example.com/m"]["vars"]["main.go"]["var"],
            "GoCover_0_abcdefabcdef"
        );
        assert!(value["entries"][0].get("declarations").is_none());
    }
}
