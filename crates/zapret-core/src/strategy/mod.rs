//! DPI-bypass strategies
//!
//! Strategies come from two kinds of files in a directory:
//! - **bat** - launcher scripts with `REM KEY: value` metadata
//! - **json** - collections keyed by id or listed under `strategies`
//!
//! Both are adapted into [`StrategyInfo`] and can be filtered and sorted with
//! [`filter_and_sort`].

mod bat;
mod filter;
mod info;
mod json;

pub use bat::{load_bat, parse_bat};
pub use filter::{filter_and_sort, SortKey, SortOrder, StrategyFilter};
pub use info::{
    parse_port_list, split_command_line, PortRange, SourceKind, StrategyInfo, StrategyLabel,
    StrategySource,
};
pub use json::{load_json, parse_json};

use crate::error::Result;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// All strategies found in a directory
#[derive(Debug, Clone, Default)]
pub struct StrategyCatalog {
    dir: PathBuf,
    strategies: Vec<StrategyInfo>,
}

impl StrategyCatalog {
    /// Scan `dir` for `*.bat` and `*.json` files
    ///
    /// Malformed files are logged and skipped. When two files yield the same
    /// id the first one in file name order wins.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let mut strategies = Vec::new();
        let mut seen = HashSet::new();
        for path in files {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            let loaded = match ext.as_deref() {
                Some("bat") | Some("cmd") => load_bat(&path).map(|s| vec![s]),
                Some("json") => load_json(&path),
                _ => continue,
            };
            match loaded {
                Ok(found) => {
                    for strategy in found {
                        if seen.insert(strategy.id.clone()) {
                            strategies.push(strategy);
                        } else {
                            debug!(id = %strategy.id, path = %path.display(), "Duplicate strategy id ignored");
                        }
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping strategy file"),
            }
        }

        info!(dir = %dir.display(), count = strategies.len(), "Loaded strategies");
        Ok(Self {
            dir: dir.to_path_buf(),
            strategies,
        })
    }

    /// Build a catalog from already adapted records
    pub fn from_strategies(strategies: Vec<StrategyInfo>) -> Self {
        Self {
            dir: PathBuf::new(),
            strategies,
        }
    }

    /// Directory the catalog was read from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All strategies in load order
    pub fn all(&self) -> &[StrategyInfo] {
        &self.strategies
    }

    /// Strategy by id (case-insensitive)
    pub fn get(&self, id: &str) -> Option<&StrategyInfo> {
        self.strategies.iter().find(|s| s.id.eq_ignore_ascii_case(id))
    }

    /// Filtered and sorted view
    pub fn query(&self, filter: &StrategyFilter, key: SortKey, order: SortOrder) -> Vec<&StrategyInfo> {
        filter_and_sort(&self.strategies, filter, key, order)
    }

    /// Number of strategies
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether no strategies were found
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_dir_skips_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alt.bat"), "REM NAME: Alt\nwinws.exe --filter-tcp=443 --dpi-desync=fake\n").unwrap();
        fs::write(dir.path().join("broken.bat"), "echo nothing here\n").unwrap();
        fs::write(dir.path().join("bad.json"), "[1, 2").unwrap();
        fs::write(
            dir.path().join("more.json"),
            r#"{"alt": {"name": "Shadowed", "args": []}, "quic": {"args": ["--filter-udp=443"]}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("readme.txt"), "ignored").unwrap();

        let catalog = StrategyCatalog::load_dir(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("ALT").unwrap().name, "Alt");
        assert!(catalog.get("quic").is_some());
    }

    #[test]
    fn test_load_missing_dir() {
        assert!(StrategyCatalog::load_dir("/definitely/not/here").is_err());
    }
}
