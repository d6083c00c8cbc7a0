// ============================================================
// Layer 6 — Run Configuration Store
// ============================================================
// Loads an optional JSON config file supplied on the command
// line and records the effective configuration of every run
// next to its outputs:
//
//   out/
//     run_config.json   ← the exact settings this run used
//     stats.csv
//     ...
//
// Keeping the settings beside the data makes any output
// directory reproducible without the original command line.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const RUN_CONFIG_FILE: &str = "run_config.json";

/// Read a JSON config file into `T`.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid config in '{}'", path.display()))
}

/// Writes and reads the run configuration of one output directory.
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(RUN_CONFIG_FILE)
    }

    pub fn save<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.path();
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json).with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }
}
