use crate::storage::StorageEngine;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Keeper configuration, read from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    pub data_dir: PathBuf,
    pub engine: StorageEngine,
    pub chain_id: String,
    /// tracing filter directive, e.g. `info,vmkeeper=debug`
    pub log_filter: String,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            engine: StorageEngine::default(),
            chain_id: "dev".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl KeeperConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let cfg: KeeperConfig = toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }
}
