//! File-based configuration for embedding applications.
//!
//! The engine itself takes plain arguments; this module exists for hosts
//! that want to wire the store from a TOML file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_READ_POOL_SIZE: usize = 4;

/// Raw TOML config; every field optional so partial files work.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_path: Option<String>,
    pub read_pool_size: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

/// Resolved configuration consumed by
/// [`SqliteSyncStore::from_config`](crate::sync_store::SqliteSyncStore::from_config).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub db_path: PathBuf,
    pub read_pool_size: usize,
}

impl SyncConfig {
    /// Resolve a raw file config, applying defaults and validating values.
    pub fn resolve(file: FileConfig) -> Result<Self> {
        let db_path = file
            .db_path
            .map(PathBuf::from)
            .context("db_path must be specified in the config file")?;

        let read_pool_size = file.read_pool_size.unwrap_or(DEFAULT_READ_POOL_SIZE);
        if read_pool_size == 0 {
            bail!("read_pool_size must be at least 1");
        }

        Ok(SyncConfig {
            db_path,
            read_pool_size,
        })
    }
}
