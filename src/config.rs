//! Configuration for index engines and the engine manager.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PikeError, Result};

/// BM25 parameters used by the relevance scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,

    /// Length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params { k1: 1.2, b: 0.75 }
    }
}

/// Configuration for a single index engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scoring parameters.
    pub bm25: Bm25Params,

    /// Number of committed segments above which all segments are merged.
    pub max_segments: usize,

    /// Whether file writes are fsynced on commit.
    pub sync_writes: bool,

    /// Row count used when a query does not give one.
    pub default_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            max_segments: 10,
            sync_writes: true,
            default_rows: 10,
        }
    }
}

/// Configuration for the [`IndexManager`](crate::manager::IndexManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directory holding one sub-directory per index.
    pub data_directory: PathBuf,

    /// Thread pool size for federated fan-out.
    /// If None, uses the number of CPU cores.
    pub thread_pool_size: Option<usize>,

    /// Configuration applied to every engine the manager opens.
    pub engine: EngineConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("./pike_data"),
            thread_pool_size: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ManagerConfig {
    /// Load a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PikeError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: ManagerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.thread_pool_size == Some(0) {
            return Err(PikeError::invalid_config("thread_pool_size must be positive"));
        }
        if self.engine.max_segments == 0 {
            return Err(PikeError::invalid_config("max_segments must be positive"));
        }
        if self.engine.bm25.k1 < 0.0 || !(0.0..=1.0).contains(&self.engine.bm25.b) {
            return Err(PikeError::invalid_config(
                "bm25 requires k1 >= 0 and 0 <= b <= 1",
            ));
        }
        Ok(())
    }
}
