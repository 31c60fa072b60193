//! Engine configuration: tick timing, pool settings and log filter in one
//! JSON document.

use std::path::Path;

use hatchery_pool::config::PoolConfig;
use hatchery_pool::error::DataError;
use serde::{Deserialize, Serialize};

use crate::tick::TickConfig;

#[derive(Debug, thiserror::Error)]
pub enum EngineConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid engine config: {reason}")]
    Invalid { reason: String },

    #[error(transparent)]
    Pools(#[from] DataError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick: TickConfig,
    pub pools: PoolConfig,
    /// `tracing_subscriber` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Seed for wave generation.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            pools: PoolConfig::default(),
            log_filter: "warn".to_owned(),
            seed: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| EngineConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<(), EngineConfigError> {
        if !(self.tick.fixed_dt.is_finite() && self.tick.fixed_dt > 0.0) {
            return Err(EngineConfigError::Invalid {
                reason: format!("tick.fixed_dt must be positive, got {}", self.tick.fixed_dt),
            });
        }
        let factor = self.pools.eviction_factor;
        if factor.is_nan() || factor < 1.0 {
            return Err(EngineConfigError::Invalid {
                reason: format!("pools.eviction_factor must be at least 1.0, got {factor}"),
            });
        }
        Ok(())
    }
}
