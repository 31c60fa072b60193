//! Pool configuration.
//!
//! Loaded from JSON:
//!
//! ```json
//! {
//!   "maintenance_interval_ticks": 600,
//!   "eviction_factor": 1.5,
//!   "class_bounds": { "boss": { "max_size": 2, "preload": 0 } },
//!   "archetypes": {
//!     "goblin_normal": {},
//!     "slime_normal": { "max_size": 1, "preload": 0 }
//!   }
//! }
//! ```
//!
//! Every field is optional.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archetype::{ArchetypeClass, ArchetypeId, ArchetypePrefab, PoolBounds};
use crate::error::DataError;
use crate::pool::DEFAULT_EVICTION_FACTOR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Ticks between pool maintenance passes.
    pub maintenance_interval_ticks: u64,
    /// Pools larger than `eviction_factor * max_size` are trimmed by
    /// maintenance.
    pub eviction_factor: f32,
    /// Replaces the built-in bounds of a class.
    pub class_bounds: HashMap<ArchetypeClass, PoolBounds>,
    /// Archetypes registered when a context is built from this config.
    pub archetypes: BTreeMap<ArchetypeId, ArchetypePrefab>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            maintenance_interval_ticks: 600,
            eviction_factor: DEFAULT_EVICTION_FACTOR,
            class_bounds: HashMap::new(),
            archetypes: BTreeMap::new(),
        }
    }
}

impl PoolConfig {
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        let config: PoolConfig = serde_json::from_str(json)?;
        if config.eviction_factor.is_nan() || config.eviction_factor < 1.0 {
            return Err(DataError::LoadFailed {
                reason: format!(
                    "eviction_factor must be at least 1.0, got {}",
                    config.eviction_factor
                ),
            });
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Effective default bounds for `class`.
    pub fn bounds_for(&self, class: ArchetypeClass) -> PoolBounds {
        self.class_bounds
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_bounds())
    }

    pub fn with_archetype(mut self, id: impl Into<ArchetypeId>, prefab: ArchetypePrefab) -> Self {
        self.archetypes.insert(id.into(), prefab);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = PoolConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PoolConfig::default());
        assert_eq!(config.maintenance_interval_ticks, 600);
        assert_eq!(config.eviction_factor, 1.5);
    }

    #[test]
    fn parses_overrides_and_archetypes() {
        let config = PoolConfig::from_json_str(
            r#"{
                "eviction_factor": 2.0,
                "class_bounds": { "boss": { "max_size": 2, "preload": 0 } },
                "archetypes": {
                    "goblin_normal": {},
                    "slime_normal": { "max_size": 1, "preload": 0 }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.bounds_for(ArchetypeClass::Boss), PoolBounds::new(2, 0));
        assert_eq!(
            config.bounds_for(ArchetypeClass::Minion),
            ArchetypeClass::Minion.default_bounds()
        );
        assert_eq!(config.archetypes.len(), 2);
        assert_eq!(config.archetypes[&ArchetypeId::from("slime_normal")].max_size, Some(1));
    }

    #[test]
    fn rejects_eviction_factor_below_one() {
        let err = PoolConfig::from_json_str(r#"{ "eviction_factor": 0.5 }"#).unwrap_err();
        assert!(matches!(err, DataError::LoadFailed { .. }));
    }
}
