//! Externally loaded archetype data and the providers that serve it.
//!
//! Loading is expressed as polling rather than as a future: the tick loop
//! calls [`ArchetypeDataProvider::poll_load`] once per tick until it reports
//! ready, and spawns waiting on data stay suspended until then.

use std::collections::HashMap;
use std::path::Path;
use std::task::Poll;

use serde::{Deserialize, Serialize};

use crate::archetype::ArchetypeId;
use crate::error::DataError;
use crate::spatial::{Rgba, Vec2};

// ---------------------------------------------------------------------------
// ArchetypeData
// ---------------------------------------------------------------------------

/// Who drives an entity's decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Ai,
    Player,
    /// Driven by level scripts; neither AI nor input.
    Scripted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBlock {
    pub max_health: f32,
    pub attack: f32,
    pub defense: f32,
    pub speed: f32,
    pub attack_range: f32,
    /// Seconds between attacks.
    pub attack_cooldown: f32,
}

impl Default for StatBlock {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            attack: 10.0,
            defense: 0.0,
            speed: 1.0,
            attack_range: 1.0,
            attack_cooldown: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorParams {
    pub control_mode: ControlMode,
    pub aggro_range: f32,
    /// Seconds between AI decisions.
    pub think_interval: f32,
    pub ranged: bool,
}

impl Default for BehaviorParams {
    fn default() -> Self {
        Self {
            control_mode: ControlMode::Ai,
            aggro_range: 8.0,
            think_interval: 0.5,
            ranged: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Visuals {
    /// Animation atlas name. `None` leaves the entity without animations.
    pub atlas: Option<String>,
    pub tint: Rgba,
    /// Where projectiles leave the body, relative to the entity origin.
    pub projectile_offset: Vec2,
    pub health_bar_offset: Vec2,
}

/// Everything the distributor pushes into an entity for one archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeData {
    #[serde(default)]
    pub stats: StatBlock,
    #[serde(default)]
    pub behavior: BehaviorParams,
    pub faction: String,
    #[serde(default)]
    pub visuals: Visuals,
}

impl ArchetypeData {
    pub fn new(faction: impl Into<String>) -> Self {
        Self {
            stats: StatBlock::default(),
            behavior: BehaviorParams::default(),
            faction: faction.into(),
            visuals: Visuals::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ArchetypeDataProvider
// ---------------------------------------------------------------------------

/// Source of archetype data.
pub trait ArchetypeDataProvider {
    /// Record for `key`, or `None` if unknown or not loaded yet.
    fn archetype_data(&self, key: &ArchetypeId) -> Option<&ArchetypeData>;

    fn is_data_loaded(&self) -> bool;

    /// Advance loading by one step.
    fn poll_load(&mut self) -> Poll<Result<(), DataError>>;
}

/// Data that is available immediately.
#[derive(Debug, Clone, Default)]
pub struct StaticDataProvider {
    records: HashMap<ArchetypeId, ArchetypeData>,
}

impl StaticDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object mapping archetype ids to records.
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        let records: HashMap<ArchetypeId, ArchetypeData> = serde_json::from_str(json)?;
        tracing::debug!(records = records.len(), "parsed archetype data");
        Ok(Self { records })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn insert(&mut self, key: impl Into<ArchetypeId>, data: ArchetypeData) {
        self.records.insert(key.into(), data);
    }

    pub fn with(mut self, key: impl Into<ArchetypeId>, data: ArchetypeData) -> Self {
        self.insert(key, data);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ArchetypeDataProvider for StaticDataProvider {
    fn archetype_data(&self, key: &ArchetypeId) -> Option<&ArchetypeData> {
        self.records.get(key)
    }

    fn is_data_loaded(&self) -> bool {
        true
    }

    fn poll_load(&mut self) -> Poll<Result<(), DataError>> {
        Poll::Ready(Ok(()))
    }
}

#[derive(Debug, Clone)]
enum Stage {
    Loading { polls_left: u32 },
    Stalled,
    Failing { polls_left: u32, reason: String },
    Loaded,
    Failed { reason: String },
}

/// Wraps a [`StaticDataProvider`] and withholds its records until a number
/// of polls have elapsed. Models an in-flight load; the factory polls it at
/// most once between two spawn sweeps, so a poll count reads as a tick count.
#[derive(Debug, Clone)]
pub struct StagedDataProvider {
    inner: StaticDataProvider,
    stage: Stage,
}

impl StagedDataProvider {
    /// Loaded once `polls` calls to `poll_load` have returned pending.
    pub fn after_polls(inner: StaticDataProvider, polls: u32) -> Self {
        Self {
            inner,
            stage: Stage::Loading { polls_left: polls },
        }
    }

    /// A load that never resolves.
    pub fn never(inner: StaticDataProvider) -> Self {
        Self {
            inner,
            stage: Stage::Stalled,
        }
    }

    /// A load that fails with `reason` after `polls` pending polls.
    pub fn failing_after(polls: u32, reason: impl Into<String>) -> Self {
        Self {
            inner: StaticDataProvider::new(),
            stage: Stage::Failing {
                polls_left: polls,
                reason: reason.into(),
            },
        }
    }
}

impl ArchetypeDataProvider for StagedDataProvider {
    fn archetype_data(&self, key: &ArchetypeId) -> Option<&ArchetypeData> {
        match self.stage {
            Stage::Loaded => self.inner.archetype_data(key),
            _ => None,
        }
    }

    fn is_data_loaded(&self) -> bool {
        matches!(self.stage, Stage::Loaded)
    }

    fn poll_load(&mut self) -> Poll<Result<(), DataError>> {
        match &mut self.stage {
            Stage::Loading { polls_left: 0 } => {
                self.stage = Stage::Loaded;
                tracing::debug!(records = self.inner.len(), "staged archetype data loaded");
                Poll::Ready(Ok(()))
            }
            Stage::Loading { polls_left } => {
                *polls_left -= 1;
                Poll::Pending
            }
            Stage::Stalled => Poll::Pending,
            Stage::Failing { polls_left: 0, reason } => {
                let reason = std::mem::take(reason);
                self.stage = Stage::Failed {
                    reason: reason.clone(),
                };
                Poll::Ready(Err(DataError::LoadFailed { reason }))
            }
            Stage::Failing { polls_left, .. } => {
                *polls_left -= 1;
                Poll::Pending
            }
            Stage::Loaded => Poll::Ready(Ok(())),
            Stage::Failed { reason } => Poll::Ready(Err(DataError::LoadFailed {
                reason: reason.clone(),
            })),
        }
    }
}
