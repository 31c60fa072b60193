//! Error types for the pooling layer.
//!
//! Construction-time failures abort the spawn and reach the caller as a
//! [`SpawnError`]. Everything that can be recovered locally (a missing atlas,
//! a duplicate lifecycle call, a full pool on release) is logged where it
//! happens and never shows up here.

use hatchery_ecs::entity::EntityId;
use hatchery_ecs::EcsError;

use crate::archetype::{ArchetypeId, ComponentKind};
use crate::factory::SpawnTicket;
use crate::lifecycle::LifecycleState;

/// Failure to give an entity its required component set.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InjectionError {
    /// The facade needs a sibling that is not attached after injection.
    #[error("entity {entity} cannot be composed: missing '{component}' component")]
    MissingComponentDependency {
        entity: EntityId,
        component: ComponentKind,
    },

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// Failure to push archetype data into an entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The data provider has no record for this archetype (or has not
    /// finished loading).
    #[error("no archetype data available for '{archetype}'")]
    DataUnavailable { archetype: ArchetypeId },

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// Invalid lifecycle transition. Duplicate transitions are not errors; see
/// [`Transition::Ignored`](crate::lifecycle::Transition::Ignored).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("entity {entity} is not tracked by the lifecycle coordinator")]
    Untracked { entity: EntityId },

    #[error("entity {entity} cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        entity: EntityId,
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

/// Non-critical visual asset failure. Logged and recovered from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssetError {
    #[error("archetype data names no animation atlas")]
    MissingAtlas,

    #[error("animation atlas '{atlas}' not found")]
    AtlasNotFound { atlas: String },

    /// Setup was still in flight when a synchronous configure needed it.
    #[error("animation atlas '{atlas}' not ready")]
    NotReady { atlas: String },
}

/// Failure to load archetype data.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to parse archetype data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read archetype data from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("archetype data load failed: {reason}")]
    LoadFailed { reason: String },
}

/// Archetype registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A spawn already resolved this archetype; its definition is fixed for
    /// the rest of the session.
    #[error("archetype '{archetype}' is sealed and cannot be re-registered")]
    Sealed { archetype: ArchetypeId },
}

/// Why a spawn or reconfigure yielded no entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpawnError {
    #[error("unknown archetype '{archetype}'")]
    UnknownArchetype { archetype: ArchetypeId },

    /// Fatal construction error; the entity was destroyed, not pooled.
    #[error("entity {entity} is missing required component '{component}'")]
    MissingComponentDependency {
        entity: EntityId,
        component: ComponentKind,
    },

    /// Data was unavailable; the entity went back to its pool.
    #[error("archetype data unavailable for '{archetype}'")]
    ConfigDataUnavailable { archetype: ArchetypeId },

    /// The spawn is waiting on a suspend point. Poll again next tick.
    #[error("spawn {0} is suspended awaiting data or assets")]
    Suspended(SpawnTicket),

    /// The spawn was cancelled before it completed.
    #[error("spawn {0} was cancelled")]
    Cancelled(SpawnTicket),

    #[error("entity {entity} is not active")]
    NotActive { entity: EntityId },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

impl From<InjectionError> for SpawnError {
    fn from(err: InjectionError) -> Self {
        match err {
            InjectionError::MissingComponentDependency { entity, component } => {
                SpawnError::MissingComponentDependency { entity, component }
            }
            InjectionError::Ecs(e) => SpawnError::Ecs(e),
        }
    }
}

impl From<ConfigError> for SpawnError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::DataUnavailable { archetype } => {
                SpawnError::ConfigDataUnavailable { archetype }
            }
            ConfigError::Ecs(e) => SpawnError::Ecs(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injection_error_maps_to_fatal_spawn_error() {
        let entity = EntityId::new(4, 1);
        let err: SpawnError = InjectionError::MissingComponentDependency {
            entity,
            component: ComponentKind::Movement,
        }
        .into();
        assert_eq!(
            err,
            SpawnError::MissingComponentDependency {
                entity,
                component: ComponentKind::Movement
            }
        );
        assert!(err.to_string().contains("movement"));
    }

    #[test]
    fn config_error_maps_to_data_unavailable() {
        let err: SpawnError = ConfigError::DataUnavailable {
            archetype: "goblin_normal".into(),
        }
        .into();
        assert!(matches!(err, SpawnError::ConfigDataUnavailable { .. }));
        assert_eq!(err.to_string(), "archetype data unavailable for 'goblin_normal'");
    }
}
