//! Hatchery Pool -- character pooling and component lifecycle.
//!
//! Characters are entities assembled from a fixed set of components. Building
//! one is expensive, so released characters are parked in bounded
//! per-archetype pools and reused: the component set stays, the component
//! state is reset and reconfigured.
//!
//! The moving parts, leaf first:
//!
//! - [`injector::ComponentInjector`] attaches an archetype's components,
//!   exactly once each.
//! - [`configure::ConfigurationDistributor`] pushes archetype data into them
//!   in dependency order.
//! - [`pool::PoolStore`] holds idle entities and usage counters.
//! - [`lifecycle::LifecycleCoordinator`] owns each entity's state machine and
//!   notifies components on reuse and recycle.
//! - [`factory::EntityFactory`] drives a spawn from request to `Active`.
//! - [`recycle::RecycleSink`] takes an active entity back to its pool.
//! - [`context::GameContext`] owns all of the above.
//!
//! # Quick Start
//!
//! ```
//! use hatchery_pool::prelude::*;
//!
//! let data = StaticDataProvider::new().with("goblin_normal", ArchetypeData::new("greenskins"));
//! let mut ctx = GameContext::new(PoolConfig::default(), data);
//! ctx.register_archetype_prefab("goblin_normal", ArchetypePrefab::default()).unwrap();
//!
//! let goblin = ctx.acquire_entity("goblin_normal", SpawnOptions::at(3.0, 4.0)).unwrap();
//! assert_eq!(ctx.active_count(), 1);
//! assert_eq!(ctx.pool_stats("goblin_normal").create_count, 1);
//!
//! ctx.release_entity(goblin);
//! let again = ctx.acquire_entity("goblin_normal", SpawnOptions::default()).unwrap();
//! assert_eq!(again, goblin);
//! assert_eq!(ctx.pool_stats("goblin_normal").acquire_count, 1);
//! ```

#![deny(unsafe_code)]

pub mod archetype;
pub mod collab;
pub mod components;
pub mod config;
pub mod configure;
pub mod context;
pub mod data;
pub mod error;
pub mod factory;
pub mod injector;
pub mod lifecycle;
pub mod pool;
pub mod recycle;
pub mod registry;
pub mod spatial;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::archetype::{
        Archetype, ArchetypeClass, ArchetypeId, ArchetypePrefab, ComponentKind, ComponentProfile,
        PoolBounds,
    };
    pub use crate::collab::{
        AnimationCollaborator, AnimationSetup, AtlasAnimator, FactionCollaborator, FactionTable,
    };
    pub use crate::components::{
        AiIntention, Animation, Combat, Composed, Config, Control, Faction, HealthDisplay, Intent,
        Lifecycle, Movement, Render, Stats,
    };
    pub use crate::config::PoolConfig;
    pub use crate::context::{GameContext, ShutdownReport};
    pub use crate::data::{
        ArchetypeData, ArchetypeDataProvider, ControlMode, StagedDataProvider, StaticDataProvider,
    };
    pub use crate::error::{
        AssetError, ConfigError, DataError, InjectionError, LifecycleError, RegistryError,
        SpawnError,
    };
    pub use crate::factory::{SpawnOptions, SpawnOutcome, SpawnPhase, SpawnTicket};
    pub use crate::lifecycle::{LifecycleState, Transition};
    pub use crate::pool::{PoolStats, ReleaseOutcome};
    pub use crate::recycle::RecycleOutcome;
    pub use crate::spatial::{Rgba, Transform, Vec2};
    pub use hatchery_ecs::prelude::{Component, EntityId, LifecycleEvent, World};
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
