//! Hatchery Engine -- headless simulation loop over pooled characters.
//!
//! Wraps a [`GameContext`](hatchery_pool::context::GameContext) in a
//! fixed-timestep [`TickLoop`](tick::TickLoop) that runs gameplay systems,
//! advances suspended spawns and trims pools on a schedule.
//!
//! # Quick Start
//!
//! ```
//! use hatchery_engine::prelude::*;
//!
//! let data = StaticDataProvider::new().with("goblin_normal", ArchetypeData::new("greenskins"));
//! let mut ctx = GameContext::new(PoolConfig::default(), data);
//! ctx.register_archetype_prefab("goblin_normal", ArchetypePrefab::default()).unwrap();
//!
//! let mut tick_loop = TickLoop::new(ctx, TickConfig::default());
//! register_default_systems(&mut tick_loop);
//! tick_loop.add_system("reaper", reaper_system);
//!
//! let goblin = tick_loop
//!     .context_mut()
//!     .acquire_entity("goblin_normal", SpawnOptions::at(1.0, 1.0))
//!     .unwrap();
//! tick_loop.run_ticks(3);
//! assert!(tick_loop.context().is_active(goblin));
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod logging;
pub mod systems;
pub mod tick;
pub mod wave;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{EngineConfig, EngineConfigError};
    pub use crate::logging::init_tracing;
    pub use crate::systems::register_default_systems;
    pub use crate::tick::{SystemFn, TickConfig, TickDiagnostics, TickLoop};
    pub use crate::wave::{reap_defeated, reaper_system, WaveDirector, WaveReport};
    pub use hatchery_pool::prelude::*;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn engine_config_builds_a_running_loop() {
        let config = EngineConfig::from_json_str(
            r#"{
                "tick": { "maintenance_interval": 10 },
                "pools": { "archetypes": { "goblin_normal": { "max_size": 2 } } }
            }"#,
        )
        .unwrap();
        let data =
            StaticDataProvider::new().with("goblin_normal", ArchetypeData::new("greenskins"));
        let ctx = GameContext::new(config.pools.clone(), data);
        assert!(ctx.archetype("goblin_normal").is_some());

        let mut tick_loop = TickLoop::new(ctx, config.tick.clone());
        register_default_systems(&mut tick_loop);
        assert_eq!(tick_loop.system_count(), 5);

        let mut director = WaveDirector::new(config.seed).with_archetype("goblin_normal", 1);
        director.spawn_wave(tick_loop.context_mut(), 4);
        tick_loop.run_ticks(2);
        assert_eq!(tick_loop.context().active_count(), 4);
    }

    #[test]
    fn reaper_system_recycles_within_bounds() {
        let data =
            StaticDataProvider::new().with("goblin_normal", ArchetypeData::new("greenskins"));
        let mut ctx = GameContext::new(PoolConfig::default(), data);
        ctx.register_archetype_prefab("goblin_normal", ArchetypePrefab::default().with_bounds(2, 0))
            .unwrap();
        let mut tick_loop = TickLoop::new(ctx, TickConfig::default());
        tick_loop.add_system("reaper", reaper_system);

        for _ in 0..5 {
            tick_loop
                .context_mut()
                .acquire_entity("goblin_normal", SpawnOptions::default())
                .unwrap();
        }
        for e in tick_loop.context().active_entities() {
            tick_loop.context_mut().world_mut().get_component_mut::<Stats>(e).unwrap().health = 0.0;
        }
        tick_loop.tick();

        let ctx = tick_loop.context();
        assert_eq!(ctx.active_count(), 0);
        assert_eq!(ctx.pool_stats("goblin_normal").size, 2);
        assert_eq!(ctx.pool_stats("goblin_normal").destroy_count, 3);
        assert_eq!(ctx.world().entity_count(), 2);
    }
}
