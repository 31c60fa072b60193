//! [`GameContext`]: the explicitly constructed owner of all pooling state.
//!
//! There are no global factories or managers. Code that spawns or releases
//! characters is handed a `&mut GameContext`, and a test that wants a clean
//! slate builds a fresh one.

use std::task::Poll;

use hatchery_ecs::prelude::*;

use crate::archetype::{Archetype, ArchetypeId, ArchetypePrefab, ArchetypeRegistry, PoolBounds};
use crate::collab::{AnimationCollaborator, AtlasAnimator, FactionCollaborator, FactionTable};
use crate::components;
use crate::config::PoolConfig;
use crate::data::ArchetypeDataProvider;
use crate::error::{RegistryError, SpawnError};
use crate::factory::{EntityFactory, SpawnEnv, SpawnOptions, SpawnOutcome, SpawnPhase, SpawnTicket};
use crate::lifecycle::{LifecycleCoordinator, LifecycleState};
use crate::pool::{PoolStats, PoolStore};
use crate::recycle::{self, RecycleOutcome, RecycleSink};
use crate::registry::ActiveRegistry;

/// Summary of [`GameContext::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub cancelled: usize,
    pub released: usize,
    pub destroyed: usize,
}

pub struct GameContext {
    config: PoolConfig,
    world: World,
    archetypes: ArchetypeRegistry,
    pools: PoolStore,
    lifecycle: LifecycleCoordinator,
    active: ActiveRegistry,
    factory: EntityFactory,
    sink: RecycleSink,
    data: Box<dyn ArchetypeDataProvider>,
    animations: Box<dyn AnimationCollaborator>,
    factions: Box<dyn FactionCollaborator>,
}

impl std::fmt::Debug for GameContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameContext")
            .field("entities", &self.world.entity_count())
            .field("archetypes", &self.archetypes.len())
            .field("active", &self.active.len())
            .field("pooled", &self.pools.total_idle())
            .field("pending", &self.factory.pending_count())
            .finish()
    }
}

impl GameContext {
    /// Build a context and register every archetype listed in `config`.
    pub fn new(config: PoolConfig, data: impl ArchetypeDataProvider + 'static) -> Self {
        let mut world = World::new();
        components::register_all(&mut world);

        let mut context = Self {
            pools: PoolStore::new(config.eviction_factor),
            config,
            world,
            archetypes: ArchetypeRegistry::new(),
            lifecycle: LifecycleCoordinator::new(),
            active: ActiveRegistry::new(),
            factory: EntityFactory::new(),
            sink: RecycleSink::new(),
            data: Box::new(data),
            animations: Box::new(AtlasAnimator::new()),
            factions: Box::new(FactionTable::new()),
        };

        let prefabs: Vec<_> = context
            .config
            .archetypes
            .iter()
            .map(|(id, prefab)| (id.clone(), prefab.clone()))
            .collect();
        for (id, prefab) in prefabs {
            // A fresh registry has nothing sealed.
            if let Err(err) = context.register_prefab(id, prefab) {
                tracing::warn!(error = %err, "configured archetype not registered");
            }
        }
        tracing::info!(archetypes = context.archetypes.len(), "game context ready");
        context
    }

    pub fn with_animations(mut self, animations: impl AnimationCollaborator + 'static) -> Self {
        self.animations = Box::new(animations);
        self
    }

    pub fn with_factions(mut self, factions: impl FactionCollaborator + 'static) -> Self {
        self.factions = Box::new(factions);
        self
    }

    fn split(&mut self) -> (&mut EntityFactory, &mut RecycleSink, SpawnEnv<'_>) {
        (
            &mut self.factory,
            &mut self.sink,
            SpawnEnv {
                world: &mut self.world,
                archetypes: &mut self.archetypes,
                pools: &mut self.pools,
                lifecycle: &mut self.lifecycle,
                active: &mut self.active,
                data: self.data.as_mut(),
                animations: self.animations.as_mut(),
                factions: self.factions.as_mut(),
            },
        )
    }

    // -- archetypes -----------------------------------------------------------

    fn register_prefab(
        &mut self,
        id: ArchetypeId,
        prefab: ArchetypePrefab,
    ) -> Result<(), RegistryError> {
        let archetype = Archetype::from_prefab(id, prefab, &self.config.class_bounds);
        let (id, bounds) = (archetype.id.clone(), archetype.bounds);
        self.archetypes.register(archetype)?;
        self.pools.configure(&id, bounds);
        tracing::debug!(
            archetype = %id,
            max_size = bounds.max_size,
            preload = bounds.preload,
            "archetype registered"
        );
        Ok(())
    }

    /// Register (or, until its first spawn, replace) an archetype.
    pub fn register_archetype_prefab(
        &mut self,
        id: &str,
        prefab: ArchetypePrefab,
    ) -> Result<(), RegistryError> {
        self.register_prefab(ArchetypeId::from(id), prefab)
    }

    pub fn archetype(&self, id: &str) -> Option<&Archetype> {
        self.archetypes.get(&ArchetypeId::from(id))
    }

    // -- spawning -------------------------------------------------------------

    /// Spawn an entity of archetype `id`. If a suspend point is pending the
    /// spawn stays in flight and [`SpawnError::Suspended`] carries its
    /// ticket; the tick loop's [`poll_spawns`](Self::poll_spawns) finishes it.
    pub fn acquire_entity(
        &mut self,
        id: &str,
        options: SpawnOptions,
    ) -> Result<EntityId, SpawnError> {
        let (factory, _, mut env) = self.split();
        factory.acquire_entity(&mut env, &ArchetypeId::from(id), options)
    }

    /// Start a spawn without polling it.
    pub fn request_spawn(
        &mut self,
        id: &str,
        options: SpawnOptions,
    ) -> Result<SpawnTicket, SpawnError> {
        let (factory, _, mut env) = self.split();
        factory.request_spawn(&mut env, &ArchetypeId::from(id), options)
    }

    /// Advance every in-flight spawn by one step.
    pub fn poll_spawns(&mut self) -> Vec<SpawnOutcome> {
        let (factory, _, mut env) = self.split();
        factory.poll_spawns(&mut env)
    }

    /// Advance one in-flight spawn.
    pub fn poll_ticket(&mut self, ticket: SpawnTicket) -> Poll<Result<EntityId, SpawnError>> {
        let (factory, _, mut env) = self.split();
        factory.poll_ticket(&mut env, ticket)
    }

    pub fn cancel_spawn(&mut self, ticket: SpawnTicket) -> Option<RecycleOutcome> {
        let (factory, _, mut env) = self.split();
        factory.cancel_spawn(&mut env, ticket)
    }

    pub fn cancel_all_pending(&mut self) -> usize {
        let (factory, _, mut env) = self.split();
        factory.cancel_all_pending(&mut env)
    }

    pub fn pending_count(&self) -> usize {
        self.factory.pending_count()
    }

    pub fn spawn_phase(&self, ticket: SpawnTicket) -> Option<SpawnPhase> {
        self.factory.phase(ticket)
    }

    /// Entity held by an in-flight spawn.
    pub fn reserved_entity(&self, ticket: SpawnTicket) -> Option<EntityId> {
        self.factory.reserved_entity(ticket)
    }

    /// Reconfigure an active entity as archetype `id`.
    pub fn reconfigure_entity(
        &mut self,
        entity: EntityId,
        id: &str,
        options: &SpawnOptions,
    ) -> Result<(), SpawnError> {
        let (factory, _, mut env) = self.split();
        factory.reconfigure(&mut env, entity, &ArchetypeId::from(id), options)
    }

    // -- releasing ------------------------------------------------------------

    pub fn release_entity(&mut self, entity: EntityId) -> RecycleOutcome {
        let (_, sink, mut env) = self.split();
        sink.release(&mut env, entity)
    }

    // -- pools ----------------------------------------------------------------

    /// Warm `id`'s pool with up to `count` cold entities.
    pub fn preload(&mut self, id: &str, count: usize) -> Result<usize, SpawnError> {
        let (factory, _, mut env) = self.split();
        factory.preload(&mut env, &ArchetypeId::from(id), count)
    }

    /// Preload every registered archetype to its configured preload count.
    pub fn preload_all(&mut self) -> Result<usize, SpawnError> {
        let mut total = 0;
        for id in self.archetypes.ids() {
            let count = self
                .archetypes
                .get(&id)
                .map_or(0, |archetype| archetype.bounds.preload);
            if count == 0 {
                continue;
            }
            let (factory, _, mut env) = self.split();
            total += factory.preload(&mut env, &id, count)?;
        }
        Ok(total)
    }

    /// Change `id`'s pool bounds. Excess idle entities are only evicted by
    /// [`run_maintenance`](Self::run_maintenance).
    pub fn set_pool_bounds(&mut self, id: &str, bounds: PoolBounds) {
        let id = ArchetypeId::from(id);
        self.archetypes.set_bounds(&id, bounds);
        self.pools.configure(&id, bounds);
    }

    /// Evict oversized pools. Returns the number of entities destroyed.
    pub fn run_maintenance(&mut self) -> usize {
        let (_, _, mut env) = self.split();
        let evicted = env.pools.maintain();
        for entity in &evicted {
            recycle::destroy_entity(&mut env, *entity);
        }
        evicted.len()
    }

    pub fn pool_stats(&self, id: &str) -> PoolStats {
        self.pools.stats(&ArchetypeId::from(id))
    }

    pub fn all_pool_stats(&self) -> Vec<(ArchetypeId, PoolStats)> {
        self.pools.all_stats()
    }

    pub fn is_pooled(&self, entity: EntityId) -> bool {
        self.pools.contains(entity)
    }

    // -- queries --------------------------------------------------------------

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_count_for(&self, id: &str) -> usize {
        self.active.count_for(&ArchetypeId::from(id))
    }

    pub fn is_active(&self, entity: EntityId) -> bool {
        self.active.contains(entity)
    }

    pub fn active_entities(&self) -> Vec<EntityId> {
        self.active.entities()
    }

    pub fn lifecycle_state(&self, entity: EntityId) -> Option<LifecycleState> {
        self.lifecycle.state(entity)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Gameplay access to component state. Adding or removing components
    /// here bypasses injection; use it for state changes only.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn factory(&self) -> &EntityFactory {
        &self.factory
    }

    pub fn recycle_sink(&self) -> &RecycleSink {
        &self.sink
    }

    pub fn lifecycle(&self) -> &LifecycleCoordinator {
        &self.lifecycle
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    // -- teardown -------------------------------------------------------------

    /// Cancel pending spawns, release every active entity and destroy every
    /// pooled one.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let cancelled = self.cancel_all_pending();
        let active = self.active.entities();
        let released = active.len();
        for entity in active {
            self.release_entity(entity);
        }

        let (_, _, mut env) = self.split();
        let drained = env.pools.drain_all();
        for entity in &drained {
            recycle::destroy_entity(&mut env, *entity);
        }
        let report = ShutdownReport {
            cancelled,
            released,
            destroyed: drained.len(),
        };
        tracing::info!(
            cancelled = report.cancelled,
            released = report.released,
            destroyed = report.destroyed,
            "game context shut down"
        );
        report
    }
}
