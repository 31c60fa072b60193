//! Entity factory: the spawn path.
//!
//! A spawn is a small state machine polled once per tick:
//!
//! ```text
//!   request ──► AwaitingData ──► AwaitingAssets ──► Ready ──► Active
//!                    │                 │
//!                    └──── failure / cancel: back to the pool ────┘
//! ```
//!
//! [`EntityFactory::request_spawn`] does the synchronous part (archetype
//! resolution, pool lookup or cold construction, component verification)
//! and moves the entity to `Activating`. [`EntityFactory::poll_spawns`]
//! advances every request as far as its suspend points allow. Only a
//! request that reaches `Ready` is activated and registered as active;
//! every other exit routes the entity back into its pool or destroys it.

use std::fmt;
use std::task::Poll;

use hatchery_ecs::prelude::*;

use crate::archetype::{Archetype, ArchetypeId, ArchetypeRegistry};
use crate::collab::{AnimationCollaborator, FactionCollaborator};
use crate::components::Render;
use crate::configure::ConfigurationDistributor;
use crate::data::{ArchetypeDataProvider, ControlMode};
use crate::error::{DataError, SpawnError};
use crate::injector::ComponentInjector;
use crate::lifecycle::LifecycleCoordinator;
use crate::pool::PoolStore;
use crate::recycle::{self, RecycleOutcome};
use crate::registry::ActiveRegistry;
use crate::spatial::{Transform, Vec2};

// ---------------------------------------------------------------------------
// SpawnEnv
// ---------------------------------------------------------------------------

/// Mutable view of everything a spawn or release touches.
pub struct SpawnEnv<'a> {
    pub world: &'a mut World,
    pub archetypes: &'a mut ArchetypeRegistry,
    pub pools: &'a mut PoolStore,
    pub lifecycle: &'a mut LifecycleCoordinator,
    pub active: &'a mut ActiveRegistry,
    pub data: &'a mut dyn ArchetypeDataProvider,
    pub animations: &'a mut dyn AnimationCollaborator,
    pub factions: &'a mut dyn FactionCollaborator,
}

// ---------------------------------------------------------------------------
// Tickets, options, outcomes
// ---------------------------------------------------------------------------

/// Handle to an in-flight spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpawnTicket(u64);

impl SpawnTicket {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpawnTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-spawn parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnOptions {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    /// Overrides the archetype's faction.
    pub faction: Option<String>,
    /// Overrides the archetype's control mode.
    pub control: Option<ControlMode>,
    pub level: u32,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            faction: None,
            control: None,
            level: 1,
        }
    }
}

impl SpawnOptions {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            ..Self::default()
        }
    }

    fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
    }
}

/// Suspend point a request is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPhase {
    AwaitingData,
    AwaitingAssets,
    Ready,
}

/// A finished spawn: either an active entity or the reason there is none.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnOutcome {
    pub ticket: SpawnTicket,
    pub archetype: ArchetypeId,
    pub result: Result<EntityId, SpawnError>,
}

#[derive(Debug)]
struct SpawnRequest {
    ticket: SpawnTicket,
    archetype: Archetype,
    entity: EntityId,
    options: SpawnOptions,
    phase: SpawnPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataReadiness {
    Ready,
    Pending,
    Failed,
}

// ---------------------------------------------------------------------------
// EntityFactory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct EntityFactory {
    injector: ComponentInjector,
    distributor: ConfigurationDistributor,
    pending: Vec<SpawnRequest>,
    next_ticket: u64,
    /// Set when the data provider reported a failed load; cleared once data
    /// shows up as loaded.
    data_failure: Option<String>,
    /// Bumped by every [`EntityFactory::poll_spawns`] call. The data provider
    /// is polled at most once per epoch, however many acquires land in it.
    poll_epoch: u64,
    data_polled_in: Option<u64>,
}

impl EntityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn injector(&self) -> &ComponentInjector {
        &self.injector
    }

    pub fn distributor(&self) -> &ConfigurationDistributor {
        &self.distributor
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, ticket: SpawnTicket) -> bool {
        self.pending.iter().any(|r| r.ticket == ticket)
    }

    /// Phase of an in-flight spawn.
    pub fn phase(&self, ticket: SpawnTicket) -> Option<SpawnPhase> {
        self.pending
            .iter()
            .find(|r| r.ticket == ticket)
            .map(|r| r.phase)
    }

    /// Entity reserved by an in-flight spawn. Not active until the spawn
    /// completes.
    pub fn reserved_entity(&self, ticket: SpawnTicket) -> Option<EntityId> {
        self.pending
            .iter()
            .find(|r| r.ticket == ticket)
            .map(|r| r.entity)
    }

    // -- construction ---------------------------------------------------------

    /// Spawn a bare entity and give it `archetype`'s components. A failed
    /// injection destroys the entity.
    fn construct(
        injector: &mut ComponentInjector,
        world: &mut World,
        lifecycle: &mut LifecycleCoordinator,
        archetype: &Archetype,
    ) -> Result<EntityId, SpawnError> {
        let entity = world.spawn();
        world.insert_component(entity, Transform::NEUTRAL)?;
        lifecycle.track(entity);
        if let Err(err) = injector.ensure_components(world, entity, &archetype.profile) {
            tracing::error!(
                entity = %entity,
                archetype = %archetype.id,
                error = %err,
                "construction failed, entity destroyed"
            );
            lifecycle.forget(entity);
            if let Err(despawn) = world.despawn(entity) {
                tracing::warn!(
                    entity = %entity,
                    error = %despawn,
                    "failed construction left no entity to destroy"
                );
            }
            return Err(err.into());
        }
        tracing::debug!(entity = %entity, archetype = %archetype.id, "cold constructed");
        Ok(entity)
    }

    /// Start a spawn of `archetype_id`. The entity is taken from the pool or
    /// constructed, verified, placed and moved to `Activating`; the rest
    /// happens in [`poll_spawns`](Self::poll_spawns).
    pub fn request_spawn(
        &mut self,
        env: &mut SpawnEnv<'_>,
        archetype_id: &ArchetypeId,
        options: SpawnOptions,
    ) -> Result<SpawnTicket, SpawnError> {
        let archetype = env
            .archetypes
            .resolve(archetype_id)
            .cloned()
            .ok_or_else(|| SpawnError::UnknownArchetype {
                archetype: archetype_id.clone(),
            })?;
        if env.pools.bounds(&archetype.id).is_none() {
            env.pools.configure(&archetype.id, archetype.bounds);
        }

        let entity = match env.pools.acquire(&archetype.id) {
            Some(entity) => {
                if let Err(err) = self
                    .injector
                    .ensure_components(env.world, entity, &archetype.profile)
                {
                    tracing::error!(
                        entity = %entity,
                        archetype = %archetype.id,
                        error = %err,
                        "pooled entity failed verification, destroyed"
                    );
                    recycle::destroy_entity(env, entity);
                    env.pools.record_destroy(&archetype.id);
                    return Err(err.into());
                }
                entity
            }
            None => {
                tracing::debug!(archetype = %archetype.id, "pool miss");
                let entity =
                    Self::construct(&mut self.injector, env.world, env.lifecycle, &archetype);
                env.pools.record_create(&archetype.id);
                match entity {
                    Ok(entity) => entity,
                    Err(err) => {
                        env.pools.record_destroy(&archetype.id);
                        return Err(err);
                    }
                }
            }
        };

        if let Some(transform) = env.world.get_component_mut::<Transform>(entity) {
            *transform = options.transform();
        }

        if let Err(err) = env.lifecycle.begin_activation(env.world, entity) {
            tracing::error!(
                entity = %entity,
                error = %err,
                "could not begin activation, entity destroyed"
            );
            recycle::destroy_entity(env, entity);
            env.pools.record_destroy(&archetype.id);
            return Err(err.into());
        }

        self.next_ticket += 1;
        let ticket = SpawnTicket(self.next_ticket);
        tracing::debug!(
            ticket = %ticket,
            entity = %entity,
            archetype = %archetype.id,
            "spawn requested"
        );
        self.pending.push(SpawnRequest {
            ticket,
            archetype,
            entity,
            options,
            phase: SpawnPhase::AwaitingData,
        });
        Ok(ticket)
    }

    // -- polling --------------------------------------------------------------

    fn data_readiness(&mut self, data: &mut dyn ArchetypeDataProvider) -> DataReadiness {
        if data.is_data_loaded() {
            self.data_failure = None;
            return DataReadiness::Ready;
        }
        if self.data_failure.is_some() {
            return DataReadiness::Failed;
        }
        if self.data_polled_in == Some(self.poll_epoch) {
            return DataReadiness::Pending;
        }
        self.data_polled_in = Some(self.poll_epoch);
        match data.poll_load() {
            Poll::Pending => DataReadiness::Pending,
            Poll::Ready(Ok(())) => DataReadiness::Ready,
            Poll::Ready(Err(err)) => {
                tracing::error!(error = %err, "archetype data load failed");
                self.data_failure = Some(match err {
                    DataError::LoadFailed { reason } => reason,
                    other => other.to_string(),
                });
                DataReadiness::Failed
            }
        }
    }

    /// Advance `request` as far as it can go this tick. A ready error means
    /// the entity has already been routed back to its pool.
    fn advance(
        &mut self,
        env: &mut SpawnEnv<'_>,
        request: &mut SpawnRequest,
        data: DataReadiness,
    ) -> Poll<Result<EntityId, SpawnError>> {
        let entity = request.entity;
        let archetype = &request.archetype;

        if request.phase == SpawnPhase::AwaitingData {
            match data {
                DataReadiness::Pending => return Poll::Pending,
                DataReadiness::Failed => {
                    return Poll::Ready(Err(self.fail(env, request, data_unavailable(archetype))));
                }
                DataReadiness::Ready => {}
            }
            let Some(record) = env.data.archetype_data(&archetype.data_key) else {
                return Poll::Ready(Err(self.fail(env, request, data_unavailable(archetype))));
            };
            if let Err(err) = self.distributor.configure_primary(
                env.world,
                env.factions,
                entity,
                archetype,
                record,
                &request.options,
            ) {
                return Poll::Ready(Err(self.fail(env, request, err.into())));
            }
            request.phase = SpawnPhase::AwaitingAssets;
        }

        if request.phase == SpawnPhase::AwaitingAssets {
            let Some(record) = env.data.archetype_data(&archetype.data_key) else {
                return Poll::Ready(Err(self.fail(env, request, data_unavailable(archetype))));
            };
            let animation = match env.animations.initialize_animations(entity, record) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => result,
            };
            if let Err(err) =
                self.distributor
                    .configure_derived(env.world, entity, archetype, record, animation)
            {
                return Poll::Ready(Err(self.fail(env, request, err.into())));
            }
            request.phase = SpawnPhase::Ready;
        }

        match env.lifecycle.complete_activation(env.world, entity) {
            Ok(_) => {
                env.active.insert(entity, archetype.id.clone());
                tracing::debug!(
                    ticket = %request.ticket,
                    entity = %entity,
                    archetype = %archetype.id,
                    "entity active"
                );
                Poll::Ready(Ok(entity))
            }
            Err(err) => Poll::Ready(Err(self.fail(env, request, err.into()))),
        }
    }

    /// Route a failed request's entity back to its pool and hand back the
    /// error.
    fn fail(
        &mut self,
        env: &mut SpawnEnv<'_>,
        request: &SpawnRequest,
        err: SpawnError,
    ) -> SpawnError {
        tracing::error!(
            ticket = %request.ticket,
            entity = %request.entity,
            archetype = %request.archetype.id,
            error = %err,
            "spawn failed"
        );
        recycle::abort_spawn(env, request.entity, &request.archetype.id);
        err
    }

    /// Advance every in-flight spawn. Returns the spawns that finished this
    /// call, in request order.
    pub fn poll_spawns(&mut self, env: &mut SpawnEnv<'_>) -> Vec<SpawnOutcome> {
        self.poll_epoch += 1;
        if self.pending.is_empty() {
            return Vec::new();
        }
        let data = self.data_readiness(env.data);
        let mut outcomes = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for mut request in std::mem::take(&mut self.pending) {
            match self.advance(env, &mut request, data) {
                Poll::Pending => still_pending.push(request),
                Poll::Ready(result) => outcomes.push(SpawnOutcome {
                    ticket: request.ticket,
                    archetype: request.archetype.id,
                    result,
                }),
            }
        }
        self.pending = still_pending;
        outcomes
    }

    /// Advance a single spawn, leaving the others untouched. The data load
    /// only advances if nothing has polled it since the last
    /// [`EntityFactory::poll_spawns`].
    pub fn poll_ticket(
        &mut self,
        env: &mut SpawnEnv<'_>,
        ticket: SpawnTicket,
    ) -> Poll<Result<EntityId, SpawnError>> {
        let Some(index) = self.pending.iter().position(|r| r.ticket == ticket) else {
            return Poll::Ready(Err(SpawnError::Cancelled(ticket)));
        };
        let data = self.data_readiness(env.data);
        let mut request = self.pending.remove(index);
        match self.advance(env, &mut request, data) {
            Poll::Pending => {
                self.pending.insert(index, request);
                Poll::Pending
            }
            ready => ready,
        }
    }

    /// Request a spawn and poll it once. A spawn that hits a suspend point
    /// stays in flight and is reported as [`SpawnError::Suspended`].
    pub fn acquire_entity(
        &mut self,
        env: &mut SpawnEnv<'_>,
        archetype_id: &ArchetypeId,
        options: SpawnOptions,
    ) -> Result<EntityId, SpawnError> {
        let ticket = self.request_spawn(env, archetype_id, options)?;
        match self.poll_ticket(env, ticket) {
            Poll::Ready(result) => result,
            Poll::Pending => Err(SpawnError::Suspended(ticket)),
        }
    }

    // -- cancellation ---------------------------------------------------------

    /// Abandon an in-flight spawn. Its entity goes back to the pool.
    pub fn cancel_spawn(
        &mut self,
        env: &mut SpawnEnv<'_>,
        ticket: SpawnTicket,
    ) -> Option<RecycleOutcome> {
        let index = self.pending.iter().position(|r| r.ticket == ticket)?;
        let request = self.pending.remove(index);
        let outcome = recycle::abort_spawn(env, request.entity, &request.archetype.id);
        tracing::info!(
            ticket = %ticket,
            entity = %request.entity,
            outcome = ?outcome,
            "spawn cancelled"
        );
        Some(outcome)
    }

    /// Abandon every in-flight spawn. Returns how many were cancelled.
    pub fn cancel_all_pending(&mut self, env: &mut SpawnEnv<'_>) -> usize {
        let requests = std::mem::take(&mut self.pending);
        let count = requests.len();
        for request in requests {
            recycle::abort_spawn(env, request.entity, &request.archetype.id);
        }
        if count > 0 {
            tracing::info!(cancelled = count, "cancelled all pending spawns");
        }
        count
    }

    // -- pool warmup and reconfiguration --------------------------------------

    /// Fill `archetype_id`'s pool with up to `count` cold entities.
    pub fn preload(
        &mut self,
        env: &mut SpawnEnv<'_>,
        archetype_id: &ArchetypeId,
        count: usize,
    ) -> Result<usize, SpawnError> {
        let archetype = env
            .archetypes
            .resolve(archetype_id)
            .cloned()
            .ok_or_else(|| SpawnError::UnknownArchetype {
                archetype: archetype_id.clone(),
            })?;
        if env.pools.bounds(&archetype.id).is_none() {
            env.pools.configure(&archetype.id, archetype.bounds);
        }

        let injector = &mut self.injector;
        let world = &mut *env.world;
        let lifecycle = &mut *env.lifecycle;
        let mut failure = None;
        let added = env.pools.preload(&archetype.id, count, || {
            match Self::construct(injector, world, lifecycle, &archetype) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    failure = Some(err);
                    None
                }
            }
        });
        match failure {
            Some(err) => {
                env.pools.record_create(&archetype.id);
                env.pools.record_destroy(&archetype.id);
                Err(err)
            }
            None => Ok(added),
        }
    }

    /// Reconfigure an active entity as `archetype_id`. This is the only way
    /// an entity changes archetype. The transform is replaced from
    /// `options`, as on spawn. On error the entity keeps its current
    /// archetype.
    pub fn reconfigure(
        &mut self,
        env: &mut SpawnEnv<'_>,
        entity: EntityId,
        archetype_id: &ArchetypeId,
        options: &SpawnOptions,
    ) -> Result<(), SpawnError> {
        if !env.active.contains(entity) {
            return Err(SpawnError::NotActive { entity });
        }
        let archetype = env
            .archetypes
            .resolve(archetype_id)
            .cloned()
            .ok_or_else(|| SpawnError::UnknownArchetype {
                archetype: archetype_id.clone(),
            })?;
        // Fail before touching the entity if there is nothing to apply.
        self.distributor.lookup(&*env.data, &archetype)?;
        if env.pools.bounds(&archetype.id).is_none() {
            env.pools.configure(&archetype.id, archetype.bounds);
        }

        self.injector
            .ensure_components(env.world, entity, &archetype.profile)?;
        if let Some(transform) = env.world.get_component_mut::<Transform>(entity) {
            *transform = options.transform();
        }
        self.distributor.configure(
            env.world,
            &*env.data,
            env.animations,
            env.factions,
            entity,
            &archetype,
            options,
        )?;
        // Derived configuration leaves the render hidden until activation,
        // which this entity has already been through.
        if let Some(render) = env.world.get_component_mut::<Render>(entity) {
            render.visible = true;
        }
        env.active.retag(entity, archetype.id.clone());
        tracing::debug!(entity = %entity, archetype = %archetype.id, "entity reconfigured");
        Ok(())
    }
}

fn data_unavailable(archetype: &Archetype) -> SpawnError {
    SpawnError::ConfigDataUnavailable {
        archetype: archetype.id.clone(),
    }
}
