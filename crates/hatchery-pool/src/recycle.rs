//! The release path: active entity back to its pool.
//!
//! [`RecycleSink::release`] takes an entity out of the active registry
//! before anything else, so nothing can observe it half-released. It then
//! runs the recycle transition, resets placement, and hands the entity to
//! the pool of its current archetype. A full pool means destruction.
//!
//! The helpers here are shared with the spawn path, which routes failed and
//! cancelled spawns through the same parking logic.

use hatchery_ecs::entity::EntityId;

use crate::archetype::ArchetypeId;
use crate::components::Lifecycle;
use crate::factory::SpawnEnv;
use crate::lifecycle::Transition;
use crate::pool::ReleaseOutcome;
use crate::spatial::Transform;

/// Where a released entity ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecycleOutcome {
    Pooled,
    Destroyed,
    /// The entity was not active; nothing happened.
    Ignored,
}

#[derive(Debug, Default)]
pub struct RecycleSink {
    pooled: u64,
    destroyed: u64,
    ignored: u64,
}

impl RecycleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an active entity to its pool.
    pub fn release(&mut self, env: &mut SpawnEnv<'_>, entity: EntityId) -> RecycleOutcome {
        let Some(registered) = env.active.remove(entity) else {
            self.ignored += 1;
            tracing::warn!(entity = %entity, "release of an entity that is not active ignored");
            return RecycleOutcome::Ignored;
        };

        match env.lifecycle.deactivate(env.world, entity) {
            Ok(Transition::Applied) => {}
            Ok(Transition::Ignored) => {
                // Active-registry membership and lifecycle state disagree.
                tracing::warn!(
                    entity = %entity,
                    state = ?env.lifecycle.state(entity),
                    "active entity was not in Active state"
                );
            }
            Err(err) => {
                tracing::error!(
                    entity = %entity,
                    error = %err,
                    "recycle transition failed, destroying entity"
                );
                destroy_entity(env, entity);
                env.pools.record_destroy(&registered);
                self.destroyed += 1;
                return RecycleOutcome::Destroyed;
            }
        }

        let archetype = current_archetype(env, entity).unwrap_or(registered);
        let outcome = park(env, entity, &archetype);
        match outcome {
            RecycleOutcome::Pooled => self.pooled += 1,
            RecycleOutcome::Destroyed => self.destroyed += 1,
            RecycleOutcome::Ignored => self.ignored += 1,
        }
        tracing::debug!(
            entity = %entity,
            archetype = %archetype,
            outcome = ?outcome,
            "entity released"
        );
        outcome
    }

    pub fn pooled_count(&self) -> u64 {
        self.pooled
    }

    pub fn destroyed_count(&self) -> u64 {
        self.destroyed
    }

    pub fn ignored_count(&self) -> u64 {
        self.ignored
    }
}

/// Archetype recorded on the entity's lifecycle component.
pub(crate) fn current_archetype(env: &SpawnEnv<'_>, entity: EntityId) -> Option<ArchetypeId> {
    env.world
        .get_component::<Lifecycle>(entity)
        .and_then(|lifecycle| lifecycle.archetype.clone())
}

/// Reset a `Pooled` entity's placement and collaborator state and push it
/// into `archetype`'s pool, destroying it on overflow.
pub(crate) fn park(
    env: &mut SpawnEnv<'_>,
    entity: EntityId,
    archetype: &ArchetypeId,
) -> RecycleOutcome {
    env.factions.release_faction(entity);
    env.animations.cancel(entity);
    if let Some(transform) = env.world.get_component_mut::<Transform>(entity) {
        *transform = Transform::NEUTRAL;
    }

    match env.pools.release(archetype, entity) {
        ReleaseOutcome::Pooled => RecycleOutcome::Pooled,
        ReleaseOutcome::Overflow(entity) => {
            destroy_entity(env, entity);
            RecycleOutcome::Destroyed
        }
        ReleaseOutcome::Duplicate => RecycleOutcome::Ignored,
    }
}

/// Unwind an `Activating` entity back to `archetype`'s pool.
pub(crate) fn abort_spawn(
    env: &mut SpawnEnv<'_>,
    entity: EntityId,
    archetype: &ArchetypeId,
) -> RecycleOutcome {
    if let Err(err) = env.lifecycle.abort_activation(env.world, entity) {
        tracing::error!(
            entity = %entity,
            error = %err,
            "abort transition failed, destroying entity"
        );
        destroy_entity(env, entity);
        env.pools.record_destroy(archetype);
        return RecycleOutcome::Destroyed;
    }
    park(env, entity, archetype)
}

/// Despawn `entity` and drop every trace of it outside the pools. Pool
/// counters are the caller's concern.
pub(crate) fn destroy_entity(env: &mut SpawnEnv<'_>, entity: EntityId) {
    env.active.remove(entity);
    env.lifecycle.forget(entity);
    env.factions.release_faction(entity);
    env.animations.cancel(entity);
    if let Err(err) = env.world.despawn(entity) {
        tracing::warn!(
            entity = %entity,
            error = %err,
            "destroying an entity that no longer exists"
        );
    } else {
        tracing::debug!(entity = %entity, "entity destroyed");
    }
}
