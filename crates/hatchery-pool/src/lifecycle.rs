//! Per-entity lifecycle state machine.
//!
//! ```text
//!   Cold ──► Activating ──► Active ──► Recycling ──► Pooled
//!               ▲  │                      ▲            │
//!               │  └──────── abort ───────┘            │
//!               └──────────────── reuse ───────────────┘
//! ```
//!
//! The coordinator is the only place that decides whether a transition is
//! legal. Asking for the state an entity is already in (or heading to) is a
//! duplicate: it is logged and answered with [`Transition::Ignored`]. Asking
//! for an edge the machine does not have is a [`LifecycleError`].
//!
//! Components learn about transitions through their entity's outbox: the
//! `Pooled → Activating` edge posts [`LifecycleEvent::Reuse`], entering
//! `Active` posts [`LifecycleEvent::Activated`], and entering `Recycling`
//! posts [`LifecycleEvent::Recycle`]. Each is delivered before the call
//! returns.

use std::collections::HashMap;

use hatchery_ecs::prelude::*;
use serde::Serialize;

use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleState {
    /// Constructed, never configured.
    Cold,
    /// Being configured; invisible to gameplay.
    Activating,
    /// Owned by gameplay.
    Active,
    /// Being reset on its way back to a pool.
    Recycling,
    /// Idle in a pool.
    Pooled,
}

/// Whether a requested transition changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Duplicate request; the entity was already there.
    Ignored,
}

#[derive(Debug, Default)]
pub struct LifecycleCoordinator {
    states: HashMap<EntityId, LifecycleState>,
    duplicates: u64,
}

impl LifecycleCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly constructed entity as `Cold`. Returns
    /// `false` if it was already tracked.
    pub fn track(&mut self, entity: EntityId) -> bool {
        if self.states.contains_key(&entity) {
            return false;
        }
        self.states.insert(entity, LifecycleState::Cold);
        true
    }

    /// Stop tracking a destroyed entity.
    pub fn forget(&mut self, entity: EntityId) -> Option<LifecycleState> {
        self.states.remove(&entity)
    }

    pub fn state(&self, entity: EntityId) -> Option<LifecycleState> {
        self.states.get(&entity).copied()
    }

    pub fn count_in(&self, state: LifecycleState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    /// Duplicate transition requests seen so far.
    pub fn duplicate_count(&self) -> u64 {
        self.duplicates
    }

    fn current(&self, entity: EntityId) -> Result<LifecycleState, LifecycleError> {
        self.state(entity)
            .ok_or(LifecycleError::Untracked { entity })
    }

    fn duplicate(
        &mut self,
        entity: EntityId,
        state: LifecycleState,
        requested: &str,
    ) -> Transition {
        self.duplicates += 1;
        tracing::warn!(
            entity = %entity,
            state = ?state,
            requested,
            "duplicate lifecycle transition ignored"
        );
        Transition::Ignored
    }

    fn notify(
        world: &mut World,
        entity: EntityId,
        event: LifecycleEvent,
    ) -> Result<(), LifecycleError> {
        world.post_event(entity, event)?;
        world.deliver_events(entity)?;
        Ok(())
    }

    fn set(&mut self, entity: EntityId, from: LifecycleState, to: LifecycleState) {
        self.states.insert(entity, to);
        tracing::debug!(entity = %entity, from = ?from, to = ?to, "lifecycle transition");
    }

    // -- activation -----------------------------------------------------------

    /// `Cold | Pooled → Activating`. The reuse edge notifies components.
    pub fn begin_activation(
        &mut self,
        world: &mut World,
        entity: EntityId,
    ) -> Result<Transition, LifecycleError> {
        let from = self.current(entity)?;
        match from {
            LifecycleState::Cold => {
                self.set(entity, from, LifecycleState::Activating);
                Ok(Transition::Applied)
            }
            LifecycleState::Pooled => {
                Self::notify(world, entity, LifecycleEvent::Reuse)?;
                self.set(entity, from, LifecycleState::Activating);
                Ok(Transition::Applied)
            }
            LifecycleState::Activating | LifecycleState::Active => {
                Ok(self.duplicate(entity, from, "begin_activation"))
            }
            LifecycleState::Recycling => Err(LifecycleError::InvalidTransition {
                entity,
                from,
                to: LifecycleState::Activating,
            }),
        }
    }

    /// `Activating → Active`.
    pub fn complete_activation(
        &mut self,
        world: &mut World,
        entity: EntityId,
    ) -> Result<Transition, LifecycleError> {
        let from = self.current(entity)?;
        match from {
            LifecycleState::Activating => {
                Self::notify(world, entity, LifecycleEvent::Activated)?;
                self.set(entity, from, LifecycleState::Active);
                Ok(Transition::Applied)
            }
            LifecycleState::Active => Ok(self.duplicate(entity, from, "complete_activation")),
            _ => Err(LifecycleError::InvalidTransition {
                entity,
                from,
                to: LifecycleState::Active,
            }),
        }
    }

    /// `Cold | Pooled → Activating → Active` in one call.
    pub fn activate(
        &mut self,
        world: &mut World,
        entity: EntityId,
    ) -> Result<Transition, LifecycleError> {
        if self.current(entity)? == LifecycleState::Active {
            return Ok(self.duplicate(entity, LifecycleState::Active, "activate"));
        }
        if self.current(entity)? != LifecycleState::Activating {
            self.begin_activation(world, entity)?;
        }
        self.complete_activation(world, entity)
    }

    // -- recycling ------------------------------------------------------------

    /// `Active → Recycling`, or the abort edge `Activating → Recycling`.
    /// Notifies components.
    pub fn begin_recycle(
        &mut self,
        world: &mut World,
        entity: EntityId,
    ) -> Result<Transition, LifecycleError> {
        let from = self.current(entity)?;
        match from {
            LifecycleState::Active | LifecycleState::Activating => {
                Self::notify(world, entity, LifecycleEvent::Recycle)?;
                self.set(entity, from, LifecycleState::Recycling);
                Ok(Transition::Applied)
            }
            LifecycleState::Recycling | LifecycleState::Pooled => {
                Ok(self.duplicate(entity, from, "begin_recycle"))
            }
            LifecycleState::Cold => Err(LifecycleError::InvalidTransition {
                entity,
                from,
                to: LifecycleState::Recycling,
            }),
        }
    }

    /// `Recycling → Pooled`.
    pub fn complete_recycle(&mut self, entity: EntityId) -> Result<Transition, LifecycleError> {
        let from = self.current(entity)?;
        match from {
            LifecycleState::Recycling => {
                self.set(entity, from, LifecycleState::Pooled);
                Ok(Transition::Applied)
            }
            LifecycleState::Pooled => Ok(self.duplicate(entity, from, "complete_recycle")),
            _ => Err(LifecycleError::InvalidTransition {
                entity,
                from,
                to: LifecycleState::Pooled,
            }),
        }
    }

    /// `Active → Recycling → Pooled`.
    pub fn deactivate(
        &mut self,
        world: &mut World,
        entity: EntityId,
    ) -> Result<Transition, LifecycleError> {
        let from = self.current(entity)?;
        match from {
            LifecycleState::Active => {
                self.begin_recycle(world, entity)?;
                self.complete_recycle(entity)
            }
            LifecycleState::Recycling | LifecycleState::Pooled => {
                Ok(self.duplicate(entity, from, "deactivate"))
            }
            _ => Err(LifecycleError::InvalidTransition {
                entity,
                from,
                to: LifecycleState::Recycling,
            }),
        }
    }

    /// `Activating → Recycling → Pooled`, for spawns that failed or were
    /// cancelled before completing.
    pub fn abort_activation(
        &mut self,
        world: &mut World,
        entity: EntityId,
    ) -> Result<Transition, LifecycleError> {
        let from = self.current(entity)?;
        match from {
            LifecycleState::Activating => {
                self.begin_recycle(world, entity)?;
                self.complete_recycle(entity)
            }
            _ => Err(LifecycleError::InvalidTransition {
                entity,
                from,
                to: LifecycleState::Recycling,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Journal(Vec<LifecycleEvent>);

    impl Component for Journal {
        fn on_event(&mut self, event: &LifecycleEvent) {
            self.0.push(*event);
        }
    }

    fn setup() -> (World, LifecycleCoordinator, EntityId) {
        let mut world = World::new();
        world.register_component::<Journal>("journal");
        let e = world.spawn();
        world.insert_component(e, Journal::default()).unwrap();
        let mut lifecycle = LifecycleCoordinator::new();
        lifecycle.track(e);
        (world, lifecycle, e)
    }

    fn journal(world: &World, e: EntityId) -> &[LifecycleEvent] {
        &world.get_component::<Journal>(e).unwrap().0
    }

    #[test]
    fn full_cycle_emits_events_once_each() {
        let (mut world, mut lc, e) = setup();

        assert_eq!(lc.activate(&mut world, e).unwrap(), Transition::Applied);
        assert_eq!(lc.state(e), Some(LifecycleState::Active));
        assert_eq!(journal(&world, e), &[LifecycleEvent::Activated]);

        lc.deactivate(&mut world, e).unwrap();
        assert_eq!(lc.state(e), Some(LifecycleState::Pooled));

        lc.activate(&mut world, e).unwrap();
        assert_eq!(
            journal(&world, e),
            &[
                LifecycleEvent::Activated,
                LifecycleEvent::Recycle,
                LifecycleEvent::Reuse,
                LifecycleEvent::Activated
            ]
        );
    }

    #[test]
    fn cold_activation_sends_no_reuse() {
        let (mut world, mut lc, e) = setup();
        lc.begin_activation(&mut world, e).unwrap();
        assert!(journal(&world, e).is_empty());
    }

    #[test]
    fn duplicate_transitions_are_ignored_not_errors() {
        let (mut world, mut lc, e) = setup();
        lc.activate(&mut world, e).unwrap();
        assert_eq!(lc.activate(&mut world, e).unwrap(), Transition::Ignored);
        assert_eq!(lc.begin_activation(&mut world, e).unwrap(), Transition::Ignored);

        lc.deactivate(&mut world, e).unwrap();
        assert_eq!(lc.deactivate(&mut world, e).unwrap(), Transition::Ignored);
        assert_eq!(lc.duplicate_count(), 3);

        // No extra notifications from the ignored calls.
        assert_eq!(journal(&world, e).len(), 2);
    }

    #[test]
    fn abort_edge_returns_to_pool_with_recycle() {
        let (mut world, mut lc, e) = setup();
        lc.begin_activation(&mut world, e).unwrap();
        lc.abort_activation(&mut world, e).unwrap();
        assert_eq!(lc.state(e), Some(LifecycleState::Pooled));
        assert_eq!(journal(&world, e), &[LifecycleEvent::Recycle]);
    }

    #[test]
    fn illegal_edges_are_errors() {
        let (mut world, mut lc, e) = setup();
        assert!(matches!(
            lc.deactivate(&mut world, e),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            lc.complete_activation(&mut world, e),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            lc.abort_activation(&mut world, e),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert_eq!(lc.state(e), Some(LifecycleState::Cold));
    }

    #[test]
    fn untracked_entity_is_an_error() {
        let mut world = World::new();
        let e = world.spawn();
        let mut lc = LifecycleCoordinator::new();
        assert!(matches!(
            lc.activate(&mut world, e),
            Err(LifecycleError::Untracked { .. })
        ));
        assert!(lc.track(e));
        assert!(!lc.track(e));
        assert_eq!(lc.forget(e), Some(LifecycleState::Cold));
        assert_eq!(lc.tracked(), 0);
    }
}
