//! Hatchery ECS -- entity handles, typed component storage, and per-entity
//! lifecycle outboxes.
//!
//! This crate is the substrate the pooling layer builds on. It deliberately
//! knows nothing about archetypes or pools: it guarantees that an entity
//! carries at most one instance of each component type, that component
//! lookups are typed, and that lifecycle events reach every component of an
//! entity exactly once, in attach order.
//!
//! # Quick Start
//!
//! ```
//! use hatchery_ecs::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Cooldown(f32);
//!
//! impl Component for Cooldown {
//!     fn on_event(&mut self, event: &LifecycleEvent) {
//!         if *event == LifecycleEvent::Reuse {
//!             self.0 = 0.0;
//!         }
//!     }
//! }
//!
//! let mut world = World::new();
//! world.register_component::<Cooldown>("cooldown");
//!
//! let entity = world.spawn();
//! world.insert_component(entity, Cooldown(2.5)).unwrap();
//! world.post_event(entity, LifecycleEvent::Reuse).unwrap();
//! world.deliver_events(entity).unwrap();
//!
//! assert_eq!(world.get_component::<Cooldown>(entity), Some(&Cooldown(0.0)));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod event;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A component type was used before being registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// The entity already carries an instance of this component type.
    #[error("entity {entity:?} already has a '{component}' component")]
    DuplicateComponent {
        entity: entity::EntityId,
        component: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
    pub use crate::entity::{EntityId, SlotAllocator};
    pub use crate::event::{DeliveryReport, Envelope, LifecycleEvent, Outbox};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Target(Option<EntityId>);
    impl Component for Target {
        fn on_event(&mut self, event: &LifecycleEvent) {
            if matches!(event, LifecycleEvent::Reuse | LifecycleEvent::Recycle) {
                self.0 = None;
            }
        }
    }

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Position>("position");
        world.register_component::<Target>("target");
        world
    }

    #[test]
    fn recycled_slot_does_not_alias_old_handle() {
        let mut world = setup_world();
        let old = world.spawn();
        world
            .insert_component(old, Position { x: 1.0, y: 2.0 })
            .unwrap();
        world.despawn(old).unwrap();

        let new = world.spawn();
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert_eq!(world.get_component::<Position>(old), None);
        assert_eq!(world.component_count(new), 0);
    }

    #[test]
    fn transient_state_cleared_by_recycle_then_reuse() {
        let mut world = setup_world();
        let hunter = world.spawn();
        let prey = world.spawn();
        world.insert_component(hunter, Target(Some(prey))).unwrap();

        world.post_event(hunter, LifecycleEvent::Recycle).unwrap();
        world.deliver_events(hunter).unwrap();
        assert_eq!(world.get_component::<Target>(hunter), Some(&Target(None)));

        if let Some(target) = world.get_component_mut::<Target>(hunter) {
            target.0 = Some(prey);
        }
        world.post_event(hunter, LifecycleEvent::Reuse).unwrap();
        world.deliver_events(hunter).unwrap();
        assert_eq!(world.get_component::<Target>(hunter), Some(&Target(None)));
    }

    #[test]
    fn events_to_stale_entity_are_errors() {
        let mut world = setup_world();
        let e = world.spawn();
        world.despawn(e).unwrap();
        assert!(matches!(
            world.post_event(e, LifecycleEvent::Reuse),
            Err(EcsError::StaleEntity { .. })
        ));
        assert!(world.deliver_events(e).is_err());
    }

    #[test]
    fn many_entities_keep_one_instance_each() {
        let mut world = setup_world();
        let entities: Vec<_> = (0..1_000)
            .map(|i| {
                let e = world.spawn();
                world
                    .insert_component(
                        e,
                        Position {
                            x: i as f32,
                            y: 0.0,
                        },
                    )
                    .unwrap();
                // Second attempt must bounce.
                assert!(world
                    .insert_component(e, Position { x: -1.0, y: -1.0 })
                    .is_err());
                e
            })
            .collect();

        assert_eq!(world.query::<Position>().count(), 1_000);
        for e in entities.iter().take(500) {
            world.despawn(*e).unwrap();
        }
        assert_eq!(world.entity_count(), 500);
        for e in entities.iter().skip(500) {
            assert_eq!(world.instance_count::<Position>(*e), 1);
        }
    }
}
