//! Component injection.
//!
//! [`ComponentInjector::ensure_components`] gives an entity the component set
//! an archetype requires. Durable components go on first, instance
//! components second, and the [`Composed`] facade last since it snapshots its
//! siblings when it is built. The facade doubles as the "already composed"
//! marker: an entity that carries it is never injected from scratch again.

use hatchery_ecs::prelude::*;

use crate::archetype::{ComponentKind, ComponentProfile};
use crate::components::{self, Composed};
use crate::error::InjectionError;

/// Siblings the facade cannot be built without.
pub const FACADE_DEPENDENCIES: [ComponentKind; 4] = [
    ComponentKind::Movement,
    ComponentKind::Stats,
    ComponentKind::Lifecycle,
    ComponentKind::Config,
];

/// What [`ComponentInjector::ensure_components`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    /// The entity was already composed with a covering profile.
    AlreadyComposed,
    /// The entity was composed but lacked some kinds; those were added.
    Extended { added: usize },
    /// A cold entity received its full component set.
    Composed { added: usize },
}

#[derive(Debug, Default)]
pub struct ComponentInjector {
    composed: u64,
    extended: u64,
    skipped: u64,
}

impl ComponentInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `entity` carries every kind in `profile`, exactly once.
    ///
    /// On a dependency failure the entity is left partially built; the
    /// caller must destroy it.
    pub fn ensure_components(
        &mut self,
        world: &mut World,
        entity: EntityId,
        profile: &ComponentProfile,
    ) -> Result<Injection, InjectionError> {
        if !world.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity }.into());
        }

        if let Some(composed) = world.get_component::<Composed>(entity) {
            if composed.profile.covers(profile) {
                self.skipped += 1;
                return Ok(Injection::AlreadyComposed);
            }
            let missing = profile.missing_from(&components::present_profile(world, entity));
            for kind in &missing {
                components::insert_default(world, entity, *kind)?;
            }
            let present = components::present_profile(world, entity);
            if let Some(composed) = world.get_component_mut::<Composed>(entity) {
                composed.profile = present;
            }
            self.extended += 1;
            tracing::debug!(entity = %entity, added = missing.len(), "extended composed entity");
            return Ok(Injection::Extended {
                added: missing.len(),
            });
        }

        let mut added = 0;
        for kind in profile.in_injection_order() {
            if !components::has_kind(world, entity, kind) {
                components::insert_default(world, entity, kind)?;
                added += 1;
            }
        }

        if let Some(component) = FACADE_DEPENDENCIES
            .into_iter()
            .find(|kind| !components::has_kind(world, entity, *kind))
        {
            tracing::error!(
                entity = %entity,
                missing = %component,
                "facade dependency missing after injection"
            );
            return Err(InjectionError::MissingComponentDependency { entity, component });
        }

        let present = components::present_profile(world, entity);
        world.insert_component(entity, Composed { profile: present })?;
        self.composed += 1;
        tracing::debug!(entity = %entity, added, "composed cold entity");
        Ok(Injection::Composed { added })
    }

    /// Cold entities composed so far.
    pub fn composed_count(&self) -> u64 {
        self.composed
    }

    pub fn extended_count(&self) -> u64 {
        self.extended
    }

    /// Calls that found the entity already composed.
    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Combat, Movement};

    fn world() -> World {
        let mut world = World::new();
        components::register_all(&mut world);
        world
    }

    #[test]
    fn second_call_adds_nothing() {
        let mut world = world();
        let mut injector = ComponentInjector::new();
        let e = world.spawn();
        let profile = ComponentProfile::full();

        let first = injector.ensure_components(&mut world, e, &profile).unwrap();
        assert_eq!(first, Injection::Composed { added: 11 });
        let count = world.component_count(e);

        let second = injector.ensure_components(&mut world, e, &profile).unwrap();
        assert_eq!(second, Injection::AlreadyComposed);
        assert_eq!(world.component_count(e), count);
        for kind in ComponentKind::INJECTION_ORDER {
            assert_eq!(components::kind_instance_count(&world, e, kind), 1);
        }
        assert_eq!(world.instance_count::<Composed>(e), 1);
    }

    #[test]
    fn facade_is_attached_last() {
        let mut world = world();
        let mut injector = ComponentInjector::new();
        let e = world.spawn();
        injector
            .ensure_components(&mut world, e, &ComponentProfile::full())
            .unwrap();
        let names = world.component_names(e);
        assert_eq!(names.first(), Some(&"movement"));
        assert_eq!(names.last(), Some(&"composed"));
        let lifecycle = names.iter().position(|n| *n == "lifecycle").unwrap();
        let stats = names.iter().position(|n| *n == "stats").unwrap();
        assert!(stats < lifecycle);
    }

    #[test]
    fn narrower_profile_extends_to_wider() {
        let mut world = world();
        let mut injector = ComponentInjector::new();
        let e = world.spawn();
        let narrow =
            ComponentProfile::full_without(&[ComponentKind::Combat, ComponentKind::AiIntention]);
        injector.ensure_components(&mut world, e, &narrow).unwrap();
        assert!(!world.has_component::<Combat>(e));

        let result = injector
            .ensure_components(&mut world, e, &ComponentProfile::full())
            .unwrap();
        assert_eq!(result, Injection::Extended { added: 2 });
        assert!(world.has_component::<Combat>(e));
        assert_eq!(
            world.get_component::<Composed>(e).unwrap().profile,
            ComponentProfile::full()
        );
        // Wider entity now covers the narrow profile too.
        assert_eq!(
            injector.ensure_components(&mut world, e, &narrow).unwrap(),
            Injection::AlreadyComposed
        );
    }

    #[test]
    fn missing_dependency_is_fatal() {
        let mut world = world();
        let mut injector = ComponentInjector::new();
        let e = world.spawn();
        let profile = ComponentProfile::full_without(&[ComponentKind::Movement]);

        let err = injector.ensure_components(&mut world, e, &profile).unwrap_err();
        assert_eq!(
            err,
            InjectionError::MissingComponentDependency {
                entity: e,
                component: ComponentKind::Movement
            }
        );
        assert!(!world.has_component::<Composed>(e));
        assert!(!world.has_component::<Movement>(e));
    }

    #[test]
    fn stale_entity_is_rejected() {
        let mut world = world();
        let mut injector = ComponentInjector::new();
        let e = world.spawn();
        world.despawn(e).unwrap();
        assert!(matches!(
            injector.ensure_components(&mut world, e, &ComponentProfile::full()),
            Err(InjectionError::Ecs(EcsError::StaleEntity { .. }))
        ));
    }
}
