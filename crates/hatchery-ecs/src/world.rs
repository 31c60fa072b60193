//! The [`World`] owns the entity allocator, the component registry, and the
//! components attached to every live entity.
//!
//! Storage is per entity: each record keeps its components in the order they
//! were attached plus the entity's lifecycle [`Outbox`]. Attach order is also
//! delivery order for lifecycle events, which lets callers that attach
//! components in dependency order rely on dependencies hearing about an event
//! before their dependents do.

use std::collections::BTreeMap;

use crate::component::{Component, ComponentRegistry, ComponentTypeId, ErasedComponent};
use crate::entity::{EntityId, SlotAllocator};
use crate::event::{DeliveryReport, LifecycleEvent, Outbox};
use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityRecord
// ---------------------------------------------------------------------------

/// Components and pending lifecycle events of one entity.
#[derive(Debug, Default)]
struct EntityRecord {
    /// Attach-ordered. Never holds two entries with the same type id.
    components: Vec<(ComponentTypeId, Box<dyn ErasedComponent>)>,
    outbox: Outbox,
}

impl EntityRecord {
    fn position(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.components.iter().position(|(id, _)| *id == type_id)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Top-level container for entities and their components.
#[derive(Default)]
pub struct World {
    allocator: SlotAllocator,
    registry: ComponentRegistry,
    /// Ordered so queries visit entities deterministically.
    records: BTreeMap<EntityId, EntityRecord>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.records.len())
            .field("component_types", &self.registry.len())
            .finish()
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register a component type so it can be attached to entities.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        self.registry.register::<T>(name)
    }

    fn type_id_of<T: Component>(&self) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup::<T>()
            .ok_or_else(|| EcsError::UnknownComponent {
                name: std::any::type_name::<T>().to_owned(),
                registered: self.registry.registered_names().join(", "),
            })
    }

    fn record(&self, entity: EntityId) -> Result<&EntityRecord, EcsError> {
        self.records
            .get(&entity)
            .ok_or(EcsError::StaleEntity { entity })
    }

    fn record_mut(&mut self, entity: EntityId) -> Result<&mut EntityRecord, EcsError> {
        self.records
            .get_mut(&entity)
            .ok_or(EcsError::StaleEntity { entity })
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Allocate a bare entity with no components.
    pub fn spawn(&mut self) -> EntityId {
        let entity = self.allocator.allocate();
        self.records.insert(entity, EntityRecord::default());
        entity
    }

    /// Destroy an entity, dropping its components and any undelivered events.
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let record = self
            .records
            .remove(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        if !record.outbox.is_empty() {
            tracing::debug!(
                entity = %entity,
                dropped = record.outbox.len(),
                "despawn dropped undelivered lifecycle events"
            );
        }
        self.allocator.release(entity);
        Ok(())
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity) && self.records.contains_key(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.records.len()
    }

    /// All live entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records.keys().copied()
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to `entity`.
    ///
    /// An entity carries at most one instance of each component type:
    /// inserting a type the entity already has fails with
    /// [`EcsError::DuplicateComponent`] and leaves the existing instance
    /// untouched. Use [`get_component_mut`](Self::get_component_mut) to
    /// change an existing component's state.
    pub fn insert_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<(), EcsError> {
        let type_id = self.type_id_of::<T>()?;
        let record = self
            .records
            .get_mut(&entity)
            .ok_or(EcsError::StaleEntity { entity })?;
        if record.position(type_id).is_some() {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: self.registry.name_of(type_id).to_owned(),
            });
        }
        record.components.push((type_id, Box::new(value)));
        Ok(())
    }

    /// Detach and return `T` from `entity`. `Ok(None)` if it was not attached.
    pub fn remove_component<T: Component>(
        &mut self,
        entity: EntityId,
    ) -> Result<Option<T>, EcsError> {
        let type_id = self.type_id_of::<T>()?;
        let record = self.record_mut(entity)?;
        let Some(idx) = record.position(type_id) else {
            return Ok(None);
        };
        let (_, boxed) = record.components.remove(idx);
        Ok(boxed.into_any().downcast::<T>().ok().map(|b| *b))
    }

    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let type_id = self.registry.lookup::<T>()?;
        let record = self.records.get(&entity)?;
        let idx = record.position(type_id)?;
        record.components[idx].1.as_any().downcast_ref::<T>()
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let type_id = self.registry.lookup::<T>()?;
        let record = self.records.get_mut(&entity)?;
        let idx = record.position(type_id)?;
        record.components[idx].1.as_any_mut().downcast_mut::<T>()
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.get_component::<T>(entity).is_some()
    }

    /// Number of components attached to `entity` (0 for dead entities).
    pub fn component_count(&self, entity: EntityId) -> usize {
        self.records
            .get(&entity)
            .map_or(0, |record| record.components.len())
    }

    /// How many instances of `T` are attached to `entity`.
    ///
    /// Always 0 or 1; exposed so callers can assert the uniqueness
    /// guarantee directly.
    pub fn instance_count<T: Component>(&self, entity: EntityId) -> usize {
        let (Some(type_id), Some(record)) = (self.registry.lookup::<T>(), self.records.get(&entity))
        else {
            return 0;
        };
        record
            .components
            .iter()
            .filter(|(id, _)| *id == type_id)
            .count()
    }

    /// Registered names of `entity`'s components, in attach order.
    pub fn component_names(&self, entity: EntityId) -> Vec<&str> {
        self.records.get(&entity).map_or_else(Vec::new, |record| {
            record
                .components
                .iter()
                .map(|(id, _)| self.registry.name_of(*id))
                .collect()
        })
    }

    /// Iterate every entity carrying `T`.
    pub fn query<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        let type_id = self.registry.lookup::<T>();
        self.records.iter().filter_map(move |(entity, record)| {
            let idx = record.position(type_id?)?;
            let value = record.components[idx].1.as_any().downcast_ref::<T>()?;
            Some((*entity, value))
        })
    }

    /// Mutably iterate every entity carrying `T`.
    pub fn query_mut<T: Component>(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        let type_id = self.registry.lookup::<T>();
        self.records.iter_mut().filter_map(move |(entity, record)| {
            let idx = record.position(type_id?)?;
            let value = record.components[idx].1.as_any_mut().downcast_mut::<T>()?;
            Some((*entity, value))
        })
    }

    // -- lifecycle outbox ---------------------------------------------------

    /// Queue `event` on `entity`'s outbox. Nothing is delivered until
    /// [`deliver_events`](Self::deliver_events) runs.
    pub fn post_event(&mut self, entity: EntityId, event: LifecycleEvent) -> Result<u64, EcsError> {
        Ok(self.record_mut(entity)?.outbox.post(event))
    }

    /// Drain `entity`'s outbox, handing each event to every attached
    /// component in attach order.
    pub fn deliver_events(&mut self, entity: EntityId) -> Result<DeliveryReport, EcsError> {
        let record = self.record_mut(entity)?;
        let envelopes = record.outbox.drain();
        let mut report = DeliveryReport::default();
        for envelope in &envelopes {
            for (_, component) in record.components.iter_mut() {
                component.deliver(&envelope.event);
                report.deliveries += 1;
            }
            report.events += 1;
        }
        if report.events > 0 {
            tracing::trace!(
                entity = %entity,
                events = report.events,
                deliveries = report.deliveries,
                "delivered lifecycle events"
            );
        }
        Ok(report)
    }

    /// Events queued on `entity` and not yet delivered.
    pub fn pending_events(&self, entity: EntityId) -> usize {
        self.record(entity).map_or(0, |record| record.outbox.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Heat(u32);
    impl Component for Heat {}

    /// Records every event it receives and clears its mark on reuse.
    #[derive(Debug, Default)]
    struct Tracker {
        seen: Vec<LifecycleEvent>,
        mark: Option<u32>,
    }
    impl Component for Tracker {
        fn on_event(&mut self, event: &LifecycleEvent) {
            self.seen.push(*event);
            if *event == LifecycleEvent::Reuse {
                self.mark = None;
            }
        }
    }

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Heat>("heat");
        world.register_component::<Tracker>("tracker");
        world
    }

    #[test]
    fn spawn_is_bare() {
        let mut world = setup_world();
        let e = world.spawn();
        assert!(world.is_alive(e));
        assert_eq!(world.component_count(e), 0);
    }

    #[test]
    fn duplicate_insert_is_rejected_and_keeps_original() {
        let mut world = setup_world();
        let e = world.spawn();
        world.insert_component(e, Heat(1)).unwrap();
        let err = world.insert_component(e, Heat(99)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { .. }));
        assert_eq!(world.get_component::<Heat>(e), Some(&Heat(1)));
        assert_eq!(world.instance_count::<Heat>(e), 1);
    }

    #[test]
    fn unregistered_component_is_an_error() {
        #[derive(Debug)]
        struct Stray;
        impl Component for Stray {}

        let mut world = setup_world();
        let e = world.spawn();
        let err = world.insert_component(e, Stray).unwrap_err();
        assert!(matches!(err, EcsError::UnknownComponent { .. }));
    }

    #[test]
    fn remove_returns_value() {
        let mut world = setup_world();
        let e = world.spawn();
        world.insert_component(e, Heat(5)).unwrap();
        assert_eq!(world.remove_component::<Heat>(e).unwrap(), Some(Heat(5)));
        assert_eq!(world.remove_component::<Heat>(e).unwrap(), None);
        assert!(!world.has_component::<Heat>(e));
    }

    #[test]
    fn despawned_entity_rejects_access() {
        let mut world = setup_world();
        let e = world.spawn();
        world.insert_component(e, Heat(3)).unwrap();
        world.despawn(e).unwrap();
        assert!(!world.is_alive(e));
        assert_eq!(world.get_component::<Heat>(e), None);
        assert!(world.despawn(e).is_err());
        assert!(world.insert_component(e, Heat(4)).is_err());
    }

    #[test]
    fn events_reach_each_component_once() {
        let mut world = setup_world();
        let e = world.spawn();
        world.insert_component(e, Heat(0)).unwrap();
        world
            .insert_component(
                e,
                Tracker {
                    seen: Vec::new(),
                    mark: Some(7),
                },
            )
            .unwrap();

        world.post_event(e, LifecycleEvent::Recycle).unwrap();
        world.post_event(e, LifecycleEvent::Reuse).unwrap();
        assert_eq!(world.pending_events(e), 2);

        let report = world.deliver_events(e).unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.deliveries, 4);
        assert_eq!(world.pending_events(e), 0);

        let tracker = world.get_component::<Tracker>(e).unwrap();
        assert_eq!(
            tracker.seen,
            vec![LifecycleEvent::Recycle, LifecycleEvent::Reuse]
        );
        assert_eq!(tracker.mark, None);

        // A second drain has nothing to deliver.
        let again = world.deliver_events(e).unwrap();
        assert_eq!(again, DeliveryReport::default());
        assert_eq!(world.get_component::<Tracker>(e).unwrap().seen.len(), 2);
    }

    #[test]
    fn query_visits_only_carriers() {
        let mut world = setup_world();
        let a = world.spawn();
        let b = world.spawn();
        world.insert_component(a, Heat(1)).unwrap();
        world.insert_component(b, Tracker::default()).unwrap();

        let hot: Vec<_> = world.query::<Heat>().map(|(e, _)| e).collect();
        assert_eq!(hot, vec![a]);

        for (_, heat) in world.query_mut::<Heat>() {
            heat.0 += 10;
        }
        assert_eq!(world.get_component::<Heat>(a), Some(&Heat(11)));
    }

    #[test]
    fn component_names_follow_attach_order() {
        let mut world = setup_world();
        let e = world.spawn();
        world.insert_component(e, Tracker::default()).unwrap();
        world.insert_component(e, Heat(0)).unwrap();
        assert_eq!(world.component_names(e), vec!["tracker", "heat"]);
    }
}
