//! Active-entity registry.
//!
//! Membership here is the authority on whether gameplay owns an entity right
//! now. Entities are added only once fully active and removed before any
//! other release step runs.

use std::collections::HashMap;

use hatchery_ecs::entity::EntityId;

use crate::archetype::ArchetypeId;

#[derive(Debug, Default)]
pub struct ActiveRegistry {
    active: HashMap<EntityId, ArchetypeId>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the entity was already registered.
    pub fn insert(&mut self, entity: EntityId, archetype: ArchetypeId) -> bool {
        if self.active.contains_key(&entity) {
            tracing::warn!(entity = %entity, "entity already in active registry");
            return false;
        }
        self.active.insert(entity, archetype);
        true
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<ArchetypeId> {
        self.active.remove(&entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.active.contains_key(&entity)
    }

    pub fn archetype_of(&self, entity: EntityId) -> Option<&ArchetypeId> {
        self.active.get(&entity)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn count_for(&self, archetype: &ArchetypeId) -> usize {
        self.active.values().filter(|a| *a == archetype).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &ArchetypeId)> + '_ {
        self.active.iter().map(|(e, a)| (*e, a))
    }

    /// Registered entities, sorted by id.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut entities: Vec<_> = self.active.keys().copied().collect();
        entities.sort();
        entities
    }

    /// Point `entity` at a new archetype. Used by reconfiguration.
    pub fn retag(&mut self, entity: EntityId, archetype: ArchetypeId) -> bool {
        match self.active.get_mut(&entity) {
            Some(current) => {
                *current = archetype;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_archetype() {
        let mut active = ActiveRegistry::new();
        let goblin = ArchetypeId::from("goblin_normal");
        assert!(active.insert(EntityId::new(0, 0), goblin.clone()));
        assert!(active.insert(EntityId::new(1, 0), goblin.clone()));
        assert!(active.insert(EntityId::new(2, 0), "orc_elite".into()));
        assert!(!active.insert(EntityId::new(2, 0), "orc_elite".into()));

        assert_eq!(active.len(), 3);
        assert_eq!(active.count_for(&goblin), 2);
        assert_eq!(active.remove(EntityId::new(0, 0)), Some(goblin.clone()));
        assert_eq!(active.count_for(&goblin), 1);
        assert!(active.retag(EntityId::new(1, 0), "orc_elite".into()));
        assert_eq!(active.count_for(&goblin), 0);
        assert_eq!(active.entities(), vec![EntityId::new(1, 0), EntityId::new(2, 0)]);
    }
}
