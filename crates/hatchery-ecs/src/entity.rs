//! Entity handles and the slot table that issues them.
//!
//! Pooled characters keep their handle for as long as they exist: parking
//! an entity in a pool does not touch its slot. A slot only changes hands
//! when its entity is destroyed, and every hand-over bumps the slot's
//! generation so old handles go stale instead of aliasing the newcomer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Generational entity handle. Ordered by slot, then generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    slot: u32,
    generation: u32,
}

impl EntityId {
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self {
            slot: index,
            generation,
        }
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.slot
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({self})")
    }
}

/// Short `slot`v`generation` form used in log fields, e.g. `3v0`.
impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Occupied { generation: u32 },
    Vacant { next_generation: u32 },
    /// Every generation has been handed out; the slot is never reused.
    Retired,
}

/// Issues [`EntityId`]s and takes them back when entities are destroyed.
///
/// Vacated slots are reused most recent first. A slot whose generation
/// counter would wrap is retired rather than recycled.
#[derive(Debug, Default)]
pub struct SlotAllocator {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    occupied: usize,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> EntityId {
        self.occupied += 1;
        if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            if let Slot::Vacant { next_generation } = *slot {
                *slot = Slot::Occupied {
                    generation: next_generation,
                };
                return EntityId::new(index, next_generation);
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied { generation: 0 });
        EntityId::new(index, 0)
    }

    /// Vacate the slot behind `id`. Stale or unknown handles are ignored
    /// and return `false`.
    pub fn release(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.occupied -= 1;
        let slot = &mut self.slots[id.index() as usize];
        match id.generation().checked_add(1) {
            Some(next_generation) => {
                *slot = Slot::Vacant { next_generation };
                self.vacant.push(id.index());
            }
            None => {
                tracing::debug!(entity = %id, "entity slot retired");
                *slot = Slot::Retired;
            }
        }
        true
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        matches!(
            self.slots.get(id.index() as usize),
            Some(Slot::Occupied { generation }) if *generation == id.generation()
        )
    }

    pub fn live_count(&self) -> usize {
        self.occupied
    }

    /// Slots that can be handed out again without growing the table.
    pub fn vacant_count(&self) -> usize {
        self.vacant.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slots_are_distinct() {
        let mut slots = SlotAllocator::new();
        let ids: Vec<_> = (0..16).map(|_| slots.allocate()).collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(id.index(), i as u32);
            assert_eq!(id.generation(), 0);
        }
        assert_eq!(slots.live_count(), 16);
        assert_eq!(slots.vacant_count(), 0);
    }

    #[test]
    fn released_slot_returns_under_a_new_generation() {
        let mut slots = SlotAllocator::new();
        let first = slots.allocate();
        let _other = slots.allocate();
        assert!(slots.release(first));
        assert_eq!(slots.vacant_count(), 1);

        let second = slots.allocate();
        assert_eq!(second, EntityId::new(first.index(), 1));
        assert!(!slots.is_alive(first));
        assert!(slots.is_alive(second));
        assert_eq!(slots.vacant_count(), 0);
    }

    #[test]
    fn most_recently_released_slot_is_reused_first() {
        let mut slots = SlotAllocator::new();
        let a = slots.allocate();
        let b = slots.allocate();
        slots.release(a);
        slots.release(b);
        assert_eq!(slots.allocate().index(), b.index());
        assert_eq!(slots.allocate().index(), a.index());
    }

    #[test]
    fn stale_release_is_ignored() {
        let mut slots = SlotAllocator::new();
        let e = slots.allocate();
        assert!(slots.release(e));
        assert!(!slots.release(e));
        assert!(!slots.release(EntityId::new(9, 0)));
        assert_eq!(slots.live_count(), 0);
    }

    #[test]
    fn exhausted_slot_is_retired() {
        let mut slots = SlotAllocator::new();
        slots.allocate();
        slots.slots[0] = Slot::Occupied {
            generation: u32::MAX,
        };
        let last = EntityId::new(0, u32::MAX);
        assert!(slots.release(last));
        assert_eq!(slots.vacant_count(), 0);

        let next = slots.allocate();
        assert_eq!(next, EntityId::new(1, 0));
        assert!(!slots.is_alive(last));
    }

    #[test]
    fn handles_sort_by_slot_and_print_compactly() {
        let mut ids = vec![EntityId::new(2, 0), EntityId::new(1, 5), EntityId::new(1, 0)];
        ids.sort();
        assert_eq!(ids, vec![EntityId::new(1, 0), EntityId::new(1, 5), EntityId::new(2, 0)]);
        assert_eq!(EntityId::new(42, 7).to_string(), "42v7");
        assert_eq!(format!("{:?}", EntityId::new(3, 0)), "EntityId(3v0)");
    }
}
