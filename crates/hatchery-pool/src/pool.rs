//! Per-archetype pools of idle entities.
//!
//! A [`PoolStore`] is a bounded cache. Releasing into a full pool does not
//! grow it: the entity comes back as [`ReleaseOutcome::Overflow`] and the
//! caller destroys it. Every queue mutation happens inside one synchronous
//! call, so two spawns can never both pop the same entity.
//!
//! The store only tracks handles. Despawning overflowed or evicted entities
//! is the caller's job; the store counts them in `destroy_count`.

use std::collections::{HashMap, VecDeque};

use hatchery_ecs::entity::EntityId;
use serde::Serialize;

use crate::archetype::{ArchetypeClass, ArchetypeId, PoolBounds};

/// Default ratio of pool size to `max_size` above which maintenance evicts.
pub const DEFAULT_EVICTION_FACTOR: f32 = 1.5;

// ---------------------------------------------------------------------------
// PoolStats
// ---------------------------------------------------------------------------

/// Snapshot of one archetype's pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Idle entities currently pooled.
    pub size: usize,
    pub max_size: usize,
    /// Entities constructed for this archetype, preloads included.
    pub create_count: u64,
    /// Acquires served from the pool.
    pub acquire_count: u64,
    /// Releases that pooled the entity.
    pub release_count: u64,
    /// Entities destroyed: overflow, eviction, failed construction, shutdown.
    pub destroy_count: u64,
}

/// What happened to an entity handed to [`PoolStore::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Pooled,
    /// The pool was full. The caller must destroy the entity.
    Overflow(EntityId),
    /// The entity was already pooled; nothing changed.
    Duplicate,
}

// ---------------------------------------------------------------------------
// PoolEntry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PoolEntry {
    idle: VecDeque<EntityId>,
    bounds: PoolBounds,
    create_count: u64,
    acquire_count: u64,
    release_count: u64,
    destroy_count: u64,
}

impl PoolEntry {
    fn new(bounds: PoolBounds) -> Self {
        Self {
            idle: VecDeque::new(),
            bounds,
            create_count: 0,
            acquire_count: 0,
            release_count: 0,
            destroy_count: 0,
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.idle.len(),
            max_size: self.bounds.max_size,
            create_count: self.create_count,
            acquire_count: self.acquire_count,
            release_count: self.release_count,
            destroy_count: self.destroy_count,
        }
    }
}

// ---------------------------------------------------------------------------
// PoolStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PoolStore {
    entries: HashMap<ArchetypeId, PoolEntry>,
    /// Reverse index: which pool holds each idle entity.
    pooled: HashMap<EntityId, ArchetypeId>,
    eviction_factor: f32,
}

impl Default for PoolStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVICTION_FACTOR)
    }
}

impl PoolStore {
    /// Factors below 1.0 would evict pools that are within their bound;
    /// they are raised to 1.0. NaN falls back to the default.
    pub fn new(eviction_factor: f32) -> Self {
        let clamped = if eviction_factor.is_nan() {
            DEFAULT_EVICTION_FACTOR
        } else {
            eviction_factor.max(1.0)
        };
        if clamped != eviction_factor {
            tracing::warn!(
                requested = eviction_factor,
                used = clamped,
                "eviction factor out of range"
            );
        }
        Self {
            entries: HashMap::new(),
            pooled: HashMap::new(),
            eviction_factor: clamped,
        }
    }

    /// Set the bounds of `archetype`'s pool, creating it if needed. Lowering
    /// `max_size` does not evict; [`maintain`](Self::maintain) does.
    pub fn configure(&mut self, archetype: &ArchetypeId, bounds: PoolBounds) {
        self.entries
            .entry(archetype.clone())
            .and_modify(|entry| entry.bounds = bounds)
            .or_insert_with(|| PoolEntry::new(bounds));
    }

    pub fn bounds(&self, archetype: &ArchetypeId) -> Option<PoolBounds> {
        self.entries.get(archetype).map(|entry| entry.bounds)
    }

    fn entry_mut(&mut self, archetype: &ArchetypeId) -> &mut PoolEntry {
        self.entries.entry(archetype.clone()).or_insert_with(|| {
            let bounds = ArchetypeClass::from_id(archetype).default_bounds();
            tracing::debug!(
                archetype = %archetype,
                max_size = bounds.max_size,
                "pool created with class defaults"
            );
            PoolEntry::new(bounds)
        })
    }

    /// Pop the oldest idle entity of `archetype`. `None` means the caller
    /// must construct one.
    pub fn acquire(&mut self, archetype: &ArchetypeId) -> Option<EntityId> {
        let entry = self.entries.get_mut(archetype)?;
        let entity = entry.idle.pop_front()?;
        entry.acquire_count += 1;
        self.pooled.remove(&entity);
        tracing::debug!(
            archetype = %archetype,
            entity = %entity,
            remaining = entry.idle.len(),
            "pool hit"
        );
        Some(entity)
    }

    /// Return `entity` to `archetype`'s pool.
    pub fn release(&mut self, archetype: &ArchetypeId, entity: EntityId) -> ReleaseOutcome {
        if let Some(holder) = self.pooled.get(&entity) {
            tracing::warn!(
                entity = %entity,
                pool = %holder,
                "entity already pooled, release ignored"
            );
            return ReleaseOutcome::Duplicate;
        }
        let entry = self.entry_mut(archetype);
        if entry.idle.len() >= entry.bounds.max_size {
            entry.destroy_count += 1;
            tracing::warn!(
                archetype = %archetype,
                entity = %entity,
                max_size = entry.bounds.max_size,
                "pool full, entity will be destroyed"
            );
            return ReleaseOutcome::Overflow(entity);
        }
        entry.idle.push_back(entity);
        entry.release_count += 1;
        self.pooled.insert(entity, archetype.clone());
        ReleaseOutcome::Pooled
    }

    /// Fill `archetype`'s pool with up to `count` entities from `make`,
    /// never beyond `max_size`. Returns how many were added.
    pub fn preload(
        &mut self,
        archetype: &ArchetypeId,
        count: usize,
        mut make: impl FnMut() -> Option<EntityId>,
    ) -> usize {
        let entry = self.entry_mut(archetype);
        let room = entry.bounds.max_size.saturating_sub(entry.idle.len());
        let wanted = count.min(room);
        let mut added = Vec::with_capacity(wanted);
        for _ in 0..wanted {
            match make() {
                Some(entity) => added.push(entity),
                None => break,
            }
        }

        let entry = self.entry_mut(archetype);
        entry.create_count += added.len() as u64;
        entry.idle.extend(added.iter().copied());
        for entity in &added {
            self.pooled.insert(*entity, archetype.clone());
        }
        if !added.is_empty() {
            tracing::info!(
                archetype = %archetype,
                added = added.len(),
                requested = count,
                "pool preloaded"
            );
        }
        added.len()
    }

    pub fn record_create(&mut self, archetype: &ArchetypeId) {
        self.entry_mut(archetype).create_count += 1;
    }

    /// Count a destruction that did not go through [`release`](Self::release).
    pub fn record_destroy(&mut self, archetype: &ArchetypeId) {
        self.entry_mut(archetype).destroy_count += 1;
    }

    /// Stats for `archetype`. Zeroed for an archetype with no pool.
    pub fn stats(&self, archetype: &ArchetypeId) -> PoolStats {
        self.entries
            .get(archetype)
            .map(PoolEntry::stats)
            .unwrap_or_default()
    }

    /// Stats for every pool, sorted by archetype id.
    pub fn all_stats(&self) -> Vec<(ArchetypeId, PoolStats)> {
        let mut stats: Vec<_> = self
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.pooled.contains_key(&entity)
    }

    /// Pool currently holding `entity`.
    pub fn pool_of(&self, entity: EntityId) -> Option<&ArchetypeId> {
        self.pooled.get(&entity)
    }

    pub fn total_idle(&self) -> usize {
        self.pooled.len()
    }

    /// Evict pools that grew past `eviction_factor * max_size` back down to
    /// `max_size`. Returns the evicted entities for the caller to destroy.
    pub fn maintain(&mut self) -> Vec<EntityId> {
        let mut evicted = Vec::new();
        for (archetype, entry) in self.entries.iter_mut() {
            let limit = entry.bounds.max_size as f32 * self.eviction_factor;
            if entry.idle.len() as f32 <= limit {
                continue;
            }
            let excess = entry.idle.len().saturating_sub(entry.bounds.max_size);
            for _ in 0..excess {
                if let Some(entity) = entry.idle.pop_back() {
                    self.pooled.remove(&entity);
                    evicted.push(entity);
                }
            }
            entry.destroy_count += excess as u64;
            tracing::info!(
                archetype = %archetype,
                evicted = excess,
                max_size = entry.bounds.max_size,
                "pool maintenance evicted excess"
            );
        }
        evicted
    }

    /// Empty every pool, counting the entities as destroyed.
    pub fn drain_all(&mut self) -> Vec<EntityId> {
        let mut drained = Vec::with_capacity(self.pooled.len());
        for entry in self.entries.values_mut() {
            entry.destroy_count += entry.idle.len() as u64;
            drained.extend(entry.idle.drain(..));
        }
        self.pooled.clear();
        drained
    }

    pub fn eviction_factor(&self) -> f32 {
        self.eviction_factor
    }
}
