//! Archetypes: named character types and the component sets they require.
//!
//! An [`Archetype`] is resolved from an [`ArchetypePrefab`] at registration
//! time. It fixes three things for the rest of the session: which components
//! an entity of this type carries ([`ComponentProfile`]), how large its pool
//! may grow ([`PoolBounds`]), and which external data record configures it.
//!
//! Once a spawn has resolved an archetype it is sealed: the registry refuses
//! to replace it, so entities already built against it never see their
//! definition change underneath them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// ArchetypeId
// ---------------------------------------------------------------------------

/// Identifier of a character type, e.g. `"goblin_normal"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchetypeId(String);

impl ArchetypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArchetypeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ArchetypeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// ArchetypeClass / PoolBounds
// ---------------------------------------------------------------------------

/// Spawn-rate class of an archetype. Drives its default pool bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchetypeClass {
    /// Rare, expensive: tiny pool, minimal warmup.
    Boss,
    Elite,
    Normal,
    /// Spawned in bursts: large pool, aggressive warmup.
    Minion,
}

impl ArchetypeClass {
    /// Infer the class from an id suffix (`_boss`, `_elite`, `_minion` or
    /// `_trash`). Anything else is [`ArchetypeClass::Normal`].
    pub fn from_id(id: &ArchetypeId) -> Self {
        let id = id.as_str();
        if id.ends_with("_boss") {
            ArchetypeClass::Boss
        } else if id.ends_with("_elite") {
            ArchetypeClass::Elite
        } else if id.ends_with("_minion") || id.ends_with("_trash") {
            ArchetypeClass::Minion
        } else {
            ArchetypeClass::Normal
        }
    }

    pub fn default_bounds(self) -> PoolBounds {
        match self {
            ArchetypeClass::Boss => PoolBounds::new(3, 1),
            ArchetypeClass::Elite => PoolBounds::new(8, 2),
            ArchetypeClass::Normal => PoolBounds::new(20, 5),
            ArchetypeClass::Minion => PoolBounds::new(40, 10),
        }
    }
}

/// Capacity and warmup size of one archetype's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBounds {
    /// Idle entities kept at most; releases beyond this destroy the entity.
    pub max_size: usize,
    /// Entities built ahead of time by a preload.
    pub preload: usize,
}

impl PoolBounds {
    pub const fn new(max_size: usize, preload: usize) -> Self {
        Self { max_size, preload }
    }
}

impl Default for PoolBounds {
    fn default() -> Self {
        ArchetypeClass::Normal.default_bounds()
    }
}

// ---------------------------------------------------------------------------
// ComponentKind / ComponentProfile
// ---------------------------------------------------------------------------

/// Lifetime tier of a character component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentTier {
    /// Long-lived and simple to reset; attached first.
    Durable,
    /// Carries the identity of the current occupant; attached second.
    Instance,
}

/// Every character component an archetype can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Movement,
    Combat,
    Animation,
    Render,
    Stats,
    HealthDisplay,
    Lifecycle,
    Config,
    Control,
    Faction,
    AiIntention,
}

impl ComponentKind {
    /// Injection order: durable tier first, then instance tier.
    pub const INJECTION_ORDER: [ComponentKind; 11] = [
        ComponentKind::Movement,
        ComponentKind::Combat,
        ComponentKind::Animation,
        ComponentKind::Render,
        ComponentKind::Stats,
        ComponentKind::HealthDisplay,
        ComponentKind::Lifecycle,
        ComponentKind::Config,
        ComponentKind::Control,
        ComponentKind::Faction,
        ComponentKind::AiIntention,
    ];

    pub fn tier(self) -> ComponentTier {
        match self {
            ComponentKind::Movement
            | ComponentKind::Combat
            | ComponentKind::Animation
            | ComponentKind::Render
            | ComponentKind::Stats
            | ComponentKind::HealthDisplay => ComponentTier::Durable,
            ComponentKind::Lifecycle
            | ComponentKind::Config
            | ComponentKind::Control
            | ComponentKind::Faction
            | ComponentKind::AiIntention => ComponentTier::Instance,
        }
    }

    /// Name the component is registered under in the world.
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Movement => "movement",
            ComponentKind::Combat => "combat",
            ComponentKind::Animation => "animation",
            ComponentKind::Render => "render",
            ComponentKind::Stats => "stats",
            ComponentKind::HealthDisplay => "health_display",
            ComponentKind::Lifecycle => "lifecycle",
            ComponentKind::Config => "config",
            ComponentKind::Control => "control",
            ComponentKind::Faction => "faction",
            ComponentKind::AiIntention => "ai_intention",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of component kinds an archetype requires.
///
/// Archetypes that may share pooled entities should share a superset
/// profile, so that reuse across them never has to extend the entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentProfile(BTreeSet<ComponentKind>);

impl ComponentProfile {
    /// Every kind.
    pub fn full() -> Self {
        Self(ComponentKind::INJECTION_ORDER.into_iter().collect())
    }

    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn from_kinds(kinds: impl IntoIterator<Item = ComponentKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    /// [`full`](Self::full) minus `kinds`.
    pub fn full_without(kinds: &[ComponentKind]) -> Self {
        let mut profile = Self::full();
        for kind in kinds {
            profile.0.remove(kind);
        }
        profile
    }

    pub fn contains(&self, kind: ComponentKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn insert(&mut self, kind: ComponentKind) -> bool {
        self.0.insert(kind)
    }

    /// Whether every kind in `other` is also in `self`.
    pub fn covers(&self, other: &ComponentProfile) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Kinds of `self` that `present` lacks, in injection order.
    pub fn missing_from(&self, present: &ComponentProfile) -> Vec<ComponentKind> {
        self.in_injection_order()
            .filter(|kind| !present.contains(*kind))
            .collect()
    }

    /// Kinds of this profile, durable tier first.
    pub fn in_injection_order(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        ComponentKind::INJECTION_ORDER
            .into_iter()
            .filter(move |kind| self.0.contains(kind))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ComponentProfile {
    fn default() -> Self {
        Self::full()
    }
}

// ---------------------------------------------------------------------------
// ArchetypePrefab / Archetype
// ---------------------------------------------------------------------------

/// Registration template for an archetype. Unset fields fall back to the
/// class defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchetypePrefab {
    /// Inferred from the id suffix when unset.
    #[serde(default)]
    pub class: Option<ArchetypeClass>,
    #[serde(default)]
    pub max_size: Option<usize>,
    #[serde(default)]
    pub preload: Option<usize>,
    #[serde(default)]
    pub profile: ComponentProfile,
    /// Key of the data record configuring this archetype. Defaults to the
    /// archetype id.
    #[serde(default)]
    pub data_key: Option<ArchetypeId>,
}

impl ArchetypePrefab {
    pub fn with_class(mut self, class: ArchetypeClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_bounds(mut self, max_size: usize, preload: usize) -> Self {
        self.max_size = Some(max_size);
        self.preload = Some(preload);
        self
    }

    pub fn with_profile(mut self, profile: ComponentProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_data_key(mut self, key: impl Into<ArchetypeId>) -> Self {
        self.data_key = Some(key.into());
        self
    }
}

/// A resolved archetype. Immutable once a spawn has used it.
#[derive(Debug, Clone, PartialEq)]
pub struct Archetype {
    pub id: ArchetypeId,
    pub class: ArchetypeClass,
    pub bounds: PoolBounds,
    pub profile: ComponentProfile,
    pub data_key: ArchetypeId,
}

impl Archetype {
    /// Resolve `prefab` for `id`, consulting `class_bounds` before the
    /// built-in class defaults.
    pub fn from_prefab(
        id: ArchetypeId,
        prefab: ArchetypePrefab,
        class_bounds: &HashMap<ArchetypeClass, PoolBounds>,
    ) -> Self {
        let class = prefab.class.unwrap_or_else(|| ArchetypeClass::from_id(&id));
        let defaults = class_bounds
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_bounds());
        let bounds = PoolBounds {
            max_size: prefab.max_size.unwrap_or(defaults.max_size),
            preload: prefab.preload.unwrap_or(defaults.preload),
        };
        let data_key = prefab.data_key.unwrap_or_else(|| id.clone());
        Self {
            id,
            class,
            bounds,
            profile: prefab.profile,
            data_key,
        }
    }
}

// ---------------------------------------------------------------------------
// ArchetypeRegistry
// ---------------------------------------------------------------------------

/// All archetypes known to a session.
#[derive(Debug, Default)]
pub struct ArchetypeRegistry {
    archetypes: HashMap<ArchetypeId, Archetype>,
    /// Archetypes a spawn has resolved; these can no longer be replaced.
    sealed: HashSet<ArchetypeId>,
}

impl ArchetypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an archetype. Replacing a sealed one is refused.
    pub fn register(&mut self, archetype: Archetype) -> Result<(), RegistryError> {
        if self.sealed.contains(&archetype.id) {
            return Err(RegistryError::Sealed {
                archetype: archetype.id,
            });
        }
        if self.archetypes.contains_key(&archetype.id) {
            tracing::debug!(archetype = %archetype.id, "replacing unsealed archetype");
        }
        self.archetypes.insert(archetype.id.clone(), archetype);
        Ok(())
    }

    /// Look up `id` for a spawn, sealing it.
    pub fn resolve(&mut self, id: &ArchetypeId) -> Option<&Archetype> {
        let archetype = self.archetypes.get(id)?;
        if self.sealed.insert(id.clone()) {
            tracing::debug!(archetype = %id, "archetype sealed for this session");
        }
        Some(archetype)
    }

    /// Look up `id` without sealing it.
    pub fn get(&self, id: &ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    /// Change the pool bounds of a registered archetype. Bounds are pool
    /// policy, not part of the sealed definition.
    pub fn set_bounds(&mut self, id: &ArchetypeId, bounds: PoolBounds) -> bool {
        match self.archetypes.get_mut(id) {
            Some(archetype) => {
                archetype.bounds = bounds;
                true
            }
            None => false,
        }
    }

    pub fn is_sealed(&self, id: &ArchetypeId) -> bool {
        self.sealed.contains(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<ArchetypeId> {
        let mut ids: Vec<_> = self.archetypes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
