//! Collaborator interfaces: animation setup and faction membership.
//!
//! Both live outside the pooling layer. Animation setup may take several
//! ticks and may fail without consequence for gameplay; faction application
//! is synchronous.

use std::collections::HashMap;
use std::task::Poll;

use hatchery_ecs::entity::EntityId;

use crate::data::ArchetypeData;
use crate::error::AssetError;

// ---------------------------------------------------------------------------
// Animation
// ---------------------------------------------------------------------------

/// Result of a successful animation setup.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSetup {
    pub atlas: String,
    pub frame_count: u32,
    pub frame_rate: f32,
}

pub trait AnimationCollaborator {
    /// Start or continue setting up animations for `entity`. Returns
    /// `Pending` while atlas loading is in flight.
    fn initialize_animations(
        &mut self,
        entity: EntityId,
        data: &ArchetypeData,
    ) -> Poll<Result<AnimationSetup, AssetError>>;

    /// Forget any in-flight setup for `entity`.
    fn cancel(&mut self, _entity: EntityId) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasInfo {
    pub frame_count: u32,
    pub frame_rate: f32,
}

/// Serves animation setups from a table of known atlases. Each setup stays
/// pending for `latency` polls.
#[derive(Debug, Default)]
pub struct AtlasAnimator {
    atlases: HashMap<String, AtlasInfo>,
    latency: u32,
    in_flight: HashMap<EntityId, u32>,
}

impl AtlasAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_atlas(
        mut self,
        name: impl Into<String>,
        frame_count: u32,
        frame_rate: f32,
    ) -> Self {
        self.atlases.insert(
            name.into(),
            AtlasInfo {
                frame_count,
                frame_rate,
            },
        );
        self
    }

    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency = polls;
        self
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl AnimationCollaborator for AtlasAnimator {
    fn initialize_animations(
        &mut self,
        entity: EntityId,
        data: &ArchetypeData,
    ) -> Poll<Result<AnimationSetup, AssetError>> {
        let Some(atlas) = data.visuals.atlas.as_deref() else {
            return Poll::Ready(Err(AssetError::MissingAtlas));
        };
        let Some(info) = self.atlases.get(atlas).copied() else {
            self.in_flight.remove(&entity);
            return Poll::Ready(Err(AssetError::AtlasNotFound {
                atlas: atlas.to_owned(),
            }));
        };

        let remaining = self.in_flight.entry(entity).or_insert(self.latency);
        if *remaining > 0 {
            *remaining -= 1;
            return Poll::Pending;
        }
        self.in_flight.remove(&entity);
        Poll::Ready(Ok(AnimationSetup {
            atlas: atlas.to_owned(),
            frame_count: info.frame_count,
            frame_rate: info.frame_rate,
        }))
    }

    fn cancel(&mut self, entity: EntityId) {
        self.in_flight.remove(&entity);
    }
}

// ---------------------------------------------------------------------------
// Faction
// ---------------------------------------------------------------------------

pub trait FactionCollaborator {
    /// Put `entity` into `faction`, replacing any previous membership.
    fn apply_faction(&mut self, entity: EntityId, faction: &str);

    /// Drop `entity` from its faction. Called on recycle.
    fn release_faction(&mut self, _entity: EntityId) {}
}

/// Faction membership table.
#[derive(Debug, Default)]
pub struct FactionTable {
    members: HashMap<EntityId, String>,
}

impl FactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faction_of(&self, entity: EntityId) -> Option<&str> {
        self.members.get(&entity).map(String::as_str)
    }

    pub fn member_count(&self, faction: &str) -> usize {
        self.members.values().filter(|f| *f == faction).count()
    }
}

impl FactionCollaborator for FactionTable {
    fn apply_faction(&mut self, entity: EntityId, faction: &str) {
        if let Some(previous) = self.members.insert(entity, faction.to_owned()) {
            if previous != faction {
                tracing::debug!(
                    entity = %entity,
                    from = %previous,
                    to = %faction,
                    "faction changed"
                );
            }
        }
    }

    fn release_faction(&mut self, entity: EntityId) {
        self.members.remove(&entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_with_atlas(atlas: Option<&str>) -> ArchetypeData {
        let mut data = ArchetypeData::new("greenskins");
        data.visuals.atlas = atlas.map(str::to_owned);
        data
    }

    #[test]
    fn animator_waits_out_its_latency() {
        let mut animator = AtlasAnimator::new().with_atlas("goblin", 12, 8.0).with_latency(2);
        let e = EntityId::new(0, 0);
        let data = data_with_atlas(Some("goblin"));

        assert!(animator.initialize_animations(e, &data).is_pending());
        assert!(animator.initialize_animations(e, &data).is_pending());
        let Poll::Ready(Ok(setup)) = animator.initialize_animations(e, &data) else {
            panic!("expected ready setup");
        };
        assert_eq!(setup.frame_count, 12);
        assert_eq!(animator.in_flight(), 0);
    }

    #[test]
    fn unknown_atlas_fails_immediately() {
        let mut animator = AtlasAnimator::new();
        let result =
            animator.initialize_animations(EntityId::new(0, 0), &data_with_atlas(Some("ghost")));
        assert!(matches!(result, Poll::Ready(Err(AssetError::AtlasNotFound { .. }))));

        let result = animator.initialize_animations(EntityId::new(0, 0), &data_with_atlas(None));
        assert_eq!(result, Poll::Ready(Err(AssetError::MissingAtlas)));
    }

    #[test]
    fn cancel_drops_in_flight_setup() {
        let mut animator = AtlasAnimator::new().with_atlas("goblin", 4, 8.0).with_latency(5);
        let e = EntityId::new(1, 0);
        assert!(animator.initialize_animations(e, &data_with_atlas(Some("goblin"))).is_pending());
        animator.cancel(e);
        assert_eq!(animator.in_flight(), 0);
    }

    #[test]
    fn faction_table_tracks_membership() {
        let mut table = FactionTable::new();
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);
        table.apply_faction(a, "undead");
        table.apply_faction(b, "undead");
        table.apply_faction(b, "living");
        assert_eq!(table.member_count("undead"), 1);
        table.release_faction(a);
        assert_eq!(table.faction_of(a), None);
        assert_eq!(table.faction_of(b), Some("living"));
    }
}
