//! Configuration distribution.
//!
//! Archetype data is pushed into an entity in two phases. The primary phase
//! runs in dependency order (faction, control mode, pooling metadata, then
//! stats and behavior) and needs only the data record. The derived phase
//! reads what the primary phase wrote and also needs the animation
//! collaborator's result: animation frames, projectile origin, health bar.
//!
//! Every step overwrites the whole of what it owns, so re-running either
//! phase with a different archetype leaves nothing of the previous one.

use std::task::Poll;

use hatchery_ecs::prelude::*;

use crate::archetype::{Archetype, ComponentKind, ComponentProfile};
use crate::collab::{AnimationCollaborator, AnimationSetup, FactionCollaborator};
use crate::components::{
    AiIntention, Animation, Combat, Config, Control, Faction, HealthDisplay, Intent, Lifecycle,
    Movement, Render, Stats,
};
use crate::data::{ArchetypeData, ArchetypeDataProvider};
use crate::error::{AssetError, ConfigError};
use crate::factory::SpawnOptions;
use crate::spatial::{Transform, Vec2};

/// Run `f` on the `T` component of `entity`. A component the profile
/// requires but the entity lacks is logged and skipped.
fn apply<T: Component>(
    world: &mut World,
    entity: EntityId,
    kind: ComponentKind,
    profile: &ComponentProfile,
    f: impl FnOnce(&mut T),
) -> bool {
    match world.get_component_mut::<T>(entity) {
        Some(component) => {
            f(component);
            true
        }
        None => {
            if profile.contains(kind) {
                tracing::warn!(
                    entity = %entity,
                    component = %kind,
                    "component missing during configuration, skipped"
                );
            }
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigurationDistributor {
    configured: u64,
    degraded: u64,
}

impl ConfigurationDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the data record for `archetype`.
    pub fn lookup<'d>(
        &self,
        data: &'d dyn ArchetypeDataProvider,
        archetype: &Archetype,
    ) -> Result<&'d ArchetypeData, ConfigError> {
        data.archetype_data(&archetype.data_key)
            .ok_or_else(|| ConfigError::DataUnavailable {
                archetype: archetype.id.clone(),
            })
    }

    /// Faction, control mode, pooling metadata, then stats and behavior.
    pub fn configure_primary(
        &mut self,
        world: &mut World,
        factions: &mut dyn FactionCollaborator,
        entity: EntityId,
        archetype: &Archetype,
        data: &ArchetypeData,
        options: &SpawnOptions,
    ) -> Result<(), ConfigError> {
        if !world.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity }.into());
        }
        let profile = &archetype.profile;

        let faction = options.faction.clone().unwrap_or_else(|| data.faction.clone());
        factions.apply_faction(entity, &faction);
        apply::<Faction>(world, entity, ComponentKind::Faction, profile, |c| {
            c.id = Some(faction);
        });

        let mode = options.control.unwrap_or(data.behavior.control_mode);
        apply::<Control>(world, entity, ComponentKind::Control, profile, |c| {
            *c = Control {
                mode,
                held_input: None,
            };
        });

        apply::<Lifecycle>(world, entity, ComponentKind::Lifecycle, profile, |c| {
            c.archetype = Some(archetype.id.clone());
            c.class = Some(archetype.class);
        });

        let level = options.level.max(1);
        apply::<Config>(world, entity, ComponentKind::Config, profile, |c| {
            *c = Config {
                archetype: Some(archetype.id.clone()),
                stats: data.stats.clone(),
                behavior: data.behavior.clone(),
                level,
            };
        });
        apply::<Stats>(world, entity, ComponentKind::Stats, profile, |c| {
            *c = Stats {
                max_health: data.stats.max_health,
                health: data.stats.max_health,
                level,
            };
        });
        apply::<Movement>(world, entity, ComponentKind::Movement, profile, |c| {
            *c = Movement {
                speed: data.stats.speed,
                velocity: Vec2::ZERO,
                destination: None,
            };
        });
        apply::<Combat>(world, entity, ComponentKind::Combat, profile, |c| {
            *c = Combat {
                attack: data.stats.attack,
                defense: data.stats.defense,
                range: data.stats.attack_range,
                ranged: data.behavior.ranged,
                cooldown: data.stats.attack_cooldown,
                cooldown_remaining: 0.0,
                current_target: None,
                projectile_origin: Vec2::ZERO,
            };
        });
        apply::<AiIntention>(world, entity, ComponentKind::AiIntention, profile, |c| {
            *c = AiIntention {
                intent: Intent::Idle,
                target: None,
                think_timer: 0.0,
                think_interval: data.behavior.think_interval,
                aggro_range: data.behavior.aggro_range,
            };
        });

        tracing::trace!(
            entity = %entity,
            archetype = %archetype.id,
            "primary configuration applied"
        );
        Ok(())
    }

    /// Animation frames, projectile origin and health-bar binding. A failed
    /// animation setup degrades the entity's visuals and is not an error.
    pub fn configure_derived(
        &mut self,
        world: &mut World,
        entity: EntityId,
        archetype: &Archetype,
        data: &ArchetypeData,
        animation: Result<AnimationSetup, AssetError>,
    ) -> Result<(), ConfigError> {
        if !world.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity }.into());
        }
        let profile = &archetype.profile;

        let degraded = animation.is_err();
        let replacement = match animation {
            Ok(setup) => Animation {
                atlas: Some(setup.atlas),
                frame_count: setup.frame_count,
                frame_rate: setup.frame_rate,
                playhead: 0.0,
                degraded: false,
            },
            Err(err) => {
                match err {
                    AssetError::MissingAtlas => {
                        tracing::debug!(
                            entity = %entity,
                            archetype = %archetype.id,
                            "no animation atlas, visuals degraded"
                        )
                    }
                    _ => {
                        tracing::warn!(
                            entity = %entity,
                            archetype = %archetype.id,
                            error = %err,
                            "animation setup failed, visuals degraded"
                        )
                    }
                }
                Animation {
                    degraded: true,
                    ..Animation::default()
                }
            }
        };
        let applied = apply::<Animation>(world, entity, ComponentKind::Animation, profile, |c| {
            *c = replacement;
        });
        if degraded && applied {
            self.degraded += 1;
        }

        let scale = world
            .get_component::<Transform>(entity)
            .map_or(Vec2::ONE, |t| t.scale);
        apply::<Combat>(world, entity, ComponentKind::Combat, profile, |c| {
            c.projectile_origin = data.visuals.projectile_offset.scaled(scale);
        });

        apply::<Render>(world, entity, ComponentKind::Render, profile, |c| {
            *c = Render {
                base_tint: data.visuals.tint,
                tint: data.visuals.tint,
                visible: false,
                flash_timer: 0.0,
            };
        });

        let ratio = world
            .get_component::<Stats>(entity)
            .map_or(1.0, Stats::health_ratio);
        apply::<HealthDisplay>(world, entity, ComponentKind::HealthDisplay, profile, |c| {
            *c = HealthDisplay {
                bound_to: Some(entity),
                ratio,
                offset: data.visuals.health_bar_offset.scaled(scale),
            };
        });

        self.configured += 1;
        tracing::trace!(
            entity = %entity,
            archetype = %archetype.id,
            degraded,
            "derived configuration applied"
        );
        Ok(())
    }

    /// Both phases in one call. An animation setup that is still in flight
    /// is cancelled and the entity's visuals are degraded.
    #[allow(clippy::too_many_arguments)]
    pub fn configure(
        &mut self,
        world: &mut World,
        data: &dyn ArchetypeDataProvider,
        animations: &mut dyn AnimationCollaborator,
        factions: &mut dyn FactionCollaborator,
        entity: EntityId,
        archetype: &Archetype,
        options: &SpawnOptions,
    ) -> Result<(), ConfigError> {
        let record = self.lookup(data, archetype)?;
        self.configure_primary(world, factions, entity, archetype, record, options)?;
        let animation = match animations.initialize_animations(entity, record) {
            Poll::Ready(result) => result,
            Poll::Pending => {
                animations.cancel(entity);
                Err(AssetError::NotReady {
                    atlas: record.visuals.atlas.clone().unwrap_or_default(),
                })
            }
        };
        self.configure_derived(world, entity, archetype, record, animation)
    }

    /// Entities fully configured so far.
    pub fn configured_count(&self) -> u64 {
        self.configured
    }

    /// Configurations that ended with degraded visuals.
    pub fn degraded_count(&self) -> u64 {
        self.degraded
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::archetype::{ArchetypeId, ArchetypePrefab};
    use crate::collab::{AtlasAnimator, FactionTable};
    use crate::components;
    use crate::data::{ControlMode, StaticDataProvider};
    use crate::injector::ComponentInjector;
    use crate::spatial::Rgba;

    fn archetype(id: &str) -> Archetype {
        Archetype::from_prefab(ArchetypeId::from(id), ArchetypePrefab::default(), &HashMap::new())
    }

    fn goblin() -> ArchetypeData {
        let mut data = ArchetypeData::new("greenskins");
        data.stats.max_health = 40.0;
        data.stats.speed = 2.5;
        data.stats.attack_cooldown = 0.8;
        data.visuals.atlas = Some("goblin".into());
        data.visuals.tint = Rgba { r: 0.3, g: 0.8, b: 0.3, a: 1.0 };
        data.visuals.projectile_offset = Vec2::new(0.0, 0.5);
        data
    }

    fn archer() -> ArchetypeData {
        let mut data = ArchetypeData::new("skeletons");
        data.stats.max_health = 25.0;
        data.behavior.ranged = true;
        data.behavior.control_mode = ControlMode::Scripted;
        data
    }

    struct Fixture {
        world: World,
        distributor: ConfigurationDistributor,
        data: StaticDataProvider,
        animations: AtlasAnimator,
        factions: FactionTable,
        entity: EntityId,
    }

    fn fixture() -> Fixture {
        let mut world = World::new();
        components::register_all(&mut world);
        let entity = world.spawn();
        world.insert_component(entity, Transform::NEUTRAL).unwrap();
        ComponentInjector::new()
            .ensure_components(&mut world, entity, &ComponentProfile::full())
            .unwrap();
        Fixture {
            world,
            distributor: ConfigurationDistributor::new(),
            data: StaticDataProvider::new()
                .with("goblin_normal", goblin())
                .with("skeleton_archer", archer()),
            animations: AtlasAnimator::new().with_atlas("goblin", 8, 12.0),
            factions: FactionTable::new(),
            entity,
        }
    }

    impl Fixture {
        fn configure(
            &mut self,
            archetype: &Archetype,
            options: &SpawnOptions,
        ) -> Result<(), ConfigError> {
            self.distributor.configure(
                &mut self.world,
                &self.data,
                &mut self.animations,
                &mut self.factions,
                self.entity,
                archetype,
                options,
            )
        }
    }

    #[test]
    fn distributes_data_to_every_component() {
        let mut f = fixture();
        f.configure(&archetype("goblin_normal"), &SpawnOptions::default())
            .unwrap();
        let e = f.entity;

        assert_eq!(f.world.get_component::<Stats>(e).unwrap().health, 40.0);
        assert_eq!(f.world.get_component::<Movement>(e).unwrap().speed, 2.5);
        assert_eq!(f.world.get_component::<Combat>(e).unwrap().cooldown, 0.8);
        assert_eq!(
            f.world.get_component::<Combat>(e).unwrap().projectile_origin,
            Vec2::new(0.0, 0.5)
        );
        assert_eq!(
            f.world.get_component::<Faction>(e).unwrap().id.as_deref(),
            Some("greenskins")
        );
        assert_eq!(f.factions.faction_of(e), Some("greenskins"));
        assert_eq!(f.world.get_component::<Animation>(e).unwrap().frame_count, 8);
        assert_eq!(f.world.get_component::<HealthDisplay>(e).unwrap().bound_to, Some(e));
        assert_eq!(
            f.world.get_component::<Lifecycle>(e).unwrap().archetype,
            Some(ArchetypeId::from("goblin_normal"))
        );
    }

    #[test]
    fn reconfiguring_overwrites_previous_archetype() {
        let mut f = fixture();
        f.configure(&archetype("goblin_normal"), &SpawnOptions::default())
            .unwrap();
        f.configure(&archetype("skeleton_archer"), &SpawnOptions::default())
            .unwrap();
        let e = f.entity;

        let combat = f.world.get_component::<Combat>(e).unwrap();
        assert!(combat.ranged);
        assert_eq!(combat.cooldown, archer().stats.attack_cooldown);
        assert_eq!(combat.projectile_origin, Vec2::ZERO);
        assert_eq!(f.world.get_component::<Control>(e).unwrap().mode, ControlMode::Scripted);
        assert_eq!(f.world.get_component::<Stats>(e).unwrap().max_health, 25.0);
        let anim = f.world.get_component::<Animation>(e).unwrap();
        assert!(anim.degraded);
        assert_eq!(anim.atlas, None);
        assert_eq!(f.world.get_component::<Render>(e).unwrap().base_tint, Rgba::WHITE);
        assert_eq!(f.factions.faction_of(e), Some("skeletons"));
    }

    #[test]
    fn options_override_data() {
        let mut f = fixture();
        let options = SpawnOptions {
            faction: Some("mercenaries".into()),
            control: Some(ControlMode::Player),
            level: 3,
            ..SpawnOptions::default()
        };
        f.configure(&archetype("goblin_normal"), &options).unwrap();
        let e = f.entity;
        assert_eq!(f.world.get_component::<Control>(e).unwrap().mode, ControlMode::Player);
        assert_eq!(f.world.get_component::<Stats>(e).unwrap().level, 3);
        assert_eq!(f.factions.faction_of(e), Some("mercenaries"));
    }

    #[test]
    fn missing_record_is_fatal() {
        let mut f = fixture();
        let err = f
            .configure(&archetype("wraith_elite"), &SpawnOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DataUnavailable {
                archetype: "wraith_elite".into()
            }
        );
    }

    #[test]
    fn unknown_atlas_degrades_but_succeeds() {
        let mut f = fixture();
        f.animations = AtlasAnimator::new();
        f.configure(&archetype("goblin_normal"), &SpawnOptions::default())
            .unwrap();
        assert!(f.world.get_component::<Animation>(f.entity).unwrap().degraded);
        assert_eq!(f.distributor.degraded_count(), 1);
        assert_eq!(f.world.get_component::<Stats>(f.entity).unwrap().health, 40.0);
    }

    #[test]
    fn pending_atlas_is_cancelled_in_synchronous_configure() {
        let mut f = fixture();
        f.animations = AtlasAnimator::new().with_atlas("goblin", 8, 12.0).with_latency(3);
        f.configure(&archetype("goblin_normal"), &SpawnOptions::default())
            .unwrap();
        assert!(f.world.get_component::<Animation>(f.entity).unwrap().degraded);
        assert_eq!(f.animations.in_flight(), 0);
    }
}
