//! Character components.
//!
//! Each component owns its reset rules: on [`LifecycleEvent::Reuse`] and
//! [`LifecycleEvent::Recycle`] it clears whatever state belongs to the
//! previous occupant. Configured values (stats, speeds, ranges) are left for
//! the configuration distributor to overwrite.

use hatchery_ecs::prelude::*;

use crate::archetype::{ArchetypeClass, ArchetypeId, ComponentKind, ComponentProfile};
use crate::data::{BehaviorParams, ControlMode, StatBlock};
use crate::spatial::{Rgba, Transform, Vec2};

fn clears_occupant(event: &LifecycleEvent) -> bool {
    matches!(event, LifecycleEvent::Reuse | LifecycleEvent::Recycle)
}

// ---------------------------------------------------------------------------
// Durable tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Movement {
    /// Configured top speed, world units per second.
    pub speed: f32,
    pub velocity: Vec2,
    pub destination: Option<Vec2>,
}

impl Component for Movement {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if clears_occupant(event) {
            self.velocity = Vec2::ZERO;
            self.destination = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Combat {
    pub attack: f32,
    pub defense: f32,
    pub range: f32,
    pub ranged: bool,
    /// Configured seconds between attacks.
    pub cooldown: f32,
    pub cooldown_remaining: f32,
    pub current_target: Option<EntityId>,
    /// Projectile spawn point relative to the entity origin.
    pub projectile_origin: Vec2,
}

impl Combat {
    pub fn ready_to_attack(&self) -> bool {
        self.cooldown_remaining <= 0.0
    }
}

impl Component for Combat {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if clears_occupant(event) {
            self.current_target = None;
            self.cooldown_remaining = 0.0;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub atlas: Option<String>,
    pub frame_count: u32,
    pub frame_rate: f32,
    /// Seconds into the current clip.
    pub playhead: f32,
    /// Set when setup failed; the entity plays no animations.
    pub degraded: bool,
}

impl Animation {
    pub fn current_frame(&self) -> u32 {
        if self.frame_count == 0 {
            return 0;
        }
        (self.playhead * self.frame_rate) as u32 % self.frame_count
    }
}

impl Component for Animation {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if clears_occupant(event) {
            self.playhead = 0.0;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Render {
    /// Tint from archetype data.
    pub base_tint: Rgba,
    /// Tint currently drawn; differs from `base_tint` during a hit flash.
    pub tint: Rgba,
    pub visible: bool,
    pub flash_timer: f32,
}

impl Default for Render {
    fn default() -> Self {
        Self {
            base_tint: Rgba::WHITE,
            tint: Rgba::WHITE,
            visible: false,
            flash_timer: 0.0,
        }
    }
}

impl Component for Render {
    fn on_event(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Reuse => {
                self.tint = self.base_tint;
                self.flash_timer = 0.0;
            }
            LifecycleEvent::Recycle => {
                self.tint = self.base_tint;
                self.flash_timer = 0.0;
                self.visible = false;
            }
            LifecycleEvent::Activated => self.visible = true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stats {
    pub max_health: f32,
    pub health: f32,
    pub level: u32,
}

impl Stats {
    pub fn health_ratio(&self) -> f32 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.max_health).clamp(0.0, 1.0)
    }
}

impl Component for Stats {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if *event == LifecycleEvent::Reuse {
            self.health = self.max_health;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthDisplay {
    /// Entity whose health the bar shows. `None` while unbound.
    pub bound_to: Option<EntityId>,
    pub ratio: f32,
    pub offset: Vec2,
}

impl Default for HealthDisplay {
    fn default() -> Self {
        Self {
            bound_to: None,
            ratio: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

impl Component for HealthDisplay {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if clears_occupant(event) {
            self.bound_to = None;
            self.ratio = 1.0;
        }
    }
}

// ---------------------------------------------------------------------------
// Instance tier
// ---------------------------------------------------------------------------

/// Pooling metadata for the current occupant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lifecycle {
    /// Archetype the entity is configured as; keys its pool on release.
    pub archetype: Option<ArchetypeId>,
    pub class: Option<ArchetypeClass>,
    /// Times this entity has been taken back out of a pool.
    pub reuse_count: u32,
}

impl Component for Lifecycle {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if *event == LifecycleEvent::Reuse {
            self.reuse_count += 1;
        }
    }
}

/// Primary configuration the other components derive from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub archetype: Option<ArchetypeId>,
    pub stats: StatBlock,
    pub behavior: BehaviorParams,
    pub level: u32,
}

impl Component for Config {}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Control {
    pub mode: ControlMode,
    /// Last directional input, for player-controlled entities.
    pub held_input: Option<Vec2>,
}

impl Component for Control {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if clears_occupant(event) {
            self.held_input = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Faction {
    pub id: Option<String>,
}

impl Component for Faction {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if *event == LifecycleEvent::Recycle {
            self.id = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    #[default]
    Idle,
    Chase,
    Attack,
    Flee,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AiIntention {
    pub intent: Intent,
    pub target: Option<EntityId>,
    /// Seconds until the next decision.
    pub think_timer: f32,
    pub think_interval: f32,
    pub aggro_range: f32,
}

impl Component for AiIntention {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if clears_occupant(event) {
            self.intent = Intent::Idle;
            self.target = None;
            self.think_timer = 0.0;
        }
    }
}

// ---------------------------------------------------------------------------
// Composed
// ---------------------------------------------------------------------------

/// Facade over an entity's character components. Attached last; its
/// presence marks the entity as composed.
#[derive(Debug, Clone, PartialEq)]
pub struct Composed {
    /// Kinds present when the facade was built or last extended.
    pub profile: ComponentProfile,
}

impl Component for Composed {}

// ---------------------------------------------------------------------------
// World helpers
// ---------------------------------------------------------------------------

/// Register every pooling component type with `world`.
pub fn register_all(world: &mut World) {
    world.register_component::<Transform>("transform");
    world.register_component::<Movement>(ComponentKind::Movement.as_str());
    world.register_component::<Combat>(ComponentKind::Combat.as_str());
    world.register_component::<Animation>(ComponentKind::Animation.as_str());
    world.register_component::<Render>(ComponentKind::Render.as_str());
    world.register_component::<Stats>(ComponentKind::Stats.as_str());
    world.register_component::<HealthDisplay>(ComponentKind::HealthDisplay.as_str());
    world.register_component::<Lifecycle>(ComponentKind::Lifecycle.as_str());
    world.register_component::<Config>(ComponentKind::Config.as_str());
    world.register_component::<Control>(ComponentKind::Control.as_str());
    world.register_component::<Faction>(ComponentKind::Faction.as_str());
    world.register_component::<AiIntention>(ComponentKind::AiIntention.as_str());
    world.register_component::<Composed>("composed");
}

/// Attach a default instance of `kind`. Fails if it is already attached.
pub fn insert_default(
    world: &mut World,
    entity: EntityId,
    kind: ComponentKind,
) -> Result<(), EcsError> {
    match kind {
        ComponentKind::Movement => world.insert_component(entity, Movement::default()),
        ComponentKind::Combat => world.insert_component(entity, Combat::default()),
        ComponentKind::Animation => world.insert_component(entity, Animation::default()),
        ComponentKind::Render => world.insert_component(entity, Render::default()),
        ComponentKind::Stats => world.insert_component(entity, Stats::default()),
        ComponentKind::HealthDisplay => world.insert_component(entity, HealthDisplay::default()),
        ComponentKind::Lifecycle => world.insert_component(entity, Lifecycle::default()),
        ComponentKind::Config => world.insert_component(entity, Config::default()),
        ComponentKind::Control => world.insert_component(entity, Control::default()),
        ComponentKind::Faction => world.insert_component(entity, Faction::default()),
        ComponentKind::AiIntention => world.insert_component(entity, AiIntention::default()),
    }
}

pub fn has_kind(world: &World, entity: EntityId, kind: ComponentKind) -> bool {
    match kind {
        ComponentKind::Movement => world.has_component::<Movement>(entity),
        ComponentKind::Combat => world.has_component::<Combat>(entity),
        ComponentKind::Animation => world.has_component::<Animation>(entity),
        ComponentKind::Render => world.has_component::<Render>(entity),
        ComponentKind::Stats => world.has_component::<Stats>(entity),
        ComponentKind::HealthDisplay => world.has_component::<HealthDisplay>(entity),
        ComponentKind::Lifecycle => world.has_component::<Lifecycle>(entity),
        ComponentKind::Config => world.has_component::<Config>(entity),
        ComponentKind::Control => world.has_component::<Control>(entity),
        ComponentKind::Faction => world.has_component::<Faction>(entity),
        ComponentKind::AiIntention => world.has_component::<AiIntention>(entity),
    }
}

/// Instances of `kind` attached to `entity` (0 or 1).
pub fn kind_instance_count(world: &World, entity: EntityId, kind: ComponentKind) -> usize {
    match kind {
        ComponentKind::Movement => world.instance_count::<Movement>(entity),
        ComponentKind::Combat => world.instance_count::<Combat>(entity),
        ComponentKind::Animation => world.instance_count::<Animation>(entity),
        ComponentKind::Render => world.instance_count::<Render>(entity),
        ComponentKind::Stats => world.instance_count::<Stats>(entity),
        ComponentKind::HealthDisplay => world.instance_count::<HealthDisplay>(entity),
        ComponentKind::Lifecycle => world.instance_count::<Lifecycle>(entity),
        ComponentKind::Config => world.instance_count::<Config>(entity),
        ComponentKind::Control => world.instance_count::<Control>(entity),
        ComponentKind::Faction => world.instance_count::<Faction>(entity),
        ComponentKind::AiIntention => world.instance_count::<AiIntention>(entity),
    }
}

/// Kinds currently attached to `entity`.
pub fn present_profile(world: &World, entity: EntityId) -> ComponentProfile {
    ComponentProfile::from_kinds(
        ComponentKind::INJECTION_ORDER
            .into_iter()
            .filter(|kind| has_kind(world, entity, *kind)),
    )
}
