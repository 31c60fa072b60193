//! Built-in gameplay systems.
//!
//! Every system walks the active registry only, so entities sitting in a pool
//! or halfway through a suspended spawn are never touched.

use hatchery_pool::components::{
    AiIntention, Animation, Combat, Control, Faction, HealthDisplay, Intent, Movement, Render,
    Stats,
};
use hatchery_pool::context::GameContext;
use hatchery_pool::data::ControlMode;
use hatchery_pool::prelude::EntityId;
use hatchery_pool::spatial::{Transform, Vec2};

use crate::tick::TickLoop;

/// Health ratio below which an AI character stops fighting.
pub const FLEE_HEALTH_RATIO: f32 = 0.2;

/// Register the built-in systems in their canonical order.
pub fn register_default_systems(tick_loop: &mut TickLoop) {
    tick_loop.add_system("ai_think", ai_think_system);
    tick_loop.add_system_after("movement", &["ai_think"], movement_system);
    tick_loop.add_system("combat_timers", combat_timer_system);
    tick_loop.add_system("animation", animation_system);
    tick_loop.add_system_after("health_bars", &["combat_timers"], health_bar_system);
}

fn length(v: Vec2) -> f32 {
    (v.x * v.x + v.y * v.y).sqrt()
}

fn position_of(ctx: &GameContext, entity: EntityId) -> Option<Vec2> {
    ctx.world().get_component::<Transform>(entity).map(|t| t.position)
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Steer towards `Movement::destination` at `speed`, then integrate.
///
/// Arrival snaps to the destination and clears it.
pub fn movement_system(ctx: &mut GameContext, dt: f64) {
    let dt = dt as f32;
    for entity in ctx.active_entities() {
        let Some(position) = position_of(ctx, entity) else {
            continue;
        };
        let world = ctx.world_mut();
        let Some(movement) = world.get_component_mut::<Movement>(entity) else {
            continue;
        };

        let next = match movement.destination {
            Some(dest) => {
                let delta = Vec2::new(dest.x - position.x, dest.y - position.y);
                let distance = length(delta);
                let step = movement.speed * dt;
                if distance <= step || distance == 0.0 {
                    movement.velocity = Vec2::ZERO;
                    movement.destination = None;
                    dest
                } else {
                    movement.velocity = delta * (movement.speed / distance);
                    position + movement.velocity * dt
                }
            }
            None => position + movement.velocity * dt,
        };

        if let Some(transform) = world.get_component_mut::<Transform>(entity) {
            transform.position = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Combat timers
// ---------------------------------------------------------------------------

/// Count down attack cooldowns and hit flashes.
pub fn combat_timer_system(ctx: &mut GameContext, dt: f64) {
    let dt = dt as f32;
    for entity in ctx.active_entities() {
        let world = ctx.world_mut();
        if let Some(combat) = world.get_component_mut::<Combat>(entity) {
            combat.cooldown_remaining = (combat.cooldown_remaining - dt).max(0.0);
        }
        if let Some(render) = world.get_component_mut::<Render>(entity) {
            if render.flash_timer > 0.0 {
                render.flash_timer = (render.flash_timer - dt).max(0.0);
                if render.flash_timer == 0.0 {
                    render.tint = render.base_tint;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Animation
// ---------------------------------------------------------------------------

/// Advance the playhead. Degraded animations stay on frame zero.
pub fn animation_system(ctx: &mut GameContext, dt: f64) {
    for entity in ctx.active_entities() {
        if let Some(anim) = ctx.world_mut().get_component_mut::<Animation>(entity) {
            if anim.degraded || anim.frame_count == 0 {
                continue;
            }
            anim.playhead += dt as f32;
        }
    }
}

// ---------------------------------------------------------------------------
// Health bars
// ---------------------------------------------------------------------------

/// Mirror the bound entity's health ratio into each health bar.
pub fn health_bar_system(ctx: &mut GameContext, _dt: f64) {
    for entity in ctx.active_entities() {
        let Some(bound) = ctx
            .world()
            .get_component::<HealthDisplay>(entity)
            .and_then(|h| h.bound_to)
        else {
            continue;
        };
        let ratio = ctx
            .world()
            .get_component::<Stats>(bound)
            .map(Stats::health_ratio)
            .unwrap_or(0.0);
        if let Some(display) = ctx.world_mut().get_component_mut::<HealthDisplay>(entity) {
            display.ratio = ratio;
        }
    }
}

// ---------------------------------------------------------------------------
// AI
// ---------------------------------------------------------------------------

/// Re-evaluate AI-controlled characters whose think timer has run out.
///
/// A target that is no longer active is dropped before anything else, since
/// its entity may already belong to a different character. New targets are
/// the nearest active entity of another faction within aggro range.
pub fn ai_think_system(ctx: &mut GameContext, dt: f64) {
    let dt = dt as f32;
    let active = ctx.active_entities();

    for &entity in &active {
        let is_ai = ctx
            .world()
            .get_component::<Control>(entity)
            .map_or(true, |c| c.mode == ControlMode::Ai);
        if !is_ai {
            continue;
        }

        let (due, current_target, aggro_range) = {
            let Some(ai) = ctx.world_mut().get_component_mut::<AiIntention>(entity) else {
                continue;
            };
            if ai.target.is_some_and(|t| !active.contains(&t)) {
                ai.target = None;
                ai.intent = Intent::Idle;
            }
            ai.think_timer -= dt;
            let due = ai.think_timer <= 0.0;
            if due {
                ai.think_timer = ai.think_interval;
            }
            (due, ai.target, ai.aggro_range)
        };
        if !due {
            continue;
        }

        let Some(position) = position_of(ctx, entity) else {
            continue;
        };
        let target = current_target
            .or_else(|| nearest_enemy(ctx, entity, position, aggro_range, &active));
        let fleeing = ctx
            .world()
            .get_component::<Stats>(entity)
            .is_some_and(|s| s.max_health > 0.0 && s.health_ratio() < FLEE_HEALTH_RATIO);
        let attack_range = ctx.world().get_component::<Combat>(entity).map_or(0.0, |c| c.range);

        let (intent, destination) = match target.and_then(|t| position_of(ctx, t).map(|p| (t, p))) {
            None => (Intent::Idle, None),
            Some((_, target_pos)) if fleeing => {
                let away = Vec2::new(position.x - target_pos.x, position.y - target_pos.y);
                (Intent::Flee, Some(position + away))
            }
            Some((_, target_pos)) => {
                let distance =
                    length(Vec2::new(target_pos.x - position.x, target_pos.y - position.y));
                if distance > aggro_range {
                    (Intent::Idle, None)
                } else if distance <= attack_range {
                    (Intent::Attack, None)
                } else {
                    (Intent::Chase, Some(target_pos))
                }
            }
        };
        let target = if intent == Intent::Idle { None } else { target };

        let world = ctx.world_mut();
        if let Some(ai) = world.get_component_mut::<AiIntention>(entity) {
            ai.intent = intent;
            ai.target = target;
        }
        if let Some(movement) = world.get_component_mut::<Movement>(entity) {
            movement.destination = destination;
            if destination.is_none() {
                movement.velocity = Vec2::ZERO;
            }
        }
        if let Some(combat) = world.get_component_mut::<Combat>(entity) {
            combat.current_target = if intent == Intent::Attack { target } else { None };
        }
    }
}

fn nearest_enemy(
    ctx: &GameContext,
    entity: EntityId,
    position: Vec2,
    range: f32,
    active: &[EntityId],
) -> Option<EntityId> {
    let own = ctx.world().get_component::<Faction>(entity).and_then(|f| f.id.as_deref());
    let mut best: Option<(f32, EntityId)> = None;
    for &other in active {
        if other == entity {
            continue;
        }
        let theirs = ctx.world().get_component::<Faction>(other).and_then(|f| f.id.as_deref());
        if theirs.is_none() || theirs == own {
            continue;
        }
        let Some(pos) = position_of(ctx, other) else {
            continue;
        };
        let distance = length(Vec2::new(pos.x - position.x, pos.y - position.y));
        if distance <= range && best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, other));
        }
    }
    best.map(|(_, e)| e)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
