//! Spawning and recycling driven through the tick loop.

use hatchery_engine::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ARCHETYPES: [&str; 3] = ["goblin_normal", "bat_minion", "orc_elite"];

fn data() -> StaticDataProvider {
    let mut provider = StaticDataProvider::new();
    for id in ARCHETYPES {
        let mut record = ArchetypeData::new("horde");
        record.visuals.atlas = Some("sprites".into());
        provider.insert(id, record);
    }
    provider
}

fn tick_loop_with(
    data: impl ArchetypeDataProvider + 'static,
    animations: AtlasAnimator,
) -> TickLoop {
    let mut ctx = GameContext::new(PoolConfig::default(), data).with_animations(animations);
    for id in ARCHETYPES {
        ctx.register_archetype_prefab(id, ArchetypePrefab::default())
            .unwrap();
    }
    let mut tick_loop = TickLoop::new(
        ctx,
        TickConfig {
            maintenance_interval: 30,
            ..Default::default()
        },
    );
    register_default_systems(&mut tick_loop);
    tick_loop.add_system("reaper", reaper_system);
    tick_loop
}

fn assert_disjoint(ctx: &GameContext) {
    for e in ctx.active_entities() {
        assert!(!ctx.is_pooled(e), "{e} is both active and pooled");
    }
    let pooled: usize = ctx.all_pool_stats().iter().map(|(_, s)| s.size).sum();
    assert_eq!(
        ctx.world().entity_count(),
        ctx.active_count() + pooled + ctx.pending_count()
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn slow_assets_finish_over_ticks() {
    let animations = AtlasAnimator::new().with_atlas("sprites", 4, 8.0).with_latency(3);
    let mut tick_loop = tick_loop_with(data(), animations);

    let err = tick_loop
        .context_mut()
        .acquire_entity("goblin_normal", SpawnOptions::default())
        .unwrap_err();
    let SpawnError::Suspended(ticket) = err else {
        panic!("expected a suspended spawn, got {err:?}");
    };
    let reserved = tick_loop.context().reserved_entity(ticket).unwrap();

    let mut done = Vec::new();
    for _ in 0..5 {
        done.extend(tick_loop.tick());
        assert_disjoint(tick_loop.context());
    }
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].result, Ok(reserved));
    let anim = tick_loop.context().world().get_component::<Animation>(reserved).unwrap();
    assert!(!anim.degraded);
    assert_eq!(anim.frame_count, 4);
}

#[test]
fn systems_never_see_suspended_entities() {
    let staged = StagedDataProvider::never(data());
    let mut tick_loop = tick_loop_with(staged, AtlasAnimator::new().with_atlas("sprites", 4, 8.0));
    let ticket = tick_loop
        .context_mut()
        .request_spawn("bat_minion", SpawnOptions::default())
        .unwrap();
    let reserved = tick_loop.context().reserved_entity(ticket).unwrap();
    tick_loop
        .context_mut()
        .world_mut()
        .get_component_mut::<Movement>(reserved)
        .unwrap()
        .velocity = Vec2::new(10.0, 0.0);

    tick_loop.run_ticks(10);
    assert_eq!(
        tick_loop.context().world().get_component::<Transform>(reserved).unwrap().position,
        Vec2::ZERO
    );
    assert_eq!(tick_loop.context().spawn_phase(ticket), Some(SpawnPhase::AwaitingData));

    assert!(tick_loop.context_mut().cancel_spawn(ticket).is_some());
    assert!(!tick_loop.context().is_active(reserved));
}

#[test]
fn reused_entities_forget_their_previous_life() {
    let mut tick_loop = tick_loop_with(data(), AtlasAnimator::new().with_atlas("sprites", 4, 8.0));
    let goblin = tick_loop
        .context_mut()
        .acquire_entity("goblin_normal", SpawnOptions::at(0.0, 0.0))
        .unwrap();
    let orc = tick_loop
        .context_mut()
        .acquire_entity("orc_elite", SpawnOptions::at(3.0, 0.0))
        .unwrap();
    {
        let ctx = tick_loop.context_mut();
        let options = SpawnOptions {
            faction: Some("crown".into()),
            ..SpawnOptions::at(3.0, 0.0)
        };
        ctx.reconfigure_entity(orc, "orc_elite", &options).unwrap();
    }
    tick_loop.tick();
    assert_eq!(
        tick_loop.context().world().get_component::<AiIntention>(goblin).unwrap().target,
        Some(orc)
    );

    tick_loop.context_mut().world_mut().get_component_mut::<Stats>(goblin).unwrap().health = 0.0;
    tick_loop.tick();
    assert!(tick_loop.context().is_pooled(goblin));

    let again = tick_loop
        .context_mut()
        .acquire_entity("goblin_normal", SpawnOptions::at(50.0, 50.0))
        .unwrap();
    assert_eq!(again, goblin);
    let world = tick_loop.context().world();
    let ai = world.get_component::<AiIntention>(again).unwrap();
    assert_eq!(ai.target, None);
    assert_eq!(ai.intent, Intent::Idle);
    assert_eq!(world.get_component::<Combat>(again).unwrap().current_target, None);
    assert_eq!(world.get_component::<Lifecycle>(again).unwrap().reuse_count, 1);
    assert!(world.get_component::<Render>(again).unwrap().visible);
}

#[test]
fn seeded_churn_keeps_pools_bounded() {
    let mut rng = Pcg32::seed_from_u64(0x5eed);
    let animations = AtlasAnimator::new().with_atlas("sprites", 4, 8.0).with_latency(1);
    let staged = StagedDataProvider::after_polls(data(), 2);
    let mut tick_loop = tick_loop_with(staged, animations);

    for _ in 0..400 {
        match rng.gen_range(0..4) {
            0 | 1 => {
                let id = ARCHETYPES[rng.gen_range(0..ARCHETYPES.len())];
                let _ = tick_loop.context_mut().acquire_entity(id, SpawnOptions::default());
            }
            2 => {
                let active = tick_loop.context().active_entities();
                if !active.is_empty() {
                    let e = active[rng.gen_range(0..active.len())];
                    let world = tick_loop.context_mut().world_mut();
                    if let Some(stats) = world.get_component_mut::<Stats>(e) {
                        stats.health = 0.0;
                    }
                }
            }
            _ => {
                let id = ARCHETYPES[rng.gen_range(0..ARCHETYPES.len())];
                tick_loop
                    .context_mut()
                    .set_pool_bounds(id, PoolBounds::new(rng.gen_range(0..4), 0));
            }
        }
        tick_loop.tick();
        assert_disjoint(tick_loop.context());
        // Maintenance ran on the tick that just finished.
        if tick_loop.tick_count() > 1 && (tick_loop.tick_count() - 1) % 30 == 0 {
            for (_, stats) in tick_loop.context().all_pool_stats() {
                assert!(stats.size as f32 <= stats.max_size as f32 * 1.5);
            }
        }
    }

    tick_loop.context_mut().shutdown();
    assert_eq!(tick_loop.context().world().entity_count(), 0);
    assert_eq!(tick_loop.context().active_count(), 0);
}
