//! Headless horde demo.
//!
//! Spawns seeded waves of goblins, bats and a lich against a knight patrol,
//! strikes random characters every few ticks and lets the reaper recycle
//! the fallen. Pool statistics are printed as JSON at the end.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=hatchery_pool=debug cargo run -p hatchery-engine --example horde -- [config.json]
//! ```

use anyhow::Context as _;
use hatchery_engine::prelude::*;

const TICKS: u64 = 1_200;
const WAVE_EVERY: u64 = 120;

fn provider() -> StagedDataProvider {
    let mut goblin = ArchetypeData::new("greenskins");
    goblin.visuals.atlas = Some("goblin".into());
    goblin.stats.speed = 3.0;

    let mut bat = ArchetypeData::new("greenskins");
    bat.visuals.atlas = Some("bat".into());
    bat.stats.max_health = 20.0;
    bat.stats.speed = 6.0;

    let mut lich = ArchetypeData::new("undead");
    lich.stats.max_health = 800.0;
    lich.behavior.ranged = true;
    lich.stats.attack_range = 6.0;

    let mut knight = ArchetypeData::new("crown");
    knight.visuals.atlas = Some("knight".into());
    knight.stats.max_health = 250.0;

    let data = StaticDataProvider::new()
        .with("goblin_normal", goblin)
        .with("bat_minion", bat)
        .with("lich_boss", lich)
        .with("knight_elite", knight);
    // Data arrives a few frames after startup, like a streamed bundle.
    StagedDataProvider::after_polls(data, 5)
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_path(&path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };
    init_tracing(&config.log_filter)?;

    let animations = AtlasAnimator::new()
        .with_atlas("goblin", 8, 12.0)
        .with_atlas("bat", 4, 20.0)
        .with_atlas("knight", 10, 10.0)
        .with_latency(2);
    let mut ctx = GameContext::new(config.pools.clone(), provider()).with_animations(animations);
    for id in ["goblin_normal", "bat_minion", "lich_boss", "knight_elite"] {
        if ctx.archetype(id).is_none() {
            ctx.register_archetype_prefab(id, ArchetypePrefab::default())?;
        }
    }

    let mut tick_loop = TickLoop::new(ctx, config.tick.clone());
    register_default_systems(&mut tick_loop);
    tick_loop.add_system("reaper", reaper_system);

    let mut horde = WaveDirector::new(config.seed)
        .with_archetype("goblin_normal", 6)
        .with_archetype("bat_minion", 3)
        .with_archetype("lich_boss", 1);
    let mut patrol =
        WaveDirector::new(config.seed.wrapping_add(1)).with_archetype("knight_elite", 1);

    let mut completed = 0;
    for tick in 0..TICKS {
        if tick % WAVE_EVERY == 0 {
            horde.spawn_wave(tick_loop.context_mut(), 12);
            patrol.spawn_wave(tick_loop.context_mut(), 2);
        }
        if tick % 3 == 0 {
            horde.strike_random(tick_loop.context_mut(), 35.0);
        }
        completed += tick_loop.tick().len();
    }

    let ctx = tick_loop.context();
    println!(
        "ran {} ticks ({:.1}s simulated): {} active, {} suspended spawns finished",
        tick_loop.tick_count(),
        tick_loop.sim_time(),
        ctx.active_count(),
        completed
    );
    let stats: Vec<_> = ctx.all_pool_stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let report = tick_loop.context_mut().shutdown();
    println!(
        "shutdown: {} cancelled, {} released, {} destroyed",
        report.cancelled, report.released, report.destroyed
    );
    Ok(())
}
