//! Seeded wave spawning and reaping of defeated characters.
//!
//! The director draws archetypes by weight from a `Pcg32` stream, so a given
//! seed always produces the same sequence of spawn requests.

use hatchery_pool::archetype::ArchetypeId;
use hatchery_pool::components::Stats;
use hatchery_pool::context::GameContext;
use hatchery_pool::error::SpawnError;
use hatchery_pool::factory::{SpawnOptions, SpawnTicket};
use hatchery_pool::recycle::RecycleOutcome;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// What one call to [`WaveDirector::spawn_wave`] produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveReport {
    /// Spawns that completed immediately.
    pub spawned: usize,
    /// Spawns left waiting on data or assets.
    pub suspended: Vec<SpawnTicket>,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct WaveDirector {
    rng: Pcg32,
    entries: Vec<(ArchetypeId, u32)>,
    total_weight: u32,
    /// Half-width of the square spawn area, centred on the origin. Always
    /// finite and non-negative.
    spawn_radius: f32,
    waves: u64,
}

impl WaveDirector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            entries: Vec::new(),
            total_weight: 0,
            spawn_radius: 20.0,
            waves: 0,
        }
    }

    /// Add an archetype with a relative weight. Zero weights are skipped.
    pub fn with_archetype(mut self, id: impl Into<ArchetypeId>, weight: u32) -> Self {
        if weight > 0 {
            self.entries.push((id.into(), weight));
            self.total_weight += weight;
        }
        self
    }

    /// Set the spawn area half-width. Negative radii are mirrored; a
    /// non-finite radius spawns everything at the origin.
    pub fn with_spawn_radius(mut self, radius: f32) -> Self {
        self.spawn_radius = if radius.is_finite() { radius.abs() } else { 0.0 };
        self
    }

    pub fn spawn_radius(&self) -> f32 {
        self.spawn_radius
    }

    pub fn waves_spawned(&self) -> u64 {
        self.waves
    }

    fn pick(&mut self) -> Option<ArchetypeId> {
        if self.total_weight == 0 {
            return None;
        }
        let mut roll = self.rng.gen_range(0..self.total_weight);
        for (id, weight) in &self.entries {
            if roll < *weight {
                return Some(id.clone());
            }
            roll -= weight;
        }
        None
    }

    /// Request `count` spawns at random positions.
    pub fn spawn_wave(&mut self, ctx: &mut GameContext, count: usize) -> WaveReport {
        let mut report = WaveReport::default();
        for _ in 0..count {
            let Some(id) = self.pick() else {
                break;
            };
            let r = self.spawn_radius;
            let options = SpawnOptions::at(self.rng.gen_range(-r..=r), self.rng.gen_range(-r..=r));
            match ctx.acquire_entity(id.as_str(), options) {
                Ok(_) => report.spawned += 1,
                Err(SpawnError::Suspended(ticket)) => report.suspended.push(ticket),
                Err(err) => {
                    tracing::warn!(archetype = %id, error = %err, "wave spawn failed");
                    report.failed += 1;
                }
            }
        }
        self.waves += 1;
        tracing::debug!(
            wave = self.waves,
            spawned = report.spawned,
            suspended = report.suspended.len(),
            failed = report.failed,
            "wave requested"
        );
        report
    }

    /// Deal `damage` to a random active character.
    pub fn strike_random(&mut self, ctx: &mut GameContext, damage: f32) -> bool {
        let active = ctx.active_entities();
        if active.is_empty() {
            return false;
        }
        let target = active[self.rng.gen_range(0..active.len())];
        match ctx.world_mut().get_component_mut::<Stats>(target) {
            Some(stats) => {
                stats.health = (stats.health - damage).max(0.0);
                true
            }
            None => false,
        }
    }
}

/// Release every active character whose health has reached zero. Returns
/// how many went back to a pool or were destroyed.
pub fn reap_defeated(ctx: &mut GameContext) -> usize {
    let defeated: Vec<_> = ctx
        .active_entities()
        .into_iter()
        .filter(|&e| {
            ctx.world()
                .get_component::<Stats>(e)
                .is_some_and(|s| s.max_health > 0.0 && s.health <= 0.0)
        })
        .collect();

    defeated
        .into_iter()
        .filter(|&e| ctx.release_entity(e) != RecycleOutcome::Ignored)
        .count()
}

/// Tick-loop adapter for [`reap_defeated`].
pub fn reaper_system(ctx: &mut GameContext, _dt: f64) {
    reap_defeated(ctx);
}
