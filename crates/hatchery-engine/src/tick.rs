//! Fixed-timestep tick loop driving a [`GameContext`].
//!
//! Each tick:
//!
//! 1. Gameplay systems run in schedule order. They see active entities only;
//!    spawns still in flight are invisible to them.
//! 2. Suspended spawns are polled once, in request order.
//! 3. Every `maintenance_interval` ticks, oversized pools are trimmed.
//! 4. The tick counter advances.
//!
//! ```
//! use hatchery_engine::prelude::*;
//!
//! let ctx = GameContext::new(PoolConfig::default(), StaticDataProvider::new());
//! let mut tick_loop = TickLoop::new(ctx, TickConfig::default());
//! tick_loop.add_system("wander", |_ctx, _dt| {});
//!
//! tick_loop.run_ticks(10);
//! assert_eq!(tick_loop.tick_count(), 10);
//! ```

use std::time::{Duration, Instant};

use hatchery_pool::config::PoolConfig;
use hatchery_pool::context::GameContext;
use hatchery_pool::factory::SpawnOutcome;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// Ticks between pool maintenance passes. Zero disables maintenance.
    pub maintenance_interval: u64,
}

impl Default for TickConfig {
    /// 60 Hz, maintenance every ten seconds.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            maintenance_interval: 600,
        }
    }
}

impl TickConfig {
    /// Default timestep with the maintenance cadence from `pools`.
    pub fn from_pool_config(pools: &PoolConfig) -> Self {
        Self {
            maintenance_interval: pools.maintenance_interval_ticks,
            ..Self::default()
        }
    }

    fn maintenance_due(&self, tick: u64) -> bool {
        self.maintenance_interval > 0 && tick > 0 && tick % self.maintenance_interval == 0
    }
}

/// What happened during the most recent tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system, in schedule order.
    pub system_times: Vec<(String, Duration)>,
    pub spawn_poll_time: Duration,
    pub total_time: Duration,
    /// Suspended spawns that finished, successfully or not.
    pub spawns_completed: usize,
    pub spawns_failed: usize,
    /// Pooled entities destroyed by maintenance.
    pub evicted: usize,
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// A gameplay system. Receives the context and the fixed timestep.
pub type SystemFn = fn(&mut GameContext, f64);

#[derive(Debug)]
struct ScheduledSystem {
    label: String,
    run: SystemFn,
    /// Schedule positions this system must follow. Always lower than its
    /// own position.
    runs_after: Vec<usize>,
}

pub struct TickLoop {
    ctx: GameContext,
    schedule: Vec<ScheduledSystem>,
    ticks: u64,
    config: TickConfig,
    diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not a positive finite number.
    pub fn new(ctx: GameContext, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt.is_finite() && config.fixed_dt > 0.0,
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            ctx,
            schedule: Vec::new(),
            ticks: 0,
            config,
            diagnostics: TickDiagnostics::default(),
        }
    }

    /// Append a system to the schedule.
    ///
    /// # Panics
    ///
    /// Panics if the label is already taken.
    pub fn add_system(&mut self, label: &str, run: SystemFn) {
        self.add_system_after(label, &[], run);
    }

    /// Append a system that must run after each of `after`.
    ///
    /// Dependencies have to be scheduled already, so every edge points
    /// backwards and the schedule can never contain a cycle.
    ///
    /// # Panics
    ///
    /// Panics if the label is taken or a dependency is not scheduled.
    pub fn add_system_after(&mut self, label: &str, after: &[&str], run: SystemFn) {
        assert!(
            self.position_of(label).is_none(),
            "duplicate system name: {label:?}"
        );
        let runs_after = after
            .iter()
            .map(|dep| match self.position_of(dep) {
                Some(pos) => pos,
                None => panic!("system {label:?} runs after {dep:?}, which is not registered"),
            })
            .collect();
        self.schedule.push(ScheduledSystem {
            label: label.to_owned(),
            run,
            runs_after,
        });
    }

    fn position_of(&self, label: &str) -> Option<usize> {
        self.schedule.iter().position(|s| s.label == label)
    }

    /// Labels that `label` was declared to run after.
    pub fn dependencies_of(&self, label: &str) -> Vec<&str> {
        self.position_of(label)
            .map(|pos| {
                self.schedule[pos]
                    .runs_after
                    .iter()
                    .map(|&dep| self.schedule[dep].label.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    // -- stepping -----------------------------------------------------------

    /// Advance one tick. Returns the suspended spawns that finished.
    pub fn tick(&mut self) -> Vec<SpawnOutcome> {
        let started = Instant::now();
        let dt = self.config.fixed_dt;

        let system_times = self
            .schedule
            .iter()
            .map(|system| {
                let at = Instant::now();
                (system.run)(&mut self.ctx, dt);
                (system.label.clone(), at.elapsed())
            })
            .collect();

        let polled_at = Instant::now();
        let outcomes = self.ctx.poll_spawns();
        let spawn_poll_time = polled_at.elapsed();
        let spawns_failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if spawns_failed > 0 {
            tracing::debug!(tick = self.ticks, failed = spawns_failed, "suspended spawns failed");
        }

        let evicted = if self.config.maintenance_due(self.ticks) {
            self.ctx.run_maintenance()
        } else {
            0
        };

        self.ticks += 1;
        self.diagnostics = TickDiagnostics {
            system_times,
            spawn_poll_time,
            total_time: started.elapsed(),
            spawns_completed: outcomes.len(),
            spawns_failed,
            evicted,
        };
        outcomes
    }

    /// Advance `count` ticks. Returns how many suspended spawns finished.
    pub fn run_ticks(&mut self, count: u64) -> usize {
        (0..count).map(|_| self.tick().len()).sum()
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Simulated seconds, derived from the tick count so it never drifts.
    pub fn sim_time(&self) -> f64 {
        self.ticks as f64 * self.config.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut GameContext {
        &mut self.ctx
    }

    pub fn into_context(self) -> GameContext {
        self.ctx
    }

    pub fn system_count(&self) -> usize {
        self.schedule.len()
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.schedule.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
