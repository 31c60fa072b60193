//! Property tests for world storage.
//!
//! Random sequences of spawns, despawns, inserts, removals and lifecycle
//! deliveries must never leave an entity holding two instances of the same
//! component type, and must keep the world's entity count in step with what
//! the test believes is alive.

use hatchery_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Speed(i32);
impl Component for Speed {}

#[derive(Debug, Clone, PartialEq, Default)]
struct Timer {
    remaining: i32,
    resets: u32,
}
impl Component for Timer {
    fn on_event(&mut self, event: &LifecycleEvent) {
        if *event == LifecycleEvent::Reuse {
            self.remaining = 0;
            self.resets += 1;
        }
    }
}

#[derive(Debug, Clone)]
enum WorldOp {
    Spawn,
    Despawn(usize),
    InsertSpeed(usize, i32),
    InsertTimer(usize, i32),
    RemoveSpeed(usize),
    Reuse(usize),
}

fn world_op_strategy() -> impl Strategy<Value = WorldOp> {
    prop_oneof![
        Just(WorldOp::Spawn),
        (0..64usize).prop_map(WorldOp::Despawn),
        (0..64usize, -100..100i32).prop_map(|(i, v)| WorldOp::InsertSpeed(i, v)),
        (0..64usize, 1..100i32).prop_map(|(i, v)| WorldOp::InsertTimer(i, v)),
        (0..64usize).prop_map(WorldOp::RemoveSpeed),
        (0..64usize).prop_map(WorldOp::Reuse),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn random_ops_keep_components_unique(ops in prop::collection::vec(world_op_strategy(), 1..60)) {
        let mut world = World::new();
        world.register_component::<Speed>("speed");
        world.register_component::<Timer>("timer");

        let mut alive: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                WorldOp::Spawn => alive.push(world.spawn()),
                WorldOp::Despawn(i) if !alive.is_empty() => {
                    let e = alive.remove(i % alive.len());
                    prop_assert!(world.despawn(e).is_ok());
                }
                WorldOp::InsertSpeed(i, v) if !alive.is_empty() => {
                    let e = alive[i % alive.len()];
                    let had = world.has_component::<Speed>(e);
                    let result = world.insert_component(e, Speed(v));
                    prop_assert_eq!(result.is_err(), had);
                }
                WorldOp::InsertTimer(i, v) if !alive.is_empty() => {
                    let e = alive[i % alive.len()];
                    let _ = world.insert_component(e, Timer { remaining: v, resets: 0 });
                }
                WorldOp::RemoveSpeed(i) if !alive.is_empty() => {
                    let e = alive[i % alive.len()];
                    prop_assert!(world.remove_component::<Speed>(e).is_ok());
                }
                WorldOp::Reuse(i) if !alive.is_empty() => {
                    let e = alive[i % alive.len()];
                    world.post_event(e, LifecycleEvent::Reuse).unwrap();
                    world.deliver_events(e).unwrap();
                    if let Some(timer) = world.get_component::<Timer>(e) {
                        prop_assert_eq!(timer.remaining, 0);
                    }
                }
                _ => {}
            }

            prop_assert_eq!(world.entity_count(), alive.len());
            for &e in &alive {
                prop_assert!(world.is_alive(e));
                prop_assert!(world.instance_count::<Speed>(e) <= 1);
                prop_assert!(world.instance_count::<Timer>(e) <= 1);
                prop_assert_eq!(world.pending_events(e), 0);
            }
        }
    }

    /// Despawned handles stay dead even after their slot is reused.
    #[test]
    fn stale_handles_never_resurrect(spawns in 1..40usize, kill in 0..40usize) {
        let mut world = World::new();
        world.register_component::<Speed>("speed");

        let entities: Vec<_> = (0..spawns).map(|_| world.spawn()).collect();
        let victim = entities[kill % entities.len()];
        world.despawn(victim).unwrap();

        let replacement = world.spawn();
        prop_assert_eq!(replacement.index(), victim.index());
        prop_assert!(!world.is_alive(victim));
        prop_assert!(world.insert_component(victim, Speed(1)).is_err());
        prop_assert!(world.insert_component(replacement, Speed(1)).is_ok());
    }
}
