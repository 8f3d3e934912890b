//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the world produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism the simulation guards against:
//!
//! - **Floating-point math**: every simulated scalar is fixed-point
//!   ([`glest_core::math::Fixed`]); definitions convert decimals once at load.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entities are always visited in sorted id order.
//!
//! - **Thread scheduling**: the world itself is single-threaded; the
//!   controller only decides *when* a tick runs, never what it does.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use glest_core::world::World;

use crate::fixtures::tick_dt;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "World is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for tick in 1..=ticks {
            step(&mut state, tick);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a world twice from identical setup and compare final state hashes.
///
/// `script` is called before every tick with the tick number about to
/// run, so tests can issue commands at fixed points in time.
pub fn verify_world_determinism<Setup, Script>(
    setup: Setup,
    script: Script,
    ticks: u64,
) -> DeterminismResult
where
    Setup: Fn() -> World,
    Script: Fn(&mut World, u64),
{
    let dt = tick_dt();
    verify_determinism(
        2,
        ticks,
        setup,
        |world, tick| {
            script(world, tick);
            world.update(dt);
        },
        World::state_hash,
    )
}

/// Compare two world runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the worlds stay identical, `Some(tick)` if they diverge at
/// that tick.
pub fn find_first_divergence<Setup, Script>(
    setup: Setup,
    script: Script,
    ticks: u64,
) -> Option<u64>
where
    Setup: Fn() -> World,
    Script: Fn(&mut World, u64),
{
    let dt = tick_dt();
    let mut first = setup();
    let mut second = setup();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=ticks {
        script(&mut first, tick);
        script(&mut second, tick);
        let first_events = first.update(dt);
        let second_events = second.update(dt);

        if first_events != second_events || first.state_hash() != second.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Run `count` worlds on scoped threads and collect their final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_worlds<Setup>(setup: Setup, count: usize, ticks: u64) -> DeterminismResult
where
    Setup: Fn() -> World + Sync,
{
    let dt = tick_dt();
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..count)
            .map(|_| {
                s.spawn(|| {
                    let mut world = setup();
                    for _ in 0..ticks {
                        world.update(dt);
                    }
                    world.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for world testing.
pub mod strategies {
    use glest_core::commands::{UnitCommand, UnitOrder};
    use glest_core::math::{Fixed, Vec3Fixed};
    use proptest::prelude::*;

    /// A ground position inside a `size` × `size` map.
    pub fn arb_position(size: i32) -> impl Strategy<Value = Vec3Fixed> {
        (0..=size * 4, 0..=size * 4).prop_map(|(x, z)| {
            Vec3Fixed::ground(
                Fixed::from_num(x) / Fixed::from_num(4),
                Fixed::from_num(z) / Fixed::from_num(4),
            )
        })
    }

    /// A movement or fighting order that needs no entity target.
    pub fn arb_positional_order(size: i32) -> impl Strategy<Value = UnitOrder> {
        prop_oneof![
            arb_position(size).prop_map(|target| UnitOrder::Move { target }),
            arb_position(size).prop_map(|target| UnitOrder::AttackMove { target }),
            arb_position(size).prop_map(|target| UnitOrder::Patrol { target }),
            Just(UnitOrder::Stop),
            Just(UnitOrder::Hold),
        ]
    }

    /// A unit command with random order, priority and queueing.
    pub fn arb_unit_command(size: i32) -> impl Strategy<Value = UnitCommand> {
        (arb_positional_order(size), 0u8..4, any::<bool>()).prop_map(|(order, priority, queued)| {
            let command = UnitCommand::new(order).with_priority(priority);
            if queued {
                command.queued()
            } else {
                command
            }
        })
    }

    /// A script of `(tick, unit slot, command)` entries.
    pub fn arb_script(
        size: i32,
        ticks: u64,
        units: usize,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<(u64, usize, UnitCommand)>> {
        proptest::collection::vec(
            (1..=ticks, 0..units.max(1), arb_unit_command(size)),
            0..max_len,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{at, skirmish_world};
    use glest_core::commands::{UnitCommand, UnitOrder};

    fn battle() -> World {
        let (mut world, red, blue) = skirmish_world();
        let swordsman = world.spawn_unit(red, "swordsman", at(10.0, 10.0)).unwrap();
        world.spawn_unit(red, "archer", at(8.0, 12.0)).unwrap();
        world.spawn_unit(blue, "swordsman", at(20.0, 10.0)).unwrap();
        world.spawn_unit(blue, "dummy", at(18.0, 14.0)).unwrap();
        let order = UnitOrder::AttackMove {
            target: at(30.0, 10.0),
        };
        world.issue_command(swordsman, UnitCommand::new(order)).unwrap();
        world
    }

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n, _| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_battle_is_deterministic() {
        verify_world_determinism(battle, |_, _| {}, 200).assert_deterministic();
    }

    #[test]
    fn test_no_divergence_in_battle() {
        assert_eq!(find_first_divergence(battle, |_, _| {}, 200), None);
    }

    #[test]
    fn test_parallel_battles_match() {
        run_parallel_worlds(battle, 4, 100).assert_deterministic();
    }
}
