//! World tick benchmarks for glest_core.
//!
//! Run with: `cargo bench -p glest_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glest_core::commands::{UnitCommand, UnitOrder};
use glest_core::world::{World, WorldSettings};
use glest_test_utils::fixtures::{at, skirmish_world_with, tick_dt};

/// Two armies of `per_side` swordsmen and archers marching at each other.
fn populated_world(per_side: usize) -> World {
    let (mut world, red, blue) = skirmish_world_with(WorldSettings::with_size(128, 128));
    for i in 0..per_side {
        let row = (i % 40) as f64 * 3.0 + 4.0;
        let column = (i / 40) as f64 * 2.0;
        for (player, x, target) in [(red, 10.0 + column, 118.0), (blue, 118.0 - column, 10.0)] {
            let unit_type = if i % 3 == 0 { "archer" } else { "swordsman" };
            let Ok(id) = world.spawn_unit(player, unit_type, at(x, row)) else {
                continue;
            };
            let order = UnitOrder::AttackMove {
                target: at(target, row),
            };
            let _ = world.issue_command(id, UnitCommand::new(order));
        }
    }
    world
}

pub fn world_update_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_update");
    for per_side in [10, 50, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(per_side), &per_side, |b, &n| {
            let mut world = populated_world(n);
            b.iter(|| black_box(world.update(tick_dt())));
        });
    }
    group.finish();
}

pub fn state_hash_benchmark(c: &mut Criterion) {
    let world = populated_world(200);
    c.bench_function("state_hash_400_units", |b| {
        b.iter(|| black_box(world.state_hash()));
    });
}

criterion_group!(benches, world_update_benchmark, state_hash_benchmark);
criterion_main!(benches);
