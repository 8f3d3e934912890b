//! World-level tests: players, spawning, defeat, fog, invariants and
//! determinism.

use std::sync::Arc;

use glest_core::commands::{UnitCommand, UnitOrder};
use glest_core::components::{EntityId, UnitState};
use glest_core::error::GameError;
use glest_core::events::GameEvent;
use glest_core::objects::Placement;
use glest_core::world::{PlayerSetup, World, WorldSettings};
use glest_test_utils::determinism::strategies::arb_script;
use glest_test_utils::determinism::{find_first_divergence, verify_world_determinism};
use glest_test_utils::fixtures::{
    at, magic_ruleset, run_ticks, skirmish_world, skirmish_world_with, tick_dt, MAGIC,
    MAGIC_STARTING_RESOURCES,
};
use proptest::prelude::*;

// =============================================================================
// Players and starting setup
// =============================================================================

#[test]
fn test_players_start_with_faction_resources() {
    let (world, red, blue) = skirmish_world();
    assert_eq!(world.player(red).unwrap().amount("gold"), 200);
    assert_eq!(world.player(blue).unwrap().amount("gold"), 200);
    assert_ne!(world.player(red).unwrap().team, world.player(blue).unwrap().team);
    assert!(world.player(blue).unwrap().is_ai);
    assert_eq!(world.players().count(), 2);
}

#[test]
fn test_players_on_one_team_are_allies() {
    let (mut world, red, _) = skirmish_world();
    let team = world.player(red).unwrap().team;
    let green = world
        .add_player(PlayerSetup::new("green", "skirmish").team(team))
        .unwrap();
    let swordsman = world.spawn_unit(red, "swordsman", at(5.0, 5.0)).unwrap();
    let ally = world.spawn_unit(green, "dummy", at(6.0, 5.0)).unwrap();
    let result = world.issue_command(swordsman, UnitCommand::attack(ally));
    assert!(matches!(result, Err(GameError::InvalidTarget(_))));
}

#[test]
fn test_magic_faction_starting_setup() {
    let mut world = World::new(Arc::new(magic_ruleset()), WorldSettings::default());
    let player = world.add_player(PlayerSetup::new("mage", MAGIC)).unwrap();
    for (resource, amount) in MAGIC_STARTING_RESOURCES {
        assert_eq!(
            i64::from(world.player(player).unwrap().amount(resource)),
            amount,
            "{resource}"
        );
    }

    let spawned = world.spawn_starting_units(player, at(30.0, 30.0)).unwrap();
    assert_eq!(spawned.len(), 9);

    let buildings = world.buildings_for_player(player);
    assert_eq!(buildings.len(), 2);
    assert!(buildings.iter().all(|b| b.is_built()));
    assert_eq!(world.units_for_player(player).len(), 7);

    let events = world.update(tick_dt());
    let created = events
        .iter()
        .filter(|e| matches!(e, GameEvent::UnitCreated { .. }))
        .count();
    assert_eq!(created, 7);
    assert_eq!(world.player(player).unwrap().units_created, 7);
    assert!(world.check_invariants().is_ok());
}

#[test]
fn test_skirmish_starting_units() {
    let (mut world, red, _) = skirmish_world();
    let spawned = world.spawn_starting_units(red, at(10.0, 10.0)).unwrap();
    assert_eq!(spawned.len(), 3);
    let depot = world.building(spawned[0]).unwrap();
    assert_eq!(depot.building_type, "depot");
    assert_eq!(depot.position, at(10.0, 10.0));
    assert!(world
        .units_for_player(red)
        .iter()
        .all(|u| u.unit_type == "worker" && u.state == UnitState::Idle));
}

// =============================================================================
// Spawning
// =============================================================================

#[test]
fn test_spawn_errors() {
    let (mut world, red, _) = skirmish_world();
    assert!(matches!(
        world.spawn_unit(red, "golem", at(5.0, 5.0)),
        Err(GameError::InvalidType { .. })
    ));
    assert_eq!(
        world.spawn_unit(99, "runner", at(5.0, 5.0)),
        Err(GameError::InvalidPlayer(99))
    );
    assert!(matches!(
        world.spawn_unit(red, "runner", at(65.0, 5.0)),
        Err(GameError::OutOfBounds { .. })
    ));
    assert!(matches!(
        world.spawn_resource_node("mithril", at(5.0, 5.0), None),
        Err(GameError::InvalidType { .. })
    ));
}

#[test]
fn test_building_placement_rules() {
    let (mut world, red, blue) = skirmish_world();
    world
        .spawn_building(red, "depot", at(10.0, 10.0), Placement::Complete)
        .unwrap();

    // Overlapping footprint, even for another player.
    assert!(matches!(
        world.spawn_building(blue, "depot", at(11.0, 11.0), Placement::Complete),
        Err(GameError::Occupied { .. })
    ));
    // Touching edges are fine.
    assert!(world
        .spawn_building(blue, "depot", at(12.0, 10.0), Placement::Complete)
        .is_ok());
    // Off the map.
    assert!(matches!(
        world.spawn_building(red, "depot", at(0.5, 30.0), Placement::Complete),
        Err(GameError::Occupied { .. })
    ));
    // Mobile units are not buildings.
    assert!(matches!(
        world.spawn_building(red, "runner", at(30.0, 30.0), Placement::Complete),
        Err(GameError::InvalidType { .. })
    ));
}

#[test]
fn test_ids_are_never_reused() {
    let (mut world, red, blue) = skirmish_world();
    let swordsman = world.spawn_unit(red, "swordsman", at(10.0, 10.0)).unwrap();
    let dummy = world.spawn_unit(blue, "dummy", at(11.0, 10.0)).unwrap();
    world
        .issue_command(swordsman, UnitCommand::attack(dummy))
        .unwrap();
    run_ticks(&mut world, 200);
    assert!(world.unit(dummy).is_none());

    let next = world.spawn_unit(blue, "dummy", at(11.0, 10.0)).unwrap();
    assert!(next > dummy);
}

// =============================================================================
// Defeat
// =============================================================================

#[test]
fn test_eliminate_player_idles_units() {
    let (mut world, red, blue) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(5.0, 5.0)).unwrap();
    world.spawn_unit(blue, "runner", at(50.0, 50.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(30.0, 5.0)))
        .unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(30.0, 30.0)).queued())
        .unwrap();
    run_ticks(&mut world, 5);

    world.eliminate_player(red).unwrap();
    let unit = world.unit(runner).unwrap();
    assert!(unit.commands.is_empty());
    assert_eq!(unit.state, UnitState::Idle);
    assert!(!world.player(red).unwrap().is_active);

    let events = world.update(tick_dt());
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == GameEvent::PlayerDefeated { player: red })
            .count(),
        1
    );

    // Eliminating twice changes nothing.
    world.eliminate_player(red).unwrap();
    let events = world.update(tick_dt());
    assert!(!events.contains(&GameEvent::PlayerDefeated { player: red }));

    let result = world.issue_command(runner, UnitCommand::move_to(at(1.0, 1.0)));
    assert_eq!(result, Err(GameError::InvalidPlayer(red)));
    assert_eq!(world.stats().active_players, 1);
    assert_eq!(world.eliminate_player(42), Err(GameError::InvalidPlayer(42)));
}

#[test]
fn test_player_without_entities_is_not_defeated() {
    let (mut world, red, blue) = skirmish_world();
    world.spawn_unit(red, "runner", at(5.0, 5.0)).unwrap();
    let events = run_ticks(&mut world, 10);
    assert!(!events.iter().any(|e| matches!(e, GameEvent::PlayerDefeated { .. })));
    assert!(world.player(blue).unwrap().is_active);
}

// =============================================================================
// Fog of war
// =============================================================================

#[test]
fn test_fog_tracks_sight() {
    let (mut world, red, blue) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(10.0, 10.0)).unwrap();
    world.update(tick_dt());

    let fog = world.fog().unwrap();
    assert!(fog.is_visible(red, at(10.0, 10.0)));
    assert!(fog.is_visible(red, at(16.0, 10.0)));
    assert!(!fog.is_visible(red, at(40.0, 40.0)));
    assert!(!fog.is_visible(blue, at(10.0, 10.0)));

    world
        .issue_command(runner, UnitCommand::move_to(at(50.0, 10.0)))
        .unwrap();
    run_ticks(&mut world, 200);
    let fog = world.fog().unwrap();
    assert!(fog.is_visible(red, at(50.0, 10.0)));
    assert!(!fog.is_visible(red, at(10.0, 10.0)));
    assert!(fog.is_explored(red, at(10.0, 10.0)));
}

#[test]
fn test_fog_can_be_disabled() {
    let settings = WorldSettings {
        fog_of_war: false,
        ..WorldSettings::with_size(32, 32)
    };
    let (mut world, red, _) = skirmish_world_with(settings);
    world.spawn_unit(red, "runner", at(10.0, 10.0)).unwrap();
    world.update(tick_dt());
    assert!(world.fog().is_none());
}

// =============================================================================
// Ticks and stats
// =============================================================================

#[test]
fn test_tick_event_closes_every_update() {
    let (mut world, red, _) = skirmish_world();
    let unit = world.spawn_unit(red, "runner", at(10.0, 10.0)).unwrap();

    let events = world.update(tick_dt());
    assert_eq!(
        events.first(),
        Some(&GameEvent::UnitCreated {
            unit,
            player: red,
            unit_type: "runner".to_string(),
        })
    );
    assert!(matches!(events.last(), Some(GameEvent::Tick { tick: 1, .. })));

    let events = world.update(tick_dt());
    assert_eq!(events.len(), 1);
    assert_eq!(world.tick(), 2);
    assert_eq!(world.game_time(), tick_dt() + tick_dt());
}

#[test]
fn test_stats_count_entities() {
    let (mut world, red, blue) = skirmish_world();
    world.spawn_starting_units(red, at(10.0, 10.0)).unwrap();
    world.spawn_starting_units(blue, at(50.0, 50.0)).unwrap();
    world
        .spawn_resource_node("gold", at(30.0, 30.0), None)
        .unwrap();
    run_ticks(&mut world, 20);

    let stats = world.stats();
    assert_eq!(stats.tick, 20);
    assert_eq!(stats.players, 2);
    assert_eq!(stats.active_players, 2);
    assert_eq!(stats.objects.units, 4);
    assert_eq!(stats.objects.buildings, 2);
    assert_eq!(stats.objects.resource_nodes, 1);
    assert_eq!(stats.objects.per_player[&red].units, 2);
    assert_eq!(world.map_dimensions(), (64, 64));
}

// =============================================================================
// Invariants and determinism
// =============================================================================

/// Two armies with workers, a depot and a gold node.
fn battlefield() -> (World, Vec<EntityId>) {
    let (mut world, red, blue) = skirmish_world();
    let mut units = Vec::new();
    for (player, x) in [(red, 10.0), (blue, 50.0)] {
        world
            .spawn_building(player, "depot", at(x, 32.0), Placement::Complete)
            .unwrap();
        units.push(world.spawn_unit(player, "swordsman", at(x, 20.0)).unwrap());
        units.push(world.spawn_unit(player, "archer", at(x, 24.0)).unwrap());
        units.push(world.spawn_unit(player, "worker", at(x, 36.0)).unwrap());
    }
    world
        .spawn_resource_node("gold", at(30.0, 40.0), None)
        .unwrap();
    (world, units)
}

fn charge(world: &mut World, tick: u64) {
    if tick != 1 {
        return;
    }
    let ids: Vec<EntityId> = world.objects().units().sorted_ids();
    for id in ids {
        let order = UnitOrder::AttackMove {
            target: at(30.0, 22.0),
        };
        let _ = world.issue_command(id, UnitCommand::new(order));
    }
}

#[test]
fn test_battle_is_deterministic() {
    verify_world_determinism(|| battlefield().0, charge, 600).assert_deterministic();
}

#[test]
fn test_battle_never_diverges() {
    assert_eq!(find_first_divergence(|| battlefield().0, charge, 300), None);
}

#[test]
fn test_battle_keeps_invariants() {
    let (mut world, _) = battlefield();
    for tick in 1..=600 {
        charge(&mut world, tick);
        world.update(tick_dt());
        if let Err(error) = world.check_invariants() {
            panic!("tick {tick}: {error}");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_random_commands_keep_invariants(script in arb_script(64, 120, 6, 40)) {
        let (mut world, units) = battlefield();
        for tick in 1..=120 {
            for (_, slot, command) in script.iter().filter(|(at_tick, _, _)| *at_tick == tick) {
                // Rejections are part of the game; only state matters here.
                let _ = world.issue_command(units[*slot], command.clone());
            }
            world.update(tick_dt());
            prop_assert!(world.check_invariants().is_ok(), "tick {}: {:?}", tick, world.check_invariants());
        }
    }

    #[test]
    fn prop_random_commands_are_deterministic(script in arb_script(64, 80, 6, 30)) {
        let play = |script: &[(u64, usize, UnitCommand)]| {
            let (mut world, units) = battlefield();
            let mut log = Vec::new();
            for tick in 1..=80 {
                for (_, slot, command) in script.iter().filter(|(at_tick, _, _)| *at_tick == tick) {
                    log.push(world.issue_command(units[*slot], command.clone()).is_ok());
                }
                world.update(tick_dt());
            }
            (world.state_hash(), log)
        };
        prop_assert_eq!(play(&script), play(&script));
    }
}
