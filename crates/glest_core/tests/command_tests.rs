//! Command processing tests.
//!
//! These tests drive a skirmish world through `World::issue_command` and
//! `World::update`, checking validation, queueing and movement.

use glest_core::commands::{BuildingCommand, UnitCommand, UnitOrder};
use glest_core::components::UnitState;
use glest_core::error::GameError;
use glest_core::objects::Placement;
use glest_core::world::World;
use glest_test_utils::fixtures::{at, fixed, run_ticks, skirmish_world, tick_dt};

fn step(world: &mut World) {
    world.update(tick_dt());
}

// =============================================================================
// Movement
// =============================================================================

#[test]
fn test_move_reaches_target_and_idles() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();

    run_ticks(&mut world, 20);
    let unit = world.unit(runner).unwrap();
    let x: f64 = unit.position.x.to_num();
    assert!((x - 5.0).abs() < 0.01, "runner at x = {x} after one second");
    assert_eq!(unit.state, UnitState::Moving);

    run_ticks(&mut world, 20);
    let unit = world.unit(runner).unwrap();
    assert_eq!(unit.position, at(10.0, 0.0));
    assert_eq!(unit.state, UnitState::Idle);
    assert!(unit.commands.is_empty());
}

#[test]
fn test_queued_command_runs_after_current() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(20.0, 0.0)).queued())
        .unwrap();
    assert_eq!(world.unit(runner).unwrap().commands.len(), 2);

    run_ticks(&mut world, 40);
    let unit = world.unit(runner).unwrap();
    assert_eq!(unit.position, at(10.0, 0.0));
    assert_eq!(unit.commands.len(), 1);
    assert_eq!(
        unit.commands.head().unwrap().command.order,
        UnitOrder::Move {
            target: at(20.0, 0.0)
        }
    );

    run_ticks(&mut world, 40);
    let unit = world.unit(runner).unwrap();
    assert_eq!(unit.position, at(20.0, 0.0));
    assert_eq!(unit.state, UnitState::Idle);
}

#[test]
fn test_unqueued_command_replaces_current() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();
    run_ticks(&mut world, 10);

    world
        .issue_command(runner, UnitCommand::move_to(at(20.0, 0.0)))
        .unwrap();
    let unit = world.unit(runner).unwrap();
    assert_eq!(unit.commands.len(), 1);
    assert_eq!(
        unit.commands.head().unwrap().command.order.target_position(),
        Some(at(20.0, 0.0))
    );

    run_ticks(&mut world, 80);
    let unit = world.unit(runner).unwrap();
    assert_eq!(unit.position, at(20.0, 0.0));
    assert_eq!(unit.state, UnitState::Idle);
}

#[test]
fn test_replacement_abandons_first_target() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();
    run_ticks(&mut world, 10);

    // Heading off at a right angle: x never grows again.
    let x_before = world.unit(runner).unwrap().position.x;
    world
        .issue_command(runner, UnitCommand::move_to(at(0.0, 20.0)))
        .unwrap();
    for _ in 0..120 {
        step(&mut world);
        assert!(world.unit(runner).unwrap().position.x <= x_before);
    }
    assert_eq!(world.unit(runner).unwrap().position, at(0.0, 20.0));
}

#[test]
fn test_stop_clears_queue() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(20.0, 0.0)).queued())
        .unwrap();
    run_ticks(&mut world, 5);

    world
        .issue_command(runner, UnitCommand::new(UnitOrder::Stop))
        .unwrap();
    let position = world.unit(runner).unwrap().position;
    step(&mut world);

    let unit = world.unit(runner).unwrap();
    assert!(unit.commands.is_empty());
    assert_eq!(unit.state, UnitState::Idle);
    assert_eq!(unit.position, position);
}

// =============================================================================
// Queue limits and priority
// =============================================================================

#[test]
fn test_queue_full_rejects_seventeenth_command() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(1.0, 0.0)))
        .unwrap();
    for x in 2..=16 {
        world
            .issue_command(runner, UnitCommand::move_to(at(f64::from(x), 0.0)).queued())
            .unwrap();
    }
    assert_eq!(world.unit(runner).unwrap().commands.len(), 16);

    let result = world.issue_command(runner, UnitCommand::move_to(at(17.0, 0.0)).queued());
    assert_eq!(result, Err(GameError::QueueFull(runner)));
    assert_eq!(world.unit(runner).unwrap().commands.len(), 16);

    // A replacing command is still accepted.
    world
        .issue_command(runner, UnitCommand::move_to(at(30.0, 0.0)))
        .unwrap();
    assert_eq!(world.unit(runner).unwrap().commands.len(), 1);
}

#[test]
fn test_out_of_bounds_leaves_queue_untouched() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();

    let result = world.issue_command(runner, UnitCommand::move_to(at(100.0, 10.0)));
    assert!(matches!(result, Err(GameError::OutOfBounds { .. })));
    let result = world.issue_command(runner, UnitCommand::move_to(at(-1.0, 10.0)).queued());
    assert!(matches!(result, Err(GameError::OutOfBounds { .. })));

    let unit = world.unit(runner).unwrap();
    assert_eq!(unit.commands.len(), 1);
    assert_eq!(
        unit.commands.head().unwrap().command.order.target_position(),
        Some(at(10.0, 0.0))
    );
}

#[test]
fn test_priority_command_preempts_and_resumes() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    world
        .issue_command(runner, UnitCommand::move_to(at(20.0, 0.0)))
        .unwrap();
    run_ticks(&mut world, 4);

    world
        .issue_command(
            runner,
            UnitCommand::move_to(at(1.0, 10.0)).queued().with_priority(5),
        )
        .unwrap();
    let unit = world.unit(runner).unwrap();
    assert_eq!(unit.commands.len(), 2);
    assert_eq!(unit.commands.head().unwrap().command.priority, 5);

    // The detour is walked first, then the original move resumes.
    step(&mut world);
    assert!(world.unit(runner).unwrap().position.z > fixed(0));

    run_ticks(&mut world, 200);
    let unit = world.unit(runner).unwrap();
    assert_eq!(unit.position, at(20.0, 0.0));
    assert_eq!(unit.state, UnitState::Idle);
}

#[test]
fn test_commands_carry_issue_time() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    run_ticks(&mut world, 20);
    world
        .issue_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();

    let issued_at = world.unit(runner).unwrap().commands.head().unwrap().command.issued_at;
    assert_eq!(issued_at, world.game_time());
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_unknown_entity_rejected() {
    let (mut world, _, _) = skirmish_world();
    let result = world.issue_command(999, UnitCommand::move_to(at(1.0, 1.0)));
    assert_eq!(result, Err(GameError::UnknownEntity(999)));
}

#[test]
fn test_command_not_offered_by_definition() {
    let (mut world, red, blue) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(5.0, 5.0)).unwrap();
    let enemy = world.spawn_unit(blue, "dummy", at(6.0, 5.0)).unwrap();

    let result = world.issue_command(runner, UnitCommand::attack(enemy));
    assert!(matches!(
        result,
        Err(GameError::CommandNotAvailable { entity, ref command }) if entity == runner && command == "Attack"
    ));
}

#[test]
fn test_building_command_sent_to_unit() {
    let (mut world, red, _) = skirmish_world();
    let worker = world.spawn_unit(red, "worker", at(5.0, 5.0)).unwrap();
    let result = world.issue_command(worker, BuildingCommand::Cancel);
    assert!(matches!(result, Err(GameError::CommandNotAvailable { .. })));
}

#[test]
fn test_attack_targets_must_be_enemies() {
    let (mut world, red, _) = skirmish_world();
    let swordsman = world.spawn_unit(red, "swordsman", at(5.0, 5.0)).unwrap();
    let ally = world.spawn_unit(red, "dummy", at(6.0, 5.0)).unwrap();

    let on_self = world.issue_command(swordsman, UnitCommand::attack(swordsman));
    assert!(matches!(on_self, Err(GameError::InvalidTarget(_))));

    let on_ally = world.issue_command(swordsman, UnitCommand::attack(ally));
    assert!(matches!(on_ally, Err(GameError::InvalidTarget(_))));

    let on_nothing = world.issue_command(swordsman, UnitCommand::attack(999));
    assert!(matches!(on_nothing, Err(GameError::InvalidTarget(_))));
}

#[test]
fn test_unaffordable_build_rejected_before_position_checks() {
    let (mut world, red, _) = skirmish_world();
    let worker = world.spawn_unit(red, "worker", at(5.0, 5.0)).unwrap();

    let order = UnitOrder::Build {
        building_type: "tower".to_string(),
        position: at(500.0, 500.0),
    };
    let result = world.issue_command(worker, UnitCommand::new(order));
    assert_eq!(
        result,
        Err(GameError::InsufficientResources {
            resource: "gold".to_string(),
            required: 1000,
            available: 200,
        })
    );
    assert!(world.unit(worker).unwrap().commands.is_empty());
}

#[test]
fn test_build_of_unknown_type_rejected() {
    let (mut world, red, _) = skirmish_world();
    let worker = world.spawn_unit(red, "worker", at(5.0, 5.0)).unwrap();
    let order = UnitOrder::Build {
        building_type: "castle".to_string(),
        position: at(10.0, 10.0),
    };
    let result = world.issue_command(worker, UnitCommand::new(order));
    assert!(matches!(result, Err(GameError::InvalidTarget(_))));
}

#[test]
fn test_gather_requires_resource_node() {
    let (mut world, red, _) = skirmish_world();
    let worker = world.spawn_unit(red, "worker", at(5.0, 5.0)).unwrap();
    let other = world.spawn_unit(red, "runner", at(6.0, 5.0)).unwrap();
    let result = world.issue_command(worker, UnitCommand::gather(other));
    assert!(matches!(result, Err(GameError::InvalidTarget(_))));
}

#[test]
fn test_building_validation() {
    let (mut world, red, _) = skirmish_world();
    let depot = world
        .spawn_building(red, "depot", at(20.0, 20.0), Placement::Complete)
        .unwrap();
    let ruleset = world.ruleset().clone();

    let runner = ruleset.unit("skirmish", "runner").unwrap();
    let result = world.issue_command(depot, BuildingCommand::produce(runner));
    assert!(matches!(result, Err(GameError::InvalidTarget(_))));

    let result = world.issue_command(depot, BuildingCommand::Cancel);
    assert!(matches!(result, Err(GameError::InvalidTarget(_))));

    let result = world.issue_command(depot, UnitCommand::move_to(at(1.0, 1.0)));
    assert!(matches!(result, Err(GameError::CommandNotAvailable { .. })));
}

#[test]
fn test_validate_command_does_not_enqueue() {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    let command = UnitCommand::move_to(at(3.0, 3.0)).into();
    assert!(world.validate_command(runner, &command).is_ok());
    assert!(world.unit(runner).unwrap().commands.is_empty());
}
