//! Game controller tests.
//!
//! Lifecycle transitions, synchronous stepping, command intake, event
//! delivery and the fixed-rate simulation thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glest_core::commands::UnitCommand;
use glest_core::components::{EntityId, UnitState};
use glest_core::error::GameError;
use glest_core::events::{GameEvent, GameEventKind};
use glest_core::math::Fixed;
use glest_headless::controller::{ControllerState, GameController};
use glest_test_utils::fixtures::{at, skirmish_world, tick_dt};
use parking_lot::Mutex;

/// A skirmish controller with one red runner at the origin.
fn runner_controller() -> (GameController, EntityId) {
    let (mut world, red, _) = skirmish_world();
    let runner = world.spawn_unit(red, "runner", at(0.0, 0.0)).unwrap();
    (GameController::new(world), runner)
}

fn initialized() -> (GameController, EntityId) {
    let (controller, runner) = runner_controller();
    controller.initialize().unwrap();
    (controller, runner)
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_full_lifecycle() {
    let (controller, _) = runner_controller();
    assert_eq!(controller.state(), ControllerState::Created);

    controller.initialize().unwrap();
    assert_eq!(controller.state(), ControllerState::Initialized);
    controller.start().unwrap();
    assert_eq!(controller.state(), ControllerState::Running);
    controller.pause().unwrap();
    assert_eq!(controller.state(), ControllerState::Paused);
    controller.resume().unwrap();
    assert_eq!(controller.state(), ControllerState::Running);
    controller.stop().unwrap();
    assert_eq!(controller.state(), ControllerState::Stopped);
}

#[test]
fn test_invalid_transitions_are_bad_state() {
    let (controller, _) = runner_controller();

    let err = controller.start().unwrap_err();
    assert_eq!(err.kind(), "BadState");
    assert_eq!(err.to_string(), "Cannot start while created");
    assert_eq!(controller.pause().unwrap_err().kind(), "BadState");
    assert_eq!(controller.resume().unwrap_err().kind(), "BadState");
    assert_eq!(controller.state(), ControllerState::Created);

    controller.initialize().unwrap();
    assert_eq!(controller.initialize().unwrap_err().kind(), "BadState");
    assert_eq!(controller.resume().unwrap_err().kind(), "BadState");
    assert_eq!(controller.state(), ControllerState::Initialized);
}

#[test]
fn test_second_stop_is_bad_state_and_changes_nothing() {
    let (controller, _) = initialized();
    controller.step_many(3).unwrap();
    controller.stop().unwrap();
    let stats = controller.stats();

    let err = controller.stop().unwrap_err();
    assert_eq!(err.kind(), "BadState");
    assert_eq!(err.to_string(), "Cannot stop while stopped");
    assert_eq!(controller.state(), ControllerState::Stopped);
    assert_eq!(controller.stats(), stats);
    assert_eq!(controller.read(|w| w.tick()), 3);
}

#[test]
fn test_stop_from_created() {
    let (controller, _) = runner_controller();
    controller.stop().unwrap();
    assert_eq!(controller.initialize().unwrap_err().kind(), "BadState");
}

// ============================================================================
// Stepping
// ============================================================================

#[test]
fn test_step_runs_one_tick() {
    let (controller, _) = initialized();
    assert_eq!(controller.step().unwrap(), 1);
    assert_eq!(controller.step().unwrap(), 2);

    let stats = controller.stats();
    assert_eq!(stats.ticks, 2);
    assert_eq!(controller.read(|w| w.game_time()), tick_dt() * Fixed::from_num(2));
}

#[test]
fn test_step_not_allowed_while_created_or_running() {
    let (controller, _) = runner_controller();
    assert_eq!(controller.step().unwrap_err().kind(), "BadState");

    controller.initialize().unwrap();
    controller.start().unwrap();
    assert_eq!(controller.step().unwrap_err().kind(), "BadState");
    controller.stop().unwrap();
    assert_eq!(controller.step().unwrap_err().kind(), "BadState");
}

#[test]
fn test_world_mutation_blocked_while_running() {
    let (controller, _) = initialized();
    assert_eq!(controller.with_world_mut(|w| w.tick()).unwrap(), 0);

    controller.start().unwrap();
    assert_eq!(
        controller.with_world_mut(|w| w.tick()).unwrap_err().kind(),
        "BadState"
    );
    controller.stop().unwrap();
}

// ============================================================================
// Command intake
// ============================================================================

#[test]
fn test_submitted_command_applies_at_next_tick() {
    let (controller, runner) = initialized();
    controller
        .submit_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();
    assert_eq!(controller.pending_commands(), 1);
    assert!(controller.read(|w| w.unit(runner).unwrap().commands.is_empty()));

    controller.step().unwrap();
    assert_eq!(controller.pending_commands(), 0);
    controller.read(|w| {
        let unit = w.unit(runner).unwrap();
        assert_eq!(unit.state, UnitState::Moving);
        assert!(unit.position.x > Fixed::ZERO);
    });
}

#[test]
fn test_move_through_controller() {
    let (controller, runner) = initialized();
    controller
        .submit_command(runner, UnitCommand::move_to(at(10.0, 0.0)))
        .unwrap();

    controller.step_many(20).unwrap();
    let x: f64 = controller.read(|w| w.unit(runner).unwrap().position.x.to_num());
    assert!((x - 5.0).abs() < 0.01, "runner at x = {x} after one second");

    controller.step_many(20).unwrap();
    controller.read(|w| {
        let unit = w.unit(runner).unwrap();
        assert_eq!(unit.position, at(10.0, 0.0));
        assert_eq!(unit.state, UnitState::Idle);
        assert!(unit.commands.is_empty());
    });
}

#[test]
fn test_invalid_command_rejected_at_submit() {
    let (controller, runner) = initialized();

    let err = controller
        .submit_command(runner, UnitCommand::move_to(at(500.0, 0.0)))
        .unwrap_err();
    assert_eq!(err.kind(), "OutOfBounds");

    let err = controller
        .submit_command(9999, UnitCommand::move_to(at(1.0, 0.0)))
        .unwrap_err();
    assert_eq!(err, GameError::UnknownEntity(9999));
    assert_eq!(controller.pending_commands(), 0);
}

#[test]
fn test_drain_time_rejection_emits_event() {
    let (controller, runner) = initialized();
    let rejected = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&rejected);
    controller.subscribe(GameEventKind::CommandRejected, move |event, _| {
        if let GameEvent::CommandRejected { entity, reason, .. } = event {
            sink.lock().push((*entity, reason.clone()));
        }
    });

    // Each submission is checked against an empty queue; the seventeenth
    // only fails once the first sixteen are in it.
    for i in 0..17 {
        controller
            .submit_command(runner, UnitCommand::move_to(at(f64::from(i), 5.0)).queued())
            .unwrap();
    }
    controller.step().unwrap();

    assert_eq!(*rejected.lock(), vec![(runner, "QueueFull".to_string())]);
    let stats = controller.stats();
    assert_eq!(stats.commands_applied, 16);
    assert_eq!(stats.commands_rejected, 1);
}

#[test]
fn test_submit_after_stop_is_bad_state() {
    let (controller, runner) = initialized();
    controller.stop().unwrap();
    let err = controller
        .submit_command(runner, UnitCommand::move_to(at(1.0, 0.0)))
        .unwrap_err();
    assert_eq!(err.kind(), "BadState");
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn test_events_delivered_after_tick_in_order() {
    let (controller, _) = initialized();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    controller.subscribe(GameEventKind::Tick, move |event, world| {
        if let GameEvent::Tick { tick, .. } = event {
            // The world is already at the tick being reported.
            sink.lock().push((*tick, world.tick()));
        }
    });

    controller.step_many(3).unwrap();
    assert_eq!(*seen.lock(), vec![(1, 1), (2, 2), (3, 3)]);
}

#[test]
fn test_unsubscribe_through_controller() {
    let (controller, _) = initialized();
    let count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&count);
    let id = controller.subscribe(GameEventKind::Tick, move |_, _| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    controller.step().unwrap();
    assert!(controller.unsubscribe(id));
    controller.step().unwrap();
    assert_eq!(count.load(Ordering::Relaxed), 1);
}

// ============================================================================
// Simulation thread
// ============================================================================

#[test]
fn test_thread_ticks_pauses_and_resumes() {
    let (controller, _) = initialized();
    controller.start().unwrap();
    assert!(wait_for(|| controller.stats().ticks >= 3));

    controller.pause().unwrap();
    std::thread::sleep(Duration::from_millis(120));
    let paused_at = controller.read(|w| w.tick());
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(controller.read(|w| w.tick()), paused_at);

    // Paused wall time is not game time.
    let game_time = controller.read(|w| w.game_time());
    assert_eq!(game_time, tick_dt() * Fixed::from_num(paused_at));

    // Stepping is allowed while paused.
    assert_eq!(controller.step().unwrap(), paused_at + 1);

    controller.resume().unwrap();
    assert!(wait_for(|| controller.read(|w| w.tick()) >= paused_at + 3));
    controller.stop().unwrap();

    let stopped_at = controller.read(|w| w.tick());
    std::thread::sleep(Duration::from_millis(120));
    assert_eq!(controller.read(|w| w.tick()), stopped_at);
    assert_eq!(controller.stats().ticks, stopped_at);
}

#[test]
fn test_pause_waits_for_tick_in_flight() {
    let (controller, _) = initialized();
    // Slow ticks widen the window in which pause lands mid-tick.
    controller.subscribe(GameEventKind::Tick, |_, _| {
        std::thread::sleep(Duration::from_millis(5));
    });
    controller.start().unwrap();

    for round in 0..5 {
        let resumed_at = controller.read(|w| w.tick());
        assert!(wait_for(|| controller.read(|w| w.tick()) > resumed_at));

        controller.pause().unwrap();
        let paused_at = controller.read(|w| w.tick());
        assert_eq!(controller.stats().ticks, paused_at, "round {round}");
        assert_eq!(controller.step().unwrap(), paused_at + 1, "round {round}");
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(controller.read(|w| w.tick()), paused_at + 1, "round {round}");
        controller.resume().unwrap();
    }
    controller.stop().unwrap();
}

#[test]
fn test_thread_applies_commands_from_other_threads() {
    let (controller, runner) = initialized();
    let controller = Arc::new(controller);
    controller.start().unwrap();

    let producer = Arc::clone(&controller);
    std::thread::spawn(move || {
        producer
            .submit_command(runner, UnitCommand::move_to(at(3.0, 0.0)))
            .unwrap();
    })
    .join()
    .unwrap();

    assert!(wait_for(|| controller.read(|w| w.unit(runner).unwrap().position == at(3.0, 0.0))));
    controller.stop().unwrap();
    assert_eq!(controller.stats().commands_applied, 1);
}

#[test]
fn test_snapshot_reflects_world() {
    let (controller, _) = initialized();
    controller.step_many(4).unwrap();

    let snapshot = controller.try_read_snapshot().expect("world is not locked");
    assert_eq!(snapshot.state, ControllerState::Initialized);
    assert_eq!(snapshot.world.tick, 4);
    assert_eq!(snapshot.players.len(), 2);
    assert_eq!(snapshot.players[0].name, "red");

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["state"], "Initialized");
    assert_eq!(json["world"]["tick"], 4);
}
