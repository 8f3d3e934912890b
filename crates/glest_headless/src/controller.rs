//! Game controller: lifecycle, simulation thread and world access.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──initialize──▶ Initialized ──start──▶ Running ◀──resume── Paused
//!                                                   └─────pause──────▶┘
//! any state except Stopped ──stop──▶ Stopped
//! ```
//!
//! Any other transition fails with `BadState` and changes nothing.
//!
//! # Threading
//!
//! `start` spawns one simulation thread that ticks the world at
//! `tick_rate` Hz. Each tick drains the command intake, takes the world's
//! write lock for the update, downgrades it to a read lock and publishes
//! the tick's events. An overrunning tick is logged and the schedule is
//! reset; missed ticks are not caught up. While paused the thread sleeps
//! on a condition variable, so paused wall time never becomes game time.
//! `pause` returns only after a tick in flight has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use glest_core::commands::Command;
use glest_core::components::{EntityId, Player};
use glest_core::error::GameError;
use glest_core::events::{GameEvent, GameEventKind};
use glest_core::math::Fixed;
use glest_core::world::{World, WorldStats, TICK_RATE};
use parking_lot::{Condvar, Mutex, RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ControllerError, Result};
use crate::event_bus::{EventBus, SubscriptionId};
use crate::intake::{CommandIntake, PendingCommand};

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerState {
    /// Constructed; the world may still be set up directly.
    Created,
    /// Checked and ready to run.
    Initialized,
    /// The simulation thread is ticking.
    Running,
    /// The simulation thread is parked.
    Paused,
    /// Finished; terminal.
    Stopped,
}

impl ControllerState {
    /// Lower-case name for messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

/// Controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Name of the simulation thread.
    pub thread_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            thread_name: "glest-simulation".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Simulated seconds per tick.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Wall-clock budget of one tick.
    #[must_use]
    pub fn tick_budget(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

/// Timing and throughput counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    /// Ticks run by the controller.
    pub ticks: u64,
    /// Ticks that took longer than the budget.
    pub overruns: u64,
    /// Duration of the most recent tick, in microseconds.
    pub last_tick_us: u64,
    /// Longest tick so far, in microseconds.
    pub max_tick_us: u64,
    /// Commands applied at a tick start.
    pub commands_applied: u64,
    /// Commands rejected at a tick start.
    pub commands_rejected: u64,
}

/// Copy of the observable world state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    /// Lifecycle state when taken.
    pub state: ControllerState,
    /// World summary.
    pub world: WorldStats,
    /// Every player, in id order.
    pub players: Vec<Player>,
}

impl WorldSnapshot {
    fn capture(state: ControllerState, world: &World) -> Self {
        Self {
            state,
            world: world.stats(),
            players: world.players().cloned().collect(),
        }
    }
}

/// State shared with the simulation thread.
struct Shared {
    world: RwLock<World>,
    state: Mutex<ControllerState>,
    wake: Condvar,
    /// Set while the simulation thread runs a tick; only raised under `state`.
    ticking: Mutex<bool>,
    idle: Condvar,
    thread_id: Mutex<Option<ThreadId>>,
    stop: AtomicBool,
    intake: CommandIntake,
    bus: EventBus,
    stats: Mutex<ControllerStats>,
    dt: Fixed,
    budget: Duration,
}

/// Clears the ticking flag when the thread's tick ends, even by panic.
struct TickGuard<'a>(&'a Shared);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        *self.0.ticking.lock() = false;
        self.0.idle.notify_all();
    }
}

impl Shared {
    /// Block until the simulation thread is between ticks.
    fn wait_idle(&self) {
        let mut ticking = self.ticking.lock();
        while *ticking {
            self.idle.wait(&mut ticking);
        }
    }

    /// Run one tick on the calling thread. Returns the tick number.
    fn run_tick(&self) -> u64 {
        let started = Instant::now();
        let pending = self.intake.drain();

        let mut world = self.world.write();
        let mut events = Vec::new();
        let mut applied = 0u64;
        for PendingCommand { entity, command } in pending {
            let name = command.name();
            match world.issue_command(entity, command) {
                Ok(()) => applied += 1,
                Err(e) => {
                    debug!(entity, command = name, error = %e, "Command rejected at drain");
                    events.push(GameEvent::CommandRejected {
                        entity,
                        reason: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        let rejected = events.len() as u64;
        events.extend(world.update(self.dt));
        let tick = world.tick();

        let world = RwLockWriteGuard::downgrade(world);
        let elapsed = started.elapsed();
        {
            let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
            let mut stats = self.stats.lock();
            stats.ticks += 1;
            stats.last_tick_us = micros;
            stats.max_tick_us = stats.max_tick_us.max(micros);
            stats.commands_applied += applied;
            stats.commands_rejected += rejected;
            if elapsed > self.budget {
                stats.overruns += 1;
                warn!(
                    tick,
                    elapsed_us = micros,
                    budget_us = u64::try_from(self.budget.as_micros()).unwrap_or(u64::MAX),
                    "Tick overran its budget"
                );
            }
        }

        self.bus.publish(&events, &world);
        tick
    }

    /// Body of the simulation thread.
    fn simulate(&self) {
        *self.thread_id.lock() = Some(std::thread::current().id());
        info!("Simulation thread started");
        let mut next_tick = Instant::now();
        loop {
            {
                let mut state = self.state.lock();
                while *state == ControllerState::Paused && !self.stop.load(Ordering::Acquire) {
                    self.wake.wait(&mut state);
                    next_tick = Instant::now();
                }
                if self.stop.load(Ordering::Acquire) || *state != ControllerState::Running {
                    break;
                }
                *self.ticking.lock() = true;
            }

            {
                let _guard = TickGuard(self);
                self.run_tick();
            }

            next_tick += self.budget;
            let now = Instant::now();
            if next_tick <= now {
                // Behind schedule: restart the schedule instead of catching up.
                next_tick = now;
                continue;
            }
            let mut state = self.state.lock();
            while !self.stop.load(Ordering::Acquire)
                && *state == ControllerState::Running
                && !self.wake.wait_until(&mut state, next_tick).timed_out()
            {}
        }
        info!("Simulation thread stopped");
    }
}

/// Owns a world and runs it.
///
/// All methods take `&self`; share the controller across threads with an
/// `Arc`.
pub struct GameController {
    config: ControllerConfig,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for GameController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameController")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Drop for GameController {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.wake.notify_all();
        if let Some(handle) = self.thread.get_mut().take() {
            let _ = handle.join();
        }
    }
}

impl GameController {
    /// Wrap a world with the default configuration.
    #[must_use]
    pub fn new(world: World) -> Self {
        Self::with_config(world, ControllerConfig::default())
    }

    /// Wrap a world.
    #[must_use]
    pub fn with_config(world: World, config: ControllerConfig) -> Self {
        let shared = Shared {
            world: RwLock::new(world),
            state: Mutex::new(ControllerState::Created),
            wake: Condvar::new(),
            ticking: Mutex::new(false),
            idle: Condvar::new(),
            thread_id: Mutex::new(None),
            stop: AtomicBool::new(false),
            intake: CommandIntake::new(),
            bus: EventBus::new(),
            stats: Mutex::new(ControllerStats::default()),
            dt: config.dt(),
            budget: config.tick_budget(),
        };
        Self {
            config,
            shared: Arc::new(shared),
            thread: Mutex::new(None),
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        *self.shared.state.lock()
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> ControllerStats {
        self.shared.stats.lock().clone()
    }

    /// The event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Shorthand for [`EventBus::subscribe`].
    pub fn subscribe<F>(&self, kind: GameEventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&GameEvent, &World) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(kind, callback)
    }

    /// Shorthand for [`EventBus::unsubscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.bus.unsubscribe(id)
    }

    fn transition(
        &self,
        action: &'static str,
        from: &[ControllerState],
        to: ControllerState,
    ) -> Result<ControllerState> {
        let mut state = self.shared.state.lock();
        if !from.contains(&state) {
            return Err(ControllerError::bad_state(action, state.name()));
        }
        let previous = *state;
        *state = to;
        info!(from = previous.name(), to = to.name(), "Controller {action}");
        Ok(previous)
    }

    /// Check the world and become ready to run.
    ///
    /// # Errors
    ///
    /// `BadState` unless Created; the first violated world invariant,
    /// leaving the controller Created.
    pub fn initialize(&self) -> Result<()> {
        {
            let state = self.shared.state.lock();
            if *state != ControllerState::Created {
                return Err(ControllerError::bad_state("initialize", state.name()));
            }
        }
        self.shared.world.read().check_invariants()?;
        self.transition(
            "initialize",
            &[ControllerState::Created],
            ControllerState::Initialized,
        )?;
        Ok(())
    }

    /// Spawn the simulation thread.
    ///
    /// # Errors
    ///
    /// `BadState` unless Initialized; `Thread` if the OS refuses the thread.
    pub fn start(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        self.transition("start", &[ControllerState::Initialized], ControllerState::Running)?;

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || shared.simulate());
        match spawned {
            Ok(handle) => {
                *thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.shared.state.lock() = ControllerState::Initialized;
                Err(ControllerError::Thread(e))
            }
        }
    }

    /// Park the simulation thread.
    ///
    /// Returns once a tick in flight has finished, so no thread tick runs
    /// between `pause` and a following `step`. Called from an event
    /// callback, it returns at once and the thread parks after the tick.
    ///
    /// # Errors
    ///
    /// `BadState` unless Running.
    pub fn pause(&self) -> Result<()> {
        self.transition("pause", &[ControllerState::Running], ControllerState::Paused)?;
        self.shared.wake.notify_all();
        if !self.on_simulation_thread() {
            self.shared.wait_idle();
        }
        Ok(())
    }

    fn on_simulation_thread(&self) -> bool {
        *self.shared.thread_id.lock() == Some(std::thread::current().id())
    }

    /// Wake the simulation thread.
    ///
    /// # Errors
    ///
    /// `BadState` unless Paused.
    pub fn resume(&self) -> Result<()> {
        self.transition("resume", &[ControllerState::Paused], ControllerState::Running)?;
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Stop for good. The simulation thread exits at its next tick
    /// boundary and is joined before this returns.
    ///
    /// # Errors
    ///
    /// `BadState` if already Stopped; `ThreadPanicked` if the simulation
    /// thread died.
    pub fn stop(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        self.transition(
            "stop",
            &[
                ControllerState::Created,
                ControllerState::Initialized,
                ControllerState::Running,
                ControllerState::Paused,
            ],
            ControllerState::Stopped,
        )?;
        self.shared.stop.store(true, Ordering::Release);
        self.shared.wake.notify_all();
        if let Some(handle) = thread.take() {
            handle.join().map_err(|_| ControllerError::ThreadPanicked)?;
        }
        Ok(())
    }

    /// Run exactly one tick on the calling thread.
    ///
    /// For tools and tests; only allowed while no thread is ticking.
    ///
    /// # Errors
    ///
    /// `BadState` unless Initialized or Paused.
    pub fn step(&self) -> Result<u64> {
        let state = self.state();
        if !matches!(state, ControllerState::Initialized | ControllerState::Paused) {
            return Err(ControllerError::bad_state("step", state.name()));
        }
        Ok(self.shared.run_tick())
    }

    /// Run `ticks` ticks on the calling thread.
    ///
    /// # Errors
    ///
    /// See [`GameController::step`].
    pub fn step_many(&self, ticks: u64) -> Result<u64> {
        let mut last = self.shared.world.read().tick();
        for _ in 0..ticks {
            last = self.step()?;
        }
        Ok(last)
    }

    /// Queue a command for the next tick.
    ///
    /// The command is validated against the current world first, so most
    /// problems are reported here. A command that becomes invalid before
    /// the tick starts is dropped then with a `CommandRejected` event.
    ///
    /// # Errors
    ///
    /// `BadState` once Stopped; otherwise the validation error.
    pub fn submit_command(
        &self,
        entity: EntityId,
        command: impl Into<Command>,
    ) -> std::result::Result<(), GameError> {
        let state = self.state();
        if state == ControllerState::Stopped {
            return Err(GameError::BadState {
                action: "submit a command",
                state: state.name(),
            });
        }
        let command = command.into();
        self.shared.world.read().validate_command(entity, &command)?;
        self.shared.intake.submit(entity, command);
        Ok(())
    }

    /// Commands waiting for the next tick.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.shared.intake.len()
    }

    /// Run `f` against the world under its read lock.
    pub fn read<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&self.shared.world.read())
    }

    /// Run `f` against the world under its write lock.
    ///
    /// # Errors
    ///
    /// `BadState` while Running; mutate a running world through commands.
    pub fn with_world_mut<R>(&self, f: impl FnOnce(&mut World) -> R) -> Result<R> {
        let state = self.state();
        if state == ControllerState::Running {
            return Err(ControllerError::bad_state("modify the world", state.name()));
        }
        Ok(f(&mut self.shared.world.write()))
    }

    /// Copy the observable state if the world is not locked for writing.
    #[must_use]
    pub fn try_read_snapshot(&self) -> Option<WorldSnapshot> {
        let state = self.state();
        self.shared
            .world
            .try_read()
            .map(|world| WorldSnapshot::capture(state, &world))
    }

    /// Copy the observable state, waiting for the lock.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let state = self.state();
        WorldSnapshot::capture(state, &self.shared.world.read())
    }
}
