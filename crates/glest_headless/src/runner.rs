//! Headless game runner.
//!
//! Validates a content pack, builds a world with one player per requested
//! faction, hands it to a [`GameController`] and runs it for a fixed span
//! of game time, either as fast as possible (stepping on the caller's
//! thread) or in real time on the simulation thread.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glest_assets::cache::{AssetCache, CacheConfig};
use glest_assets::loader::CachedLoader;
use glest_core::components::PlayerId;
use glest_core::data::Ruleset;
use glest_core::events::GameEventKind;
use glest_core::math::{Fixed, Vec3Fixed};
use glest_core::world::{PlayerSetup, World, WorldSettings};
use glest_tools::validate::{Validator, ValidatorConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::controller::{ControllerConfig, ControllerStats, GameController};
use crate::error::{ControllerError, Result};

/// Fewest factions in a game.
pub const MIN_PLAYERS: usize = 2;
/// Most factions in a game.
pub const MAX_PLAYERS: usize = 8;
/// Distance of start locations from the map edge.
const START_MARGIN: i32 = 20;

const ALL_EVENT_KINDS: [GameEventKind; 11] = [
    GameEventKind::Tick,
    GameEventKind::UnitCreated,
    GameEventKind::UnitDied,
    GameEventKind::UnitDamaged,
    GameEventKind::BuildingCompleted,
    GameEventKind::ProductionCompleted,
    GameEventKind::ResourceChanged,
    GameEventKind::PlayerDefeated,
    GameEventKind::BuildingDestroyed,
    GameEventKind::UpgradeCompleted,
    GameEventKind::CommandRejected,
];

/// Configuration for one headless game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pack directory (`techs/<pack>`).
    pub pack: PathBuf,
    /// One player per entry, in player-id order.
    pub factions: Vec<String>,
    /// Game seconds to simulate.
    pub seconds: u32,
    /// Map and rule settings.
    pub settings: WorldSettings,
    /// Controller settings.
    pub controller: ControllerConfig,
    /// Tick on the simulation thread at wall-clock rate instead of stepping.
    pub realtime: bool,
    /// Skip model and texture checks during validation.
    pub skip_assets: bool,
}

impl RunConfig {
    /// A one-minute stepped game with default settings.
    #[must_use]
    pub fn new(pack: impl Into<PathBuf>, factions: Vec<String>) -> Self {
        Self {
            pack: pack.into(),
            factions,
            seconds: 60,
            settings: WorldSettings::default(),
            controller: ControllerConfig::default(),
            realtime: false,
            skip_assets: false,
        }
    }

    /// Ticks needed to cover `seconds` at the controller's rate.
    #[must_use]
    pub fn target_ticks(&self) -> u64 {
        u64::from(self.seconds) * u64::from(self.controller.tick_rate)
    }
}

/// End-of-game state of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Faction name.
    pub faction: String,
    /// Still in the game.
    pub active: bool,
    /// Live units.
    pub units: usize,
    /// Live buildings.
    pub buildings: usize,
    /// Units created over the game.
    pub units_created: u32,
    /// Units lost over the game.
    pub units_lost: u32,
    /// Final resource totals.
    pub resources: BTreeMap<String, u32>,
}

/// Result of a headless game.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Pack name.
    pub pack: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Game time in seconds.
    pub game_time: f64,
    /// Wall-clock duration in milliseconds.
    pub wall_ms: u64,
    /// The only active player left, when the game was decided.
    pub winner: Option<PlayerId>,
    /// Players in id order.
    pub players: Vec<PlayerSummary>,
    /// Events delivered, by kind.
    pub events: BTreeMap<String, u64>,
    /// Controller counters.
    pub controller: ControllerStats,
    /// Final world state hash.
    pub state_hash: u64,
}

/// Start locations for `count` players on a `width` by `height` map:
/// corners first, then edge midpoints.
#[must_use]
pub fn start_locations(width: i32, height: i32, count: usize) -> Vec<Vec3Fixed> {
    let (near_x, far_x, mid_x) = (START_MARGIN, width - START_MARGIN, width / 2);
    let (near_z, far_z, mid_z) = (START_MARGIN, height - START_MARGIN, height / 2);
    [
        (near_x, near_z),
        (far_x, far_z),
        (far_x, near_z),
        (near_x, far_z),
        (mid_x, near_z),
        (mid_x, far_z),
        (near_x, mid_z),
        (far_x, mid_z),
    ]
    .iter()
    .take(count)
    .map(|&(x, z)| Vec3Fixed::ground(Fixed::from_num(x), Fixed::from_num(z)))
    .collect()
}

/// Build a world with one AI player per faction, each with its starting units.
///
/// # Errors
///
/// `PlayerCount` for fewer than two or more than eight factions; any
/// error adding a player or placing its starting units.
pub fn build_world(
    ruleset: Arc<Ruleset>,
    settings: WorldSettings,
    factions: &[String],
) -> Result<World> {
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&factions.len()) {
        return Err(ControllerError::PlayerCount {
            min: MIN_PLAYERS,
            max: MAX_PLAYERS,
            given: factions.len(),
        });
    }
    let locations = start_locations(settings.width, settings.height, factions.len());
    let mut world = World::new(ruleset, settings);
    for (index, (faction, location)) in factions.iter().zip(locations).enumerate() {
        let player = world.add_player(PlayerSetup::new(format!("player{}", index + 1), faction).ai())?;
        world.spawn_starting_units(player, location)?;
    }
    Ok(world)
}

fn active_players(world: &World) -> Vec<PlayerId> {
    world.players().filter(|p| p.is_active).map(|p| p.id).collect()
}

fn summarize_players(world: &World) -> Vec<PlayerSummary> {
    world
        .players()
        .map(|p| PlayerSummary {
            id: p.id,
            name: p.name.clone(),
            faction: p.faction.clone(),
            active: p.is_active,
            units: world
                .units_for_player(p.id)
                .iter()
                .filter(|u| u.is_alive())
                .count(),
            buildings: world
                .buildings_for_player(p.id)
                .iter()
                .filter(|b| b.is_alive())
                .count(),
            units_created: p.units_created,
            units_lost: p.units_lost,
            resources: p.resources.clone(),
        })
        .collect()
}

/// Validate, load and run a pack.
///
/// The game ends after `seconds` of game time or as soon as at most one
/// player is active.
///
/// # Errors
///
/// `Validation` if the pack has error issues; any load, setup or
/// controller error.
pub fn run_pack(config: &RunConfig) -> Result<RunSummary> {
    let report = Validator::new(ValidatorConfig {
        skip_assets: config.skip_assets,
        parallel: true,
    })
    .validate(&config.pack);
    if report.has_errors() {
        return Err(ControllerError::Validation {
            pack: report.pack,
            errors: report.errors,
        });
    }
    if report.warnings > 0 {
        warn!(warnings = report.warnings, "Pack has validation warnings");
    }

    let loader = CachedLoader::new(Arc::new(AssetCache::new(CacheConfig::default())));
    let pack = loader.tech_pack(&config.pack)?;
    let ruleset = Arc::new(pack.to_ruleset());
    let world = build_world(ruleset, config.settings.clone(), &config.factions)?;

    let controller = GameController::with_config(world, config.controller.clone());
    let counts: Arc<Mutex<BTreeMap<String, u64>>> = Arc::default();
    let sink = Arc::clone(&counts);
    controller.events().subscribe_many(&ALL_EVENT_KINDS, move |event, _| {
        *sink.lock().entry(format!("{:?}", event.kind())).or_default() += 1;
    });

    controller.initialize()?;
    let target = config.target_ticks();
    info!(
        pack = %report.pack,
        players = config.factions.len(),
        ticks = target,
        realtime = config.realtime,
        "Starting headless game"
    );

    let started = Instant::now();
    if config.realtime {
        controller.start()?;
        let poll = config.controller.tick_budget();
        loop {
            std::thread::sleep(poll);
            let ticks = controller.stats().ticks;
            if ticks >= target || controller.read(|w| active_players(w).len()) <= 1 {
                break;
            }
        }
    } else {
        for _ in 0..target {
            controller.step()?;
            if controller.read(|w| active_players(w).len()) <= 1 {
                break;
            }
        }
    }
    controller.stop()?;
    let wall = started.elapsed();

    let summary = controller.read(|world| {
        let active = active_players(world);
        RunSummary {
            pack: report.pack.clone(),
            ticks: world.tick(),
            game_time: world.game_time().to_num(),
            wall_ms: u64::try_from(wall.as_millis()).unwrap_or(u64::MAX),
            winner: if active.len() == 1 { active.first().copied() } else { None },
            players: summarize_players(world),
            events: counts.lock().clone(),
            controller: controller.stats(),
            state_hash: world.state_hash(),
        }
    });
    info!(
        ticks = summary.ticks,
        game_time = summary.game_time,
        wall_ms = summary.wall_ms,
        "Headless game finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_locations_corners_first() {
        let locations = start_locations(128, 128, 3);
        assert_eq!(locations.len(), 3);
        assert_eq!(
            locations[0],
            Vec3Fixed::ground(Fixed::from_num(20), Fixed::from_num(20))
        );
        assert_eq!(
            locations[1],
            Vec3Fixed::ground(Fixed::from_num(108), Fixed::from_num(108))
        );
    }

    #[test]
    fn test_target_ticks() {
        let mut config = RunConfig::new("techs/megapack", vec!["magic".into(), "magic".into()]);
        config.seconds = 3;
        assert_eq!(config.target_ticks(), 60);
    }

    #[test]
    fn test_player_count_bounds() {
        let err = build_world(
            Arc::new(Ruleset::default()),
            WorldSettings::default(),
            &["magic".to_string()],
        )
        .expect_err("one faction");
        assert_eq!(err.kind(), "PlayerCount");
    }
}
