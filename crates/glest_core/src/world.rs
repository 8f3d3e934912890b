//! The world: map, players, entities and the tick loop.
//!
//! # Tick order
//!
//! Each call to [`World::update`] runs, in this fixed order:
//! 1. Advance game time
//! 2. Resource regeneration for every active player
//! 3. Building production (spawning finished units)
//! 4. Unit state machines, in ascending id order
//! 5. Damage, death and destruction
//! 6. Depleted-node retirement, defeat checks and fog refresh
//! 7. Removal of every entity flagged during the tick
//!
//! # Determinism
//!
//! All simulation arithmetic is fixed-point and every iteration is in id
//! order, so two worlds fed the same settings, definitions and commands
//! reach identical states after the same number of ticks.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::commands::{enqueue, BuildingCommand, Command, CommandContext};
use crate::components::{
    Activity, Building, EntityId, Player, PlayerId, ProductionItem, ProductionKind, ResourceNode,
    Unit, UnitState, MAX_QUEUE_LEN,
};
use crate::data::{ResourceCost, Ruleset};
use crate::error::{GameError, Result};
use crate::events::GameEvent;
use crate::fog::FogOfWar;
use crate::math::{fixed_decimal, Fixed, Vec3Fixed};
use crate::objects::{ObjectManager, ObjectStats, Placement};
use crate::systems::{self, TickContext};

/// Ticks per second the controller drives the world at by default.
pub const TICK_RATE: u32 = 20;

/// Map and rule settings for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Map width in cells.
    pub width: i32,
    /// Map height in cells.
    pub height: i32,
    /// Track per-player visibility.
    pub fog_of_war: bool,
    /// Seconds a unit spends dying before it is dead.
    #[serde(with = "fixed_decimal")]
    pub death_delay: Fixed,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            fog_of_war: true,
            death_delay: Fixed::ZERO,
        }
    }
}

impl WorldSettings {
    /// Settings for a map of the given size, other fields default.
    #[must_use]
    pub fn with_size(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

/// Parameters for adding a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSetup {
    /// Display name.
    pub name: String,
    /// Faction name; must exist in the ruleset.
    pub faction: String,
    /// Team; defaults to a team of its own.
    pub team: Option<u32>,
    /// Computer-controlled.
    pub is_ai: bool,
}

impl PlayerSetup {
    /// A human player with a team of its own.
    #[must_use]
    pub fn new(name: impl Into<String>, faction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faction: faction.into(),
            team: None,
            is_ai: false,
        }
    }

    /// Put the player on a team.
    #[must_use]
    pub fn team(mut self, team: u32) -> Self {
        self.team = Some(team);
        self
    }

    /// Mark the player as computer-controlled.
    #[must_use]
    pub fn ai(mut self) -> Self {
        self.is_ai = true;
        self
    }
}

/// Summary of the world for observers and tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldStats {
    /// Ticks run.
    pub tick: u64,
    /// Game time in seconds.
    pub game_time: f64,
    /// Players in the game.
    pub players: usize,
    /// Players still active.
    pub active_players: usize,
    /// Entity counts.
    pub objects: ObjectStats,
}

/// One game: map, players, entities and the tick loop.
#[derive(Debug, Clone)]
pub struct World {
    settings: WorldSettings,
    ruleset: Arc<Ruleset>,
    players: BTreeMap<PlayerId, Player>,
    objects: ObjectManager,
    fog: Option<FogOfWar>,
    game_time: Fixed,
    tick: u64,
    next_player_id: PlayerId,
    fielded: BTreeSet<PlayerId>,
    pending_events: Vec<GameEvent>,
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new(ruleset: Arc<Ruleset>, settings: WorldSettings) -> Self {
        let objects = ObjectManager::new(Arc::clone(&ruleset), settings.width, settings.height);
        let fog = settings
            .fog_of_war
            .then(|| FogOfWar::new(settings.width, settings.height));
        tracing::info!(
            width = settings.width,
            height = settings.height,
            fog_of_war = settings.fog_of_war,
            "World created"
        );
        Self {
            settings,
            ruleset,
            players: BTreeMap::new(),
            objects,
            fog,
            game_time: Fixed::ZERO,
            tick: 0,
            next_player_id: 1,
            fielded: BTreeSet::new(),
            pending_events: Vec::new(),
        }
    }

    /// Add a player and seed its starting resources.
    ///
    /// Every resource in the ruleset is seeded from the faction's starting
    /// list, falling back to the resource's default amount, then zero.
    ///
    /// # Errors
    ///
    /// `InvalidType` if the faction is not in the ruleset.
    pub fn add_player(&mut self, setup: PlayerSetup) -> Result<PlayerId> {
        let faction = self
            .ruleset
            .faction(&setup.faction)
            .ok_or_else(|| GameError::InvalidType {
                faction: setup.faction.clone(),
                type_name: setup.faction.clone(),
            })?;

        let resources = self
            .ruleset
            .resources()
            .map(|r| {
                let amount = faction
                    .definition
                    .starting_amount(&r.name)
                    .or(r.default_amount)
                    .unwrap_or(0);
                (r.name.clone(), u32::try_from(amount.max(0)).unwrap_or(u32::MAX))
            })
            .collect();

        let id = self.next_player_id;
        self.next_player_id += 1;
        let player = Player {
            id,
            name: setup.name,
            faction: setup.faction,
            is_ai: setup.is_ai,
            is_active: true,
            team: setup.team.unwrap_or(id),
            resources,
            units_created: 0,
            units_lost: 0,
            regen_progress: BTreeMap::new(),
        };
        self.objects.register_player(id, player.faction.clone());
        if let Some(fog) = &mut self.fog {
            fog.add_player(id);
        }
        tracing::info!(player = id, name = %player.name, faction = %player.faction, "Player added");
        self.players.insert(id, player);
        Ok(id)
    }

    fn in_bounds(&self, position: Vec3Fixed) -> bool {
        position.x >= Fixed::ZERO
            && position.z >= Fixed::ZERO
            && position.x <= Fixed::from_num(self.settings.width)
            && position.z <= Fixed::from_num(self.settings.height)
    }

    fn clamp_to_map(&self, position: Vec3Fixed) -> Vec3Fixed {
        Vec3Fixed::ground(
            position.x.clamp(Fixed::ZERO, Fixed::from_num(self.settings.width)),
            position.z.clamp(Fixed::ZERO, Fixed::from_num(self.settings.height)),
        )
    }

    /// Place a unit for a player outside the tick loop.
    ///
    /// # Errors
    ///
    /// `InvalidPlayer`, `InvalidType`, or `OutOfBounds` if the position is off the map.
    pub fn spawn_unit(
        &mut self,
        player: PlayerId,
        unit_type: &str,
        position: Vec3Fixed,
    ) -> Result<EntityId> {
        if !self.in_bounds(position) {
            return Err(GameError::OutOfBounds {
                x: position.x.to_num(),
                z: position.z.to_num(),
            });
        }
        let id = self.objects.create_unit(player, unit_type, position)?;
        if let Some(owner) = self.players.get_mut(&player) {
            owner.units_created += 1;
        }
        self.fielded.insert(player);
        self.pending_events.push(GameEvent::UnitCreated {
            unit: id,
            player,
            unit_type: unit_type.to_string(),
        });
        Ok(id)
    }

    /// Place a building for a player outside the tick loop.
    ///
    /// # Errors
    ///
    /// `InvalidPlayer`, `InvalidType` or `Occupied`.
    pub fn spawn_building(
        &mut self,
        player: PlayerId,
        building_type: &str,
        position: Vec3Fixed,
        placement: Placement,
    ) -> Result<EntityId> {
        let id = self
            .objects
            .create_building(player, building_type, position, placement)?;
        self.fielded.insert(player);
        Ok(id)
    }

    /// Place a resource node.
    ///
    /// # Errors
    ///
    /// `InvalidType` if the resource is unknown, `OutOfBounds` if off the map.
    pub fn spawn_resource_node(
        &mut self,
        resource: &str,
        position: Vec3Fixed,
        amount: Option<u32>,
    ) -> Result<EntityId> {
        if !self.in_bounds(position) {
            return Err(GameError::OutOfBounds {
                x: position.x.to_num(),
                z: position.z.to_num(),
            });
        }
        self.objects.create_resource_node(resource, position, amount)
    }

    /// Place the faction's starting units and buildings around `location`.
    ///
    /// Buildings are placed complete on the first free slot of a spiral
    /// around the location; units stand on a tighter spiral beside them.
    ///
    /// # Errors
    ///
    /// `InvalidPlayer`, `InvalidType` for unknown starting types, or
    /// `Occupied` if no free slot remains for a building.
    pub fn spawn_starting_units(
        &mut self,
        player: PlayerId,
        location: Vec3Fixed,
    ) -> Result<Vec<EntityId>> {
        let faction_name = self
            .players
            .get(&player)
            .map(|p| p.faction.clone())
            .ok_or(GameError::InvalidPlayer(player))?;
        let ruleset = Arc::clone(&self.ruleset);
        let faction = ruleset
            .faction(&faction_name)
            .ok_or_else(|| GameError::InvalidType {
                faction: faction_name.clone(),
                type_name: faction_name.clone(),
            })?;

        let building_slots = spiral_offsets(6);
        let unit_slots = spiral_offsets(8);
        let mut next_unit_slot = 0;
        let mut spawned = Vec::new();

        for start in &faction.definition.starting_units {
            let definition =
                ruleset
                    .unit(&faction_name, &start.unit)
                    .ok_or_else(|| GameError::InvalidType {
                        faction: faction_name.clone(),
                        type_name: start.unit.clone(),
                    })?;
            for _ in 0..start.count.max(0) {
                if definition.is_building() {
                    let spacing = definition.parameters.size.max(1) + 1;
                    let placed = building_slots.iter().find_map(|&(dx, dz)| {
                        let position = location
                            + Vec3Fixed::ground(
                                Fixed::from_num(dx * spacing),
                                Fixed::from_num(dz * spacing),
                            );
                        self.spawn_building(player, &start.unit, position, Placement::Complete)
                            .ok()
                    });
                    let id = placed.ok_or(GameError::Occupied {
                        x: location.x.to_num(),
                        z: location.z.to_num(),
                    })?;
                    spawned.push(id);
                } else {
                    let (dx, dz) = unit_slots
                        .get(next_unit_slot)
                        .copied()
                        .unwrap_or((0, 0));
                    next_unit_slot += 1;
                    let position = self.clamp_to_map(
                        location
                            + Vec3Fixed::ground(
                                Fixed::from_num(dx * 2) + Fixed::from_num(1),
                                Fixed::from_num(dz * 2) + Fixed::from_num(1),
                            ),
                    );
                    spawned.push(self.spawn_unit(player, &start.unit, position)?);
                }
            }
        }
        tracing::info!(player, count = spawned.len(), "Starting units placed");
        Ok(spawned)
    }

    /// Check a command without applying it.
    ///
    /// # Errors
    ///
    /// The first of `UnknownEntity`, `DeadEntity`, `CommandNotAvailable`,
    /// `InsufficientResources`, `InvalidTarget`, `OutOfBounds` or
    /// `QueueFull` that applies.
    pub fn validate_command(&self, entity: EntityId, command: &Command) -> Result<()> {
        CommandContext {
            objects: &self.objects,
            players: &self.players,
            width: self.settings.width,
            height: self.settings.height,
        }
        .validate(entity, command)
    }

    /// Validate and enqueue a command.
    ///
    /// A rejected command leaves the entity's queue untouched.
    ///
    /// # Errors
    ///
    /// See [`World::validate_command`].
    pub fn issue_command(&mut self, entity: EntityId, command: impl Into<Command>) -> Result<()> {
        let command = command.into();
        self.validate_command(entity, &command)?;

        match command {
            Command::Unit(mut command) => {
                command.issued_at = self.game_time;
                let unit = self
                    .objects
                    .get_unit_mut(entity)
                    .ok_or(GameError::UnknownEntity(entity))?;
                tracing::debug!(
                    entity,
                    command = command.order.kind().name(),
                    queued = command.queued,
                    "Command issued"
                );
                enqueue(unit, command);
            }
            Command::Building(command) => {
                let building = self
                    .objects
                    .get_building_mut(entity)
                    .ok_or(GameError::UnknownEntity(entity))?;
                tracing::debug!(entity, command = command.kind().name(), "Command issued");
                match command {
                    BuildingCommand::Produce { unit_type, cost } => building
                        .production
                        .push_back(ProductionItem::new(ProductionKind::Unit(unit_type), cost)),
                    BuildingCommand::Upgrade { upgrade, cost } => building
                        .production
                        .push_back(ProductionItem::new(ProductionKind::Upgrade(upgrade), cost)),
                    BuildingCommand::Cancel => {
                        let player = building.player;
                        if let Some(item) = building.production.pop_back() {
                            if item.started {
                                self.refund(player, &item.cost);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn refund(&mut self, player: PlayerId, cost: &ResourceCost) {
        let Some(owner) = self.players.get_mut(&player) else {
            return;
        };
        for (resource, &amount) in cost {
            let total = owner.add(resource, amount);
            self.pending_events.push(GameEvent::ResourceChanged {
                player,
                resource: resource.clone(),
                amount: total,
                delta: i64::from(amount),
            });
        }
    }

    /// Advance the world by `dt` seconds.
    ///
    /// Returns every event of the tick in creation order, preceded by
    /// events produced between ticks (spawns, eliminations, refunds) and
    /// closed by a [`GameEvent::Tick`].
    pub fn update(&mut self, dt: Fixed) -> Vec<GameEvent> {
        // 1. Time
        self.tick += 1;
        self.game_time += dt;

        let mut ctx = TickContext {
            objects: &mut self.objects,
            players: &mut self.players,
            ruleset: &self.ruleset,
            settings: &self.settings,
            dt,
            damage: Vec::new(),
            events: std::mem::take(&mut self.pending_events),
        };

        // 2. Resources
        systems::regenerate_resources(&mut ctx);

        // 3. Production. Construction sites have no work of their own: each
        // builder adds its share in step 4, so sites without builders stall.
        systems::advance_production(&mut ctx);

        // 4. Units, in id order
        for id in ctx.objects.units().sorted_ids() {
            let Some(mut unit) = ctx.objects.take_unit(id) else {
                continue;
            };
            let remove = systems::advance_unit(&mut unit, &mut ctx);
            ctx.objects.restore_unit(unit);
            if remove {
                // The unit was just restored, so it is known.
                let _ = ctx.objects.destroy(id);
            }
        }

        // 5. Damage and deaths
        systems::resolve_damage(&mut ctx);

        let mut events = ctx.events;
        for event in &events {
            if let GameEvent::UnitCreated { player, .. } = event {
                self.fielded.insert(*player);
            }
        }

        // 6. Bookkeeping
        self.retire_depleted_nodes();
        self.check_defeats(&mut events);
        self.refresh_fog();

        // 7. Removals
        let removed = self.objects.finalize_removals();

        #[cfg(feature = "debug-validation")]
        if let Err(error) = self.check_invariants() {
            tracing::error!(tick = self.tick, %error, "World invariant violated");
        }

        events.push(GameEvent::Tick {
            tick: self.tick,
            game_time: self.game_time,
        });
        tracing::trace!(
            tick = self.tick,
            events = events.len(),
            removed = removed.len(),
            "Tick complete"
        );
        events
    }

    /// Nodes found empty at one tick end are removed at the next.
    fn retire_depleted_nodes(&mut self) {
        for id in self.objects.resource_nodes().sorted_ids() {
            let Some(node) = self.objects.get_resource_node_mut(id) else {
                continue;
            };
            if !node.is_depleted() {
                continue;
            }
            if node.depleted_seen {
                let _ = self.objects.destroy(id);
            } else {
                node.depleted_seen = true;
                tracing::debug!(node = id, "Resource node depleted");
            }
        }
    }

    fn owns_live_entities(&self, player: PlayerId) -> bool {
        self.objects
            .units_for_player(player)
            .iter()
            .any(|u| self.objects.is_alive(u.id))
            || self
                .objects
                .buildings_for_player(player)
                .iter()
                .any(|b| self.objects.is_alive(b.id))
    }

    fn check_defeats(&mut self, events: &mut Vec<GameEvent>) {
        let defeated: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.is_active && self.fielded.contains(&p.id))
            .map(|p| p.id)
            .filter(|&id| !self.owns_live_entities(id))
            .collect();
        for player in defeated {
            self.deactivate(player, events);
        }
    }

    fn deactivate(&mut self, player: PlayerId, events: &mut Vec<GameEvent>) {
        let Some(owner) = self.players.get_mut(&player) else {
            return;
        };
        owner.is_active = false;

        let unit_ids: Vec<EntityId> = self
            .objects
            .units_for_player(player)
            .iter()
            .map(|u| u.id)
            .collect();
        for id in unit_ids {
            if let Some(unit) = self.objects.get_unit_mut(id) {
                unit.commands.clear();
                if unit.is_alive() {
                    unit.state = UnitState::Idle;
                    unit.activity = Activity {
                        last_attacker: unit.activity.last_attacker,
                        ..Activity::default()
                    };
                }
            }
        }
        let building_ids: Vec<EntityId> = self
            .objects
            .buildings_for_player(player)
            .iter()
            .map(|b| b.id)
            .collect();
        for id in building_ids {
            if let Some(building) = self.objects.get_building_mut(id) {
                building.production.clear();
            }
        }

        tracing::info!(player, "Player defeated");
        events.push(GameEvent::PlayerDefeated { player });
    }

    /// Remove a player from play.
    ///
    /// The player becomes inactive, every unit it owns drops its commands
    /// and idles, and a [`GameEvent::PlayerDefeated`] is delivered with the
    /// next tick. Eliminating an inactive player does nothing.
    ///
    /// # Errors
    ///
    /// `InvalidPlayer` if the player is unknown.
    pub fn eliminate_player(&mut self, player: PlayerId) -> Result<()> {
        let owner = self
            .players
            .get(&player)
            .ok_or(GameError::InvalidPlayer(player))?;
        if !owner.is_active {
            return Ok(());
        }
        let mut events = std::mem::take(&mut self.pending_events);
        self.deactivate(player, &mut events);
        self.pending_events = events;
        Ok(())
    }

    fn refresh_fog(&mut self) {
        let Some(fog) = &mut self.fog else {
            return;
        };
        for &player in self.players.keys() {
            let mut observers: Vec<(Vec3Fixed, Fixed)> = self
                .objects
                .units_for_player(player)
                .iter()
                .filter(|u| u.is_alive())
                .map(|u| (u.position, u.stats.sight))
                .collect();
            observers.extend(
                self.objects
                    .buildings_for_player(player)
                    .iter()
                    .filter(|b| b.is_alive())
                    .map(|b| (b.position, Fixed::from_num(b.definition.parameters.sight))),
            );
            fog.refresh(player, &observers);
        }
    }

    /// Settings the world was created with.
    #[must_use]
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Shared definitions.
    #[must_use]
    pub fn ruleset(&self) -> &Arc<Ruleset> {
        &self.ruleset
    }

    /// All players, in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Look up a player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Elapsed game time in seconds.
    #[must_use]
    pub const fn game_time(&self) -> Fixed {
        self.game_time
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Map width and height.
    #[must_use]
    pub const fn map_dimensions(&self) -> (i32, i32) {
        (self.settings.width, self.settings.height)
    }

    /// The object manager.
    #[must_use]
    pub fn objects(&self) -> &ObjectManager {
        &self.objects
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.objects.get_unit(id)
    }

    /// Look up a building.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.objects.get_building(id)
    }

    /// Look up a resource node.
    #[must_use]
    pub fn resource_node(&self, id: EntityId) -> Option<&ResourceNode> {
        self.objects.get_resource_node(id)
    }

    /// Units owned by a player, in id order.
    #[must_use]
    pub fn units_for_player(&self, player: PlayerId) -> Vec<&Unit> {
        self.objects.units_for_player(player)
    }

    /// Buildings owned by a player, in id order.
    #[must_use]
    pub fn buildings_for_player(&self, player: PlayerId) -> Vec<&Building> {
        self.objects.buildings_for_player(player)
    }

    /// Every resource node, in id order.
    #[must_use]
    pub fn all_resource_nodes(&self) -> Vec<&ResourceNode> {
        self.objects.all_resource_nodes()
    }

    /// Fog of war, when enabled.
    #[must_use]
    pub fn fog(&self) -> Option<&FogOfWar> {
        self.fog.as_ref()
    }

    /// Summary counts.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            tick: self.tick,
            game_time: self.game_time.to_num(),
            players: self.players.len(),
            active_players: self.players.values().filter(|p| p.is_active).count(),
            objects: self.objects.stats(),
        }
    }

    /// Hash of the simulation state, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.game_time.to_bits().hash(&mut hasher);

        for player in self.players.values() {
            player.id.hash(&mut hasher);
            player.is_active.hash(&mut hasher);
            player.resources.hash(&mut hasher);
            player.units_created.hash(&mut hasher);
            player.units_lost.hash(&mut hasher);
        }

        for unit in self.objects.units().sorted() {
            unit.id.hash(&mut hasher);
            unit.player.hash(&mut hasher);
            unit.position.hash(&mut hasher);
            unit.facing.to_bits().hash(&mut hasher);
            unit.hp.hash(&mut hasher);
            unit.state.hash(&mut hasher);
            unit.commands.len().hash(&mut hasher);
            unit.carried.hash(&mut hasher);
        }

        for building in self.objects.buildings().sorted() {
            building.id.hash(&mut hasher);
            building.player.hash(&mut hasher);
            building.hp.hash(&mut hasher);
            building.progress.to_bits().hash(&mut hasher);
            building.production.len().hash(&mut hasher);
            if let Some(item) = building.production.front() {
                item.progress.to_bits().hash(&mut hasher);
            }
        }

        for node in self.objects.resource_nodes().sorted() {
            node.id.hash(&mut hasher);
            node.amount.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Check every world invariant, reporting the first violation.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` describing what does not hold.
    pub fn check_invariants(&self) -> Result<()> {
        let violation = |message: String| Err(GameError::InvariantViolation(message));
        let next_id = self.objects.next_id();
        let mut seen = HashSet::new();

        for unit in self.objects.units().sorted() {
            if !self.players.contains_key(&unit.player) {
                return violation(format!("unit {} owned by unknown player {}", unit.id, unit.player));
            }
            if unit.hp < 0 || unit.hp > unit.stats.max_hp {
                return violation(format!(
                    "unit {} has {} hp of {}",
                    unit.id, unit.hp, unit.stats.max_hp
                ));
            }
            if unit.hp == 0 && unit.is_alive() {
                return violation(format!("unit {} has 0 hp but is {}", unit.id, unit.state.name()));
            }
            if unit.commands.len() > MAX_QUEUE_LEN {
                return violation(format!("unit {} has {} queued commands", unit.id, unit.commands.len()));
            }
            if unit.id >= next_id || !seen.insert(unit.id) {
                return violation(format!("unit id {} is not unique", unit.id));
            }
        }

        for building in self.objects.buildings().sorted() {
            if !self.players.contains_key(&building.player) {
                return violation(format!(
                    "building {} owned by unknown player {}",
                    building.id, building.player
                ));
            }
            if building.progress < Fixed::ZERO || building.progress > Fixed::from_num(1) {
                return violation(format!("building {} progress out of range", building.id));
            }
            if building.hp < 0 || building.hp > building.max_hp {
                return violation(format!("building {} hp out of range", building.id));
            }
            if building.id >= next_id || !seen.insert(building.id) {
                return violation(format!("building id {} is not unique", building.id));
            }
        }

        for node in self.objects.resource_nodes().sorted() {
            if node.amount > node.initial_amount {
                return violation(format!(
                    "node {} holds {} of {}",
                    node.id, node.amount, node.initial_amount
                ));
            }
            if node.id >= next_id || !seen.insert(node.id) {
                return violation(format!("node id {} is not unique", node.id));
            }
        }

        let tech_tree = self.ruleset.tech_tree();
        let definitions: Vec<_> = self
            .ruleset
            .factions()
            .flat_map(|f| f.units.values())
            .collect();
        for attacker in &definitions {
            let Some(attack) = attacker.parameters.attack_type.as_deref() else {
                continue;
            };
            for target in &definitions {
                let armor = target.parameters.armor_type.as_str();
                if tech_tree.damage_multiplier(attack, armor).is_none() {
                    return violation(format!("no damage multiplier for ({attack}, {armor})"));
                }
            }
        }
        Ok(())
    }
}

/// Grid offsets ordered by ring: the center, then each surrounding square.
fn spiral_offsets(max_ring: i32) -> Vec<(i32, i32)> {
    let mut offsets = vec![(0, 0)];
    for ring in 1..=max_ring {
        for dz in -ring..=ring {
            for dx in -ring..=ring {
                if dx.abs() == ring || dz.abs() == ring {
                    offsets.push((dx, dz));
                }
            }
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spiral_offsets_rings() {
        let offsets = spiral_offsets(2);
        assert_eq!(offsets.len(), 25);
        assert_eq!(offsets[0], (0, 0));
        assert!(offsets[1..9].iter().all(|(x, z)| x.abs() <= 1 && z.abs() <= 1));
    }

    #[test]
    fn test_empty_world_ticks() {
        let mut world = World::new(Arc::new(Ruleset::default()), WorldSettings::with_size(16, 16));
        let events = world.update(Fixed::from_num(1) / Fixed::from_num(20));
        assert_eq!(world.tick(), 1);
        assert!(matches!(events.last(), Some(GameEvent::Tick { tick: 1, .. })));
        assert!(world.check_invariants().is_ok());
    }

    #[test]
    fn test_unknown_faction_rejected() {
        let mut world = World::new(Arc::new(Ruleset::default()), WorldSettings::default());
        let result = world.add_player(PlayerSetup::new("p1", "magic"));
        assert!(matches!(result, Err(GameError::InvalidType { .. })));
    }
}
