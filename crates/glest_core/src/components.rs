//! In-world entity records.
//!
//! Units, buildings and resource nodes share an id space, a position and
//! (for units and buildings) an owner, but are kept as three distinct
//! record types in parallel collections. Where code genuinely needs
//! "any entity", it uses [`EntityRef`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::commands::UnitCommand;
use crate::data::{ResourceCost, UnitDefinition, UpgradeDefinition};
use crate::error::{GameError, Result};
use crate::math::{Fixed, Vec3Fixed};

/// Unique identifier for in-world entities. Never reused within a world.
pub type EntityId = u64;

/// Unique identifier for players.
pub type PlayerId = u32;

/// Maximum number of pending commands per unit or building.
pub const MAX_QUEUE_LEN: usize = 16;

/// Which collection an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// A mobile unit.
    Unit,
    /// A building.
    Building,
    /// A resource node.
    ResourceNode,
}

/// Lightweight handle to any entity, resolved through the object manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Collection the entity lives in.
    pub kind: EntityKind,
    /// Entity id.
    pub id: EntityId,
}

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitState {
    /// No command to execute.
    #[default]
    Idle,
    /// Walking toward a position or entity.
    Moving,
    /// Engaging a target.
    Attacking,
    /// Gathering at a resource node.
    Gathering,
    /// Constructing, repairing or upgrading.
    Building,
    /// Hit points reached zero; playing the death delay.
    Dying,
    /// Awaiting removal by the object manager.
    Dead,
}

impl UnitState {
    /// Check whether the unit still counts as alive.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        !matches!(self, Self::Dying | Self::Dead)
    }

    /// Stable display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving => "moving",
            Self::Attacking => "attacking",
            Self::Gathering => "gathering",
            Self::Building => "building",
            Self::Dying => "dying",
            Self::Dead => "dead",
        }
    }
}

/// A command waiting in a queue, tagged with a per-queue serial number.
///
/// The serial lets the state machine notice that the head command has
/// changed (and therefore needs dispatching) without comparing payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Queued<T> {
    /// Serial number, unique within the owning queue.
    pub serial: u64,
    /// The command.
    pub command: T,
}

/// Bounded queue of commands for a unit to execute.
///
/// Commands are executed in order. Units process the front command
/// until complete, then move to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandQueue<T> {
    entries: VecDeque<Queued<T>>,
    next_serial: u64,
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
            next_serial: 1,
        }
    }
}

impl<T> CommandQueue<T> {
    /// Create an empty command queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no pending commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if the queue is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_QUEUE_LEN
    }

    /// The command currently being executed.
    #[must_use]
    pub fn head(&self) -> Option<&Queued<T>> {
        self.entries.front()
    }

    /// Mutable access to the command currently being executed.
    pub fn head_mut(&mut self) -> Option<&mut Queued<T>> {
        self.entries.front_mut()
    }

    /// Remove and return the current command (when completed).
    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front().map(|q| q.command)
    }

    /// Remove all pending commands.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Insert a command at `index` (clamped to the queue length).
    ///
    /// Returns the serial assigned to the command.
    pub fn insert(&mut self, index: usize, command: T) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        let index = index.min(self.entries.len());
        self.entries.insert(index, Queued { serial, command });
        serial
    }

    /// Add a command to the back of the queue.
    pub fn push(&mut self, command: T) -> u64 {
        let len = self.entries.len();
        self.insert(len, command)
    }

    /// Iterate over pending commands, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Queued<T>> {
        self.entries.iter()
    }
}

/// Derived stats, recomputed from the definition whenever an upgrade lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStats {
    /// Maximum hit points.
    pub max_hp: i32,
    /// Hit points regenerated per second while idle.
    pub hp_regeneration: i32,
    /// Flat armor.
    pub armor: i32,
    /// Armor type name.
    pub armor_type: String,
    /// Base attack damage.
    pub attack_damage: i32,
    /// Attack type name.
    pub attack_type: Option<String>,
    /// Attack range.
    pub attack_range: Fixed,
    /// Attacks per second.
    pub attack_speed: Fixed,
    /// Sight range.
    pub sight: Fixed,
    /// Movement speed per second.
    pub move_speed: Fixed,
}

impl UnitStats {
    /// Compute base stats from a definition.
    #[must_use]
    pub fn from_definition(definition: &UnitDefinition) -> Self {
        let p = &definition.parameters;
        Self {
            max_hp: p.max_hp,
            hp_regeneration: p.hp_regeneration,
            armor: p.armor,
            armor_type: p.armor_type.clone(),
            attack_damage: p.attack_damage,
            attack_type: p.attack_type.clone(),
            attack_range: p.attack_range,
            attack_speed: p.attack_speed,
            sight: Fixed::from_num(p.sight),
            move_speed: p.move_speed,
        }
    }

    /// Apply an upgrade's bonuses.
    pub fn apply_upgrade(&mut self, upgrade: &UpgradeDefinition) {
        self.max_hp += upgrade.max_hp_bonus;
        self.attack_damage += upgrade.attack_damage_bonus;
        self.armor += upgrade.armor_bonus;
    }

    /// Seconds between two attacks.
    #[must_use]
    pub fn attack_interval(&self) -> Fixed {
        if self.attack_speed <= Fixed::ZERO {
            return Fixed::from_num(1);
        }
        Fixed::from_num(1) / self.attack_speed
    }
}

/// Patrol progress for units executing patrol commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatrolState {
    /// Where the patrol started.
    pub origin: Vec3Fixed,
    /// The far end of the patrol.
    pub target: Vec3Fixed,
    /// Whether the unit is currently heading to `target`.
    pub heading_to_target: bool,
}

/// Transient per-command bookkeeping of a unit's state machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    /// Serial of the command that was last dispatched.
    pub dispatched: Option<u64>,
    /// Seconds until the next attack may land.
    pub attack_cooldown: Fixed,
    /// Target acquired automatically (attack-move, hold, patrol, guard).
    pub engaged: Option<EntityId>,
    /// Patrol legs.
    pub patrol: Option<PatrolState>,
    /// Resource kind of the node being gathered.
    pub gather_resource: Option<String>,
    /// Fractional gathered amount not yet credited.
    pub gather_progress: Fixed,
    /// Fractional hit points not yet regenerated.
    pub regen_progress: Fixed,
    /// Seconds of work done on a timed command (upgrade).
    pub work_elapsed: Fixed,
    /// Fractional hit points restored by repair, not yet applied.
    pub repair_progress: Fixed,
    /// Construction site created by the current build command.
    pub build_site: Option<EntityId>,
    /// Seconds spent dying.
    pub dying_elapsed: Fixed,
    /// Last attacker, credited with the kill.
    pub last_attacker: Option<EntityId>,
}

/// An upgrade that has been paid for but not finished.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeInProgress {
    /// Cost deducted when the command was first dispatched.
    pub cost: ResourceCost,
    /// Seconds of work done so far.
    pub elapsed: Fixed,
}

/// A mobile unit in the world.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Stable id.
    pub id: EntityId,
    /// Owning player.
    pub player: PlayerId,
    /// Unit type name.
    pub unit_type: String,
    /// Current position.
    pub position: Vec3Fixed,
    /// Yaw in turns (0..1).
    pub facing: Fixed,
    /// Current hit points; zero means dying or dead.
    pub hp: i32,
    /// Lifecycle state.
    pub state: UnitState,
    /// Pending commands.
    pub commands: CommandQueue<UnitCommand>,
    /// Carried resources.
    pub carried: BTreeMap<String, u32>,
    /// Derived stats.
    pub stats: UnitStats,
    /// Number of upgrades applied.
    pub upgrade_level: u32,
    /// Shared definition.
    pub definition: Arc<UnitDefinition>,
    /// State machine bookkeeping.
    pub activity: Activity,
    /// Paid upgrades keyed by command serial; they survive preemption.
    pub upgrades_in_progress: BTreeMap<u64, UpgradeInProgress>,
}

impl Unit {
    /// Create a unit at full health.
    #[must_use]
    pub fn new(
        id: EntityId,
        player: PlayerId,
        definition: Arc<UnitDefinition>,
        position: Vec3Fixed,
    ) -> Self {
        let stats = UnitStats::from_definition(&definition);
        Self {
            id,
            player,
            unit_type: definition.name.clone(),
            position,
            facing: Fixed::ZERO,
            hp: stats.max_hp,
            state: UnitState::Idle,
            commands: CommandQueue::new(),
            carried: BTreeMap::new(),
            stats,
            upgrade_level: 0,
            definition,
            activity: Activity::default(),
            upgrades_in_progress: BTreeMap::new(),
        }
    }

    /// Check whether the unit is alive (not dying or dead).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Total carried amount across all resources.
    #[must_use]
    pub fn carried_total(&self) -> u32 {
        self.carried.values().sum()
    }

    /// Entity handle for this unit.
    #[must_use]
    pub const fn entity_ref(&self) -> EntityRef {
        EntityRef {
            kind: EntityKind::Unit,
            id: self.id,
        }
    }
}

/// What a production queue item yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionKind {
    /// A new unit of the named type.
    Unit(String),
    /// A named building upgrade.
    Upgrade(String),
}

/// An item in a building's production queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionItem {
    /// What is being produced.
    pub kind: ProductionKind,
    /// Cost deducted when the item starts.
    pub cost: ResourceCost,
    /// Progress in `[0, 1]`.
    pub progress: Fixed,
    /// Whether the cost has been paid.
    pub started: bool,
}

impl ProductionItem {
    /// Create a new, unpaid production item.
    #[must_use]
    pub fn new(kind: ProductionKind, cost: ResourceCost) -> Self {
        Self {
            kind,
            cost,
            progress: Fixed::ZERO,
            started: false,
        }
    }
}

/// A building in the world.
#[derive(Debug, Clone)]
pub struct Building {
    /// Stable id.
    pub id: EntityId,
    /// Owning player.
    pub player: PlayerId,
    /// Building type name.
    pub building_type: String,
    /// Center of the footprint.
    pub position: Vec3Fixed,
    /// Footprint edge length in cells.
    pub footprint: i32,
    /// Current hit points.
    pub hp: i32,
    /// Maximum hit points (including upgrades).
    pub max_hp: i32,
    /// Flat armor (including upgrades).
    pub armor: i32,
    /// Construction progress in `[0, 1]`.
    pub progress: Fixed,
    /// Production queue, head first.
    pub production: VecDeque<ProductionItem>,
    /// Number of upgrades applied.
    pub upgrade_level: u32,
    /// Shared definition.
    pub definition: Arc<UnitDefinition>,
    /// Set once hit points reach zero; removed at tick end.
    pub destroyed: bool,
}

impl Building {
    /// Create a building; `built` places it complete at full health.
    #[must_use]
    pub fn new(
        id: EntityId,
        player: PlayerId,
        definition: Arc<UnitDefinition>,
        position: Vec3Fixed,
        built: bool,
    ) -> Self {
        let max_hp = definition.parameters.max_hp;
        Self {
            id,
            player,
            building_type: definition.name.clone(),
            position,
            footprint: definition.parameters.size.max(1),
            hp: if built { max_hp } else { 1.min(max_hp) },
            max_hp,
            armor: definition.parameters.armor,
            progress: if built { Fixed::from_num(1) } else { Fixed::ZERO },
            production: VecDeque::new(),
            upgrade_level: 0,
            definition,
            destroyed: false,
        }
    }

    /// Construction is complete.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.progress >= Fixed::from_num(1)
    }

    /// Check whether the building still stands.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.destroyed && self.hp > 0
    }

    /// Half the footprint edge, in world units.
    #[must_use]
    pub fn half_extent(&self) -> Fixed {
        Fixed::from_num(self.footprint) / Fixed::from_num(2)
    }

    /// Apply an upgrade's bonuses.
    pub fn apply_upgrade(&mut self, upgrade: &UpgradeDefinition) {
        self.max_hp += upgrade.max_hp_bonus;
        self.hp = (self.hp + upgrade.max_hp_bonus).clamp(1, self.max_hp);
        self.armor += upgrade.armor_bonus;
        self.upgrade_level += 1;
    }

    /// Entity handle for this building.
    #[must_use]
    pub const fn entity_ref(&self) -> EntityRef {
        EntityRef {
            kind: EntityKind::Building,
            id: self.id,
        }
    }
}

/// A gatherable resource deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    /// Stable id.
    pub id: EntityId,
    /// Resource type name.
    pub resource: String,
    /// Position.
    pub position: Vec3Fixed,
    /// Remaining amount.
    pub amount: u32,
    /// Amount at creation.
    pub initial_amount: u32,
    /// Set on the first tick-end at which the node was found empty.
    pub depleted_seen: bool,
}

impl ResourceNode {
    /// Check if this node is depleted.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.amount == 0
    }

    /// Extract resources from this node.
    ///
    /// Returns the actual amount extracted (may be less than requested if node is nearly depleted).
    pub fn extract(&mut self, requested: u32) -> u32 {
        let extracted = requested.min(self.amount);
        self.amount -= extracted;
        extracted
    }

    /// Entity handle for this node.
    #[must_use]
    pub const fn entity_ref(&self) -> EntityRef {
        EntityRef {
            kind: EntityKind::ResourceNode,
            id: self.id,
        }
    }
}

/// A participant in the game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Faction name.
    pub faction: String,
    /// Controlled by the computer.
    pub is_ai: bool,
    /// Still in the game.
    pub is_active: bool,
    /// Team number; players on different teams are enemies.
    pub team: u32,
    /// Resource totals.
    pub resources: BTreeMap<String, u32>,
    /// Units created over the game.
    pub units_created: u32,
    /// Units lost over the game.
    pub units_lost: u32,
    /// Fractional regeneration not yet credited.
    #[serde(skip)]
    pub regen_progress: BTreeMap<String, Fixed>,
}

impl Player {
    /// Current amount of a resource.
    #[must_use]
    pub fn amount(&self, resource: &str) -> u32 {
        self.resources.get(resource).copied().unwrap_or(0)
    }

    /// Check that every entry of `cost` is covered.
    ///
    /// Reports the first shortfall in resource-name order.
    pub fn check_affordable(&self, cost: &ResourceCost) -> Result<()> {
        for (resource, &required) in cost {
            let available = self.amount(resource);
            if available < required {
                return Err(GameError::InsufficientResources {
                    resource: resource.clone(),
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Deduct `cost` atomically: either everything is paid or nothing is.
    pub fn try_spend(&mut self, cost: &ResourceCost) -> Result<()> {
        self.check_affordable(cost)?;
        for (resource, &amount) in cost {
            if let Some(total) = self.resources.get_mut(resource) {
                *total -= amount;
            }
        }
        Ok(())
    }

    /// Credit a resource amount. Returns the new total.
    pub fn add(&mut self, resource: &str, amount: u32) -> u32 {
        let total = self.resources.entry(resource.to_string()).or_insert(0);
        *total = total.saturating_add(amount);
        *total
    }

    /// Credit every entry of a cost map (refunds).
    pub fn refund(&mut self, cost: &ResourceCost) {
        for (resource, &amount) in cost {
            self.add(resource, amount);
        }
    }

    /// Check whether another player is an enemy.
    #[must_use]
    pub fn is_enemy_of(&self, other: &Player) -> bool {
        self.team != other.team
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_with(gold: u32, wood: u32) -> Player {
        Player {
            id: 1,
            name: "p1".to_string(),
            faction: "magic".to_string(),
            is_ai: false,
            is_active: true,
            team: 1,
            resources: [("gold".to_string(), gold), ("wood".to_string(), wood)]
                .into_iter()
                .collect(),
            units_created: 0,
            units_lost: 0,
            regen_progress: BTreeMap::new(),
        }
    }

    #[test]
    fn test_try_spend_is_atomic() {
        let mut player = player_with(100, 10);
        let cost: ResourceCost = [("gold".to_string(), 50), ("wood".to_string(), 20)]
            .into_iter()
            .collect();

        let result = player.try_spend(&cost);
        assert!(matches!(
            result,
            Err(GameError::InsufficientResources { ref resource, required: 20, available: 10 })
                if resource == "wood"
        ));
        assert_eq!(player.amount("gold"), 100);
        assert_eq!(player.amount("wood"), 10);
    }

    #[test]
    fn test_try_spend_deducts_all() {
        let mut player = player_with(100, 30);
        let cost: ResourceCost = [("gold".to_string(), 50), ("wood".to_string(), 20)]
            .into_iter()
            .collect();
        player.try_spend(&cost).unwrap();
        assert_eq!(player.amount("gold"), 50);
        assert_eq!(player.amount("wood"), 10);
    }

    #[test]
    fn test_command_queue_serials_and_capacity() {
        let mut queue: CommandQueue<u32> = CommandQueue::new();
        let first = queue.push(1);
        let second = queue.insert(0, 2);
        assert_ne!(first, second);
        assert_eq!(queue.head().map(|q| q.command), Some(2));

        for n in 0..14 {
            queue.push(n);
        }
        assert!(queue.is_full());
        assert_eq!(queue.pop(), Some(2));
        assert!(!queue.is_full());
    }

    #[test]
    fn test_node_extract_clamps() {
        let mut node = ResourceNode {
            id: 1,
            resource: "gold".to_string(),
            position: Vec3Fixed::ZERO,
            amount: 3,
            initial_amount: 10,
            depleted_seen: false,
        };
        assert_eq!(node.extract(5), 3);
        assert!(node.is_depleted());
    }
}
