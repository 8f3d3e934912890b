//! Unit and building command languages, plus issue-time validation.
//!
//! Validation checks, in order, and reports the first failure:
//! entity exists, entity alive, command offered by the definition,
//! costs affordable, target valid, target position on the map, and
//! finally queue capacity.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::components::{EntityId, Player, PlayerId, Unit, MAX_QUEUE_LEN};
use crate::data::{BuildingCommandKind, ResourceCost, UnitCommandKind, UnitDefinition};
use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, Fixed, Vec3Fixed};
use crate::objects::ObjectManager;

/// What a unit is told to do, with the parameters of each command type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnitOrder {
    /// Walk to a position.
    Move {
        /// Destination.
        target: Vec3Fixed,
    },
    /// Drop every pending command.
    Stop,
    /// Stay put, engaging enemies that come within attack range.
    Hold,
    /// Attack an entity until it dies.
    Attack {
        /// Unit or building to attack.
        target: EntityId,
    },
    /// Walk to a position, engaging enemies seen on the way.
    AttackMove {
        /// Destination.
        target: Vec3Fixed,
    },
    /// Gather from a resource node, delivering whenever full.
    Gather {
        /// Resource node.
        node: EntityId,
    },
    /// Deliver carried resources.
    ReturnResources {
        /// Store to deliver to; the nearest suitable store when `None`.
        store: Option<EntityId>,
    },
    /// Construct a building.
    Build {
        /// Building type name.
        building_type: String,
        /// Center of the footprint.
        position: Vec3Fixed,
    },
    /// Repair (or finish) a building.
    Repair {
        /// Building to repair.
        target: EntityId,
    },
    /// Escort an entity, engaging enemies near it.
    Guard {
        /// Entity to guard.
        target: EntityId,
    },
    /// Walk back and forth between the current position and a target.
    Patrol {
        /// Far end of the patrol.
        target: Vec3Fixed,
    },
    /// Apply a unit upgrade.
    Upgrade {
        /// Upgrade name.
        upgrade: String,
    },
}

impl UnitOrder {
    /// The command type of this order.
    #[must_use]
    pub const fn kind(&self) -> UnitCommandKind {
        match self {
            Self::Move { .. } => UnitCommandKind::Move,
            Self::Stop => UnitCommandKind::Stop,
            Self::Hold => UnitCommandKind::Hold,
            Self::Attack { .. } => UnitCommandKind::Attack,
            Self::AttackMove { .. } => UnitCommandKind::AttackMove,
            Self::Gather { .. } => UnitCommandKind::Gather,
            Self::ReturnResources { .. } => UnitCommandKind::ReturnResources,
            Self::Build { .. } => UnitCommandKind::Build,
            Self::Repair { .. } => UnitCommandKind::Repair,
            Self::Guard { .. } => UnitCommandKind::Guard,
            Self::Patrol { .. } => UnitCommandKind::Patrol,
            Self::Upgrade { .. } => UnitCommandKind::Upgrade,
        }
    }

    /// Target position, for orders that have one.
    #[must_use]
    pub const fn target_position(&self) -> Option<Vec3Fixed> {
        match self {
            Self::Move { target } | Self::AttackMove { target } | Self::Patrol { target } => {
                Some(*target)
            }
            Self::Build { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Target entity, for orders that have one.
    #[must_use]
    pub const fn target_entity(&self) -> Option<EntityId> {
        match self {
            Self::Attack { target } | Self::Repair { target } | Self::Guard { target } => {
                Some(*target)
            }
            Self::Gather { node } => Some(*node),
            Self::ReturnResources { store } => *store,
            _ => None,
        }
    }
}

/// A unit command: an order plus queueing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitCommand {
    /// What to do.
    pub order: UnitOrder,
    /// Game time at which the command was accepted.
    #[serde(with = "fixed_decimal")]
    pub issued_at: Fixed,
    /// Higher priorities are queued ahead of lower ones.
    pub priority: u8,
    /// Append to the queue instead of replacing it.
    pub queued: bool,
}

impl UnitCommand {
    /// Create a replacing command with default priority.
    #[must_use]
    pub const fn new(order: UnitOrder) -> Self {
        Self {
            order,
            issued_at: Fixed::ZERO,
            priority: 0,
            queued: false,
        }
    }

    /// Mark the command as queued behind existing ones.
    #[must_use]
    pub fn queued(mut self) -> Self {
        self.queued = true;
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Shorthand for a replacing move.
    #[must_use]
    pub const fn move_to(target: Vec3Fixed) -> Self {
        Self::new(UnitOrder::Move { target })
    }

    /// Shorthand for a replacing attack.
    #[must_use]
    pub const fn attack(target: EntityId) -> Self {
        Self::new(UnitOrder::Attack { target })
    }

    /// Shorthand for a replacing gather.
    #[must_use]
    pub const fn gather(node: EntityId) -> Self {
        Self::new(UnitOrder::Gather { node })
    }
}

/// A command addressed to a building's production queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BuildingCommand {
    /// Queue production of a unit.
    Produce {
        /// Unit type to produce.
        unit_type: String,
        /// Cost deducted when production starts.
        cost: ResourceCost,
    },
    /// Queue an upgrade of the building itself.
    Upgrade {
        /// Upgrade name.
        upgrade: String,
        /// Cost deducted when the upgrade starts.
        cost: ResourceCost,
    },
    /// Remove the most recently queued item, refunding it if started.
    Cancel,
}

impl BuildingCommand {
    /// Produce a unit at its definition's cost.
    #[must_use]
    pub fn produce(definition: &UnitDefinition) -> Self {
        Self::Produce {
            unit_type: definition.name.clone(),
            cost: definition.cost(),
        }
    }

    /// The command type.
    #[must_use]
    pub const fn kind(&self) -> BuildingCommandKind {
        match self {
            Self::Produce { .. } => BuildingCommandKind::Produce,
            Self::Upgrade { .. } => BuildingCommandKind::Upgrade,
            Self::Cancel => BuildingCommandKind::Cancel,
        }
    }

    /// Cost of the command, if any.
    #[must_use]
    pub fn cost(&self) -> Option<&ResourceCost> {
        match self {
            Self::Produce { cost, .. } | Self::Upgrade { cost, .. } => Some(cost),
            Self::Cancel => None,
        }
    }
}

/// Any command, addressed to a unit or a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    /// Unit command.
    Unit(UnitCommand),
    /// Building command.
    Building(BuildingCommand),
}

impl Command {
    /// Stable name of the command type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unit(c) => c.order.kind().name(),
            Self::Building(c) => c.kind().name(),
        }
    }
}

impl From<UnitCommand> for Command {
    fn from(command: UnitCommand) -> Self {
        Self::Unit(command)
    }
}

impl From<UnitOrder> for Command {
    fn from(order: UnitOrder) -> Self {
        Self::Unit(UnitCommand::new(order))
    }
}

impl From<BuildingCommand> for Command {
    fn from(command: BuildingCommand) -> Self {
        Self::Building(command)
    }
}

/// Read-only view of the world needed to validate a command.
pub(crate) struct CommandContext<'a> {
    pub objects: &'a ObjectManager,
    pub players: &'a BTreeMap<PlayerId, Player>,
    pub width: i32,
    pub height: i32,
}

impl CommandContext<'_> {
    fn in_bounds(&self, position: Vec3Fixed) -> bool {
        position.x >= Fixed::ZERO
            && position.z >= Fixed::ZERO
            && position.x <= Fixed::from_num(self.width)
            && position.z <= Fixed::from_num(self.height)
    }

    fn player(&self, id: PlayerId) -> Result<&Player> {
        self.players.get(&id).ok_or(GameError::InvalidPlayer(id))
    }

    fn alive_target(&self, id: EntityId) -> Result<()> {
        match self.objects.kind_of(id) {
            None => Err(GameError::InvalidTarget(format!("entity {id} does not exist"))),
            Some(_) if !self.objects.is_alive(id) && self.objects.get_resource_node(id).is_none() => {
                Err(GameError::InvalidTarget(format!("entity {id} is dead")))
            }
            Some(_) => Ok(()),
        }
    }

    /// Validate a command addressed to `entity`.
    pub fn validate(&self, entity: EntityId, command: &Command) -> Result<()> {
        if let Some(unit) = self.objects.get_unit(entity) {
            if !unit.is_alive() || self.objects.is_pending_removal(entity) {
                return Err(GameError::DeadEntity(entity));
            }
            let Command::Unit(command) = command else {
                return Err(GameError::CommandNotAvailable {
                    entity,
                    command: command.name().to_string(),
                });
            };
            return self.validate_unit(unit, command);
        }

        if let Some(building) = self.objects.get_building(entity) {
            if !building.is_alive() || self.objects.is_pending_removal(entity) {
                return Err(GameError::DeadEntity(entity));
            }
            let Command::Building(command) = command else {
                return Err(GameError::CommandNotAvailable {
                    entity,
                    command: command.name().to_string(),
                });
            };
            if !building.definition.has_building_command(command.kind()) {
                return Err(GameError::CommandNotAvailable {
                    entity,
                    command: command.kind().name().to_string(),
                });
            }
            let owner = self.player(building.player)?;
            if !owner.is_active {
                return Err(GameError::InvalidPlayer(owner.id));
            }
            if let Some(cost) = command.cost() {
                owner.check_affordable(cost)?;
            }
            match command {
                BuildingCommand::Produce { unit_type, .. } => {
                    if !building.definition.produces(unit_type) {
                        return Err(GameError::InvalidTarget(format!(
                            "{} cannot produce {unit_type}",
                            building.building_type
                        )));
                    }
                }
                BuildingCommand::Upgrade { upgrade, .. } => {
                    if building.definition.upgrade(upgrade).is_none() {
                        return Err(GameError::InvalidTarget(format!(
                            "{} has no upgrade {upgrade}",
                            building.building_type
                        )));
                    }
                }
                BuildingCommand::Cancel => {
                    if building.production.is_empty() {
                        return Err(GameError::InvalidTarget(
                            "production queue is empty".to_string(),
                        ));
                    }
                    return Ok(());
                }
            }
            if building.production.len() >= MAX_QUEUE_LEN {
                return Err(GameError::QueueFull(entity));
            }
            return Ok(());
        }

        if self.objects.get_resource_node(entity).is_some() {
            return Err(GameError::CommandNotAvailable {
                entity,
                command: command.name().to_string(),
            });
        }
        Err(GameError::UnknownEntity(entity))
    }

    fn validate_unit(&self, unit: &Unit, command: &UnitCommand) -> Result<()> {
        let kind = command.order.kind();
        if !unit.definition.has_command(kind) {
            return Err(GameError::CommandNotAvailable {
                entity: unit.id,
                command: kind.name().to_string(),
            });
        }
        let owner = self.player(unit.player)?;
        if !owner.is_active {
            return Err(GameError::InvalidPlayer(owner.id));
        }

        // Costs are checked before targets.
        let faction = owner.faction.as_str();
        let building_definition = match &command.order {
            UnitOrder::Build { building_type, .. } => {
                self.objects.ruleset().unit(faction, building_type).cloned()
            }
            _ => None,
        };
        match &command.order {
            UnitOrder::Build { .. } => {
                if let Some(definition) = &building_definition {
                    owner.check_affordable(&definition.cost())?;
                }
            }
            UnitOrder::Upgrade { upgrade } => {
                if let Some(definition) = unit.definition.upgrade(upgrade) {
                    owner.check_affordable(&definition.cost_map())?;
                }
            }
            _ => {}
        }

        self.validate_unit_target(unit, owner, &command.order, building_definition.as_deref())?;

        if let Some(position) = command.order.target_position() {
            if !self.in_bounds(position) {
                return Err(GameError::OutOfBounds {
                    x: position.x.to_num(),
                    z: position.z.to_num(),
                });
            }
        }

        if command.queued && unit.commands.is_full() {
            return Err(GameError::QueueFull(unit.id));
        }
        Ok(())
    }

    fn validate_unit_target(
        &self,
        unit: &Unit,
        owner: &Player,
        order: &UnitOrder,
        building_definition: Option<&UnitDefinition>,
    ) -> Result<()> {
        match order {
            UnitOrder::Attack { target } => {
                if *target == unit.id {
                    return Err(GameError::InvalidTarget("a unit cannot attack itself".into()));
                }
                self.alive_target(*target)?;
                let enemy = self
                    .objects
                    .owner_of(*target)
                    .and_then(|p| self.players.get(&p))
                    .is_some_and(|p| p.is_enemy_of(owner));
                if !enemy {
                    return Err(GameError::InvalidTarget(format!("entity {target} is not an enemy")));
                }
            }
            UnitOrder::Gather { node } => {
                let Some(resource_node) = self.objects.get_resource_node(*node) else {
                    return Err(GameError::InvalidTarget(format!(
                        "entity {node} is not a resource node"
                    )));
                };
                if !unit.definition.can_gather(&resource_node.resource) {
                    return Err(GameError::InvalidTarget(format!(
                        "{} cannot gather {}",
                        unit.unit_type, resource_node.resource
                    )));
                }
                if resource_node.is_depleted() {
                    return Err(GameError::InvalidTarget(format!("node {node} is depleted")));
                }
            }
            UnitOrder::ReturnResources { store: Some(store) } => {
                self.alive_target(*store)?;
                let own_store = self
                    .objects
                    .get_building(*store)
                    .is_some_and(|b| b.player == unit.player);
                if !own_store {
                    return Err(GameError::InvalidTarget(format!(
                        "entity {store} is not an own building"
                    )));
                }
            }
            UnitOrder::Build { building_type, .. } => {
                let offered = unit.definition.builds.iter().any(|b| b == building_type);
                if !offered || !building_definition.is_some_and(UnitDefinition::is_building) {
                    return Err(GameError::InvalidTarget(format!(
                        "{} cannot build {building_type}",
                        unit.unit_type
                    )));
                }
            }
            UnitOrder::Repair { target } => {
                self.alive_target(*target)?;
                let own_building = self
                    .objects
                    .get_building(*target)
                    .is_some_and(|b| b.player == unit.player);
                if !own_building {
                    return Err(GameError::InvalidTarget(format!(
                        "entity {target} is not an own building"
                    )));
                }
            }
            UnitOrder::Guard { target } => {
                if *target == unit.id {
                    return Err(GameError::InvalidTarget("a unit cannot guard itself".into()));
                }
                self.alive_target(*target)?;
                if self.objects.get_resource_node(*target).is_some() {
                    return Err(GameError::InvalidTarget(format!(
                        "entity {target} cannot be guarded"
                    )));
                }
            }
            UnitOrder::Upgrade { upgrade } => {
                if unit.definition.upgrade(upgrade).is_none() {
                    return Err(GameError::InvalidTarget(format!(
                        "{} has no upgrade {upgrade}",
                        unit.unit_type
                    )));
                }
            }
            UnitOrder::Move { .. }
            | UnitOrder::Stop
            | UnitOrder::Hold
            | UnitOrder::AttackMove { .. }
            | UnitOrder::ReturnResources { store: None }
            | UnitOrder::Patrol { .. } => {}
        }
        Ok(())
    }
}

/// Place an accepted command into a unit's queue.
///
/// A replacing command clears the queue first. A queued command goes
/// after the last pending command of greater or equal priority, so equal
/// priorities stay in arrival order and a strictly higher priority than
/// everything pending preempts the head.
pub(crate) fn enqueue(unit: &mut Unit, command: UnitCommand) {
    if !command.queued {
        unit.commands.clear();
        unit.commands.push(command);
        return;
    }
    let index = unit
        .commands
        .iter()
        .enumerate()
        .filter(|(_, q)| q.command.priority >= command.priority)
        .map(|(i, _)| i + 1)
        .last()
        .unwrap_or(0);
    unit.commands.insert(index, command);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::data::UnitParameters;
    use crate::math::Vec3Fixed;

    fn unit() -> Unit {
        let definition = Arc::new(UnitDefinition {
            name: "initiate".to_string(),
            parameters: UnitParameters {
                max_hp: 10,
                hp_regeneration: 0,
                armor: 0,
                armor_type: "leather".to_string(),
                size: 1,
                sight: 5,
                move_speed: Fixed::from_num(1),
                attack_range: Fixed::ZERO,
                attack_damage: 0,
                attack_type: None,
                attack_speed: Fixed::from_num(1),
                production_time: Fixed::from_num(1),
            },
            resource_requirements: vec![],
            skills: vec![],
            commands: vec![UnitCommandKind::Move],
            builds: vec![],
            upgrades: vec![],
            harvest: None,
            structure: None,
            image: None,
        });
        Unit::new(1, 1, definition, Vec3Fixed::ZERO)
    }

    fn move_to(x: i32) -> UnitCommand {
        UnitCommand::move_to(Vec3Fixed::from_ints(x, 0, 0))
    }

    fn targets(unit: &Unit) -> Vec<i32> {
        unit.commands
            .iter()
            .filter_map(|q| q.command.order.target_position())
            .map(|p| p.x.to_num())
            .collect()
    }

    #[test]
    fn test_replacing_command_clears_queue() {
        let mut unit = unit();
        enqueue(&mut unit, move_to(1));
        enqueue(&mut unit, move_to(2).queued());
        enqueue(&mut unit, move_to(3));
        assert_eq!(targets(&unit), vec![3]);
    }

    #[test]
    fn test_queued_priority_ordering() {
        let mut unit = unit();
        enqueue(&mut unit, move_to(1));
        enqueue(&mut unit, move_to(2).queued());
        enqueue(&mut unit, move_to(3).queued().with_priority(5));
        assert_eq!(targets(&unit), vec![3, 1, 2]);

        enqueue(&mut unit, move_to(4).queued().with_priority(5));
        enqueue(&mut unit, move_to(5).queued());
        assert_eq!(targets(&unit), vec![3, 4, 1, 2, 5]);
    }

    #[test]
    fn test_order_metadata() {
        let order = UnitOrder::Build {
            building_type: "tower".to_string(),
            position: Vec3Fixed::from_ints(4, 0, 4),
        };
        assert_eq!(order.kind(), UnitCommandKind::Build);
        assert_eq!(order.target_position(), Some(Vec3Fixed::from_ints(4, 0, 4)));
        assert_eq!(order.target_entity(), None);
        assert_eq!(Command::from(BuildingCommand::Cancel).name(), "Cancel");
    }
}
