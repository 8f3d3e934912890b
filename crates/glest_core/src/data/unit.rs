//! Unit data structures for data-driven unit and building definitions.
//!
//! Buildings are unit definitions that carry [`StructureParameters`];
//! everything else about them (hit points, armor, sight) is shared.

use serde::{Deserialize, Serialize};

use super::resource::{cost_from_amounts, ResourceAmount, ResourceCost};
use crate::math::{fixed_decimal, Fixed};

/// Unit command types a definition may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitCommandKind {
    /// Move to a position.
    Move,
    /// Clear all orders.
    Stop,
    /// Hold position, engaging enemies in range.
    Hold,
    /// Attack a specific entity.
    Attack,
    /// Move to a position, engaging enemies on the way.
    AttackMove,
    /// Gather from a resource node.
    Gather,
    /// Deliver carried resources to a store.
    ReturnResources,
    /// Construct a building.
    Build,
    /// Repair a damaged or unfinished building.
    Repair,
    /// Escort another entity.
    Guard,
    /// Patrol between the current position and a target.
    Patrol,
    /// Apply a unit upgrade.
    Upgrade,
}

impl UnitCommandKind {
    /// All unit command kinds, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Move,
        Self::Stop,
        Self::Hold,
        Self::Attack,
        Self::AttackMove,
        Self::Gather,
        Self::ReturnResources,
        Self::Build,
        Self::Repair,
        Self::Guard,
        Self::Patrol,
        Self::Upgrade,
    ];

    /// Stable display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Move => "Move",
            Self::Stop => "Stop",
            Self::Hold => "Hold",
            Self::Attack => "Attack",
            Self::AttackMove => "AttackMove",
            Self::Gather => "Gather",
            Self::ReturnResources => "ReturnResources",
            Self::Build => "Build",
            Self::Repair => "Repair",
            Self::Guard => "Guard",
            Self::Patrol => "Patrol",
            Self::Upgrade => "Upgrade",
        }
    }
}

/// Building command types a structure may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingCommandKind {
    /// Queue production of a unit.
    Produce,
    /// Queue a building upgrade.
    Upgrade,
    /// Cancel the most recently queued item.
    Cancel,
}

impl BuildingCommandKind {
    /// Stable display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Produce => "Produce",
            Self::Upgrade => "Upgrade",
            Self::Cancel => "Cancel",
        }
    }
}

/// Class of a skill, which decides when its animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillClass {
    /// Standing still.
    Stop,
    /// Walking.
    Move,
    /// Attacking.
    Attack,
    /// Constructing a building.
    Build,
    /// Gathering resources.
    Harvest,
    /// Repairing.
    Repair,
    /// Dying.
    Die,
    /// Being constructed (buildings).
    BeBuilt,
    /// Producing units (buildings).
    Produce,
    /// Applying an upgrade.
    Upgrade,
}

/// A skill: an animated action a unit can perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Skill name, unique within the unit.
    pub name: String,
    /// Skill class.
    pub class: SkillClass,
    /// Animation speed hint for the renderer.
    #[serde(default)]
    pub speed: i32,
    /// Model files, relative to the unit directory.
    #[serde(default)]
    pub animations: Vec<String>,
    /// Sound files, relative to the unit directory.
    #[serde(default)]
    pub sounds: Vec<String>,
}

/// Core numeric parameters of a unit or building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitParameters {
    /// Maximum hit points.
    pub max_hp: i32,

    /// Hit points regenerated per second while idle.
    #[serde(default)]
    pub hp_regeneration: i32,

    /// Flat armor subtracted from incoming damage.
    #[serde(default)]
    pub armor: i32,

    /// Armor type name (must exist in the tech tree).
    pub armor_type: String,

    /// Footprint size in cells.
    #[serde(default = "default_size")]
    pub size: i32,

    /// Sight range in world units.
    #[serde(default)]
    pub sight: i32,

    /// Movement speed in world units per second (zero for buildings).
    #[serde(default, with = "fixed_decimal")]
    pub move_speed: Fixed,

    /// Attack range in world units.
    #[serde(default, with = "fixed_decimal")]
    pub attack_range: Fixed,

    /// Base attack damage; zero for non-combatants.
    #[serde(default)]
    pub attack_damage: i32,

    /// Attack type name (must exist in the tech tree when damage > 0).
    #[serde(default)]
    pub attack_type: Option<String>,

    /// Attacks per second.
    #[serde(default = "default_rate", with = "fixed_decimal")]
    pub attack_speed: Fixed,

    /// Seconds needed to produce this unit.
    #[serde(default = "default_rate", with = "fixed_decimal")]
    pub production_time: Fixed,
}

/// Default footprint size.
const fn default_size() -> i32 {
    1
}

/// Default rate of one per second.
fn default_rate() -> Fixed {
    Fixed::from_num(1)
}

/// Gathering abilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestParameters {
    /// Resource names this unit can gather.
    pub resources: Vec<String>,
    /// Maximum carried amount before returning.
    pub capacity: u32,
    /// Amount gathered per second.
    #[serde(with = "fixed_decimal")]
    pub rate: Fixed,
}

/// Parameters that make a definition a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureParameters {
    /// Seconds a single builder needs to complete construction.
    #[serde(with = "fixed_decimal")]
    pub build_time: Fixed,

    /// Unit types this building can produce.
    #[serde(default)]
    pub produces: Vec<String>,

    /// Resources that can be delivered to this building.
    #[serde(default)]
    pub stores: Vec<String>,

    /// Building commands offered.
    #[serde(default)]
    pub commands: Vec<BuildingCommandKind>,
}

/// An upgrade that can be applied to a unit or building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeDefinition {
    /// Upgrade name, unique within the definition.
    pub name: String,
    /// Resources consumed when the upgrade starts.
    #[serde(default)]
    pub cost: Vec<ResourceAmount>,
    /// Seconds the upgrade takes.
    #[serde(with = "fixed_decimal")]
    pub duration: Fixed,
    /// Added to max hit points (and current hit points).
    #[serde(default)]
    pub max_hp_bonus: i32,
    /// Added to attack damage.
    #[serde(default)]
    pub attack_damage_bonus: i32,
    /// Added to armor.
    #[serde(default)]
    pub armor_bonus: i32,
}

impl UpgradeDefinition {
    /// Cost map of this upgrade.
    #[must_use]
    pub fn cost_map(&self) -> ResourceCost {
        cost_from_amounts(&self.cost)
    }
}

/// Data-driven unit (or building) definition.
///
/// # Example RON
///
/// ```ron
/// UnitDefinition(
///     parameters: (
///         max_hp: 450,
///         armor: 2,
///         armor_type: "leather",
///         size: 1,
///         sight: 9,
///         move_speed: 5.0,
///         attack_range: 1.5,
///         attack_damage: 10,
///         attack_type: Some("blade"),
///     ),
///     resource_requirements: [(resource: "gold", amount: 75)],
///     commands: [Move, Stop, Attack, AttackMove],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDefinition {
    /// Unit type name (defaults to the unit directory name).
    #[serde(default)]
    pub name: String,

    /// Numeric parameters.
    pub parameters: UnitParameters,

    /// Resources consumed to produce or construct this type.
    #[serde(default)]
    pub resource_requirements: Vec<ResourceAmount>,

    /// Animated skills.
    #[serde(default)]
    pub skills: Vec<SkillDefinition>,

    /// Unit commands offered.
    #[serde(default)]
    pub commands: Vec<UnitCommandKind>,

    /// Building types this unit can construct.
    #[serde(default)]
    pub builds: Vec<String>,

    /// Upgrades available to this type.
    #[serde(default)]
    pub upgrades: Vec<UpgradeDefinition>,

    /// Gathering abilities, if any.
    #[serde(default)]
    pub harvest: Option<HarvestParameters>,

    /// Present for buildings.
    #[serde(default)]
    pub structure: Option<StructureParameters>,

    /// Icon image, relative to the unit directory.
    #[serde(default)]
    pub image: Option<String>,
}

impl UnitDefinition {
    /// Check whether this definition describes a building.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.structure.is_some()
    }

    /// Check whether this unit can attack.
    #[must_use]
    pub fn is_combatant(&self) -> bool {
        self.parameters.attack_damage > 0
    }

    /// Check whether this unit can move.
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.parameters.move_speed > Fixed::ZERO
    }

    /// Check whether the definition offers a unit command.
    #[must_use]
    pub fn has_command(&self, kind: UnitCommandKind) -> bool {
        self.commands.contains(&kind)
    }

    /// Check whether the definition offers a building command.
    #[must_use]
    pub fn has_building_command(&self, kind: BuildingCommandKind) -> bool {
        self.structure
            .as_ref()
            .is_some_and(|s| s.commands.contains(&kind))
    }

    /// Cost map for producing or constructing this type.
    #[must_use]
    pub fn cost(&self) -> ResourceCost {
        cost_from_amounts(&self.resource_requirements)
    }

    /// Find an upgrade by name.
    #[must_use]
    pub fn upgrade(&self, name: &str) -> Option<&UpgradeDefinition> {
        self.upgrades.iter().find(|u| u.name == name)
    }

    /// Check whether this unit can gather a resource.
    #[must_use]
    pub fn can_gather(&self, resource: &str) -> bool {
        self.harvest
            .as_ref()
            .is_some_and(|h| h.resources.iter().any(|r| r == resource))
    }

    /// Check whether this building accepts a resource delivery.
    #[must_use]
    pub fn stores(&self, resource: &str) -> bool {
        self.structure
            .as_ref()
            .is_some_and(|s| s.stores.iter().any(|r| r == resource))
    }

    /// Check whether this building can produce a unit type.
    #[must_use]
    pub fn produces(&self, unit: &str) -> bool {
        self.structure
            .as_ref()
            .is_some_and(|s| s.produces.iter().any(|u| u == unit))
    }

    /// Every model path referenced by skills, deduplicated in first-seen order.
    #[must_use]
    pub fn model_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for path in self.skills.iter().flat_map(|s| s.animations.iter()) {
            if !paths.contains(&path.as_str()) {
                paths.push(path);
            }
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_unit() -> UnitDefinition {
        UnitDefinition {
            name: "worker".to_string(),
            parameters: UnitParameters {
                max_hp: 100,
                hp_regeneration: 1,
                armor: 0,
                armor_type: "leather".to_string(),
                size: 1,
                sight: 8,
                move_speed: Fixed::from_num(3),
                attack_range: Fixed::from_num(1),
                attack_damage: 5,
                attack_type: Some("blade".to_string()),
                attack_speed: Fixed::from_num(1),
                production_time: Fixed::from_num(10),
            },
            resource_requirements: vec![ResourceAmount::new("gold", 50)],
            skills: vec![
                SkillDefinition {
                    name: "stop".to_string(),
                    class: SkillClass::Stop,
                    speed: 100,
                    animations: vec!["models/worker_standing.g3d".to_string()],
                    sounds: vec![],
                },
                SkillDefinition {
                    name: "harvest".to_string(),
                    class: SkillClass::Harvest,
                    speed: 100,
                    animations: vec![
                        "models/worker_standing.g3d".to_string(),
                        "models/worker_harvest.g3d".to_string(),
                    ],
                    sounds: vec![],
                },
            ],
            commands: vec![UnitCommandKind::Move, UnitCommandKind::Gather],
            builds: vec![],
            upgrades: vec![],
            harvest: Some(HarvestParameters {
                resources: vec!["gold".to_string()],
                capacity: 10,
                rate: Fixed::from_num(2),
            }),
            structure: None,
            image: None,
        }
    }

    #[test]
    fn test_capabilities() {
        let unit = create_test_unit();
        assert!(!unit.is_building());
        assert!(unit.is_mobile());
        assert!(unit.is_combatant());
        assert!(unit.has_command(UnitCommandKind::Gather));
        assert!(!unit.has_command(UnitCommandKind::Build));
        assert!(unit.can_gather("gold"));
        assert!(!unit.can_gather("wood"));
    }

    #[test]
    fn test_model_paths_deduplicated() {
        let unit = create_test_unit();
        assert_eq!(
            unit.model_paths(),
            vec!["models/worker_standing.g3d", "models/worker_harvest.g3d"]
        );
    }

    #[test]
    fn test_building_commands_require_structure() {
        let mut unit = create_test_unit();
        assert!(!unit.has_building_command(BuildingCommandKind::Produce));

        unit.structure = Some(StructureParameters {
            build_time: Fixed::from_num(30),
            produces: vec!["worker".to_string()],
            stores: vec!["gold".to_string()],
            commands: vec![BuildingCommandKind::Produce],
        });
        assert!(unit.has_building_command(BuildingCommandKind::Produce));
        assert!(unit.produces("worker"));
        assert!(unit.stores("gold"));
    }
}
