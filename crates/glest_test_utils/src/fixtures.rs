//! Test fixtures and helpers.
//!
//! Pre-built definitions, rulesets and worlds for consistent testing.

use std::sync::Arc;

use fixed::types::I32F32;
use glest_core::components::PlayerId;
use glest_core::data::{
    BuildingCommandKind, DamageMultiplier, FactionDefinition, FactionRules, HarvestParameters,
    ResourceAmount, ResourceDefinition, ResourceKind, Ruleset, SkillClass, SkillDefinition,
    StartingUnit, StructureParameters, TechTree, UnitCommandKind, UnitDefinition, UnitParameters,
    UpgradeDefinition,
};
use glest_core::math::Vec3Fixed;
use glest_core::world::{PlayerSetup, World, WorldSettings, TICK_RATE};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Seconds per tick at the default tick rate.
#[must_use]
pub fn tick_dt() -> I32F32 {
    I32F32::from_num(1) / I32F32::from_num(TICK_RATE)
}

/// Ground-plane position from floats (for tests only).
#[must_use]
pub fn at(x: f64, z: f64) -> Vec3Fixed {
    Vec3Fixed::ground(fixed_f(x), fixed_f(z))
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

/// Fluent builder for unit and building definitions.
///
/// Starts from a plain mobile unit that can only move and stop.
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    definition: UnitDefinition,
}

impl UnitBuilder {
    /// Start a unit definition with sensible defaults.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            definition: UnitDefinition {
                name: name.to_string(),
                parameters: UnitParameters {
                    max_hp: 100,
                    hp_regeneration: 0,
                    armor: 0,
                    armor_type: "leather".to_string(),
                    size: 1,
                    sight: 8,
                    move_speed: fixed(2),
                    attack_range: I32F32::ZERO,
                    attack_damage: 0,
                    attack_type: None,
                    attack_speed: fixed(1),
                    production_time: fixed(1),
                },
                resource_requirements: Vec::new(),
                skills: Vec::new(),
                commands: vec![UnitCommandKind::Move, UnitCommandKind::Stop],
                builds: Vec::new(),
                upgrades: Vec::new(),
                harvest: None,
                structure: None,
                image: None,
            },
        }
    }

    /// Maximum and starting hit points.
    #[must_use]
    pub fn hp(mut self, max_hp: i32) -> Self {
        self.definition.parameters.max_hp = max_hp;
        self
    }

    /// Hit points regenerated per second while idle.
    #[must_use]
    pub fn regeneration(mut self, per_second: i32) -> Self {
        self.definition.parameters.hp_regeneration = per_second;
        self
    }

    /// Flat armor and armor type.
    #[must_use]
    pub fn armor(mut self, armor: i32, armor_type: &str) -> Self {
        self.definition.parameters.armor = armor;
        self.definition.parameters.armor_type = armor_type.to_string();
        self
    }

    /// Movement speed per second; zero makes the unit immobile.
    #[must_use]
    pub fn speed(mut self, speed: I32F32) -> Self {
        self.definition.parameters.move_speed = speed;
        self
    }

    /// Sight range.
    #[must_use]
    pub fn sight(mut self, sight: i32) -> Self {
        self.definition.parameters.sight = sight;
        self
    }

    /// Footprint size.
    #[must_use]
    pub fn size(mut self, size: i32) -> Self {
        self.definition.parameters.size = size;
        self
    }

    /// Seconds a building needs to produce this unit.
    #[must_use]
    pub fn production_time(mut self, seconds: I32F32) -> Self {
        self.definition.parameters.production_time = seconds;
        self
    }

    /// Give the unit an attack and the fighting commands.
    #[must_use]
    pub fn attack(mut self, damage: i32, attack_type: &str, range: I32F32) -> Self {
        let p = &mut self.definition.parameters;
        p.attack_damage = damage;
        p.attack_type = Some(attack_type.to_string());
        p.attack_range = range;
        self.add_commands(&[
            UnitCommandKind::Attack,
            UnitCommandKind::AttackMove,
            UnitCommandKind::Hold,
            UnitCommandKind::Patrol,
            UnitCommandKind::Guard,
        ])
    }

    /// Attacks per second.
    #[must_use]
    pub fn attack_speed(mut self, per_second: I32F32) -> Self {
        self.definition.parameters.attack_speed = per_second;
        self
    }

    /// Resource requirements.
    #[must_use]
    pub fn cost(mut self, amounts: &[(&str, i64)]) -> Self {
        self.definition.resource_requirements = amounts
            .iter()
            .map(|(r, a)| ResourceAmount::new(*r, *a))
            .collect();
        self
    }

    /// Make the unit a gatherer.
    #[must_use]
    pub fn harvest(mut self, resources: &[&str], capacity: u32, rate: I32F32) -> Self {
        self.definition.harvest = Some(HarvestParameters {
            resources: strings(resources),
            capacity,
            rate,
        });
        self.add_commands(&[UnitCommandKind::Gather, UnitCommandKind::ReturnResources])
    }

    /// Buildings this unit can construct.
    #[must_use]
    pub fn builds(mut self, buildings: &[&str]) -> Self {
        self.definition.builds = strings(buildings);
        self.add_commands(&[UnitCommandKind::Build, UnitCommandKind::Repair])
    }

    /// Turn the definition into an immobile building.
    #[must_use]
    pub fn structure(mut self, build_time: I32F32, produces: &[&str], stores: &[&str]) -> Self {
        self.definition.parameters.move_speed = I32F32::ZERO;
        self.definition.commands.clear();
        let mut commands = Vec::new();
        if !produces.is_empty() {
            commands.extend([BuildingCommandKind::Produce, BuildingCommandKind::Cancel]);
        }
        self.definition.structure = Some(StructureParameters {
            build_time,
            produces: strings(produces),
            stores: strings(stores),
            commands,
        });
        self
    }

    /// Add an upgrade (and the matching command).
    #[must_use]
    pub fn upgrade(mut self, upgrade: UpgradeDefinition) -> Self {
        self.definition.upgrades.push(upgrade);
        self
    }

    /// Add a skill with animation model paths.
    #[must_use]
    pub fn skill(mut self, name: &str, class: SkillClass, animations: &[&str]) -> Self {
        self.definition.skills.push(SkillDefinition {
            name: name.to_string(),
            class,
            speed: 100,
            animations: strings(animations),
            sounds: Vec::new(),
        });
        self
    }

    /// Icon image path.
    #[must_use]
    pub fn image(mut self, path: &str) -> Self {
        self.definition.image = Some(path.to_string());
        self
    }

    fn add_commands(mut self, kinds: &[UnitCommandKind]) -> Self {
        for kind in kinds {
            if !self.definition.commands.contains(kind) {
                self.definition.commands.push(*kind);
            }
        }
        self
    }

    /// Finish the definition.
    #[must_use]
    pub fn build(mut self) -> UnitDefinition {
        if !self.definition.upgrades.is_empty() {
            if let Some(structure) = &mut self.definition.structure {
                if !structure.commands.contains(&BuildingCommandKind::Upgrade) {
                    structure.commands.push(BuildingCommandKind::Upgrade);
                }
                if !structure.commands.contains(&BuildingCommandKind::Cancel) {
                    structure.commands.push(BuildingCommandKind::Cancel);
                }
            } else {
                self = self.add_commands(&[UnitCommandKind::Upgrade]);
            }
        }
        self.definition
    }

    /// Finish the definition behind an `Arc`.
    #[must_use]
    pub fn shared(self) -> Arc<UnitDefinition> {
        Arc::new(self.build())
    }
}

/// An upgrade definition.
#[must_use]
pub fn upgrade(name: &str, cost: &[(&str, i64)], duration: I32F32) -> UpgradeDefinition {
    UpgradeDefinition {
        name: name.to_string(),
        cost: cost.iter().map(|(r, a)| ResourceAmount::new(*r, *a)).collect(),
        duration,
        max_hp_bonus: 0,
        attack_damage_bonus: 0,
        armor_bonus: 0,
    }
}

/// A tech tree with the given types and explicit multipliers.
#[must_use]
pub fn tech_tree(
    name: &str,
    attack_types: &[&str],
    armor_types: &[&str],
    multipliers: &[(&str, &str, f32)],
) -> TechTree {
    TechTree {
        name: name.to_string(),
        description: String::new(),
        attack_types: strings(attack_types),
        armor_types: strings(armor_types),
        damage_multipliers: multipliers
            .iter()
            .map(|(attack, armor, value)| DamageMultiplier {
                attack: (*attack).to_string(),
                armor: (*armor).to_string(),
                value: *value,
            })
            .collect(),
    }
}

/// A gatherable resource with a default amount and node size.
#[must_use]
pub fn tech_resource(name: &str, default_amount: i64, node_amount: u32) -> ResourceDefinition {
    ResourceDefinition {
        default_amount: Some(default_amount),
        node_amount: Some(node_amount),
        ..ResourceDefinition::new(name, ResourceKind::Tech)
    }
}

// =============================================================================
// Skirmish ruleset: small numbers, easy to reason about in simulation tests
// =============================================================================

/// Faction name of [`skirmish_ruleset`].
pub const SKIRMISH: &str = "skirmish";

/// Tech tree shared by the skirmish fixtures.
#[must_use]
pub fn skirmish_tech_tree() -> TechTree {
    tech_tree(
        "skirmish",
        &["blade", "arrow"],
        &["leather", "stone"],
        &[("blade", "leather", 1.0), ("arrow", "stone", 0.5)],
    )
}

/// Unit and building definitions of the skirmish faction.
///
/// - `runner`: speed 5, cannot fight
/// - `swordsman`: 10 blade damage, one attack per second, range 2
/// - `archer`: 6 arrow damage, range 6, sight 10
/// - `dummy`: 30 hp, 2 leather armor, immobile, cannot fight
/// - `worker`: gathers gold (capacity 10, 5 per second), builds `depot` and `tower`, costs 50 gold
/// - `depot`: 2×2 building, stores gold, produces `worker`, 5 s build, `fortify` upgrade
/// - `tower`: 1000 gold, more than a player ever starts with
#[must_use]
pub fn skirmish_units() -> Vec<Arc<UnitDefinition>> {
    vec![
        UnitBuilder::new("runner").hp(50).speed(fixed(5)).shared(),
        UnitBuilder::new("swordsman")
            .hp(100)
            .speed(fixed(2))
            .attack(10, "blade", fixed(2))
            .shared(),
        UnitBuilder::new("archer")
            .hp(60)
            .sight(10)
            .speed(fixed(2))
            .attack(6, "arrow", fixed(6))
            .shared(),
        UnitBuilder::new("dummy")
            .hp(30)
            .armor(2, "leather")
            .speed(I32F32::ZERO)
            .shared(),
        UnitBuilder::new("worker")
            .hp(40)
            .speed(fixed(2))
            .cost(&[("gold", 50)])
            .harvest(&["gold"], 10, fixed(5))
            .builds(&["depot", "tower"])
            .production_time(fixed(2))
            .upgrade(UpgradeDefinition {
                max_hp_bonus: 10,
                ..upgrade("toughness", &[("gold", 20)], fixed(1))
            })
            .shared(),
        UnitBuilder::new("depot")
            .hp(200)
            .armor(1, "stone")
            .size(2)
            .cost(&[("gold", 100)])
            .structure(fixed(5), &["worker"], &["gold"])
            .upgrade(UpgradeDefinition {
                max_hp_bonus: 100,
                armor_bonus: 2,
                ..upgrade("fortify", &[("gold", 50)], fixed(2))
            })
            .shared(),
        UnitBuilder::new("tower")
            .hp(500)
            .armor(3, "stone")
            .cost(&[("gold", 1000)])
            .structure(fixed(20), &[], &[])
            .shared(),
    ]
}

/// A one-faction ruleset for simulation tests. Players start with 200 gold.
#[must_use]
pub fn skirmish_ruleset() -> Ruleset {
    Ruleset::new(
        Arc::new(skirmish_tech_tree()),
        vec![Arc::new(tech_resource("gold", 200, 100))],
        vec![FactionRules::new(
            Arc::new(FactionDefinition {
                name: SKIRMISH.to_string(),
                starting_resources: vec![ResourceAmount::new("gold", 200)],
                starting_units: vec![
                    StartingUnit::new("depot", 1),
                    StartingUnit::new("worker", 2),
                ],
                ..Default::default()
            }),
            skirmish_units(),
        )],
    )
}

/// A 64×64 skirmish world with two players on different teams.
///
/// # Panics
///
/// Panics if the fixture ruleset is broken.
#[must_use]
pub fn skirmish_world() -> (World, PlayerId, PlayerId) {
    skirmish_world_with(WorldSettings::with_size(64, 64))
}

/// A skirmish world with custom settings and two players on different teams.
///
/// # Panics
///
/// Panics if the fixture ruleset is broken.
#[must_use]
pub fn skirmish_world_with(settings: WorldSettings) -> (World, PlayerId, PlayerId) {
    let mut world = World::new(Arc::new(skirmish_ruleset()), settings);
    let red = world
        .add_player(PlayerSetup::new("red", SKIRMISH))
        .expect("skirmish faction exists");
    let blue = world
        .add_player(PlayerSetup::new("blue", SKIRMISH).ai())
        .expect("skirmish faction exists");
    (world, red, blue)
}

/// Run `ticks` ticks at the default rate, collecting every event.
pub fn run_ticks(world: &mut World, ticks: u32) -> Vec<glest_core::events::GameEvent> {
    let dt = tick_dt();
    (0..ticks).flat_map(|_| world.update(dt)).collect()
}

// =============================================================================
// Magic faction: mirrors a classic content pack's starting setup
// =============================================================================

/// Name of the magic faction.
pub const MAGIC: &str = "magic";

/// Starting resources of the magic faction.
pub const MAGIC_STARTING_RESOURCES: [(&str, i64); 4] =
    [("gold", 500), ("wood", 400), ("stone", 400), ("energy", 1)];

/// Starting units of the magic faction.
pub const MAGIC_STARTING_UNITS: [(&str, i32); 7] = [
    ("mage_tower", 1),
    ("energy_source", 1),
    ("initiate", 3),
    ("battlemage", 1),
    ("summoner", 1),
    ("daemon", 1),
    ("golem", 1),
];

/// Tech tree of the classic pack.
#[must_use]
pub fn classic_tech_tree() -> TechTree {
    tech_tree(
        "megapack",
        &["blade", "arrow", "magic", "siege"],
        &["leather", "wood", "stone", "organic"],
        &[
            ("blade", "leather", 1.0),
            ("arrow", "stone", 0.5),
            ("magic", "stone", 0.75),
            ("siege", "stone", 2.0),
            ("siege", "organic", 0.5),
        ],
    )
}

/// Resources of the classic pack.
#[must_use]
pub fn classic_resources() -> Vec<ResourceDefinition> {
    vec![
        tech_resource("gold", 0, 1500),
        tech_resource("wood", 0, 1000),
        tech_resource("stone", 0, 1200),
        ResourceDefinition {
            default_amount: Some(0),
            ..ResourceDefinition::new("energy", ResourceKind::Static)
        },
    ]
}

/// The magic faction header.
#[must_use]
pub fn magic_faction() -> FactionDefinition {
    FactionDefinition {
        name: MAGIC.to_string(),
        starting_resources: MAGIC_STARTING_RESOURCES
            .iter()
            .map(|(r, a)| ResourceAmount::new(*r, *a))
            .collect(),
        starting_units: MAGIC_STARTING_UNITS
            .iter()
            .map(|(u, c)| StartingUnit::new(*u, *c))
            .collect(),
        music: None,
        ai_hints: glest_core::data::AiHints {
            worker_units: vec!["initiate".to_string()],
            warrior_units: strings(&["battlemage", "daemon", "golem"]),
            upgrades: Vec::new(),
        },
    }
}

fn animated(builder: UnitBuilder, name: &str) -> UnitBuilder {
    let standing = format!("models/{name}_standing.g3d");
    let walking = format!("models/{name}_walking.g3d");
    builder
        .skill("stop_skill", SkillClass::Stop, &[&standing])
        .skill("move_skill", SkillClass::Move, &[&walking])
}

/// Unit and building definitions of the magic faction.
///
/// Every definition references `models/<name>_standing.g3d` and
/// `models/<name>_walking.g3d`, which [`crate::pack::write_magic_pack`] writes.
#[must_use]
pub fn magic_units() -> Vec<UnitDefinition> {
    vec![
        animated(
            UnitBuilder::new("mage_tower")
                .hp(3000)
                .armor(10, "stone")
                .size(4)
                .sight(10)
                .cost(&[("gold", 500), ("wood", 200)])
                .structure(fixed(60), &["initiate", "battlemage", "summoner"], &["gold", "wood", "stone"]),
            "mage_tower",
        )
        .build(),
        animated(
            UnitBuilder::new("energy_source")
                .hp(1000)
                .armor(5, "stone")
                .size(2)
                .sight(6)
                .cost(&[("gold", 150), ("stone", 100)])
                .structure(fixed(30), &[], &[]),
            "energy_source",
        )
        .build(),
        animated(
            UnitBuilder::new("initiate")
                .hp(400)
                .armor(0, "leather")
                .speed(fixed(2))
                .cost(&[("gold", 75)])
                .harvest(&["gold", "wood", "stone"], 10, fixed(1))
                .builds(&["mage_tower", "energy_source"])
                .image("images/initiate.bmp"),
            "initiate",
        )
        .build(),
        animated(
            UnitBuilder::new("battlemage")
                .hp(450)
                .armor(0, "leather")
                .speed(fixed_f(2.5))
                .attack(60, "magic", fixed(6))
                .cost(&[("gold", 125), ("energy", 1)]),
            "battlemage",
        )
        .build(),
        animated(
            UnitBuilder::new("summoner")
                .hp(300)
                .armor(0, "leather")
                .speed(fixed(2))
                .attack(40, "magic", fixed(5))
                .cost(&[("gold", 100), ("energy", 1)]),
            "summoner",
        )
        .build(),
        animated(
            UnitBuilder::new("daemon")
                .hp(500)
                .armor(5, "organic")
                .speed(fixed(4))
                .attack(90, "blade", fixed_f(1.5))
                .cost(&[("gold", 150), ("energy", 2)]),
            "daemon",
        )
        .build(),
        animated(
            UnitBuilder::new("golem")
                .hp(1200)
                .armor(20, "stone")
                .speed(fixed_f(1.5))
                .attack(120, "siege", fixed_f(1.5))
                .cost(&[("gold", 200), ("stone", 150), ("energy", 3)]),
            "golem",
        )
        .build(),
    ]
}

/// The classic pack with only the magic faction, as an in-memory ruleset.
#[must_use]
pub fn magic_ruleset() -> Ruleset {
    Ruleset::new(
        Arc::new(classic_tech_tree()),
        classic_resources().into_iter().map(Arc::new).collect(),
        vec![FactionRules::new(
            Arc::new(magic_faction()),
            magic_units().into_iter().map(Arc::new).collect(),
        )],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skirmish_ruleset_lookup() {
        let ruleset = skirmish_ruleset();
        let depot = ruleset.unit(SKIRMISH, "depot").unwrap();
        assert!(depot.is_building());
        assert!(depot.produces("worker"));
        assert!(depot.has_building_command(BuildingCommandKind::Upgrade));

        let worker = ruleset.unit(SKIRMISH, "worker").unwrap();
        assert!(worker.has_command(UnitCommandKind::Gather));
        assert!(worker.has_command(UnitCommandKind::Upgrade));
        assert!(!worker.is_building());
    }

    #[test]
    fn test_magic_ruleset_has_starting_units() {
        let ruleset = magic_ruleset();
        for (unit, _) in MAGIC_STARTING_UNITS {
            assert!(ruleset.unit(MAGIC, unit).is_some(), "missing {unit}");
        }
    }
}
