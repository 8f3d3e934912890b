//! Data structures for content-pack definitions.
//!
//! This module contains pure data structures that define the tech tree,
//! resources, factions and unit types of a content pack. All structs are
//! designed to be deserialized from RON files.
//!
//! **Note:** This module contains no IO - it only defines data types.
//! File loading is handled by `glest_assets`; cross-reference checking is
//! handled by `glest_tools`.

mod faction;
mod resource;
mod ruleset;
mod tech_tree;
mod unit;

pub use faction::{AiHints, FactionDefinition, StartingUnit};
pub use resource::{
    cost_from_amounts, ResourceAmount, ResourceCost, ResourceDefinition, ResourceKind,
};
pub use ruleset::{FactionRules, Ruleset};
pub use tech_tree::{DamageMultiplier, TechTree};
pub use unit::{
    BuildingCommandKind, HarvestParameters, SkillClass, SkillDefinition, StructureParameters,
    UnitCommandKind, UnitDefinition, UnitParameters, UpgradeDefinition,
};

/// Resource names every classic content pack is expected to define.
pub const WELL_KNOWN_RESOURCES: [&str; 4] = ["gold", "wood", "stone", "energy"];
