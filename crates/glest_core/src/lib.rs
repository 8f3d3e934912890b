//! # Glest Core
//!
//! Deterministic simulation core for a Glest-style real-time strategy game.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO
//! - No threads
//! - No floating-point math in the tick (uses fixed-point)
//!
//! Content packs are loaded by `glest_assets` and handed to a [`world::World`]
//! as a shared [`data::Ruleset`]. The headless controller in `glest_headless`
//! owns the world and drives its tick.
//!
//! ## Crate Structure
//!
//! - [`data`] - Definition types (tech tree, resources, factions, units)
//! - [`components`] - Units, buildings, resource nodes and players
//! - [`objects`] - Object manager: ids, creation, deferred removal
//! - [`commands`] - Command types, validation and queueing
//! - [`systems`] - Per-tick unit, production and damage systems
//! - [`world`] - The world and its tick loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod commands;
pub mod components;
pub mod data;
pub mod error;
pub mod events;
pub mod fog;
pub mod math;
pub mod objects;
pub mod systems;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commands::{BuildingCommand, Command, UnitCommand, UnitOrder};
    pub use crate::components::{
        Building, EntityId, EntityKind, EntityRef, Player, PlayerId, ResourceNode, Unit, UnitState,
        MAX_QUEUE_LEN,
    };
    pub use crate::data::{
        FactionDefinition, FactionRules, ResourceCost, ResourceDefinition, Ruleset, TechTree,
        UnitDefinition,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::events::{GameEvent, GameEventKind};
    pub use crate::math::{Fixed, Vec3Fixed};
    pub use crate::objects::Placement;
    pub use crate::world::{PlayerSetup, World, WorldSettings, WorldStats, TICK_RATE};
}
