//! Immutable bundle of every definition a world needs.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::faction::FactionDefinition;
use super::resource::ResourceDefinition;
use super::tech_tree::TechTree;
use super::unit::UnitDefinition;

/// A faction header together with its unit definitions.
#[derive(Debug, Clone)]
pub struct FactionRules {
    /// Faction header.
    pub definition: Arc<FactionDefinition>,
    /// Unit and building definitions, keyed by type name.
    pub units: BTreeMap<String, Arc<UnitDefinition>>,
}

impl FactionRules {
    /// Bundle a faction header with its unit definitions.
    #[must_use]
    pub fn new(definition: Arc<FactionDefinition>, units: Vec<Arc<UnitDefinition>>) -> Self {
        let units = units.into_iter().map(|u| (u.name.clone(), u)).collect();
        Self { definition, units }
    }
}

/// Shared-immutable definitions for one game.
///
/// Built once from a loaded content pack and shared via `Arc` by the
/// world, the object manager and any observer.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    tech_tree: Arc<TechTree>,
    resources: BTreeMap<String, Arc<ResourceDefinition>>,
    factions: BTreeMap<String, FactionRules>,
}

impl Ruleset {
    /// Create a ruleset from its parts.
    #[must_use]
    pub fn new(
        tech_tree: Arc<TechTree>,
        resources: Vec<Arc<ResourceDefinition>>,
        factions: Vec<FactionRules>,
    ) -> Self {
        Self {
            tech_tree,
            resources: resources
                .into_iter()
                .map(|r| (r.name.clone(), r))
                .collect(),
            factions: factions
                .into_iter()
                .map(|f| (f.definition.name.clone(), f))
                .collect(),
        }
    }

    /// The tech tree.
    #[must_use]
    pub fn tech_tree(&self) -> &TechTree {
        &self.tech_tree
    }

    /// Look up a resource definition.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Arc<ResourceDefinition>> {
        self.resources.get(name)
    }

    /// All resource definitions, ordered by name.
    pub fn resources(&self) -> impl Iterator<Item = &Arc<ResourceDefinition>> {
        self.resources.values()
    }

    /// Look up a faction.
    #[must_use]
    pub fn faction(&self, name: &str) -> Option<&FactionRules> {
        self.factions.get(name)
    }

    /// All factions, ordered by name.
    pub fn factions(&self) -> impl Iterator<Item = &FactionRules> {
        self.factions.values()
    }

    /// Look up a unit or building definition within a faction.
    #[must_use]
    pub fn unit(&self, faction: &str, unit: &str) -> Option<&Arc<UnitDefinition>> {
        self.factions.get(faction).and_then(|f| f.units.get(unit))
    }
}
