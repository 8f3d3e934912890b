//! Faction header definition: starting conditions and AI hints.

use serde::{Deserialize, Serialize};

use super::resource::ResourceAmount;

/// A starting placement of `count` copies of a unit or building type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingUnit {
    /// Unit type name (a directory under the faction's `units/`).
    pub unit: String,
    /// Number of copies placed at game start.
    pub count: i32,
}

impl StartingUnit {
    /// Create a new starting placement.
    #[must_use]
    pub fn new(unit: impl Into<String>, count: i32) -> Self {
        Self {
            unit: unit.into(),
            count,
        }
    }
}

/// Advisory hints for computer players. The simulation never reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiHints {
    /// Units the AI should use for gathering.
    #[serde(default)]
    pub worker_units: Vec<String>,
    /// Units the AI should use for fighting.
    #[serde(default)]
    pub warrior_units: Vec<String>,
    /// Upgrades the AI should research, in order.
    #[serde(default)]
    pub upgrades: Vec<String>,
}

/// Faction header: everything about a faction except its unit definitions.
///
/// # Example RON
///
/// ```ron
/// FactionDefinition(
///     starting_resources: [
///         (resource: "gold", amount: 500),
///         (resource: "wood", amount: 400),
///     ],
///     starting_units: [
///         (unit: "mage_tower", count: 1),
///         (unit: "initiate", count: 3),
///     ],
///     music: Some("music/magic.ogg"),
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionDefinition {
    /// Faction name (defaults to the faction directory name).
    #[serde(default)]
    pub name: String,

    /// Resources each player of this faction starts with.
    #[serde(default)]
    pub starting_resources: Vec<ResourceAmount>,

    /// Units and buildings placed at game start.
    #[serde(default)]
    pub starting_units: Vec<StartingUnit>,

    /// Background music reference.
    #[serde(default)]
    pub music: Option<String>,

    /// Advisory AI hints.
    #[serde(default)]
    pub ai_hints: AiHints,
}

impl FactionDefinition {
    /// Starting amount of a resource, if the faction lists it.
    #[must_use]
    pub fn starting_amount(&self, resource: &str) -> Option<i64> {
        self.starting_resources
            .iter()
            .find(|r| r.resource == resource)
            .map(|r| r.amount)
    }

    /// Total number of entities placed at game start.
    #[must_use]
    pub fn starting_population(&self) -> i32 {
        self.starting_units.iter().map(|u| u.count.max(0)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_amount_lookup() {
        let faction = FactionDefinition {
            name: "magic".to_string(),
            starting_resources: vec![ResourceAmount::new("gold", 500)],
            ..Default::default()
        };
        assert_eq!(faction.starting_amount("gold"), Some(500));
        assert_eq!(faction.starting_amount("wood"), None);
    }

    #[test]
    fn test_starting_population_ignores_negative_counts() {
        let faction = FactionDefinition {
            starting_units: vec![StartingUnit::new("initiate", 3), StartingUnit::new("golem", -1)],
            ..Default::default()
        };
        assert_eq!(faction.starting_population(), 3);
    }
}
