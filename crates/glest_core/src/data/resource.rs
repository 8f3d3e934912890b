//! Resource definitions and resource amounts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a resource behaves over the course of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Capacity-style resource (housing); not gathered.
    Static,
    /// Gathered from resource nodes and spent on production.
    Tech,
    /// Consumed periodically by living units (food).
    Consumable,
    /// Produced or decays with game time.
    TimeDependent,
}

/// Immutable definition of one resource type.
///
/// # Example RON
///
/// ```ron
/// ResourceDefinition(
///     kind: Tech,
///     default_amount: Some(0),
///     node_amount: Some(1500),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Unique resource name (defaults to the file stem).
    #[serde(default)]
    pub name: String,

    /// Resource behaviour.
    pub kind: ResourceKind,

    /// Amount every player starts with unless the faction overrides it.
    #[serde(default)]
    pub default_amount: Option<i64>,

    /// Amount regenerated per second of game time.
    #[serde(default)]
    pub regeneration: Option<i64>,

    /// Fraction of spent amounts refunded when an item is cancelled.
    #[serde(default)]
    pub recoup: Option<f32>,

    /// Amount held by a freshly placed resource node of this type.
    #[serde(default)]
    pub node_amount: Option<u32>,
}

impl ResourceDefinition {
    /// Create a resource definition with no optional fields set.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default_amount: None,
            regeneration: None,
            recoup: None,
            node_amount: None,
        }
    }

    /// Check whether nodes of this resource can be gathered.
    #[must_use]
    pub fn is_gatherable(&self) -> bool {
        self.kind == ResourceKind::Tech
    }
}

/// A `(resource-name, amount)` pair as written in definition files.
///
/// Amounts are signed so that the validator can report negative values
/// instead of the parser rejecting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAmount {
    /// Resource name.
    pub resource: String,
    /// Amount (starting stock or cost).
    pub amount: i64,
}

impl ResourceAmount {
    /// Create a new resource amount.
    #[must_use]
    pub fn new(resource: impl Into<String>, amount: i64) -> Self {
        Self {
            resource: resource.into(),
            amount,
        }
    }
}

/// A cost map: resource name → amount, ordered for deterministic iteration.
pub type ResourceCost = BTreeMap<String, u32>;

/// Collapse a list of definition amounts into a cost map.
///
/// Non-positive amounts contribute nothing; duplicated names are summed.
#[must_use]
pub fn cost_from_amounts(amounts: &[ResourceAmount]) -> ResourceCost {
    let mut cost = ResourceCost::new();
    for entry in amounts.iter().filter(|a| a.amount > 0) {
        let amount = u32::try_from(entry.amount).unwrap_or(u32::MAX);
        let slot = cost.entry(entry.resource.clone()).or_insert(0);
        *slot = slot.saturating_add(amount);
    }
    cost
}
