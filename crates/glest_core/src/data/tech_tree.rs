//! Tech tree: attack types, armor types and the damage multiplier table.

use serde::{Deserialize, Serialize};

use crate::math::Fixed;

/// One entry of the sparse damage multiplier table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageMultiplier {
    /// Attack type name.
    pub attack: String,
    /// Armor type name.
    pub armor: String,
    /// Multiplier applied to base damage.
    pub value: f32,
}

/// Global table of attack types, armor types and their damage multipliers.
///
/// Immutable after load and shared by every faction in a pack.
///
/// # Example RON
///
/// ```ron
/// TechTree(
///     description: "Classic pack",
///     attack_types: ["blade", "arrow", "magic"],
///     armor_types: ["leather", "wood", "stone"],
///     damage_multipliers: [
///         (attack: "arrow", armor: "stone", value: 0.5),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechTree {
    /// Pack name (defaults to the pack directory name).
    #[serde(default)]
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Ordered, unique attack type names.
    pub attack_types: Vec<String>,

    /// Ordered, unique armor type names.
    pub armor_types: Vec<String>,

    /// Sparse (attack, armor) → multiplier table.
    #[serde(default)]
    pub damage_multipliers: Vec<DamageMultiplier>,
}

impl TechTree {
    /// Check whether an attack type is defined.
    #[must_use]
    pub fn has_attack_type(&self, name: &str) -> bool {
        self.attack_types.iter().any(|a| a == name)
    }

    /// Check whether an armor type is defined.
    #[must_use]
    pub fn has_armor_type(&self, name: &str) -> bool {
        self.armor_types.iter().any(|a| a == name)
    }

    /// Look up the damage multiplier for an (attack, armor) pair.
    ///
    /// Returns `None` when either type is not defined. A defined pair
    /// without an explicit entry deals full damage (1.0).
    #[must_use]
    pub fn damage_multiplier(&self, attack: &str, armor: &str) -> Option<Fixed> {
        if !self.has_attack_type(attack) || !self.has_armor_type(armor) {
            return None;
        }
        let value = self
            .damage_multipliers
            .iter()
            .find(|m| m.attack == attack && m.armor == armor)
            .map_or(1.0, |m| m.value);
        Some(Fixed::from_num(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_tree() -> TechTree {
        TechTree {
            name: "test".to_string(),
            description: String::new(),
            attack_types: vec!["blade".to_string(), "arrow".to_string()],
            armor_types: vec!["leather".to_string(), "stone".to_string()],
            damage_multipliers: vec![DamageMultiplier {
                attack: "arrow".to_string(),
                armor: "stone".to_string(),
                value: 0.5,
            }],
        }
    }

    #[test]
    fn test_explicit_multiplier() {
        let tree = create_test_tree();
        assert_eq!(
            tree.damage_multiplier("arrow", "stone"),
            Some(Fixed::from_num(0.5))
        );
    }

    #[test]
    fn test_missing_pair_defaults_to_one() {
        let tree = create_test_tree();
        assert_eq!(
            tree.damage_multiplier("blade", "leather"),
            Some(Fixed::from_num(1))
        );
    }

    #[test]
    fn test_unknown_type_fails_lookup() {
        let tree = create_test_tree();
        assert_eq!(tree.damage_multiplier("laser", "leather"), None);
        assert_eq!(tree.damage_multiplier("blade", "plate"), None);
    }
}
