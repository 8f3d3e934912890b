//! Damage calculation and target selection.

use crate::components::{EntityId, EntityRef, PlayerId, UnitStats};
use crate::data::TechTree;
use crate::math::Fixed;

/// Damage queued during unit processing and applied after every unit has acted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDamage {
    /// Attacking unit.
    pub attacker: EntityId,
    /// Owner of the attacker.
    pub attacker_player: PlayerId,
    /// Unit or building hit.
    pub target: EntityRef,
    /// Final damage after multipliers and armor.
    pub amount: i32,
}

/// Calculate final damage after applying the attack/armor multiplier and flat armor.
///
/// The damage calculation follows these steps:
/// 1. Multiply base damage by the tech-tree multiplier (unknown pairs count as 1.0)
/// 2. Truncate toward zero and subtract flat armor
/// 3. Ensure minimum 1 damage, even for a zero multiplier
///
/// All calculations use fixed-point math for determinism.
#[must_use]
pub fn calculate_damage(base_damage: i32, multiplier: Option<Fixed>, armor: i32) -> i32 {
    let multiplier = multiplier.unwrap_or_else(|| Fixed::from_num(1));

    let modified: i32 = (Fixed::from_num(base_damage.max(0)) * multiplier)
        .floor()
        .to_num();
    (modified - armor).max(1)
}

/// Damage one attack of `attacker` deals to a target with the given armor.
#[must_use]
pub fn damage_against(tech_tree: &TechTree, attacker: &UnitStats, armor_type: &str, armor: i32) -> i32 {
    let multiplier = attacker
        .attack_type
        .as_deref()
        .and_then(|attack| tech_tree.damage_multiplier(attack, armor_type));
    calculate_damage(attacker.attack_damage, multiplier, armor)
}

/// A potential target seen by a unit looking for something to attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Entity id.
    pub id: EntityId,
    /// Current hit points.
    pub hp: i32,
}

/// Pick the candidate with the lowest hit points, ties broken by smallest id.
#[must_use]
pub fn select_target(candidates: impl IntoIterator<Item = Candidate>) -> Option<EntityId> {
    candidates
        .into_iter()
        .min_by_key(|c| (c.hp, c.id))
        .map(|c| c.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_formula() {
        // 10 blade vs 2 leather armor at 1.0
        assert_eq!(calculate_damage(10, Some(Fixed::from_num(1)), 2), 8);
        // Multiplier applied before armor, result truncated.
        assert_eq!(calculate_damage(10, Some(Fixed::from_num(1.55)), 3), 12);
    }

    #[test]
    fn test_minimum_damage() {
        assert_eq!(calculate_damage(3, Some(Fixed::from_num(1)), 50), 1);
        assert_eq!(calculate_damage(3, Some(Fixed::ZERO), 0), 1);
        assert_eq!(calculate_damage(10, Some(Fixed::ZERO), 0), 1);
    }

    #[test]
    fn test_unknown_multiplier_counts_as_one() {
        assert_eq!(calculate_damage(10, None, 0), 10);
    }

    #[test]
    fn test_target_selection_lowest_hp_then_id() {
        let picked = select_target([
            Candidate { id: 7, hp: 20 },
            Candidate { id: 5, hp: 10 },
            Candidate { id: 3, hp: 10 },
        ]);
        assert_eq!(picked, Some(3));
        assert_eq!(select_target([]), None);
    }
}
