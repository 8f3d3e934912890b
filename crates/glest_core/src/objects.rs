//! Object manager: sole owner of every in-world entity.
//!
//! Units, buildings and resource nodes live in three parallel
//! [`EntityStorage`] collections. Ids come from one monotonic counter
//! shared by all three, so an id identifies exactly one entity for the
//! lifetime of the world and is never handed out twice.
//!
//! Removal is two-phase: [`ObjectManager::destroy`] only flags an entity,
//! and [`ObjectManager::finalize_removals`] drops flagged entities at the
//! end of a tick. Iteration in progress during the tick is never
//! invalidated.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::components::{
    Building, EntityId, EntityKind, EntityRef, PlayerId, ResourceNode, Unit,
};
use crate::data::{Ruleset, UnitDefinition};
use crate::error::{GameError, Result};
use crate::math::{Fixed, Vec3Fixed};

/// Amount placed in a resource node when neither the caller nor the
/// resource definition specifies one.
pub const DEFAULT_NODE_AMOUNT: u32 = 1000;

/// Storage for one kind of entity.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic iteration
/// via sorted keys when processing systems.
#[derive(Debug, Clone)]
pub struct EntityStorage<T> {
    entities: HashMap<EntityId, T>,
}

impl<T> Default for EntityStorage<T> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }
}

impl<T> EntityStorage<T> {
    /// Insert an entity under an already-minted id.
    fn insert(&mut self, id: EntityId, entity: T) {
        self.entities.insert(id, entity);
    }

    /// Remove an entity by id.
    fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    /// Get an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    /// Check if an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Sorted entity ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Entities in ascending id order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&T> {
        self.sorted_ids()
            .into_iter()
            .filter_map(|id| self.entities.get(&id))
            .collect()
    }

    /// Iterate over all entities (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &T)> {
        self.entities.iter()
    }
}

/// Whether a newly placed building starts complete or as a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Fully constructed, at full health (starting buildings).
    #[default]
    Complete,
    /// Construction site at progress zero.
    Site,
}

/// Per-player entity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerObjectCounts {
    /// Units owned.
    pub units: usize,
    /// Buildings owned.
    pub buildings: usize,
}

/// Entity totals by kind and by player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectStats {
    /// Total units.
    pub units: usize,
    /// Total buildings.
    pub buildings: usize,
    /// Total resource nodes.
    pub resource_nodes: usize,
    /// Entities flagged for removal at tick end.
    pub pending_removal: usize,
    /// Counts per owning player.
    pub per_player: BTreeMap<PlayerId, PlayerObjectCounts>,
}

/// Owner of all units, buildings and resource nodes.
#[derive(Debug, Clone)]
pub struct ObjectManager {
    ruleset: Arc<Ruleset>,
    width: i32,
    height: i32,
    owners: BTreeMap<PlayerId, String>,
    units: EntityStorage<Unit>,
    buildings: EntityStorage<Building>,
    nodes: EntityStorage<ResourceNode>,
    pending_removal: BTreeSet<EntityId>,
    next_id: EntityId,
}

impl ObjectManager {
    /// Create an empty manager for a `width` × `height` map.
    #[must_use]
    pub fn new(ruleset: Arc<Ruleset>, width: i32, height: i32) -> Self {
        Self {
            ruleset,
            width,
            height,
            owners: BTreeMap::new(),
            units: EntityStorage::default(),
            buildings: EntityStorage::default(),
            nodes: EntityStorage::default(),
            pending_removal: BTreeSet::new(),
            next_id: 1,
        }
    }

    /// Make a player known so entities can be created for it.
    pub fn register_player(&mut self, player: PlayerId, faction: impl Into<String>) {
        self.owners.insert(player, faction.into());
    }

    /// Definitions shared with the world.
    #[must_use]
    pub fn ruleset(&self) -> &Arc<Ruleset> {
        &self.ruleset
    }

    /// The id the next created entity will receive.
    #[must_use]
    pub const fn next_id(&self) -> EntityId {
        self.next_id
    }

    fn mint_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn definition(&self, player: PlayerId, type_name: &str) -> Result<Arc<UnitDefinition>> {
        let faction = self
            .owners
            .get(&player)
            .ok_or(GameError::InvalidPlayer(player))?;
        self.ruleset
            .unit(faction, type_name)
            .cloned()
            .ok_or_else(|| GameError::InvalidType {
                faction: faction.clone(),
                type_name: type_name.to_string(),
            })
    }

    /// Create a unit owned by `player`.
    ///
    /// # Errors
    ///
    /// `InvalidPlayer` if the player is unknown, `InvalidType` if the
    /// player's faction has no mobile unit of that name.
    pub fn create_unit(
        &mut self,
        player: PlayerId,
        unit_type: &str,
        position: Vec3Fixed,
    ) -> Result<EntityId> {
        let definition = self.definition(player, unit_type)?;
        if definition.is_building() {
            return Err(GameError::InvalidType {
                faction: self.owners.get(&player).cloned().unwrap_or_default(),
                type_name: unit_type.to_string(),
            });
        }
        let id = self.mint_id();
        self.units
            .insert(id, Unit::new(id, player, definition, position));
        tracing::debug!(id, player, unit_type, "Unit created");
        Ok(id)
    }

    /// Create a building owned by `player`, centered on `position`.
    ///
    /// # Errors
    ///
    /// `InvalidPlayer`, `InvalidType` (unknown or not a building), or
    /// `Occupied` when the footprint overlaps another building or a
    /// resource node, or leaves the map.
    pub fn create_building(
        &mut self,
        player: PlayerId,
        building_type: &str,
        position: Vec3Fixed,
        placement: Placement,
    ) -> Result<EntityId> {
        let definition = self.definition(player, building_type)?;
        if !definition.is_building() {
            return Err(GameError::InvalidType {
                faction: self.owners.get(&player).cloned().unwrap_or_default(),
                type_name: building_type.to_string(),
            });
        }
        let half = Fixed::from_num(definition.parameters.size.max(1)) / Fixed::from_num(2);
        if !self.footprint_free(position, half) {
            return Err(GameError::Occupied {
                x: position.x.to_num(),
                z: position.z.to_num(),
            });
        }
        let id = self.mint_id();
        let building = Building::new(
            id,
            player,
            definition,
            position,
            placement == Placement::Complete,
        );
        self.buildings.insert(id, building);
        tracing::debug!(id, player, building_type, ?placement, "Building created");
        Ok(id)
    }

    /// Create a resource node.
    ///
    /// The amount defaults to the resource definition's node amount, then
    /// to [`DEFAULT_NODE_AMOUNT`].
    ///
    /// # Errors
    ///
    /// `InvalidType` if the resource is not defined.
    pub fn create_resource_node(
        &mut self,
        resource: &str,
        position: Vec3Fixed,
        amount: Option<u32>,
    ) -> Result<EntityId> {
        let definition = self
            .ruleset
            .resource(resource)
            .ok_or_else(|| GameError::InvalidType {
                faction: String::new(),
                type_name: resource.to_string(),
            })?;
        let amount = amount
            .or(definition.node_amount)
            .unwrap_or(DEFAULT_NODE_AMOUNT);
        let id = self.mint_id();
        self.nodes.insert(
            id,
            ResourceNode {
                id,
                resource: resource.to_string(),
                position,
                amount,
                initial_amount: amount,
                depleted_seen: false,
            },
        );
        tracing::debug!(id, resource, amount, "Resource node created");
        Ok(id)
    }

    /// Check that a square footprint is on the map and clear of other
    /// buildings and resource nodes.
    #[must_use]
    pub fn footprint_free(&self, center: Vec3Fixed, half: Fixed) -> bool {
        let min_x = center.x - half;
        let max_x = center.x + half;
        let min_z = center.z - half;
        let max_z = center.z + half;
        if min_x < Fixed::ZERO
            || min_z < Fixed::ZERO
            || max_x > Fixed::from_num(self.width)
            || max_z > Fixed::from_num(self.height)
        {
            return false;
        }

        let overlaps_building = self.buildings.iter().any(|(id, b)| {
            if self.pending_removal.contains(id) || !b.is_alive() {
                return false;
            }
            let other = b.half_extent();
            (center.x - b.position.x).abs() < half + other
                && (center.z - b.position.z).abs() < half + other
        });
        if overlaps_building {
            return false;
        }

        let node_half = Fixed::from_num(1) / Fixed::from_num(2);
        !self.nodes.iter().any(|(id, n)| {
            !self.pending_removal.contains(id)
                && (center.x - n.position.x).abs() < half + node_half
                && (center.z - n.position.z).abs() < half + node_half
        })
    }

    /// Flag an entity for removal at the next tick end.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` if no entity has that id.
    pub fn destroy(&mut self, id: EntityId) -> Result<()> {
        if self.kind_of(id).is_none() {
            return Err(GameError::UnknownEntity(id));
        }
        self.pending_removal.insert(id);
        Ok(())
    }

    /// Check whether an entity is flagged for removal.
    #[must_use]
    pub fn is_pending_removal(&self, id: EntityId) -> bool {
        self.pending_removal.contains(&id)
    }

    /// Drop every flagged entity. Returns what was removed, in id order.
    pub fn finalize_removals(&mut self) -> Vec<EntityRef> {
        let pending = std::mem::take(&mut self.pending_removal);
        let mut removed = Vec::with_capacity(pending.len());
        for id in pending {
            if self.units.remove(id).is_some() {
                removed.push(EntityRef {
                    kind: EntityKind::Unit,
                    id,
                });
            } else if self.buildings.remove(id).is_some() {
                removed.push(EntityRef {
                    kind: EntityKind::Building,
                    id,
                });
            } else if self.nodes.remove(id).is_some() {
                removed.push(EntityRef {
                    kind: EntityKind::ResourceNode,
                    id,
                });
            }
        }
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "Entities removed");
        }
        removed
    }

    /// Which collection an id lives in, if any.
    #[must_use]
    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        if self.units.contains(id) {
            Some(EntityKind::Unit)
        } else if self.buildings.contains(id) {
            Some(EntityKind::Building)
        } else if self.nodes.contains(id) {
            Some(EntityKind::ResourceNode)
        } else {
            None
        }
    }

    /// Resolve an id into an entity handle.
    #[must_use]
    pub fn entity_ref(&self, id: EntityId) -> Option<EntityRef> {
        self.kind_of(id).map(|kind| EntityRef { kind, id })
    }

    /// Position of any entity.
    #[must_use]
    pub fn position_of(&self, id: EntityId) -> Option<Vec3Fixed> {
        self.units
            .get(id)
            .map(|u| u.position)
            .or_else(|| self.buildings.get(id).map(|b| b.position))
            .or_else(|| self.nodes.get(id).map(|n| n.position))
    }

    /// Owner of a unit or building.
    #[must_use]
    pub fn owner_of(&self, id: EntityId) -> Option<PlayerId> {
        self.units
            .get(id)
            .map(|u| u.player)
            .or_else(|| self.buildings.get(id).map(|b| b.player))
    }

    /// Check whether a unit or building is alive and not flagged for removal.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        if self.pending_removal.contains(&id) {
            return false;
        }
        self.units.get(id).is_some_and(Unit::is_alive)
            || self.buildings.get(id).is_some_and(Building::is_alive)
    }

    /// Look up a unit.
    #[must_use]
    pub fn get_unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Look up a unit mutably.
    pub fn get_unit_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        self.units.get_mut(id)
    }

    /// Look up a building.
    #[must_use]
    pub fn get_building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(id)
    }

    /// Look up a building mutably.
    pub fn get_building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        self.buildings.get_mut(id)
    }

    /// Look up a resource node.
    #[must_use]
    pub fn get_resource_node(&self, id: EntityId) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Look up a resource node mutably.
    pub fn get_resource_node_mut(&mut self, id: EntityId) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(id)
    }

    /// Units owned by a player, in id order.
    #[must_use]
    pub fn units_for_player(&self, player: PlayerId) -> Vec<&Unit> {
        self.units
            .sorted()
            .into_iter()
            .filter(|u| u.player == player)
            .collect()
    }

    /// Buildings owned by a player, in id order.
    #[must_use]
    pub fn buildings_for_player(&self, player: PlayerId) -> Vec<&Building> {
        self.buildings
            .sorted()
            .into_iter()
            .filter(|b| b.player == player)
            .collect()
    }

    /// Every resource node, in id order.
    #[must_use]
    pub fn all_resource_nodes(&self) -> Vec<&ResourceNode> {
        self.nodes.sorted()
    }

    /// Unit storage.
    #[must_use]
    pub fn units(&self) -> &EntityStorage<Unit> {
        &self.units
    }

    /// Building storage.
    #[must_use]
    pub fn buildings(&self) -> &EntityStorage<Building> {
        &self.buildings
    }

    /// Resource node storage.
    #[must_use]
    pub fn resource_nodes(&self) -> &EntityStorage<ResourceNode> {
        &self.nodes
    }

    /// Take a unit out of storage while its state machine runs.
    pub(crate) fn take_unit(&mut self, id: EntityId) -> Option<Unit> {
        self.units.remove(id)
    }

    /// Put back a unit taken with [`Self::take_unit`].
    pub(crate) fn restore_unit(&mut self, unit: Unit) {
        self.units.insert(unit.id, unit);
    }

    /// Totals by kind and by player.
    #[must_use]
    pub fn stats(&self) -> ObjectStats {
        let mut per_player: BTreeMap<PlayerId, PlayerObjectCounts> = self
            .owners
            .keys()
            .map(|&p| (p, PlayerObjectCounts::default()))
            .collect();
        for (_, unit) in self.units.iter() {
            per_player.entry(unit.player).or_default().units += 1;
        }
        for (_, building) in self.buildings.iter() {
            per_player.entry(building.player).or_default().buildings += 1;
        }
        ObjectStats {
            units: self.units.len(),
            buildings: self.buildings.len(),
            resource_nodes: self.nodes.len(),
            pending_removal: self.pending_removal.len(),
            per_player,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        FactionDefinition, FactionRules, ResourceDefinition, ResourceKind, StructureParameters,
        TechTree, UnitParameters,
    };

    fn definition(name: &str, building: bool) -> Arc<UnitDefinition> {
        Arc::new(UnitDefinition {
            name: name.to_string(),
            parameters: UnitParameters {
                max_hp: 100,
                hp_regeneration: 0,
                armor: 0,
                armor_type: "leather".to_string(),
                size: if building { 2 } else { 1 },
                sight: 5,
                move_speed: if building { Fixed::ZERO } else { Fixed::from_num(2) },
                attack_range: Fixed::ZERO,
                attack_damage: 0,
                attack_type: None,
                attack_speed: Fixed::from_num(1),
                production_time: Fixed::from_num(1),
            },
            resource_requirements: vec![],
            skills: vec![],
            commands: vec![],
            builds: vec![],
            upgrades: vec![],
            harvest: None,
            structure: building.then(|| StructureParameters {
                build_time: Fixed::from_num(10),
                produces: vec![],
                stores: vec![],
                commands: vec![],
            }),
            image: None,
        })
    }

    fn manager() -> ObjectManager {
        let faction = Arc::new(FactionDefinition {
            name: "magic".to_string(),
            ..Default::default()
        });
        let ruleset = Ruleset::new(
            Arc::new(TechTree::default()),
            vec![Arc::new(ResourceDefinition::new("gold", ResourceKind::Tech))],
            vec![FactionRules::new(
                faction,
                vec![definition("initiate", false), definition("tower", true)],
            )],
        );
        let mut objects = ObjectManager::new(Arc::new(ruleset), 64, 64);
        objects.register_player(1, "magic");
        objects
    }

    #[test]
    fn test_ids_unique_across_kinds() {
        let mut objects = manager();
        let unit = objects
            .create_unit(1, "initiate", Vec3Fixed::from_ints(1, 0, 1))
            .unwrap();
        let building = objects
            .create_building(1, "tower", Vec3Fixed::from_ints(10, 0, 10), Placement::Complete)
            .unwrap();
        let node = objects
            .create_resource_node("gold", Vec3Fixed::from_ints(20, 0, 20), Some(50))
            .unwrap();

        assert_eq!(vec![unit, building, node], vec![1, 2, 3]);
        assert_eq!(objects.kind_of(building), Some(EntityKind::Building));
        assert_eq!(objects.next_id(), 4);
    }

    #[test]
    fn test_create_errors() {
        let mut objects = manager();
        assert_eq!(
            objects.create_unit(9, "initiate", Vec3Fixed::ZERO),
            Err(GameError::InvalidPlayer(9))
        );
        assert!(matches!(
            objects.create_unit(1, "golem", Vec3Fixed::ZERO),
            Err(GameError::InvalidType { .. })
        ));
        assert!(matches!(
            objects.create_unit(1, "tower", Vec3Fixed::ZERO),
            Err(GameError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_building_overlap_is_occupied() {
        let mut objects = manager();
        objects
            .create_building(1, "tower", Vec3Fixed::from_ints(10, 0, 10), Placement::Complete)
            .unwrap();
        let overlap =
            objects.create_building(1, "tower", Vec3Fixed::from_ints(11, 0, 10), Placement::Site);
        assert!(matches!(overlap, Err(GameError::Occupied { .. })));

        let off_map =
            objects.create_building(1, "tower", Vec3Fixed::from_ints(0, 0, 0), Placement::Site);
        assert!(matches!(off_map, Err(GameError::Occupied { .. })));

        // Adjacent footprints touch but do not overlap.
        assert!(objects
            .create_building(1, "tower", Vec3Fixed::from_ints(12, 0, 10), Placement::Site)
            .is_ok());
    }

    #[test]
    fn test_destroy_is_deferred_and_ids_not_reused() {
        let mut objects = manager();
        let id = objects
            .create_unit(1, "initiate", Vec3Fixed::ZERO)
            .unwrap();
        objects.destroy(id).unwrap();
        assert!(objects.get_unit(id).is_some());
        assert!(!objects.is_alive(id));

        let removed = objects.finalize_removals();
        assert_eq!(removed.len(), 1);
        assert!(objects.get_unit(id).is_none());

        let next = objects
            .create_unit(1, "initiate", Vec3Fixed::ZERO)
            .unwrap();
        assert!(next > id);
        assert_eq!(objects.destroy(id), Err(GameError::UnknownEntity(id)));
    }

    #[test]
    fn test_player_queries_sorted() {
        let mut objects = manager();
        objects.register_player(2, "magic");
        let a = objects.create_unit(1, "initiate", Vec3Fixed::ZERO).unwrap();
        objects.create_unit(2, "initiate", Vec3Fixed::ZERO).unwrap();
        let c = objects.create_unit(1, "initiate", Vec3Fixed::ZERO).unwrap();

        let ids: Vec<_> = objects.units_for_player(1).iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![a, c]);

        let stats = objects.stats();
        assert_eq!(stats.units, 3);
        assert_eq!(stats.per_player[&1].units, 2);
        assert_eq!(stats.per_player[&2].units, 1);
    }
}
