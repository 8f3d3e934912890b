//! Per-tick systems.
//!
//! Each function advances one part of the world by `dt`. The world
//! calls them in a fixed order (resources, production, units, damage) so
//! that identical inputs always produce identical state.
//!
//! Units are advanced one at a time in ascending id order. A unit
//! performs exactly one step of its head command per tick; when the head
//! changes it is dispatched first, in the same tick.
//!
//! Buildings advance production on their own, but construction progress
//! comes only from builders: every unit building or repairing a site adds
//! `dt / build_time` during its own step, so two builders finish a site in
//! half the time.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::combat::{damage_against, select_target, Candidate, PendingDamage};
use crate::commands::UnitOrder;
use crate::components::{
    Activity, Building, EntityId, EntityKind, EntityRef, PatrolState, Player, PlayerId,
    ProductionKind, Unit, UnitState, UpgradeInProgress,
};
use crate::data::{ResourceCost, Ruleset};
use crate::error::GameError;
use crate::events::GameEvent;
use crate::math::{Fixed, Vec3Fixed};
use crate::objects::{ObjectManager, Placement};
use crate::world::WorldSettings;

/// Distance within which a mover counts as arrived (1/64 world units).
pub const ARRIVAL_TOLERANCE: Fixed = Fixed::from_bits(1 << 26);

/// Reach for gathering, delivering, building and repairing (1.5 world units).
pub const INTERACTION_RANGE: Fixed = Fixed::from_bits(3 << 31);

/// Radius searched for a replacement node when a gathered node runs dry.
pub const GATHER_SEARCH_RADIUS: Fixed = Fixed::from_bits(10 << 32);

/// Distance a guard keeps from the entity it escorts.
pub const GUARD_DISTANCE: Fixed = Fixed::from_bits(3 << 32);

/// Mutable view of the world handed to the systems for one tick.
pub(crate) struct TickContext<'a> {
    pub objects: &'a mut ObjectManager,
    pub players: &'a mut BTreeMap<PlayerId, Player>,
    pub ruleset: &'a Ruleset,
    pub settings: &'a WorldSettings,
    pub dt: Fixed,
    pub damage: Vec<PendingDamage>,
    pub events: Vec<GameEvent>,
}

impl TickContext<'_> {
    /// Deduct a cost atomically, reporting each changed total.
    fn spend(&mut self, player: PlayerId, cost: &ResourceCost) -> Result<(), GameError> {
        let owner = self
            .players
            .get_mut(&player)
            .ok_or(GameError::InvalidPlayer(player))?;
        owner.try_spend(cost)?;
        for (resource, &amount) in cost {
            self.events.push(GameEvent::ResourceChanged {
                player,
                resource: resource.clone(),
                amount: owner.amount(resource),
                delta: -i64::from(amount),
            });
        }
        Ok(())
    }

    fn credit(&mut self, player: PlayerId, resource: &str, amount: u32) {
        if amount == 0 {
            return;
        }
        if let Some(owner) = self.players.get_mut(&player) {
            let total = owner.add(resource, amount);
            self.events.push(GameEvent::ResourceChanged {
                player,
                resource: resource.to_string(),
                amount: total,
                delta: i64::from(amount),
            });
        }
    }

    fn refund(&mut self, player: PlayerId, cost: &ResourceCost) {
        for (resource, &amount) in cost {
            self.credit(player, resource, amount);
        }
    }

    fn reject(&mut self, entity: EntityId, error: &GameError) {
        tracing::debug!(entity, %error, "Command rejected at dispatch");
        self.events.push(GameEvent::CommandRejected {
            entity,
            reason: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    fn is_enemy(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.players.get(&a), self.players.get(&b)) {
            (Some(a), Some(b)) => a.is_enemy_of(b),
            _ => false,
        }
    }

    fn clamp_to_map(&self, position: Vec3Fixed) -> Vec3Fixed {
        Vec3Fixed::ground(
            position.x.clamp(Fixed::ZERO, Fixed::from_num(self.settings.width)),
            position.z.clamp(Fixed::ZERO, Fixed::from_num(self.settings.height)),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engagement {
    InRange,
    Chasing,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    EnRoute,
    NoStore,
}

/// What an attacker needs to know about its target.
struct TargetView {
    entity: EntityRef,
    position: Vec3Fixed,
    half: Fixed,
    armor_type: String,
    armor: i32,
}

fn target_view(objects: &ObjectManager, id: EntityId) -> Option<TargetView> {
    if !objects.is_alive(id) {
        return None;
    }
    if let Some(unit) = objects.get_unit(id) {
        return Some(TargetView {
            entity: unit.entity_ref(),
            position: unit.position,
            half: Fixed::ZERO,
            armor_type: unit.stats.armor_type.clone(),
            armor: unit.stats.armor,
        });
    }
    objects.get_building(id).map(|b| TargetView {
        entity: b.entity_ref(),
        position: b.position,
        half: b.half_extent(),
        armor_type: b.definition.parameters.armor_type.clone(),
        armor: b.armor,
    })
}

/// Distance from `from` to the edge of something of half-size `half` at `to`.
fn reach(from: Vec3Fixed, to: Vec3Fixed, half: Fixed) -> Fixed {
    (from.distance(to) - half).max(Fixed::ZERO)
}

fn face(unit: &mut Unit, target: Vec3Fixed) {
    let direction = target - unit.position;
    if direction != Vec3Fixed::ZERO {
        unit.facing = direction.yaw();
    }
}

/// Step toward `target`; returns true once arrived (snapped onto the target).
fn move_toward(unit: &mut Unit, target: Vec3Fixed, dt: Fixed) -> bool {
    face(unit, target);
    let step = unit.stats.move_speed * dt;
    let next = unit.position.step_toward(target, step);
    if next.distance_squared(target) <= ARRIVAL_TOLERANCE * ARRIVAL_TOLERANCE {
        unit.position = target;
        return true;
    }
    unit.position = next;
    false
}

fn regenerate_hp(unit: &mut Unit, dt: Fixed) {
    if unit.hp >= unit.stats.max_hp || unit.stats.hp_regeneration <= 0 {
        unit.activity.regen_progress = Fixed::ZERO;
        return;
    }
    let progress = unit.activity.regen_progress + Fixed::from_num(unit.stats.hp_regeneration) * dt;
    let whole = progress.floor();
    unit.activity.regen_progress = progress - whole;
    let gained: i32 = whole.to_num();
    unit.hp = (unit.hp + gained).min(unit.stats.max_hp);
}

/// Pop the finished head command, idling when nothing is left.
fn finish_command(unit: &mut Unit) {
    unit.commands.pop();
    if unit.commands.is_empty() {
        unit.state = UnitState::Idle;
    }
}

/// Advance one unit by one tick. Returns true when the unit should be removed.
pub(crate) fn advance_unit(unit: &mut Unit, ctx: &mut TickContext<'_>) -> bool {
    match unit.state {
        UnitState::Dead => return true,
        UnitState::Dying => {
            unit.activity.dying_elapsed += ctx.dt;
            if unit.activity.dying_elapsed >= ctx.settings.death_delay {
                unit.state = UnitState::Dead;
                tracing::debug!(unit = unit.id, "Unit dead");
            }
            return false;
        }
        _ => {}
    }

    unit.activity.attack_cooldown = (unit.activity.attack_cooldown - ctx.dt).max(Fixed::ZERO);

    let Some(head) = unit.commands.head() else {
        unit.state = UnitState::Idle;
        regenerate_hp(unit, ctx.dt);
        return false;
    };
    let serial = head.serial;
    let order = head.command.order.clone();

    if unit.activity.dispatched != Some(serial) {
        unit.activity.dispatched = Some(serial);
        if !dispatch(unit, &order, ctx) {
            finish_command(unit);
            return false;
        }
    }

    let flow = match &order {
        UnitOrder::Stop => {
            unit.commands.clear();
            unit.state = UnitState::Idle;
            return false;
        }
        UnitOrder::Move { target } => {
            unit.state = UnitState::Moving;
            if move_toward(unit, *target, ctx.dt) {
                Flow::Done
            } else {
                Flow::Continue
            }
        }
        UnitOrder::Hold => {
            let range = unit.stats.attack_range;
            if !fight_nearby(unit, ctx, range, false) {
                unit.state = UnitState::Idle;
            }
            Flow::Continue
        }
        UnitOrder::Attack { target } => match engage(unit, *target, ctx, true) {
            Engagement::Lost => Flow::Done,
            Engagement::InRange | Engagement::Chasing => Flow::Continue,
        },
        UnitOrder::AttackMove { target } => {
            let sight = unit.stats.sight;
            if fight_nearby(unit, ctx, sight, true) {
                Flow::Continue
            } else {
                unit.state = UnitState::Moving;
                if move_toward(unit, *target, ctx.dt) {
                    Flow::Done
                } else {
                    Flow::Continue
                }
            }
        }
        UnitOrder::Gather { node } => gather(unit, *node, ctx),
        UnitOrder::ReturnResources { store } => match deliver(unit, *store, ctx) {
            Delivery::EnRoute => Flow::Continue,
            Delivery::Delivered | Delivery::NoStore => Flow::Done,
        },
        UnitOrder::Build {
            building_type,
            position,
        } => build(unit, building_type, *position, ctx),
        UnitOrder::Repair { target } => repair(unit, *target, ctx),
        UnitOrder::Guard { target } => guard(unit, *target, ctx),
        UnitOrder::Patrol { .. } => patrol(unit, ctx),
        UnitOrder::Upgrade { upgrade } => upgrade_unit(unit, serial, upgrade, ctx),
    };

    if flow == Flow::Done {
        finish_command(unit);
    }
    false
}

/// Prepare a new head command. Returns false when it must be dropped.
fn dispatch(unit: &mut Unit, order: &UnitOrder, ctx: &mut TickContext<'_>) -> bool {
    let dispatched = unit.activity.dispatched;
    unit.activity = Activity {
        dispatched,
        attack_cooldown: unit.activity.attack_cooldown,
        regen_progress: unit.activity.regen_progress,
        gather_progress: unit.activity.gather_progress,
        last_attacker: unit.activity.last_attacker,
        ..Activity::default()
    };
    tracing::trace!(unit = unit.id, command = order.kind().name(), "Dispatching command");
    refund_abandoned_upgrades(unit, ctx);

    match order {
        UnitOrder::Patrol { target } => {
            unit.activity.patrol = Some(PatrolState {
                origin: unit.position,
                target: *target,
                heading_to_target: true,
            });
        }
        UnitOrder::Gather { node } => {
            unit.activity.gather_resource = ctx
                .objects
                .get_resource_node(*node)
                .map(|n| n.resource.clone());
        }
        UnitOrder::Upgrade { upgrade } => {
            let Some(serial) = dispatched else {
                return false;
            };
            if let Some(paid) = unit.upgrades_in_progress.get(&serial) {
                unit.activity.work_elapsed = paid.elapsed;
                return true;
            }
            let Some(cost) = unit.definition.upgrade(upgrade).map(|u| u.cost_map()) else {
                ctx.reject(
                    unit.id,
                    &GameError::InvalidTarget(format!("{} has no upgrade {upgrade}", unit.unit_type)),
                );
                return false;
            };
            if let Err(error) = ctx.spend(unit.player, &cost) {
                ctx.reject(unit.id, &error);
                return false;
            }
            unit.upgrades_in_progress.insert(
                serial,
                UpgradeInProgress {
                    cost,
                    elapsed: Fixed::ZERO,
                },
            );
        }
        _ => {}
    }
    true
}

/// Refund paid upgrades whose command has left the queue unfinished.
fn refund_abandoned_upgrades(unit: &mut Unit, ctx: &mut TickContext<'_>) {
    if unit.upgrades_in_progress.is_empty() {
        return;
    }
    let pending: Vec<u64> = unit.commands.iter().map(|q| q.serial).collect();
    let abandoned: Vec<u64> = unit
        .upgrades_in_progress
        .keys()
        .copied()
        .filter(|serial| !pending.contains(serial))
        .collect();
    for serial in abandoned {
        if let Some(paid) = unit.upgrades_in_progress.remove(&serial) {
            tracing::debug!(unit = unit.id, serial, "Refunding abandoned upgrade");
            ctx.refund(unit.player, &paid.cost);
        }
    }
}

/// Attack `target` if in range, chase it if allowed and visible.
fn engage(unit: &mut Unit, target: EntityId, ctx: &mut TickContext<'_>, chase: bool) -> Engagement {
    let Some(view) = target_view(ctx.objects, target) else {
        return Engagement::Lost;
    };
    let distance = reach(unit.position, view.position, view.half);

    if distance <= unit.stats.attack_range {
        face(unit, view.position);
        unit.state = UnitState::Attacking;
        if unit.activity.attack_cooldown <= Fixed::ZERO {
            let amount = damage_against(
                ctx.ruleset.tech_tree(),
                &unit.stats,
                &view.armor_type,
                view.armor,
            );
            ctx.damage.push(PendingDamage {
                attacker: unit.id,
                attacker_player: unit.player,
                target: view.entity,
                amount,
            });
            unit.activity.attack_cooldown = unit.stats.attack_interval();
        }
        return Engagement::InRange;
    }

    if chase && unit.definition.is_mobile() && distance <= unit.stats.sight {
        unit.state = UnitState::Moving;
        move_toward(unit, view.position, ctx.dt);
        return Engagement::Chasing;
    }
    Engagement::Lost
}

/// Lowest-hp enemy within `range` of the unit.
fn scan_for_enemy(unit: &Unit, ctx: &TickContext<'_>, range: Fixed) -> Option<EntityId> {
    let units = ctx.objects.units().iter().filter_map(|(&id, other)| {
        let visible = ctx.objects.is_alive(id)
            && ctx.is_enemy(unit.player, other.player)
            && reach(unit.position, other.position, Fixed::ZERO) <= range;
        visible.then_some(Candidate { id, hp: other.hp })
    });
    let buildings = ctx.objects.buildings().iter().filter_map(|(&id, other)| {
        let visible = ctx.objects.is_alive(id)
            && ctx.is_enemy(unit.player, other.player)
            && reach(unit.position, other.position, other.half_extent()) <= range;
        visible.then_some(Candidate { id, hp: other.hp })
    });
    select_target(units.chain(buildings))
}

/// Keep fighting the engaged enemy or acquire a new one. Returns true if busy fighting.
fn fight_nearby(unit: &mut Unit, ctx: &mut TickContext<'_>, scan_range: Fixed, chase: bool) -> bool {
    if unit.stats.attack_damage <= 0 {
        return false;
    }
    if let Some(target) = unit.activity.engaged {
        if engage(unit, target, ctx, chase) != Engagement::Lost {
            return true;
        }
        unit.activity.engaged = None;
    }
    if let Some(target) = scan_for_enemy(unit, ctx, scan_range) {
        if engage(unit, target, ctx, chase) != Engagement::Lost {
            unit.activity.engaged = Some(target);
            return true;
        }
    }
    false
}

fn patrol(unit: &mut Unit, ctx: &mut TickContext<'_>) -> Flow {
    let Some(mut legs) = unit.activity.patrol else {
        return Flow::Done;
    };
    let sight = unit.stats.sight;
    if fight_nearby(unit, ctx, sight, true) {
        return Flow::Continue;
    }
    let leg_end = if legs.heading_to_target {
        legs.target
    } else {
        legs.origin
    };
    unit.state = UnitState::Moving;
    if move_toward(unit, leg_end, ctx.dt) {
        legs.heading_to_target = !legs.heading_to_target;
    }
    unit.activity.patrol = Some(legs);
    Flow::Continue
}

fn guard(unit: &mut Unit, target: EntityId, ctx: &mut TickContext<'_>) -> Flow {
    if !ctx.objects.is_alive(target) {
        return Flow::Done;
    }
    let Some(escorted) = ctx.objects.position_of(target) else {
        return Flow::Done;
    };
    let sight = unit.stats.sight;
    if fight_nearby(unit, ctx, sight, true) {
        return Flow::Continue;
    }
    if unit.position.distance(escorted) > GUARD_DISTANCE {
        unit.state = UnitState::Moving;
        move_toward(unit, escorted, ctx.dt);
    } else {
        unit.state = UnitState::Idle;
    }
    Flow::Continue
}

fn usable_node(objects: &ObjectManager, id: EntityId) -> bool {
    !objects.is_pending_removal(id)
        && objects
            .get_resource_node(id)
            .is_some_and(|n| !n.is_depleted())
}

/// Nearest non-depleted node of `resource` within the search radius.
fn replacement_node(objects: &ObjectManager, from: Vec3Fixed, resource: &str) -> Option<EntityId> {
    let radius_sq = GATHER_SEARCH_RADIUS * GATHER_SEARCH_RADIUS;
    objects
        .resource_nodes()
        .iter()
        .filter(|&(&id, n)| {
            n.resource == resource
                && usable_node(objects, id)
                && n.position.distance_squared(from) <= radius_sq
        })
        .min_by_key(|&(&id, n)| (n.position.distance_squared(from), id))
        .map(|(&id, _)| id)
}

fn gather(unit: &mut Unit, node: EntityId, ctx: &mut TickContext<'_>) -> Flow {
    let definition = Arc::clone(&unit.definition);
    let Some(harvest) = definition.harvest.as_ref() else {
        return Flow::Done;
    };

    let node = if usable_node(ctx.objects, node) {
        node
    } else {
        let resource = ctx
            .objects
            .get_resource_node(node)
            .map(|n| n.resource.clone())
            .or_else(|| unit.activity.gather_resource.clone());
        let replacement = resource
            .as_deref()
            .and_then(|r| replacement_node(ctx.objects, unit.position, r));
        let Some(replacement) = replacement else {
            // Bring home what was gathered before giving up.
            if unit.carried_total() > 0 {
                return match deliver(unit, None, ctx) {
                    Delivery::EnRoute => Flow::Continue,
                    Delivery::Delivered | Delivery::NoStore => Flow::Done,
                };
            }
            tracing::debug!(unit = unit.id, node, "Resource node depleted, no replacement");
            return Flow::Done;
        };
        if let Some(head) = unit.commands.head_mut() {
            head.command.order = UnitOrder::Gather { node: replacement };
        }
        replacement
    };
    let Some((resource, node_position)) = ctx
        .objects
        .get_resource_node(node)
        .map(|n| (n.resource.clone(), n.position))
    else {
        return Flow::Done;
    };
    unit.activity.gather_resource = Some(resource.clone());

    // Switching resource kinds drops whatever else is carried.
    unit.carried.retain(|r, amount| *r == resource && *amount > 0);

    if unit.carried_total() >= harvest.capacity {
        return match deliver(unit, None, ctx) {
            Delivery::Delivered | Delivery::EnRoute => Flow::Continue,
            Delivery::NoStore => Flow::Done,
        };
    }

    if reach(unit.position, node_position, Fixed::ZERO) > INTERACTION_RANGE {
        unit.state = UnitState::Moving;
        move_toward(unit, node_position, ctx.dt);
        return Flow::Continue;
    }

    face(unit, node_position);
    unit.state = UnitState::Gathering;
    let progress = unit.activity.gather_progress + harvest.rate * ctx.dt;
    let whole = progress.floor();
    unit.activity.gather_progress = progress - whole;
    let wanted: u32 = whole.to_num();
    let room = harvest.capacity.saturating_sub(unit.carried_total());
    if let Some(resource_node) = ctx.objects.get_resource_node_mut(node) {
        let taken = resource_node.extract(wanted.min(room));
        if taken > 0 {
            *unit.carried.entry(resource).or_insert(0) += taken;
        }
    }
    Flow::Continue
}

fn stores_any(building: &Building, carried: &[String]) -> bool {
    carried.iter().any(|r| building.definition.stores(r))
}

/// Carry resources to a store and credit them to the owner.
fn deliver(unit: &mut Unit, store: Option<EntityId>, ctx: &mut TickContext<'_>) -> Delivery {
    let carried: Vec<String> = unit
        .carried
        .iter()
        .filter(|(_, &amount)| amount > 0)
        .map(|(r, _)| r.clone())
        .collect();
    if carried.is_empty() {
        return Delivery::Delivered;
    }

    let valid = |b: &Building| {
        b.player == unit.player && b.is_alive() && b.is_built() && stores_any(b, &carried)
    };
    let explicit = store.filter(|&id| {
        !ctx.objects.is_pending_removal(id) && ctx.objects.get_building(id).is_some_and(valid)
    });
    let chosen = explicit.or_else(|| {
        ctx.objects
            .buildings()
            .iter()
            .filter(|&(&id, b)| !ctx.objects.is_pending_removal(id) && valid(b))
            .min_by_key(|&(&id, b)| (b.position.distance_squared(unit.position), id))
            .map(|(&id, _)| id)
    });
    let Some(store) = chosen.and_then(|id| ctx.objects.get_building(id)) else {
        tracing::debug!(unit = unit.id, "No store accepts carried resources");
        return Delivery::NoStore;
    };
    let (store_position, half) = (store.position, store.half_extent());
    let accepted: Vec<String> = carried
        .into_iter()
        .filter(|r| store.definition.stores(r))
        .collect();

    if reach(unit.position, store_position, half) > INTERACTION_RANGE {
        unit.state = UnitState::Moving;
        move_toward(unit, store_position, ctx.dt);
        return Delivery::EnRoute;
    }

    for resource in accepted {
        if let Some(amount) = unit.carried.remove(&resource) {
            ctx.credit(unit.player, &resource, amount);
        }
    }
    Delivery::Delivered
}

/// Advance construction of a site by one tick. Returns true when it completes.
pub(crate) fn advance_construction(building: &mut Building, dt: Fixed) -> bool {
    if building.is_built() {
        return false;
    }
    let one = Fixed::from_num(1);
    let build_time = building
        .definition
        .structure
        .as_ref()
        .map_or(one, |s| s.build_time);
    let step = if build_time <= Fixed::ZERO {
        one
    } else {
        dt / build_time
    };
    let old = building.progress;
    let new = (old + step).min(one);
    let max_hp = Fixed::from_num(building.max_hp);
    let gained: i32 = ((max_hp * new).floor() - (max_hp * old).floor()).to_num();
    building.hp = (building.hp + gained).min(building.max_hp);
    building.progress = new;
    building.is_built()
}

fn find_site(
    objects: &ObjectManager,
    player: PlayerId,
    building_type: &str,
    position: Vec3Fixed,
) -> Option<EntityId> {
    objects
        .buildings_for_player(player)
        .into_iter()
        .find(|b| {
            b.building_type == building_type
                && b.position == position
                && b.is_alive()
                && !b.is_built()
                && !objects.is_pending_removal(b.id)
        })
        .map(|b| b.id)
}

fn build(
    unit: &mut Unit,
    building_type: &str,
    position: Vec3Fixed,
    ctx: &mut TickContext<'_>,
) -> Flow {
    let site = match unit.activity.build_site {
        Some(site) if !ctx.objects.is_alive(site) => return Flow::Done,
        Some(site) => site,
        None => {
            if let Some(existing) = find_site(ctx.objects, unit.player, building_type, position) {
                existing
            } else {
                let faction = ctx
                    .players
                    .get(&unit.player)
                    .map(|p| p.faction.clone())
                    .unwrap_or_default();
                let Some(definition) = ctx.ruleset.unit(&faction, building_type).cloned() else {
                    ctx.reject(
                        unit.id,
                        &GameError::InvalidType {
                            faction,
                            type_name: building_type.to_string(),
                        },
                    );
                    return Flow::Done;
                };
                let half = Fixed::from_num(definition.parameters.size.max(1)) / Fixed::from_num(2);
                if reach(unit.position, position, half) > INTERACTION_RANGE {
                    unit.state = UnitState::Moving;
                    move_toward(unit, position, ctx.dt);
                    return Flow::Continue;
                }

                let cost = definition.cost();
                if let Err(error) = ctx.spend(unit.player, &cost) {
                    ctx.reject(unit.id, &error);
                    return Flow::Done;
                }
                match ctx.objects.create_building(
                    unit.player,
                    building_type,
                    position,
                    Placement::Site,
                ) {
                    Ok(site) => site,
                    Err(error) => {
                        ctx.refund(unit.player, &cost);
                        ctx.reject(unit.id, &error);
                        return Flow::Done;
                    }
                }
            }
        }
    };
    unit.activity.build_site = Some(site);
    construct(unit, site, ctx)
}

fn construct(unit: &mut Unit, site: EntityId, ctx: &mut TickContext<'_>) -> Flow {
    let Some(building) = ctx.objects.get_building(site) else {
        return Flow::Done;
    };
    if building.is_built() {
        return Flow::Done;
    }
    let (position, half) = (building.position, building.half_extent());
    if reach(unit.position, position, half) > INTERACTION_RANGE {
        unit.state = UnitState::Moving;
        move_toward(unit, position, ctx.dt);
        return Flow::Continue;
    }

    face(unit, position);
    unit.state = UnitState::Building;
    let Some(building) = ctx.objects.get_building_mut(site) else {
        return Flow::Done;
    };
    if !advance_construction(building, ctx.dt) {
        return Flow::Continue;
    }
    let (player, building_type) = (building.player, building.building_type.clone());
    tracing::debug!(building = site, %building_type, "Construction completed");
    ctx.events.push(GameEvent::BuildingCompleted {
        building: site,
        player,
        building_type,
    });
    Flow::Done
}

fn repair(unit: &mut Unit, target: EntityId, ctx: &mut TickContext<'_>) -> Flow {
    if !ctx.objects.is_alive(target) {
        return Flow::Done;
    }
    let Some(building) = ctx.objects.get_building(target) else {
        return Flow::Done;
    };
    if !building.is_built() {
        return construct(unit, target, ctx);
    }
    if building.hp >= building.max_hp {
        return Flow::Done;
    }
    let (position, half) = (building.position, building.half_extent());
    if reach(unit.position, position, half) > INTERACTION_RANGE {
        unit.state = UnitState::Moving;
        move_toward(unit, position, ctx.dt);
        return Flow::Continue;
    }

    face(unit, position);
    unit.state = UnitState::Building;
    let Some(building) = ctx.objects.get_building_mut(target) else {
        return Flow::Done;
    };
    let build_time = building
        .definition
        .structure
        .as_ref()
        .map_or(Fixed::from_num(1), |s| s.build_time)
        .max(Fixed::from_num(1));
    let rate = Fixed::from_num(building.max_hp) / build_time;
    let progress = unit.activity.repair_progress + rate * ctx.dt;
    let whole = progress.floor();
    unit.activity.repair_progress = progress - whole;
    let restored: i32 = whole.to_num();
    building.hp = (building.hp + restored).min(building.max_hp);
    if building.hp >= building.max_hp {
        Flow::Done
    } else {
        Flow::Continue
    }
}

fn upgrade_unit(unit: &mut Unit, serial: u64, upgrade: &str, ctx: &mut TickContext<'_>) -> Flow {
    let Some(definition) = unit.definition.upgrade(upgrade).cloned() else {
        unit.upgrades_in_progress.remove(&serial);
        return Flow::Done;
    };
    unit.state = UnitState::Building;
    unit.activity.work_elapsed += ctx.dt;
    if unit.activity.work_elapsed < definition.duration {
        if let Some(paid) = unit.upgrades_in_progress.get_mut(&serial) {
            paid.elapsed = unit.activity.work_elapsed;
        }
        return Flow::Continue;
    }
    unit.upgrades_in_progress.remove(&serial);
    unit.stats.apply_upgrade(&definition);
    unit.hp = (unit.hp + definition.max_hp_bonus).clamp(1, unit.stats.max_hp.max(1));
    unit.upgrade_level += 1;
    tracing::debug!(unit = unit.id, upgrade, "Unit upgrade completed");
    ctx.events.push(GameEvent::UpgradeCompleted {
        entity: unit.id,
        player: unit.player,
        upgrade: upgrade.to_string(),
    });
    Flow::Done
}

/// Apply per-second regeneration of every resource that defines one.
pub(crate) fn regenerate_resources(ctx: &mut TickContext<'_>) {
    let rates: Vec<(String, i64)> = ctx
        .ruleset
        .resources()
        .filter_map(|r| {
            r.regeneration
                .filter(|&rate| rate != 0)
                .map(|rate| (r.name.clone(), rate))
        })
        .collect();
    if rates.is_empty() {
        return;
    }

    for player in ctx.players.values_mut().filter(|p| p.is_active) {
        for (resource, rate) in &rates {
            let accumulated = player
                .regen_progress
                .entry(resource.clone())
                .or_insert(Fixed::ZERO);
            *accumulated += Fixed::from_num(*rate) * ctx.dt;
            let whole = accumulated.round_to_zero();
            *accumulated -= whole;
            let delta: i64 = whole.to_num();
            if delta == 0 {
                continue;
            }

            let before = player.amount(resource);
            let magnitude = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
            let after = if delta > 0 {
                before.saturating_add(magnitude)
            } else {
                before.saturating_sub(magnitude)
            };
            if after != before {
                player.resources.insert(resource.clone(), after);
                ctx.events.push(GameEvent::ResourceChanged {
                    player: player.id,
                    resource: resource.clone(),
                    amount: after,
                    delta: i64::from(after) - i64::from(before),
                });
            }
        }
    }
}

/// Advance the head item of every built building's production queue.
pub(crate) fn advance_production(ctx: &mut TickContext<'_>) {
    let one = Fixed::from_num(1);
    for id in ctx.objects.buildings().sorted_ids() {
        let Some(building) = ctx.objects.get_building(id) else {
            continue;
        };
        if !building.is_alive() || !building.is_built() || ctx.objects.is_pending_removal(id) {
            continue;
        }
        let Some(item) = building.production.front() else {
            continue;
        };
        let player = building.player;
        let kind = item.kind.clone();
        let cost = item.cost.clone();
        let started = item.started;
        let definition = Arc::clone(&building.definition);
        let spawn_at = building.position
            + Vec3Fixed::ground(building.half_extent() + one, Fixed::ZERO);

        let faction = ctx
            .players
            .get(&player)
            .map(|p| p.faction.clone())
            .unwrap_or_default();
        let duration = match &kind {
            ProductionKind::Unit(unit_type) => ctx
                .ruleset
                .unit(&faction, unit_type)
                .map(|u| u.parameters.production_time),
            ProductionKind::Upgrade(name) => definition.upgrade(name).map(|u| u.duration),
        };
        let Some(duration) = duration else {
            if let Some(building) = ctx.objects.get_building_mut(id) {
                building.production.pop_front();
            }
            if started {
                ctx.refund(player, &cost);
            }
            ctx.reject(id, &GameError::InvalidTarget(format!("{kind:?} cannot be produced")));
            continue;
        };

        if !started {
            if let Err(error) = ctx.spend(player, &cost) {
                if let Some(building) = ctx.objects.get_building_mut(id) {
                    building.production.pop_front();
                }
                ctx.reject(id, &error);
                continue;
            }
        }

        let spawn_at = ctx.clamp_to_map(spawn_at);
        let Some(building) = ctx.objects.get_building_mut(id) else {
            continue;
        };
        let Some(item) = building.production.front_mut() else {
            continue;
        };
        item.started = true;
        item.progress = if duration <= Fixed::ZERO {
            one
        } else {
            (item.progress + ctx.dt / duration).min(one)
        };
        if item.progress < one {
            continue;
        }
        building.production.pop_front();

        match kind {
            ProductionKind::Upgrade(name) => {
                if let Some(upgrade) = definition.upgrade(&name) {
                    building.apply_upgrade(upgrade);
                }
                tracing::debug!(building = id, upgrade = %name, "Building upgrade completed");
                ctx.events.push(GameEvent::UpgradeCompleted {
                    entity: id,
                    player,
                    upgrade: name,
                });
            }
            ProductionKind::Unit(unit_type) => {
                match ctx.objects.create_unit(player, &unit_type, spawn_at) {
                    Ok(unit) => {
                        if let Some(owner) = ctx.players.get_mut(&player) {
                            owner.units_created += 1;
                        }
                        tracing::debug!(building = id, unit, %unit_type, "Production completed");
                        ctx.events.push(GameEvent::UnitCreated {
                            unit,
                            player,
                            unit_type: unit_type.clone(),
                        });
                        ctx.events.push(GameEvent::ProductionCompleted {
                            building: id,
                            player,
                            unit_type,
                            unit,
                        });
                    }
                    Err(error) => {
                        tracing::warn!(building = id, %unit_type, %error, "Failed to spawn produced unit");
                    }
                }
            }
        }
    }
}

/// Apply every queued hit, in the order the attacks happened.
pub(crate) fn resolve_damage(ctx: &mut TickContext<'_>) {
    for hit in std::mem::take(&mut ctx.damage) {
        let id = hit.target.id;
        match hit.target.kind {
            EntityKind::Unit => {
                let Some(unit) = ctx.objects.get_unit_mut(id) else {
                    continue;
                };
                if !unit.is_alive() {
                    continue;
                }
                unit.hp = (unit.hp - hit.amount).max(0);
                unit.activity.last_attacker = Some(hit.attacker);
                let (hp, player) = (unit.hp, unit.player);
                ctx.events.push(GameEvent::UnitDamaged {
                    target: hit.target,
                    attacker: hit.attacker,
                    amount: hit.amount,
                    hp,
                });
                if hp > 0 {
                    continue;
                }
                unit.state = UnitState::Dying;
                unit.commands.clear();
                unit.activity = Activity {
                    last_attacker: Some(hit.attacker),
                    ..Activity::default()
                };
                if let Some(owner) = ctx.players.get_mut(&player) {
                    owner.units_lost += 1;
                }
                tracing::debug!(unit = id, killer = hit.attacker, "Unit died");
                ctx.events.push(GameEvent::UnitDied {
                    unit: id,
                    player,
                    killer: Some(hit.attacker),
                });
            }
            EntityKind::Building => {
                let Some(building) = ctx.objects.get_building_mut(id) else {
                    continue;
                };
                if !building.is_alive() {
                    continue;
                }
                building.hp = (building.hp - hit.amount).max(0);
                let (hp, player) = (building.hp, building.player);
                ctx.events.push(GameEvent::UnitDamaged {
                    target: hit.target,
                    attacker: hit.attacker,
                    amount: hit.amount,
                    hp,
                });
                if hp > 0 {
                    continue;
                }
                building.destroyed = true;
                building.production.clear();
                if ctx.objects.destroy(id).is_err() {
                    continue;
                }
                tracing::debug!(building = id, destroyer = hit.attacker, "Building destroyed");
                ctx.events.push(GameEvent::BuildingDestroyed {
                    building: id,
                    player,
                    destroyer: Some(hit.attacker),
                });
            }
            EntityKind::ResourceNode => {}
        }
    }
}
