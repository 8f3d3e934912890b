//! Events produced by a world tick.
//!
//! A tick returns its events in creation order. Observers (renderer,
//! audio, UI) receive them after the tick's state changes are committed.

use serde::Serialize;

use crate::components::{EntityId, EntityRef, PlayerId};
use crate::math::{fixed_decimal, Fixed};

/// Something observable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum GameEvent {
    /// A tick completed.
    Tick {
        /// Tick number, starting at 1.
        tick: u64,
        /// Game time after the tick.
        #[serde(with = "fixed_decimal")]
        game_time: Fixed,
    },
    /// A unit entered the world.
    UnitCreated {
        /// New unit.
        unit: EntityId,
        /// Owner.
        player: PlayerId,
        /// Unit type name.
        unit_type: String,
    },
    /// A unit's hit points reached zero.
    UnitDied {
        /// Dying unit.
        unit: EntityId,
        /// Owner.
        player: PlayerId,
        /// Unit credited with the kill.
        killer: Option<EntityId>,
    },
    /// A unit or building took damage.
    UnitDamaged {
        /// Entity hit.
        target: EntityRef,
        /// Attacking unit.
        attacker: EntityId,
        /// Damage dealt.
        amount: i32,
        /// Hit points left.
        hp: i32,
    },
    /// Construction of a building finished.
    BuildingCompleted {
        /// Building.
        building: EntityId,
        /// Owner.
        player: PlayerId,
        /// Building type name.
        building_type: String,
    },
    /// A building finished producing a unit.
    ProductionCompleted {
        /// Producing building.
        building: EntityId,
        /// Owner.
        player: PlayerId,
        /// Produced unit type.
        unit_type: String,
        /// The new unit.
        unit: EntityId,
    },
    /// A player's resource total changed.
    ResourceChanged {
        /// Player.
        player: PlayerId,
        /// Resource name.
        resource: String,
        /// New total.
        amount: u32,
        /// Signed change.
        delta: i64,
    },
    /// A player left the game.
    PlayerDefeated {
        /// Player.
        player: PlayerId,
    },
    /// A building's hit points reached zero.
    BuildingDestroyed {
        /// Building.
        building: EntityId,
        /// Owner.
        player: PlayerId,
        /// Unit credited with the kill.
        destroyer: Option<EntityId>,
    },
    /// A unit or building upgrade finished.
    UpgradeCompleted {
        /// Upgraded entity.
        entity: EntityId,
        /// Owner.
        player: PlayerId,
        /// Upgrade name.
        upgrade: String,
    },
    /// An accepted command could not be carried out.
    CommandRejected {
        /// Entity the command was addressed to.
        entity: EntityId,
        /// Error kind.
        reason: String,
        /// Human-readable explanation.
        message: String,
    },
}

/// Event discriminant, used to subscribe to one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GameEventKind {
    /// [`GameEvent::Tick`].
    Tick,
    /// [`GameEvent::UnitCreated`].
    UnitCreated,
    /// [`GameEvent::UnitDied`].
    UnitDied,
    /// [`GameEvent::UnitDamaged`].
    UnitDamaged,
    /// [`GameEvent::BuildingCompleted`].
    BuildingCompleted,
    /// [`GameEvent::ProductionCompleted`].
    ProductionCompleted,
    /// [`GameEvent::ResourceChanged`].
    ResourceChanged,
    /// [`GameEvent::PlayerDefeated`].
    PlayerDefeated,
    /// [`GameEvent::BuildingDestroyed`].
    BuildingDestroyed,
    /// [`GameEvent::UpgradeCompleted`].
    UpgradeCompleted,
    /// [`GameEvent::CommandRejected`].
    CommandRejected,
}

impl GameEvent {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> GameEventKind {
        match self {
            Self::Tick { .. } => GameEventKind::Tick,
            Self::UnitCreated { .. } => GameEventKind::UnitCreated,
            Self::UnitDied { .. } => GameEventKind::UnitDied,
            Self::UnitDamaged { .. } => GameEventKind::UnitDamaged,
            Self::BuildingCompleted { .. } => GameEventKind::BuildingCompleted,
            Self::ProductionCompleted { .. } => GameEventKind::ProductionCompleted,
            Self::ResourceChanged { .. } => GameEventKind::ResourceChanged,
            Self::PlayerDefeated { .. } => GameEventKind::PlayerDefeated,
            Self::BuildingDestroyed { .. } => GameEventKind::BuildingDestroyed,
            Self::UpgradeCompleted { .. } => GameEventKind::UpgradeCompleted,
            Self::CommandRejected { .. } => GameEventKind::CommandRejected,
        }
    }
}
