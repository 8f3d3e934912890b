//! Error types for the game simulation.

use thiserror::Error;

use crate::components::{EntityId, PlayerId};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
///
/// Every variant is a value returned to the caller that originated the
/// request (spawn, command, lifecycle). None of them aborts the tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// Player id is not in the world's player table.
    #[error("Invalid player ID: {0}")]
    InvalidPlayer(PlayerId),

    /// No definition exists for the requested type.
    #[error("Invalid type '{type_name}' for faction '{faction}'")]
    InvalidType {
        /// Faction whose definitions were searched.
        faction: String,
        /// Requested unit or building type.
        type_name: String,
    },

    /// Building footprint overlaps another object or leaves the map.
    #[error("Position ({x}, {z}) is occupied")]
    Occupied {
        /// X coordinate of the requested placement.
        x: f64,
        /// Z coordinate of the requested placement.
        z: f64,
    },

    /// Entity id does not refer to any live object.
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Entity exists but is dying or dead.
    #[error("Entity {0} is dead")]
    DeadEntity(EntityId),

    /// The entity's definition does not offer this command.
    #[error("Command {command} is not available to entity {entity}")]
    CommandNotAvailable {
        /// Entity the command was issued to.
        entity: EntityId,
        /// Name of the rejected command type.
        command: String,
    },

    /// Owning player cannot pay for the command.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource type.
        resource: String,
        /// Amount required.
        required: u32,
        /// Amount available.
        available: u32,
    },

    /// Target entity or type is missing, dead, or unsuitable.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Target position lies outside the map.
    #[error("Position ({x}, {z}) is outside the map")]
    OutOfBounds {
        /// X coordinate of the rejected target.
        x: f64,
        /// Z coordinate of the rejected target.
        z: f64,
    },

    /// Command queue already holds the maximum number of commands.
    #[error("Command queue of entity {0} is full")]
    QueueFull(EntityId),

    /// Lifecycle transition not allowed from the current state.
    #[error("Cannot {action} while {state}")]
    BadState {
        /// Requested transition.
        action: &'static str,
        /// Current lifecycle state.
        state: &'static str,
    },

    /// A world invariant no longer holds.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl GameError {
    /// Short, stable name of the error kind, for reports and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPlayer(_) => "InvalidPlayer",
            Self::InvalidType { .. } => "InvalidType",
            Self::Occupied { .. } => "Occupied",
            Self::UnknownEntity(_) => "UnknownEntity",
            Self::DeadEntity(_) => "DeadEntity",
            Self::CommandNotAvailable { .. } => "CommandNotAvailable",
            Self::InsufficientResources { .. } => "InsufficientResources",
            Self::InvalidTarget(_) => "InvalidTarget",
            Self::OutOfBounds { .. } => "OutOfBounds",
            Self::QueueFull(_) => "QueueFull",
            Self::BadState { .. } => "BadState",
            Self::InvariantViolation(_) => "InvariantViolation",
        }
    }
}
