//! Controller and runner errors.

use glest_assets::error::AssetError;
use glest_core::error::GameError;
use thiserror::Error;

/// Result type alias using [`ControllerError`].
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors surfaced to whoever drives the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A simulation error: lifecycle `BadState`, command rejection, setup failure.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The content pack could not be loaded.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// The content pack has validation errors.
    #[error("Pack '{pack}' failed validation with {errors} error(s)")]
    Validation {
        /// Pack name.
        pack: String,
        /// Number of error issues.
        errors: usize,
    },

    /// Too few or too many factions for one game.
    #[error("A game takes {min} to {max} factions, got {given}")]
    PlayerCount {
        /// Fewest factions.
        min: usize,
        /// Most factions.
        max: usize,
        /// Factions supplied.
        given: usize,
    },

    /// The simulation thread could not be started.
    #[error("Failed to spawn simulation thread: {0}")]
    Thread(#[source] std::io::Error),

    /// The simulation thread panicked.
    #[error("Simulation thread panicked")]
    ThreadPanicked,
}

impl ControllerError {
    /// Short, stable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Game(e) => e.kind(),
            Self::Asset(e) => e.kind(),
            Self::Validation { .. } => "ValidationFailed",
            Self::PlayerCount { .. } => "PlayerCount",
            Self::Thread(_) => "ThreadSpawn",
            Self::ThreadPanicked => "ThreadPanicked",
        }
    }

    /// Lifecycle transition rejected in `state`.
    #[must_use]
    pub const fn bad_state(action: &'static str, state: &'static str) -> Self {
        Self::Game(GameError::BadState { action, state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_state_kind_and_message() {
        let err = ControllerError::bad_state("pause", "stopped");
        assert_eq!(err.kind(), "BadState");
        assert_eq!(err.to_string(), "Cannot pause while stopped");
    }

    #[test]
    fn test_asset_kind_passes_through() {
        let err = ControllerError::from(AssetError::Missing("x.ron".to_string()));
        assert_eq!(err.kind(), "AssetMissing");
    }
}
