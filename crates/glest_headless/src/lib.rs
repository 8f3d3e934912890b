//! # Glest Headless
//!
//! Game controller and headless runner.
//!
//! The [`controller::GameController`] owns one [`glest_core::world::World`]
//! behind a reader-writer lock and drives it from a dedicated simulation
//! thread at a fixed rate. Observers subscribe to the
//! [`event_bus::EventBus`]; producers submit commands through the
//! [`intake::CommandIntake`], which the simulation thread drains at the top
//! of every tick.
//!
//! ```text
//!   UI / AI ──submit──▶ intake ──drain──▶ [sim thread: World::update] ──▶ event bus ──▶ observers
//!                                                 ▲
//!   renderer / UI ───────── read lock ────────────┘
//! ```
//!
//! The [`runner`] module wires a content pack, a world and a controller
//! together for the `glest-headless` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod controller;
pub mod error;
pub mod event_bus;
pub mod intake;
pub mod runner;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::controller::{
        ControllerConfig, ControllerState, ControllerStats, GameController, WorldSnapshot,
    };
    pub use crate::error::{ControllerError, Result};
    pub use crate::event_bus::{EventBus, SubscriptionId};
    pub use crate::intake::{CommandIntake, PendingCommand};
    pub use crate::runner::{run_pack, PlayerSummary, RunConfig, RunSummary};
}
