//! Thread-safe command intake.
//!
//! Producers on any thread push commands; the simulation thread drains
//! everything pending at the top of a tick. Commands pushed while a tick
//! runs land in the next drain.

use crossbeam_channel::{unbounded, Receiver, Sender};
use glest_core::commands::Command;
use glest_core::components::EntityId;

/// A command waiting for the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    /// Addressed entity.
    pub entity: EntityId,
    /// The command.
    pub command: Command,
}

/// Multi-producer queue of pending commands.
#[derive(Debug, Clone)]
pub struct CommandIntake {
    sender: Sender<PendingCommand>,
    receiver: Receiver<PendingCommand>,
}

impl Default for CommandIntake {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandIntake {
    /// Create an empty intake.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Queue a command for the next tick.
    pub fn submit(&self, entity: EntityId, command: impl Into<Command>) {
        // The intake owns a receiver, so the channel cannot be disconnected.
        let _ = self.sender.send(PendingCommand {
            entity,
            command: command.into(),
        });
    }

    /// Take every pending command in submission order.
    #[must_use]
    pub fn drain(&self) -> Vec<PendingCommand> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glest_core::commands::{UnitCommand, UnitOrder};

    #[test]
    fn test_drain_preserves_submission_order() {
        let intake = CommandIntake::new();
        intake.submit(3, UnitOrder::Stop);
        intake.submit(1, UnitCommand::attack(7));
        assert_eq!(intake.len(), 2);

        let drained = intake.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].entity, 3);
        assert_eq!(drained[1].command, Command::from(UnitCommand::attack(7)));
        assert!(intake.is_empty());
    }

    #[test]
    fn test_submit_from_many_threads() {
        let intake = CommandIntake::new();
        std::thread::scope(|scope| {
            for thread in 0..4u64 {
                let intake = &intake;
                scope.spawn(move || {
                    for _ in 0..25 {
                        intake.submit(thread, UnitOrder::Stop);
                    }
                });
            }
        });
        assert_eq!(intake.drain().len(), 100);
    }
}
