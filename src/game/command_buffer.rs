//! Lock-free command buffer for player requests
//!
//! Uses crossbeam-channel for lock-free MPSC communication from bot drivers
//! and connection handlers to the authority tick. Commands are requests;
//! the session decides whether they apply.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::game::actor::{ControllerId, EntityId};
use crate::game::constants::net;
use crate::util::vec3::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    /// Move the controller's character
    Move { position: Vec3 },
    /// Pick up a weapon the character is overlapping
    Equip { weapon: EntityId },
    TriggerPressed { target: Vec3 },
    TriggerReleased,
    /// Top up the held weapon's magazine
    Reload { amount: u32 },
    /// Drop the held weapon
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandMessage {
    pub controller: ControllerId,
    pub command: PlayerCommand,
}

pub struct CommandBuffer {
    sender: Sender<CommandMessage>,
    receiver: Receiver<CommandMessage>,
    capacity: usize,
}

impl CommandBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Each producer should hold its own sender clone
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    #[inline]
    pub fn try_submit(&self, controller: ControllerId, command: PlayerCommand) -> bool {
        self.sender
            .try_send(CommandMessage {
                controller,
                command,
            })
            .is_ok()
    }

    /// Drain all pending commands for this tick
    pub fn drain(&self) -> Vec<CommandMessage> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new(net::COMMAND_BUFFER_SIZE)
    }
}

#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<CommandMessage>,
}

impl CommandSender {
    /// Non-blocking; a full buffer is reported as backpressure
    #[inline]
    pub fn try_send(
        &self,
        controller: ControllerId,
        command: PlayerCommand,
    ) -> Result<(), CommandBufferError> {
        self.sender
            .try_send(CommandMessage {
                controller,
                command,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => CommandBufferError::Full,
                TrySendError::Disconnected(_) => CommandBufferError::Disconnected,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandBufferError {
    #[error("command buffer full")]
    Full,
    #[error("command buffer disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_submit_and_drain() {
        let buffer = CommandBuffer::new(10);
        let controller = Uuid::new_v4();

        assert!(buffer.try_submit(controller, PlayerCommand::Equip { weapon: 1 }));
        assert!(buffer.try_submit(controller, PlayerCommand::TriggerPressed { target: Vec3::UP }));
        assert!(buffer.try_submit(controller, PlayerCommand::TriggerReleased));
        assert_eq!(buffer.pending_count(), 3);

        let commands = buffer.drain();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].command, PlayerCommand::Equip { weapon: 1 });
        assert_eq!(commands[2].command, PlayerCommand::TriggerReleased);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_backpressure() {
        let buffer = CommandBuffer::new(2);
        let controller = Uuid::new_v4();
        let sender = buffer.sender();

        assert!(sender.try_send(controller, PlayerCommand::Drop).is_ok());
        assert!(sender.try_send(controller, PlayerCommand::Drop).is_ok());
        assert_eq!(
            sender.try_send(controller, PlayerCommand::Drop),
            Err(CommandBufferError::Full)
        );

        buffer.drain();
        assert!(sender.try_send(controller, PlayerCommand::Drop).is_ok());
    }

    #[test]
    fn test_disconnected() {
        let buffer = CommandBuffer::new(2);
        let sender = buffer.sender();
        drop(buffer);

        assert_eq!(
            sender.try_send(Uuid::new_v4(), PlayerCommand::Drop),
            Err(CommandBufferError::Disconnected)
        );
    }

    #[test]
    fn test_order_preserved_across_senders() {
        let buffer = CommandBuffer::new(10);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let sender1 = buffer.sender();
        let sender2 = buffer.sender();

        sender1.try_send(a, PlayerCommand::Reload { amount: 5 }).unwrap();
        sender2.try_send(b, PlayerCommand::Drop).unwrap();

        let commands = buffer.drain();
        assert_eq!(commands[0].controller, a);
        assert_eq!(commands[1].controller, b);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(CommandBuffer::default().capacity(), net::COMMAND_BUFFER_SIZE);
    }
}
