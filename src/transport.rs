// collaborator seams: where commands go, where chat replies come from, and the privileged
// alliance channel

use std::collections::VecDeque;
use crate::action::CommandEnvelope;
use crate::error::{ChatError, CommandError};
use crate::Role;

/// The authoritative game's command channel.
pub trait CommandSink {
    fn send(&mut self, envelope: CommandEnvelope) -> Result<(), CommandError>;

    fn send_chat(&mut self, text: &str) -> Result<(), CommandError>;
}

/// Optional conversational service for the heuristic player.
pub trait ChatResponder {
    fn respond(&mut self, player: usize, text: &str) -> Result<Option<String>, ChatError>;
}

/// Side channel for a bot cooperating with a human friend in the team variant. A standard
/// deployment never wires one up.
pub trait Oracle {
    fn holds(&self, player: usize, role: Role) -> bool;

    /// Makes `player` hold `role`, swapping one of its live cards.
    fn substitute(&mut self, player: usize, role: Role);

    /// Gives up one of `player`'s live cards.
    fn discard(&mut self, player: usize);
}

/// Buffers commands until someone drains them. The local table hands one to every seat.
#[derive(Debug, Default)]
pub struct Outbox {
    envelopes: VecDeque<CommandEnvelope>,
    chat: Vec<String>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&mut self) -> Option<CommandEnvelope> {
        self.envelopes.pop_front()
    }

    pub fn drain(&mut self) -> Vec<CommandEnvelope> {
        self.envelopes.drain(..).collect()
    }

    pub fn chat(&self) -> &[String] {
        &self.chat
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}

impl CommandSink for Outbox {
    fn send(&mut self, envelope: CommandEnvelope) -> Result<(), CommandError> {
        self.envelopes.push_back(envelope);
        Ok(())
    }

    fn send_chat(&mut self, text: &str) -> Result<(), CommandError> {
        self.chat.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::action::{Command, CommandEnvelope};
    use crate::transport::{CommandSink, Outbox};

    #[test]
    fn outbox_keeps_order() {
        let mut outbox = Outbox::new();
        outbox.send(CommandEnvelope { version: 1, command: Command::Allow }).unwrap();
        outbox.send(CommandEnvelope { version: 2, command: Command::Challenge }).unwrap();
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox.pop().map(|envelope| envelope.version), Some(1));
        assert_eq!(outbox.drain().len(), 1);
        assert!(outbox.is_empty());
    }
}
