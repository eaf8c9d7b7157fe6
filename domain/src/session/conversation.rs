//! The local message log of one session.

use super::entities::{ChatTurn, Message};
use crate::core::error::DomainError;

/// Append-only message log with at most one streaming ("in flight") message.
///
/// The in-flight message is always the last one. Appending anything else
/// finalizes it first, so every earlier message is immutable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
    in_flight: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a finalized log from fetched history.
    pub fn from_turns(turns: impl IntoIterator<Item = ChatTurn>) -> Self {
        Self {
            messages: turns.into_iter().map(Message::from).collect(),
            in_flight: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The message currently receiving streamed content, if any.
    pub fn in_flight(&self) -> Option<&Message> {
        if self.in_flight {
            self.messages.last()
        } else {
            None
        }
    }

    /// Prior turns in wire form, oldest first.
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.messages.iter().map(Message::to_turn).collect()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Append a finalized assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Append an empty assistant placeholder that will receive streamed content.
    pub fn open_assistant(&mut self) {
        self.push(Message::assistant(String::new()));
        self.in_flight = true;
    }

    /// Replace the in-flight message's content with `content`.
    pub fn replace_in_flight(&mut self, content: &str) -> Result<(), DomainError> {
        if !self.in_flight {
            return Err(DomainError::NothingInFlight);
        }
        let last = self
            .messages
            .last_mut()
            .ok_or(DomainError::NothingInFlight)?;
        last.content.clear();
        last.content.push_str(content);
        Ok(())
    }

    /// Freeze the in-flight message. No-op if nothing is streaming.
    pub fn finalize(&mut self) {
        self.in_flight = false;
    }

    fn push(&mut self, message: Message) {
        self.finalize();
        self.messages.push(message);
    }
}
