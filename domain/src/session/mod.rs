//! Conversation session domain.
//!
//! - [`entities::Session`]: a server-tracked conversation
//! - [`entities::Message`]: a single timestamped message
//! - [`conversation::Conversation`]: the local message log of one session

pub mod conversation;
pub mod entities;
