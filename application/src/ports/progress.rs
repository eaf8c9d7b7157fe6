//! Conversation progress port
//!
//! Defines the callbacks a UI implements to render a turn while it streams.

use sitechat_domain::Message;

/// Callback for progress updates during a conversation turn
///
/// Implementations live in the presentation layer. Every method has a no-op
/// default so renderers only implement what they display.
pub trait ConversationProgress: Send + Sync {
    /// Called after the user message was appended and the request is about
    /// to be sent.
    fn on_turn_start(&self, _session_id: &str, _question: &str) {}

    /// Called after every chunk with the full answer so far.
    fn on_partial(&self, _content_so_far: &str) {}

    /// Called when the fallback reply was appended instead of (or after) an
    /// answer.
    fn on_fallback(&self, _message: &Message) {}

    /// Called once the turn is over, whatever the outcome.
    fn on_turn_end(&self) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ConversationProgress for NoProgress {}
