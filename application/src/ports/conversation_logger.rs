//! Port for the structured conversation transcript.
//!
//! Defines the [`ConversationLogger`] trait for recording chat turns and
//! crawl status events to a machine-readable log.
//!
//! This is separate from `tracing`-based operation logs: tracing carries
//! diagnostics, while this port captures what the user saw (JSONL).

use serde_json::Value;

/// A structured transcript event.
///
/// Each event has a type string and a JSON payload; the writer adds the
/// timestamp.
pub struct ConversationEvent {
    /// Event type identifier (e.g. "turn_submitted", "turn_fallback", "crawl_event").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging transcript events.
///
/// `log` is synchronous and infallible; writers swallow their own I/O errors
/// so a full disk never breaks a chat turn.
pub trait ConversationLogger: Send + Sync {
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when the transcript is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
