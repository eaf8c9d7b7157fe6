//! Infrastructure layer for sitechat
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the HTTP backend client with its SSE event channel,
//! configuration file loading, and the JSONL transcript writer.

pub mod config;
pub mod http;
pub mod logging;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigLoader, FileConfig, Severity};
pub use http::{HttpClientError, HttpSettings, SiteChatHttpClient, SseEventSource};
pub use logging::JsonlConversationLogger;
