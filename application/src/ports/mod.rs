//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod chat_backend;
pub mod conversation_logger;
pub mod crawl_backend;
pub mod event_source;
pub mod progress;
