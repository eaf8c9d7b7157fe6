//! Application layer for sitechat
//!
//! This crate contains the use cases, port definitions, the site scope
//! context and runtime configuration. It depends only on the domain layer.

pub mod config;
pub mod decoder;
pub mod ports;
pub mod scope;
pub mod use_cases;

// Re-export commonly used types
pub use config::MonitorConfig;
pub use decoder::Utf8ChunkDecoder;
pub use ports::{
    chat_backend::{ChatBackend, ChatRequest, GatewayError, SessionApi},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    crawl_backend::{CatalogRefresher, CrawlBackend, CrawlReply},
    event_source::{
        ByteSource, ChannelSource, CrawlEventSource, EventSource, ScriptedSource, SourceError,
        StreamSource,
    },
    progress::{ConversationProgress, NoProgress},
};
pub use scope::{ScopeChange, ScopeListener, SiteScopeContext};
pub use use_cases::conversation::{
    ConversationEngine, ConversationError, ConversationSnapshot, FALLBACK_REPLY, FallbackReason,
    TurnOutcome, TurnState,
};
pub use use_cases::crawl_monitor::{
    CrawlJobMonitor, CrawlNotice, CrawlSnapshot, MonitorError, StartOutcome, StopOutcome,
};
pub use use_cases::session_store::SessionStore;
