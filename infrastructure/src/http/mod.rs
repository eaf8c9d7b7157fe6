//! HTTP adapters for the sitechat backend.
//!
//! [`SiteChatHttpClient`] implements the chat, session, crawl and catalog
//! ports on top of `reqwest`; the crawl status channel is read as
//! server-sent events by [`SseEventSource`].

pub mod client;
pub mod error;
pub mod sse;

pub use client::{HttpSettings, SiteChatHttpClient};
pub use error::HttpClientError;
pub use sse::{SseEventSource, SseMessage, SseParser};
