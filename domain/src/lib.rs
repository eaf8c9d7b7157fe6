//! Domain layer for sitechat
//!
//! This crate contains the core entities and value objects of the console
//! core. It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Site scope
//!
//! A [`SiteScope`] is the active tenant: site id, bearer credential and
//! display name. Everything that talks to the backend is keyed by it.
//!
//! ## Sessions and messages
//!
//! A [`Session`] is a server-tracked conversation. Its local message log is a
//! [`Conversation`], which enforces that only the last message may still be
//! streaming.
//!
//! ## Crawl jobs
//!
//! A crawl job reports progress as discrete [`CrawlEvent`]s. [`CrawlJobState`]
//! folds them into the current status, a bounded [`EventHistory`] and a
//! [`CrawlPhase`].

pub mod core;
pub mod crawl;
pub mod scope;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use core::{error::DomainError, question::Question};
pub use crawl::{
    event::CrawlEvent,
    history::EventHistory,
    state::{CrawlJobState, CrawlPhase},
};
pub use scope::SiteScope;
pub use session::{
    conversation::Conversation,
    entities::{ChatTurn, Message, Role, Session},
};
