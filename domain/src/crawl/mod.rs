//! Crawl job domain.
//!
//! - [`event::CrawlEvent`]: one status message pushed by the backend
//! - [`history::EventHistory`]: bounded, ordered event history
//! - [`state::CrawlJobState`]: folded job state and its [`state::CrawlPhase`]

pub mod event;
pub mod history;
pub mod state;
