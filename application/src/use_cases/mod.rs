//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod conversation;
pub mod crawl_monitor;
pub mod session_store;
