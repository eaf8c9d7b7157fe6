//! Presentation layer for sitechat
//!
//! This crate contains CLI definitions, the interactive chat REPL, live
//! rendering of streamed answers and crawl status output.

pub mod chat;
pub mod cli;
pub mod crawl;
pub mod output;
pub mod progress;

pub use chat::repl::ChatRepl;
pub use cli::commands::{Cli, Commands, CrawlCommand, SessionsCommand};
pub use crawl::watcher::{CrawlWatcher, WatchCursor, WatchEnd};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::StreamingReporter;
