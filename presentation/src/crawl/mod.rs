//! Crawl status following

pub mod watcher;
