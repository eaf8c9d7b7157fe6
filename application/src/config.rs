//! Application-level configuration.
//!
//! These types control how the use cases behave at runtime. The
//! infrastructure layer builds them from the config file.

use sitechat_domain::crawl::history::DEFAULT_HISTORY_CAPACITY;
use std::time::Duration;

/// Delay between a terminal crawl event and the catalog refresh, giving the
/// backend time to finish indexing.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(2000);

/// Crawl monitor behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub refresh_delay: Duration,
    pub history_capacity: usize,
}

impl MonitorConfig {
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_delay: DEFAULT_REFRESH_DELAY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}
