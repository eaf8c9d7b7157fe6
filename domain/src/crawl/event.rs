//! Crawl status events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A status message from a running crawl job (Value Object)
///
/// `end == true` marks the terminal event of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlEvent {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub end: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl CrawlEvent {
    pub fn new(url: impl Into<String>, status: impl Into<String>, end: bool) -> Self {
        Self {
            url: url.into(),
            status: status.into(),
            message: String::new(),
            end,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_message_without_timestamp() {
        let event: CrawlEvent = serde_json::from_str(
            r#"{"status": "crawling", "message": "page 3", "url": "https://example.com/a", "end": false}"#,
        )
        .unwrap();
        assert_eq!(event.status, "crawling");
        assert_eq!(event.url, "https://example.com/a");
        assert!(!event.is_terminal());
    }

    #[test]
    fn missing_end_defaults_to_false() {
        let event: CrawlEvent = serde_json::from_str(r#"{"status": "queued"}"#).unwrap();
        assert!(!event.end);
        assert!(event.message.is_empty());
    }
}
