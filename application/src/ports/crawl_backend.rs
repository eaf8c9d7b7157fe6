//! Crawl backend port
//!
//! Start/stop control for a tenant's crawl job, its status event channel,
//! and the document catalog refresh trigger.

use super::chat_backend::GatewayError;
use super::event_source::CrawlEventSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sitechat_domain::SiteScope;

/// Reply to a start or stop request: `{status, message?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl CrawlReply {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: None,
        }
    }

    /// The backend refused to start because a job is already active.
    pub fn is_already_running(&self) -> bool {
        self.status_is("already running")
    }

    /// The backend had nothing to stop.
    pub fn is_not_running(&self) -> bool {
        self.status_is("not running")
    }

    fn status_is(&self, expected: &str) -> bool {
        let normalized = self.status.trim().to_lowercase().replace(['_', '-'], " ");
        normalized == expected
    }
}

/// Crawl job control and status channel.
#[async_trait]
pub trait CrawlBackend: Send + Sync {
    async fn start_crawl(&self, scope: &SiteScope, url: &str) -> Result<CrawlReply, GatewayError>;

    async fn stop_crawl(&self, scope: &SiteScope) -> Result<CrawlReply, GatewayError>;

    /// Open the scope's status event channel.
    async fn open_events(&self, scope: &SiteScope) -> Result<CrawlEventSource, GatewayError>;
}

/// Trigger for the external document catalog.
#[async_trait]
pub trait CatalogRefresher: Send + Sync {
    async fn refresh_catalog(&self, scope: &SiteScope) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_statuses_are_normalized() {
        assert!(CrawlReply::new("already running").is_already_running());
        assert!(CrawlReply::new("Already_Running").is_already_running());
        assert!(CrawlReply::new(" not-running ").is_not_running());
        assert!(!CrawlReply::new("started").is_already_running());
        assert!(!CrawlReply::new("stopped").is_not_running());
    }

    #[test]
    fn reply_deserializes_without_message() {
        let reply: CrawlReply = serde_json::from_str(r#"{"status": "started"}"#).unwrap();
        assert_eq!(reply.status, "started");
        assert!(reply.message.is_none());
    }
}
