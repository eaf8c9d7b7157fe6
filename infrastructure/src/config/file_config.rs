//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly; conversion helpers build the runtime
//! types the application layer consumes.

use crate::http::HttpSettings;
use serde::{Deserialize, Serialize};
use sitechat_application::MonitorConfig;
use sitechat_domain::SiteScope;
use std::fmt;
use std::time::Duration;

/// How serious a configuration issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The configuration cannot work at all.
    Error,
    /// The configuration works but may not behave as expected.
    Warning,
}

/// A detected issue in the loaded configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    /// Dotted key, e.g. `api.base_url`.
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Raw `[api]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileApiConfig {
    /// Base URL of the REST API
    pub base_url: String,
    /// Base URL of the event channel service (defaults to `base_url`)
    pub events_url: Option<String>,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for FileApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            events_url: None,
            connect_timeout_secs: 10,
        }
    }
}

/// Raw `[scope]` section: the tenant selected at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileScopeConfig {
    pub site_id: Option<String>,
    pub token: Option<String>,
    pub name: Option<String>,
}

impl FileScopeConfig {
    fn any_set(&self) -> bool {
        self.site_id.is_some() || self.token.is_some() || self.name.is_some()
    }
}

/// Raw `[crawl]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCrawlConfig {
    /// Delay between a finished crawl and the catalog refresh
    pub refresh_delay_ms: u64,
    /// Number of status events kept in history
    pub history_capacity: usize,
}

impl Default for FileCrawlConfig {
    fn default() -> Self {
        let defaults = MonitorConfig::default();
        Self {
            refresh_delay_ms: defaults.refresh_delay.as_millis() as u64,
            history_capacity: defaults.history_capacity,
        }
    }
}

/// Raw `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for daily-rolling diagnostic log files
    pub dir: Option<String>,
    /// Path of the JSONL transcript file
    pub transcript: Option<String>,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub api: FileApiConfig,
    pub scope: FileScopeConfig,
    pub crawl: FileCrawlConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        check_url(&mut issues, "api.base_url", &self.api.base_url);
        if let Some(events_url) = &self.api.events_url {
            check_url(&mut issues, "api.events_url", events_url);
        }
        if self.api.connect_timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                "api.connect_timeout_secs",
                "0 disables the connect timeout",
            ));
        }

        if self.scope.any_set() && self.initial_scope().is_none() {
            issues.push(ConfigIssue::warning(
                "scope",
                "site_id, token and name must all be set; starting without a site",
            ));
        }

        if self.crawl.history_capacity == 0 {
            issues.push(ConfigIssue::warning(
                "crawl.history_capacity",
                "0 is not allowed, keeping 1 event",
            ));
        }

        issues
    }

    /// The configured tenant, if complete.
    pub fn initial_scope(&self) -> Option<SiteScope> {
        let scope = SiteScope::new(
            self.scope.site_id.clone()?,
            self.scope.token.clone()?,
            self.scope.name.clone()?,
        );
        scope.is_valid().then_some(scope)
    }

    pub fn http_settings(&self) -> HttpSettings {
        let settings = HttpSettings::new(self.api.base_url.clone());
        let settings = match &self.api.events_url {
            Some(events_url) => settings.with_events_base(events_url.clone()),
            None => settings,
        };
        let timeout = (self.api.connect_timeout_secs > 0)
            .then(|| Duration::from_secs(self.api.connect_timeout_secs));
        settings.with_connect_timeout(timeout)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::default()
            .with_refresh_delay(Duration::from_millis(self.crawl.refresh_delay_ms))
            .with_history_capacity(self.crawl.history_capacity.max(1))
    }
}

fn check_url(issues: &mut Vec<ConfigIssue>, field: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        issues.push(ConfigIssue::error(field, "cannot be empty"));
    } else if !(value.starts_with("http://") || value.starts_with("https://")) {
        issues.push(ConfigIssue::error(
            field,
            format!("'{}' must start with http:// or https://", value),
        ));
    }
}
