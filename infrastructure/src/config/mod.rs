//! Configuration file loading for sitechat
//!
//! This module handles file I/O and merging of configuration from multiple
//! sources. The priority order (highest to lowest):
//!
//! 1. `SITECHAT_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./sitechat.toml` or `./.sitechat.toml`
//! 4. Global: `~/.config/sitechat/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigIssue, FileApiConfig, FileConfig, FileCrawlConfig, FileLoggingConfig, FileScopeConfig,
    Severity,
};
pub use loader::{ConfigLoader, ENV_PREFIX};
