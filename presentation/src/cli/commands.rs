//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for sitechat
#[derive(Parser, Debug)]
#[command(name = "sitechat")]
#[command(author, version, about = "Console for a website chatbot service")]
#[command(long_about = r#"
sitechat talks to a website chatbot backend: ask questions about a site's
content, browse past conversations and drive the crawler that builds the
site's document catalog.

Configuration files are loaded from (in priority order):
1. SITECHAT_* environment variables (use __ for nesting, e.g. SITECHAT_SCOPE__SITE_ID)
2. --config <path>        Explicit config file
3. ./sitechat.toml        Project-level config
4. ~/.config/sitechat/config.toml   Global config

Example:
  sitechat chat
  sitechat ask "How do I reset my password?"
  sitechat crawl start https://docs.example.com --watch
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Site id to use (overrides config)
    #[arg(long, global = true, value_name = "ID")]
    pub site_id: Option<String>,

    /// Bearer token for the site (overrides config)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Display name of the site (overrides config)
    #[arg(long, global = true, value_name = "NAME")]
    pub site_name: Option<String>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive chat
    Chat,

    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        question: String,
    },

    /// Browse and manage past conversations
    Sessions {
        #[command(subcommand)]
        command: SessionsCommand,
    },

    /// Control the site crawler
    Crawl {
        #[command(subcommand)]
        command: CrawlCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SessionsCommand {
    /// List sessions for the site
    List,

    /// Print a session's messages
    Show {
        /// Session id
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CrawlCommand {
    /// Start crawling a URL
    Start {
        /// Root URL to crawl
        url: String,

        /// Follow status events until the crawl ends
        #[arg(short, long)]
        watch: bool,
    },

    /// Stop the running crawl
    Stop,

    /// Follow status events of the running crawl
    Watch,
}

impl Cli {
    /// Whether any scope field was given on the command line.
    pub fn has_scope_override(&self) -> bool {
        self.site_id.is_some() || self.token.is_some() || self.site_name.is_some()
    }
}
