//! CLI entrypoint for sitechat
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use colored::Colorize;
use sitechat_application::{
    ConversationEngine, ConversationLogger, ConversationProgress, CrawlJobMonitor,
    NoConversationLogger, SiteScopeContext, StartOutcome, StopOutcome, TurnOutcome,
};
use sitechat_domain::SiteScope;
use sitechat_infrastructure::{
    ConfigLoader, FileConfig, JsonlConversationLogger, Severity, SiteChatHttpClient,
};
use sitechat_presentation::{
    ChatRepl, Cli, Commands, ConsoleFormatter, CrawlCommand, CrawlWatcher, SessionsCommand,
    StreamingReporter, WatchEnd,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Extra time allowed for the catalog refresh request itself.
const REFRESH_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_logging(cli.verbose, config.logging.dir.as_deref());
    info!("Starting sitechat");

    report_config_issues(&config)?;

    let Some(command) = cli.command.clone() else {
        bail!("No command given. Try `sitechat chat` or `sitechat --help`.");
    };

    // === Dependency Injection ===
    let scope = Arc::new(build_scope_context(&cli, &config)?);
    let client = Arc::new(
        SiteChatHttpClient::new(&config.http_settings()).context("Failed to set up HTTP client")?,
    );

    let transcript: Arc<dyn ConversationLogger> = match &config.logging.transcript {
        Some(path) => match JsonlConversationLogger::new(path) {
            Some(logger) => {
                info!("Writing transcript to {}", logger.path().display());
                Arc::new(logger)
            }
            None => {
                warn!("Could not open transcript file {}", path);
                Arc::new(NoConversationLogger)
            }
        },
        None => Arc::new(NoConversationLogger),
    };

    let reporter: Arc<dyn ConversationProgress> = if cli.quiet {
        Arc::new(StreamingReporter::quiet())
    } else {
        Arc::new(StreamingReporter::new())
    };

    let engine = ConversationEngine::new(scope.clone(), client.clone(), client.clone())
        .with_progress(reporter)
        .with_conversation_logger(transcript.clone())
        .install();

    match command {
        Commands::Chat => {
            ChatRepl::new(engine, scope).run().await?;
        }
        Commands::Ask { question } => ask(&engine, &question).await?,
        Commands::Sessions { command } => sessions(&engine, command).await?,
        Commands::Crawl { command } => {
            let monitor = CrawlJobMonitor::new(scope.clone(), client.clone(), client)
                .with_config(config.monitor_config())
                .with_conversation_logger(transcript)
                .install();
            crawl(&monitor, command).await?;
        }
    }

    Ok(())
}

/// Console logs go to stderr so they never interleave with streamed answers.
fn init_logging(verbose: u8, dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = match (verbose, EnvFilter::try_from_default_env()) {
        (0, Ok(filter)) => filter,
        (0, Err(_)) => EnvFilter::new("warn"),
        (1, _) => EnvFilter::new("info"),
        (2, _) => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sitechat.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            None
        }
    }
}

fn report_config_issues(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            Severity::Error => eprintln!("{} {}", "config error:".red().bold(), issue),
            Severity::Warning => eprintln!("{} {}", "config warning:".yellow().bold(), issue),
        }
    }
    if issues.iter().any(|i| i.severity == Severity::Error) {
        bail!("Invalid configuration");
    }
    Ok(())
}

/// The starting scope: config values overridden field by field from the
/// command line. The display name falls back to the site id.
fn build_scope_context(cli: &Cli, config: &FileConfig) -> Result<SiteScopeContext> {
    let site_id = cli.site_id.clone().or_else(|| config.scope.site_id.clone());
    let token = cli.token.clone().or_else(|| config.scope.token.clone());
    let name = cli.site_name.clone().or_else(|| config.scope.name.clone());

    match (site_id, token) {
        (Some(site_id), Some(token)) => {
            let name = name.unwrap_or_else(|| site_id.clone());
            let scope = SiteScope::new(site_id, token, name);
            if cli.has_scope_override() {
                return SiteScopeContext::with_scope(scope).context("Invalid site on command line");
            }
            Ok(SiteScopeContext::with_scope(scope).unwrap_or_default())
        }
        _ if cli.has_scope_override() => {
            bail!("--site-id and --token are both required to select a site")
        }
        _ => Ok(SiteScopeContext::new()),
    }
}

async fn ask(engine: &ConversationEngine, question: &str) -> Result<()> {
    match engine.submit(question).await? {
        TurnOutcome::Completed { .. } => Ok(()),
        TurnOutcome::Fallback { reason, .. } => bail!("No answer: {}", reason),
        TurnOutcome::Discarded => bail!("Answer discarded: the site changed"),
    }
}

async fn sessions(engine: &ConversationEngine, command: SessionsCommand) -> Result<()> {
    match command {
        SessionsCommand::List => {
            let sessions = engine.refresh_sessions().await?;
            print!("{}", ConsoleFormatter::sessions(&sessions, None));
        }
        SessionsCommand::Show { id } => {
            engine.select_session(&id).await?;
            print!("{}", ConsoleFormatter::messages(&engine.messages()));
        }
        SessionsCommand::Delete { id } => {
            engine.delete_session(&id).await?;
            println!("{} {}", "Deleted".green(), id);
        }
    }
    Ok(())
}

async fn crawl(monitor: &Arc<CrawlJobMonitor>, command: CrawlCommand) -> Result<()> {
    match command {
        CrawlCommand::Start { url, watch } => {
            // Subscribe first so early events are not missed.
            let watcher = watch.then(|| CrawlWatcher::new(monitor.subscribe()));
            match monitor.start(&url).await? {
                StartOutcome::Started => println!("{} {}", "Crawl started:".green(), url),
                StartOutcome::AlreadyRunning => print_notice(monitor),
            }
            if let Some(watcher) = watcher {
                follow(monitor, watcher).await;
            }
        }
        CrawlCommand::Stop => match monitor.stop().await? {
            StopOutcome::Stopped => println!("{}", "Crawl stopped".green()),
            StopOutcome::NotRunning => print_notice(monitor),
        },
        CrawlCommand::Watch => {
            follow(monitor, CrawlWatcher::new(monitor.subscribe())).await;
        }
    }
    Ok(())
}

fn print_notice(monitor: &CrawlJobMonitor) {
    if let Some(notice) = monitor.snapshot().notice {
        println!("{}", ConsoleFormatter::notice(&notice));
    }
}

/// Print events until the crawl ends, then wait for the catalog refresh it
/// triggered so the process does not exit first.
async fn follow(monitor: &CrawlJobMonitor, watcher: CrawlWatcher) {
    let end = watcher.run().await;
    info!("Stopped following crawl: {:?}", end);
    if end != WatchEnd::Finished || !monitor.snapshot().refresh_pending() {
        return;
    }

    println!("{}", "Refreshing document catalog...".dimmed());
    let mut snapshots = monitor.subscribe();
    let wait = monitor.config().refresh_delay + REFRESH_GRACE;
    let refreshed = tokio::time::timeout(wait, snapshots.wait_for(|s| !s.refresh_pending()))
        .await
        .is_ok_and(|r| r.is_ok());
    if !refreshed {
        warn!("Catalog refresh did not finish within {:?}", wait);
    }
}
