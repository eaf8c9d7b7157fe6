//! Crawl job monitor use case.
//!
//! Tracks one tenant's crawl job from start/stop requests and the status
//! events pushed over the scope's event channel. There is exactly one channel
//! per valid scope; a scope change closes it and opens a fresh one, and a
//! failed channel stays closed until the next scope change.
//!
//! A terminal event (`end == true`) schedules one catalog refresh after
//! [`MonitorConfig::refresh_delay`].

use crate::config::MonitorConfig;
use crate::ports::chat_backend::GatewayError;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::crawl_backend::{CatalogRefresher, CrawlBackend};
use crate::ports::event_source::SourceError;
use crate::scope::{ScopeChange, ScopeListener, SiteScopeContext};
use sitechat_domain::{CrawlEvent, CrawlJobState, CrawlPhase, SiteScope};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors returned by crawl control operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("No valid site scope selected")]
    NoScope,

    #[error("Crawl URL cannot be empty")]
    EmptyUrl,

    #[error("A start request is already pending")]
    Busy,

    #[error("Site scope changed while the request was pending")]
    ScopeChanged,

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Result of [`CrawlJobMonitor::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The backend already runs a job for this scope. Nothing changed.
    AlreadyRunning,
}

/// Result of [`CrawlJobMonitor::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The backend had no job to stop. Nothing changed.
    NotRunning,
}

/// User-facing notice about the last crawl operation or the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlNotice {
    AlreadyRunning,
    NotRunning,
    StartFailed(String),
    StopFailed(String),
    ChannelClosed,
    ChannelFailed(String),
}

impl CrawlNotice {
    /// Benign notices report a conflict, not a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, CrawlNotice::AlreadyRunning | CrawlNotice::NotRunning)
    }
}

impl fmt::Display for CrawlNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlNotice::AlreadyRunning => write!(f, "A crawl is already running for this site"),
            CrawlNotice::NotRunning => write!(f, "No crawl is running for this site"),
            CrawlNotice::StartFailed(e) => write!(f, "Could not start the crawl: {}", e),
            CrawlNotice::StopFailed(e) => write!(f, "Could not stop the crawl: {}", e),
            CrawlNotice::ChannelClosed => write!(f, "Status channel closed by the server"),
            CrawlNotice::ChannelFailed(e) => write!(f, "Status channel failed: {}", e),
        }
    }
}

/// Published view of the monitor, delivered through [`CrawlJobMonitor::subscribe`].
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSnapshot {
    pub generation: u64,
    pub phase: CrawlPhase,
    pub status: Option<CrawlEvent>,
    pub history: Vec<CrawlEvent>,
    pub evicted: u64,
    pub notice: Option<CrawlNotice>,
    pub channel_open: bool,
    pub refreshes_scheduled: u64,
    /// Refreshes of this scope that have run, successfully or not.
    pub refreshes_finished: u64,
}

impl CrawlSnapshot {
    pub fn running(&self) -> bool {
        self.phase == CrawlPhase::Running
    }

    /// A catalog refresh was scheduled and has not run yet.
    pub fn refresh_pending(&self) -> bool {
        self.refreshes_finished < self.refreshes_scheduled
    }
}

struct ChannelHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    fn close(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

struct MonitorInner {
    state: CrawlJobState,
    scope: Option<SiteScope>,
    generation: u64,
    channel: Option<ChannelHandle>,
    notice: Option<CrawlNotice>,
    refreshes_scheduled: u64,
    refreshes_finished: u64,
}

impl MonitorInner {
    fn new(capacity: usize, scope: Option<SiteScope>, generation: u64) -> Self {
        Self {
            state: CrawlJobState::new(capacity),
            scope,
            generation,
            channel: None,
            notice: None,
            refreshes_scheduled: 0,
            refreshes_finished: 0,
        }
    }

    fn snapshot(&self) -> CrawlSnapshot {
        CrawlSnapshot {
            generation: self.generation,
            phase: self.state.phase(),
            status: self.state.status().cloned(),
            history: self.state.history().to_vec(),
            evicted: self.state.history().evicted(),
            notice: self.notice.clone(),
            channel_open: self.channel.is_some(),
            refreshes_scheduled: self.refreshes_scheduled,
            refreshes_finished: self.refreshes_finished,
        }
    }
}

/// Use case tracking a crawl job for the active scope.
pub struct CrawlJobMonitor {
    scope: Arc<SiteScopeContext>,
    backend: Arc<dyn CrawlBackend>,
    catalog: Arc<dyn CatalogRefresher>,
    config: MonitorConfig,
    conversation_logger: Arc<dyn ConversationLogger>,
    inner: Mutex<MonitorInner>,
    snapshots: watch::Sender<CrawlSnapshot>,
    self_ref: Weak<CrawlJobMonitor>,
}

impl CrawlJobMonitor {
    pub fn new(
        scope: Arc<SiteScopeContext>,
        backend: Arc<dyn CrawlBackend>,
        catalog: Arc<dyn CatalogRefresher>,
    ) -> Self {
        let config = MonitorConfig::default();
        let (current, generation) = scope.snapshot();
        let inner = MonitorInner::new(config.history_capacity, current, generation);
        let (snapshots, _) = watch::channel(inner.snapshot());
        Self {
            scope,
            backend,
            catalog,
            config,
            conversation_logger: Arc::new(NoConversationLogger),
            inner: Mutex::new(inner),
            snapshots,
            self_ref: Weak::new(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        {
            let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
            inner.state = CrawlJobState::new(config.history_capacity);
        }
        self.config = config;
        self
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    /// Share the monitor, subscribe it to scope changes and open the event
    /// channel if a valid scope is already selected.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install(self) -> Arc<Self> {
        let monitor = Arc::new_cyclic(|weak| {
            let mut monitor = self;
            monitor.self_ref = weak.clone();
            monitor
        });
        let listener: Weak<dyn ScopeListener> = Arc::downgrade(&monitor) as Weak<dyn ScopeListener>;
        monitor.scope.register(listener);
        monitor.attach();
        monitor
    }

    pub fn snapshot(&self) -> CrawlSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CrawlSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    // ==================== Control ====================

    /// Ask the backend to crawl `url` for the active scope.
    pub async fn start(&self, url: &str) -> Result<StartOutcome, MonitorError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(MonitorError::EmptyUrl);
        }
        let (scope, generation) = self.valid_scope()?;

        {
            let mut inner = self.lock();
            self.sync(&mut inner, generation);
            if !inner.state.begin_start() {
                return Err(MonitorError::Busy);
            }
            inner.notice = None;
            self.publish(&inner);
        }
        info!("Starting crawl of {} for site {}", url, scope.site_id);

        let result = self.backend.start_crawl(&scope, url).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(MonitorError::ScopeChanged);
        }
        let outcome = match result {
            Ok(reply) if reply.is_already_running() => {
                info!("Crawl already running for site {}", scope.site_id);
                inner.state.start_rejected();
                inner.notice = Some(CrawlNotice::AlreadyRunning);
                Ok(StartOutcome::AlreadyRunning)
            }
            Ok(reply) => {
                debug!("Crawl start acknowledged: {}", reply.status);
                inner.state.start_acknowledged();
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                warn!("Crawl start failed: {}", e);
                inner.state.start_rejected();
                inner.notice = Some(CrawlNotice::StartFailed(e.to_string()));
                Err(MonitorError::Gateway(e))
            }
        };
        self.publish(&inner);
        outcome
    }

    /// Ask the backend to stop the active scope's crawl.
    ///
    /// The event channel stays open.
    pub async fn stop(&self) -> Result<StopOutcome, MonitorError> {
        let (scope, generation) = self.valid_scope()?;
        info!("Stopping crawl for site {}", scope.site_id);

        let result = self.backend.stop_crawl(&scope).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(MonitorError::ScopeChanged);
        }
        let outcome = match result {
            Ok(reply) if reply.is_not_running() => {
                info!("No crawl running for site {}", scope.site_id);
                inner.notice = Some(CrawlNotice::NotRunning);
                Ok(StopOutcome::NotRunning)
            }
            Ok(_) => {
                inner.state.stopped();
                inner.notice = None;
                Ok(StopOutcome::Stopped)
            }
            Err(e) => {
                warn!("Crawl stop failed: {}", e);
                inner.notice = Some(CrawlNotice::StopFailed(e.to_string()));
                Err(MonitorError::Gateway(e))
            }
        };
        self.publish(&inner);
        outcome
    }

    fn apply_event_for(&self, generation: u64, event: CrawlEvent) {
        let refresh_scope = {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!("Dropping event from stale scope generation {}", generation);
                return;
            }
            debug!(
                "Crawl event: status={} url={} end={}",
                event.status, event.url, event.end
            );
            self.conversation_logger.log(ConversationEvent::new(
                "crawl_event",
                serde_json::json!({
                    "site_id": inner.scope.as_ref().map(|s| s.site_id.clone()),
                    "url": event.url,
                    "status": event.status,
                    "message": event.message,
                    "end": event.end,
                }),
            ));
            let terminal = inner.state.apply(event);
            let refresh_scope = if terminal {
                inner.refreshes_scheduled += 1;
                inner.scope.clone()
            } else {
                None
            };
            self.publish(&inner);
            refresh_scope
        };

        if let Some(scope) = refresh_scope {
            self.schedule_refresh(scope, generation);
        }
    }

    fn schedule_refresh(&self, scope: SiteScope, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available; skipping catalog refresh");
            return;
        };
        let catalog = self.catalog.clone();
        let monitor = self.self_ref.clone();
        let delay = self.config.refresh_delay;
        info!(
            "Crawl finished for site {}; refreshing catalog in {:?}",
            scope.site_id, delay
        );
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            match catalog.refresh_catalog(&scope).await {
                Ok(()) => info!("Catalog refreshed for site {}", scope.site_id),
                Err(e) => warn!("Catalog refresh failed for site {}: {}", scope.site_id, e),
            }
            if let Some(monitor) = monitor.upgrade() {
                monitor.refresh_finished(generation);
            }
        });
    }

    fn refresh_finished(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        inner.refreshes_finished += 1;
        self.publish(&inner);
    }

    // ==================== Channel ====================

    /// Open the event channel for the active scope if none is open.
    pub fn attach(&self) {
        let (scope, generation) = self.scope.snapshot();
        let Some(scope) = scope.filter(SiteScope::is_valid) else {
            debug!("No valid scope; event channel not opened");
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime available; event channel not opened");
            return;
        };

        let mut inner = self.lock();
        self.sync(&mut inner, generation);
        if inner.channel.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let task = handle.spawn(listen(
            self.self_ref.clone(),
            self.backend.clone(),
            scope,
            generation,
            cancel.clone(),
        ));
        inner.channel = Some(ChannelHandle { cancel, task });
        self.publish(&inner);
    }

    /// Close the event channel without touching the scope.
    pub fn detach(&self) {
        let mut inner = self.lock();
        if let Some(channel) = inner.channel.take() {
            channel.close();
            info!("Event channel detached");
            self.publish(&inner);
        }
    }

    fn channel_ended(&self, generation: u64, notice: CrawlNotice) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        inner.channel = None;
        inner.notice = Some(notice);
        self.publish(&inner);
    }

    // ==================== Helpers ====================

    fn valid_scope(&self) -> Result<(SiteScope, u64), MonitorError> {
        match self.scope.snapshot() {
            (Some(scope), generation) if scope.is_valid() => Ok((scope, generation)),
            _ => Err(MonitorError::NoScope),
        }
    }

    /// Catch up with a scope change this monitor was not notified of.
    fn sync(&self, inner: &mut MonitorInner, generation: u64) {
        if inner.generation < generation {
            if let Some(channel) = inner.channel.take() {
                channel.close();
            }
            *inner = MonitorInner::new(
                self.config.history_capacity,
                self.scope.current(),
                generation,
            );
        }
    }

    fn publish(&self, inner: &MonitorInner) {
        self.snapshots.send_replace(inner.snapshot());
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScopeListener for CrawlJobMonitor {
    fn on_scope_changed(&self, change: &ScopeChange) {
        {
            let mut inner = self.lock();
            if let Some(channel) = inner.channel.take() {
                channel.close();
                info!("Closed event channel for scope generation {}", inner.generation);
            }
            *inner = MonitorInner::new(
                self.config.history_capacity,
                change.scope.clone(),
                change.generation,
            );
            self.publish(&inner);
        }
        if change.scope.as_ref().is_some_and(SiteScope::is_valid) {
            self.attach();
        }
    }
}

impl Drop for CrawlJobMonitor {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(channel) = inner.channel.take() {
            channel.close();
        }
    }
}

/// Listener task: one per open channel.
async fn listen(
    monitor: Weak<CrawlJobMonitor>,
    backend: Arc<dyn CrawlBackend>,
    scope: SiteScope,
    generation: u64,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = backend.open_events(&scope) => opened,
    };
    let mut source = match opened {
        Ok(source) => source,
        Err(e) => {
            warn!("Could not open event channel for site {}: {}", scope.site_id, e);
            if let Some(monitor) = monitor.upgrade() {
                monitor.channel_ended(generation, CrawlNotice::ChannelFailed(e.to_string()));
            }
            return;
        }
    };
    info!("Event channel open for site {}", scope.site_id);

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = source.next_event() => next,
        };
        let Some(strong) = monitor.upgrade() else {
            return;
        };
        match next {
            Some(Ok(event)) => strong.apply_event_for(generation, event),
            Some(Err(SourceError::Malformed(e))) => {
                warn!("Skipping malformed crawl event: {}", e);
            }
            Some(Err(e)) => {
                warn!("Event channel for site {} failed: {}", scope.site_id, e);
                strong.channel_ended(generation, CrawlNotice::ChannelFailed(e.to_string()));
                return;
            }
            None => {
                info!("Event channel for site {} closed", scope.site_id);
                strong.channel_ended(generation, CrawlNotice::ChannelClosed);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::crawl_backend::CrawlReply;
    use crate::ports::event_source::{ChannelSource, CrawlEventSource, ScriptedSource};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    type EventSender = mpsc::UnboundedSender<Result<CrawlEvent, SourceError>>;

    // ==================== Test Mocks ====================

    #[derive(Default)]
    struct MockCrawl {
        start_replies: Mutex<VecDeque<Result<CrawlReply, GatewayError>>>,
        stop_replies: Mutex<VecDeque<Result<CrawlReply, GatewayError>>>,
        sources: Mutex<VecDeque<CrawlEventSource>>,
        idle_senders: Mutex<Vec<EventSender>>,
        opened: Mutex<Vec<String>>,
        watcher: Mutex<Option<watch::Receiver<CrawlSnapshot>>>,
        phases_during_start: Mutex<Vec<CrawlPhase>>,
        start_gate: Mutex<Option<oneshot::Receiver<()>>>,
        start_calls: AtomicUsize,
    }

    impl MockCrawl {
        fn on_start(self, reply: Result<CrawlReply, GatewayError>) -> Self {
            self.start_replies.lock().unwrap().push_back(reply);
            self
        }

        fn on_stop(self, reply: Result<CrawlReply, GatewayError>) -> Self {
            self.stop_replies.lock().unwrap().push_back(reply);
            self
        }

        fn with_source(self, source: CrawlEventSource) -> Self {
            self.sources.lock().unwrap().push_back(source);
            self
        }

        /// The next start call waits until the returned sender fires.
        fn hold_start(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.start_gate.lock().unwrap() = Some(rx);
            tx
        }

        fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CrawlBackend for MockCrawl {
        async fn start_crawl(&self, _scope: &SiteScope, _url: &str) -> Result<CrawlReply, GatewayError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.start_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if let Some(watcher) = self.watcher.lock().unwrap().as_ref() {
                self.phases_during_start
                    .lock()
                    .unwrap()
                    .push(watcher.borrow().phase);
            }
            self.start_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CrawlReply::new("started")))
        }

        async fn stop_crawl(&self, _scope: &SiteScope) -> Result<CrawlReply, GatewayError> {
            self.stop_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CrawlReply::new("stopped")))
        }

        async fn open_events(&self, scope: &SiteScope) -> Result<CrawlEventSource, GatewayError> {
            self.opened.lock().unwrap().push(scope.site_id.clone());
            if let Some(source) = self.sources.lock().unwrap().pop_front() {
                return Ok(source);
            }
            // Quiet channel that never ends.
            let (tx, source) = ChannelSource::pair();
            self.idle_senders.lock().unwrap().push(tx);
            Ok(source.boxed())
        }
    }

    #[derive(Default)]
    struct MockCatalog {
        refreshed: Mutex<Vec<String>>,
    }

    impl MockCatalog {
        fn count(&self) -> usize {
            self.refreshed.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CatalogRefresher for MockCatalog {
        async fn refresh_catalog(&self, scope: &SiteScope) -> Result<(), GatewayError> {
            self.refreshed.lock().unwrap().push(scope.site_id.clone());
            Ok(())
        }
    }

    fn context() -> Arc<SiteScopeContext> {
        Arc::new(SiteScopeContext::with_scope(SiteScope::new("s1", "T", "Site")).unwrap())
    }

    fn monitor(
        context: Arc<SiteScopeContext>,
        backend: Arc<MockCrawl>,
        catalog: Arc<MockCatalog>,
    ) -> Arc<CrawlJobMonitor> {
        CrawlJobMonitor::new(context, backend, catalog).install()
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Fold an event in as if it came from the current channel.
    fn apply(monitor: &CrawlJobMonitor, event: CrawlEvent) {
        let generation = monitor.lock().generation;
        monitor.apply_event_for(generation, event);
    }

    fn progress(url: &str) -> CrawlEvent {
        CrawlEvent::new(url, "crawling", false)
    }

    fn finished() -> CrawlEvent {
        CrawlEvent::new("", "finished", true).with_message("42 pages")
    }

    // ==================== Start / stop ====================

    #[tokio::test(start_paused = true)]
    async fn already_running_returns_to_idle_without_running() {
        let backend = Arc::new(MockCrawl::default().on_start(Ok(CrawlReply::new("already running"))));
        let monitor = monitor(context(), backend.clone(), Arc::new(MockCatalog::default()));
        *backend.watcher.lock().unwrap() = Some(monitor.subscribe());

        let outcome = monitor.start("https://example.com").await.unwrap();

        assert_eq!(outcome, StartOutcome::AlreadyRunning);
        assert_eq!(*backend.phases_during_start.lock().unwrap(), vec![CrawlPhase::Starting]);
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.phase, CrawlPhase::Idle);
        assert!(!snapshot.running());
        assert_eq!(snapshot.notice, Some(CrawlNotice::AlreadyRunning));
        assert!(snapshot.notice.unwrap().is_benign());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_while_request_pending_is_busy() {
        let backend = Arc::new(MockCrawl::default());
        let release = backend.hold_start();
        let monitor = monitor(context(), backend.clone(), Arc::new(MockCatalog::default()));

        let first = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.start("https://example.com").await })
        };
        settle().await;
        assert_eq!(monitor.snapshot().phase, CrawlPhase::Starting);

        let second = monitor.start("https://example.com/other").await;

        assert!(matches!(second, Err(MonitorError::Busy)));
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 1);

        release.send(()).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), StartOutcome::Started);
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 1);
        assert!(monitor.snapshot().running());
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_start_enters_running() {
        let backend = Arc::new(MockCrawl::default());
        let monitor = monitor(context(), backend, Arc::new(MockCatalog::default()));

        assert_eq!(
            monitor.start("https://example.com").await.unwrap(),
            StartOutcome::Started
        );
        assert!(monitor.snapshot().running());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_returns_to_idle_with_notice() {
        let backend = Arc::new(MockCrawl::default().on_start(Err(GatewayError::HttpStatus {
            status: 502,
            message: "Bad Gateway".to_string(),
        })));
        let monitor = monitor(context(), backend, Arc::new(MockCatalog::default()));

        let result = monitor.start("https://example.com").await;

        assert!(matches!(result, Err(MonitorError::Gateway(_))));
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.phase, CrawlPhase::Idle);
        assert!(matches!(snapshot.notice, Some(CrawlNotice::StartFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_url_and_scope() {
        let monitor = monitor(
            Arc::new(SiteScopeContext::new()),
            Arc::new(MockCrawl::default()),
            Arc::new(MockCatalog::default()),
        );
        assert_eq!(monitor.start("  ").await, Err(MonitorError::EmptyUrl));
        assert_eq!(
            monitor.start("https://example.com").await,
            Err(MonitorError::NoScope)
        );
        assert_eq!(monitor.stop().await, Err(MonitorError::NoScope));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_not_running_is_benign() {
        let backend = Arc::new(MockCrawl::default().on_stop(Ok(CrawlReply::new("not running"))));
        let monitor = monitor(context(), backend, Arc::new(MockCatalog::default()));

        assert_eq!(monitor.stop().await.unwrap(), StopOutcome::NotRunning);

        let snapshot = monitor.snapshot();
        assert!(!snapshot.running());
        assert_eq!(snapshot.notice, Some(CrawlNotice::NotRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resets_running_and_status_locally() {
        let backend = Arc::new(MockCrawl::default());
        let monitor = monitor(context(), backend, Arc::new(MockCatalog::default()));
        apply(&monitor, progress("https://example.com/a"));
        assert!(monitor.snapshot().running());

        assert_eq!(monitor.stop().await.unwrap(), StopOutcome::Stopped);

        let snapshot = monitor.snapshot();
        assert!(!snapshot.running());
        assert!(snapshot.status.is_none());
        assert_eq!(snapshot.history.len(), 1);
        assert!(snapshot.channel_open);
    }

    // ==================== Events ====================

    #[tokio::test(start_paused = true)]
    async fn non_terminal_event_forces_running() {
        let monitor = monitor(
            context(),
            Arc::new(MockCrawl::default()),
            Arc::new(MockCatalog::default()),
        );
        assert_eq!(monitor.snapshot().phase, CrawlPhase::Idle);

        apply(&monitor, progress("https://example.com/a"));

        let snapshot = monitor.snapshot();
        assert!(snapshot.running());
        assert_eq!(snapshot.status.unwrap().url, "https://example.com/a");
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_event_schedules_one_delayed_refresh() {
        let catalog = Arc::new(MockCatalog::default());
        let monitor = monitor(context(), Arc::new(MockCrawl::default()), catalog.clone());
        apply(&monitor, progress("https://example.com/a"));

        apply(&monitor, finished());

        let snapshot = monitor.snapshot();
        assert!(!snapshot.running());
        assert_eq!(snapshot.refreshes_scheduled, 1);
        assert!(snapshot.refresh_pending());
        assert_eq!(snapshot.history.len(), 2);

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(catalog.count(), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(*catalog.refreshed.lock().unwrap(), vec!["s1".to_string()]);
        assert!(!monitor.snapshot().refresh_pending());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(catalog.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn each_terminal_event_refreshes_regardless_of_state() {
        let catalog = Arc::new(MockCatalog::default());
        let monitor = monitor(context(), Arc::new(MockCrawl::default()), catalog.clone());

        // Idle before, and idle again after the first.
        apply(&monitor, finished());
        apply(&monitor, finished());

        assert_eq!(monitor.snapshot().refreshes_scheduled, 2);
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(catalog.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_refresh_delay_is_honored() {
        let catalog = Arc::new(MockCatalog::default());
        let monitor = CrawlJobMonitor::new(context(), Arc::new(MockCrawl::default()), catalog.clone())
            .with_config(MonitorConfig::default().with_refresh_delay(Duration::from_millis(100)))
            .install();

        apply(&monitor, finished());
        tokio::time::sleep(Duration::from_millis(150)).await;
        settle().await;

        assert_eq!(catalog.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn history_is_bounded() {
        let monitor = CrawlJobMonitor::new(
            context(),
            Arc::new(MockCrawl::default()),
            Arc::new(MockCatalog::default()),
        )
        .with_config(MonitorConfig::default().with_history_capacity(3))
        .install();

        for i in 0..5 {
            apply(&monitor, progress(&format!("https://example.com/{}", i)));
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.history.len(), 3);
        assert_eq!(snapshot.evicted, 2);
        assert_eq!(snapshot.history[0].url, "https://example.com/2");
    }

    // ==================== Channel ====================

    #[tokio::test(start_paused = true)]
    async fn channel_events_update_state() {
        let (tx, source) = ChannelSource::pair();
        let backend = Arc::new(MockCrawl::default().with_source(source.boxed()));
        let monitor = monitor(context(), backend.clone(), Arc::new(MockCatalog::default()));
        settle().await;
        assert_eq!(backend.opened(), vec!["s1".to_string()]);
        assert!(monitor.snapshot().channel_open);

        tx.send(Ok(progress("https://example.com/a"))).unwrap();
        tx.send(Ok(progress("https://example.com/b"))).unwrap();
        settle().await;

        let snapshot = monitor.snapshot();
        assert!(snapshot.running());
        assert_eq!(snapshot.status.unwrap().url, "https://example.com/b");
        assert_eq!(snapshot.history.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_events_are_skipped() {
        let source = ScriptedSource::new(vec![
            Err(SourceError::Malformed("not json".to_string())),
            Ok(progress("https://example.com/a")),
        ]);
        let backend = Arc::new(MockCrawl::default().with_source(source.boxed()));
        let monitor = monitor(context(), backend, Arc::new(MockCatalog::default()));
        settle().await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.history.len(), 1);
        // Script ended after the last event.
        assert_eq!(snapshot.notice, Some(CrawlNotice::ChannelClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_channel_is_not_reopened() {
        let source = ScriptedSource::new(vec![Err(SourceError::Transport("reset".to_string()))]);
        let backend = Arc::new(MockCrawl::default().with_source(source.boxed()));
        let monitor = monitor(context(), backend.clone(), Arc::new(MockCatalog::default()));
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;

        let snapshot = monitor.snapshot();
        assert!(!snapshot.channel_open);
        assert!(matches!(snapshot.notice, Some(CrawlNotice::ChannelFailed(_))));
        assert_eq!(backend.opened().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scope_change_closes_channel_and_ignores_old_events() {
        let context = context();
        let (old_tx, old_source) = ChannelSource::pair();
        let (new_tx, new_source) = ChannelSource::pair();
        let backend = Arc::new(
            MockCrawl::default()
                .with_source(old_source.boxed())
                .with_source(new_source.boxed()),
        );
        let monitor = monitor(context.clone(), backend.clone(), Arc::new(MockCatalog::default()));
        settle().await;
        old_tx.send(Ok(progress("https://old.example.com/a"))).unwrap();
        settle().await;
        assert!(monitor.snapshot().running());

        context.select(SiteScope::new("s2", "T2", "Other")).unwrap();
        settle().await;

        let snapshot = monitor.snapshot();
        assert_eq!(backend.opened(), vec!["s1".to_string(), "s2".to_string()]);
        assert!(!snapshot.running());
        assert!(snapshot.history.is_empty());
        assert!(snapshot.channel_open);

        let _ = old_tx.send(Ok(finished()));
        settle().await;
        assert!(monitor.snapshot().history.is_empty());

        new_tx.send(Ok(progress("https://new.example.com/a"))).unwrap();
        settle().await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].url, "https://new.example.com/a");
        assert_eq!(snapshot.refreshes_scheduled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_scope_closes_channel_without_reopening() {
        let context = context();
        let backend = Arc::new(MockCrawl::default());
        let monitor = monitor(context.clone(), backend.clone(), Arc::new(MockCatalog::default()));
        settle().await;

        context.clear();
        settle().await;

        assert!(!monitor.snapshot().channel_open);
        assert_eq!(backend.opened().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn detach_closes_channel_and_attach_reopens() {
        let backend = Arc::new(MockCrawl::default());
        let monitor = monitor(context(), backend.clone(), Arc::new(MockCatalog::default()));
        settle().await;

        monitor.detach();
        assert!(!monitor.snapshot().channel_open);

        monitor.attach();
        settle().await;
        assert!(monitor.snapshot().channel_open);
        assert_eq!(backend.opened().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_updates() {
        let monitor = monitor(
            context(),
            Arc::new(MockCrawl::default()),
            Arc::new(MockCatalog::default()),
        );
        let mut rx = monitor.subscribe();
        rx.mark_unchanged();

        apply(&monitor, progress("https://example.com/a"));

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().running());
    }
}
