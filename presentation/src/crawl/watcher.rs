//! Follows a crawl job on the console.

use crate::ConsoleFormatter;
use sitechat_application::{CrawlNotice, CrawlSnapshot};
use sitechat_domain::{CrawlEvent, CrawlPhase};
use tokio::sync::watch;

/// Why [`CrawlWatcher::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEnd {
    /// A terminal status event arrived.
    Finished,
    /// The crawl was stopped or never ran.
    Idle,
    /// The status channel closed or failed.
    ChannelLost,
    /// The site scope changed.
    ScopeChanged,
    /// Interrupted with Ctrl-C.
    Interrupted,
}

/// Tracks which events of a snapshot stream were already shown.
///
/// History is bounded, so the position is kept as the total number of
/// events ever recorded (`evicted + history.len()`).
#[derive(Debug, Clone, PartialEq)]
pub struct WatchCursor {
    generation: u64,
    seen: u64,
    notice: Option<CrawlNotice>,
    was_running: bool,
}

impl WatchCursor {
    /// Start after everything already in `snapshot`.
    pub fn new(snapshot: &CrawlSnapshot) -> Self {
        Self {
            generation: snapshot.generation,
            seen: total_events(snapshot),
            notice: snapshot.notice.clone(),
            was_running: snapshot.running(),
        }
    }

    /// Events recorded since the last call, oldest first.
    pub fn new_events<'a>(&mut self, snapshot: &'a CrawlSnapshot) -> &'a [CrawlEvent] {
        let total = total_events(snapshot);
        let unseen = total.saturating_sub(self.seen) as usize;
        self.seen = total;
        let from = snapshot.history.len().saturating_sub(unseen);
        &snapshot.history[from..]
    }

    /// The notice, if it changed since the last call.
    pub fn new_notice(&mut self, snapshot: &CrawlSnapshot) -> Option<CrawlNotice> {
        if snapshot.notice == self.notice {
            return None;
        }
        self.notice = snapshot.notice.clone();
        snapshot.notice.clone()
    }

    /// Whether following should stop after `snapshot` and its `events`.
    pub fn end(&mut self, snapshot: &CrawlSnapshot, events: &[CrawlEvent]) -> Option<WatchEnd> {
        if snapshot.generation != self.generation {
            return Some(WatchEnd::ScopeChanged);
        }
        if events.iter().any(CrawlEvent::is_terminal) {
            return Some(WatchEnd::Finished);
        }
        if !snapshot.channel_open {
            return Some(WatchEnd::ChannelLost);
        }
        let running = snapshot.running();
        let stopped = self.was_running && snapshot.phase == CrawlPhase::Idle;
        self.was_running = running;
        stopped.then_some(WatchEnd::Idle)
    }
}

fn total_events(snapshot: &CrawlSnapshot) -> u64 {
    snapshot.evicted + snapshot.history.len() as u64
}

/// Prints status events of the monitored crawl until it ends.
pub struct CrawlWatcher {
    snapshots: watch::Receiver<CrawlSnapshot>,
    cursor: WatchCursor,
}

impl CrawlWatcher {
    /// Subscribe before triggering a start so no event is missed.
    pub fn new(mut snapshots: watch::Receiver<CrawlSnapshot>) -> Self {
        let cursor = WatchCursor::new(&snapshots.borrow_and_update());
        Self { snapshots, cursor }
    }

    pub async fn run(mut self) -> WatchEnd {
        {
            let snapshot = self.snapshots.borrow();
            if !snapshot.channel_open {
                println!("{}", ConsoleFormatter::crawl_snapshot(&snapshot));
                return WatchEnd::ChannelLost;
            }
        }

        loop {
            tokio::select! {
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        return WatchEnd::ChannelLost;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("^C");
                    return WatchEnd::Interrupted;
                }
            }

            let snapshot = self.snapshots.borrow_and_update().clone();
            let events = self.cursor.new_events(&snapshot);
            for event in events {
                println!("{}", ConsoleFormatter::crawl_event(event));
            }
            if let Some(notice) = self.cursor.new_notice(&snapshot) {
                println!("{}", ConsoleFormatter::notice(&notice));
            }
            if let Some(end) = self.cursor.end(&snapshot, events) {
                return end;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(history: Vec<CrawlEvent>, evicted: u64) -> CrawlSnapshot {
        CrawlSnapshot {
            generation: 1,
            phase: CrawlPhase::Running,
            status: history.last().cloned(),
            history,
            evicted,
            notice: None,
            channel_open: true,
            refreshes_scheduled: 0,
            refreshes_finished: 0,
        }
    }

    fn event(n: usize) -> CrawlEvent {
        CrawlEvent::new(format!("https://e.com/{}", n), "crawling", false)
    }

    #[test]
    fn test_cursor_skips_events_already_present() {
        let mut cursor = WatchCursor::new(&snapshot(vec![event(1)], 0));
        let next = snapshot(vec![event(1), event(2), event(3)], 0);

        let urls: Vec<_> = cursor.new_events(&next).iter().map(|e| e.url.clone()).collect();
        assert_eq!(urls, vec!["https://e.com/2", "https://e.com/3"]);
        assert!(cursor.new_events(&next).is_empty());
    }

    #[test]
    fn test_cursor_counts_evicted_events() {
        // Capacity 2: after two more events the first one was dropped.
        let mut cursor = WatchCursor::new(&snapshot(vec![event(1), event(2)], 0));
        let next = snapshot(vec![event(3), event(4)], 2);

        let urls: Vec<_> = cursor.new_events(&next).iter().map(|e| e.url.clone()).collect();
        assert_eq!(urls, vec!["https://e.com/3", "https://e.com/4"]);
    }

    #[test]
    fn test_cursor_ends_on_terminal_event() {
        let mut cursor = WatchCursor::new(&snapshot(vec![], 0));
        let mut done = CrawlEvent::new("", "done", true);
        done.message = "42 pages".to_string();
        let mut next = snapshot(vec![done], 0);
        next.phase = CrawlPhase::Idle;

        let events = cursor.new_events(&next).to_vec();
        assert_eq!(cursor.end(&next, &events), Some(WatchEnd::Finished));
    }

    #[test]
    fn test_cursor_ends_when_stopped() {
        let mut cursor = WatchCursor::new(&snapshot(vec![], 0));
        let mut next = snapshot(vec![], 0);
        assert_eq!(cursor.end(&next, &[]), None);

        next.phase = CrawlPhase::Idle;
        assert_eq!(cursor.end(&next, &[]), Some(WatchEnd::Idle));
    }

    #[test]
    fn test_cursor_ends_on_lost_channel_and_scope_change() {
        let mut cursor = WatchCursor::new(&snapshot(vec![], 0));

        let mut closed = snapshot(vec![], 0);
        closed.channel_open = false;
        assert_eq!(cursor.end(&closed, &[]), Some(WatchEnd::ChannelLost));

        let mut other = snapshot(vec![], 0);
        other.generation = 2;
        assert_eq!(cursor.end(&other, &[]), Some(WatchEnd::ScopeChanged));
    }

    #[test]
    fn test_notice_reported_once() {
        let mut cursor = WatchCursor::new(&snapshot(vec![], 0));
        let mut next = snapshot(vec![], 0);
        next.notice = Some(CrawlNotice::NotRunning);

        assert_eq!(cursor.new_notice(&next), Some(CrawlNotice::NotRunning));
        assert_eq!(cursor.new_notice(&next), None);
    }

    #[tokio::test]
    async fn test_watcher_returns_after_terminal_event() {
        let (tx, rx) = watch::channel(snapshot(vec![], 0));
        let watcher = CrawlWatcher::new(rx);
        let handle = tokio::spawn(watcher.run());

        tx.send_replace(snapshot(vec![event(1)], 0));
        tokio::task::yield_now().await;
        let mut finished = snapshot(vec![event(1), CrawlEvent::new("", "done", true)], 0);
        finished.phase = CrawlPhase::Idle;
        tx.send_replace(finished);

        assert_eq!(handle.await.unwrap(), WatchEnd::Finished);
    }
}
