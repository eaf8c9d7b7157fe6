//! Crawl job state machine

use super::event::CrawlEvent;
use super::history::EventHistory;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of the crawl job as the console sees it.
///
/// `Idle → Starting → Running → Idle`. A start refused with "already
/// running" goes `Starting → Idle` without passing through `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlPhase {
    #[default]
    Idle,
    Starting,
    Running,
}

impl CrawlPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlPhase::Idle => "idle",
            CrawlPhase::Starting => "starting",
            CrawlPhase::Running => "running",
        }
    }
}

impl std::fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folded state of one scope's crawl job.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlJobState {
    phase: CrawlPhase,
    status: Option<CrawlEvent>,
    history: EventHistory,
}

impl CrawlJobState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            phase: CrawlPhase::Idle,
            status: None,
            history: EventHistory::with_capacity(history_capacity),
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn running(&self) -> bool {
        self.phase == CrawlPhase::Running
    }

    /// The most recent event, cleared by a local stop.
    pub fn status(&self) -> Option<&CrawlEvent> {
        self.status.as_ref()
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    /// Enter `Starting`. Returns false if a start is already pending.
    pub fn begin_start(&mut self) -> bool {
        if self.phase == CrawlPhase::Starting {
            return false;
        }
        self.phase = CrawlPhase::Starting;
        true
    }

    /// The backend accepted the start request.
    ///
    /// Only a pending start is promoted; if a terminal event already
    /// arrived the job is over and the phase stays `Idle`.
    pub fn start_acknowledged(&mut self) {
        if self.phase == CrawlPhase::Starting {
            self.phase = CrawlPhase::Running;
        }
    }

    /// The backend refused or failed the start request.
    pub fn start_rejected(&mut self) {
        if self.phase == CrawlPhase::Starting {
            self.phase = CrawlPhase::Idle;
        }
    }

    /// Fold one incoming event. Returns true when the event is terminal.
    pub fn apply(&mut self, event: CrawlEvent) -> bool {
        let terminal = event.end;
        self.history.push(event.clone());
        self.status = Some(event);
        self.phase = if terminal {
            CrawlPhase::Idle
        } else {
            CrawlPhase::Running
        };
        terminal
    }

    /// Local reset after a successful stop request.
    pub fn stopped(&mut self) {
        self.phase = CrawlPhase::Idle;
        self.status = None;
    }
}

impl Default for CrawlJobState {
    fn default() -> Self {
        Self::new(super::history::DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_terminal_event_forces_running() {
        let mut state = CrawlJobState::default();
        assert!(!state.apply(CrawlEvent::new("https://example.com", "crawling", false)));
        assert!(state.running());
        assert_eq!(state.status().unwrap().status, "crawling");
    }

    #[test]
    fn terminal_event_stops_regardless_of_phase() {
        let mut state = CrawlJobState::default();
        assert!(state.apply(CrawlEvent::new("https://example.com", "done", true)));
        assert_eq!(state.phase(), CrawlPhase::Idle);
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn late_acknowledgment_after_end_stays_idle() {
        let mut state = CrawlJobState::default();
        assert!(state.begin_start());
        state.apply(CrawlEvent::new("https://example.com", "done", true));
        state.start_acknowledged();
        assert_eq!(state.phase(), CrawlPhase::Idle);
    }

    #[test]
    fn rejected_start_never_runs() {
        let mut state = CrawlJobState::default();
        assert!(state.begin_start());
        assert!(!state.begin_start());
        state.start_rejected();
        assert_eq!(state.phase(), CrawlPhase::Idle);
    }

    #[test]
    fn stopped_keeps_history() {
        let mut state = CrawlJobState::default();
        state.apply(CrawlEvent::new("https://example.com", "crawling", false));
        state.stopped();
        assert!(!state.running());
        assert!(state.status().is_none());
        assert_eq!(state.history().len(), 1);
    }
}
