//! Console output formatter for sessions and crawl status

use colored::Colorize;
use sitechat_application::{CrawlNotice, CrawlSnapshot};
use sitechat_domain::{CrawlEvent, Message, Role, Session, SiteScope};

/// Formats engine and monitor state for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// One line per session, marking the active one.
    pub fn sessions(sessions: &[Session], active: Option<&str>) -> String {
        if sessions.is_empty() {
            return format!("{}\n", "No sessions yet.".dimmed());
        }

        let mut output = String::new();
        for session in sessions {
            let marker = if Some(session.id.as_str()) == active {
                "*".green().bold().to_string()
            } else {
                " ".to_string()
            };
            output.push_str(&format!(
                "{} {}  {}  {}\n",
                marker,
                session.created_time.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                session.id.cyan(),
                session.display_title()
            ));
        }
        output
    }

    /// A session's messages in order.
    pub fn messages(messages: &[Message]) -> String {
        if messages.is_empty() {
            return format!("{}\n", "(no messages)".dimmed());
        }

        let mut output = String::new();
        for message in messages {
            let label = match message.role {
                Role::User => "You:".cyan().bold(),
                Role::Assistant => "Bot:".yellow().bold(),
            };
            output.push_str(&format!("{} {}\n\n", label, message.content));
        }
        output
    }

    /// One status event line.
    pub fn crawl_event(event: &CrawlEvent) -> String {
        let status = if event.end {
            event.status.green().bold()
        } else {
            event.status.cyan()
        };
        let mut line = format!(
            "{} {}",
            event.timestamp.format("%H:%M:%S").to_string().dimmed(),
            status
        );
        if !event.url.is_empty() {
            line.push_str(&format!(" {}", event.url));
        }
        if !event.message.is_empty() {
            line.push_str(&format!(" {}", format!("({})", event.message).dimmed()));
        }
        line
    }

    pub fn notice(notice: &CrawlNotice) -> String {
        if notice.is_benign() {
            format!("{} {}", "!".yellow().bold(), notice)
        } else {
            format!("{} {}", "x".red().bold(), notice)
        }
    }

    /// Summary of the monitor's current view.
    pub fn crawl_snapshot(snapshot: &CrawlSnapshot) -> String {
        let mut output = String::new();
        output.push_str(&Self::section_header("Crawl Status"));
        output.push_str(&format!("{} {}\n", "Phase:".cyan().bold(), snapshot.phase));
        output.push_str(&format!(
            "{} {}\n",
            "Channel:".cyan().bold(),
            if snapshot.channel_open { "open" } else { "closed" }
        ));
        if let Some(status) = &snapshot.status {
            output.push_str(&format!(
                "{} {}\n",
                "Last:".cyan().bold(),
                Self::crawl_event(status)
            ));
        }
        if snapshot.evicted > 0 {
            output.push_str(&format!(
                "{}\n",
                format!("({} older events dropped)", snapshot.evicted).dimmed()
            ));
        }
        if let Some(notice) = &snapshot.notice {
            output.push_str(&Self::notice(notice));
            output.push('\n');
        }
        output
    }

    /// Banner line naming the active site.
    pub fn scope_line(scope: Option<&SiteScope>) -> String {
        match scope {
            Some(scope) => format!("{} {} ({})", "Site:".cyan().bold(), scope.name, scope.site_id),
            None => format!("{} {}", "Site:".cyan().bold(), "none selected".red()),
        }
    }

    pub fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}\n", line.blue(), title.bold(), line.blue())
    }

    pub fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(title.len()).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitechat_domain::CrawlPhase;

    #[test]
    fn test_sessions_marks_active() {
        let sessions = vec![
            Session::new("a1").with_title("Pricing"),
            Session::new("b2"),
        ];
        let output = ConsoleFormatter::sessions(&sessions, Some("b2"));
        let lines: Vec<_> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Pricing"));
        assert!(lines[0].starts_with(' '));
        // Untitled sessions show their id as the title.
        assert!(lines[1].contains("b2"));
        assert!(!lines[1].starts_with(' '));
    }

    #[test]
    fn test_empty_sessions() {
        assert!(ConsoleFormatter::sessions(&[], None).contains("No sessions yet."));
    }

    #[test]
    fn test_messages_in_order() {
        let output = ConsoleFormatter::messages(&[
            Message::user("What is it?"),
            Message::assistant("A chatbot."),
        ]);
        let question = output.find("What is it?").unwrap();
        let answer = output.find("A chatbot.").unwrap();
        assert!(question < answer);
    }

    #[test]
    fn test_crawl_event_line() {
        let event = CrawlEvent::new("https://e.com/a", "crawling", false).with_message("page 3");
        let line = ConsoleFormatter::crawl_event(&event);
        assert!(line.contains("crawling"));
        assert!(line.contains("https://e.com/a"));
        assert!(line.contains("page 3"));
    }

    #[test]
    fn test_snapshot_summary() {
        let snapshot = CrawlSnapshot {
            generation: 1,
            phase: CrawlPhase::Running,
            status: Some(CrawlEvent::new("https://e.com", "crawling", false)),
            history: Vec::new(),
            evicted: 3,
            notice: Some(CrawlNotice::AlreadyRunning),
            channel_open: true,
            refreshes_scheduled: 0,
            refreshes_finished: 0,
        };
        let output = ConsoleFormatter::crawl_snapshot(&snapshot);
        assert!(output.contains("running"));
        assert!(output.contains("open"));
        assert!(output.contains("3 older events dropped"));
        assert!(output.contains("already running"));
    }

    #[test]
    fn test_scope_line() {
        let scope = SiteScope::new("s1", "t", "Docs");
        assert!(ConsoleFormatter::scope_line(Some(&scope)).contains("Docs"));
        assert!(ConsoleFormatter::scope_line(None).contains("none selected"));
    }
}
