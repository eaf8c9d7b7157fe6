//! Live rendering of streamed answers

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitechat_application::ConversationProgress;
use sitechat_domain::Message;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Text to print after `printed` has already been written for `current`.
///
/// Answers only ever grow, so this is normally the new suffix. If `current`
/// no longer starts with what was printed, the whole answer is returned
/// together with `true` so the caller can start a fresh line.
pub fn next_delta<'a>(printed: &str, current: &'a str) -> (&'a str, bool) {
    match current.strip_prefix(printed) {
        Some(rest) => (rest, false),
        None => (current, true),
    }
}

#[derive(Default)]
struct RenderState {
    spinner: Option<ProgressBar>,
    printed: String,
}

impl RenderState {
    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

/// Prints an answer to stdout as it streams in.
///
/// A spinner is shown until the first chunk arrives.
pub struct StreamingReporter {
    show_spinner: bool,
    state: Mutex<RenderState>,
}

impl StreamingReporter {
    pub fn new() -> Self {
        Self {
            show_spinner: true,
            state: Mutex::new(RenderState::default()),
        }
    }

    /// Plain output without a spinner (for `--quiet` or piped output).
    pub fn quiet() -> Self {
        Self {
            show_spinner: false,
            ..Self::new()
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn lock(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StreamingReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationProgress for StreamingReporter {
    fn on_turn_start(&self, _session_id: &str, _question: &str) {
        let mut state = self.lock();
        state.printed.clear();
        state.clear_spinner();
        if self.show_spinner {
            let pb = ProgressBar::new_spinner();
            pb.set_style(Self::spinner_style());
            pb.set_message("Thinking...");
            pb.enable_steady_tick(Duration::from_millis(100));
            state.spinner = Some(pb);
        }
    }

    fn on_partial(&self, content_so_far: &str) {
        let mut state = self.lock();
        state.clear_spinner();

        let (delta, restart) = next_delta(&state.printed, content_so_far);
        let mut out = std::io::stdout().lock();
        if restart && !state.printed.is_empty() {
            let _ = writeln!(out);
        }
        let _ = write!(out, "{}", delta);
        let _ = out.flush();

        state.printed = content_so_far.to_string();
    }

    fn on_fallback(&self, message: &Message) {
        let mut state = self.lock();
        state.clear_spinner();
        if !state.printed.is_empty() {
            println!();
        }
        println!("{}", message.content.yellow());
        state.printed.clear();
    }

    fn on_turn_end(&self) {
        let mut state = self.lock();
        state.clear_spinner();
        if !state.printed.is_empty() {
            println!();
        }
        state.printed.clear();
    }
}
