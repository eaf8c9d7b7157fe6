//! REPL (Read-Eval-Print Loop) for interactive chat

use crate::ConsoleFormatter;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use sitechat_application::{ConversationEngine, ConversationError, SiteScopeContext, TurnOutcome};
use std::sync::Arc;

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Help,
    New,
    Sessions,
    History,
    Open(String),
    Delete(String),
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        match (name, arg) {
            ("/quit" | "/exit" | "/q", _) => ReplCommand::Quit,
            ("/help" | "/h" | "/?", _) => ReplCommand::Help,
            ("/new", _) => ReplCommand::New,
            ("/sessions" | "/ls", _) => ReplCommand::Sessions,
            ("/history", _) => ReplCommand::History,
            ("/open", id) if !id.is_empty() => ReplCommand::Open(id.to_string()),
            ("/delete" | "/rm", id) if !id.is_empty() => ReplCommand::Delete(id.to_string()),
            _ => ReplCommand::Unknown(line.to_string()),
        }
    }
}

/// Interactive chat REPL
pub struct ChatRepl {
    engine: Arc<ConversationEngine>,
    scope: Arc<SiteScopeContext>,
}

impl ChatRepl {
    pub fn new(engine: Arc<ConversationEngine>, scope: Arc<SiteScopeContext>) -> Self {
        Self { engine, scope }
    }

    /// Run the interactive REPL
    pub async fn run(&self) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        let history_path = dirs::data_dir().map(|p| p.join("sitechat").join("history.txt"));
        if let Some(ref path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        self.print_welcome();
        if let Err(e) = self.engine.refresh_sessions().await {
            tracing::debug!("Initial session list failed: {}", e);
        }

        loop {
            match rl.readline(">>> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if line.starts_with('/') {
                        if self.handle_command(ReplCommand::parse(line)).await {
                            break;
                        }
                        continue;
                    }

                    let _ = rl.add_history_entry(line);
                    self.process_question(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = history_path {
            let _ = rl.save_history(path);
        }

        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("╭─────────────────────────────────────────────╮");
        println!("│              sitechat - Chat Mode           │");
        println!("╰─────────────────────────────────────────────╯");
        println!();
        println!("{}", ConsoleFormatter::scope_line(self.scope.current().as_ref()));
        println!();
        Self::print_help();
    }

    fn print_help() {
        println!("Commands:");
        println!("  /new            - Start a new conversation");
        println!("  /sessions, /ls  - List conversations");
        println!("  /open <id>      - Switch to a conversation");
        println!("  /delete <id>    - Delete a conversation");
        println!("  /history        - Show the current conversation");
        println!("  /help, /h, /?   - Show this help");
        println!("  /quit, /exit    - Exit chat");
        println!();
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(&self, command: ReplCommand) -> bool {
        match command {
            ReplCommand::Quit => {
                println!("Bye!");
                return true;
            }
            ReplCommand::Help => {
                println!();
                Self::print_help();
            }
            ReplCommand::New => match self.engine.new_session() {
                Ok(id) => println!("{} {}", "New conversation".green(), id.dimmed()),
                Err(e) => Self::print_error(&e),
            },
            ReplCommand::Sessions => match self.engine.refresh_sessions().await {
                Ok(sessions) => {
                    let active = self.engine.active_session_id();
                    print!("{}", ConsoleFormatter::sessions(&sessions, active.as_deref()));
                }
                Err(e) => Self::print_error(&e),
            },
            ReplCommand::History => {
                print!("{}", ConsoleFormatter::messages(&self.engine.messages()));
            }
            ReplCommand::Open(id) => match self.engine.select_session(&id).await {
                Ok(()) => print!("{}", ConsoleFormatter::messages(&self.engine.messages())),
                Err(e) => Self::print_error(&e),
            },
            ReplCommand::Delete(id) => match self.engine.delete_session(&id).await {
                Ok(()) => println!("{} {}", "Deleted".green(), id),
                Err(e) => Self::print_error(&e),
            },
            ReplCommand::Unknown(line) => {
                println!("Unknown command: {}", line);
                println!("Type /help for available commands");
            }
        }
        false
    }

    async fn process_question(&self, question: &str) {
        println!();
        match self.engine.submit(question).await {
            Ok(TurnOutcome::Completed { .. }) => {}
            Ok(TurnOutcome::Fallback { reason, .. }) => {
                println!("{}", format!("({})", reason).dimmed());
            }
            Ok(TurnOutcome::Discarded) => {
                println!("{}", "(site changed, answer discarded)".dimmed());
            }
            Err(e) => Self::print_error(&e),
        }
        println!();
    }

    fn print_error(error: &ConversationError) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }
}
