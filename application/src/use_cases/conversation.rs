//! Conversation engine use case.
//!
//! Drives one question→answer turn against the chat backend, rendering the
//! answer into the active session's [`Conversation`] as it streams in, and
//! owns session selection for the active tenant.
//!
//! # Turn lifecycle
//!
//! 1. The user message is appended immediately.
//! 2. The request is sent with the prior turns as `chat_history`.
//! 3. The first chunk appends the assistant placeholder; every chunk
//!    replaces its content with the full text so far.
//! 4. End of stream finalizes the placeholder, empty if no byte arrived.
//!
//! Any failure becomes a single fallback assistant message. Nothing but
//! precondition violations leaves [`ConversationEngine::submit`] as an error.

use crate::decoder::Utf8ChunkDecoder;
use crate::ports::chat_backend::{ChatBackend, ChatRequest, GatewayError, SessionApi};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::progress::{ConversationProgress, NoProgress};
use crate::scope::{ScopeChange, ScopeListener, SiteScopeContext};
use crate::use_cases::session_store::SessionStore;
use sitechat_domain::core::string::{single_line, truncate};
use sitechat_domain::util::truncate_str;
use sitechat_domain::{Conversation, Message, Question, Session, SiteScope};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reply appended whenever a turn cannot produce (or finish) an answer.
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't get an answer right now. Please try again in a moment.";

/// Maximum title length for sessions created from their first question.
const SESSION_TITLE_CHARS: usize = 40;

/// Errors returned by the conversation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("A response is still streaming for this session")]
    Busy,

    #[error("No valid site scope selected")]
    NoScope,

    #[error("Site scope changed while the request was pending")]
    ScopeChanged,

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Whether a turn is in progress for the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingResponse,
}

/// Why a turn ended with the fallback reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No scope, or an incomplete one. No request was sent.
    InvalidScope,
    /// The request was rejected, or the stream failed before its first byte.
    Setup(String),
    /// Reading the stream failed after the first byte arrived.
    MidStream(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::InvalidScope => write!(f, "no valid site selected"),
            FallbackReason::Setup(e) => write!(f, "request failed: {}", e),
            FallbackReason::MidStream(e) => write!(f, "answer interrupted: {}", e),
        }
    }
}

/// Result of a [`ConversationEngine::submit`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The stream ended normally; `content` is the final answer.
    Completed { session_id: String, content: String },
    /// The fallback reply was appended.
    Fallback {
        session_id: String,
        reason: FallbackReason,
    },
    /// The scope changed mid-turn; the turn's late results were dropped.
    Discarded,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }
}

/// Read-only view of the engine for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSnapshot {
    pub session_id: Option<String>,
    pub turn: TurnState,
    pub messages: Vec<Message>,
    pub sessions: Vec<Session>,
    pub scope_generation: u64,
}

struct EngineState {
    store: SessionStore,
    log: Conversation,
    turn: TurnState,
    generation: u64,
}

impl EngineState {
    fn new(generation: u64) -> Self {
        Self {
            store: SessionStore::new(),
            log: Conversation::new(),
            turn: TurnState::Idle,
            generation,
        }
    }

    /// The active session id, creating a session on first use.
    fn ensure_session(&mut self, question: &Question) -> String {
        if let Some(id) = self.store.active_id() {
            let id = id.to_string();
            self.store
                .title_if_missing(&id, &session_title(question.content()));
            return id;
        }
        let session = Session::new(new_session_id()).with_title(session_title(question.content()));
        let id = session.id.clone();
        info!("Created session {} on first submission", id);
        self.store.activate(session);
        id
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn session_title(question: &str) -> String {
    truncate(&single_line(question), SESSION_TITLE_CHARS)
}

/// Use case driving conversation turns and session selection.
pub struct ConversationEngine {
    scope: Arc<SiteScopeContext>,
    backend: Arc<dyn ChatBackend>,
    sessions: Arc<dyn SessionApi>,
    progress: Arc<dyn ConversationProgress>,
    conversation_logger: Arc<dyn ConversationLogger>,
    state: Mutex<EngineState>,
}

impl ConversationEngine {
    pub fn new(
        scope: Arc<SiteScopeContext>,
        backend: Arc<dyn ChatBackend>,
        sessions: Arc<dyn SessionApi>,
    ) -> Self {
        let generation = scope.generation();
        Self {
            scope,
            backend,
            sessions,
            progress: Arc::new(NoProgress),
            conversation_logger: Arc::new(NoConversationLogger),
            state: Mutex::new(EngineState::new(generation)),
        }
    }

    /// Set the progress observer used to render turns.
    pub fn with_progress(mut self, progress: Arc<dyn ConversationProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    /// Share the engine and subscribe it to scope changes.
    pub fn install(self) -> Arc<Self> {
        let engine = Arc::new(self);
        let listener: Weak<dyn ScopeListener> = Arc::downgrade(&engine) as Weak<dyn ScopeListener>;
        engine.scope.register(listener);
        engine
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let state = self.lock();
        ConversationSnapshot {
            session_id: state.store.active_id().map(str::to_string),
            turn: state.turn,
            messages: state.log.messages().to_vec(),
            sessions: state.store.sessions().to_vec(),
            scope_generation: state.generation,
        }
    }

    pub fn turn_state(&self) -> TurnState {
        self.lock().turn
    }

    pub fn active_session_id(&self) -> Option<String> {
        self.lock().store.active_id().map(str::to_string)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().log.messages().to_vec()
    }

    /// Submit a question and stream the answer into the active session.
    ///
    /// Fails fast with [`ConversationError::Busy`] while another turn is
    /// streaming and with [`ConversationError::EmptyQuestion`] for blank
    /// input. Every other failure is rendered as the fallback reply.
    pub async fn submit(&self, question: &str) -> Result<TurnOutcome, ConversationError> {
        let question = Question::parse(question).map_err(|_| ConversationError::EmptyQuestion)?;
        let (scope, generation) = self.scope.snapshot();

        let (session_id, history) = {
            let mut state = self.lock();
            if state.generation != generation {
                // Listener not installed or notification still in flight.
                *state = EngineState::new(generation);
            }
            if state.turn == TurnState::AwaitingResponse {
                return Err(ConversationError::Busy);
            }
            let session_id = state.ensure_session(&question);
            let history = state.log.turns();
            state.log.push_user(question.content());
            state.turn = TurnState::AwaitingResponse;
            (session_id, history)
        };

        info!(
            "Submitting question to session {} ({} prior turns): {}",
            session_id,
            history.len(),
            truncate_str(question.content(), 100)
        );
        self.conversation_logger.log(ConversationEvent::new(
            "turn_submitted",
            serde_json::json!({
                "session_id": session_id,
                "question": question.content(),
                "history_len": history.len(),
            }),
        ));
        self.progress.on_turn_start(&session_id, question.content());

        let request = ChatRequest {
            question: question.into_content(),
            chat_history: history,
            session_id: session_id.clone(),
        };
        let outcome = self.run_turn(scope, request, generation).await;

        {
            let mut state = self.lock();
            if state.generation == generation {
                state.turn = TurnState::Idle;
            }
        }
        self.progress.on_turn_end();
        Ok(outcome)
    }

    async fn run_turn(
        &self,
        scope: Option<SiteScope>,
        request: ChatRequest,
        generation: u64,
    ) -> TurnOutcome {
        let session_id = request.session_id.clone();

        let Some(scope) = scope.filter(SiteScope::is_valid) else {
            warn!("No valid site scope, answering with fallback");
            return self.fallback(generation, &session_id, FallbackReason::InvalidScope);
        };

        let mut source = match self.backend.open_answer_stream(&scope, &request).await {
            Ok(source) => source,
            Err(e) => {
                warn!("Chat request failed before streaming: {}", e);
                return self.fallback(generation, &session_id, FallbackReason::Setup(e.to_string()));
            }
        };

        let mut decoder = Utf8ChunkDecoder::new();
        let mut content = String::new();
        let mut chunks = 0usize;

        while let Some(next) = source.next_event().await {
            match next {
                Ok(chunk) => {
                    // The placeholder appears with the first byte.
                    if chunks == 0 && !self.open_placeholder(generation) {
                        return TurnOutcome::Discarded;
                    }
                    chunks += 1;
                    content.push_str(&decoder.decode(&chunk));
                    debug!(
                        "Chunk {} ({} bytes), answer now {} bytes",
                        chunks,
                        chunk.len(),
                        content.len()
                    );
                    if !self.render(generation, &content) {
                        debug!("Scope changed mid-stream, dropping session {}", session_id);
                        return TurnOutcome::Discarded;
                    }
                    self.progress.on_partial(&content);
                }
                Err(e) if chunks == 0 => {
                    warn!("Stream for session {} failed before any byte: {}", session_id, e);
                    return self.fallback(generation, &session_id, FallbackReason::Setup(e.to_string()));
                }
                Err(e) => {
                    warn!(
                        "Stream for session {} failed after {} chunks: {}",
                        session_id, chunks, e
                    );
                    return self.fallback(
                        generation,
                        &session_id,
                        FallbackReason::MidStream(e.to_string()),
                    );
                }
            }
        }

        // An empty answer still gets its (empty) assistant message.
        if chunks == 0 && !self.open_placeholder(generation) {
            return TurnOutcome::Discarded;
        }
        let tail = decoder.finish();
        if !tail.is_empty() {
            content.push_str(&tail);
            if !self.render(generation, &content) {
                return TurnOutcome::Discarded;
            }
            self.progress.on_partial(&content);
        }
        if decoder.had_replacements() {
            warn!("Answer for session {} contained malformed UTF-8", session_id);
        }
        if !self.with_state(generation, |state| state.log.finalize()) {
            return TurnOutcome::Discarded;
        }

        info!(
            "Answer for session {} complete ({} chunks, {} bytes)",
            session_id,
            chunks,
            content.len()
        );
        self.conversation_logger.log(ConversationEvent::new(
            "turn_completed",
            serde_json::json!({
                "session_id": session_id,
                "chunks": chunks,
                "bytes": content.len(),
                "answer": content,
            }),
        ));
        TurnOutcome::Completed {
            session_id,
            content,
        }
    }

    fn open_placeholder(&self, generation: u64) -> bool {
        self.with_state(generation, |state| state.log.open_assistant())
    }

    /// Replace the placeholder's content. False if the turn was fenced out.
    fn render(&self, generation: u64, content: &str) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.log.replace_in_flight(content).is_ok()
    }

    fn fallback(&self, generation: u64, session_id: &str, reason: FallbackReason) -> TurnOutcome {
        let message = Message::assistant(FALLBACK_REPLY);
        let appended = self.with_state(generation, |state| {
            state.log.push_assistant(message.content.clone());
        });
        if !appended {
            return TurnOutcome::Discarded;
        }
        self.conversation_logger.log(ConversationEvent::new(
            "turn_fallback",
            serde_json::json!({
                "session_id": session_id,
                "reason": reason.to_string(),
            }),
        ));
        self.progress.on_fallback(&message);
        TurnOutcome::Fallback {
            session_id: session_id.to_string(),
            reason,
        }
    }

    /// Run `f` only if the state still belongs to `generation`.
    fn with_state(&self, generation: u64, f: impl FnOnce(&mut EngineState)) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        f(&mut state);
        true
    }

    // ==================== Sessions ====================

    /// Start a new chat. The session exists server-side after its first
    /// question.
    pub fn new_session(&self) -> Result<String, ConversationError> {
        let mut state = self.lock();
        if state.turn == TurnState::AwaitingResponse {
            return Err(ConversationError::Busy);
        }
        let session = Session::new(new_session_id());
        let id = session.id.clone();
        state.store.activate(session);
        state.log = Conversation::new();
        info!("Started new session {}", id);
        Ok(id)
    }

    /// Reload the tenant's session list from the backend.
    pub async fn refresh_sessions(&self) -> Result<Vec<Session>, ConversationError> {
        let (scope, generation) = self.valid_scope()?;
        let sessions = self.sessions.list_sessions(&scope).await?;
        let mut state = self.lock();
        if state.generation != generation {
            return Err(ConversationError::ScopeChanged);
        }
        state.store.replace_all(sessions);
        debug!("Session list refreshed ({} sessions)", state.store.sessions().len());
        Ok(state.store.sessions().to_vec())
    }

    /// Make `id` the active session, replacing the message log with its
    /// fetched history.
    pub async fn select_session(&self, id: &str) -> Result<(), ConversationError> {
        let (scope, generation) = self.valid_scope()?;
        if self.lock().turn == TurnState::AwaitingResponse {
            return Err(ConversationError::Busy);
        }

        let history = self.sessions.fetch_history(&scope, id).await?;

        let mut state = self.lock();
        if state.generation != generation {
            return Err(ConversationError::ScopeChanged);
        }
        if state.turn == TurnState::AwaitingResponse {
            return Err(ConversationError::Busy);
        }
        if !state.store.activate_id(id) {
            state.store.activate(Session::new(id));
        }
        state.log = Conversation::from_turns(history);
        info!(
            "Selected session {} ({} messages)",
            id,
            state.log.len()
        );
        Ok(())
    }

    /// Delete a session server-side. Local state is cleared only when it was
    /// the active session.
    pub async fn delete_session(&self, id: &str) -> Result<(), ConversationError> {
        let (scope, generation) = self.valid_scope()?;
        {
            let state = self.lock();
            if state.store.active_id() == Some(id) && state.turn == TurnState::AwaitingResponse {
                return Err(ConversationError::Busy);
            }
        }

        self.sessions.delete_session(&scope, id).await?;

        let mut state = self.lock();
        if state.generation != generation {
            return Err(ConversationError::ScopeChanged);
        }
        if state.store.remove(id) {
            state.log = Conversation::new();
            info!("Deleted active session {}", id);
        } else {
            debug!("Deleted session {}", id);
        }
        Ok(())
    }

    fn valid_scope(&self) -> Result<(SiteScope, u64), ConversationError> {
        match self.scope.snapshot() {
            (Some(scope), generation) if scope.is_valid() => Ok((scope, generation)),
            _ => Err(ConversationError::NoScope),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScopeListener for ConversationEngine {
    fn on_scope_changed(&self, change: &ScopeChange) {
        let mut state = self.lock();
        if state.turn == TurnState::AwaitingResponse {
            warn!("Scope changed while a response was streaming; dropping it");
        }
        *state = EngineState::new(change.generation);
        info!(
            "Conversation reset for scope generation {}",
            change.generation
        );
    }
}
