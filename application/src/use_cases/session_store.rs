//! Session list and selection.
//!
//! [`SessionStore`] is plain state owned by the
//! [`ConversationEngine`](super::conversation::ConversationEngine); the
//! engine performs the backend calls and feeds the results in here.

use sitechat_domain::Session;

/// Known sessions of the active tenant.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    active: Option<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions in display order (newest first).
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replace the list with what the backend reported.
    ///
    /// The active session survives even if the backend does not know it yet
    /// (a new chat exists server-side only after its first question).
    pub fn replace_all(&mut self, mut sessions: Vec<Session>) {
        if let Some(active) = self.active.as_deref()
            && !sessions.iter().any(|s| s.id == active)
            && let Some(local) = self.get(active).cloned()
        {
            sessions.push(local);
        }
        sessions.sort_by(|a, b| b.created_time.cmp(&a.created_time));
        self.sessions = sessions;
    }

    /// Add a session (if unknown) and make it active.
    pub fn activate(&mut self, session: Session) {
        if !self.contains(&session.id) {
            self.sessions.insert(0, session.clone());
        }
        self.active = Some(session.id);
    }

    /// Make a known session active. Returns false for unknown ids.
    pub fn activate_id(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.active = Some(id.to_string());
        true
    }

    /// Set the title of a session that has none yet.
    pub fn title_if_missing(&mut self, id: &str, title: &str) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id)
            && session.title.is_none()
        {
            session.title = Some(title.to_string());
        }
    }

    /// Remove a session. Returns true if it was the active one.
    pub fn remove(&mut self, id: &str) -> bool {
        self.sessions.retain(|s| s.id != id);
        if self.active.as_deref() == Some(id) {
            self.active = None;
            return true;
        }
        false
    }
}
