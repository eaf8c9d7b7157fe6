//! Chat backend port
//!
//! Defines how the application layer opens a streamed answer and manages
//! server-side sessions. Implementations (adapters) live in the
//! infrastructure layer.

use super::event_source::ByteSource;
use async_trait::async_trait;
use serde::Serialize;
use sitechat_domain::{ChatTurn, Session, SiteScope};
use thiserror::Error;

/// Errors that can occur while talking to the backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),
}

impl GatewayError {
    /// Status code for HTTP-level rejections.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Payload of one conversation request.
///
/// `chat_history` holds prior turns only; the new question travels in
/// `question`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub question: String,
    pub chat_history: Vec<ChatTurn>,
    pub session_id: String,
}

/// Streams answers for a tenant's chatbot.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request and return the answer's byte stream once the backend
    /// has accepted it.
    async fn open_answer_stream(
        &self,
        scope: &SiteScope,
        request: &ChatRequest,
    ) -> Result<ByteSource, GatewayError>;
}

/// Server-side session bookkeeping.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// List the tenant's sessions.
    async fn list_sessions(&self, scope: &SiteScope) -> Result<Vec<Session>, GatewayError>;

    /// Fetch a session's ordered history.
    async fn fetch_history(
        &self,
        scope: &SiteScope,
        session_id: &str,
    ) -> Result<Vec<ChatTurn>, GatewayError>;

    /// Delete a session.
    async fn delete_session(&self, scope: &SiteScope, session_id: &str)
    -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitechat_domain::Role;

    #[test]
    fn chat_request_wire_shape() {
        let request = ChatRequest {
            question: "And pricing?".to_string(),
            chat_history: vec![ChatTurn {
                role: Role::User,
                content: "Hi".to_string(),
            }],
            session_id: "s-1".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "question": "And pricing?",
                "chat_history": [{"role": "user", "content": "Hi"}],
                "session_id": "s-1"
            })
        );
    }

    #[test]
    fn status_only_for_http_errors() {
        let err = GatewayError::HttpStatus {
            status: 401,
            message: "Unauthorized".to_string(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(GatewayError::ConnectionError("x".to_string()).status(), None);
    }
}
