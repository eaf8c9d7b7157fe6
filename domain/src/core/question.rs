//! Question value object

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A question submitted to the chatbot (Value Object)
///
/// Guaranteed non-empty after trimming. The original text is kept as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    content: String,
}

impl Question {
    /// Create a question, rejecting empty or whitespace-only input
    pub fn parse(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::InvalidQuestion(
                "question cannot be empty".to_string(),
            ));
        }
        Ok(Self { content })
    }

    /// Get the question content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume and return the inner content
    pub fn into_content(self) -> String {
        self.content
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl TryFrom<&str> for Question {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Question::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_creation() {
        let q = Question::parse("How do I reset my password?").unwrap();
        assert_eq!(q.content(), "How do I reset my password?");
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(
            Question::parse(""),
            Err(DomainError::InvalidQuestion(_))
        ));
    }

    #[test]
    fn test_whitespace_only_is_error() {
        assert!(Question::parse("   \n").is_err());
        assert!(Question::parse(" hi ").is_ok());
    }

    #[test]
    fn test_keeps_original_text() {
        let q: Question = "  padded  ".try_into().unwrap();
        assert_eq!(q.into_content(), "  padded  ");
    }
}
